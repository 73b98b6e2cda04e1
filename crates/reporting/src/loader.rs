//! Spreadsheet loader: reads a touchpoint-per-row sheet (xlsx/xls/ods via
//! calamine, or csv) and maps its columns onto [`Touchpoint`] rows.

use attribution_core::config::ColumnMapping;
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::types::{CustomerFlag, PositionName, Touchpoint, TouchpointTable};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::{debug, info};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

static EMPTY_CELL: RawCell = RawCell::Empty;

/// A single cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

struct RawSheet {
    headers: Vec<String>,
    rows: Vec<Vec<RawCell>>,
}

/// Column positions resolved against the sheet header.
struct ColumnIndex {
    order_id: usize,
    order_time: usize,
    position: usize,
    position_name: usize,
    channel: usize,
    sale_amount: usize,
    new_customer: usize,
    days_to_convert: usize,
}

/// Load every touchpoint from `path`, resolving headers through `columns`.
pub fn load_touchpoints(path: &Path, columns: &ColumnMapping) -> AttributionResult<TouchpointTable> {
    if !path.is_file() {
        return Err(AttributionError::load(path, "file not found"));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let sheet = if extension == "csv" {
        read_csv(path)?
    } else if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(path)?
    } else {
        return Err(AttributionError::load(
            path,
            format!("unsupported file extension '{extension}'"),
        ));
    };

    debug!(
        path = %path.display(),
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Sheet read"
    );

    let index = resolve_columns(path, &sheet.headers, columns)?;
    let mut touchpoints = Vec::with_capacity(sheet.rows.len());

    for (i, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|c| *c == RawCell::Empty) {
            continue;
        }
        // Header is line 1.
        let line = i + 2;
        let cell = |idx: usize| row.get(idx).unwrap_or(&EMPTY_CELL);
        let field_error = |column: &str, reason: &str| {
            AttributionError::load(path, format!("row {line}, column '{column}': {reason}"))
        };

        let order_id = as_text(cell(index.order_id))
            .ok_or_else(|| field_error(&columns.order_id, "missing order id"))?;
        let order_time = as_datetime(cell(index.order_time))
            .ok_or_else(|| field_error(&columns.order_time, "expected a date/time"))?;
        let position = as_position(cell(index.position))
            .ok_or_else(|| field_error(&columns.position, "expected a non-negative integer"))?;
        let position_name = as_text(cell(index.position_name))
            .map(|label| PositionName::parse(&label))
            .ok_or_else(|| field_error(&columns.position_name, "missing position name"))?;
        let channel = as_text(cell(index.channel))
            .ok_or_else(|| field_error(&columns.channel, "missing channel group"))?;
        let sale_amount = as_optional_number(cell(index.sale_amount))
            .map_err(|reason| field_error(&columns.sale_amount, &reason))?;
        let new_customer = as_text(cell(index.new_customer))
            .and_then(|flag| CustomerFlag::parse(&flag))
            .ok_or_else(|| field_error(&columns.new_customer, "expected Y or N"))?;
        let days_to_convert = as_optional_number(cell(index.days_to_convert))
            .map_err(|reason| field_error(&columns.days_to_convert, &reason))?;

        touchpoints.push(Touchpoint {
            order_id,
            order_time,
            channel,
            position,
            position_name,
            sale_amount,
            new_customer,
            days_to_convert,
        });
    }

    let table = TouchpointTable::new(path, touchpoints);
    info!(
        path = %path.display(),
        touchpoints = table.len(),
        orders = table.order_count(),
        "Touchpoints loaded"
    );
    Ok(table)
}

fn resolve_columns(
    path: &Path,
    headers: &[String],
    columns: &ColumnMapping,
) -> AttributionResult<ColumnIndex> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name.trim())
            .ok_or_else(|| AttributionError::schema(name, path))
    };

    Ok(ColumnIndex {
        order_id: find(&columns.order_id)?,
        order_time: find(&columns.order_time)?,
        position: find(&columns.position)?,
        position_name: find(&columns.position_name)?,
        channel: find(&columns.channel)?,
        sale_amount: find(&columns.sale_amount)?,
        new_customer: find(&columns.new_customer)?,
        days_to_convert: find(&columns.days_to_convert)?,
    })
}

fn read_workbook(path: &Path) -> AttributionResult<RawSheet> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| AttributionError::load(path, e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AttributionError::load(path, "workbook has no worksheets"))?
        .map_err(|e| AttributionError::load(path, e.to_string()))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .ok_or_else(|| AttributionError::load(path, "worksheet is empty"))?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows = rows
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();

    Ok(RawSheet { headers, rows })
}

fn workbook_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) if s.trim().is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => RawCell::DateTime(dt),
            None => RawCell::Text(cell.to_string()),
        },
        other => RawCell::Text(other.to_string()),
    }
}

fn read_csv(path: &Path) -> AttributionResult<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AttributionError::load(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| AttributionError::load(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AttributionError::load(path, e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawSheet { headers, rows })
}

fn as_text(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Text(s) => Some(s.trim().to_string()),
        // Numeric ids come back from spreadsheets as floats.
        RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        RawCell::Number(n) => Some(n.to_string()),
        RawCell::DateTime(dt) => Some(dt.to_string()),
    }
}

fn as_position(cell: &RawCell) -> Option<u32> {
    let value = match cell {
        RawCell::Number(n) => *n,
        RawCell::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

fn as_optional_number(cell: &RawCell) -> Result<Option<f64>, String> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::Number(n) => Ok(Some(*n)),
        RawCell::Text(s) => {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("expected a number, got '{}'", s.trim()))
        }
        RawCell::DateTime(dt) => Err(format!("expected a number, got date {dt}")),
    }
}

fn as_datetime(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::DateTime(dt) => Some(*dt),
        RawCell::Number(serial) => excel_serial_to_datetime(*serial),
        RawCell::Text(s) => parse_datetime(s.trim()),
        RawCell::Empty => None,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Serial day numbers count from 1899-12-30 in the 1900 date system.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}
