//! Integration test for the full load → attribute → compare → render flow.

#[cfg(test)]
mod tests {
    use attribution_core::config::{AppConfig, OutputFormat};
    use attribution_core::error::AttributionError;
    use attribution_core::types::AttributionPolicy;
    use attribution_reporting::report::{
        AttributionReport, FIRST_VS_LAST, NEW_FIRST_VS_LAST, RETURNING_FIRST_VS_LAST,
        TIME_DECAY_VS_LAST,
    };
    use std::io::Write;

    /// Orders A (Search→Search), B (Display→Search), C (Display→Display).
    fn sample_sheet() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "Order Id,Order Date Time,Position,Position Name,Group Name,Sale Amount,New Customer,Time to Convert (Days)\n\
             A,2024-03-01 09:00:00,0,ORIGINATOR,Search,50,Y,7\n\
             A,2024-03-01 09:00:00,1,CONVERTER,Search,50,Y,0\n\
             B,2024-03-02 10:30:00,0,ORIGINATOR,Display,80,Y,14\n\
             B,2024-03-02 10:30:00,1,ROSTER,Email,80,Y,7\n\
             B,2024-03-02 10:30:00,2,CONVERTER,Search,80,Y,0\n\
             C,2024-03-04 18:15:00,0,ORIGINATOR,Display,20,N,3\n\
             C,2024-03-04 18:15:00,1,CONVERTER,Display,20,N,0"
        )
        .unwrap();
        file
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_full_report() {
        let file = sample_sheet();
        let report = AttributionReport::new(AppConfig::default());
        let output = report.run_file(file.path()).unwrap();

        assert_eq!(output.summary.orders, 3);
        assert_eq!(output.summary.touchpoints, 7);
        assert_eq!(output.summary.touchpoints_per_order, 2.33);
        assert_eq!(output.credit_tables.len(), 7);

        let first_vs_last = output.comparison(FIRST_VS_LAST).unwrap().rounded(3);
        let search = first_vs_last.row("Search").unwrap();
        assert_eq!((search.left, search.right), (0.333, 0.667));
        let display = first_vs_last.row("Display").unwrap();
        assert_eq!((display.left, display.right), (0.667, 0.333));

        // New customers: A and B converted on Search.
        let new = output.comparison(NEW_FIRST_VS_LAST).unwrap();
        let new_last_total: f64 = new.rows.iter().map(|r| r.right).sum();
        assert!(close(new_last_total, 1.0));
        assert!(close(new.row("Search").unwrap().right, 1.0));

        let returning = output.comparison(RETURNING_FIRST_VS_LAST).unwrap();
        assert_eq!(returning.rows.len(), 1);
        assert!(close(returning.row("Display").unwrap().left, 1.0));

        // Order B weights 0.25, 0.5, 1.0 → Email 0.5/1.75 of one order.
        let decay = output.credit_table(AttributionPolicy::TimeDecay).unwrap();
        assert!(close(decay.share("Email"), (0.5 / 1.75) / 3.0));
        assert!((decay.total() - 1.0).abs() < 0.001);

        let decay_vs_last = output.comparison(TIME_DECAY_VS_LAST).unwrap();
        assert_eq!(decay_vs_last.left_label, "Credit_time_decay");
        assert_eq!(decay_vs_last.row("Email").unwrap().right, 0.0);
    }

    #[test]
    fn test_render_table_and_json() {
        let file = sample_sheet();

        let report = AttributionReport::new(AppConfig::default());
        let output = report.run_file(file.path()).unwrap();
        let mut buf = Vec::new();
        report.render(&output, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Number of orders: 3"));
        assert!(text.contains("Credit_first"));
        assert!(text.contains("0.667"));

        let mut config = AppConfig::default();
        config.render.format = OutputFormat::Json;
        let report = AttributionReport::new(config);
        let mut buf = Vec::new();
        report.render(&output, &mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["summary"]["orders"], 3);
        assert_eq!(json["credit_tables"][0]["model"], "last");
        assert_eq!(json["comparisons"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_missing_segment_fails_the_run() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "Order Id,Order Date Time,Position,Position Name,Group Name,Sale Amount,New Customer,Time to Convert (Days)\n\
             A,2024-03-01 09:00:00,0,CONVERTER,Search,50,Y,0"
        )
        .unwrap();

        let report = AttributionReport::new(AppConfig::default());
        let err = report.run_file(file.path()).unwrap_err();
        assert!(matches!(err, AttributionError::DivideByZero(_)));
    }
}
