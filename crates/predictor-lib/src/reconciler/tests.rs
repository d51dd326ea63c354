//! Integration tests for report reconciliation
//!
//! These tests build profiler reports in memory (and on a temporary
//! filesystem for batch processing) to exercise the full reconcile and
//! aggregate path without the external profiler.

#[cfg(test)]
mod report_tests {
    use crate::error::PowerError;
    use crate::reconciler::{
        write_aggregates, extract_index, MetricReconciler, NormalizationTable, RawMetricsTable,
    };
    use tempfile::TempDir;

    const DESKTOP_CPU: &str = "Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz";
    const HYBRID_CPU: &str = "13th Gen Intel(R) Core(TM) i9-13900K";

    const REPORT: &str = "Function\tCPU Time\tClockticks\tInstructions Retired\tCPI Rate\t\
Retiring(%)\tFront-End Bound(%)\tBad Speculation(%)\tBack-End Bound(%)\tAverage CPU Frequency\t\
Module\tFunction (Full)\tSource File\tStart Address\tSpin Time\n\
main\t1.5\t3000000000\t2000000000\t1.5\t0.4\t0.2\t0.1\t0.3\t3200000000\tapp\tmain()\tmain.c\t0x401000\t0\n\
compute\t0.5\t1000000000\t500000000\t2.0\t0.3\t0.3\t0.1\t0.3\t3100000000\tapp\tcompute(int)\tcompute.c\t0x401200\t0\n";

    fn report() -> RawMetricsTable {
        RawMetricsTable::from_reader(REPORT.as_bytes(), b'\t').unwrap()
    }

    fn col(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_reconcile_selects_and_renames_in_mapping_order() {
        let reconciler = MetricReconciler::default();
        let canonical = reconciler.reconcile(&report(), DESKTOP_CPU).unwrap();

        assert_eq!(
            canonical.column_names(),
            vec![
                "Function / Call Stack",
                "CPU Time",
                "Clockticks",
                "Instructions Retired",
                "CPI Rate",
                "Retiring",
                "Front-End Bound",
                "Bad Speculation",
                "Back-End Bound",
                "Average CPU Frequency",
                "Module",
                "Function (Full)",
                "Source File",
                "Start Address",
            ]
        );
        assert_eq!(canonical.row_count(), 2);
        assert_eq!(canonical.column("Retiring").unwrap(), &["0.4", "0.3"]);
    }

    #[test]
    fn test_reconcile_tolerates_partial_columns() {
        let table = RawMetricsTable::from_reader("Function\tCPI Rate\tOther\nmain\t2\tx\n".as_bytes(), b'\t')
            .unwrap();
        let canonical = MetricReconciler::default().reconcile(&table, DESKTOP_CPU).unwrap();
        assert_eq!(canonical.column_names(), vec!["Function / Call Stack", "CPI Rate"]);
    }

    #[test]
    fn test_no_required_columns_fails_with_available_list() {
        let table = RawMetricsTable::from_reader("Foo\tBar\n1\t2\n".as_bytes(), b'\t').unwrap();
        let err = MetricReconciler::default()
            .reconcile(&table, DESKTOP_CPU)
            .unwrap_err();
        match err {
            PowerError::NoRequiredColumns { available } => {
                assert_eq!(available, vec!["Foo", "Bar"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let table = RawMetricsTable::from_columns(vec![("cpu time", col(&["1"]))]);
        assert!(MetricReconciler::default().reconcile(&table, DESKTOP_CPU).is_err());
    }

    #[test]
    fn test_process_yields_single_row_and_zero_fills() {
        let table = RawMetricsTable::from_columns(vec![
            ("Function", col(&["a", "b", "c"])),
            ("CPI Rate", col(&["29", "garbage", ""])),
        ]);
        let row = MetricReconciler::default()
            .process(&table, DESKTOP_CPU, 1, "run.csv")
            .unwrap();
        assert_eq!(row.index, 1);
        assert_eq!(row.file_name, "run.csv");
        assert_eq!(row.metrics.len(), 1);
        // 29 / 58 * 100 = 50, the other cells contribute nothing
        assert!((row.get("CPI Rate").unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report_aggregates_to_zero() {
        let table = RawMetricsTable::from_reader("Function\tCPU Time\n".as_bytes(), b'\t').unwrap();
        let row = MetricReconciler::default()
            .process(&table, DESKTOP_CPU, 1, "empty.csv")
            .unwrap();
        assert_eq!(row.get("CPU Time"), Some(0.0));
    }

    #[test]
    fn test_label_columns_excluded_from_aggregate() {
        let row = MetricReconciler::default()
            .process(&report(), DESKTOP_CPU, 3, "r.csv")
            .unwrap();
        let names: Vec<&str> = row.metrics.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CPU Time",
                "Clockticks",
                "Instructions Retired",
                "CPI Rate",
                "Retiring",
                "Front-End Bound",
                "Bad Speculation",
                "Back-End Bound",
                "Average CPU Frequency",
            ]
        );
    }

    #[test]
    fn test_l2_aggregate_matches_manual_computation() {
        let row = MetricReconciler::default()
            .process(&report(), DESKTOP_CPU, 1, "r.csv")
            .unwrap();
        let a: f64 = 1.5 / 75.4814 * 100.0;
        let b = 0.5 / 75.4814 * 100.0;
        let expected = (a * a + b * b).sqrt();
        assert!((row.get("CPU Time").unwrap() - expected).abs() < 1e-9);

        let retiring = ((40.0f64).powi(2) + (30.0f64).powi(2)).sqrt();
        assert!((row.get("Retiring").unwrap() - retiring).abs() < 1e-9);
    }

    #[test]
    fn test_single_row_aggregate_is_absolute_normalized_value() {
        let table = RawMetricsTable::from_columns(vec![
            ("Function", col(&["f"])),
            ("Retiring(%)", col(&["-0.25"])),
            ("Spin Time", col(&["-4"])),
        ]);
        let reconciler = MetricReconciler::new(NormalizationTable::default());
        let row = reconciler.process(&table, DESKTOP_CPU, 1, "f.csv").unwrap();
        assert!((row.get("Retiring").unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_doubling_raw_value_doubles_aggregate() {
        let make = |v: &str| {
            RawMetricsTable::from_columns(vec![
                ("Function", col(&["f", "g"])),
                ("Clockticks", col(&[v, v])),
            ])
        };
        let reconciler = MetricReconciler::default();
        let single = reconciler.process(&make("1000000"), DESKTOP_CPU, 1, "a").unwrap();
        let double = reconciler.process(&make("2000000"), DESKTOP_CPU, 1, "a").unwrap();
        let s = single.get("Clockticks").unwrap();
        let d = double.get("Clockticks").unwrap();
        assert!((d - 2.0 * s).abs() < 1e-12);
    }

    fn hybrid_report() -> RawMetricsTable {
        RawMetricsTable::from_columns(vec![
            ("Function", col(&["main", "worker"])),
            ("Retiring(%)", col(&["0.9", "0.9"])),
            ("Performance-core (P-core):Retiring(%)", col(&["0.25", "0.5"])),
            ("Efficient-core (E-core):Retiring(%)", col(&["0.5", "0.25"])),
            ("Performance-core (P-core):Back-End Bound(%)", col(&["0.125", "0.375"])),
        ])
    }

    #[test]
    fn test_hybrid_cpu_merges_core_columns() {
        let canonical = MetricReconciler::default()
            .reconcile(&hybrid_report(), HYBRID_CPU)
            .unwrap();
        assert_eq!(canonical.column("Retiring").unwrap(), &["0.75", "0.75"]);
        // E-core half absent, P-core value used alone
        assert_eq!(canonical.column("Back-End Bound").unwrap(), &["0.125", "0.375"]);
        assert!(!canonical.has_column("Front-End Bound"));
        assert!(!canonical
            .column_names()
            .iter()
            .any(|n| n.starts_with("Performance-core")));
    }

    #[test]
    fn test_hybrid_merge_is_commutative() {
        let swapped = RawMetricsTable::from_columns(vec![
            ("Function", col(&["main", "worker"])),
            ("Efficient-core (E-core):Retiring(%)", col(&["0.25", "0.5"])),
            ("Performance-core (P-core):Retiring(%)", col(&["0.5", "0.25"])),
        ]);
        let reconciler = MetricReconciler::default();
        let a = reconciler.reconcile(&hybrid_report(), HYBRID_CPU).unwrap();
        let b = reconciler.reconcile(&swapped, HYBRID_CPU).unwrap();
        assert_eq!(a.column("Retiring"), b.column("Retiring"));
    }

    #[test]
    fn test_non_hybrid_cpu_uses_single_columns() {
        let canonical = MetricReconciler::default()
            .reconcile(&hybrid_report(), DESKTOP_CPU)
            .unwrap();
        assert_eq!(canonical.column("Retiring").unwrap(), &["0.9", "0.9"]);
        assert!(!canonical.has_column("Back-End Bound"));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let reconciler = MetricReconciler::default();
        for cpu in [DESKTOP_CPU, HYBRID_CPU] {
            let once = reconciler.reconcile(&report(), cpu).unwrap();
            let twice = reconciler.reconcile(&once, cpu).unwrap();
            assert_eq!(once, twice);
        }

        let merged = reconciler.reconcile(&hybrid_report(), HYBRID_CPU).unwrap();
        assert_eq!(reconciler.reconcile(&merged, HYBRID_CPU).unwrap(), merged);
    }

    #[test]
    fn test_canonical_csv_round_trips_through_reconcile() {
        let reconciler = MetricReconciler::default();
        let canonical = reconciler.reconcile(&report(), DESKTOP_CPU).unwrap();

        let mut buf = Vec::new();
        canonical.write_csv(&mut buf).unwrap();
        let reread = RawMetricsTable::from_reader(buf.as_slice(), b',').unwrap();

        let direct = reconciler.aggregate(&canonical, 1, "x.csv");
        let via_csv = reconciler.process(&reread, DESKTOP_CPU, 1, "x.csv").unwrap();
        assert_eq!(direct, via_csv);
    }

    #[test]
    fn test_extract_index() {
        assert_eq!(extract_index("12_run.csv"), Some(12));
        assert_eq!(extract_index("run_12.csv"), None);
        assert_eq!(extract_index("_run.csv"), None);
        assert_eq!(extract_index("run.csv"), None);
    }

    #[test]
    fn test_aggregate_directory_orders_by_prefix_and_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        let canonical = "Function / Call Stack,CPU Time\nmain,1\n";
        std::fs::write(dir.path().join("10_b.csv"), canonical).unwrap();
        std::fs::write(dir.path().join("2_a.csv"), canonical).unwrap();
        std::fs::write(dir.path().join("extra.csv"), canonical).unwrap();
        std::fs::write(dir.path().join("3_bad.csv"), "Foo,Bar\n1,2\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows = MetricReconciler::default()
            .aggregate_directory(dir.path(), DESKTOP_CPU)
            .unwrap();

        let files: Vec<(usize, &str)> = rows.iter().map(|r| (r.index, r.file_name.as_str())).collect();
        assert_eq!(files, vec![(1, "2_a.csv"), (3, "10_b.csv"), (4, "extra.csv")]);
    }

    #[test]
    fn test_write_aggregates_header() {
        let reconciler = MetricReconciler::default();
        let table = RawMetricsTable::from_columns(vec![
            ("Function", col(&["f"])),
            ("CPI Rate", col(&["58"])),
        ]);
        let row = reconciler.process(&table, DESKTOP_CPU, 1, "1_f.csv").unwrap();

        let mut out = Vec::new();
        write_aggregates(&[row], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "index,file_name,CPI Rate\n1,1_f.csv,100\n");
    }
}
