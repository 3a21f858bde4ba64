//! End-to-end: config file → simulated calibration → report on disk.

use adapter_device::CancelToken;
use serde_json::Value;
use service_cli::config::{build_config, CliArgs};
use service_cli::{calibrate, report};
use std::fs;
use std::io::Write;

fn marker(summary: &Value, capture: &str, label: &str) -> f64 {
    let capture = summary["captures"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == capture)
        .unwrap_or_else(|| panic!("no capture {capture}"));
    capture["markers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["label"] == label)
        .and_then(|m| m["level_dbfs"].as_f64())
        .unwrap_or_else(|| panic!("no marker {label} in {capture}"))
}

#[test]
fn test_calibration_report_shows_suppressed_spurs() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("loopcal.toml");
    let mut file = fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        r#"
args = "driver=sim,seed=5"

[calibration]
samples_per_capture = 10000
bins_per_fft = 1000
"#
    )
    .unwrap();

    let cli = CliArgs {
        config_file: Some(config_path),
        report_dir: Some(dir.path().join("report")),
        ..Default::default()
    };
    let config = build_config(&cli).unwrap();
    let outcome = calibrate::run(&config, 2.1e9, &CancelToken::new()).unwrap();
    let paths = report::write_report(&config.report_dir, &config.calibration_config(), &outcome).unwrap();

    let summary: Value = serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
    assert_eq!(summary["freq_hz"], 2.1e9);

    for ch in ["a", "b"] {
        let rx_before = marker(&summary, &format!("rx_initial_{ch}"), "Rx imbal");
        let rx_after = marker(&summary, &format!("rx_final_{ch}"), "Rx imbal");
        assert!(rx_after < rx_before - 20.0, "Rx {ch}: {rx_before} -> {rx_after}");

        let tx_before = marker(&summary, &format!("tx_initial_{ch}"), "Tx imbal");
        let tx_after = marker(&summary, &format!("tx_final_{ch}"), "Tx imbal");
        assert!(tx_after < tx_before - 20.0, "Tx {ch}: {tx_before} -> {tx_after}");

        let dc_before = marker(&summary, &format!("tx_initial_{ch}"), "Tx dc");
        let dc_after = marker(&summary, &format!("tx_final_{ch}"), "Tx dc");
        assert!(dc_after < dc_before - 15.0, "DC {ch}: {dc_before} -> {dc_after}");
    }

    let mut reader = csv::Reader::from_path(&paths.spectrum).unwrap();
    assert_eq!(reader.records().count(), 1000);
}
