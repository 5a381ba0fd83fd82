use std::fs;

use platelet_core::{MatchConfig, PatientProfile};
use platelet_records::{summarize_records_str, summarize_records_strict};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được dữ liệu mẫu")
}

fn reference_patient() -> PatientProfile {
    PatientProfile {
        weight_kg: 80.0,
        height_cm: 180.0,
        units_transfused: 1.0,
    }
}

#[test]
fn records_match_golden_report() {
    let summary = summarize_records_str(
        &read_fixture("transfusions.txt"),
        &read_fixture("platelet_counts.txt"),
        &reference_patient(),
        &MatchConfig::default(),
    )
    .expect("Không tạo được báo cáo");

    let actual = serde_json::to_value(summary).expect("Không serialize báo cáo");
    let expected: Value =
        serde_json::from_str(&read_fixture("expected_report.json")).expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn strict_mode_rejects_malformed_fixture() {
    let result = summarize_records_strict(
        &read_fixture("transfusions.txt"),
        &read_fixture("platelet_counts.txt"),
        &reference_patient(),
        &MatchConfig::default(),
    );
    assert!(result.is_err());
}

#[test]
fn narrower_post_window_drops_late_count() {
    let config = MatchConfig {
        post_window_hours: 0.5,
        ..MatchConfig::default()
    };
    let summary = summarize_records_str(
        &read_fixture("transfusions.txt"),
        &read_fixture("platelet_counts.txt"),
        &reference_patient(),
        &config,
    )
    .expect("Không tạo được báo cáo");

    assert_eq!(summary.report.summary.adequate, 0);
    assert_eq!(summary.report.summary.inadequate, 0);
    assert_eq!(summary.report.summary.unmatched, 3);
    assert!(summary.report.results[0].pre_measurement.is_some());
}

#[test]
fn invalid_profile_is_rejected() {
    let profile = PatientProfile {
        weight_kg: -1.0,
        ..reference_patient()
    };
    let result = summarize_records_str("", "", &profile, &MatchConfig::default());
    assert!(result.is_err());
}
