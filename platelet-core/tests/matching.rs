use chrono::{Duration, NaiveDate, NaiveDateTime};
use platelet_core::{
    calculate_body_surface_area, calculate_cci, find_closest_measurement, match_transfusions,
    CountLabel, Dosing, MatchConfig, Measurement, MeasurementSeries, ReportSummary,
    SearchDirection, SearchWindow, TransfusionEvent, TransfusionReport,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 10)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .expect("mốc thời gian hợp lệ")
}

fn count_at(instant: NaiveDateTime, value: u32) -> Measurement {
    Measurement {
        date: instant.date(),
        clock_time: instant.time(),
        value,
        label: CountLabel::Platelets,
        qualifier: None,
        instant,
    }
}

fn transfusion_ending_at(end: NaiveDateTime) -> TransfusionEvent {
    let start = end - Duration::minutes(45);
    TransfusionEvent {
        date: start.date(),
        start_clock_time: start.time(),
        end_clock_time: end.time(),
        start_instant: start,
        end_instant: end,
    }
}

fn linear_scan(
    series: &MeasurementSeries,
    reference: NaiveDateTime,
    window: &SearchWindow,
    direction: SearchDirection,
) -> Option<NaiveDateTime> {
    series
        .iter()
        .filter_map(|m| {
            let gap = match direction {
                SearchDirection::Before => reference - m.instant,
                SearchDirection::After => m.instant - reference,
            };
            window.admits(gap).then_some((gap, m.instant))
        })
        .min_by_key(|(gap, _)| *gap)
        .map(|(_, instant)| instant)
}

#[test]
fn post_match_inside_two_hour_window() {
    let series = MeasurementSeries::new(vec![count_at(t0(), 50_000)]);
    let reference = t0() - Duration::minutes(90);
    let window = SearchWindow::up_to(Duration::hours(2));

    let found = find_closest_measurement(&series, reference, &window, SearchDirection::After)
        .expect("phải tìm thấy xét nghiệm sau");
    assert_eq!(found.value, 50_000);
}

#[test]
fn post_match_outside_two_hour_window_is_none() {
    let series = MeasurementSeries::new(vec![count_at(t0(), 50_000)]);
    let reference = t0() - Duration::hours(3);
    let window = SearchWindow::up_to(Duration::hours(2));

    assert!(find_closest_measurement(&series, reference, &window, SearchDirection::After).is_none());
}

#[test]
fn unconfirmed_boundary_rule_reference_instant_excluded_window_edge_included() {
    let series = MeasurementSeries::new(vec![
        count_at(t0() - Duration::hours(36), 10),
        count_at(t0(), 20),
        count_at(t0() + Duration::hours(2), 30),
    ]);
    let windows = MatchConfig::default().windows().expect("cấu hình mặc định hợp lệ");

    let pre = find_closest_measurement(&series, t0(), &windows.pre, SearchDirection::Before);
    let post = find_closest_measurement(&series, t0(), &windows.post, SearchDirection::After);
    assert_eq!(pre.map(|m| m.value), Some(10));
    assert_eq!(post.map(|m| m.value), Some(30));
}

#[test]
fn transfusion_without_counts_is_unmatched() {
    let series = MeasurementSeries::new(vec![
        count_at(t0() - Duration::hours(48), 15),
        count_at(t0() + Duration::hours(5), 40),
    ]);
    let dosing = Dosing {
        body_surface_area: 2.0,
        units_transfused: 1.0,
    };
    let windows = MatchConfig::default().windows().expect("cấu hình mặc định hợp lệ");
    let transfusions = vec![transfusion_ending_at(t0())];

    let results = match_transfusions(&transfusions, &series, &windows, &dosing)
        .expect("ghép không lỗi");
    assert_eq!(results.len(), 1);
    assert!(results[0].pre_measurement.is_none());
    assert!(results[0].post_measurement.is_none());
    assert!(results[0].cci.is_none());

    let report = TransfusionReport::new(dosing, results);
    assert_eq!(
        report.summary,
        ReportSummary {
            adequate: 0,
            inadequate: 0,
            unmatched: 1,
        }
    );
}

#[test]
fn report_counts_each_classification() {
    let end_a = t0();
    let end_b = t0() + Duration::hours(24);
    let end_c = t0() + Duration::hours(96);
    let series = MeasurementSeries::new(vec![
        count_at(end_a - Duration::hours(3), 10),
        count_at(end_a + Duration::minutes(60), 20),
        count_at(end_b - Duration::hours(2), 30),
        count_at(end_b + Duration::minutes(30), 31),
        count_at(end_c + Duration::minutes(15), 50),
    ]);
    let dosing = Dosing {
        body_surface_area: 2.0,
        units_transfused: 1.0,
    };
    let windows = MatchConfig::default().windows().expect("cấu hình mặc định hợp lệ");
    let transfusions = vec![
        transfusion_ending_at(end_a),
        transfusion_ending_at(end_b),
        transfusion_ending_at(end_c),
    ];

    let results = match_transfusions(&transfusions, &series, &windows, &dosing)
        .expect("ghép không lỗi");
    assert_eq!(results[0].cci, Some(20_000.0));
    assert_eq!(results[1].cci, Some(2_000.0));
    assert_eq!(results[2].cci, None);
    assert_eq!(results[2].post_measurement.as_ref().map(|m| m.value), Some(50));

    let report = TransfusionReport::new(dosing, results);
    assert_eq!(report.summary.adequate, 1);
    assert_eq!(report.summary.inadequate, 1);
    assert_eq!(report.summary.unmatched, 1);
    assert_eq!(report.summary.total(), 3);
}

fn series_strategy() -> impl Strategy<Value = MeasurementSeries> {
    prop::collection::vec((-4_000i64..4_000, 0u32..500), 0..40).prop_map(|points| {
        points
            .into_iter()
            .map(|(offset, value)| count_at(t0() + Duration::minutes(offset), value))
            .collect()
    })
}

proptest! {
    #[test]
    fn closest_measurement_respects_direction(
        series in series_strategy(),
        window_minutes in 1i64..3_000,
    ) {
        let window = SearchWindow::up_to(Duration::minutes(window_minutes));
        if let Some(m) = find_closest_measurement(&series, t0(), &window, SearchDirection::Before) {
            prop_assert!(m.instant < t0());
        }
        if let Some(m) = find_closest_measurement(&series, t0(), &window, SearchDirection::After) {
            prop_assert!(m.instant > t0());
        }
    }

    #[test]
    fn early_exit_scan_agrees_with_linear_scan(
        series in series_strategy(),
        min_minutes in 0i64..120,
        extra_minutes in 1i64..3_000,
    ) {
        let window = SearchWindow::new(
            Duration::minutes(min_minutes),
            Duration::minutes(min_minutes + extra_minutes),
        );
        for direction in [SearchDirection::Before, SearchDirection::After] {
            let fast = find_closest_measurement(&series, t0(), &window, direction)
                .map(|m| m.instant);
            prop_assert_eq!(fast, linear_scan(&series, t0(), &window, direction));
        }
    }

    #[test]
    fn body_surface_area_increases_with_each_argument(
        weight in 1.0f64..300.0,
        height in 30.0f64..250.0,
        delta in 0.5f64..50.0,
    ) {
        let base = calculate_body_surface_area(weight, height).unwrap();
        prop_assert!(calculate_body_surface_area(weight + delta, height).unwrap() > base);
        prop_assert!(calculate_body_surface_area(weight, height + delta).unwrap() > base);
    }

    #[test]
    fn cci_reconstructs_target_value(
        target in -50_000.0f64..200_000.0,
        pre in 0.0f64..500.0,
        bsa in 0.5f64..3.0,
        units in 1.0f64..8.0,
    ) {
        let post = pre + target * units / (1000.0 * bsa);
        prop_assume!(post >= 0.0);
        let cci = calculate_cci(post, pre, bsa, units).unwrap();
        prop_assert!((cci - target).abs() <= 1e-6 * target.abs().max(1.0));
    }
}
