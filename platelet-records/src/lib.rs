//! Free-text transfusion / platelet count records to `TransfusionReport` converter.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Captures;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use platelet_core::{
    match_transfusions, CountLabel, MatchConfig, Measurement, MeasurementSeries, PatientProfile,
    PlateletError, TransfusionEvent, TransfusionReport,
};

pub mod grammar;

/// A record that matched the grammar but could not be converted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedRecord {
    /// 1-based line where the record starts.
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Records converted under the skip-and-continue policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan<T> {
    pub records: T,
    pub skipped: Vec<SkippedRecord>,
}

/// Report plus the records dropped while parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSummary {
    pub report: TransfusionReport,
    #[serde(default)]
    pub skipped: Vec<SkippedRecord>,
}

/// Parse transfusion intervals in text order. Stops at the first malformed record.
pub fn parse_transfusions(text: &str) -> Result<Vec<TransfusionEvent>, PlateletError> {
    transfusion_records(text)
        .map(|(_, result)| result)
        .collect()
}

/// Parse platelet counts, sorted by instant. Stops at the first malformed record.
pub fn parse_platelet_counts(text: &str) -> Result<MeasurementSeries, PlateletError> {
    count_records(text).map(|(_, result)| result).collect()
}

/// Like [`parse_transfusions`] but skips malformed records.
pub fn scan_transfusions(text: &str) -> Scan<Vec<TransfusionEvent>> {
    let (records, skipped) = partition_records(text, transfusion_records(text));
    Scan { records, skipped }
}

/// Like [`parse_platelet_counts`] but skips malformed records.
pub fn scan_platelet_counts(text: &str) -> Scan<MeasurementSeries> {
    let (records, skipped) = partition_records(text, count_records(text));
    Scan {
        records: MeasurementSeries::new(records),
        skipped,
    }
}

/// Build a report, skipping malformed records (each is logged and listed in `skipped`).
pub fn summarize_records_str(
    transfusion_text: &str,
    count_text: &str,
    profile: &PatientProfile,
    config: &MatchConfig,
) -> Result<RecordSummary, PlateletError> {
    let transfusions = scan_transfusions(transfusion_text);
    let counts = scan_platelet_counts(count_text);

    let mut skipped = transfusions.skipped;
    skipped.extend(counts.skipped);
    for record in &skipped {
        warn!(line = record.line, reason = %record.reason, "skipping malformed record");
    }

    let report = build_report(&transfusions.records, &counts.records, profile, config)?;
    Ok(RecordSummary { report, skipped })
}

/// Build a report, failing on the first malformed record.
pub fn summarize_records_strict(
    transfusion_text: &str,
    count_text: &str,
    profile: &PatientProfile,
    config: &MatchConfig,
) -> Result<TransfusionReport, PlateletError> {
    let transfusions = parse_transfusions(transfusion_text)?;
    let counts = parse_platelet_counts(count_text)?;
    build_report(&transfusions, &counts, profile, config)
}

fn build_report(
    transfusions: &[TransfusionEvent],
    counts: &MeasurementSeries,
    profile: &PatientProfile,
    config: &MatchConfig,
) -> Result<TransfusionReport, PlateletError> {
    let windows = config.windows()?;
    let dosing = profile.dosing()?;
    debug!(
        transfusions = transfusions.len(),
        counts = counts.len(),
        bsa = dosing.body_surface_area,
        "matching transfusions against platelet counts"
    );

    let results = match_transfusions(transfusions, counts, &windows, &dosing)?;
    let report = TransfusionReport::new(dosing, results);
    debug!(
        adequate = report.summary.adequate,
        inadequate = report.summary.inadequate,
        unmatched = report.summary.unmatched,
        "report ready"
    );
    Ok(report)
}

/// Convert `MM/DD/YY` + clock time into an instant. Years map to `20YY`.
pub fn parse_date_time(date: &str, time: &str) -> Result<NaiveDateTime, PlateletError> {
    Ok(parse_record_date(date)?.and_time(parse_clock_time(time)?))
}

/// `MM/DD/YY`, century fixed to 2000.
pub fn parse_record_date(date: &str) -> Result<NaiveDate, PlateletError> {
    let parts: Vec<&str> = date.trim().split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        return Err(parse_error(date, "expected MM/DD/YY"));
    };

    let month = parse_component(date, month, "month")?;
    let day = parse_component(date, day, "day")?;
    let year = parse_component(date, year, "year")?;
    if year > 99 {
        return Err(parse_error(date, "year must have two digits"));
    }

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| parse_error(date, "not a calendar date"))
}

/// `HH:MM`, `H:MM`, `HHMM` or `HMM`.
pub fn parse_clock_time(time: &str) -> Result<NaiveTime, PlateletError> {
    let trimmed = time.trim();
    let (hours, minutes) = match trimmed.split_once(':') {
        Some(parts) => parts,
        None if matches!(trimmed.len(), 3 | 4) && trimmed.is_ascii() => {
            trimmed.split_at(trimmed.len() - 2)
        }
        None => return Err(parse_error(time, "expected HH:MM or HHMM")),
    };

    let hours = parse_component(time, hours, "hour")?;
    let minutes = parse_component(time, minutes, "minute")?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
        .ok_or_else(|| parse_error(time, "not a clock time"))
}

fn parse_component(input: &str, part: &str, name: &str) -> Result<u32, PlateletError> {
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_error(input, &format!("invalid {name} `{part}`")));
    }
    part.parse::<u32>()
        .map_err(|err| parse_error(input, &format!("invalid {name}: {err}")))
}

fn parse_error(input: &str, reason: &str) -> PlateletError {
    PlateletError::Parse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

type Located<T> = (usize, Result<T, PlateletError>);

fn transfusion_records(text: &str) -> impl Iterator<Item = Located<TransfusionEvent>> + '_ {
    grammar::TRANSFUSION
        .captures_iter(text)
        .map(|caps| (match_start(&caps), transfusion_from_captures(&caps)))
}

fn count_records(text: &str) -> impl Iterator<Item = Located<Measurement>> + '_ {
    grammar::PLATELET_COUNT
        .captures_iter(text)
        .map(|caps| (match_start(&caps), measurement_from_captures(&caps)))
}

fn match_start(caps: &Captures<'_>) -> usize {
    caps.get(0).map(|m| m.start()).unwrap_or_default()
}

fn transfusion_from_captures(caps: &Captures<'_>) -> Result<TransfusionEvent, PlateletError> {
    let date = parse_record_date(&caps["date"])?;
    let start_clock_time = parse_clock_time(&caps["start"])?;
    let end_clock_time = parse_clock_time(&caps["end"])?;

    let start_instant = date.and_time(start_clock_time);
    let mut end_instant = date.and_time(end_clock_time);
    // Overnight infusion: the record date belongs to the start.
    if end_clock_time < start_clock_time {
        end_instant += Duration::days(1);
    }

    Ok(TransfusionEvent {
        date,
        start_clock_time,
        end_clock_time,
        start_instant,
        end_instant,
    })
}

fn measurement_from_captures(caps: &Captures<'_>) -> Result<Measurement, PlateletError> {
    let date = parse_record_date(&caps["date"])?;
    let clock_time = parse_clock_time(&caps["time"])?;
    let value = caps["value"]
        .parse::<u32>()
        .map_err(|err| parse_error(&caps["value"], &format!("invalid platelet count: {err}")))?;
    let label = match &caps["label"] {
        "PLT" => CountLabel::Plt,
        _ => CountLabel::Platelets,
    };
    let qualifier = caps
        .name("qualifier")
        .map(|m| m.as_str().trim().to_string())
        .filter(|q| !q.is_empty());

    Ok(Measurement {
        date,
        clock_time,
        value,
        label,
        qualifier,
        instant: date.and_time(clock_time),
    })
}

fn partition_records<T>(
    text: &str,
    records: impl Iterator<Item = Located<T>>,
) -> (Vec<T>, Vec<SkippedRecord>) {
    let mut parsed = Vec::new();
    let mut skipped = Vec::new();

    for (offset, result) in records {
        match result {
            Ok(record) => parsed.push(record),
            Err(err) => skipped.push(SkippedRecord {
                line: line_number(text, offset),
                text: first_line(&text[offset..]).to_string(),
                reason: err.to_string(),
            }),
        }
    }

    (parsed, skipped)
}

fn line_number(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim_end()
}
