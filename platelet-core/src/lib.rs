//! Logic lõi ghép cặp truyền tiểu cầu với xét nghiệm và tính CCI.

use std::ops::Deref;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub mod matcher;
pub mod metric;

pub use matcher::{find_closest_measurement, match_transfusions, SearchDirection};
pub use metric::{
    calculate_body_surface_area, calculate_cci, Adequacy, ADEQUATE_CCI_THRESHOLD,
};

/// Cấu hình cửa sổ thời gian khi tìm xét nghiệm trước/sau truyền.
///
/// Luôn được truyền tường minh vào mỗi lần tính, không đọc từ trạng thái toàn cục.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    /// Khoảng lùi tối đa (giờ) để tìm xét nghiệm nền trước truyền.
    #[serde(alias = "preWindowHours")]
    pub pre_window_hours: f64,
    /// Khoảng tiến tối đa (giờ) để tìm xét nghiệm sau truyền.
    #[serde(alias = "postWindowHours")]
    pub post_window_hours: f64,
    /// Khoảng cách tối thiểu (giờ) của xét nghiệm trước truyền.
    #[serde(alias = "preMinGapHours")]
    pub pre_min_gap_hours: f64,
    /// Khoảng cách tối thiểu (giờ) của xét nghiệm sau truyền.
    #[serde(alias = "postMinGapHours")]
    pub post_min_gap_hours: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            pre_window_hours: 36.0,
            post_window_hours: 2.0,
            pre_min_gap_hours: 0.0,
            post_min_gap_hours: 0.0,
        }
    }
}

impl MatchConfig {
    /// Kiểm tra cấu hình: cửa sổ phải dương, khoảng tối thiểu không âm và không vượt cửa sổ.
    pub fn validate(&self) -> Result<(), PlateletError> {
        check_window("pre_window_hours", self.pre_window_hours, self.pre_min_gap_hours)?;
        check_window("post_window_hours", self.post_window_hours, self.post_min_gap_hours)
    }

    /// Chuyển cấu hình sang cửa sổ dạng `Duration` đã kiểm tra.
    pub fn windows(&self) -> Result<MatchWindows, PlateletError> {
        self.validate()?;
        Ok(MatchWindows {
            pre: SearchWindow::new(
                hours_to_duration(self.pre_min_gap_hours)?,
                hours_to_duration(self.pre_window_hours)?,
            ),
            post: SearchWindow::new(
                hours_to_duration(self.post_min_gap_hours)?,
                hours_to_duration(self.post_window_hours)?,
            ),
        })
    }
}

fn check_window(name: &str, window: f64, min_gap: f64) -> Result<(), PlateletError> {
    if !window.is_finite() || window <= 0.0 {
        return Err(PlateletError::InvalidInput(format!(
            "{name} phải là số dương, nhận {window}"
        )));
    }
    if !min_gap.is_finite() || min_gap < 0.0 || min_gap > window {
        return Err(PlateletError::InvalidInput(format!(
            "khoảng tối thiểu cho {name} phải nằm trong [0, {window}], nhận {min_gap}"
        )));
    }
    Ok(())
}

fn hours_to_duration(hours: f64) -> Result<Duration, PlateletError> {
    let millis = (hours * 3_600_000.0).round();
    if millis >= i64::MAX as f64 {
        return Err(PlateletError::InvalidInput(format!(
            "cửa sổ {hours} giờ quá lớn"
        )));
    }
    Duration::try_milliseconds(millis as i64)
        .ok_or_else(|| PlateletError::InvalidInput(format!("cửa sổ {hours} giờ quá lớn")))
}

/// Khoảng cách cho phép giữa mốc tham chiếu và xét nghiệm ứng viên.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub min_gap: Duration,
    pub max_gap: Duration,
}

impl SearchWindow {
    pub fn new(min_gap: Duration, max_gap: Duration) -> Self {
        Self { min_gap, max_gap }
    }

    /// Cửa sổ chỉ giới hạn khoảng cách tối đa.
    pub fn up_to(max_gap: Duration) -> Self {
        Self::new(Duration::zero(), max_gap)
    }

    /// Khoảng cách `gap` có hợp lệ không. Mốc trùng (gap = 0) luôn bị loại.
    pub fn admits(&self, gap: Duration) -> bool {
        gap > Duration::zero() && gap >= self.min_gap && gap <= self.max_gap
    }
}

/// Cặp cửa sổ trước/sau dùng cho một lần ghép.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindows {
    pub pre: SearchWindow,
    pub post: SearchWindow,
}

/// Thông tin bệnh nhân cần cho công thức CCI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub units_transfused: f64,
}

impl PatientProfile {
    /// Tính BSA và kiểm tra số đơn vị truyền.
    pub fn dosing(&self) -> Result<Dosing, PlateletError> {
        let body_surface_area = calculate_body_surface_area(self.weight_kg, self.height_cm)?;
        if !(self.units_transfused > 0.0) {
            return Err(PlateletError::InvalidInput(format!(
                "số đơn vị truyền phải dương, nhận {}",
                self.units_transfused
            )));
        }
        Ok(Dosing {
            body_surface_area,
            units_transfused: self.units_transfused,
        })
    }
}

/// Tham số chuẩn hoá đã kiểm tra (BSA, số đơn vị).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dosing {
    pub body_surface_area: f64,
    pub units_transfused: f64,
}

/// Nhãn xét nghiệm tiểu cầu xuất hiện trong văn bản.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CountLabel {
    Plt,
    Platelets,
}

/// Một kết quả đếm tiểu cầu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub date: NaiveDate,
    pub clock_time: NaiveTime,
    pub value: u32,
    pub label: CountLabel,
    /// Chú thích trong ngoặc sau nhãn, ví dụ `citrate`.
    pub qualifier: Option<String>,
    pub instant: NaiveDateTime,
}

/// Một lần truyền tiểu cầu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransfusionEvent {
    pub date: NaiveDate,
    pub start_clock_time: NaiveTime,
    pub end_clock_time: NaiveTime,
    pub start_instant: NaiveDateTime,
    pub end_instant: NaiveDateTime,
}

impl TransfusionEvent {
    /// Mốc tham chiếu khi ghép xét nghiệm: thời điểm kết thúc truyền.
    pub fn reference_instant(&self) -> NaiveDateTime {
        self.end_instant
    }

    pub fn duration(&self) -> Duration {
        self.end_instant.signed_duration_since(self.start_instant)
    }
}

/// Chuỗi xét nghiệm luôn được sắp xếp tăng dần theo `instant`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "Vec<Measurement>", into = "Vec<Measurement>")]
pub struct MeasurementSeries(Vec<Measurement>);

impl MeasurementSeries {
    /// Sắp xếp ổn định theo thời điểm; các bản ghi trùng giờ giữ thứ tự gốc.
    pub fn new(mut measurements: Vec<Measurement>) -> Self {
        measurements.sort_by_key(|measurement| measurement.instant);
        Self(measurements)
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.0
    }
}

impl From<Vec<Measurement>> for MeasurementSeries {
    fn from(measurements: Vec<Measurement>) -> Self {
        Self::new(measurements)
    }
}

impl From<MeasurementSeries> for Vec<Measurement> {
    fn from(series: MeasurementSeries) -> Self {
        series.0
    }
}

impl FromIterator<Measurement> for MeasurementSeries {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Deref for MeasurementSeries {
    type Target = [Measurement];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Kết quả ghép của một lần truyền.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedResult {
    pub transfusion: TransfusionEvent,
    pub pre_measurement: Option<Measurement>,
    pub post_measurement: Option<Measurement>,
    /// Chỉ có khi có đủ cả xét nghiệm trước và sau.
    pub cci: Option<f64>,
    pub adequacy: Option<Adequacy>,
}

impl MatchedResult {
    /// Dựng kết quả, tính CCI nếu đủ cặp trước/sau.
    pub fn new(
        transfusion: TransfusionEvent,
        pre_measurement: Option<Measurement>,
        post_measurement: Option<Measurement>,
        dosing: &Dosing,
    ) -> Result<Self, PlateletError> {
        let cci = match (&pre_measurement, &post_measurement) {
            (Some(pre), Some(post)) => Some(calculate_cci(
                f64::from(post.value),
                f64::from(pre.value),
                dosing.body_surface_area,
                dosing.units_transfused,
            )?),
            _ => None,
        };

        Ok(Self {
            transfusion,
            pre_measurement,
            post_measurement,
            cci,
            adequacy: cci.map(Adequacy::classify),
        })
    }

    /// Số phút từ lúc kết thúc truyền tới xét nghiệm sau.
    pub fn post_delay_minutes(&self) -> Option<i64> {
        self.post_measurement.as_ref().map(|post| {
            post.instant
                .signed_duration_since(self.transfusion.reference_instant())
                .num_minutes()
        })
    }
}

/// Đếm kết quả theo phân loại.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub adequate: usize,
    pub inadequate: usize,
    /// Các lần truyền thiếu xét nghiệm trước hoặc sau nên không có CCI.
    pub unmatched: usize,
}

impl ReportSummary {
    pub fn from_results(results: &[MatchedResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut summary, result| {
                match result.adequacy {
                    Some(Adequacy::Adequate) => summary.adequate += 1,
                    Some(Adequacy::Inadequate) => summary.inadequate += 1,
                    None => summary.unmatched += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.adequate + self.inadequate + self.unmatched
    }
}

/// Kết quả tổng hợp cuối cùng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransfusionReport {
    pub dosing: Dosing,
    pub results: Vec<MatchedResult>,
    pub summary: ReportSummary,
}

impl TransfusionReport {
    /// Khởi tạo báo cáo; giữ nguyên thứ tự các lần truyền.
    pub fn new(dosing: Dosing, results: Vec<MatchedResult>) -> Self {
        let summary = ReportSummary::from_results(&results);
        Self {
            dosing,
            results,
            summary,
        }
    }

    pub fn adequate(&self) -> impl Iterator<Item = &MatchedResult> {
        self.results
            .iter()
            .filter(|result| result.adequacy == Some(Adequacy::Adequate))
    }

    pub fn inadequate(&self) -> impl Iterator<Item = &MatchedResult> {
        self.results
            .iter()
            .filter(|result| result.adequacy == Some(Adequacy::Inadequate))
    }
}

/// Lỗi chung khi phân tích và tính toán.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlateletError {
    #[error("Không đọc được ngày giờ `{input}`: {reason}")]
    Parse { input: String, reason: String },
    #[error("Dữ liệu đầu vào không hợp lệ: {0}")]
    InvalidInput(String),
}
