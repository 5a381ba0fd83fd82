//! Tìm xét nghiệm gần nhất trước/sau một mốc thời gian.

use chrono::NaiveDateTime;

use crate::{
    Dosing, MatchWindows, MatchedResult, Measurement, MeasurementSeries, PlateletError,
    SearchWindow, TransfusionEvent,
};

/// Hướng tìm kiếm so với mốc tham chiếu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Xét nghiệm nền, trước mốc.
    Before,
    /// Xét nghiệm đáp ứng, sau mốc.
    After,
}

/// Xét nghiệm gần `reference` nhất theo `direction` mà khoảng cách nằm trong `window`.
///
/// Xét nghiệm trùng đúng mốc bị loại ở cả hai hướng, biên tối đa được tính là hợp lệ.
/// Dựa vào thứ tự tăng dần của `series`: tìm nhị phân vị trí mốc rồi quét ra ngoài,
/// dừng khi vượt `max_gap`.
pub fn find_closest_measurement<'a>(
    series: &'a MeasurementSeries,
    reference: NaiveDateTime,
    window: &SearchWindow,
    direction: SearchDirection,
) -> Option<&'a Measurement> {
    let measurements = series.as_slice();
    match direction {
        SearchDirection::Before => {
            let end = measurements.partition_point(|m| m.instant < reference);
            measurements[..end]
                .iter()
                .rev()
                .take_while(|m| reference.signed_duration_since(m.instant) <= window.max_gap)
                .find(|m| window.admits(reference.signed_duration_since(m.instant)))
        }
        SearchDirection::After => {
            let start = measurements.partition_point(|m| m.instant <= reference);
            measurements[start..]
                .iter()
                .take_while(|m| m.instant.signed_duration_since(reference) <= window.max_gap)
                .find(|m| window.admits(m.instant.signed_duration_since(reference)))
        }
    }
}

/// Ghép mỗi lần truyền với xét nghiệm trước/sau và tính CCI khi đủ cặp.
///
/// Kết quả giữ thứ tự của `transfusions`.
pub fn match_transfusions(
    transfusions: &[TransfusionEvent],
    series: &MeasurementSeries,
    windows: &MatchWindows,
    dosing: &Dosing,
) -> Result<Vec<MatchedResult>, PlateletError> {
    transfusions
        .iter()
        .map(|transfusion| {
            let reference = transfusion.reference_instant();
            let pre = find_closest_measurement(
                series,
                reference,
                &windows.pre,
                SearchDirection::Before,
            );
            let post = find_closest_measurement(
                series,
                reference,
                &windows.post,
                SearchDirection::After,
            );
            MatchedResult::new(transfusion.clone(), pre.cloned(), post.cloned(), dosing)
        })
        .collect()
}
