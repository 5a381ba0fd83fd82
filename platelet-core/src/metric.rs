//! Công thức BSA (Mosteller) và CCI.

use serde::{Deserialize, Serialize};

use crate::PlateletError;

/// Ngưỡng CCI coi là đáp ứng đạt. Hằng số lâm sàng, không cấu hình.
pub const ADEQUATE_CCI_THRESHOLD: f64 = 7500.0;

/// Phân loại đáp ứng sau truyền.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Adequacy {
    Adequate,
    Inadequate,
}

impl Adequacy {
    pub fn classify(cci: f64) -> Self {
        if cci >= ADEQUATE_CCI_THRESHOLD {
            Self::Adequate
        } else {
            Self::Inadequate
        }
    }
}

/// Diện tích da (m²) theo Mosteller: `sqrt(height * weight / 3600)`.
pub fn calculate_body_surface_area(weight_kg: f64, height_cm: f64) -> Result<f64, PlateletError> {
    if !(weight_kg > 0.0) || !(height_cm > 0.0) {
        return Err(PlateletError::InvalidInput(format!(
            "cân nặng và chiều cao phải dương, nhận {weight_kg} kg / {height_cm} cm"
        )));
    }
    Ok(((height_cm * weight_kg) / 3600.0).sqrt())
}

/// CCI = `(post - pre) * 1000 * bsa / units`. Kết quả âm vẫn hợp lệ.
pub fn calculate_cci(
    post_value: f64,
    pre_value: f64,
    body_surface_area: f64,
    units_transfused: f64,
) -> Result<f64, PlateletError> {
    if !(post_value >= 0.0) || !(pre_value >= 0.0) {
        return Err(PlateletError::InvalidInput(format!(
            "số lượng tiểu cầu không được âm, nhận trước {pre_value} / sau {post_value}"
        )));
    }
    if !(body_surface_area > 0.0) || !(units_transfused > 0.0) {
        return Err(PlateletError::InvalidInput(format!(
            "BSA và số đơn vị phải dương, nhận {body_surface_area} / {units_transfused}"
        )));
    }
    Ok(((post_value - pre_value) * 1000.0 * body_surface_area) / units_transfused)
}
