//! Bridge WASM <-> JavaScript cho lớp trình bày (bảng, biểu đồ).

use platelet_core::{calculate_body_surface_area, MatchConfig, PatientProfile, PlateletError};
use platelet_records::{summarize_records_str, RecordSummary};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsMatchConfig {
    #[serde(default, alias = "pre_window_hours")]
    pre_window_hours: Option<f64>,
    #[serde(default, alias = "post_window_hours")]
    post_window_hours: Option<f64>,
    #[serde(default, alias = "pre_min_gap_hours")]
    pre_min_gap_hours: Option<f64>,
    #[serde(default, alias = "post_min_gap_hours")]
    post_min_gap_hours: Option<f64>,
}

impl From<JsMatchConfig> for MatchConfig {
    fn from(cfg: JsMatchConfig) -> Self {
        let mut base = MatchConfig::default();
        if let Some(hours) = cfg.pre_window_hours {
            base.pre_window_hours = hours;
        }
        if let Some(hours) = cfg.post_window_hours {
            base.post_window_hours = hours;
        }
        if let Some(hours) = cfg.pre_min_gap_hours {
            base.pre_min_gap_hours = hours;
        }
        if let Some(hours) = cfg.post_min_gap_hours {
            base.post_min_gap_hours = hours;
        }
        base
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsPatientProfile {
    weight_kg: f64,
    height_cm: f64,
    units_transfused: f64,
}

impl From<JsPatientProfile> for PatientProfile {
    fn from(profile: JsPatientProfile) -> Self {
        Self {
            weight_kg: profile.weight_kg,
            height_cm: profile.height_cm,
            units_transfused: profile.units_transfused,
        }
    }
}

#[wasm_bindgen(js_name = summarizeRecords)]
pub fn summarize_records(
    transfusion_text: &str,
    count_text: &str,
    profile: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    let summary = summarize_from_js(transfusion_text, count_text, profile, config)?;
    to_value(&summary).map_err(|err| JsValue::from_str(&format!("Không serialize báo cáo: {err}")))
}

/// Như `summarizeRecords` nhưng trả về chuỗi JSON.
#[wasm_bindgen(js_name = summarizeRecordsJson)]
pub fn summarize_records_json(
    transfusion_text: &str,
    count_text: &str,
    profile: JsValue,
    config: Option<JsValue>,
) -> Result<String, JsValue> {
    let summary = summarize_from_js(transfusion_text, count_text, profile, config)?;
    serde_json::to_string(&summary)
        .map_err(|err| JsValue::from_str(&format!("Không serialize báo cáo: {err}")))
}

#[wasm_bindgen(js_name = bodySurfaceArea)]
pub fn body_surface_area(weight_kg: f64, height_cm: f64) -> Result<f64, JsValue> {
    calculate_body_surface_area(weight_kg, height_cm)
        .map_err(|err| JsValue::from_str(&format_platelet_error(err)))
}

fn summarize_from_js(
    transfusion_text: &str,
    count_text: &str,
    profile: JsValue,
    config: Option<JsValue>,
) -> Result<RecordSummary, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let profile: JsPatientProfile = from_value(profile)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được thông tin bệnh nhân: {err}")))?;

    let cfg = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsMatchConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            MatchConfig::from(cfg)
        }
        _ => MatchConfig::default(),
    };

    summarize_records_str(transfusion_text, count_text, &profile.into(), &cfg)
        .map_err(|err| JsValue::from_str(&format_platelet_error(err)))
}

fn format_platelet_error(err: PlateletError) -> String {
    format!("Platelet error: {err}")
}
