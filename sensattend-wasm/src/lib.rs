//! WebAssembly bindings for SensAttend result history.
//!
//! Lets a browser front end order and label `/results` answers with the same
//! rules as the native client, without any network code.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use sensattend_core::wire::{HistoryRecord, ResultsBody};
use sensattend_core::{format_label, parse_timestamp, ResultHistory};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// One labeled history entry.
#[derive(Serialize)]
pub struct GroupView {
    /// Display label, e.g. `14:05, 3rd Oct 2024`
    pub label: String,
    /// Entry time (RFC 3339, UTC)
    pub timestamp: String,
    /// Recognized roll numbers, possibly empty
    pub matched_roll_numbers: Vec<String>,
}

/// Ordered history, or the reason it was rejected.
#[derive(Serialize)]
pub struct HistoryView {
    pub groups: Vec<GroupView>,
    pub error: Option<String>,
}

/// Label a service timestamp in UTC.
///
/// Returns `undefined` if the timestamp cannot be parsed.
#[wasm_bindgen]
pub fn history_label(iso: &str) -> Option<String> {
    parse_timestamp(iso).ok().map(|ts| format_label(&ts))
}

/// Label a service timestamp at a fixed UTC offset, in minutes east of UTC.
///
/// Pass `-new Date().getTimezoneOffset()` for the browser's local time.
#[wasm_bindgen]
pub fn history_label_with_offset(iso: &str, offset_minutes: i32) -> Option<String> {
    let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
    let ts = parse_timestamp(iso).ok()?;
    Some(format_label(&ts.with_timezone(&offset)))
}

/// Order a `/results` answer newest-first and label every entry in UTC.
///
/// Accepts the `{ "data": [...] }` envelope or a bare array of records.
/// Returns a JSON [`HistoryView`]; a single bad timestamp rejects the batch.
#[wasm_bindgen]
pub fn order_history(json: &str) -> String {
    let view = match order_internal(json) {
        Ok(groups) => HistoryView {
            groups,
            error: None,
        },
        Err(e) => {
            #[cfg(target_arch = "wasm32")]
            web_sys::console::warn_1(&format!("Rejected result history: {e}").into());
            HistoryView {
                groups: Vec::new(),
                error: Some(e),
            }
        }
    };
    serde_json::to_string(&view)
        .unwrap_or_else(|_| r#"{"groups":[],"error":"Unknown error"}"#.to_string())
}

fn order_internal(json: &str) -> Result<Vec<GroupView>, String> {
    let records: Vec<HistoryRecord> = serde_json::from_str::<ResultsBody>(json)
        .map(|body| body.data)
        .or_else(|_| serde_json::from_str(json))
        .map_err(|e| format!("Failed to parse results: {}", e))?;

    let history = ResultHistory::from_records(records).map_err(|e| e.to_string())?;
    Ok(history
        .groups()
        .map(|group| GroupView {
            label: group.label,
            timestamp: rfc3339(group.timestamp),
            matched_roll_numbers: group
                .matched_roll_numbers
                .iter()
                .map(|r| r.to_string())
                .collect(),
        })
        .collect())
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_history_label() {
        assert_eq!(
            history_label("2024-10-03T14:05Z").as_deref(),
            Some("14:05, 3rd Oct 2024")
        );
        assert_eq!(history_label("tomorrow"), None);
    }

    #[test]
    fn test_history_label_with_offset() {
        assert_eq!(
            history_label_with_offset("2024-10-03T20:00Z", 330).as_deref(),
            Some("01:30, 4th Oct 2024")
        );
        assert_eq!(
            history_label_with_offset("2024-10-01T02:00Z", -240).as_deref(),
            Some("22:00, 30th Sep 2024")
        );
        assert_eq!(history_label_with_offset("2024-10-01T02:00Z", 24 * 60), None);
    }

    #[test]
    fn test_order_history_envelope() {
        let json = r#"{"data": [
            {"timeStamp": "2024-10-01T10:00Z", "matched_roll_numbers": ["1"]},
            {"timeStamp": "2024-10-11T10:00Z", "matched_roll_numbers": []},
            {"timeStamp": "2024-10-02T10:00Z", "matched_roll_numbers": [2, "3"]}
        ]}"#;
        let view: Value = serde_json::from_str(&order_history(json)).unwrap();

        assert!(view["error"].is_null());
        let labels: Vec<&str> = view["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["label"].as_str().unwrap())
            .collect();
        assert_eq!(
            labels,
            vec!["10:00, 11th Oct 2024", "10:00, 2nd Oct 2024", "10:00, 1st Oct 2024"]
        );
        assert_eq!(view["groups"][0]["matched_roll_numbers"], serde_json::json!([]));
        assert_eq!(view["groups"][1]["matched_roll_numbers"], serde_json::json!(["2", "3"]));
        assert_eq!(view["groups"][2]["timestamp"], "2024-10-01T10:00:00Z");
    }

    #[test]
    fn test_order_history_bare_array() {
        let json = r#"[{"timeStamp": "2024-10-01T10:00Z", "matched_roll_numbers": ["1"]}]"#;
        let view: Value = serde_json::from_str(&order_history(json)).unwrap();
        assert_eq!(view["groups"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_order_history_rejects_bad_batch() {
        let json = r#"{"data": [
            {"timeStamp": "2024-10-01T10:00Z", "matched_roll_numbers": []},
            {"timeStamp": "someday", "matched_roll_numbers": []}
        ]}"#;
        let view: Value = serde_json::from_str(&order_history(json)).unwrap();
        assert!(view["groups"].as_array().unwrap().is_empty());
        assert!(view["error"].as_str().unwrap().contains("someday"));

        let view: Value = serde_json::from_str(&order_history("not json")).unwrap();
        assert!(view["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse results"));
    }

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }
}
