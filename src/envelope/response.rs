//! Response envelopes read from a skill module's stdout.
//!
//! Modules are external and loosely specified, so every field is optional
//! and decoding never fails on shape alone: a field of the wrong type is
//! read as absent, or rendered as text where the loader only displays it.

use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    pub success: Option<bool>,
    pub result: Option<Value>,
    pub exit_code: Option<Value>,
    pub error: Option<String>,
    pub applied: Option<bool>,
    pub step_count: Option<Value>,
    pub unmatched_steps: Vec<UnmatchedTest>,
}

/// Steps of one test the module could not place with confidence.
#[derive(Debug, Clone, Default)]
pub struct UnmatchedTest {
    pub test_id: Option<String>,
    pub steps: Vec<UnmatchedStep>,
}

#[derive(Debug, Clone, Default)]
pub struct UnmatchedStep {
    pub step_index: Option<i64>,
    pub action: Option<String>,
    /// Line number or a free-form position.
    pub suggested_line: Option<Value>,
}

/// Present and not null.
fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Strings as-is, anything else as its JSON text.
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    field(map, key).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Elements of an array field that are objects; anything else is skipped.
fn objects<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    field(map, key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

impl ResponseEnvelope {
    /// Decode trimmed stdout. `None` if it is not a JSON object.
    pub fn parse(stdout: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(Value::Object(map)) => Some(Self::from_map(&map)),
            Ok(_) => {
                debug!("response is JSON but not an object");
                None
            }
            Err(_) => None,
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            success: field(map, "success").and_then(Value::as_bool),
            result: field(map, "result").cloned(),
            exit_code: field(map, "exitCode").cloned(),
            error: text(map, "error"),
            applied: field(map, "applied").and_then(Value::as_bool),
            step_count: field(map, "stepCount").cloned(),
            unmatched_steps: objects(map, "unmatchedSteps")
                .map(UnmatchedTest::from_map)
                .collect(),
        }
    }

    /// `result` as text, if it is a string.
    pub fn result_text(&self) -> Option<&str> {
        self.result.as_ref().and_then(Value::as_str)
    }

    /// `stepCount` as displayed; 0 when absent.
    pub fn step_count_display(&self) -> String {
        match &self.step_count {
            None | Some(Value::Null) => "0".into(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl UnmatchedTest {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            test_id: text(map, "testId"),
            steps: objects(map, "steps").map(UnmatchedStep::from_map).collect(),
        }
    }

    pub fn test_id_display(&self) -> &str {
        self.test_id.as_deref().unwrap_or("(unnamed)")
    }
}

impl UnmatchedStep {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            step_index: field(map, "stepIndex").and_then(Value::as_i64),
            action: text(map, "action"),
            suggested_line: field(map, "suggestedLine").cloned(),
        }
    }

    /// 1-based index for display.
    pub fn display_index(&self) -> i64 {
        self.step_index.unwrap_or(0).saturating_add(1)
    }

    pub fn action_display(&self) -> &str {
        self.action.as_deref().unwrap_or("(unknown)")
    }

    pub fn suggested_line_display(&self) -> String {
        match &self.suggested_line {
            None | Some(Value::Null) => "?".into(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Interpret an `exitCode` value: JSON integers, finite floats (truncated)
/// and strings holding an integer are usable; anything else is not.
pub fn usable_exit_code(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(f64::trunc)
                    .filter(|f| *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                    .map(|f| f as i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// Exit code a loader should report: the module's `exitCode` when present
/// and usable, otherwise the native process status.
pub fn effective_exit_code(stdout: &str, native: i32) -> i32 {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(stdout.trim()) else {
        debug!("stdout is not a JSON object, keeping native status {native}");
        return native;
    };
    match map.get("exitCode").and_then(usable_exit_code) {
        Some(code) => {
            debug!("module exitCode {code} overrides native status {native}");
            code
        }
        None => native,
    }
}
