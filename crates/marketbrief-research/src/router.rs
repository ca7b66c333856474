//! Follow-up router decision parsing
//!
//! The router stage emits a JSON object, usually wrapped in prose the model
//! adds around it. The output is untrusted: this parser never fails, it only
//! degrades to an empty selection, which the force-include rule then turns
//! into an analysis-only run.

use serde_json::Value;
use tracing::debug;

use crate::stages::Stage;

/// Extract the requested stage set from free-form router output
///
/// Duplicates collapse, names outside the stage vocabulary are dropped, and
/// any malformed input yields an empty selection.
pub fn parse_stage_selection(message: &str) -> Vec<Stage> {
    if message.is_empty() {
        return Vec::new();
    }
    let blob = extract_json_object(message);
    let parsed: Value = match serde_json::from_str(blob) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "router response was not valid JSON");
            return Vec::new();
        }
    };
    let Some(stages) = parsed.get("stages").and_then(Value::as_array) else {
        debug!("router response missing a stages list");
        return Vec::new();
    };

    let mut selected = Vec::new();
    for entry in stages {
        let Some(stage) = entry.as_str().and_then(Stage::from_name) else {
            continue;
        };
        if !selected.contains(&stage) {
            selected.push(stage);
        }
    }
    selected
}

/// Normalize a requested stage set to the executable sequence
///
/// `Analysis` is force-included and the result always follows the fixed
/// relative order price -> news -> analysis, regardless of what the router
/// asked for.
pub fn ordered_stages(requested: &[Stage]) -> Vec<Stage> {
    Stage::ORDER
        .into_iter()
        .filter(|stage| *stage == Stage::Analysis || requested.contains(stage))
        .collect()
}

/// Substring between the first `{` and the last `}`, when both exist in
/// order; otherwise the whole message
fn extract_json_object(message: &str) -> &str {
    let start = message.find('{');
    let end = message.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => &message[start..=end],
        _ => message,
    }
}
