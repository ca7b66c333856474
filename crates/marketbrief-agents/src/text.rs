//! Assistant message rendering
//!
//! Remote models emit markdown-flavoured text with hard-wrapped lines. This
//! module flattens a thread message into a single cleaned display string:
//! emphasis markers stripped, soft line-wraps joined, blank runs collapsed.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{MessageContent, ThreadMessage};

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));
static DIGIT_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(\d+)").expect("valid regex"));

/// Render a thread message to a single cleaned display string
///
/// Joins all text content parts, then normalizes the result. Non-text parts
/// are ignored.
pub fn message_to_text(message: &ThreadMessage) -> String {
    let parts: Vec<&str> = message
        .content
        .iter()
        .filter_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Unknown => None,
        })
        .collect();
    normalize_agent_message(&parts.join(" "))
}

/// Normalize raw assistant text for display
pub fn normalize_agent_message(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let sanitized = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{2217}', "*");
    let sanitized = BOLD.replace_all(&sanitized, "$1");
    let sanitized = ITALIC.replace_all(&sanitized, "$1");
    let sanitized = DIGIT_ESCAPE.replace_all(&sanitized, "$1");

    let mut compact: Vec<String> = Vec::new();
    for line in sanitized.lines().map(str::trim) {
        if line.is_empty() {
            // Collapse runs of blank lines to a single separator.
            if compact.last().is_some_and(|last| !last.is_empty()) {
                compact.push(String::new());
            }
            continue;
        }
        if let Some(previous) = compact.last_mut() {
            if !previous.is_empty()
                && !ends_sentence(previous)
                && !is_list_item(line)
                && !is_list_item(previous)
            {
                previous.push(' ');
                previous.push_str(line);
                continue;
            }
        }
        compact.push(line.to_string());
    }
    compact.join("\n")
}

fn ends_sentence(line: &str) -> bool {
    line.ends_with('.') || line.ends_with('!') || line.ends_with('?')
}

fn is_list_item(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('*') || line.starts_with('\u{2022}')
}
