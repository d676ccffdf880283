//! Reply text extraction from upstream chat responses.
//!
//! Ollama builds (and look-alike servers) disagree on where the reply text
//! lives. Each extractor probes one location; the first that yields non-empty
//! text wins, and the raw body is the last resort.

use log::debug;
use serde_json::Value as JsonValue;

type Extractor = fn(&JsonValue) -> Option<String>;

const EXTRACTORS: &[(&str, Extractor)] = &[
    ("message.content", nested_message_content),
    ("message", message_text),
    ("response", response_text),
];

fn non_empty_str(value: Option<&JsonValue>) -> Option<String> {
    value
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn nested_message_content(body: &JsonValue) -> Option<String> {
    non_empty_str(body.get("message").and_then(|m| m.get("content")))
}

fn message_text(body: &JsonValue) -> Option<String> {
    non_empty_str(body.get("message"))
}

fn response_text(body: &JsonValue) -> Option<String> {
    non_empty_str(body.get("response"))
}

pub fn extract_reply(body: &JsonValue) -> String {
    for (field, extractor) in EXTRACTORS {
        if let Some(text) = extractor(body) {
            debug!("Reply text taken from `{}`", field);
            return text;
        }
    }
    debug!("No known reply field; returning raw upstream body");
    body.to_string()
}
