//! Inbound frame normalization: split a raw socket frame into JSON chunks, decode each one
//! (falling back to raw text), and map heterogeneous button shapes onto [`CanonicalButton`].
//!
//! The agent backend is loose about its wire format: keys arrive as `Body`, `body` or
//! `content`, button types as `CTA`, `Call_To_Action`, `quick reply`, and several objects may
//! be glued together in one frame. Nothing here returns an error; undecodable input is shown
//! to the user as plain text.

use serde::Serialize;
use serde_json::{Map, Value};

/// Keys accepted for the message body, highest priority first.
pub const BODY_KEYS: &[&str] = &["Body", "body", "content"];
/// Keys accepted for the button array, highest priority first.
pub const BUTTONS_KEYS: &[&str] = &["Buttons", "buttons"];

const BUTTON_TYPE_KEYS: &[&str] = &["type", "Type"];
const BUTTON_TEXT_KEYS: &[&str] = &["text", "Text"];
const BUTTON_URL_KEYS: &[&str] = &["url", "URL"];
const BUTTON_PHONE_KEYS: &[&str] = &["phone_number"];

/// Body shown when a decoded object carries none of the body keys.
pub const MISSING_BODY: &str = "No body found";

/// A button ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CanonicalButton {
    /// Opens `href` (a web URL or a `tel:` URI).
    CallToAction { label: String, href: String },
    /// Sends `label` back to the agent as if the user typed it.
    QuickReply { label: String },
}

impl CanonicalButton {
    pub fn label(&self) -> &str {
        match self {
            CanonicalButton::CallToAction { label, .. } => label,
            CanonicalButton::QuickReply { label } => label,
        }
    }
}

/// Button type after folding the discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    CallToAction,
    QuickReply,
}

impl ButtonKind {
    /// Classify a raw discriminator. Case, whitespace and underscores are ignored, so
    /// `"Call_To_Action"`, `"call to action"` and `"CTA"` all map to [`ButtonKind::CallToAction`].
    pub fn classify(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "cta" | "calltoaction" => Some(ButtonKind::CallToAction),
            "quickreply" => Some(ButtonKind::QuickReply),
            _ => None,
        }
    }
}

/// One decoded message: body text plus its renderable buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub body: String,
    pub buttons: Vec<CanonicalButton>,
}

impl MessageRecord {
    /// Record for a chunk that could not be decoded: the text itself, no buttons.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            body: text.into(),
            buttons: Vec::new(),
        }
    }
}

/// Normalize one raw frame into records, in chunk order.
pub fn normalize(raw: &str) -> Vec<MessageRecord> {
    split_chunks(raw).into_iter().map(decode_chunk).collect()
}

/// Split a frame at every `}` followed (after optional whitespace) by `{`.
///
/// The scan is purely lexical: a `}{` inside a string literal splits too, so one malformed
/// chunk never swallows the records after it. Chunks are trimmed and empty ones dropped.
pub fn split_chunks(raw: &str) -> Vec<&str> {
    let raw = raw.trim();
    let mut chunks = Vec::new();
    let mut start = 0;

    for (i, _) in raw.match_indices('}') {
        if raw[i + 1..].trim_start().starts_with('{') {
            chunks.push(&raw[start..=i]);
            start = i + 1;
        }
    }
    chunks.push(&raw[start..]);

    chunks
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

/// Decode a single chunk. Anything that is not a JSON object becomes a raw-text record.
pub fn decode_chunk(chunk: &str) -> MessageRecord {
    match serde_json::from_str::<Value>(chunk) {
        Ok(Value::Object(obj)) => record_from_object(&obj),
        Ok(_) => {
            log::warn!("chunk is not a JSON object, showing as text: {}", chunk);
            MessageRecord::raw(chunk)
        }
        Err(e) => {
            log::warn!("could not parse chunk ({}): {}", e, chunk);
            MessageRecord::raw(chunk)
        }
    }
}

fn record_from_object(obj: &Map<String, Value>) -> MessageRecord {
    let body = BODY_KEYS
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or(MISSING_BODY)
        .to_string();
    let buttons: Vec<CanonicalButton> = first_present(obj, BUTTONS_KEYS)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(normalize_button).collect())
        .unwrap_or_default();
    MessageRecord { body, buttons }
}

/// First value among `keys` (in order) that is present and truthy.
///
/// `null`, `false`, `0` and `""` count as absent. Arrays and objects are present even when
/// empty, so `{"Buttons":[],"buttons":[..]}` resolves to the empty `Buttons`.
pub fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| is_present(v))
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// First string among `keys` that is not blank, returned as sent.
fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Map one raw button onto a [`CanonicalButton`].
///
/// Returns `None` for unknown types, for buttons without a label, and for call-to-action
/// buttons that have neither a URL nor a phone number.
pub fn normalize_button(raw: &Value) -> Option<CanonicalButton> {
    let obj = raw.as_object()?;
    let kind = ButtonKind::classify(first_str(obj, BUTTON_TYPE_KEYS).unwrap_or(""))?;
    let label = first_str(obj, BUTTON_TEXT_KEYS)?.to_string();
    match kind {
        ButtonKind::QuickReply => Some(CanonicalButton::QuickReply { label }),
        ButtonKind::CallToAction => {
            let href = match first_str(obj, BUTTON_URL_KEYS) {
                Some(url) => url.to_string(),
                None => format!("tel:{}", first_str(obj, BUTTON_PHONE_KEYS)?),
            };
            Some(CanonicalButton::CallToAction { label, href })
        }
    }
}
