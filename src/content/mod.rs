//! Normalization of fetched resource payloads into renderable markup.

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

/// Entry type that marks literal text content in a resource envelope.
const TEXT_ENTRY_TYPE: &str = "text";

/// Resolves a raw resource payload into markup.
///
/// The payload may be a protocol envelope (`{"contents": [...]}`) or bare
/// markup. Resolution never fails; anything that is not an envelope with a
/// text entry is returned unchanged.
pub struct ContentResolver;

impl ContentResolver {
    pub fn resolve(raw: &str) -> Cow<'_, str> {
        match Self::envelope_text(raw) {
            Some(text) => Cow::Owned(text),
            None => Cow::Borrowed(raw),
        }
    }

    fn envelope_text(raw: &str) -> Option<String> {
        let envelope: Value = serde_json::from_str(raw).ok()?;
        let contents = envelope.get("contents")?.as_array()?;

        let text = contents.iter().find_map(text_entry);
        if text.is_none() {
            debug!(entries = contents.len(), "resource envelope has no text entry");
        }
        text.map(str::to_string)
    }
}

/// Text of an entry typed as text. Untyped entries carrying `text` follow the
/// resource-contents shape and count as text too.
fn text_entry(entry: &Value) -> Option<&str> {
    let text = entry.get("text")?.as_str()?;
    match entry.get("type") {
        None => Some(text),
        Some(Value::String(kind)) if kind == TEXT_ENTRY_TYPE => Some(text),
        Some(_) => None,
    }
}
