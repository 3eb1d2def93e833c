//! Event name resolution.
//!
//! Wire event names carry a vendor prefix and use hyphen or underscore
//! separators (`pusher:ping`, `pusher:channel_data`). Operations are
//! registered under camel-case dispatch keys (`ping`, `channelData`).

use crate::error::{ProtocolError, Result};

/// Resolve a raw wire event name into a dispatch key.
///
/// Everything up to and including the first `:` is dropped and the rest
/// is camel-cased.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEvent`] if the name has no `:` or
/// nothing follows it.
///
/// # Example
///
/// ```
/// use pusher_protocol::protocol::resolve_event;
///
/// assert_eq!(resolve_event("pusher:ping").unwrap(), "ping");
/// assert_eq!(resolve_event("pusher:unknown-thing").unwrap(), "unknownThing");
/// assert!(resolve_event("ping").is_err());
/// ```
pub fn resolve_event(raw: &str) -> Result<String> {
    let (_, name) = raw
        .split_once(':')
        .ok_or_else(|| ProtocolError::malformed(format!("event `{raw}` has no prefix")))?;

    let key = to_camel_case(name);
    if key.is_empty() {
        return Err(ProtocolError::malformed(format!(
            "event `{raw}` has an empty name"
        )));
    }
    Ok(key)
}

/// Convert a `-`, `_` or space delimited word list to camel case.
///
/// Only the first letter of each word is touched: the first word is
/// lowercased, later words are capitalized, and the rest of every word
/// is kept as is.
pub fn to_camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for word in input
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if out.is_empty() {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }

    out
}
