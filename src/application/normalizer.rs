//! Preamble split and body sanitation.
//!
//! Normalization never fails: an empty or malformed body is passed on and
//! rejected by the parse step.

use crate::domain::message::InboundMessage;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const BOM: char = '\u{feff}';

/// First XML-DSig block, with or without a namespace prefix.
static SIGNATURE_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"<(?:[\w.-]+:)?Signature\b[^>]*>.*?</(?:[\w.-]+:)?Signature\s*>")
        .dot_matches_new_line(true)
        .size_limit(1 << 20)
        .build()
        .ok()
});

/// Splits decoded text into preamble and sanitized body.
pub fn normalize(decoded: &str) -> InboundMessage {
    let text = decoded.strip_prefix(BOM).unwrap_or(decoded);
    let (preamble, body) = match text.find('<') {
        Some(index) => text.split_at(index),
        None => (text, ""),
    };

    InboundMessage {
        preamble: preamble.to_string(),
        body: sanitize(body),
    }
}

/// Resolves transport escaping outside the first signature block.
///
/// Whether to unescape is decided once for everything outside the block; the
/// block is reinserted byte-for-byte at its original position.
pub fn sanitize(body: &str) -> String {
    let signature = SIGNATURE_BLOCK
        .as_ref()
        .and_then(|re| re.find(body))
        .map(|m| m.range());

    let sanitized = match signature {
        Some(range) => {
            let (before, after) = (&body[..range.start], &body[range.end..]);
            let escaped = has_escapes(before) || has_escapes(after);
            let mut out = unescape(before, escaped);
            out.push_str(&body[range]);
            out.push_str(&unescape(after, escaped));
            out
        }
        None => unescape(body, has_escapes(body)),
    };

    sanitized.trim().to_string()
}

fn has_escapes(segment: &str) -> bool {
    segment.contains("\\\\n") || segment.contains("\\\\r") || segment.contains("\\\"")
}

fn unescape(segment: &str, escaped: bool) -> String {
    if !escaped {
        return segment.to_string();
    }
    segment
        .replace("\\\\n", "\n")
        .replace("\\\\r", "\r")
        .replace("\\\"", "\"")
        .replace("\\n", "")
        .replace("\\r", "")
}
