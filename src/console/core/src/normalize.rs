//! Turns arbitrary transport failures into one human-readable message.
//!
//! Backends report errors in many layouts (`{"message": ..}`,
//! `{"error": {"message": ..}}`, `{"errors": [{"msg": ..}]}`, plain text
//! bodies...). The normalizer runs an ordered list of extraction attempts over
//! the failure's JSON shape and returns the first non-blank string it finds,
//! falling back to [`DEFAULT_ERROR_MESSAGE`].

use serde_json::Value;
use std::sync::OnceLock;

use crate::transport::TransportError;

/// Message used when nothing readable can be extracted.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unexpected error";

static DEFAULT_NORMALIZER: OnceLock<ErrorNormalizer> = OnceLock::new();

/// One attempt at pulling a message out of a failure shape.
pub trait MessageExtractor: Send + Sync {
    fn extract(&self, failure: &Value) -> Option<String>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Follows a dotted path of object keys and array indices, e.g.
/// `response.data.errors.0.msg`, and accepts the value if it is a non-blank
/// string.
#[derive(Debug, Clone)]
pub struct PathExtractor {
    segments: Vec<Segment>,
}

impl PathExtractor {
    pub fn new(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(s.to_string()),
            })
            .collect();
        Self { segments }
    }
}

impl MessageExtractor for PathExtractor {
    fn extract(&self, failure: &Value) -> Option<String> {
        let mut node = failure;
        for segment in &self.segments {
            node = match segment {
                Segment::Key(key) => node.get(key.as_str())?,
                Segment::Index(i) => node.get(*i)?,
            };
        }
        readable(node)
    }
}

fn readable(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Normalizer
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered list of extractors with a fallback message.
pub struct ErrorNormalizer {
    extractors: Vec<Box<dyn MessageExtractor>>,
    fallback: String,
}

impl std::fmt::Debug for ErrorNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorNormalizer")
            .field("extractors", &self.extractors.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl Default for ErrorNormalizer {
    fn default() -> Self {
        let paths = [
            "response.data.message",
            "response.data.error.message",
            "response.data.error",
            "response.data.errors.0.message",
            "response.data.errors.0.msg",
            "response.data.errors.0",
            "response.data.detail",
            "response.data",
            "data.message",
            "error.message",
            "error",
            "message",
            "",
        ];

        let mut normalizer = Self::empty();
        for path in paths {
            normalizer = normalizer.with_path(path);
        }
        normalizer
    }
}

impl ErrorNormalizer {
    /// Normalizer with no extractors; everything maps to the fallback.
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }

    /// Process-wide default chain.
    pub fn global() -> &'static ErrorNormalizer {
        DEFAULT_NORMALIZER.get_or_init(ErrorNormalizer::default)
    }

    /// Append a path extraction attempt.
    pub fn with_path(self, path: &str) -> Self {
        self.with_extractor(PathExtractor::new(path))
    }

    /// Append a custom extraction attempt.
    pub fn with_extractor(mut self, extractor: impl MessageExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Override the fallback message. Blank values are ignored so the output
    /// is never empty.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        if !fallback.trim().is_empty() {
            self.fallback = fallback;
        }
        self
    }

    /// Message for an arbitrary failure shape.
    pub fn normalize_value(&self, failure: &Value) -> String {
        self.extractors
            .iter()
            .find_map(|e| e.extract(failure))
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Message for a transport failure.
    pub fn normalize(&self, failure: &TransportError) -> String {
        self.normalize_value(&failure.shape())
    }
}

/// Normalize with the process-wide default chain.
pub fn normalize(failure: &TransportError) -> String {
    ErrorNormalizer::global().normalize(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_response_message() {
        let msg = ErrorNormalizer::default()
            .normalize_value(&json!({ "response": { "data": { "message": "Name taken" } } }));
        assert_eq!(msg, "Name taken");
    }

    #[test]
    fn test_response_error_from_http_status() {
        let err = TransportError::Response {
            status: 422,
            body: json!({ "errors": [{ "msg": "CLIENT_NAME is required" }] }),
        };
        assert_eq!(normalize(&err), "CLIENT_NAME is required");
    }

    #[test]
    fn test_plain_text_body() {
        let err = TransportError::Response {
            status: 500,
            body: json!("Internal Server Error"),
        };
        assert_eq!(normalize(&err), "Internal Server Error");
    }

    #[test]
    fn test_top_level_message_and_bare_string() {
        let n = ErrorNormalizer::default();
        assert_eq!(n.normalize_value(&json!({ "message": "timeout of 30000ms exceeded" })), "timeout of 30000ms exceeded");
        assert_eq!(n.normalize_value(&json!("boom")), "boom");
    }

    #[test]
    fn test_nested_error_object_preferred_over_string_fallbacks() {
        let n = ErrorNormalizer::default();
        let msg = n.normalize_value(&json!({
            "response": { "data": { "error": { "message": "Route overlaps" } } },
            "message": "Request failed with status code 400"
        }));
        assert_eq!(msg, "Route overlaps");
    }

    #[test]
    fn test_unreadable_shapes_fall_back() {
        let n = ErrorNormalizer::default();
        for shape in [json!(null), json!({}), json!({ "message": "   " }), json!([1, 2]), json!(42)] {
            assert_eq!(n.normalize_value(&shape), DEFAULT_ERROR_MESSAGE);
        }
    }

    #[test]
    fn test_blank_fallback_is_ignored() {
        let n = ErrorNormalizer::empty().with_fallback("  ");
        assert_eq!(n.normalize_value(&json!({})), DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_network_error() {
        let err = TransportError::Network("connection refused".into());
        assert_eq!(normalize(&err), "connection refused");
    }
}
