use std::fmt;

pub const REASON_INVALID_JSON: &str = "INVALID_MODEL_JSON";
pub const REASON_EMPTY_ITEMS: &str = "EMPTY_MODEL_ITEMS";
pub const REASON_EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
pub const REASON_TRANSPORT: &str = "TRANSPORT_ERROR";
pub const REASON_NOT_CONFIGURED: &str = "AI_EXT_NOT_READY";
pub const REASON_VALIDATION: &str = "EMPTY_TOPIC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Payload,
    Configuration,
    Provider,
    EmptyResult,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Payload => "PAYLOAD",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Provider => "PROVIDER",
            ErrorKind::EmptyResult => "EMPTY_RESULT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of a text generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("brief rejected: {0}")]
    Validation(String),

    #[error("text model request failed: {0}")]
    Transport(String),

    #[error("model output is not a JSON array: {0}")]
    InvalidPayload(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("model output contained no usable items")]
    EmptyResult,

    #[error("text model not configured: {0}")]
    NotConfigured(String),
}

impl GenerateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerateError::Validation(_) => ErrorKind::Validation,
            GenerateError::Transport(_) => ErrorKind::Transport,
            GenerateError::InvalidPayload(_) | GenerateError::EmptyResponse => ErrorKind::Payload,
            GenerateError::EmptyResult => ErrorKind::EmptyResult,
            GenerateError::NotConfigured(_) => ErrorKind::Configuration,
        }
    }

    /// Stable code matched against the recoverable set.
    pub fn code(&self) -> &'static str {
        match self {
            GenerateError::Validation(_) => REASON_VALIDATION,
            GenerateError::Transport(_) => REASON_TRANSPORT,
            GenerateError::InvalidPayload(_) => REASON_INVALID_JSON,
            GenerateError::EmptyResponse => REASON_EMPTY_RESPONSE,
            GenerateError::EmptyResult => REASON_EMPTY_ITEMS,
            GenerateError::NotConfigured(_) => REASON_NOT_CONFIGURED,
        }
    }

    /// Single descriptive string attached to fallback results and events.
    pub fn reason(&self) -> String {
        match self {
            GenerateError::InvalidPayload(_)
            | GenerateError::EmptyResponse
            | GenerateError::EmptyResult => self.code().to_string(),
            GenerateError::Validation(detail)
            | GenerateError::Transport(detail)
            | GenerateError::NotConfigured(detail) => {
                let detail = detail.trim();
                if detail.is_empty() {
                    self.code().to_string()
                } else {
                    format!("{}: {}", self.code(), truncate_text(detail, 240))
                }
            }
        }
    }

    pub fn transport(err: impl fmt::Display) -> Self {
        GenerateError::Transport(err.to_string())
    }
}

/// Failures of a single image request. These always reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image prompt is empty")]
    EmptyPrompt,

    #[error("image function is not configured")]
    NotConfigured,

    #[error("image provider failed ({code}): {message}")]
    Provider { code: String, message: String },

    #[error("image provider returned no image url")]
    EmptyUrl,

    #[error("image request failed: {0}")]
    Transport(String),
}

impl ImageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::EmptyPrompt => ErrorKind::Validation,
            ImageError::NotConfigured => ErrorKind::Configuration,
            ImageError::Provider { .. } => ErrorKind::Provider,
            ImageError::EmptyUrl => ErrorKind::EmptyResult,
            ImageError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ImageError::EmptyPrompt => "EMPTY_PROMPT",
            ImageError::NotConfigured => "NOT_CONFIGURED",
            ImageError::Provider { code, .. } => code.as_str(),
            ImageError::EmptyUrl => "EMPTY_URL",
            ImageError::Transport(_) => REASON_TRANSPORT,
        }
    }
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_reasons_are_bare_codes() {
        assert_eq!(
            GenerateError::InvalidPayload("expected value at line 1".to_string()).reason(),
            "INVALID_MODEL_JSON"
        );
        assert_eq!(GenerateError::EmptyResult.reason(), "EMPTY_MODEL_ITEMS");
        assert_eq!(GenerateError::EmptyResponse.reason(), "EMPTY_RESPONSE");
    }

    #[test]
    fn transport_reason_carries_detail() {
        let err = GenerateError::transport("connection refused");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.reason(), "TRANSPORT_ERROR: connection refused");
        assert_eq!(GenerateError::Transport("  ".to_string()).reason(), "TRANSPORT_ERROR");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(GenerateError::EmptyResponse.kind(), ErrorKind::Payload);
        assert_eq!(GenerateError::EmptyResult.kind(), ErrorKind::EmptyResult);
        assert_eq!(
            GenerateError::NotConfigured("missing key".to_string()).kind(),
            ErrorKind::Configuration
        );
        let provider = ImageError::Provider {
            code: "CONTENT_BLOCKED".to_string(),
            message: "blocked".to_string(),
        };
        assert_eq!(provider.kind(), ErrorKind::Provider);
        assert_eq!(provider.code(), "CONTENT_BLOCKED");
        assert_eq!(ImageError::EmptyPrompt.code(), "EMPTY_PROMPT");
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
