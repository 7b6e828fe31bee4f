use studio_contracts::tasks::USER_CANCELLED_MARKER;

pub const CANCELLED_MESSAGE: &str = "Generation cancelled";
pub const TIMED_OUT_MESSAGE: &str = "Video generation timed out";
pub const TASK_FAILED_DEFAULT_MESSAGE: &str = "Video generation failed";
pub const INVALID_FORMAT_MESSAGE: &str = "API Error - Invalid response format";

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GenerationErrorKind {
    ConfigMissing,
    InvalidRequest,
    Busy,
    Http { status: u16 },
    Transport,
    MalformedResponse,
    TaskFailed,
    TimedOut,
    Cancelled,
}

impl GenerationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::InvalidRequest => "invalid_request",
            Self::Busy => "busy",
            Self::Http { .. } => "http",
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::TaskFailed => "task_failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Every way a generation can end other than success. The session records
/// the message for display and releases the generating gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    kind: GenerationErrorKind,
    message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::ConfigMissing, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::InvalidRequest, message)
    }

    pub fn busy() -> Self {
        Self::new(
            GenerationErrorKind::Busy,
            "A generation is already in progress",
        )
    }

    /// Non-success status. A body carrying the upstream cancellation marker
    /// is reported as a cancellation instead.
    pub fn http(status: u16, message: impl Into<String>, body: &str) -> Self {
        if body.contains(USER_CANCELLED_MARKER) {
            return Self::cancelled();
        }
        Self::new(GenerationErrorKind::Http { status }, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Transport, message)
    }

    pub fn malformed() -> Self {
        Self::new(GenerationErrorKind::MalformedResponse, INVALID_FORMAT_MESSAGE)
    }

    pub fn task_failed(message: Option<String>) -> Self {
        Self::new(
            GenerationErrorKind::TaskFailed,
            message.unwrap_or_else(|| TASK_FAILED_DEFAULT_MESSAGE.to_string()),
        )
    }

    pub fn timed_out() -> Self {
        Self::new(GenerationErrorKind::TimedOut, TIMED_OUT_MESSAGE)
    }

    pub fn cancelled() -> Self {
        Self::new(GenerationErrorKind::Cancelled, CANCELLED_MESSAGE)
    }

    pub fn kind(&self) -> GenerationErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cancellation is reported to the user but is not a failure.
    pub fn is_benign(&self) -> bool {
        self.kind == GenerationErrorKind::Cancelled
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            GenerationErrorKind::Http { status } => Some(status),
            _ => None,
        }
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::new(
                GenerationErrorKind::Http {
                    status: status.as_u16(),
                },
                err.to_string(),
            );
        }
        if err.is_decode() {
            return Self::malformed();
        }
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationError, GenerationErrorKind, CANCELLED_MESSAGE};

    #[test]
    fn http_error_keeps_status_code() {
        let err = GenerationError::http(502, "Image generation failed: 502 Bad Gateway", "{}");
        assert_eq!(err.kind(), GenerationErrorKind::Http { status: 502 });
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.to_string(), "Image generation failed: 502 Bad Gateway");
    }

    #[test]
    fn http_body_with_cancel_marker_is_cancellation() {
        let err = GenerationError::http(
            400,
            "Video generation failed: 400 Bad Request",
            r#"{"error":{"code":"USER_CANCELLED_HIGH_COST_REQUEST"}}"#,
        );
        assert_eq!(err.kind(), GenerationErrorKind::Cancelled);
        assert_eq!(err.message(), CANCELLED_MESSAGE);
        assert!(err.is_benign());
    }

    #[test]
    fn task_failed_falls_back_to_default_message() {
        assert_eq!(
            GenerationError::task_failed(None).message(),
            "Video generation failed"
        );
        assert_eq!(
            GenerationError::task_failed(Some("nsfw".to_string())).message(),
            "nsfw"
        );
    }

    #[test]
    fn error_round_trips_through_anyhow() {
        let err: anyhow::Error = GenerationError::timed_out().into();
        let kind = err
            .downcast_ref::<GenerationError>()
            .map(GenerationError::kind);
        assert_eq!(kind, Some(GenerationErrorKind::TimedOut));
    }
}
