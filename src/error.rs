use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagegenError {
    /// The service returned no usable body. `0` names the stage ("submission", "poll").
    #[error("received an empty response at {0}")]
    EmptyResponse(String),

    #[error("jobs did not complete within {ceiling_secs} seconds")]
    DeadlineExceeded { ceiling_secs: u64 },

    #[error("polling cancelled after {waited_secs} seconds")]
    Cancelled { waited_secs: u64 },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    #[error("auth failed: {0}")]
    AuthFailed(String),

    #[error("rate limited by generation service")]
    RateLimited,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl ImagegenError {
    /// Returns true for transient errors that may succeed on retry.
    /// Structural failures (empty body, malformed shape, deadline) never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited => true,
            // 5xx = server error, 4xx = rejected request. No status = not from HTTP.
            Self::Upstream { status, .. } => status.is_some_and(|s| s >= 500),
            Self::Request(_) => true,
            _ => false,
        }
    }

    /// Sanitized message for end users. Does not leak URLs or upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyResponse(stage) => format!("generation service returned nothing at {stage}"),
            Self::DeadlineExceeded { ceiling_secs } => {
                format!("images were not ready after {ceiling_secs} seconds")
            }
            Self::Cancelled { waited_secs } => format!("cancelled after {waited_secs} seconds"),
            Self::MalformedPayload(_) => "failed to parse generation service response".to_string(),
            Self::InvalidRequest(msg) => format!("invalid request: {msg}"),
            Self::Upstream { status, .. } => match status {
                Some(s) => format!("generation service rejected the request (HTTP {s})"),
                None => "generation service error".to_string(),
            },
            Self::AuthFailed(_) => "authentication with generation service failed".to_string(),
            Self::RateLimited => {
                "rate limited by generation service, try again shortly".to_string()
            }
            Self::Request(_) => "request to generation service failed".to_string(),
            Self::Io(e) => format!("io error: {e}"),
            Self::Config(msg) => format!("config error: {msg}"),
        }
    }
}
