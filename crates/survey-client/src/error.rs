use thiserror::Error;

/// Outcome classes of a single transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,
    #[error("Request cancelled")]
    Cancelled,
    #[error("{0}")]
    Network(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("invalid response body: {message}")]
    Decode { status: u16, message: String },
}

impl TransportError {
    /// HTTP status of the failure; 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            TransportError::Timeout | TransportError::Cancelled | TransportError::Network(_) => 0,
            TransportError::Http { status, .. } | TransportError::Decode { status, .. } => *status,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected survey payload: {message}")]
    InvalidPayload { status: u16, message: String },
}

impl FetchError {
    pub fn status(&self) -> u16 {
        match self {
            FetchError::Transport(err) => err.status(),
            FetchError::InvalidPayload { status, .. } => *status,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse client config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
