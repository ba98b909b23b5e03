//! Error types for transcript resolution
//!
//! Only [`ResolveError`] crosses the resolver boundary. Strategy failures are
//! recorded as diagnostics and never propagated to callers.

use std::fmt;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors surfaced by the resolver itself
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Could not find a YouTube video identifier in: {0:?}")]
    IdentifierNotFound(String),

    #[error("Transcript resolution was cancelled")]
    Cancelled,
}

/// Failure of a single acquisition strategy
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("No usable transcript: {0}")]
    Empty(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl StrategyError {
    /// Whether the failure is a rate-limiting signal worth retrying
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Coarse category used in diagnostics output
    pub fn kind(&self) -> StrategyErrorKind {
        match self {
            Self::Transport(_) | Self::HttpStatus { .. } | Self::RateLimited(_) => {
                StrategyErrorKind::Transport
            }
            Self::Parse(_) | Self::Empty(_) => StrategyErrorKind::Parse,
            Self::Permission(_) => StrategyErrorKind::Permission,
            Self::NotConfigured(_) => StrategyErrorKind::NotConfigured,
        }
    }
}

impl From<reqwest::Error> for StrategyError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return Self::RateLimited(err.to_string());
            }
            return Self::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

impl From<NormalizeError> for StrategyError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Empty => Self::Empty("payload contained no transcript segments".to_string()),
            NormalizeError::Malformed(msg) => Self::Parse(msg),
        }
    }
}

/// Error taxonomy buckets for strategy failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyErrorKind {
    Transport,
    Parse,
    Permission,
    NotConfigured,
}

impl fmt::Display for StrategyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Parse => write!(f, "parse"),
            Self::Permission => write!(f, "permission"),
            Self::NotConfigured => write!(f, "not-configured"),
        }
    }
}

/// Failure converting a raw provider payload into segments
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Payload contained no transcript segments")]
    Empty,
}
