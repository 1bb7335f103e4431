use thiserror::Error;

use crate::domain::check::{InactiveObject, SyntaxDiagnostic};

/// Error type for all ADT engine operations.
///
/// Every variant carries a stable string code (see [`AdtError::code`]) that
/// the tool facade puts in front of the server-provided message, so agents
/// can match on the kind without parsing free text.
#[derive(Error, Debug)]
pub enum AdtError {
    #[error("invalid-argument: {0}")]
    InvalidArgument(String),

    /// A safety rule denied the operation before any network I/O happened.
    #[error("blocked-by-policy: {0}")]
    BlockedByPolicy(String),

    #[error("auth-failed: {0}")]
    AuthFailed(String),

    #[error("network: {0}")]
    Network(String),

    #[error("server-5xx: HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Another user (or session) holds the edit lock.
    #[error("lock-conflict: {0}")]
    LockConflict(String),

    /// The server reported `AlreadyExists` / `already exist`. Deployment
    /// phase 1 treats this as success; everyone else surfaces it.
    #[error("already-exists: {0}")]
    AlreadyExists(String),

    #[error("not-found: {0}")]
    NotFound(String),

    /// Syntax check found at least one message of severity E, A or X.
    #[error("syntax-error: {summary}")]
    SyntaxErrors {
        summary: String,
        diagnostics: Vec<SyntaxDiagnostic>,
    },

    #[error("activation-failed: {summary}")]
    ActivationFailed {
        summary: String,
        inactive: Vec<InactiveObject>,
    },

    /// At least one object failed in a deployment run; the message carries
    /// the per-phase counters.
    #[error("deployment-partial: {0}")]
    DeploymentPartial(String),

    /// A streamed WebSocket payload completed with missing sequence numbers.
    #[error("stream-incomplete: {0}")]
    StreamIncomplete(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("unsupported-object: {0}")]
    UnsupportedObject(String),
}

impl AdtError {
    /// Stable error code, suitable for substring matching by agents.
    pub fn code(&self) -> &'static str {
        match self {
            AdtError::InvalidArgument(_) => "invalid-argument",
            AdtError::BlockedByPolicy(_) => "blocked-by-policy",
            AdtError::AuthFailed(_) => "auth-failed",
            AdtError::Network(_) => "network",
            AdtError::Server { .. } => "server-5xx",
            AdtError::LockConflict(_) => "lock-conflict",
            AdtError::AlreadyExists(_) => "already-exists",
            AdtError::NotFound(_) => "not-found",
            AdtError::SyntaxErrors { .. } => "syntax-error",
            AdtError::ActivationFailed { .. } => "activation-failed",
            AdtError::DeploymentPartial(_) => "deployment-partial",
            AdtError::StreamIncomplete(_) => "stream-incomplete",
            AdtError::Timeout(_) => "timeout",
            AdtError::Cancelled(_) => "cancelled",
            AdtError::UnsupportedObject(_) => "unsupported-object",
        }
    }

    /// True when a retry with the same arguments could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdtError::Network(_) | AdtError::Timeout(_) | AdtError::Server { .. }
        )
    }

    /// Map a WebSocket-level error object (`{code, message}`) onto the
    /// engine taxonomy. The ZADT_VSP endpoint uses symbolic codes.
    pub fn from_ws(code: &str, message: &str) -> Self {
        let upper = code.to_ascii_uppercase();
        if upper.contains("TIMEOUT") {
            AdtError::Timeout(format!("{code}: {message}"))
        } else if upper.contains("NOT_FOUND") {
            AdtError::NotFound(format!("{code}: {message}"))
        } else if upper.contains("CANCEL") {
            AdtError::Cancelled(format!("{code}: {message}"))
        } else if upper.contains("AUTH") {
            AdtError::AuthFailed(format!("{code}: {message}"))
        } else {
            AdtError::Server {
                status: 500,
                message: format!("{code}: {message}"),
            }
        }
    }
}

impl From<serde_json::Error> for AdtError {
    fn from(err: serde_json::Error) -> Self {
        AdtError::Network(format!("invalid JSON payload: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AdtError>;
