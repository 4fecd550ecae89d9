use crate::transport::TransportError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "client.base_url", "policy.max_delay")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "client_builder", "retry_policy")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the resilient HTTP layer.
///
/// Every terminal condition surfaces as its own variant so callers can decide
/// whether to alert, fail the request, or fall back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retryable: bool,
    },

    /// A 429 was received. Inside a retry loop the coordinator has already slept
    /// and the attempt should be retried.
    #[error("Rate limited (HTTP 429): server requested a {wait_secs}s wait")]
    RateLimited { wait_secs: u64 },

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("Retry time budget exceeded after {attempts} attempts ({elapsed:?} elapsed): {last}")]
    BudgetExceeded {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: Box<Error>,
    },

    #[error("Idempotency key '{key}' reused with a different payload (stored {stored_hash}, request {request_hash})")]
    IdempotencyConflict {
        key: String,
        stored_hash: String,
        request_hash: String,
    },

    #[error("Idempotency store at {} is corrupt: {message}", .path.display())]
    StoreCorrupt { path: PathBuf, message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether a single failed attempt with this error may be retried.
    ///
    /// Terminal variants (exhaustion, budget, conflict, store and config errors) are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_transient(),
            Error::Status { retryable, .. } => *retryable,
            Error::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, looking through retry wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::RetryExhausted { last, .. } | Error::BudgetExceeded { last, .. } => {
                last.status()
            }
            _ => None,
        }
    }
}
