use crate::resilience::retry::{LastFailure, RetryError};
use crate::transport::HttpResponse;
use crate::{Error, ErrorContext};

/// Statuses treated as transient for every method.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

const MAX_ERROR_BODY: usize = 512;

/// Terminal HTTP status as an error, carrying a bounded slice of the body.
pub(crate) fn status_error(resp: &HttpResponse) -> Error {
    let text = resp.text();
    let message = if text.trim().is_empty() {
        format!("request failed with status {}", resp.status)
    } else if text.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text
    };
    Error::Status {
        status: resp.status,
        message,
        retryable: is_retryable_status(resp.status),
    }
}

fn last_into_error(last: LastFailure<HttpResponse, Error>) -> Error {
    match last {
        LastFailure::Error(e) => e,
        LastFailure::Result(resp) => status_error(&resp),
    }
}

/// Flatten a retry-loop failure into the crate error taxonomy.
pub(crate) fn into_client_error(err: RetryError<HttpResponse, Error>) -> Error {
    match err {
        RetryError::InvalidPolicy(msg) => Error::configuration_with_context(
            msg,
            ErrorContext::new().with_source("retry_policy"),
        ),
        RetryError::Aborted { error, .. } => error,
        RetryError::Exhausted { attempts, last } => Error::RetryExhausted {
            attempts,
            last: Box::new(last_into_error(last)),
        },
        RetryError::BudgetExceeded {
            attempts,
            elapsed,
            last,
        } => Error::BudgetExceeded {
            attempts,
            elapsed,
            last: Box::new(last_into_error(last)),
        },
    }
}

/// Short human-readable reason for a failed attempt, for logs and observers.
pub(crate) fn describe(last: &LastFailure<HttpResponse, Error>) -> String {
    match last {
        LastFailure::Error(e) => e.to_string(),
        LastFailure::Result(resp) => format!("HTTP {}", resp.status),
    }
}
