//! Error types for the resilient execution layer

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute)
/// and [`ResilientExecutor::execute`](crate::ResilientExecutor::execute).
///
/// `E` is the wrapped operation's own error type. It is carried through
/// unmodified in [`ExecError::Operation`] so callers can inspect the original
/// cause instead of string-matching on a message.
#[derive(Debug, Error)]
pub enum ExecError<E>
where
    E: std::error::Error + 'static,
{
    /// The circuit is open and its cooldown has not elapsed. The operation
    /// was never invoked.
    #[error("circuit breaker '{name}' is open, rejecting requests")]
    CircuitOpen {
        /// Name of the protected dependency
        name: String,
    },

    /// The operation did not settle within the per-attempt deadline. The
    /// pending operation future is dropped when the deadline wins the race.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation itself failed; the original error is preserved.
    #[error("operation failed: {0}")]
    Operation(#[source] E),

    /// All retry attempts were spent. Wraps the error from the final attempt.
    /// Raised only for multi-attempt runs; a single-attempt failure
    /// propagates unwrapped.
    #[error("all {attempts} attempts exhausted")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: Box<ExecError<E>>,
    },
}

impl<E> ExecError<E>
where
    E: std::error::Error + 'static,
{
    /// Check if this error is a fail-fast rejection from an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        match self {
            ExecError::CircuitOpen { .. } => true,
            ExecError::RetriesExhausted { source, .. } => source.is_circuit_open(),
            _ => false,
        }
    }

    /// Check if this error is a per-attempt deadline expiry.
    pub fn is_timeout(&self) -> bool {
        match self {
            ExecError::Timeout(_) => true,
            ExecError::RetriesExhausted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// The underlying operation error, if one caused this failure.
    /// Digs through [`ExecError::RetriesExhausted`] wrapping.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ExecError::Operation(e) => Some(e),
            ExecError::RetriesExhausted { source, .. } => source.operation_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn test_error_classification() {
        let open: ExecError<Refused> = ExecError::CircuitOpen {
            name: "primary-db".to_string(),
        };
        assert!(open.is_circuit_open());
        assert!(!open.is_timeout());
        assert!(open.operation_error().is_none());

        let timeout: ExecError<Refused> = ExecError::Timeout(Duration::from_secs(2));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_circuit_open());

        let underlying = ExecError::Operation(Refused);
        assert!(underlying.operation_error().is_some());
    }

    #[test]
    fn test_exhausted_classification_follows_final_cause() {
        let exhausted: ExecError<Refused> = ExecError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ExecError::Timeout(Duration::from_millis(500))),
        };
        assert!(exhausted.is_timeout());
        assert!(!exhausted.is_circuit_open());

        let exhausted = ExecError::RetriesExhausted {
            attempts: 2,
            source: Box::new(ExecError::Operation(Refused)),
        };
        assert_eq!(
            exhausted.operation_error().map(|e| e.to_string()),
            Some("connection refused".to_string())
        );
    }

    #[test]
    fn test_display_names_the_breaker() {
        let open: ExecError<Refused> = ExecError::CircuitOpen {
            name: "primary-db".to_string(),
        };
        assert!(open.to_string().contains("primary-db"));
    }
}
