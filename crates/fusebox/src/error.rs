// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use thiserror::Error;

/// The rejection returned when a call reaches a breaker whose circuit is not
/// accepting traffic.
///
/// The guarded operation was never invoked. The error carries enough context
/// for the caller to decide what to do next: the configured reset timeout, the
/// failure rate that tripped the circuit, and how long until the breaker will
/// let a probe through.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("circuit is open (failure rate {failure_rate:.1}%, next probe in {}ms)", .retry_after.as_millis())]
pub struct CircuitOpenError {
    reset_timeout: Duration,
    failure_rate: f64,
    retry_after: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(reset_timeout: Duration, failure_rate: f64, retry_after: Duration) -> Self {
        Self {
            reset_timeout,
            failure_rate,
            retry_after,
        }
    }

    /// The reset timeout the breaker was configured with.
    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// The failure rate, in percent, that was measured when the circuit
    /// opened.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// How long until the breaker will admit a probe call.
    ///
    /// Zero when the circuit is already half-open but all probe slots are
    /// taken; retrying immediately may then succeed.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}

/// The error returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
///
/// A failing call surfaces the dependency's own error unchanged through
/// [`Operation`](ExecuteError::Operation); the breaker only ever adds the
/// [`Rejected`](ExecuteError::Rejected) case on top.
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    /// The circuit was not accepting traffic and the operation was never
    /// invoked.
    #[error(transparent)]
    Rejected(#[from] CircuitOpenError),

    /// The operation was invoked and returned this error.
    #[error("dependency call failed: {0}")]
    Operation(E),
}

impl<E> ExecuteError<E> {
    /// Whether this error is a rejection, meaning the dependency was never
    /// called.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The rejection details, if this error is a rejection.
    #[must_use]
    pub fn as_rejected(&self) -> Option<&CircuitOpenError> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Operation(_) => None,
        }
    }

    /// Unwraps the dependency's own error, if the operation actually ran.
    #[must_use]
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Rejected(_) => None,
            Self::Operation(error) => Some(error),
        }
    }
}
