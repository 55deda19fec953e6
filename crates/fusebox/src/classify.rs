// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

const SERVER_ERROR_FLOOR: u16 = 500;

/// Exposes the upstream status code an error carries, if any.
///
/// The default failure classifier uses this to separate infrastructure-level
/// failures from errors that merely report a caller mistake: an error with a
/// status code of 500 or above counts against the circuit, as does an error
/// with no status code at all (timeouts, connection resets and the like).
/// Anything below 500 is treated as a successful round trip from the circuit's
/// point of view.
///
/// # Example
///
/// ```rust
/// use fusebox::ErrorStatus;
///
/// #[derive(Debug)]
/// enum ApiError {
///     Timeout,
///     Upstream(u16),
/// }
///
/// impl ErrorStatus for ApiError {
///     fn status_code(&self) -> Option<u16> {
///         match self {
///             Self::Timeout => None,
///             Self::Upstream(status) => Some(*status),
///         }
///     }
/// }
/// ```
pub trait ErrorStatus {
    /// The status code carried by this error, or `None` if the call never
    /// produced one.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// Classifier installed by [`CircuitBreaker::builder`](crate::CircuitBreaker::builder):
/// errors without a status code and errors with a server-side status count as failures.
pub(crate) fn default_is_failure<E: ErrorStatus>(error: &E) -> bool {
    match error.status_code() {
        Some(status) => status >= SERVER_ERROR_FLOOR,
        None => true,
    }
}
