// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(
    not(any(feature = "logs", feature = "metrics")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "the telemetry configuration APIs only exist when their features are enabled"
    )
)]

//! Failure-tracking circuit breaker for unreliable async dependencies.
//!
//! This crate protects callers of a flaky remote dependency from wasting time on
//! calls that are likely to fail. A [`CircuitBreaker`] watches the outcomes of
//! the calls it guards over a sliding window and, once the failure rate crosses
//! a threshold, starts rejecting calls immediately instead of letting them run
//! into the broken dependency. After a timeout, a few probe calls are let
//! through to check whether the dependency recovered.
//!
//! # Runtime Agnostic Design
//!
//! The breaker is **runtime agnostic**: it never spawns tasks, installs timers,
//! or sleeps. State transitions that depend on time happen lazily when the
//! breaker is next observed, so the same breaker works under any async runtime.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use fusebox::{CircuitBreaker, ErrorStatus};
//! use sundial::Clock;
//!
//! #[derive(Debug)]
//! enum ApiError {
//!     Timeout,
//!     Upstream(u16),
//! }
//!
//! impl ErrorStatus for ApiError {
//!     fn status_code(&self) -> Option<u16> {
//!         match self {
//!             Self::Timeout => None,
//!             Self::Upstream(status) => Some(*status),
//!         }
//!     }
//! }
//!
//! # impl std::fmt::Display for ApiError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//! #         match self {
//! #             Self::Timeout => f.write_str("request timed out"),
//! #             Self::Upstream(status) => write!(f, "upstream returned status {status}"),
//! #         }
//! #     }
//! # }
//! #
//! # async fn example(clock: Clock) {
//! let breaker: CircuitBreaker<ApiError> = CircuitBreaker::builder(&clock)
//!     .failure_threshold(50.0)
//!     .reset_timeout(Duration::from_secs(30))
//!     .build();
//!
//! match breaker.execute("user/42", fetch_user).await {
//!     Ok(user) => println!("fetched {user}"),
//!     Err(error) if error.is_rejected() => println!("circuit open: {error}"),
//!     Err(error) => println!("call failed: {error}"),
//! }
//! # }
//! # async fn fetch_user(path: &str) -> Result<String, ApiError> {
//! #     Ok(path.to_string())
//! # }
//! ```
//!
//! > **Note**: The breaker requires a [`Clock`] from the [`sundial`] crate for
//! > all of its timing decisions. Production code passes `Clock::new()`; tests
//! > use `sundial::ClockControl` (behind the `test-util` feature of `sundial`)
//! > to drive time deterministically.
//!
//! # Circuit States and Transitions
//!
//! The circuit operates in three states:
//!
//! - **Closed**: Normal operation. Calls pass through and outcomes are tracked.
//! - **Open**: The circuit is broken. Calls are immediately rejected without
//!   invoking the dependency.
//! - **Half-Open**: Testing whether the dependency has recovered. A limited
//!   number of probe calls are allowed through.
//!
//! ```text
//! ┌────────┐      Failure threshold exceeded      ┌──────────┐
//! │ Closed │ ────────────────────────────────────▶│   Open   │
//! └────────┘                                      └──────────┘
//!      ▲                                                 │
//!      │                                                 │
//!      │            ┌────────────────┐                   │
//!      └────────────│   Half-Open    │◀──────────────────┘
//!      Probing      └────────────────┘      Reset timeout
//!      successful                           elapsed
//! ```
//!
//! While closed, every settled call lands in the sliding window as a success or
//! failure. When a failure settles, the circuit opens if the window holds at
//! least [`minimum_requests`](CircuitBreakerBuilder::minimum_requests) outcomes
//! and the failure rate is at or above
//! [`failure_threshold`](CircuitBreakerBuilder::failure_threshold).
//!
//! While open, calls fail fast with [`CircuitOpenError`] carrying the rate that
//! tripped the circuit and the time until the next probe. Once the
//! [`reset_timeout`](CircuitBreakerBuilder::reset_timeout) elapses, the next
//! observation moves the circuit to half-open.
//!
//! While half-open,
//! [`half_open_max_attempts`](CircuitBreakerBuilder::half_open_max_attempts)
//! consecutive probe successes close the circuit and clear the window, so
//! pre-outage failures cannot trip it again. A single probe failure reopens the
//! circuit for a full reset timeout. Probe outcomes never enter the window.
//!
//! # Failure Classification
//!
//! Not every error says something about the health of the dependency. The
//! classifier decides which errors count against the circuit; errors it deems
//! benign are propagated to the caller but recorded as successes. The default
//! classifier, available for error types implementing [`ErrorStatus`], counts
//! errors with a status code of 500 or above and errors carrying no status code
//! at all. Use
//! [`classify_with`](CircuitBreakerBuilder::classify_with) or
//! [`builder_with_classifier`](CircuitBreaker::builder_with_classifier) to
//! replace it.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Description | Configured By |
//! |-----------|---------------|-------------|---------------|
//! | Failure threshold | `50.0` (50%) | Circuit opens when the failure rate reaches this percentage | [`failure_threshold`](CircuitBreakerBuilder::failure_threshold) |
//! | Minimum requests | `10` | Minimum number of outcomes in the window before the circuit can open | [`minimum_requests`](CircuitBreakerBuilder::minimum_requests) |
//! | Reset timeout | `30` seconds | Duration the circuit remains open before testing recovery | [`reset_timeout`](CircuitBreakerBuilder::reset_timeout) |
//! | Half-open max attempts | `3` | Probe successes required to close the circuit | [`half_open_max_attempts`](CircuitBreakerBuilder::half_open_max_attempts) |
//! | Window size | `100` entries | Maximum number of outcomes kept in the sliding window | [`window_size`](CircuitBreakerBuilder::window_size) |
//! | Window duration | `60` seconds | Maximum age of an outcome before it leaves the window | [`window_duration`](CircuitBreakerBuilder::window_duration) |
//!
//! These defaults provide a reasonable starting point for most use cases,
//! offering a balance between resilience and responsiveness to recovery.
//!
//! # Telemetry
//!
//! ## Metrics (`metrics` feature)
//!
//! - **Metric**: `resilience.event` (counter)
//! - **When**: Emitted on circuit state transitions and when calls are rejected
//! - **Attributes**:
//!   - `resilience.circuit_breaker.name`: Breaker identifier from the builder
//!   - `resilience.event.name`: One of `circuit_opened`, `circuit_closed`,
//!     `circuit_half_open`, `circuit_rejected`
//!   - `resilience.circuit_breaker.state`: The state the event reports
//!     (`closed`, `open`, or `half_open`)
//!
//! ## Logs (`logs` feature)
//!
//! Structured [`tracing`] events are emitted for the same occurrences:
//! `fusebox.circuit_breaker.opened` (warn), `fusebox.circuit_breaker.closed`,
//! `fusebox.circuit_breaker.half_open` (info), and
//! `fusebox.circuit_breaker.rejected` (warn).
//!
//! # Features
//!
//! - `logs`: Emits structured log events via [`tracing`].
//! - `metrics`: Exposes the OpenTelemetry metrics API for counting circuit
//!   events, configured through
//!   [`meter_provider`](CircuitBreakerBuilder::meter_provider).

mod args;
mod breaker;
mod callbacks;
mod classify;
mod constants;
mod engine;
mod error;
mod fn_wrapper;
mod options;
mod state;
#[cfg(any(feature = "metrics", test))]
mod telemetry;
#[cfg(test)]
mod testing;
mod window;

pub(crate) use fn_wrapper::define_fn_wrapper;

pub use args::{OutcomeArgs, StateChangeArgs};
pub use breaker::CircuitBreaker;
pub use classify::ErrorStatus;
pub use error::{CircuitOpenError, ExecuteError};
pub use options::CircuitBreakerBuilder;
pub use state::CircuitState;
pub use window::WindowStats;

#[doc(inline)]
pub use sundial::Clock;
