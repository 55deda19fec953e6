// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

#[cfg(any(feature = "logs", feature = "metrics", test))]
use std::borrow::Cow;

use sundial::Clock;

use crate::args::{OutcomeArgs, StateChangeArgs};
use crate::breaker::CircuitBreaker;
use crate::callbacks::{IsFailure, OnFailure, OnStateChange, OnSuccess};
use crate::classify::{ErrorStatus, default_is_failure};
use crate::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_ATTEMPTS, DEFAULT_MINIMUM_REQUESTS, DEFAULT_RESET_TIMEOUT,
    DEFAULT_WINDOW_DURATION, DEFAULT_WINDOW_SIZE,
};

/// Configures and creates a [`CircuitBreaker`].
///
/// Obtained from [`CircuitBreaker::builder`] or
/// [`CircuitBreaker::builder_with_classifier`]. Every knob has a production
/// default; see the crate documentation for the full table.
#[derive(Debug)]
#[must_use]
pub struct CircuitBreakerBuilder<E> {
    pub(crate) clock: Clock,
    pub(crate) failure_threshold: f64,
    pub(crate) reset_timeout: Duration,
    pub(crate) half_open_max_attempts: u32,
    pub(crate) minimum_requests: usize,
    pub(crate) window_size: usize,
    pub(crate) window_duration: Duration,
    pub(crate) classify: IsFailure<E>,
    pub(crate) on_state_change: Option<OnStateChange>,
    pub(crate) on_success: Option<OnSuccess>,
    pub(crate) on_failure: Option<OnFailure<E>>,
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    pub(crate) name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) events: Option<opentelemetry::metrics::Counter<u64>>,
}

impl<E: ErrorStatus> CircuitBreakerBuilder<E> {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self::with_classifier(clock, |error: &E| default_is_failure(error))
    }
}

impl<E> CircuitBreakerBuilder<E> {
    pub(crate) fn with_classifier(clock: &Clock, classify: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            clock: clock.clone(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            half_open_max_attempts: DEFAULT_HALF_OPEN_MAX_ATTEMPTS,
            minimum_requests: DEFAULT_MINIMUM_REQUESTS,
            window_size: DEFAULT_WINDOW_SIZE,
            window_duration: DEFAULT_WINDOW_DURATION,
            classify: IsFailure::new(classify),
            on_state_change: None,
            on_success: None,
            on_failure: None,
            #[cfg(any(feature = "logs", feature = "metrics", test))]
            name: Cow::Borrowed(crate::constants::DEFAULT_NAME),
            #[cfg(any(feature = "metrics", test))]
            events: None,
        }
    }

    /// Sets the name this breaker reports in telemetry.
    ///
    /// Values should be short and concise, preferably in `snake_case`.
    /// Examples: `user_store`, `payment_gateway`.
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the failure rate, in percent, at or above which the circuit
    /// opens. Must be within `(0.0, 100.0]`.
    pub fn failure_threshold(mut self, threshold: f64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before admitting probe calls.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the number of consecutive probe successes required to close the
    /// circuit. The same value caps how many probes may be in flight at once
    /// while half-open.
    pub fn half_open_max_attempts(mut self, attempts: u32) -> Self {
        self.half_open_max_attempts = attempts;
        self
    }

    /// Sets the minimum number of outcomes the window must hold before the
    /// failure threshold is evaluated. Below this volume the circuit never
    /// opens.
    pub fn minimum_requests(mut self, requests: usize) -> Self {
        self.minimum_requests = requests;
        self
    }

    /// Sets the maximum number of outcomes kept in the sliding window.
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Sets the maximum age of an outcome before it is evicted from the
    /// window.
    pub fn window_duration(mut self, duration: Duration) -> Self {
        self.window_duration = duration;
        self
    }

    /// Replaces the failure classifier.
    ///
    /// The classifier decides whether an error counts against the circuit.
    /// Errors it returns `false` for are propagated to the caller but recorded
    /// as successes.
    pub fn classify_with(mut self, classify: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.classify = IsFailure::new(classify);
        self
    }

    /// Registers a callback invoked after every state transition.
    ///
    /// The callback runs outside the breaker's lock, on the task that caused
    /// the transition.
    pub fn on_state_change(mut self, callback: impl Fn(StateChangeArgs) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(OnStateChange::new(callback));
        self
    }

    /// Registers a callback invoked after every call that settles
    /// successfully, including calls whose error the classifier deemed
    /// benign.
    pub fn on_success(mut self, callback: impl Fn(OutcomeArgs) + Send + Sync + 'static) -> Self {
        self.on_success = Some(OnSuccess::new(callback));
        self
    }

    /// Registers a callback invoked after every call that settles with an
    /// error the classifier counts as a failure.
    pub fn on_failure(mut self, callback: impl Fn(&E, OutcomeArgs) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(OnFailure::new(callback));
        self
    }

    /// Sets the meter provider used to emit the `resilience.event` counter.
    #[cfg(any(feature = "metrics", test))]
    pub fn meter_provider(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.events = Some(crate::telemetry::create_event_counter(&crate::telemetry::create_meter(provider)));
        self
    }

    /// Creates the breaker.
    ///
    /// # Panics
    ///
    /// Panics if `window_size`, `window_duration`, `half_open_max_attempts`
    /// or `minimum_requests` is zero, or if `failure_threshold` is outside
    /// `(0.0, 100.0]`. These are configuration bugs, not runtime conditions.
    pub fn build(self) -> CircuitBreaker<E> {
        assert!(self.window_size > 0, "window_size must be greater than zero");
        assert!(!self.window_duration.is_zero(), "window_duration must be greater than zero");
        assert!(self.half_open_max_attempts > 0, "half_open_max_attempts must be greater than zero");
        assert!(self.minimum_requests > 0, "minimum_requests must be greater than zero");
        assert!(
            self.failure_threshold > 0.0 && self.failure_threshold <= 100.0,
            "failure_threshold must be within (0.0, 100.0], got {}",
            self.failure_threshold
        );

        CircuitBreaker::from_builder(self)
    }
}
