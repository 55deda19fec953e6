// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use sundial::Clock;

use crate::args::{OutcomeArgs, StateChangeArgs};
use crate::callbacks::{IsFailure, OnFailure, OnStateChange, OnSuccess};
use crate::classify::ErrorStatus;
use crate::engine::{Engine, EngineOptions, EnterResult, Transition};
use crate::error::ExecuteError;
use crate::options::CircuitBreakerBuilder;
use crate::state::CircuitState;
use crate::window::WindowStats;

/// A circuit breaker guarding calls to one unreliable dependency.
///
/// Created through [`CircuitBreaker::builder`]. All methods take `&self` and
/// the breaker is `Send + Sync`, so one instance wrapped in an `Arc` can guard
/// calls from any number of tasks.
///
/// See the crate documentation for the state machine and the configuration
/// defaults.
#[derive(Debug)]
pub struct CircuitBreaker<E> {
    engine: Engine,
    clock: Clock,
    classify: IsFailure<E>,
    on_state_change: Option<OnStateChange>,
    on_success: Option<OnSuccess>,
    on_failure: Option<OnFailure<E>>,
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    name: std::borrow::Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    events: Option<opentelemetry::metrics::Counter<u64>>,
}

impl<E: ErrorStatus> CircuitBreaker<E> {
    /// Starts building a breaker with the default failure classifier: errors
    /// whose [`ErrorStatus::status_code`] is 500 or above count as failures,
    /// as do errors carrying no status code at all.
    pub fn builder(clock: &Clock) -> CircuitBreakerBuilder<E> {
        CircuitBreakerBuilder::new(clock)
    }
}

impl<E> CircuitBreaker<E> {
    /// Starts building a breaker with a custom failure classifier, for error
    /// types that do not implement [`ErrorStatus`].
    pub fn builder_with_classifier(
        clock: &Clock,
        classify: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> CircuitBreakerBuilder<E> {
        CircuitBreakerBuilder::with_classifier(clock, classify)
    }

    pub(crate) fn from_builder(builder: CircuitBreakerBuilder<E>) -> Self {
        let options = EngineOptions {
            failure_threshold: builder.failure_threshold,
            reset_timeout: builder.reset_timeout,
            half_open_max_attempts: builder.half_open_max_attempts,
            minimum_requests: builder.minimum_requests,
            window_size: builder.window_size,
            window_duration: builder.window_duration,
        };

        Self {
            engine: Engine::new(options, builder.clock.clone()),
            clock: builder.clock,
            classify: builder.classify,
            on_state_change: builder.on_state_change,
            on_success: builder.on_success,
            on_failure: builder.on_failure,
            #[cfg(any(feature = "logs", feature = "metrics", test))]
            name: builder.name,
            #[cfg(any(feature = "metrics", test))]
            events: builder.events,
        }
    }

    /// Runs `operation` under the protection of the circuit.
    ///
    /// While the circuit is closed or the call is admitted as a probe, the
    /// operation is invoked with `input` and its result is returned, with
    /// errors wrapped in [`ExecuteError::Operation`]. While the circuit is
    /// open, the operation is never invoked and the call fails immediately
    /// with [`ExecuteError::Rejected`].
    ///
    /// The outcome is classified and recorded after the operation settles;
    /// errors the classifier deems benign are propagated to the caller but
    /// recorded as successes.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Rejected`] when the circuit is not accepting
    /// traffic, and [`ExecuteError::Operation`] when the operation itself
    /// failed.
    pub async fn execute<In, Out, F, Fut>(&self, input: In, operation: F) -> Result<Out, ExecuteError<E>>
    where
        F: FnOnce(In) -> Fut,
        Fut: Future<Output = Result<Out, E>>,
    {
        let (admission, transition) = self.engine.enter();
        self.notify_transition(transition);

        let probe = match admission {
            EnterResult::Accepted { probe } => probe,
            EnterResult::Rejected(rejection) => {
                #[cfg(any(feature = "metrics", test))]
                if let Some(events) = &self.events {
                    events.add(
                        1,
                        &[
                            opentelemetry::KeyValue::new(crate::telemetry::BREAKER_NAME, self.name.to_string()),
                            opentelemetry::KeyValue::new(
                                crate::telemetry::EVENT_NAME,
                                crate::telemetry::CIRCUIT_REJECTED_EVENT_NAME,
                            ),
                            opentelemetry::KeyValue::new(crate::telemetry::CIRCUIT_STATE, CircuitState::Open.as_str()),
                        ],
                    );
                }

                #[cfg(any(feature = "logs", test))]
                tracing::event!(
                    name: "fusebox.circuit_breaker.rejected",
                    tracing::Level::WARN,
                    circuit_breaker.name = self.name.as_ref(),
                    circuit_breaker.state = CircuitState::Open.as_str(),
                    circuit_breaker.failure_rate = rejection.failure_rate(),
                );

                return Err(ExecuteError::Rejected(rejection));
            }
        };

        let admitted_in = if probe { CircuitState::HalfOpen } else { CircuitState::Closed };

        // The slot guard keeps the half-open bookkeeping honest if the caller
        // drops this future before the operation settles.
        let slot = probe.then(|| self.engine.probe_slot());

        let started = self.clock.instant();
        let result = operation(input).await;
        let latency = self.clock.instant().saturating_duration_since(started);

        let failure = match &result {
            Ok(_) => false,
            Err(error) => self.classify.call(error),
        };

        match (&result, failure) {
            (Err(error), true) => {
                if let Some(on_failure) = &self.on_failure {
                    on_failure.call(
                        error,
                        OutcomeArgs {
                            state: admitted_in,
                            latency,
                            at: self.clock.system_time(),
                        },
                    );
                }
            }
            _ => {
                if let Some(on_success) = &self.on_success {
                    on_success.call(OutcomeArgs {
                        state: admitted_in,
                        latency,
                        at: self.clock.system_time(),
                    });
                }
            }
        }

        if let Some(slot) = slot {
            slot.disarm();
        }
        let transition = self.engine.exit(failure, probe);
        self.notify_transition(transition);

        result.map_err(ExecuteError::Operation)
    }

    /// The current state of the circuit.
    ///
    /// Observing the state resolves an expired open period, so this never
    /// reports [`CircuitState::Open`] once the reset timeout has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let (state, transition) = self.engine.current_state();
        self.notify_transition(transition);
        state
    }

    /// A summary of the outcomes currently in the sliding window.
    ///
    /// Like [`state`](Self::state), this resolves an expired open period
    /// before taking the summary.
    #[must_use]
    pub fn stats(&self) -> WindowStats {
        let (stats, transition) = self.engine.stats();
        self.notify_transition(transition);
        stats
    }

    /// Forces the circuit back to closed and discards all recorded outcomes,
    /// as if the breaker had just been created.
    ///
    /// Intended for operator tooling and tests; a breaker recovering on its
    /// own goes through half-open instead.
    pub fn reset(&self) {
        let transition = self.engine.reset();
        self.notify_transition(transition);
    }

    /// Fires the state change callback and telemetry. Runs outside the
    /// engine's lock; transitions are reported in the order the engine
    /// produced them on any given task.
    fn notify_transition(&self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };

        if let Some(on_state_change) = &self.on_state_change {
            on_state_change.call(StateChangeArgs {
                from: transition.from,
                to: transition.to,
                failure_rate: transition.failure_rate,
                at: self.clock.system_time(),
            });
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(events) = &self.events {
            let event_name = match transition.to {
                CircuitState::Open => crate::telemetry::CIRCUIT_OPENED_EVENT_NAME,
                CircuitState::Closed => crate::telemetry::CIRCUIT_CLOSED_EVENT_NAME,
                CircuitState::HalfOpen => crate::telemetry::CIRCUIT_HALF_OPEN_EVENT_NAME,
            };

            events.add(
                1,
                &[
                    opentelemetry::KeyValue::new(crate::telemetry::BREAKER_NAME, self.name.to_string()),
                    opentelemetry::KeyValue::new(crate::telemetry::EVENT_NAME, event_name),
                    opentelemetry::KeyValue::new(crate::telemetry::CIRCUIT_STATE, transition.to.as_str()),
                ],
            );
        }

        #[cfg(any(feature = "logs", test))]
        match transition.to {
            CircuitState::Open => tracing::event!(
                name: "fusebox.circuit_breaker.opened",
                tracing::Level::WARN,
                circuit_breaker.name = self.name.as_ref(),
                circuit_breaker.from = transition.from.as_str(),
                circuit_breaker.state = transition.to.as_str(),
                circuit_breaker.failure_rate = transition.failure_rate,
            ),
            CircuitState::HalfOpen => tracing::event!(
                name: "fusebox.circuit_breaker.half_open",
                tracing::Level::INFO,
                circuit_breaker.name = self.name.as_ref(),
                circuit_breaker.from = transition.from.as_str(),
                circuit_breaker.state = transition.to.as_str(),
            ),
            CircuitState::Closed => tracing::event!(
                name: "fusebox.circuit_breaker.closed",
                tracing::Level::INFO,
                circuit_breaker.name = self.name.as_ref(),
                circuit_breaker.from = transition.from.as_str(),
                circuit_breaker.state = transition.to.as_str(),
            ),
        }
    }
}
