// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use sundial::Clock;

use crate::constants::ERR_POISONED_LOCK;
use crate::error::CircuitOpenError;
use crate::state::CircuitState;
use crate::window::{OutcomeWindow, WindowStats};

/// Tunables that drive the state machine. Validated by the builder before the
/// engine is constructed.
#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub failure_threshold: f64,
    pub reset_timeout: Duration,
    pub half_open_max_attempts: u32,
    pub minimum_requests: usize,
    pub window_size: usize,
    pub window_duration: Duration,
}

/// The verdict handed out when a call asks to pass through the circuit.
#[derive(Debug)]
pub(crate) enum EnterResult {
    Accepted { probe: bool },
    Rejected(CircuitOpenError),
}

/// Holds a half-open probe slot until the call settles.
///
/// An admitted probe may never reach settlement: the caller can drop the
/// future mid-flight, for example through a caller-side timeout. Dropping an
/// undisarmed guard returns the slot, so abandoned probes cannot pin the
/// circuit in half-open with a permanently saturated probe budget.
#[derive(Debug)]
pub(crate) struct ProbeSlot<'a> {
    engine: &'a Engine,
    armed: bool,
}

impl<'a> ProbeSlot<'a> {
    fn new(engine: &'a Engine) -> Self {
        Self { engine, armed: true }
    }

    /// Defuses the guard; the settlement path owns the slot from here on.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.abandon_probe();
        }
    }
}

/// A state transition that just happened, reported so callbacks and telemetry
/// can be fired outside the lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub failure_rate: f64,
}

/// Engine that manages the state of the circuit breaker.
///
/// All decisions happen under a single mutex; admission and settlement are
/// separate critical sections, so the state seen at settlement may differ from
/// the one seen at admission.
#[derive(Debug)]
pub(crate) struct Engine {
    core: Mutex<Core>,
    options: EngineOptions,
    clock: Clock,
}

impl Engine {
    pub fn new(options: EngineOptions, clock: Clock) -> Self {
        let window = OutcomeWindow::new(options.window_size, options.window_duration);
        Self {
            core: Mutex::new(Core {
                state: State::Closed,
                window,
                last_failure_rate: 0.0,
            }),
            options,
            clock,
        }
    }

    /// Asks the circuit to admit one call. An expired open period is resolved
    /// here, so the returned transition (if any) must be reported.
    pub fn enter(&self) -> (EnterResult, Option<Transition>) {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        self.core.lock().expect(ERR_POISONED_LOCK).enter(now, &self.options)
    }

    /// Claims the guard for a probe that [`enter`](Self::enter) just
    /// admitted. Must be disarmed when the probe settles through
    /// [`exit`](Self::exit).
    pub fn probe_slot(&self) -> ProbeSlot<'_> {
        ProbeSlot::new(self)
    }

    /// Returns the slot of a probe that was admitted but will never settle.
    /// A no-op when the circuit has already moved on, since the half-open
    /// bookkeeping was discarded with the state.
    fn abandon_probe(&self) {
        let mut core = self.core.lock().expect(ERR_POISONED_LOCK);

        if let State::HalfOpen { in_flight, .. } = &mut core.state {
            *in_flight = in_flight.saturating_sub(1);
        }
    }

    /// Settles a previously admitted call. `probe` is the admission mode the
    /// call was accepted under, which keeps the half-open in-flight count
    /// honest when calls settle late.
    pub fn exit(&self, failure: bool, probe: bool) -> Option<Transition> {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        self.core.lock().expect(ERR_POISONED_LOCK).exit(failure, probe, now, &self.options)
    }

    /// The current state, after resolving an expired open period.
    pub fn current_state(&self) -> (CircuitState, Option<Transition>) {
        let now = self.clock.instant();

        let mut core = self.core.lock().expect(ERR_POISONED_LOCK);
        let transition = core.refresh(now);
        (core.state.circuit_state(), transition)
    }

    /// A summary of the outcome window, after resolving an expired open
    /// period.
    pub fn stats(&self) -> (WindowStats, Option<Transition>) {
        let now = self.clock.instant();

        let mut core = self.core.lock().expect(ERR_POISONED_LOCK);
        let transition = core.refresh(now);
        (core.window.stats(now), transition)
    }

    /// Forces the circuit back to closed and discards all recorded outcomes.
    pub fn reset(&self) -> Option<Transition> {
        let mut core = self.core.lock().expect(ERR_POISONED_LOCK);

        let from = core.state.circuit_state();
        core.state = State::Closed;
        core.window.reset();
        core.last_failure_rate = 0.0;

        (from != CircuitState::Closed).then_some(Transition {
            from,
            to: CircuitState::Closed,
            failure_rate: 0.0,
        })
    }
}

#[derive(Debug)]
struct Core {
    state: State,
    window: OutcomeWindow,
    last_failure_rate: f64,
}

#[derive(Debug)]
enum State {
    Closed,
    Open { open_until: Instant },
    HalfOpen { successes: u32, in_flight: u32 },
}

impl State {
    fn circuit_state(&self) -> CircuitState {
        match self {
            Self::Closed => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl Core {
    /// Moves an expired open period to half-open. There is no background
    /// timer; this runs at every observation point instead.
    fn refresh(&mut self, now: Instant) -> Option<Transition> {
        if let State::Open { open_until } = self.state
            && now >= open_until
        {
            self.state = State::HalfOpen {
                successes: 0,
                in_flight: 0,
            };
            return Some(Transition {
                from: CircuitState::Open,
                to: CircuitState::HalfOpen,
                failure_rate: self.window.stats(now).failure_rate(),
            });
        }

        None
    }

    fn enter(&mut self, now: Instant, options: &EngineOptions) -> (EnterResult, Option<Transition>) {
        let transition = self.refresh(now);

        let result = match &mut self.state {
            State::Closed => EnterResult::Accepted { probe: false },
            State::Open { open_until } => {
                let retry_after = open_until.saturating_duration_since(now);
                EnterResult::Rejected(CircuitOpenError::new(
                    options.reset_timeout,
                    self.last_failure_rate,
                    retry_after,
                ))
            }
            State::HalfOpen { successes, in_flight } => {
                // Successes already banked plus calls still in flight; once they
                // cover the required probe count, nothing else gets through.
                if successes.saturating_add(*in_flight) >= options.half_open_max_attempts {
                    EnterResult::Rejected(CircuitOpenError::new(
                        options.reset_timeout,
                        self.last_failure_rate,
                        Duration::ZERO,
                    ))
                } else {
                    *in_flight += 1;
                    EnterResult::Accepted { probe: true }
                }
            }
        };

        (result, transition)
    }

    fn exit(&mut self, failure: bool, probe: bool, now: Instant, options: &EngineOptions) -> Option<Transition> {
        match &mut self.state {
            State::Closed => {
                self.window.record(!failure, now);

                if !failure {
                    return None;
                }

                let stats = self.window.stats(now);
                if stats.total() >= options.minimum_requests && stats.failure_rate() >= options.failure_threshold {
                    self.last_failure_rate = stats.failure_rate();
                    self.state = State::Open {
                        open_until: now + options.reset_timeout,
                    };
                    return Some(Transition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                        failure_rate: stats.failure_rate(),
                    });
                }

                None
            }
            State::Open { .. } => {
                // The circuit opened between this call's admission and its
                // settlement. The outcome is stale; ignore it.
                None
            }
            State::HalfOpen { successes, in_flight } => {
                if probe {
                    *in_flight = in_flight.saturating_sub(1);
                }

                if failure {
                    // One failed probe is enough; reopen for a full timeout.
                    // The rate reported is the one that originally tripped the
                    // circuit, since no new outcomes were recorded since.
                    self.state = State::Open {
                        open_until: now + options.reset_timeout,
                    };
                    return Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Open,
                        failure_rate: self.last_failure_rate,
                    });
                }

                *successes += 1;
                if *successes >= options.half_open_max_attempts {
                    // Recovery confirmed. Start over with a clean window so
                    // pre-outage failures cannot trip the circuit again.
                    self.state = State::Closed;
                    self.window.reset();
                    self.last_failure_rate = 0.0;
                    return Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Closed,
                        failure_rate: 0.0,
                    });
                }

                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sundial::ClockControl;

    use super::*;

    fn create_test_options() -> EngineOptions {
        EngineOptions {
            failure_threshold: 50.0,
            reset_timeout: Duration::from_secs(5),
            half_open_max_attempts: 1,
            minimum_requests: 2,
            window_size: 100,
            window_duration: Duration::from_secs(60),
        }
    }

    fn create_test_engine() -> Engine {
        Engine::new(create_test_options(), Clock::new_frozen())
    }

    fn open_engine(engine: &Engine) {
        const MAX_ATTEMPTS: usize = 1000;

        for _attempt in 0..MAX_ATTEMPTS {
            let _ = engine.enter();
            let transition = engine.exit(true, false);
            if transition.is_some_and(|t| t.to == CircuitState::Open) {
                return;
            }
        }

        panic!("failed to open the circuit after {MAX_ATTEMPTS} attempts");
    }

    #[test]
    fn new_engine_starts_closed() {
        let engine = create_test_engine();

        let (result, transition) = engine.enter();

        assert!(matches!(result, EnterResult::Accepted { probe: false }));
        assert!(transition.is_none());
        assert_eq!(engine.current_state().0, CircuitState::Closed);
    }

    #[test]
    fn success_in_closed_state_never_opens() {
        let engine = create_test_engine();

        for _ in 0..50 {
            let _ = engine.enter();
            assert!(engine.exit(false, false).is_none());
        }

        assert_eq!(engine.current_state().0, CircuitState::Closed);
    }

    #[test]
    fn failures_below_minimum_requests_stay_closed() {
        let options = EngineOptions {
            minimum_requests: 10,
            ..create_test_options()
        };
        let engine = Engine::new(options, Clock::new_frozen());

        for _ in 0..9 {
            let _ = engine.enter();
            assert!(engine.exit(true, false).is_none());
        }

        assert_eq!(engine.current_state().0, CircuitState::Closed);
    }

    #[test]
    fn failures_at_threshold_open_circuit() {
        let options = EngineOptions {
            minimum_requests: 10,
            ..create_test_options()
        };
        let engine = Engine::new(options, Clock::new_frozen());

        // 5 successes then 4 failures: 9 samples, below the minimum.
        for _ in 0..5 {
            let _ = engine.enter();
            engine.exit(false, false);
        }
        for _ in 0..4 {
            let _ = engine.enter();
            assert!(engine.exit(true, false).is_none());
        }

        // Tenth sample makes it 5 failures out of 10, exactly at 50%.
        let _ = engine.enter();
        let transition = engine.exit(true, false).expect("circuit should open");

        assert_eq!(transition.from, CircuitState::Closed);
        assert_eq!(transition.to, CircuitState::Open);
        assert!((transition.failure_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failures_below_threshold_stay_closed() {
        let options = EngineOptions {
            minimum_requests: 10,
            ..create_test_options()
        };
        let engine = Engine::new(options, Clock::new_frozen());

        // 6 successes and 4 failures: 40%, below the 50% threshold.
        for _ in 0..6 {
            let _ = engine.enter();
            engine.exit(false, false);
        }
        for _ in 0..4 {
            let _ = engine.enter();
            assert!(engine.exit(true, false).is_none());
        }

        assert_eq!(engine.current_state().0, CircuitState::Closed);
    }

    #[test]
    fn open_circuit_rejects_with_context() {
        let engine = create_test_engine();
        open_engine(&engine);

        let (result, _) = engine.enter();

        let EnterResult::Rejected(rejection) = result else {
            panic!("expected a rejection");
        };
        assert_eq!(rejection.reset_timeout(), Duration::from_secs(5));
        assert!((rejection.failure_rate() - 100.0).abs() < f64::EPSILON);
        assert!(rejection.retry_after() <= Duration::from_secs(5));
        assert!(rejection.retry_after() > Duration::ZERO);
    }

    #[test]
    fn open_circuit_transitions_to_half_open_after_timeout() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);

        control.advance(Duration::from_secs(6));

        let (result, transition) = engine.enter();
        assert!(matches!(result, EnterResult::Accepted { probe: true }));
        let transition = transition.expect("the expired open period should be resolved");
        assert_eq!(transition.from, CircuitState::Open);
        assert_eq!(transition.to, CircuitState::HalfOpen);
    }

    #[test]
    fn state_observation_resolves_expired_open_period() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);

        control.advance(Duration::from_secs(6));

        let (state, transition) = engine.current_state();
        assert_eq!(state, CircuitState::HalfOpen);
        assert!(transition.is_some());

        // Already resolved; a second look reports nothing new.
        let (state, transition) = engine.current_state();
        assert_eq!(state, CircuitState::HalfOpen);
        assert!(transition.is_none());
    }

    #[test]
    fn stats_observation_resolves_expired_open_period() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);

        control.advance(Duration::from_secs(6));

        let (_, transition) = engine.stats();
        assert!(transition.is_some_and(|t| t.to == CircuitState::HalfOpen));
    }

    #[test]
    fn half_open_admits_at_most_the_probe_budget() {
        let options = EngineOptions {
            half_open_max_attempts: 2,
            ..create_test_options()
        };
        let control = ClockControl::new();
        let engine = Engine::new(options, control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let (first, _) = engine.enter();
        let (second, _) = engine.enter();
        let (third, _) = engine.enter();

        assert!(matches!(first, EnterResult::Accepted { probe: true }));
        assert!(matches!(second, EnterResult::Accepted { probe: true }));
        let EnterResult::Rejected(rejection) = third else {
            panic!("expected the third probe to be rejected");
        };
        assert_eq!(rejection.retry_after(), Duration::ZERO);
    }

    #[test]
    fn settled_probe_frees_its_slot_until_successes_cover_the_budget() {
        let options = EngineOptions {
            half_open_max_attempts: 2,
            ..create_test_options()
        };
        let control = ClockControl::new();
        let engine = Engine::new(options, control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        // One success banked, one slot left.
        let _ = engine.enter();
        assert!(engine.exit(false, true).is_none());

        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Accepted { probe: true }));

        // Banked success plus the in-flight probe cover the budget.
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Rejected(_)));
    }

    #[test]
    fn probe_successes_close_circuit_and_clear_window() {
        let options = EngineOptions {
            half_open_max_attempts: 2,
            ..create_test_options()
        };
        let control = ClockControl::new();
        let engine = Engine::new(options, control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let _ = engine.enter();
        assert!(engine.exit(false, true).is_none());

        let _ = engine.enter();
        let transition = engine.exit(false, true).expect("circuit should close");

        assert_eq!(transition.from, CircuitState::HalfOpen);
        assert_eq!(transition.to, CircuitState::Closed);
        assert!((transition.failure_rate - 0.0).abs() < f64::EPSILON);

        // Pre-outage failures are gone.
        let (stats, _) = engine.stats();
        assert_eq!(stats.total(), 0);
        assert_eq!(engine.current_state().0, CircuitState::Closed);
    }

    #[test]
    fn probe_failure_reopens_circuit() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let _ = engine.enter();
        let transition = engine.exit(true, true).expect("circuit should reopen");

        assert_eq!(transition.from, CircuitState::HalfOpen);
        assert_eq!(transition.to, CircuitState::Open);
        // The rate that originally tripped the circuit is carried over.
        assert!((transition.failure_rate - 100.0).abs() < f64::EPSILON);

        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Rejected(_)));
    }

    #[test]
    fn reopened_circuit_waits_a_full_timeout() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let _ = engine.enter();
        engine.exit(true, true);

        // Just before the new timeout expires.
        control.advance(Duration::from_millis(4999));
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Rejected(_)));

        // Just after.
        control.advance(Duration::from_millis(2));
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Accepted { probe: true }));
    }

    #[test]
    fn dropped_probe_slot_frees_the_budget() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let (first, _) = engine.enter();
        assert!(matches!(first, EnterResult::Accepted { probe: true }));
        let slot = engine.probe_slot();

        // The only slot is taken, so further calls bounce.
        let (second, _) = engine.enter();
        assert!(matches!(second, EnterResult::Rejected(_)));

        // The probe never settles; dropping the guard returns the slot.
        drop(slot);

        let (third, _) = engine.enter();
        assert!(matches!(third, EnterResult::Accepted { probe: true }));
        let transition = engine.exit(false, true).expect("circuit should close");
        assert_eq!(transition.to, CircuitState::Closed);
    }

    #[test]
    fn disarmed_probe_slot_leaves_the_bookkeeping_to_exit() {
        let options = EngineOptions {
            half_open_max_attempts: 2,
            ..create_test_options()
        };
        let control = ClockControl::new();
        let engine = Engine::new(options, control.to_clock());
        open_engine(&engine);
        control.advance(Duration::from_secs(6));

        let _ = engine.enter();
        let slot = engine.probe_slot();
        slot.disarm();
        assert!(engine.exit(false, true).is_none());

        // One success banked: exactly one slot left, not two.
        let (first, _) = engine.enter();
        assert!(matches!(first, EnterResult::Accepted { probe: true }));
        let (second, _) = engine.enter();
        assert!(matches!(second, EnterResult::Rejected(_)));
    }

    #[test]
    fn settlement_in_open_state_is_ignored() {
        let control = ClockControl::new();
        let engine = Engine::new(create_test_options(), control.to_clock());

        // A call is admitted while closed but the circuit opens before it
        // settles.
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Accepted { probe: false }));
        open_engine(&engine);

        assert!(engine.exit(false, false).is_none());
        assert_eq!(engine.current_state().0, CircuitState::Open);
    }

    #[test]
    fn reset_returns_to_closed_and_clears_window() {
        let engine = create_test_engine();
        open_engine(&engine);

        let transition = engine.reset().expect("reset should report the transition");

        assert_eq!(transition.from, CircuitState::Open);
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(engine.current_state().0, CircuitState::Closed);
        let (stats, _) = engine.stats();
        assert_eq!(stats.total(), 0);

        // Resetting an already closed circuit is a no-op.
        assert!(engine.reset().is_none());
    }

    #[test]
    fn engine_with_custom_reset_timeout() {
        let options = EngineOptions {
            reset_timeout: Duration::from_millis(100),
            ..create_test_options()
        };
        let control = ClockControl::new();
        let engine = Engine::new(options, control.to_clock());
        open_engine(&engine);

        control.advance(Duration::from_millis(99));
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Rejected(_)));

        control.advance(Duration::from_millis(2));
        let (result, _) = engine.enter();
        assert!(matches!(result, EnterResult::Accepted { probe: true }));
    }
}
