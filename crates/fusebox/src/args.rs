// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use crate::state::CircuitState;

/// Arguments passed to the `on_state_change` callback.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct StateChangeArgs {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
    pub(crate) failure_rate: f64,
    pub(crate) at: SystemTime,
}

impl StateChangeArgs {
    /// The state the circuit left.
    #[must_use]
    pub fn from(&self) -> CircuitState {
        self.from
    }

    /// The state the circuit entered.
    #[must_use]
    pub fn to(&self) -> CircuitState {
        self.to
    }

    /// The failure rate, in percent, associated with the transition.
    ///
    /// For transitions into [`CircuitState::Open`] this is the rate that
    /// tripped the circuit; for transitions into [`CircuitState::Closed`] the
    /// window was just cleared and the rate is `0.0`.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// When the transition happened.
    #[must_use]
    pub fn at(&self) -> SystemTime {
        self.at
    }
}

/// Arguments passed to the `on_success` and `on_failure` callbacks.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct OutcomeArgs {
    pub(crate) state: CircuitState,
    pub(crate) latency: Duration,
    pub(crate) at: SystemTime,
}

impl OutcomeArgs {
    /// The state the circuit was in when it admitted the call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// How long the guarded operation took.
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// When the call settled.
    #[must_use]
    pub fn at(&self) -> SystemTime {
        self.at
    }
}
