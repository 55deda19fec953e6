// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// The operating state of a circuit breaker.
///
/// A breaker starts out [`Closed`](CircuitState::Closed) and moves between the
/// states based on the outcomes of the calls it guards. See the crate
/// documentation for the full transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls flow through normally while outcomes are tracked.
    Closed,

    /// Calls are rejected immediately without invoking the dependency.
    Open,

    /// A limited number of probe calls are let through to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Returns the canonical snake_case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(CircuitState: Send, Sync, Copy, Display);
    }

    #[test]
    fn as_str_matches_display() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            assert_eq!(state.as_str(), state.to_string());
        }
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }
}
