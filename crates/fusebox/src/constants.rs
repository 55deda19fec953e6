// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default failure rate, in percent, at or above which the circuit opens.
pub(crate) const DEFAULT_FAILURE_THRESHOLD: f64 = 50.0;

/// Default time the circuit stays open before admitting probe calls.
pub(crate) const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of consecutive probe successes required to close the
/// circuit, which is also the cap on concurrent probes while half-open.
pub(crate) const DEFAULT_HALF_OPEN_MAX_ATTEMPTS: u32 = 3;

/// Default minimum number of outcomes the window must hold before the failure
/// threshold is evaluated.
pub(crate) const DEFAULT_MINIMUM_REQUESTS: usize = 10;

/// Default maximum number of outcomes kept in the sliding window.
pub(crate) const DEFAULT_WINDOW_SIZE: usize = 100;

/// Default maximum age of an outcome before it is evicted from the window.
pub(crate) const DEFAULT_WINDOW_DURATION: Duration = Duration::from_secs(60);

/// Default name used in telemetry when none is configured.
pub(crate) const DEFAULT_NAME: &str = "circuit_breaker";

pub(crate) const ERR_POISONED_LOCK: &str = "a thread holding the lock panicked, invariants may be violated, cannot continue";
