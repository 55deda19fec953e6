// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Minimal clock abstraction with controllable time for tests.
//!
//! # Why
//!
//! Code that compares "now" against stored timestamps is slow and flaky to test against the
//! real clock. This crate provides [`Clock`], a cheap handle that reads machine time in
//! production and, when the `test-util` feature is enabled, can instead read manually
//! controlled time through [`ClockControl`]. Tests jump forward in time instead of sleeping.
//!
//! Unlike heavier time crates, `sundial` has no timers and no runtime integration: it only
//! answers "what time is it right now", both as a monotonic [`Instant`] and as an absolute
//! [`SystemTime`]. That is the entire contract consumers should rely on.
//!
//! # Examples
//!
//! Reading time through a clock:
//!
//! ```
//! use sundial::Clock;
//!
//! # fn read_time(clock: &Clock) {
//! let start = clock.instant();
//! // ... perform some work ...
//! let elapsed = clock.instant().duration_since(start);
//! # }
//! ```
//!
//! Controlling time in tests (requires the `test-util` feature):
//!
//! ```
//! # #[cfg(feature = "test-util")]
//! # {
//! use std::time::Duration;
//!
//! use sundial::ClockControl;
//!
//! let control = ClockControl::new();
//! let clock = control.to_clock();
//!
//! let before = clock.instant();
//! control.advance(Duration::from_secs(30));
//!
//! assert_eq!(clock.instant().duration_since(before), Duration::from_secs(30));
//! # }
//! ```

use std::sync::Arc;
#[cfg(any(feature = "test-util", test))]
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

#[cfg(any(feature = "test-util", test))]
const ERR_POISONED_LOCK: &str = "poisoned lock - controlled time can no longer be read consistently";

/// A handle for reading the current time.
///
/// By default a clock reads machine time ([`Instant::now`] and [`SystemTime::now`]). Clocks
/// created from a [`ClockControl`] instead read manually controlled time, which makes
/// time-dependent code testable without sleeping.
///
/// Cloning a clock is inexpensive and all clones share the same time source: advancing a
/// [`ClockControl`] is observed by every clock derived from it.
///
/// # Examples
///
/// ```
/// use sundial::Clock;
///
/// let clock = Clock::new();
/// let t1 = clock.instant();
/// let t2 = clock.instant();
/// assert!(t2 >= t1);
/// ```
#[derive(Debug, Clone)]
pub struct Clock(ClockState);

#[derive(Debug, Clone)]
enum ClockState {
    System,
    #[cfg(any(feature = "test-util", test))]
    Controlled(Arc<ControlState>),
}

impl Clock {
    /// Creates a clock backed by machine time.
    #[must_use]
    pub fn new() -> Self {
        Self(ClockState::System)
    }

    /// Creates a clock whose time never advances on its own.
    ///
    /// This is a convenience method equivalent to `ClockControl::new().to_clock()`. The
    /// returned clock reports the same instant and system time on every read.
    ///
    /// # Examples
    ///
    /// ```
    /// use sundial::Clock;
    ///
    /// let clock = Clock::new_frozen();
    /// assert_eq!(clock.instant(), clock.instant());
    /// ```
    #[cfg(any(feature = "test-util", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    #[must_use]
    pub fn new_frozen() -> Self {
        ClockControl::new().to_clock()
    }

    /// Retrieves the current monotonic time.
    ///
    /// For system-backed clocks this is [`Instant::now`]. For controlled clocks it is the
    /// control's anchor instant plus whatever time has been manually advanced.
    ///
    /// > **Important**: when measuring elapsed time, use [`Instant::duration_since`] against
    /// > another instant read from the same clock. `Instant::elapsed` bypasses the clock and
    /// > reads machine time directly, which ignores controlled time in tests.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            ClockState::System => Instant::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockState::Controlled(control) => control.instant(),
        }
    }

    /// Retrieves the current absolute time in UTC.
    ///
    /// > **Note**: system time is not monotonic and can move backwards when the machine
    /// > clock is adjusted. Prefer [`instant`][Self::instant] for elapsed-time measurements.
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        match &self.0 {
            ClockState::System => SystemTime::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockState::Controlled(control) => control.system_time(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(feature = "test-util", test))]
#[derive(Debug)]
struct ControlState {
    anchor_instant: Instant,
    anchor_time: SystemTime,
    offset: Mutex<Duration>,
}

#[cfg(any(feature = "test-util", test))]
impl ControlState {
    fn instant(&self) -> Instant {
        self.anchor_instant + *self.offset.lock().expect(ERR_POISONED_LOCK)
    }

    fn system_time(&self) -> SystemTime {
        self.anchor_time + *self.offset.lock().expect(ERR_POISONED_LOCK)
    }
}

/// Controls the flow of time in tests.
///
/// Time controlled by a `ClockControl` stands still until [`advance`][Self::advance] is
/// called, which makes tests of timeout- and window-based logic both instant and fully
/// deterministic. `ClockControl` is available when the `test-util` feature is enabled.
///
/// System time starts at [`SystemTime::UNIX_EPOCH`] so tests produce stable absolute
/// timestamps, unless [`new_at`][Self::new_at] specifies otherwise.
///
/// # Production code and `ClockControl`
///
/// Never enable the `test-util` feature in production code. Always ensure the feature is
/// only enabled through `dev-dependencies`:
///
/// ```toml
/// sundial = { version = "*", features = ["test-util"] }
/// ```
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sundial::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let start = clock.instant();
/// control.advance(Duration::from_millis(150));
///
/// assert_eq!(clock.instant().duration_since(start), Duration::from_millis(150));
/// ```
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
#[derive(Debug, Clone)]
pub struct ClockControl {
    state: Arc<ControlState>,
}

#[cfg(any(feature = "test-util", test))]
impl ClockControl {
    /// Creates a new `ClockControl` with system time anchored at the UNIX epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::new_at(SystemTime::UNIX_EPOCH)
    }

    /// Creates a new `ClockControl` with system time anchored at the given timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    ///
    /// use sundial::ClockControl;
    ///
    /// let anchor = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    /// let clock = ClockControl::new_at(anchor).to_clock();
    ///
    /// assert_eq!(clock.system_time(), anchor);
    /// ```
    #[must_use]
    pub fn new_at(time: impl Into<SystemTime>) -> Self {
        Self {
            state: Arc::new(ControlState {
                anchor_instant: Instant::now(),
                anchor_time: time.into(),
                offset: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Creates a [`Clock`] that reads this control's time.
    ///
    /// All clocks created from the same control (and their clones) observe the same time.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock(ClockState::Controlled(Arc::clone(&self.state)))
    }

    /// Moves time forward by the given duration.
    ///
    /// Every clock derived from this control observes the jump immediately.
    pub fn advance(&self, step: Duration) {
        let mut offset = self.state.offset.lock().expect(ERR_POISONED_LOCK);
        *offset += step;
    }
}

#[cfg(any(feature = "test-util", test))]
impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}
