// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A point-in-time summary of the outcomes currently held in a breaker's
/// sliding window.
///
/// Returned by [`CircuitBreaker::stats`](crate::CircuitBreaker::stats). The
/// summary only covers entries that are still inside the window bounds; calls
/// rejected while the circuit was open are never part of it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct WindowStats {
    total: usize,
    successes: usize,
    failures: usize,
    failure_rate: f64,
}

impl WindowStats {
    /// The number of recorded outcomes currently in the window.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// The number of successful outcomes currently in the window.
    #[must_use]
    pub fn successes(&self) -> usize {
        self.successes
    }

    /// The number of failed outcomes currently in the window.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// The share of failures in the window, as a percentage in `0.0..=100.0`.
    ///
    /// An empty window reports `0.0`.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

/// A bounded, time-limited record of recent call outcomes.
///
/// The window holds at most `max_entries` outcomes and silently discards
/// entries older than `max_age`. Eviction is lazy: it happens when outcomes
/// are recorded or when a summary is taken, never in the background.
#[derive(Debug)]
pub(crate) struct OutcomeWindow {
    entries: VecDeque<OutcomeEntry>,
    max_entries: usize,
    max_age: Duration,
}

#[derive(Debug, Clone, Copy)]
struct OutcomeEntry {
    success: bool,
    at: Instant,
}

impl OutcomeWindow {
    pub(crate) fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            max_age,
        }
    }

    /// Records one outcome, evicting aged-out entries and, if the window is
    /// over capacity afterwards, the oldest entries beyond `max_entries`.
    pub(crate) fn record(&mut self, success: bool, now: Instant) {
        self.entries.push_back(OutcomeEntry { success, at: now });
        self.evict_aged(now);

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Summarizes the window after evicting aged-out entries.
    pub(crate) fn stats(&mut self, now: Instant) -> WindowStats {
        self.evict_aged(now);

        let total = self.entries.len();
        let failures = self.entries.iter().filter(|e| !e.success).count();

        #[expect(
            clippy::cast_precision_loss,
            reason = "window sizes are far below the f64 integer precision limit"
        )]
        let failure_rate = if total == 0 {
            0.0
        } else {
            failures as f64 / total as f64 * 100.0
        };

        WindowStats {
            total,
            successes: total - failures,
            failures,
            failure_rate,
        }
    }

    /// Discards all recorded outcomes.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }

    // Entries are pushed in clock order, so aged-out entries are always at the front.
    fn evict_aged(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.at) > self.max_age {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const MAX_AGE: Duration = Duration::from_secs(60);

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(WindowStats: Send, Sync, Copy);
        static_assertions::assert_impl_all!(OutcomeWindow: Send, Sync);
    }

    #[test]
    fn empty_window_reports_zero_rate() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);

        let stats = window.stats(Instant::now());

        assert_eq!(stats.total(), 0);
        assert_eq!(stats.successes(), 0);
        assert_eq!(stats.failures(), 0);
        assert!((stats.failure_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_and_rate() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let now = Instant::now();

        window.record(true, now);
        window.record(false, now);
        window.record(false, now);
        window.record(true, now);

        let stats = window.stats(now);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.successes(), 2);
        assert_eq!(stats.failures(), 2);
        assert!((stats.failure_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut window = OutcomeWindow::new(3, MAX_AGE);
        let now = Instant::now();

        window.record(false, now);
        window.record(false, now);
        window.record(true, now);
        window.record(true, now);

        // The first failure fell off the front.
        let stats = window.stats(now);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.failures(), 1);
    }

    #[test]
    fn age_evicts_on_record() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let start = Instant::now();

        window.record(false, start);
        window.record(false, start);

        let later = start + MAX_AGE + Duration::from_millis(1);
        window.record(true, later);

        let stats = window.stats(later);
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.successes(), 1);
    }

    #[test]
    fn age_evicts_on_stats() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let start = Instant::now();

        window.record(false, start);

        let stats = window.stats(start + MAX_AGE + Duration::from_millis(1));
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn entries_exactly_at_max_age_are_kept() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let start = Instant::now();

        window.record(false, start);

        let stats = window.stats(start + MAX_AGE);
        assert_eq!(stats.total(), 1);
    }

    #[test]
    fn stats_does_not_add_entries() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let now = Instant::now();

        window.record(true, now);
        let _ = window.stats(now);
        let stats = window.stats(now);

        assert_eq!(stats.total(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = OutcomeWindow::new(10, MAX_AGE);
        let now = Instant::now();

        window.record(false, now);
        window.record(true, now);
        window.reset();

        let stats = window.stats(now);
        assert_eq!(stats.total(), 0);
        assert!((stats.failure_rate() - 0.0).abs() < f64::EPSILON);
    }
}
