// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test helpers shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A scripted dependency: outcomes are queued ahead of time and handed out in
/// order, while every invocation is counted. Once the script runs dry, calls
/// succeed.
#[derive(Debug)]
pub(crate) struct ScriptedOutcomes<E> {
    outcomes: Mutex<VecDeque<Result<&'static str, E>>>,
    calls: AtomicUsize,
}

impl<E> ScriptedOutcomes<E> {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push_success(&self, value: &'static str) {
        self.outcomes.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_failure(&self, error: E) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// How many times the dependency was actually invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self) -> Result<&'static str, E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok("ok"))
    }
}
