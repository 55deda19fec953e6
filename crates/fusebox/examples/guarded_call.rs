// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! This example guards a flaky operation with a circuit breaker and walks the
//! circuit through open, half-open, and back to closed.
//!
//! Run with `cargo run --example guarded_call --features logs` to see the
//! structured log events the breaker emits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fusebox::{CircuitBreaker, ErrorStatus};
use sundial::Clock;

#[derive(Debug)]
enum StoreError {
    Unreachable,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("store unreachable")
    }
}

impl std::error::Error for StoreError {}

impl ErrorStatus for StoreError {}

static CALLS: AtomicUsize = AtomicUsize::new(0);

// Fails for the first five calls, then recovers.
async fn fetch_order(id: u32) -> Result<String, StoreError> {
    if CALLS.fetch_add(1, Ordering::SeqCst) < 5 {
        return Err(StoreError::Unreachable);
    }

    Ok(format!("order #{id}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().init();

    let clock = Clock::new();
    let breaker: CircuitBreaker<StoreError> = CircuitBreaker::builder(&clock)
        .name("order_store")
        .minimum_requests(5)
        .reset_timeout(Duration::from_millis(200))
        .half_open_max_attempts(1)
        .on_state_change(|args| {
            println!("circuit moved from {} to {}", args.from(), args.to());
        })
        .build();

    // The first five calls fail and trip the circuit.
    for id in 0..6 {
        match breaker.execute(id, fetch_order).await {
            Ok(order) => println!("call {id}: fetched {order}"),
            Err(error) => println!("call {id}: {error}"),
        }
    }

    // Give the dependency time to recover, then probe.
    tokio::time::sleep(Duration::from_millis(250)).await;

    match breaker.execute(42, fetch_order).await {
        Ok(order) => println!("recovered: fetched {order}"),
        Err(error) => println!("still broken: {error}"),
    }
}
