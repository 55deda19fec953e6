// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Well-known attribute keys and instruments used when emitting metrics for
//! circuit events.
//!
//! Names follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations):
//! keys are dot-separated and values are short `snake_case` strings.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

const METER_NAME: &str = "fusebox";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

/// Key used to annotate the name of the circuit breaker emitting an event.
pub(crate) const BREAKER_NAME: &str = "resilience.circuit_breaker.name";

/// Key used to annotate the specific resilience event being emitted.
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the circuit state associated with an event.
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";

pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
pub(crate) const CIRCUIT_HALF_OPEN_EVENT_NAME: &str = "circuit_half_open";
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("resilience.event")
        .with_description("Emitted upon the occurrence of a resilience event.")
        .with_unit("u64")
        .build()
}
