//! Observability subsystem for aeroscan
//!
//! - Structured logging (JSON)
//! - Scan counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: nothing here can fail a scan.
//!
//! ```ignore
//! use aeroscan::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::ProviderRegistered, &[("provider", "values_scan")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Default severity for an event
fn default_severity(event: Event) -> Severity {
    match event {
        Event::ProviderRegistered | Event::PathPlanned => Severity::Info,
        Event::ProviderDuplicate | Event::ScanAborted => Severity::Warn,
        e if e.is_error() => Severity::Error,
        _ => Severity::Trace,
    }
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(default_severity(event), event.as_str(), fields);
}
