//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Passive counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on layout or mapping decisions
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use strata::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::TableMapped, &[("table", "employees"), ("base", "0")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
///
/// Fatal events are logged at FATAL, all others at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ContextCreated);
        log_event(Event::ContextDisposed);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::GuardPageInstalled, &[("start", "65536"), ("len", "4096")]);
    }
}
