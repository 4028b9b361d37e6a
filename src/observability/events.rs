//! Observable lifecycle events
//!
//! Events are explicit and typed. Each variant maps to one stable event name.

use std::fmt;

/// Observable events in the layout and sandbox lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Layout
    /// A data layout was built by a factory
    LayoutBuilt,
    /// A persisted layout was loaded and re-validated
    LayoutLoaded,
    /// A layout was written to disk
    LayoutPersisted,
    /// A persisted layout failed its checksum (FATAL)
    LayoutCorrupted,

    // Context lifecycle
    /// A new execution context was created
    ContextCreated,
    /// An existing context was returned by get-or-create
    ContextReused,
    /// A context was disposed
    ContextDisposed,

    // Mapping
    /// A table was mapped into linear memory
    TableMapped,
    /// An index was mapped into linear memory
    IndexMapped,
    /// An index was registered for runtime lookup
    IndexRegistered,
    /// A guard page was installed after the heap
    GuardPageInstalled,
    /// A mapping exceeded the reserved address space (FATAL)
    SandboxExhausted,

    // Plans
    /// A plan was compiled against its context
    PlanCompiled,
    /// A compiled plan finished executing
    PlanExecuted,
    /// Compilation or execution of a plan failed
    PlanFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::LayoutBuilt => "LAYOUT_BUILT",
            Event::LayoutLoaded => "LAYOUT_LOADED",
            Event::LayoutPersisted => "LAYOUT_PERSISTED",
            Event::LayoutCorrupted => "LAYOUT_CORRUPTED",

            Event::ContextCreated => "CONTEXT_CREATED",
            Event::ContextReused => "CONTEXT_REUSED",
            Event::ContextDisposed => "CONTEXT_DISPOSED",

            Event::TableMapped => "TABLE_MAPPED",
            Event::IndexMapped => "INDEX_MAPPED",
            Event::IndexRegistered => "INDEX_REGISTERED",
            Event::GuardPageInstalled => "GUARD_PAGE_INSTALLED",
            Event::SandboxExhausted => "SANDBOX_EXHAUSTED",

            Event::PlanCompiled => "PLAN_COMPILED",
            Event::PlanExecuted => "PLAN_EXECUTED",
            Event::PlanFailed => "PLAN_FAILED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::LayoutCorrupted | Event::SandboxExhausted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
