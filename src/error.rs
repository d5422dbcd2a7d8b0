//! Error taxonomy for the simulation kernel.
//!
//! Every fatal condition surfaces as a [`SimError`] at the offending call;
//! the kernel never retries and never aborts the process on its own.
//! Non-fatal conditions (popping an empty list, a run that stalls on
//! conditional events) are reported through `tracing::warn!` instead.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Main error type for the simulation kernel.
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid distribution or collector parameters, rejected at the call
    /// or construction site.
    #[error("configuration error: {0}")]
    Config(String),

    /// An event was scheduled at a time earlier than the current clock.
    #[error("event `{name}` scheduled at {event_time} which is before the current clock {clock}")]
    TimeInPast {
        name: String,
        event_time: f64,
        clock: f64,
    },

    /// The event is already queued on the future or conditional list.
    #[error("event `{name}` is already scheduled")]
    AlreadyScheduled { name: String },

    /// The event was expected on one of the lists but is on neither.
    #[error("event `{name}` is not scheduled")]
    NotScheduled { name: String },

    /// The handle does not refer to a live event notice.
    #[error("unknown or freed event handle")]
    UnknownEvent,

    /// A phased process was advanced from a phase its state machine does
    /// not define.
    #[error("process `{name}` has no handler for phase {phase}")]
    UnhandledPhase { name: String, phase: i32 },

    /// The operation is only valid on a process notice.
    #[error("event `{name}` is not a process")]
    NotAProcess { name: String },

    /// More units released than the resource can hold.
    #[error("resource `{name}` released above capacity")]
    ResourceOverrelease { name: String },

    /// The handle does not refer to a live resource.
    #[error("unknown resource handle")]
    UnknownResource,

    /// Petri-net construction error (duplicate node, bad connection, ...).
    #[error("petri net error: {0}")]
    Petri(String),

    /// The handle does not refer to an installed Petri net.
    #[error("unknown petri net handle")]
    UnknownNet,

    /// The operation needs a simulation runtime (coroutine processes can
    /// only be spawned on a kernel owned by a [`Simulation`](crate::Simulation)).
    #[error("operation requires a running simulation context")]
    Detached,

    /// Trace-file creation or write failure.
    #[error("trace sink error: {0}")]
    Io(#[from] std::io::Error),

    /// Kernel invariant violation; indicates a bug in the kernel itself.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl SimError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }

    pub(crate) fn petri(msg: impl Into<String>) -> Self {
        SimError::Petri(msg.into())
    }
}
