//! Event notices: the timed units of work the kernel schedules.
//!
//! A notice couples scheduling metadata (time, priority, name, owner tag)
//! with a payload that carries the behavior: a plain [`Event`] handler, a
//! phased process, a coroutine-backed process or the internal end-of-run
//! marker. Notices live in the kernel arena and are addressed through
//! [`EventId`] handles with reference-equality semantics, so cancellation
//! and membership tests never compare by value.

use serde::Serialize;

use crate::coroutine::Coroutine;
use crate::process::Process;
use crate::simulator::Simulator;
use crate::Result;

/// Handle to a live event notice. Generation-tagged: once the notice is
/// freed, stale copies of the handle stop resolving instead of aliasing a
/// recycled slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EventId {
    pub(crate) slot: usize,
    pub(crate) gen: u64,
}

/// Who frees a notice after it fires.
///
/// `Kernel` notices are freed by the scheduler as soon as their `trigger`
/// returns; `Client` notices survive firing (process notices re-schedule
/// themselves, long-lived conditional guards re-arm) until their owner
/// releases them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum Ownership {
    Kernel,
    Client,
}

/// Which list currently holds a notice. Invariant: a notice is in at most
/// one of the two lists at any time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Location {
    Idle,
    Future,
    Conditional,
}

/// A timed action. `trigger` performs the state change; `can_trigger`
/// guards conditional events and must be side-effect-free, as the
/// scheduler may evaluate it repeatedly per scan.
///
/// `me` is the handle of the notice being fired, so an event can cancel,
/// re-time or re-register itself (long-lived conditional guards do).
pub trait Event: Send {
    fn can_trigger(&mut self, sim: &mut Simulator, me: EventId) -> bool {
        let _ = (sim, me);
        true
    }

    fn trigger(&mut self, sim: &mut Simulator, me: EventId) -> Result<()>;
}

/// Behavior attached to a notice.
pub(crate) enum Payload {
    /// Plain event handler.
    Handler(Box<dyn Event>),
    /// Phased process advanced through `run_to_blocked`.
    Process(Box<dyn Process>),
    /// Free-form process backed by a coroutine.
    Coroutine(Coroutine),
    /// Internal end-of-run marker.
    End,
    /// Transient marker while the payload is checked out for a call.
    Taken,
}

pub(crate) struct EventNotice {
    pub(crate) gen: u64,
    pub(crate) time: f64,
    pub(crate) priority: i32,
    pub(crate) name: String,
    pub(crate) owner: Option<u64>,
    pub(crate) ownership: Ownership,
    pub(crate) location: Location,
    pub(crate) payload: Payload,
}

impl EventNotice {
    pub(crate) fn new(gen: u64, time: f64, payload: Payload) -> Self {
        EventNotice {
            gen,
            time,
            priority: 0,
            name: "event".to_string(),
            owner: None,
            ownership: match &payload {
                Payload::Process(_) | Payload::Coroutine(_) => Ownership::Client,
                _ => Ownership::Kernel,
            },
            location: Location::Idle,
            payload,
        }
    }
}
