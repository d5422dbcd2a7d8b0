//! Phased processes.
//!
//! A phased process is a user state machine whose reactivation points are
//! enumerated phases. The kernel advances it by calling
//! [`Process::run_to_blocked`], which runs the process up to its next
//! blocking point and says how to reschedule it: at a future time, behind
//! a state condition, or not at all because it finished. There is no
//! in-function suspension; the process yields by returning.

use crate::notice::EventId;
use crate::simulator::Simulator;
use crate::Result;

/// How a phased process wants to be reactivated after advancing.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Reactivation {
    /// Unconditional delay: reschedule on the future event list at this
    /// absolute time.
    At(f64),
    /// Conditional delay: park on the conditional event list until
    /// [`Process::is_conditional_blocking`] reports false.
    AwaitCondition,
    /// The process ended; the kernel reclaims its notice.
    Finished,
}

/// A user state machine driven by the kernel.
///
/// Implementations typically keep an integer phase, dispatch on it inside
/// `run_to_blocked`, and set the next phase before returning. A phase the
/// machine does not define should be reported with
/// [`SimError::UnhandledPhase`](crate::SimError::UnhandledPhase), never
/// silently treated as a blocked state.
pub trait Process: Send {
    /// Advance the process from its current reactivation point until it
    /// blocks, and return how to reschedule it. `me` is the process's own
    /// handle, usable for model bookkeeping (waiting lines hold process
    /// handles).
    fn run_to_blocked(&mut self, sim: &mut Simulator, me: EventId) -> Result<Reactivation>;

    /// While the process is conditionally delayed: does the delay still
    /// hold? `false` means the process can be reactivated. Must be
    /// side-effect-free; the scheduler may evaluate it repeatedly per
    /// conditional scan.
    fn is_conditional_blocking(&mut self, sim: &mut Simulator, me: EventId) -> bool;

    /// Name of the current reactivation point, for trace output.
    fn phase_name(&self) -> &str;
}
