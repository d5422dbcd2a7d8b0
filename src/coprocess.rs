//! Free-form processes.
//!
//! A free-form process is an ordinary function run on a private coroutine
//! stack; it can suspend at arbitrary call depth through the operations on
//! [`ProcContext`]: `wait` and its aliases, `request`/`relinquish` on
//! resources, and the activation helpers. The kernel fires the process's
//! notice by switching onto the coroutine; the body reaches the kernel
//! through the context while the scheduler is parked, so model code sees
//! the same single-threaded world as plain event handlers.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::coroutine::{CoYield, Coroutine};
use crate::error::{Result, SimError};
use crate::notice::{EventId, Payload};
use crate::random::Random;
use crate::resource::ResourceId;
use crate::simulator::Simulator;

/// Execution context handed to a free-form process body.
pub struct ProcContext {
    kernel: Arc<Mutex<Simulator>>,
    id: EventId,
    yielder: CoYield,
}

impl ProcContext {
    /// This process's own notice handle.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.kernel.lock().clock()
    }

    /// Run model code against the kernel (sampling, scheduling, resources,
    /// tracing; everything a plain event handler can do). The kernel is
    /// locked for the duration of the closure, so do not call other
    /// context methods from inside it.
    pub fn with_sim<R>(&self, f: impl FnOnce(&mut Simulator) -> R) -> R {
        f(&mut self.kernel.lock())
    }

    /// Draw from the kernel's default random stream.
    pub fn sample<R>(&self, f: impl FnOnce(&mut Random) -> R) -> R {
        f(self.kernel.lock().rng_mut())
    }

    /// Emit a trace line at the current simulated time.
    pub fn trace(&self, msg: impl fmt::Display) {
        self.kernel.lock().trace(msg);
    }

    /// Unconditional delay: reschedule self at `clock + dt` and yield to
    /// the scheduler.
    pub fn wait(&mut self, dt: f64) -> Result<()> {
        {
            let mut k = self.kernel.lock();
            let t = k.clock() + dt;
            k.set_event_time(self.id, t)?;
            k.schedule_event(self.id)?;
        }
        self.yielder.switch_to_main();
        Ok(())
    }

    /// Alias of [`Self::wait`].
    pub fn hold(&mut self, dt: f64) -> Result<()> {
        self.wait(dt)
    }

    /// Alias of [`Self::wait`].
    pub fn work(&mut self, dt: f64) -> Result<()> {
        self.wait(dt)
    }

    /// Alias of [`Self::wait`].
    pub fn delay(&mut self, dt: f64) -> Result<()> {
        self.wait(dt)
    }

    /// Put another process onto the future event list. A negative `time`
    /// keeps the process's stored reactivation time.
    pub fn activate(&self, p: EventId, time: f64) -> Result<()> {
        self.kernel.lock().activate(p, time)
    }

    /// Put another process onto the future event list at the current
    /// clock.
    pub fn activate_now(&self, p: EventId) -> Result<()> {
        self.kernel.lock().activate_now(p)
    }

    /// Withdraw a scheduled process from the run. Fails if it is not
    /// scheduled.
    pub fn suspend(&self, p: EventId) -> Result<()> {
        self.kernel.lock().suspend(p)
    }

    /// Alias of [`Self::suspend`].
    pub fn interrupt(&self, p: EventId) -> Result<()> {
        self.suspend(p)
    }

    /// Reschedule a suspended process at the current clock. Fails if it is
    /// already scheduled.
    pub fn resume(&self, p: EventId) -> Result<()> {
        self.kernel.lock().resume(p)
    }

    /// Spawn another free-form process (unscheduled; activate it to run).
    pub fn spawn_process<F>(&self, name: &str, body: F) -> Result<EventId>
    where
        F: FnOnce(&mut ProcContext) -> Result<()> + Send + 'static,
    {
        self.kernel.lock().spawn_process(name, body)
    }

    /// Acquire `units` of a resource, yielding until they are handed over
    /// if the resource cannot satisfy the request right now.
    pub fn request(&mut self, r: ResourceId, units: u32) -> Result<()> {
        let granted = self.kernel.lock().try_request(r, self.id, units)?;
        if !granted {
            // Woken by a future release that has already allocated the
            // units to this process.
            self.yielder.switch_to_main();
        }
        Ok(())
    }

    /// Release `units` of a resource and hand them to fitting head
    /// waiters.
    pub fn relinquish(&self, r: ResourceId, units: u32) -> Result<()> {
        self.kernel.lock().release(r, self.id, units)
    }

    /// Bare coroutine switch: park without scheduling any reactivation.
    /// The process stays alive but dormant until another process or event
    /// `resume`s or `activate`s it.
    pub fn switch_to_main(&mut self) {
        self.yielder.switch_to_main();
    }
}

impl Simulator {
    /// Create a free-form process. The body runs on its own coroutine
    /// stack once the process is activated; when it returns, the kernel
    /// reclaims the notice.
    pub fn spawn_process<F>(&mut self, name: &str, body: F) -> Result<EventId>
    where
        F: FnOnce(&mut ProcContext) -> Result<()> + Send + 'static,
    {
        let kernel = self.self_ref.upgrade().ok_or(SimError::Detached)?;
        let clock = self.clock();
        let id = self.add_event_named(PlaceholderEvent, clock, name);
        let co = Coroutine::spawn(name, move |yielder| {
            let mut ctx = ProcContext {
                kernel,
                id,
                yielder,
            };
            body(&mut ctx)
        })?;
        let n = self.notice_mut(id)?;
        n.payload = Payload::Coroutine(co);
        n.ownership = crate::notice::Ownership::Client;
        Ok(id)
    }
}

/// Stand-in payload replaced by the coroutine right after registration.
struct PlaceholderEvent;

impl crate::notice::Event for PlaceholderEvent {
    fn trigger(&mut self, _sim: &mut Simulator, _me: EventId) -> Result<()> {
        Err(SimError::Internal("placeholder event fired"))
    }
}
