//! The scheduler: simulation clock, dual event lists and the three-phase
//! scan.
//!
//! [`Simulator`] is the kernel state every hook receives: clock, future and
//! conditional event lists, the event arena, the resource and Petri-net
//! registries, the default random stream and the trace sink.
//! [`Simulation`] owns a `Simulator` behind a mutex and drives the run
//! loop; the mutex exists solely so coroutine-backed processes can reach
//! the kernel from their own stacks while the scheduler is parked; at any
//! instant exactly one logical thread of control is running, so the model
//! stays sequentially consistent.

use std::fmt;
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use slab::Slab;

use crate::coroutine::{CoStatus, Coroutine};
use crate::error::{Result, SimError};
use crate::event_list::{EventEntry, EventList};
use crate::notice::{Event, EventId, EventNotice, Location, Ownership, Payload};
use crate::petri::PetriNet;
use crate::process::{Process, Reactivation};
use crate::random::Random;
use crate::resource::Resource;
use crate::trace::TraceSink;

/// Run configuration. All of it is supplied by API argument; the kernel
/// reads no environment and parses no command line.
#[derive(Clone, Debug, Serialize)]
pub struct RunConfig {
    /// Seed for the default random stream.
    pub seed: u64,
    /// Mirror every trace line into this file.
    pub trace_path: Option<PathBuf>,
    /// Run length; negative runs until both event lists are empty.
    pub duration: f64,
    /// Fire time-tied future events as one group ordered by descending
    /// priority.
    pub tie_break_by_priority: bool,
    /// Emit scheduler debug lines through the trace sink.
    pub debug: bool,
    /// Suppress the stdout echo of the trace (the file mirror still gets
    /// every line).
    pub quiet: bool,
}

impl RunConfig {
    pub fn new(seed: u64) -> Self {
        RunConfig {
            seed,
            trace_path: None,
            duration: -1.0,
            tie_break_by_priority: false,
            debug: false,
            quiet: false,
        }
    }

    pub fn trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn tie_break_by_priority(mut self, on: bool) -> Self {
        self.tie_break_by_priority = on;
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn quiet(mut self, on: bool) -> Self {
        self.quiet = on;
        self
    }
}

enum AfterFire {
    /// Plain event fired; free it unless the client keeps ownership.
    Done,
    /// Process finished; reclaim it.
    Free,
    /// Process enters an unconditional delay.
    ScheduleAt(f64),
    /// Process enters a conditional delay.
    Conditional,
}

/// Kernel state: the object every `trigger`, guard and process hook
/// receives.
pub struct Simulator {
    clock: f64,
    fel: EventList,
    cel: EventList,
    arena: Slab<EventNotice>,
    next_gen: u64,
    pub(crate) resources: Slab<Resource>,
    pub(crate) nets: Vec<PetriNet>,
    pub(crate) rng: Random,
    trace: TraceSink,
    debug: bool,
    terminated: bool,
    pub(crate) self_ref: Weak<Mutex<Simulator>>,
}

impl Simulator {
    pub(crate) fn new(config: &RunConfig) -> Result<Self> {
        let mut trace = TraceSink::new(config.trace_path.as_deref())?;
        trace.set_quiet(config.quiet);
        Ok(Simulator {
            clock: 0.0,
            fel: EventList::new(),
            cel: EventList::new(),
            arena: Slab::new(),
            next_gen: 0,
            resources: Slab::new(),
            nets: Vec::new(),
            rng: Random::new(config.seed),
            trace,
            debug: config.debug,
            terminated: false,
            self_ref: Weak::new(),
        })
    }

    // ─── Clock, stream, trace ─────────────────────────────────

    /// Current simulated time. Monotonically non-decreasing across
    /// firings; clients read it but never write it.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn rng(&self) -> &Random {
        &self.rng
    }

    pub fn rng_mut(&mut self) -> &mut Random {
        &mut self.rng
    }

    /// Emit a model trace line, prefixed with the simulated time.
    pub fn trace(&mut self, msg: impl fmt::Display) {
        self.trace.emit(self.clock, format_args!("{msg}"));
    }

    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// End the run after the current event completes.
    pub fn stop(&mut self) {
        self.terminated = true;
    }

    // ─── Event registration and metadata ──────────────────────

    fn register(&mut self, time: f64, payload: Payload) -> EventId {
        self.next_gen += 1;
        let gen = self.next_gen;
        let slot = self.arena.insert(EventNotice::new(gen, time, payload));
        EventId { slot, gen }
    }

    pub(crate) fn notice(&self, id: EventId) -> Result<&EventNotice> {
        self.arena
            .get(id.slot)
            .filter(|n| n.gen == id.gen)
            .ok_or(SimError::UnknownEvent)
    }

    pub(crate) fn notice_mut(&mut self, id: EventId) -> Result<&mut EventNotice> {
        self.arena
            .get_mut(id.slot)
            .filter(|n| n.gen == id.gen)
            .ok_or(SimError::UnknownEvent)
    }

    /// Register a plain event handler due at `time`. The notice is not
    /// scheduled yet.
    pub fn add_event(&mut self, handler: impl Event + 'static, time: f64) -> EventId {
        self.register(time, Payload::Handler(Box::new(handler)))
    }

    pub fn add_event_named(
        &mut self,
        handler: impl Event + 'static,
        time: f64,
        name: impl Into<String>,
    ) -> EventId {
        let id = self.add_event(handler, time);
        if let Ok(n) = self.notice_mut(id) {
            n.name = name.into();
        }
        id
    }

    /// Register a phased process with its first reactivation time.
    pub fn add_process(
        &mut self,
        name: impl Into<String>,
        process: impl Process + 'static,
        time: f64,
    ) -> EventId {
        let id = self.register(time, Payload::Process(Box::new(process)));
        if let Ok(n) = self.notice_mut(id) {
            n.name = name.into();
        }
        id
    }

    pub fn event_time(&self, id: EventId) -> Result<f64> {
        Ok(self.notice(id)?.time)
    }

    /// Retime an unscheduled notice.
    pub fn set_event_time(&mut self, id: EventId, time: f64) -> Result<()> {
        let n = self.notice_mut(id)?;
        if n.location != Location::Idle {
            return Err(SimError::AlreadyScheduled { name: n.name.clone() });
        }
        n.time = time;
        Ok(())
    }

    pub fn event_priority(&self, id: EventId) -> Result<i32> {
        Ok(self.notice(id)?.priority)
    }

    /// Reprioritize an unscheduled notice.
    pub fn set_event_priority(&mut self, id: EventId, priority: i32) -> Result<()> {
        let n = self.notice_mut(id)?;
        if n.location != Location::Idle {
            return Err(SimError::AlreadyScheduled { name: n.name.clone() });
        }
        n.priority = priority;
        Ok(())
    }

    pub fn event_name(&self, id: EventId) -> Result<&str> {
        Ok(&self.notice(id)?.name)
    }

    pub fn set_event_name(&mut self, id: EventId, name: impl Into<String>) -> Result<()> {
        self.notice_mut(id)?.name = name.into();
        Ok(())
    }

    /// Client tag carried by the notice, free for model bookkeeping.
    pub fn event_owner(&self, id: EventId) -> Result<Option<u64>> {
        Ok(self.notice(id)?.owner)
    }

    pub fn set_event_owner(&mut self, id: EventId, owner: u64) -> Result<()> {
        self.notice_mut(id)?.owner = Some(owner);
        Ok(())
    }

    pub fn event_ownership(&self, id: EventId) -> Result<Ownership> {
        Ok(self.notice(id)?.ownership)
    }

    /// Hand a notice's lifetime to the client (it survives firing) or back
    /// to the kernel.
    pub fn set_event_ownership(&mut self, id: EventId, ownership: Ownership) -> Result<()> {
        self.notice_mut(id)?.ownership = ownership;
        Ok(())
    }

    // ─── Scheduling ───────────────────────────────────────────

    /// Insert a registered notice into the future event list. Fails if the
    /// notice is already queued or its time lies in the past.
    pub fn schedule_event(&mut self, id: EventId) -> Result<()> {
        let clock = self.clock;
        let n = self.notice_mut(id)?;
        if n.location != Location::Idle {
            return Err(SimError::AlreadyScheduled { name: n.name.clone() });
        }
        if n.time < clock {
            return Err(SimError::TimeInPast {
                name: n.name.clone(),
                event_time: n.time,
                clock,
            });
        }
        let entry = EventEntry {
            time: n.time,
            priority: n.priority,
            id,
        };
        n.location = Location::Future;
        let (name, time) = (n.name.clone(), n.time);
        self.fel.insert(entry);
        if self.debug {
            self.trace(format_args!("added future event ({name}) to FEL, due at {time}"));
        }
        Ok(())
    }

    /// Register and schedule a handler in one step.
    pub fn schedule(&mut self, handler: impl Event + 'static, time: f64) -> Result<EventId> {
        let id = self.add_event(handler, time);
        self.schedule_event(id)?;
        Ok(id)
    }

    pub fn schedule_named(
        &mut self,
        handler: impl Event + 'static,
        time: f64,
        name: impl Into<String>,
    ) -> Result<EventId> {
        let id = self.add_event_named(handler, time, name);
        self.schedule_event(id)?;
        Ok(id)
    }

    /// Insert a registered notice into the conditional event list.
    /// Coroutine processes cannot be conditional: their guard would have
    /// to run on the scheduler's stack.
    pub fn schedule_conditional_event(&mut self, id: EventId) -> Result<()> {
        let n = self.notice_mut(id)?;
        if n.location != Location::Idle {
            return Err(SimError::AlreadyScheduled { name: n.name.clone() });
        }
        if matches!(n.payload, Payload::Coroutine(_)) {
            return Err(SimError::NotAProcess { name: n.name.clone() });
        }
        let entry = EventEntry {
            time: n.time,
            priority: n.priority,
            id,
        };
        n.location = Location::Conditional;
        let name = n.name.clone();
        self.cel.insert(entry);
        if self.debug {
            self.trace(format_args!("added conditional event {{{name}}} to CEL"));
        }
        Ok(())
    }

    /// Register a handler and park it on the conditional list. Conditional
    /// notices carry time −1 so they scan in registration order.
    pub fn schedule_conditional(
        &mut self,
        handler: impl Event + 'static,
        name: impl Into<String>,
    ) -> Result<EventId> {
        let id = self.add_event_named(handler, -1.0, name);
        self.schedule_conditional_event(id)?;
        Ok(id)
    }

    /// Remove a notice from whichever list holds it. Returns whether it
    /// was queued; unknown handles are a no-op.
    pub fn cancel_event(&mut self, id: EventId) -> bool {
        let location = match self.notice(id) {
            Ok(n) => n.location,
            Err(_) => return false,
        };
        let removed = match location {
            Location::Idle => false,
            Location::Future => self.fel.remove(id),
            Location::Conditional => self.cel.remove(id),
        };
        if let Ok(n) = self.notice_mut(id) {
            n.location = Location::Idle;
        }
        removed
    }

    /// Identity membership across both lists.
    pub fn has_event(&self, id: EventId) -> bool {
        match self.notice(id) {
            Ok(n) => n.location != Location::Idle,
            Err(_) => false,
        }
    }

    /// Cancel and free a notice. Returns whether it existed.
    pub fn destroy_event(&mut self, id: EventId) -> bool {
        if self.notice(id).is_err() {
            return false;
        }
        self.cancel_event(id);
        self.arena.remove(id.slot);
        true
    }

    // ─── Process activation ───────────────────────────────────

    /// Activate a process on the future event list. A non-negative `time`
    /// replaces the stored reactivation time.
    pub fn activate(&mut self, id: EventId, time: f64) -> Result<()> {
        if time >= 0.0 {
            self.set_event_time(id, time)?;
        }
        self.schedule_event(id)
    }

    /// Activate a process at the current clock.
    pub fn activate_now(&mut self, id: EventId) -> Result<()> {
        let clock = self.clock;
        self.set_event_time(id, clock)?;
        self.schedule_event(id)
    }

    /// Withdraw a scheduled process from the run. Fails if it is not
    /// scheduled.
    pub fn suspend(&mut self, id: EventId) -> Result<()> {
        if !self.has_event(id) {
            return Err(SimError::NotScheduled {
                name: self.event_name(id).unwrap_or("?").to_string(),
            });
        }
        self.cancel_event(id);
        Ok(())
    }

    /// Resume a suspended process at the current clock. Fails if it is
    /// already scheduled.
    pub fn resume(&mut self, id: EventId) -> Result<()> {
        if self.has_event(id) {
            return Err(SimError::AlreadyScheduled {
                name: self.event_name(id)?.to_string(),
            });
        }
        self.activate_now(id)
    }

    /// Park a phased process on the conditional list until its blocking
    /// condition clears.
    pub fn await_condition(&mut self, id: EventId) -> Result<()> {
        let n = self.notice(id)?;
        if !matches!(n.payload, Payload::Process(_)) {
            return Err(SimError::NotAProcess { name: n.name.clone() });
        }
        self.schedule_conditional_event(id)
    }

    // ─── Firing ───────────────────────────────────────────────

    pub(crate) fn is_end(&self) -> bool {
        self.terminated || (self.fel.is_empty() && self.cel.is_empty())
    }

    pub(crate) fn fel_is_empty(&self) -> bool {
        self.fel.is_empty()
    }

    pub(crate) fn clear_terminated(&mut self) {
        self.terminated = false;
    }

    pub(crate) fn schedule_end_event(&mut self, time: f64) -> Result<()> {
        let id = self.register(time, Payload::End);
        if let Ok(n) = self.notice_mut(id) {
            n.name = "end of run".to_string();
        }
        self.schedule_event(id)
    }

    /// Pop the imminent event (or the whole time-tied group) off the FEL.
    pub(crate) fn pop_imminent_batch(&mut self, tie_break: bool) -> Vec<EventId> {
        let batch = if tie_break {
            self.fel.pop_imminent_group(true)
        } else {
            self.fel.pop_imminent().into_iter().collect()
        };
        for &id in &batch {
            if let Ok(n) = self.notice_mut(id) {
                n.location = Location::Idle;
            }
        }
        batch
    }

    /// Advance the clock to the event's time. Never moves backwards.
    pub(crate) fn advance_clock(&mut self, id: EventId) -> Result<()> {
        let time = self.notice(id)?.time;
        if time > self.clock {
            self.clock = time;
        }
        if self.debug {
            let name = self.event_name(id)?.to_string();
            self.trace(format_args!("event ({name}) occurs"));
        }
        Ok(())
    }

    pub(crate) fn payload_is_coroutine(&self, id: EventId) -> bool {
        matches!(
            self.notice(id).map(|n| &n.payload),
            Ok(Payload::Coroutine(_))
        )
    }

    pub(crate) fn take_coroutine(&mut self, id: EventId) -> Result<Coroutine> {
        let n = self.notice_mut(id)?;
        match mem::replace(&mut n.payload, Payload::Taken) {
            Payload::Coroutine(co) => Ok(co),
            other => {
                n.payload = other;
                Err(SimError::Internal("event payload is not a coroutine"))
            }
        }
    }

    pub(crate) fn restore_coroutine(&mut self, id: EventId, co: Coroutine) {
        if let Ok(n) = self.notice_mut(id) {
            n.payload = Payload::Coroutine(co);
        }
        // If the notice vanished mid-run the handle drops here, which
        // unwinds and joins the coroutine.
    }

    /// Reclaim a finished process notice.
    pub(crate) fn finish_process(&mut self, id: EventId) {
        if self.debug {
            if let Ok(name) = self.event_name(id) {
                let name = name.to_string();
                self.trace(format_args!("process [{name}] finished"));
            }
        }
        self.destroy_event(id);
    }

    /// Fire a non-coroutine notice: run its effect, then apply the
    /// after-fire policy (free, keep, or reschedule for processes).
    pub(crate) fn fire_notice(&mut self, id: EventId) -> Result<()> {
        let mut payload = {
            let n = self.notice_mut(id)?;
            mem::replace(&mut n.payload, Payload::Taken)
        };
        let after = match &mut payload {
            Payload::Handler(h) => h.trigger(self, id).map(|()| AfterFire::Done),
            Payload::Process(p) => {
                if self.debug {
                    let name = self.event_name(id).unwrap_or("?").to_string();
                    let phase = p.phase_name().to_string();
                    self.trace(format_args!(
                        "process [{name}] advancing from phase [{phase}]"
                    ));
                }
                p.run_to_blocked(self, id).map(|r| match r {
                    Reactivation::At(t) => AfterFire::ScheduleAt(t),
                    Reactivation::AwaitCondition => AfterFire::Conditional,
                    Reactivation::Finished => AfterFire::Free,
                })
            }
            Payload::End => {
                self.stop();
                Ok(AfterFire::Done)
            }
            Payload::Coroutine(_) | Payload::Taken => {
                Err(SimError::Internal("cannot fire this payload on the kernel path"))
            }
        };
        let phase = match &payload {
            Payload::Process(p) => Some(p.phase_name().to_string()),
            _ => None,
        };
        if let Some(n) = self.arena.get_mut(id.slot).filter(|n| n.gen == id.gen) {
            n.payload = payload;
        }
        match after? {
            AfterFire::Done => {
                // Free kernel-owned notices, but never one that re-scheduled
                // itself during its own trigger.
                let free = matches!(
                    self.notice(id),
                    Ok(n) if n.ownership == Ownership::Kernel && n.location == Location::Idle
                );
                if free {
                    self.destroy_event(id);
                }
            }
            AfterFire::Free => {
                self.finish_process(id);
            }
            AfterFire::ScheduleAt(t) => {
                if self.debug {
                    let name = self.event_name(id)?.to_string();
                    let phase = phase.unwrap_or_default();
                    self.trace(format_args!(
                        "process [{name}] enters unconditional delay, reactivation point [{phase}]"
                    ));
                }
                self.set_event_time(id, t)?;
                self.schedule_event(id)?;
            }
            AfterFire::Conditional => {
                if self.debug {
                    let name = self.event_name(id)?.to_string();
                    let phase = phase.unwrap_or_default();
                    self.trace(format_args!(
                        "process [{name}] enters conditional delay, reactivation point [{phase}]"
                    ));
                }
                self.schedule_conditional_event(id)?;
            }
        }
        Ok(())
    }

    /// Evaluate a notice's firing guard.
    pub(crate) fn guard_holds(&mut self, id: EventId) -> Result<bool> {
        let mut payload = {
            let n = self.notice_mut(id)?;
            mem::replace(&mut n.payload, Payload::Taken)
        };
        let holds = match &mut payload {
            Payload::Handler(h) => h.can_trigger(self, id),
            Payload::Process(p) => !p.is_conditional_blocking(self, id),
            Payload::End => true,
            Payload::Coroutine(_) | Payload::Taken => false,
        };
        if let Some(n) = self.arena.get_mut(id.slot).filter(|n| n.gen == id.gen) {
            n.payload = payload;
        }
        Ok(holds)
    }

    /// Scan the conditional list from the head, firing the first event
    /// whose guard holds, and restart after every firing; stop once a full
    /// scan fires nothing.
    pub(crate) fn drain_conditional(&mut self) -> Result<()> {
        loop {
            let mut fired = false;
            for id in self.cel.ids() {
                // A previous firing in this scan may have cancelled it.
                if !self.cel.contains(id) {
                    continue;
                }
                if self.guard_holds(id)? {
                    self.cel.remove(id);
                    if let Ok(n) = self.notice_mut(id) {
                        n.location = Location::Idle;
                    }
                    if self.debug {
                        let name = self.event_name(id)?.to_string();
                        self.trace(format_args!("conditional event {{{name}}} occurs"));
                    }
                    self.fire_notice(id)?;
                    fired = true;
                    break;
                }
            }
            if !fired {
                return Ok(());
            }
        }
    }

    pub(crate) fn report_stall(&mut self) {
        tracing::warn!(
            clock = self.clock,
            pending = self.cel.len(),
            "future event list empty while conditional events remain blocked; stopping run"
        );
        self.trace(format_args!(
            "run stalled: {} conditional event(s) can never fire",
            self.cel.len()
        ));
        self.terminated = true;
    }

    pub(crate) fn flush_trace(&mut self) {
        self.trace.flush();
    }

    /// Split borrow used by the Petri overlay: transition duration
    /// closures draw from the default stream while their net is borrowed.
    pub(crate) fn petri_parts(&mut self) -> (&mut Vec<PetriNet>, &mut Random) {
        (&mut self.nets, &mut self.rng)
    }

    /// Pull every coroutine out of the arena so the caller can join their
    /// threads without holding the kernel lock.
    pub(crate) fn take_coroutines(&mut self) -> Vec<Coroutine> {
        let ids: Vec<EventId> = self
            .arena
            .iter()
            .filter(|(_, n)| matches!(n.payload, Payload::Coroutine(_)))
            .map(|(slot, n)| EventId { slot, gen: n.gen })
            .collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            self.cancel_event(id);
            let mut notice = self.arena.remove(id.slot);
            if let Payload::Coroutine(co) = mem::replace(&mut notice.payload, Payload::Taken) {
                out.push(co);
            }
        }
        out
    }
}

// ─── Simulation facade ────────────────────────────────────────

/// Owner of a simulation run: constructs the kernel from a [`RunConfig`],
/// drives the three-phase scan and manages coroutine handoff.
pub struct Simulation {
    kernel: Arc<Mutex<Simulator>>,
    config: RunConfig,
}

impl Simulation {
    pub fn new(config: RunConfig) -> Result<Self> {
        let kernel = Arc::new(Mutex::new(Simulator::new(&config)?));
        kernel.lock().self_ref = Arc::downgrade(&kernel);
        Ok(Simulation { kernel, config })
    }

    /// Run any setup, inspection or reporting code against the kernel.
    pub fn with_sim<R>(&self, f: impl FnOnce(&mut Simulator) -> R) -> R {
        f(&mut self.kernel.lock())
    }

    pub fn clock(&self) -> f64 {
        self.kernel.lock().clock()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Re-initialize the kernel for another replication. Live coroutines
    /// from the previous run are unwound and joined.
    pub fn reset(&mut self, config: RunConfig) -> Result<()> {
        let mut fresh = Simulator::new(&config)?;
        fresh.self_ref = Arc::downgrade(&self.kernel);
        let old_coroutines = self.kernel.lock().take_coroutines();
        drop(old_coroutines);
        let old = mem::replace(&mut *self.kernel.lock(), fresh);
        drop(old);
        self.config = config;
        Ok(())
    }

    /// Run with the configured duration and tie-break mode.
    pub fn run(&mut self) -> Result<()> {
        let duration = self.config.duration;
        let tie_break = self.config.tie_break_by_priority;
        self.run_with(duration, tie_break)
    }

    /// Run the three-phase scan: drain enabled conditionals, then
    /// alternate (advance to imminent, fire) with conditional drains until
    /// the run terminates or both lists are empty.
    pub fn run_with(&mut self, duration: f64, tie_break: bool) -> Result<()> {
        self.kernel.lock().clear_terminated();
        // Models may start with only conditional events.
        self.kernel.lock().drain_conditional()?;
        if duration >= 0.0 {
            let mut k = self.kernel.lock();
            let end = k.clock() + duration;
            k.schedule_end_event(end)?;
        }
        loop {
            enum Step {
                Done,
                Stalled,
                Batch(Vec<EventId>),
            }
            let step = {
                let mut k = self.kernel.lock();
                if k.is_end() {
                    Step::Done
                } else if k.fel_is_empty() {
                    Step::Stalled
                } else {
                    Step::Batch(k.pop_imminent_batch(tie_break))
                }
            };
            match step {
                Step::Done => break,
                Step::Stalled => {
                    self.kernel.lock().report_stall();
                    break;
                }
                Step::Batch(batch) => {
                    for id in batch {
                        self.fire_one(id)?;
                    }
                    self.kernel.lock().drain_conditional()?;
                }
            }
        }
        self.kernel.lock().flush_trace();
        Ok(())
    }

    /// Fire one future event. Coroutine processes run with the kernel
    /// unlocked so their body can reach it from its own stack.
    fn fire_one(&mut self, id: EventId) -> Result<()> {
        let coroutine = {
            let mut k = self.kernel.lock();
            k.advance_clock(id)?;
            if k.payload_is_coroutine(id) {
                Some(k.take_coroutine(id)?)
            } else {
                k.fire_notice(id)?;
                None
            }
        };
        if let Some(co) = coroutine {
            let status = co.switch_to();
            let mut k = self.kernel.lock();
            k.restore_coroutine(id, co);
            match status {
                Ok(CoStatus::Suspended) => {}
                Ok(CoStatus::Finished) => k.finish_process(id),
                Err(e) => {
                    k.finish_process(id);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        // Join coroutine threads outside the kernel lock.
        let coroutines = self.kernel.lock().take_coroutines();
        drop(coroutines);
    }
}
