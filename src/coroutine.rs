//! Stackful coroutine primitive.
//!
//! Stable Rust has no fibers or green threads, so each coroutine is
//! synthesized from an OS thread plus a strict baton-passing protocol.
//! Exactly one logical thread of control is runnable at any instant:
//! `switch_to` parks the caller until the coroutine yields or finishes,
//! and `switch_to_main` parks the coroutine until it is switched to
//! again. The scheduling model therefore stays single-threaded and
//! cooperative; the OS threads only provide the private stacks.
//!
//! A coroutine that is still parked when its handle is dropped is resumed
//! with a shutdown signal that unwinds its stack, so stacks never outlive
//! their coroutine.

use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::error::SimError;

/// Payload used to unwind a parked coroutine at shutdown.
struct ShutdownSignal;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Turn {
    Main,
    Co,
    Done,
    Shutdown,
}

struct CoState {
    turn: Turn,
    panic: Option<Box<dyn Any + Send>>,
    failure: Option<SimError>,
}

/// Shared handoff cell between the scheduler side and the coroutine side.
struct CoCell {
    state: Mutex<CoState>,
    cv: Condvar,
}

impl CoCell {
    fn new() -> Self {
        CoCell {
            state: Mutex::new(CoState {
                turn: Turn::Main,
                panic: None,
                failure: None,
            }),
            cv: Condvar::new(),
        }
    }

    /// Coroutine side: park until the baton is handed over. Unwinds on
    /// shutdown.
    fn wait_for_co(&self) {
        let mut st = self.state.lock();
        loop {
            match st.turn {
                Turn::Co => return,
                Turn::Shutdown => {
                    drop(st);
                    resume_unwind(Box::new(ShutdownSignal));
                }
                _ => self.cv.wait(&mut st),
            }
        }
    }
}

/// Result of driving a coroutine one step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CoStatus {
    /// The coroutine yielded via [`CoYield::switch_to_main`].
    Suspended,
    /// The body returned; the coroutine is finished.
    Finished,
}

/// Handed to the coroutine body; its only capability is yielding control
/// back to the scheduler.
pub struct CoYield {
    cell: Arc<CoCell>,
}

impl CoYield {
    /// Suspend the coroutine and resume the scheduler. Returns when the
    /// scheduler switches back.
    pub fn switch_to_main(&self) {
        let mut st = self.cell.state.lock();
        st.turn = Turn::Main;
        self.cell.cv.notify_all();
        loop {
            match st.turn {
                Turn::Co => return,
                Turn::Shutdown => {
                    drop(st);
                    resume_unwind(Box::new(ShutdownSignal));
                }
                _ => self.cell.cv.wait(&mut st),
            }
        }
    }
}

/// A suspended computation with its own stack.
pub(crate) struct Coroutine {
    cell: Arc<CoCell>,
    thread: Option<JoinHandle<()>>,
}

impl Coroutine {
    /// Create the coroutine. The body does not run until the first
    /// `switch_to`.
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(CoYield) -> Result<(), SimError> + Send + 'static,
    {
        let cell = Arc::new(CoCell::new());
        let thread_cell = cell.clone();
        let thread = std::thread::Builder::new()
            .name(format!("coroutine:{name}"))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    thread_cell.wait_for_co();
                    body(CoYield {
                        cell: thread_cell.clone(),
                    })
                }));
                let mut st = thread_cell.state.lock();
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => st.failure = Some(e),
                    Err(payload) => {
                        if !payload.is::<ShutdownSignal>() {
                            st.panic = Some(payload);
                        }
                    }
                }
                st.turn = Turn::Done;
                thread_cell.cv.notify_all();
            })?;
        Ok(Coroutine {
            cell,
            thread: Some(thread),
        })
    }

    /// Scheduler side: hand the baton to the coroutine and park until it
    /// comes back. A panic inside the body is re-raised here; an error
    /// returned by the body surfaces as `Err`.
    pub fn switch_to(&self) -> Result<CoStatus, SimError> {
        let mut st = self.cell.state.lock();
        if st.turn == Turn::Done {
            return Ok(CoStatus::Finished);
        }
        st.turn = Turn::Co;
        self.cell.cv.notify_all();
        loop {
            match st.turn {
                Turn::Main => return Ok(CoStatus::Suspended),
                Turn::Done => {
                    if let Some(payload) = st.panic.take() {
                        drop(st);
                        resume_unwind(payload);
                    }
                    if let Some(e) = st.failure.take() {
                        return Err(e);
                    }
                    return Ok(CoStatus::Finished);
                }
                _ => self.cell.cv.wait(&mut st),
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cell.state.lock().turn == Turn::Done
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            {
                let mut st = self.cell.state.lock();
                if st.turn != Turn::Done {
                    st.turn = Turn::Shutdown;
                    self.cell.cv.notify_all();
                }
            }
            let _ = thread.join();
        }
    }
}
