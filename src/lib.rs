//! General-purpose discrete-event simulation kernel.
//!
//! `deskit` is a reusable engine for queueing networks, manufacturing
//! lines, stochastic Petri nets and similar systems whose state changes at
//! discrete points in simulated time. The kernel is built from a small set
//! of layers, leaves first:
//!
//! - [`Random`]: a seeded MT19937-64 stream with the classical derived
//!   variates (exponential, normal, gamma, Poisson, triangular, empirical
//!   CDF tables, ...). Fixed seed in, identical sample stream out.
//! - [`Tally`], [`Accumulate`], [`Histogram`]: time-independent,
//!   time-weighted and binned statistics collectors.
//! - [`Event`] notices on a dual event list: the time-ordered future event
//!   list and the guard-driven conditional event list, interleaved by a
//!   three-phase scan.
//! - Two process abstractions on top of the event kernel: phased
//!   processes ([`Process`]) that advance by returning from
//!   `run_to_blocked`, and free-form processes (closures over a
//!   [`ProcContext`]) that suspend mid-function on a coroutine stack.
//! - [`Resource`]: capacity-limited servers with strictly FIFO waiting
//!   lines and automatic hand-off on release.
//! - A stochastic Petri-net overlay ([`PetriNetBuilder`]) compiled onto
//!   the same kernel.
//!
//! # Example
//!
//! An M/M/1-style arrival loop in the event-scheduling world view:
//!
//! ```
//! use deskit::{Event, EventId, RunConfig, Simulation, Simulator};
//!
//! struct Arrival;
//!
//! impl Event for Arrival {
//!     fn trigger(&mut self, sim: &mut Simulator, _me: EventId) -> deskit::Result<()> {
//!         let next = sim.clock() + sim.rng_mut().next_exponential(4.5);
//!         if next < 100.0 {
//!             sim.schedule_named(Arrival, next, "arrival")?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut sim = Simulation::new(RunConfig::new(12345678).quiet(true))?;
//! sim.with_sim(|s| s.schedule_named(Arrival, 0.0, "arrival"))?;
//! sim.run()?;
//! assert!(sim.clock() > 0.0 && sim.clock() < 100.0);
//! # Ok::<(), deskit::SimError>(())
//! ```

mod coprocess;
mod coroutine;
mod error;
mod event_list;
mod notice;
mod petri;
mod process;
mod random;
mod resource;
mod simulator;
mod stats;
mod trace;

pub use coprocess::ProcContext;
pub use error::{Result, SimError};
pub use notice::{Event, EventId, Ownership};
pub use petri::{DurationFn, NetId, PetriNet, PetriNetBuilder, PlaceView};
pub use process::{Process, Reactivation};
pub use random::{CdfDiscreteTable, CdfTable, Mt19937_64, Random};
pub use resource::{Resource, ResourceId};
pub use simulator::{RunConfig, Simulation, Simulator};
pub use stats::{ending, heading, t_value, Accumulate, Histogram, StatSummary, Tally};
