//! Stochastic Petri-net overlay.
//!
//! Places, transitions and weighted arcs compile into the same event
//! kernel everything else runs on: every transition is watched by a
//! conditional `BeginFire` event whose guard checks token availability on
//! the inputs and spare capacity on the outputs; firing reserves the input
//! tokens atomically and schedules a future `EndFire` event after the
//! transition's (possibly random) duration. `EndFire` consumes the
//! reserved tokens, produces the outputs and re-registers a fresh
//! `BeginFire`, so each transition cycles Idle → Firing → Idle.
//!
//! Reservation is what keeps competing transitions honest: a token claimed
//! by an in-flight firing is invisible to every other guard until the
//! firing completes.

use crate::error::{Result, SimError};
use crate::notice::{Event, EventId};
use crate::random::Random;
use crate::simulator::Simulator;

/// Transition delay: drawn at begin-fire time from the default stream.
pub type DurationFn = Box<dyn FnMut(&mut Random) -> f64 + Send>;

/// Handle to a net installed in the kernel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NetId(pub(crate) usize);

pub(crate) struct Place {
    id: u32,
    name: String,
    tokens: i64,
    capacity: i64,
    reserved: i64,
}

pub(crate) struct Transition {
    id: u32,
    name: String,
    duration: DurationFn,
    /// (place index, weight) pairs.
    inputs: Vec<(usize, i64)>,
    outputs: Vec<(usize, i64)>,
    firing: bool,
}

/// Read-only snapshot of a place.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceView {
    pub name: String,
    pub tokens: i64,
    pub reserved: i64,
    pub capacity: i64,
}

#[derive(Clone, Copy)]
enum NodeKind {
    Place(usize),
    Transition(usize),
}

/// Assembles places, transitions and arcs, then validates and wires the
/// graph.
pub struct PetriNetBuilder {
    name: String,
    places: Vec<Place>,
    transitions: Vec<Transition>,
    connections: Vec<(u32, u32, i64)>,
}

impl PetriNetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        PetriNetBuilder {
            name: name.into(),
            places: Vec::new(),
            transitions: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a place with unbounded capacity.
    pub fn add_place(self, id: u32, name: &str, tokens: i64) -> Self {
        self.add_place_with_capacity(id, name, tokens, i64::MAX)
    }

    pub fn add_place_with_capacity(
        mut self,
        id: u32,
        name: &str,
        tokens: i64,
        capacity: i64,
    ) -> Self {
        self.places.push(Place {
            id,
            name: name.to_string(),
            tokens,
            capacity,
            reserved: 0,
        });
        self
    }

    pub fn add_transition<F>(mut self, id: u32, name: &str, duration: F) -> Self
    where
        F: FnMut(&mut Random) -> f64 + Send + 'static,
    {
        self.transitions.push(Transition {
            id,
            name: name.to_string(),
            duration: Box::new(duration),
            inputs: Vec::new(),
            outputs: Vec::new(),
            firing: false,
        });
        self
    }

    /// Arc with weight 1.
    pub fn connect(self, start: u32, end: u32) -> Self {
        self.connect_weighted(start, end, 1)
    }

    pub fn connect_weighted(mut self, start: u32, end: u32, weight: i64) -> Self {
        self.connections.push((start, end, weight));
        self
    }

    /// Validate the graph and wire transition adjacency.
    pub fn build(mut self) -> Result<PetriNet> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.places {
            if !seen.insert(p.id) {
                return Err(SimError::petri(format!("duplicate node id {}", p.id)));
            }
        }
        for t in &self.transitions {
            if !seen.insert(t.id) {
                return Err(SimError::petri(format!("duplicate node id {}", t.id)));
            }
        }
        for p in &self.places {
            if p.tokens < 0 || p.capacity < 0 || p.tokens > p.capacity {
                return Err(SimError::petri(format!(
                    "place {} has an invalid initial marking",
                    p.name
                )));
            }
        }
        let mut index = std::collections::HashMap::new();
        for (i, p) in self.places.iter().enumerate() {
            index.insert(p.id, NodeKind::Place(i));
        }
        for (i, t) in self.transitions.iter().enumerate() {
            index.insert(t.id, NodeKind::Transition(i));
        }
        let mut arcs = std::collections::HashSet::new();
        let connections = std::mem::take(&mut self.connections);
        for (start, end, weight) in connections {
            if weight < 1 {
                return Err(SimError::petri(format!(
                    "connection {start} -> {end} has weight below 1"
                )));
            }
            if !arcs.insert((start, end)) {
                return Err(SimError::petri(format!(
                    "duplicate connection {start} -> {end}"
                )));
            }
            let (Some(&s), Some(&e)) = (index.get(&start), index.get(&end)) else {
                return Err(SimError::petri(format!(
                    "connection {start} -> {end} references an unknown node"
                )));
            };
            match (s, e) {
                (NodeKind::Place(p), NodeKind::Transition(t)) => {
                    self.transitions[t].inputs.push((p, weight));
                }
                (NodeKind::Transition(t), NodeKind::Place(p)) => {
                    self.transitions[t].outputs.push((p, weight));
                }
                _ => {
                    return Err(SimError::petri(format!(
                        "connection {start} -> {end} joins nodes of the same kind"
                    )));
                }
            }
        }
        Ok(PetriNet {
            name: self.name,
            places: self.places,
            transitions: self.transitions,
            last_print: 0.0,
        })
    }
}

/// A compiled net, ready to install into a kernel.
pub struct PetriNet {
    name: String,
    pub(crate) places: Vec<Place>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) last_print: f64,
}

impl PetriNet {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token count of the place with the given user id.
    pub fn tokens(&self, place_id: u32) -> Option<i64> {
        self.places.iter().find(|p| p.id == place_id).map(|p| p.tokens)
    }

    pub fn place(&self, place_id: u32) -> Option<PlaceView> {
        self.places.iter().find(|p| p.id == place_id).map(|p| PlaceView {
            name: p.name.clone(),
            tokens: p.tokens,
            reserved: p.reserved,
            capacity: p.capacity,
        })
    }

    /// (name, tokens) for every place, in declaration order.
    pub fn marking(&self) -> Vec<(String, i64)> {
        self.places.iter().map(|p| (p.name.clone(), p.tokens)).collect()
    }

    pub fn is_firing(&self, transition_id: u32) -> Option<bool> {
        self.transitions
            .iter()
            .find(|t| t.id == transition_id)
            .map(|t| t.firing)
    }

    /// Every place satisfies `0 ≤ reserved ≤ tokens ≤ capacity`.
    pub fn invariants_hold(&self) -> bool {
        self.places
            .iter()
            .all(|p| 0 <= p.reserved && p.reserved <= p.tokens && p.tokens <= p.capacity)
    }
}

struct BeginFire {
    net: NetId,
    tr: usize,
}

impl Event for BeginFire {
    fn can_trigger(&mut self, sim: &mut Simulator, _me: EventId) -> bool {
        sim.net_can_fire(self.net, self.tr)
    }

    fn trigger(&mut self, sim: &mut Simulator, _me: EventId) -> Result<()> {
        sim.net_begin_fire(self.net, self.tr)
    }
}

struct EndFire {
    net: NetId,
    tr: usize,
}

impl Event for EndFire {
    fn trigger(&mut self, sim: &mut Simulator, _me: EventId) -> Result<()> {
        sim.net_end_fire(self.net, self.tr)
    }
}

impl Simulator {
    /// Install a compiled net and register one conditional begin-fire
    /// event per transition.
    pub fn install_net(&mut self, mut net: PetriNet) -> Result<NetId> {
        net.last_print = self.clock();
        let names: Vec<String> = net.transitions.iter().map(|t| t.name.clone()).collect();
        let nid = NetId(self.nets.len());
        self.nets.push(net);
        for (tr, name) in names.into_iter().enumerate() {
            self.schedule_conditional(
                BeginFire { net: nid, tr },
                format!("transition {name} begin firing"),
            )?;
        }
        Ok(nid)
    }

    pub fn net(&self, id: NetId) -> Result<&PetriNet> {
        self.nets.get(id.0).ok_or(SimError::UnknownNet)
    }

    /// A transition can fire when every input holds enough unreserved
    /// tokens and every output has spare capacity for its arc weight.
    pub(crate) fn net_can_fire(&self, nid: NetId, tr: usize) -> bool {
        let Some(net) = self.nets.get(nid.0) else {
            return false;
        };
        let t = &net.transitions[tr];
        for &(p, w) in &t.inputs {
            let pl = &net.places[p];
            if pl.tokens - pl.reserved < w {
                return false;
            }
        }
        for &(p, w) in &t.outputs {
            let pl = &net.places[p];
            if w + (pl.tokens - pl.reserved) > pl.capacity {
                return false;
            }
        }
        true
    }

    /// Reserve the input tokens and schedule the end-fire event after the
    /// transition's drawn duration.
    pub(crate) fn net_begin_fire(&mut self, nid: NetId, tr: usize) -> Result<()> {
        let clock = self.clock();
        let (duration, name) = {
            let (nets, rng) = self.petri_parts();
            let net = nets.get_mut(nid.0).ok_or(SimError::UnknownNet)?;
            let inputs = net.transitions[tr].inputs.clone();
            for (p, w) in inputs {
                net.places[p].reserved += w;
            }
            net.transitions[tr].firing = true;
            let duration = (net.transitions[tr].duration)(rng);
            (duration, net.transitions[tr].name.clone())
        };
        if duration < 0.0 {
            return Err(SimError::config(
                "transition duration must be non-negative",
            ));
        }
        self.schedule_named(
            EndFire { net: nid, tr },
            clock + duration,
            format!("transition {name} end firing"),
        )?;
        Ok(())
    }

    /// Consume the reserved input tokens, produce the outputs and re-arm
    /// the begin-fire guard.
    pub(crate) fn net_end_fire(&mut self, nid: NetId, tr: usize) -> Result<()> {
        self.net_print_state(nid)?;
        let name = {
            let net = self.nets.get_mut(nid.0).ok_or(SimError::UnknownNet)?;
            let inputs = net.transitions[tr].inputs.clone();
            let outputs = net.transitions[tr].outputs.clone();
            for (p, w) in inputs {
                let pl = &mut net.places[p];
                pl.tokens -= w;
                pl.reserved -= w;
            }
            for (p, w) in outputs {
                net.places[p].tokens += w;
            }
            net.transitions[tr].firing = false;
            net.transitions[tr].name.clone()
        };
        self.schedule_conditional(
            BeginFire { net: nid, tr },
            format!("transition {name} begin firing"),
        )?;
        Ok(())
    }

    /// Print the marking through the trace sink, at most once per instant
    /// of simulated time.
    fn net_print_state(&mut self, nid: NetId) -> Result<()> {
        let clock = self.clock();
        let line = {
            let net = self.nets.get_mut(nid.0).ok_or(SimError::UnknownNet)?;
            if net.last_print == clock {
                return Ok(());
            }
            net.last_print = clock;
            let mut s = format!("petri net {} marking:", net.name);
            for p in &net.places {
                s.push_str(&format!(" {}:{}", p.name, p.tokens));
            }
            s
        };
        self.trace(line);
        Ok(())
    }
}
