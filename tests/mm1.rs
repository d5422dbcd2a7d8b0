//! Single-server grocery checkout in the event-scheduling world view:
//! exponential inter-arrival times, truncated-normal service times, run
//! until 100 customers have been served.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use deskit::{
    Accumulate, Event, EventId, RunConfig, Simulation, Simulator, Tally,
};

const MEAN_INTER_ARRIVAL: f64 = 4.5;
const MEAN_SERVICE: f64 = 3.2;
const SIGMA: f64 = 0.6;
const TOTAL_CUSTOMERS: u64 = 100;

struct Checkout {
    queue: VecDeque<f64>,
    queue_length: i64,
    in_service: bool,
    departures: u64,
    long_services: u64,
    response: Tally,
    queue_stat: Accumulate,
    busy: Accumulate,
}

impl Checkout {
    fn new() -> Self {
        Checkout {
            queue: VecDeque::new(),
            queue_length: 0,
            in_service: false,
            departures: 0,
            long_services: 0,
            response: Tally::new("RESPONSE TIME"),
            queue_stat: Accumulate::new("QUEUE LENGTH"),
            busy: Accumulate::new("SERVER UTILIZATION"),
        }
    }
}

type Shared = Arc<Mutex<Checkout>>;

fn schedule_departure(sim: &mut Simulator, shop: &Shared) -> deskit::Result<()> {
    let service = sim.rng_mut().next_trunc_normal(MEAN_SERVICE, SIGMA)?;
    let t = sim.clock() + service;
    {
        let mut m = shop.lock();
        m.in_service = true;
        m.queue_length -= 1;
        let (ql, clock) = (m.queue_length as f64, sim.clock());
        m.busy.update(1.0, clock);
        m.queue_stat.update(ql, clock);
    }
    sim.schedule_named(Departure { shop: shop.clone() }, t, "departure")?;
    Ok(())
}

struct Arrival {
    shop: Shared,
}

impl Event for Arrival {
    fn trigger(&mut self, sim: &mut Simulator, _me: EventId) -> deskit::Result<()> {
        let clock = sim.clock();
        let start_service = {
            let mut m = self.shop.lock();
            m.queue.push_back(clock);
            m.queue_length += 1;
            let ql = m.queue_length as f64;
            m.queue_stat.update(ql, clock);
            !m.in_service
        };
        let gap = sim.rng_mut().next_exponential(1.0) * MEAN_INTER_ARRIVAL;
        sim.schedule_named(Arrival { shop: self.shop.clone() }, clock + gap, "arrival")?;
        if start_service {
            schedule_departure(sim, &self.shop)?;
        }
        Ok(())
    }
}

struct Departure {
    shop: Shared,
}

impl Event for Departure {
    fn trigger(&mut self, sim: &mut Simulator, _me: EventId) -> deskit::Result<()> {
        let clock = sim.clock();
        let more = {
            let mut m = self.shop.lock();
            let arrived = m.queue.pop_front().expect("a customer is in service");
            let response = clock - arrived;
            m.response.update(response, clock);
            if response > 4.0 {
                m.long_services += 1;
            }
            m.departures += 1;
            if m.departures >= TOTAL_CUSTOMERS {
                sim.stop();
            }
            m.busy.update(0.0, clock);
            m.queue_length > 0
        };
        if more {
            schedule_departure(sim, &self.shop)?;
        } else {
            self.shop.lock().in_service = false;
        }
        Ok(())
    }
}

#[test]
fn mm1_checkout_serves_100_customers() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let shop: Shared = Arc::new(Mutex::new(Checkout::new()));
    let mut sim = Simulation::new(RunConfig::new(12345678).quiet(true))?;
    sim.with_sim(|s| -> deskit::Result<()> {
        let clock = s.clock();
        let m = shop.clone();
        {
            let mut g = m.lock();
            g.busy.update(0.0, clock);
            g.queue_stat.update(0.0, clock);
        }
        let gap = s.rng_mut().next_exponential(1.0) * MEAN_INTER_ARRIVAL;
        s.schedule_named(Arrival { shop: m }, clock + gap, "arrival")?;
        Ok(())
    })?;
    sim.run()?;

    let m = shop.lock();
    assert_eq!(m.departures, TOTAL_CUSTOMERS);
    assert_eq!(m.response.obs(), TOTAL_CUSTOMERS);
    let mean_response = m.response.mean();
    assert!(mean_response > 0.0, "mean response {mean_response}");
    assert!(mean_response <= 20.0, "mean response {mean_response}");
    assert!(m.queue_stat.max() >= 1.0);
    assert!(sim.clock() > 0.0);
    // the server was busy whenever someone was in service
    assert!(m.busy.mean() > 0.0 && m.busy.mean() <= 1.0);
    Ok(())
}
