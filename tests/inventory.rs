//! (s,S) inventory policy over a 120-month horizon, with perishable stock,
//! backlogged demand and delivery lag, written with free-form processes: a
//! demand generator, a monthly review and one order-arrival process per
//! order placed.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use deskit::{Accumulate, CdfDiscreteTable, ProcContext, RunConfig, Simulation, Tally};

const MONTHS: f64 = 120.0;
const MEAN_INTER_DEMAND: f64 = 0.1;
const MIN_SHELF_LIFE: f64 = 1.5;
const MAX_SHELF_LIFE: f64 = 2.5;
const MIN_DELIVERY_LAG: f64 = 1.0;
const MAX_DELIVERY_LAG: f64 = 3.0;
const LITTLE_S: i64 = 20;
const BIG_S: i64 = 40;
const SETUP_COST: f64 = 32.0;
const COST_PER_ITEM: f64 = 3.0;
const INITIAL_INVENTORY: i64 = 60;

struct Store {
    /// Spoil time of every item on the shelf.
    shelf: Vec<f64>,
    backlog: i64,
    on_order: i64,
    ordering_cost: Tally,
    in_storage: Accumulate,
    in_backlog: Accumulate,
}

type Shared = Arc<Mutex<Store>>;

fn record_levels(store: &Shared, now: f64) {
    let mut m = store.lock();
    let (backlog, shelf) = (m.backlog as f64, m.shelf.len() as f64);
    m.in_backlog.update(backlog, now);
    m.in_storage.update(shelf, now);
}

fn order_arrival(store: Shared, size: i64) -> impl FnOnce(&mut ProcContext) -> deskit::Result<()> {
    move |ctx| {
        let now = ctx.time();
        {
            let mut m = store.lock();
            for _ in 0..size {
                if m.backlog == 0 {
                    let life = ctx.sample(|r| r.next_uniform(MIN_SHELF_LIFE, MAX_SHELF_LIFE))?;
                    m.shelf.push(now + life);
                } else {
                    m.backlog -= 1;
                }
            }
            m.on_order -= size;
        }
        record_levels(&store, now);
        Ok(())
    }
}

fn demand_generator(store: Shared) -> impl FnOnce(&mut ProcContext) -> deskit::Result<()> {
    move |ctx| {
        let demand_cdf = CdfDiscreteTable::new(
            &[1, 2, 3, 4],
            &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
        )?;
        while ctx.time() < MONTHS {
            let gap = ctx.sample(|r| r.next_exponential(MEAN_INTER_DEMAND));
            ctx.wait(gap)?;
            let now = ctx.time();
            {
                let mut m = store.lock();
                // spoiled stock leaves the shelf first
                m.shelf.retain(|&spoils| spoils > now);
                let size = ctx.sample(|r| r.next_discrete(&demand_cdf));
                for _ in 0..size {
                    if m.shelf.is_empty() {
                        m.backlog += 1;
                    } else {
                        m.shelf.remove(0);
                    }
                }
            }
            record_levels(&store, now);
        }
        Ok(())
    }
}

fn inventory_review(store: Shared) -> impl FnOnce(&mut ProcContext) -> deskit::Result<()> {
    move |ctx| {
        while ctx.time() < MONTHS {
            let now = ctx.time();
            let order = {
                let mut m = store.lock();
                let level = m.shelf.len() as i64 - m.backlog + m.on_order;
                let cost = if level < LITTLE_S {
                    let size = BIG_S - level;
                    m.on_order += size;
                    Some((size, SETUP_COST + COST_PER_ITEM * size as f64))
                } else {
                    None
                };
                let cost_value = cost.map(|(_, c)| c).unwrap_or(0.0);
                m.ordering_cost.update(cost_value, now);
                cost
            };
            if let Some((size, _)) = order {
                let lag = ctx.sample(|r| r.next_uniform(MIN_DELIVERY_LAG, MAX_DELIVERY_LAG))?;
                let s = store.clone();
                ctx.with_sim(|sim| -> deskit::Result<()> {
                    let p = sim.spawn_process("order arrival", order_arrival(s, size))?;
                    sim.activate(p, now + lag)?;
                    Ok(())
                })?;
            }
            ctx.wait(1.0)?;
        }
        Ok(())
    }
}

#[test]
fn inventory_policy_runs_the_horizon() -> Result<()> {
    let store: Shared = Arc::new(Mutex::new(Store {
        shelf: Vec::new(),
        backlog: 0,
        on_order: INITIAL_INVENTORY,
        ordering_cost: Tally::new("ordering cost"),
        in_storage: Accumulate::new("number in storage"),
        in_backlog: Accumulate::new("number in backlog"),
    }));

    let mut sim = Simulation::new(RunConfig::new(12345678).quiet(true))?;
    sim.with_sim(|s| -> deskit::Result<()> {
        {
            let mut m = store.lock();
            m.ordering_cost.update(0.0, 0.0);
            m.in_storage.update(0.0, 0.0);
            m.in_backlog.update(0.0, 0.0);
        }
        let initial = s.spawn_process(
            "initial stock",
            order_arrival(store.clone(), INITIAL_INVENTORY),
        )?;
        s.activate_now(initial)?;
        let demand = s.spawn_process("demand", demand_generator(store.clone()))?;
        s.activate_now(demand)?;
        let review = s.spawn_process("review", inventory_review(store.clone()))?;
        s.activate_now(review)?;
        Ok(())
    })?;
    sim.run()?;

    assert!(sim.clock() >= MONTHS);
    let m = store.lock();
    assert!(m.ordering_cost.obs() >= 120);
    assert!(m.ordering_cost.mean() >= 0.0);
    assert_eq!(m.in_backlog.min(), 0.0);
    assert!(m.in_storage.max() > 0.0);
    // every placed order eventually arrived
    assert_eq!(m.on_order, 0);
    Ok(())
}
