//! One step of the simulation.
//!
//! [`run_tick`] executes the phases in a fixed order over the agents alive
//! at tick start. Only the Sense phase runs in parallel; it reads a frozen
//! view and produces intents. Every later phase mutates shared state and
//! walks agents in ascending id order, so the result does not depend on
//! how the Sense phase was scheduled.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rayon::ThreadPool;
use rayon::prelude::*;
use ts_core::{AgentId, CellCoord, Genome, Position};

use crate::analytics::{self, StepSummary, TickCounts};
use crate::behavior::{self, Action, DecisionFault, Intent, SenseView};
use crate::context::TickContext;
use crate::error::SimError;
use crate::event::{DeathCause, SimEventKind};
use crate::registry::NewAgent;
use crate::rng;
use crate::spatial::SpatialIndex;

/// Result of one forager's claim on its cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForageOutcome {
    /// The forager.
    pub agent: AgentId,
    /// The cell it harvested.
    pub cell: CellCoord,
    /// Resource units taken from the cell. Zero if the cell ran dry.
    pub harvested: f64,
    /// Energy actually gained after the energy ceiling.
    pub energy_gained: f64,
}

impl ForageOutcome {
    /// Whether the forager got anything.
    pub fn succeeded(&self) -> bool {
        self.harvested > 0.0
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The tick that ran.
    pub tick: u64,
    /// Live agents after the tick.
    pub population: usize,
    /// Agents spawned this tick, queued spawns first, then newborns.
    pub births: Vec<AgentId>,
    /// Agents removed this tick, ascending id.
    pub deaths: Vec<(AgentId, DeathCause)>,
    /// Every forager's outcome, grouped by cell then ascending id.
    pub foraging: Vec<ForageOutcome>,
    /// Agents that drank this tick, ascending id.
    pub drinkers: Vec<AgentId>,
    /// Agents whose decision failed and who idled.
    pub faults: Vec<(AgentId, DecisionFault)>,
    /// Spawns and newborns dropped at the population cap.
    pub dropped: usize,
    /// Gene mutations among this tick's newborns.
    pub mutations: usize,
    /// Population snapshot, present on snapshot ticks.
    pub summary: Option<StepSummary>,
}

/// Run one tick against `ctx`.
///
/// `spawns` are queued external spawns, placed before anyone senses.
/// `pool` runs the Sense phase on a dedicated pool instead of rayon's global one.
pub fn run_tick(
    ctx: &mut TickContext<'_>,
    index: &mut SpatialIndex,
    pool: Option<&ThreadPool>,
    spawns: Vec<NewAgent>,
) -> TickReport {
    let mut report = TickReport {
        tick: ctx.tick,
        population: 0,
        births: Vec::new(),
        deaths: Vec::new(),
        foraging: Vec::new(),
        drinkers: Vec::new(),
        faults: Vec::new(),
        dropped: 0,
        mutations: 0,
        summary: None,
    };

    apply_spawns(ctx, spawns, &mut report);
    index.rebuild(ctx.registry);

    let intents = sense(ctx, index, pool, &mut report);
    let marked = apply_movement(ctx, &intents);
    resolve_foraging(ctx, &intents, &marked, &mut report);
    resolve_drinking(ctx, &intents, &marked, &mut report);
    resolve_reproduction(ctx, &intents, &marked, &mut report);

    for (&id, &cause) in &marked {
        if ctx.registry.kill(id, cause, ctx.tick, ctx.events) {
            report.deaths.push((id, cause));
        }
    }

    ctx.grid.regenerate(ctx.config.resource_regen_rate);

    report.population = ctx.registry.len();
    if ctx.tick.is_multiple_of(ctx.config.snapshot_interval) {
        let counts = TickCounts {
            births: report.births.len(),
            deaths: report.deaths.len(),
            mutations: report.mutations,
        };
        let summary = analytics::summarize(ctx.tick, ctx.registry, ctx.grid, counts);
        let description = format!(
            "tick {}: {} alive, {} born, {} died",
            ctx.tick, summary.population, counts.births, counts.deaths
        );
        ctx.emit(SimEventKind::StepSummary(summary.clone()), description);
        report.summary = Some(summary);
    }

    tracing::debug!(
        tick = ctx.tick,
        population = report.population,
        births = report.births.len(),
        deaths = report.deaths.len(),
        "tick complete"
    );
    report
}

/// Phase 0: place queued external spawns.
fn apply_spawns(ctx: &mut TickContext<'_>, spawns: Vec<NewAgent>, report: &mut TickReport) {
    for spawn in spawns {
        let position = spawn.position;
        match ctx.registry.spawn(spawn, ctx.tick, ctx.events) {
            Ok(id) => report.births.push(id),
            Err(err) => {
                tracing::warn!(tick = ctx.tick, %position, %err, "queued spawn dropped");
                record_dropped(ctx, None, &err, report);
            }
        }
    }
}

/// Phase 1: decide every agent's intent against a frozen view.
fn sense(
    ctx: &mut TickContext<'_>,
    index: &SpatialIndex,
    pool: Option<&ThreadPool>,
    report: &mut TickReport,
) -> Vec<(AgentId, Intent)> {
    let seed = ctx.config.seed;
    let tick = ctx.tick;
    let decisions: Vec<(AgentId, Result<Intent, DecisionFault>)> = {
        let view = SenseView {
            grid: &*ctx.grid,
            registry: &*ctx.registry,
            index,
            config: ctx.config,
            tick,
        };
        let agents: Vec<_> = view.registry.iter_alive().collect();
        let work = || {
            agents
                .par_iter()
                .map(|agent| {
                    let mut stream = rng::agent_stream(seed, agent.id, tick);
                    (agent.id, behavior::decide(agent, &view, &mut stream))
                })
                .collect()
        };
        match pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    };

    decisions
        .into_iter()
        .map(|(id, decision)| match decision {
            Ok(intent) => (id, intent),
            Err(fault) => {
                tracing::warn!(agent = %id, tick, %fault, "decision fault, agent idles");
                ctx.emit(
                    SimEventKind::DecisionFault {
                        agent: id,
                        reason: fault.to_string(),
                    },
                    format!("{id} idled: {fault}"),
                );
                report.faults.push((id, fault));
                (id, Intent::idle())
            }
        })
        .collect()
}

/// Phase 2: move, pay metabolism, grow thirsty, age, and mark the dying.
fn apply_movement(
    ctx: &mut TickContext<'_>,
    intents: &[(AgentId, Intent)],
) -> BTreeMap<AgentId, DeathCause> {
    let config = ctx.config;
    let mut marked = BTreeMap::new();
    for (id, intent) in intents {
        let grid = &*ctx.grid;
        let Some(agent) = ctx.registry.get_mut(*id) else {
            continue;
        };
        let origin = agent.position;
        let destination = intent
            .target
            .filter(|t| t.is_finite())
            .map(|t| grid.clamp(t))
            .filter(|&t| grid.is_passable(t))
            .unwrap_or(origin);
        let distance = origin.distance(destination);
        if distance.is_finite() {
            agent.position = destination;
        }

        let cost = config.metabolism_base_cost
            * agent.genome.metabolism()
            * (1.0 + config.movement_cost * distance);
        agent.energy -= cost;
        agent.thirst += config.thirst_rate * agent.genome.metabolism();
        agent.age += 1;

        if !agent.energy.is_finite() || agent.energy <= 0.0 {
            marked.insert(*id, DeathCause::Starvation);
        } else if !agent.thirst.is_finite() || agent.thirst > config.max_thirst {
            marked.insert(*id, DeathCause::Dehydration);
        } else if agent.is_elderly() {
            marked.insert(*id, DeathCause::OldAge);
        }
    }
    marked
}

/// Phase 3: split each cell's resource among its foragers by ascending id.
fn resolve_foraging(
    ctx: &mut TickContext<'_>,
    intents: &[(AgentId, Intent)],
    marked: &BTreeMap<AgentId, DeathCause>,
    report: &mut TickReport,
) {
    let mut by_cell: BTreeMap<CellCoord, Vec<AgentId>> = BTreeMap::new();
    for (id, intent) in intents {
        if intent.action != Action::Forage || marked.contains_key(id) {
            continue;
        }
        let coord = ctx
            .registry
            .get(*id)
            .and_then(|agent| ctx.grid.coord_of(agent.position));
        if let Some(coord) = coord {
            by_cell.entry(coord).or_default().push(*id);
        }
    }

    let config = ctx.config;
    for (coord, foragers) in by_cell {
        for id in foragers {
            let harvested = ctx
                .grid
                .take_resource(coord, config.harvest_per_forager)
                .unwrap_or_default();
            let mut energy_gained = 0.0;
            if let Some(agent) = ctx.registry.get_mut(id) {
                let before = agent.energy;
                agent.energy = (before + harvested * config.forage_yield).min(config.max_energy);
                energy_gained = (agent.energy - before).max(0.0);
            }
            report.foraging.push(ForageOutcome {
                agent: id,
                cell: coord,
                harvested,
                energy_gained,
            });
        }
    }
}

/// Phase 3, continued: agents that asked to drink and stand beside water
/// lose `drink_amount` thirst. Water never runs out.
fn resolve_drinking(
    ctx: &mut TickContext<'_>,
    intents: &[(AgentId, Intent)],
    marked: &BTreeMap<AgentId, DeathCause>,
    report: &mut TickReport,
) {
    let amount = ctx.config.drink_amount;
    for (id, intent) in intents {
        if intent.action != Action::Drink || marked.contains_key(id) {
            continue;
        }
        let grid = &*ctx.grid;
        let Some(agent) = ctx.registry.get_mut(*id) else {
            continue;
        };
        if grid.borders_water(agent.position) {
            agent.thirst = (agent.thirst - amount).max(0.0);
            report.drinkers.push(*id);
        }
    }
}

/// Phase 4: pair mates by ascending initiator id and spawn children.
fn resolve_reproduction(
    ctx: &mut TickContext<'_>,
    intents: &[(AgentId, Intent)],
    marked: &BTreeMap<AgentId, DeathCause>,
    report: &mut TickReport,
) {
    let config = ctx.config;
    let tick = ctx.tick;
    let mut paired: BTreeSet<AgentId> = BTreeSet::new();

    for (initiator, intent) in intents {
        let Action::Mate { partner } = intent.action else {
            continue;
        };
        let (initiator, partner) = (*initiator, partner);
        if paired.contains(&initiator)
            || paired.contains(&partner)
            || marked.contains_key(&initiator)
            || marked.contains_key(&partner)
        {
            continue;
        }
        let (Some(a), Some(b)) = (ctx.registry.get(initiator), ctx.registry.get(partner)) else {
            continue;
        };
        let eligible = behavior::is_fertile(a, config, tick)
            && behavior::is_fertile(b, config, tick)
            && behavior::is_compatible(a, b, config)
            && a.position.distance(b.position) <= a.genome.sight_radius();
        if !eligible {
            continue;
        }
        paired.insert(initiator);
        paired.insert(partner);

        if ctx.registry.is_full() {
            let err = SimError::CapacityExceeded {
                limit: ctx.registry.max_population(),
            };
            tracing::warn!(tick, %initiator, %partner, "newborn dropped at population cap");
            record_dropped(ctx, Some((initiator, partner)), &err, report);
            continue;
        }

        let mut stream = rng::pair_stream(config.seed, initiator, partner, tick);
        let child = Genome::inherit(&a.genome, &b.genome, &config.inheritance_params(), &mut stream);
        let position = birth_position(ctx, a.position, b.position, &mut stream);
        let newborn = NewAgent {
            position,
            genome: child.genome,
            energy: config.child_energy,
            parents: Some((initiator, partner)),
            generation: a.generation.max(b.generation) + 1,
        };

        match ctx.registry.spawn(newborn, tick, ctx.events) {
            Ok(id) => {
                for m in &child.mutations {
                    ctx.emit(
                        SimEventKind::Mutation {
                            agent: id,
                            gene: m.gene,
                            before: m.before,
                            after: m.after,
                        },
                        format!("{id} {} mutated {:.3} -> {:.3}", m.gene, m.before, m.after),
                    );
                }
                report.mutations += child.mutations.len();
                report.births.push(id);
                for parent in [initiator, partner] {
                    if let Some(p) = ctx.registry.get_mut(parent) {
                        p.energy -= config.reproduction_energy_cost;
                        p.last_reproduced = Some(tick);
                    }
                }
            }
            Err(err) => record_dropped(ctx, Some((initiator, partner)), &err, report),
        }
    }
}

/// Jittered point near the parents' midpoint, falling back to the initiator's
/// position when that point is not passable.
fn birth_position<R: Rng + ?Sized>(
    ctx: &TickContext<'_>,
    initiator: Position,
    partner: Position,
    stream: &mut R,
) -> Position {
    let mid = initiator.midpoint(partner);
    let jitter = Position::new(
        mid.x + stream.random_range(-0.5..=0.5),
        mid.y + stream.random_range(-0.5..=0.5),
    );
    let candidate = ctx.grid.clamp(jitter);
    if ctx.grid.is_passable(candidate) {
        candidate
    } else {
        initiator
    }
}

fn record_dropped(
    ctx: &mut TickContext<'_>,
    parents: Option<(AgentId, AgentId)>,
    err: &SimError,
    report: &mut TickReport,
) {
    ctx.emit(SimEventKind::CapacityExceeded { parents }, err.to_string());
    report.dropped += 1;
}
