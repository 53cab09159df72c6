//! The per-agent decision function.
//!
//! [`decide`] reads a frozen [`SenseView`] of the tick-start world and returns
//! an [`Intent`]. It never mutates anything, so the engine can evaluate every
//! agent in parallel. Behavior is one trait-driven function, not a family of
//! polymorphic strategies: what differs between agents is their genome.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_core::{Agent, AgentId, CellCoord, Position, WorldGrid};

use crate::config::SimConfig;
use crate::registry::AgentRegistry;
use crate::spatial::SpatialIndex;

/// What an agent wants to do once it has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Do nothing.
    Rest,
    /// Harvest the cell the agent ends up in.
    Forage,
    /// Drink, if the agent ends up beside water.
    Drink,
    /// Try to reproduce with `partner`.
    Mate {
        /// The chosen partner.
        partner: AgentId,
    },
    /// Roam without a goal.
    Wander,
}

/// The outcome of one agent's decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intent {
    /// Where the agent wants to move this tick, already limited to its
    /// stride. `None` means stay put.
    pub target: Option<Position>,
    /// What the agent does after moving.
    pub action: Action,
}

impl Intent {
    /// Stay in place and do nothing.
    pub fn idle() -> Self {
        Self {
            target: None,
            action: Action::Rest,
        }
    }
}

/// Why an agent's decision could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionFault {
    /// The agent's own state holds values no rule can act on.
    #[error("corrupt agent state: {0}")]
    CorruptState(String),
}

/// Read-only world state an agent senses during the Sense phase.
#[derive(Debug, Clone, Copy)]
pub struct SenseView<'a> {
    /// Terrain and resources at tick start.
    pub grid: &'a WorldGrid,
    /// Agents at tick start.
    pub registry: &'a AgentRegistry,
    /// Positions at tick start.
    pub index: &'a SpatialIndex,
    /// Session configuration.
    pub config: &'a SimConfig,
    /// The tick being decided.
    pub tick: u64,
}

/// Whether `agent` meets the age, energy and cooldown requirements to mate.
pub fn is_fertile(agent: &Agent, config: &SimConfig, tick: u64) -> bool {
    agent.age >= config.reproduction_min_age
        && agent.energy >= config.reproduction_min_energy
        && agent.cooldown_elapsed(tick, config.reproduction_cooldown)
}

/// Whether two agents' genomes are close enough to interbreed.
pub fn is_compatible(a: &Agent, b: &Agent, config: &SimConfig) -> bool {
    a.genome.distance(&b.genome) <= config.compatibility_threshold
}

/// Longest distance `agent` can cover in one tick.
pub fn stride(agent: &Agent, config: &SimConfig) -> f64 {
    agent.genome.speed() * config.max_step
}

/// Choose what `agent` does this tick.
pub fn decide<R: Rng + ?Sized>(
    agent: &Agent,
    view: &SenseView<'_>,
    rng: &mut R,
) -> Result<Intent, DecisionFault> {
    if !agent.is_sound() {
        return Err(DecisionFault::CorruptState(format!(
            "energy {} at {}",
            agent.energy, agent.position
        )));
    }
    let config = view.config;
    let step = stride(agent, config);

    if agent.energy < config.hunger_level() {
        if view.grid.cell_at(agent.position).is_some_and(|c| c.resource > 0.0) {
            return Ok(Intent {
                target: None,
                action: Action::Forage,
            });
        }
        let target = match richest_cell(agent, view.grid) {
            Some(coord) => agent.position.step_toward(coord.center(), step),
            None => wander_target(agent.position, step, rng),
        };
        return Ok(Intent {
            target: Some(target),
            action: Action::Forage,
        });
    }

    if agent.thirst > config.thirst_level() {
        if view.grid.borders_water(agent.position) {
            return Ok(Intent {
                target: None,
                action: Action::Drink,
            });
        }
        let target = match nearest_shore(agent, view.grid) {
            Some(coord) => agent.position.step_toward(coord.center(), step),
            None => wander_target(agent.position, step, rng),
        };
        return Ok(Intent {
            target: Some(target),
            action: Action::Drink,
        });
    }

    if is_fertile(agent, config, view.tick)
        && let Some(partner) = choose_partner(agent, view)
    {
        return Ok(Intent {
            target: Some(agent.position.step_toward(partner.position, step)),
            action: Action::Mate {
                partner: partner.id,
            },
        });
    }

    if step > 0.0 {
        Ok(Intent {
            target: Some(wander_target(agent.position, step, rng)),
            action: Action::Wander,
        })
    } else {
        Ok(Intent::idle())
    }
}

/// Richest passable cell within sight. Ties go to the nearer cell, then the
/// lower row, then the lower column.
fn richest_cell(agent: &Agent, grid: &WorldGrid) -> Option<CellCoord> {
    let origin = agent.position;
    grid.coords_within(origin, agent.genome.sight_radius())
        .into_iter()
        .filter_map(|coord| {
            grid.cell(coord)
                .filter(|c| c.passable && c.resource > 0.0)
                .map(|c| (coord, c.resource))
        })
        .min_by(|(a, ra), (b, rb)| {
            rb.total_cmp(ra)
                .then_with(|| {
                    a.center()
                        .distance_sq(origin)
                        .total_cmp(&b.center().distance_sq(origin))
                })
                .then_with(|| a.y.cmp(&b.y))
                .then_with(|| a.x.cmp(&b.x))
        })
        .map(|(coord, _)| coord)
}

/// Nearest passable cell within sight that borders water. Ties go to the
/// lower row, then the lower column.
fn nearest_shore(agent: &Agent, grid: &WorldGrid) -> Option<CellCoord> {
    let origin = agent.position;
    grid.coords_within(origin, agent.genome.sight_radius())
        .into_iter()
        .filter(|&coord| grid.cell(coord).is_some_and(|c| c.passable) && grid.is_shore(coord))
        .min_by(|a, b| {
            a.center()
                .distance_sq(origin)
                .total_cmp(&b.center().distance_sq(origin))
                .then_with(|| a.y.cmp(&b.y))
                .then_with(|| a.x.cmp(&b.x))
        })
}

/// Nearest fertile, compatible neighbor within sight. Ties go to the lower id.
fn choose_partner<'a>(agent: &Agent, view: &SenseView<'a>) -> Option<&'a Agent> {
    let origin = agent.position;
    view.index
        .nearby(origin, agent.genome.sight_radius())
        .into_iter()
        .filter(|&id| id != agent.id)
        .filter_map(|id| view.registry.get(id))
        .filter(|other| {
            other.is_sound()
                && is_fertile(other, view.config, view.tick)
                && is_compatible(agent, other, view.config)
        })
        .min_by(|a, b| {
            a.position
                .distance_sq(origin)
                .total_cmp(&b.position.distance_sq(origin))
                .then_with(|| a.id.cmp(&b.id))
        })
}

fn wander_target<R: Rng + ?Sized>(origin: Position, step: f64, rng: &mut R) -> Position {
    let heading = rng.random::<f64>() * TAU;
    Position::new(
        origin.x + step * heading.cos(),
        origin.y + step * heading.sin(),
    )
}
