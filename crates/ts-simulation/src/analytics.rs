use serde::{Deserialize, Serialize};
use ts_core::{Agent, Environment, TraitKind, WorldGrid};

use crate::event::{EventLog, SimEventKind};
use crate::registry::AgentRegistry;

/// Population mean of one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitMean {
    /// The trait.
    pub gene: TraitKind,
    /// Mean value over the live population.
    pub mean: f64,
}

/// Population snapshot recorded after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Live agents after the tick.
    pub population: usize,
    /// Births during the tick.
    pub births: usize,
    /// Deaths during the tick.
    pub deaths: usize,
    /// Gene mutations among this tick's newborns.
    pub mutations: usize,
    /// Mean value of each trait, in genome order.
    pub trait_means: Vec<TraitMean>,
    /// Mean energy of live agents.
    pub mean_energy: f64,
    /// Mean thirst of live agents.
    pub mean_thirst: f64,
    /// Mean age of live agents.
    pub mean_age: f64,
    /// Highest generation alive.
    pub max_generation: u32,
    /// Resource left in the world.
    pub total_resource: f64,
    /// Mean analytics-only fitness proxy of live agents.
    pub mean_fitness: f64,
}

impl StepSummary {
    /// Mean of one trait, if recorded.
    pub fn trait_mean(&self, gene: TraitKind) -> Option<f64> {
        self.trait_means
            .iter()
            .find(|t| t.gene == gene)
            .map(|t| t.mean)
    }
}

/// Per-tick counters fed into [`summarize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounts {
    /// Births this tick.
    pub births: usize,
    /// Deaths this tick.
    pub deaths: usize,
    /// Mutated genes this tick.
    pub mutations: usize,
}

/// Build a [`StepSummary`] from the current registry and grid.
///
/// Means over an empty population are zero.
pub fn summarize(
    tick: u64,
    registry: &AgentRegistry,
    grid: &WorldGrid,
    counts: TickCounts,
) -> StepSummary {
    let population = registry.len();
    let env = Environment::from_grid(grid);
    let trait_means = TraitKind::ALL
        .iter()
        .map(|&gene| TraitMean {
            gene,
            mean: mean_by(registry, |a| a.genome.get(gene)),
        })
        .collect();

    StepSummary {
        tick,
        population,
        births: counts.births,
        deaths: counts.deaths,
        mutations: counts.mutations,
        trait_means,
        mean_energy: mean_by(registry, |a| a.energy),
        mean_thirst: mean_by(registry, |a| a.thirst),
        mean_age: mean_by(registry, |a| a.age as f64),
        max_generation: registry
            .iter_alive()
            .map(|a| a.generation)
            .max()
            .unwrap_or(0),
        total_resource: grid.total_resource(),
        mean_fitness: mean_by(registry, |a| a.genome.fitness_proxy(&env)),
    }
}

/// `(tick, population)` for every retained `StepSummary` event.
pub fn population_series(log: &EventLog) -> Vec<(u64, usize)> {
    summaries(log).map(|s| (s.tick, s.population)).collect()
}

/// `(tick, mean)` of one trait for every retained `StepSummary` event.
pub fn trait_series(log: &EventLog, gene: TraitKind) -> Vec<(u64, f64)> {
    summaries(log)
        .filter_map(|s| s.trait_mean(gene).map(|m| (s.tick, m)))
        .collect()
}

fn mean_by(registry: &AgentRegistry, f: impl Fn(&Agent) -> f64) -> f64 {
    let count = registry.len();
    if count == 0 {
        0.0
    } else {
        registry.iter_alive().map(f).sum::<f64>() / count as f64
    }
}

fn summaries(log: &EventLog) -> impl Iterator<Item = &StepSummary> + '_ {
    log.events().iter().filter_map(|e| match &e.kind {
        SimEventKind::StepSummary(summary) => Some(summary),
        _ => None,
    })
}
