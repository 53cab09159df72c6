use serde::{Deserialize, Serialize};
use ts_core::{InheritanceParams, MutationParams};

use crate::error::{SimError, SimResult};

/// Configuration for a simulation run.
///
/// Every field has a default, so a partial JSON object deserializes into a
/// complete configuration. Call [`SimConfig::validate`] before use; a session
/// refuses to start with an invalid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// RNG seed for deterministic simulation.
    pub seed: u64,
    /// Hard cap on the number of live agents.
    pub max_population: usize,
    /// Energy of seeded and externally spawned agents.
    pub initial_energy: f64,
    /// Energy ceiling after foraging.
    pub max_energy: f64,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Mutation standard deviation as a fraction of the trait span.
    pub mutation_magnitude: f64,
    /// Probability that a mutation uses the widened deviation.
    pub big_mutation_chance: f64,
    /// Deviation multiplier for big mutations.
    pub big_mutation_factor: f64,
    /// Probability that a gene is taken from the initiating parent.
    pub crossover_bias: f64,
    /// Energy spent per tick at metabolism trait 1.0 while resting.
    pub metabolism_base_cost: f64,
    /// Extra cost multiplier per world unit moved.
    pub movement_cost: f64,
    /// Distance moved per tick at speed trait 1.0.
    pub max_step: f64,
    /// Agents forage when energy drops below this fraction of `max_energy`.
    pub forage_threshold: f64,
    /// Resource units one forager may take per tick.
    pub harvest_per_forager: f64,
    /// Energy gained per resource unit harvested.
    pub forage_yield: f64,
    /// Resource regenerated per cell per tick.
    pub resource_regen_rate: f64,
    /// Thirst gained per tick at metabolism trait 1.0.
    pub thirst_rate: f64,
    /// Agents die of dehydration once thirst exceeds this.
    pub max_thirst: f64,
    /// Agents look for water when thirst rises above this fraction of `max_thirst`.
    pub drink_threshold: f64,
    /// Thirst removed by one tick of drinking.
    pub drink_amount: f64,
    /// Minimum age in ticks before an agent may mate.
    pub reproduction_min_age: u64,
    /// Minimum energy before an agent may mate.
    pub reproduction_min_energy: f64,
    /// Energy each parent pays per child.
    pub reproduction_energy_cost: f64,
    /// Starting energy of a newborn.
    pub child_energy: f64,
    /// Base ticks between reproductions, scaled by the fertility trait.
    pub reproduction_cooldown: u64,
    /// Maximum genome distance for two agents to be compatible mates.
    pub compatibility_threshold: f64,
    /// Ticks per real second when paced live.
    pub tick_rate: f64,
    /// Ticks between `StepSummary` events.
    pub snapshot_interval: u64,
    /// Maximum event log size (oldest events dropped when exceeded). 0 = unlimited.
    pub max_events: usize,
    /// Sense-phase thread count. `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_population: 2000,
            initial_energy: 50.0,
            max_energy: 100.0,
            mutation_rate: 0.05,
            mutation_magnitude: 0.05,
            big_mutation_chance: 0.1,
            big_mutation_factor: 3.0,
            crossover_bias: 0.5,
            metabolism_base_cost: 1.0,
            movement_cost: 0.5,
            max_step: 1.5,
            forage_threshold: 0.6,
            harvest_per_forager: 4.0,
            forage_yield: 3.0,
            resource_regen_rate: 0.1,
            thirst_rate: 1.0,
            max_thirst: 100.0,
            drink_threshold: 0.6,
            drink_amount: 30.0,
            reproduction_min_age: 10,
            reproduction_min_energy: 60.0,
            reproduction_energy_cost: 20.0,
            child_energy: 30.0,
            reproduction_cooldown: 20,
            compatibility_threshold: 0.3,
            tick_rate: 10.0,
            snapshot_interval: 1,
            max_events: 0,
            worker_threads: None,
        }
    }
}

impl SimConfig {
    /// Set the RNG seed for deterministic simulation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the population cap.
    pub fn with_max_population(mut self, max: usize) -> Self {
        self.max_population = max;
        self
    }

    /// Set the energy of seeded and externally spawned agents.
    pub fn with_initial_energy(mut self, energy: f64) -> Self {
        self.initial_energy = energy;
        self
    }

    /// Set the per-gene mutation probability.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Set the crossover bias toward the initiating parent.
    pub fn with_crossover_bias(mut self, bias: f64) -> Self {
        self.crossover_bias = bias;
        self
    }

    /// Set the base metabolic cost per tick.
    pub fn with_metabolism_base_cost(mut self, cost: f64) -> Self {
        self.metabolism_base_cost = cost;
        self
    }

    /// Set how many resource units one forager may take per tick.
    pub fn with_harvest_per_forager(mut self, amount: f64) -> Self {
        self.harvest_per_forager = amount;
        self
    }

    /// Set the energy gained per resource unit.
    pub fn with_forage_yield(mut self, yield_per_unit: f64) -> Self {
        self.forage_yield = yield_per_unit;
        self
    }

    /// Set the per-tick resource regeneration.
    pub fn with_resource_regen_rate(mut self, rate: f64) -> Self {
        self.resource_regen_rate = rate;
        self
    }

    /// Set the per-tick thirst gain and the dehydration limit.
    pub fn with_thirst(mut self, rate: f64, max: f64) -> Self {
        self.thirst_rate = rate;
        self.max_thirst = max;
        self
    }

    /// Set the minimum age, minimum energy and base cooldown for mating.
    pub fn with_reproduction(mut self, min_age: u64, min_energy: f64, cooldown: u64) -> Self {
        self.reproduction_min_age = min_age;
        self.reproduction_min_energy = min_energy;
        self.reproduction_cooldown = cooldown;
        self
    }

    /// Set the live-pacing tick rate in ticks per second.
    pub fn with_tick_rate(mut self, rate: f64) -> Self {
        self.tick_rate = rate;
        self
    }

    /// Set the number of ticks between `StepSummary` events.
    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the maximum event log size (0 = unlimited).
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Use a dedicated Sense-phase pool of `threads` workers.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Mutation operator parameters derived from this configuration.
    pub fn mutation_params(&self) -> MutationParams {
        MutationParams {
            rate: self.mutation_rate,
            magnitude: self.mutation_magnitude,
            big_mutation_chance: self.big_mutation_chance,
            big_mutation_factor: self.big_mutation_factor,
        }
    }

    /// Inheritance operator parameters derived from this configuration.
    pub fn inheritance_params(&self) -> InheritanceParams {
        InheritanceParams {
            crossover_bias: self.crossover_bias,
            mutation: self.mutation_params(),
        }
    }

    /// Energy below which an agent prefers foraging.
    pub fn hunger_level(&self) -> f64 {
        self.forage_threshold * self.max_energy
    }

    /// Thirst above which an agent prefers drinking.
    pub fn thirst_level(&self) -> f64 {
        self.drink_threshold * self.max_thirst
    }

    /// Check every option against its legal range.
    pub fn validate(&self) -> SimResult<()> {
        probability("mutation_rate", self.mutation_rate)?;
        probability("big_mutation_chance", self.big_mutation_chance)?;
        probability("crossover_bias", self.crossover_bias)?;
        probability("forage_threshold", self.forage_threshold)?;
        probability("compatibility_threshold", self.compatibility_threshold)?;
        probability("drink_threshold", self.drink_threshold)?;

        non_negative("mutation_magnitude", self.mutation_magnitude)?;
        non_negative("metabolism_base_cost", self.metabolism_base_cost)?;
        non_negative("movement_cost", self.movement_cost)?;
        non_negative("forage_yield", self.forage_yield)?;
        non_negative("resource_regen_rate", self.resource_regen_rate)?;
        non_negative("thirst_rate", self.thirst_rate)?;
        non_negative("drink_amount", self.drink_amount)?;
        non_negative("reproduction_min_energy", self.reproduction_min_energy)?;
        non_negative("reproduction_energy_cost", self.reproduction_energy_cost)?;

        positive("max_energy", self.max_energy)?;
        positive("max_step", self.max_step)?;
        positive("harvest_per_forager", self.harvest_per_forager)?;
        positive("tick_rate", self.tick_rate)?;
        positive("max_thirst", self.max_thirst)?;

        if !(self.big_mutation_factor.is_finite() && self.big_mutation_factor >= 1.0) {
            return Err(invalid(format!(
                "big_mutation_factor must be at least 1, got {}",
                self.big_mutation_factor
            )));
        }
        within_energy("initial_energy", self.initial_energy, self.max_energy)?;
        within_energy("child_energy", self.child_energy, self.max_energy)?;
        if self.reproduction_min_energy <= self.reproduction_energy_cost {
            return Err(invalid(format!(
                "reproduction_min_energy must exceed reproduction_energy_cost, got {} <= {}",
                self.reproduction_min_energy, self.reproduction_energy_cost
            )));
        }
        if self.max_population == 0 {
            return Err(invalid("max_population must be at least 1, got 0".into()));
        }
        if self.snapshot_interval == 0 {
            return Err(invalid("snapshot_interval must be at least 1, got 0".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(invalid("worker_threads must be at least 1, got 0".into()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> SimError {
    SimError::InvalidConfiguration(message)
}

fn probability(name: &str, value: f64) -> SimResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}

fn positive(name: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and positive, got {value}")))
    }
}

pub(crate) fn within_energy(name: &str, value: f64, max_energy: f64) -> SimResult<()> {
    if value > 0.0 && value <= max_energy {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} must be within (0, {max_energy}], got {value}"
        )))
    }
}
