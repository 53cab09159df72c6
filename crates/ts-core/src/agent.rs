use std::fmt;

use serde::{Deserialize, Serialize};

use crate::genome::Genome;
use crate::position::Position;

/// Unique identifier of an agent. Assigned monotonically and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl AgentId {
    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live creature and its mutable state.
///
/// The genome is fixed at creation; everything else changes as ticks run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Current location in world units.
    pub position: Position,
    /// Remaining energy. The agent dies once this reaches zero.
    pub energy: f64,
    /// Accumulated thirst. Drinking beside water lowers it; the agent dies
    /// of dehydration once it passes the configured maximum.
    #[serde(default)]
    pub thirst: f64,
    /// Ticks survived since birth.
    pub age: u64,
    /// Heritable traits.
    pub genome: Genome,
    /// Seeded agents are generation 0; children are one past their oldest-line parent.
    pub generation: u32,
    /// Both parents, for agents born through reproduction.
    pub parents: Option<(AgentId, AgentId)>,
    /// Tick the agent entered the world.
    pub born_at: u64,
    /// Tick of the agent's most recent reproduction.
    pub last_reproduced: Option<u64>,
}

impl Agent {
    /// Create a generation-0 agent with no parents.
    pub fn new(id: AgentId, position: Position, energy: f64, genome: Genome, born_at: u64) -> Self {
        Self {
            id,
            position,
            energy,
            thirst: 0.0,
            age: 0,
            genome,
            generation: 0,
            parents: None,
            born_at,
            last_reproduced: None,
        }
    }

    /// Set the lineage of a child agent.
    pub fn with_parents(mut self, parents: (AgentId, AgentId), generation: u32) -> Self {
        self.parents = Some(parents);
        self.generation = generation;
        self
    }

    /// Whether the agent still has energy left.
    pub fn has_energy(&self) -> bool {
        self.energy > 0.0
    }

    /// Whether the agent has reached its genetic lifespan.
    pub fn is_elderly(&self) -> bool {
        self.age as f64 >= self.genome.longevity()
    }

    /// Ticks the agent must wait between reproductions, given the base cooldown.
    ///
    /// Fertility shortens the wait: a fertility of 1 halves it relative to 0.
    pub fn cooldown_ticks(&self, base: u64) -> u64 {
        (base as f64 * (2.0 - self.genome.fertility())).round() as u64
    }

    /// Whether the reproduction cooldown has elapsed at `tick`.
    pub fn cooldown_elapsed(&self, tick: u64, base: u64) -> bool {
        match self.last_reproduced {
            Some(last) => tick.saturating_sub(last) >= self.cooldown_ticks(base),
            None => true,
        }
    }

    /// Whether energy, thirst and position are usable numbers.
    pub fn is_sound(&self) -> bool {
        self.energy.is_finite() && self.thirst.is_finite() && self.position.is_finite()
    }
}
