use serde::{Deserialize, Serialize};
use ts_core::{Genome, Position};

use crate::session::InitialPopulation;

/// Where an externally spawned agent appears.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPosition {
    /// At a given point, which must be on passable ground.
    At(Position),
    /// On a random passable cell.
    Random,
}

/// Which genome an externally spawned agent carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnGenome {
    /// A given genome.
    Given(Genome),
    /// A genome drawn from the session RNG.
    Random,
}

/// A control-plane request, accepted only between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Seed the initial population and begin running.
    Start {
        /// Agents to place at tick 0.
        population: InitialPopulation,
    },
    /// Stop advancing until resumed.
    Pause,
    /// Continue after a pause.
    Resume,
    /// End the session for good.
    Stop,
    /// Queue one agent for placement before the next tick.
    SpawnAgent {
        /// Where it appears.
        position: SpawnPosition,
        /// Its genome.
        genome: SpawnGenome,
    },
}

impl ControlCommand {
    /// Verb used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::SpawnAgent { .. } => "spawn into",
        }
    }
}
