//! Tick-based evolutionary simulation for Terrashark.
//!
//! A [`SimulationSession`] owns a [`ts_core::WorldGrid`], an [`AgentRegistry`],
//! the session RNG and an [`EventLog`]. Each call to
//! [`SimulationSession::step`] runs one tick through a fixed sequence of
//! phases: sense and decide (data-parallel), movement and metabolism,
//! foraging and drinking, reproduction, death, and regeneration. Every
//! shared mutation is applied in ascending agent-id order, so a run is
//! fully determined by its seed, configuration and initial population,
//! whatever the thread count.
//!
//! Selection is emergent. No phase scores genomes; agents live or die on
//! their energy balance, their thirst and their age.

/// Population-level statistics and chart series.
pub mod analytics;
/// Per-agent decision function.
pub mod behavior;
/// Simulation clock for tracking ticks and real-time pacing.
pub mod clock;
/// Control-plane commands accepted by a session.
pub mod command;
/// Configuration types for simulation runs.
pub mod config;
/// Mutable context passed to the serialized tick phases.
pub mod context;
/// The tick engine: one step of the simulation.
pub mod engine;
/// Error types for the simulation crate.
pub mod error;
/// Simulation event types and the event log.
pub mod event;
/// Owner of all live agents.
pub mod registry;
/// Deterministic RNG stream derivation.
pub mod rng;
/// Top-level session state machine.
pub mod session;
/// Uniform-grid spatial index over agent positions.
pub mod spatial;

/// Re-exports of analytics types.
pub use analytics::{StepSummary, TickCounts, TraitMean};
/// Re-exports of behavior types.
pub use behavior::{Action, DecisionFault, Intent};
/// Re-export of [`clock::SimClock`].
pub use clock::SimClock;
/// Re-export of [`command::ControlCommand`].
pub use command::{ControlCommand, SpawnGenome, SpawnPosition};
/// Re-export of [`config::SimConfig`].
pub use config::SimConfig;
/// Re-exports of engine output types.
pub use engine::{ForageOutcome, TickReport};
/// Re-exports of [`error::SimError`] and [`error::SimResult`].
pub use error::{SimError, SimResult};
/// Re-exports of event types.
pub use event::{DeathCause, EventLog, SimEvent, SimEventKind};
/// Re-exports of registry types.
pub use registry::{AgentRegistry, NewAgent};
/// Re-exports of session types.
pub use session::{AgentSeed, InitialPopulation, SessionSnapshot, SessionState, SimulationSession};
/// Re-export of [`spatial::SpatialIndex`].
pub use spatial::SpatialIndex;
