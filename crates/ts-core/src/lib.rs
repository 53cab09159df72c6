//! Core types for Terrashark: the world grid, heritable genomes, and agents.
//!
//! This crate defines the data model the simulation engine operates on. It
//! holds no scheduling logic. You can build a [`WorldGrid`] programmatically,
//! deserialize one from JSON, or breed [`Genome`]s without a running session.

/// Agent identity and per-agent mutable state.
pub mod agent;
/// Error types used throughout the crate.
pub mod error;
/// Heritable traits, crossover, and mutation.
pub mod genome;
/// The terrain grid: biomes, cells, and resource pools.
pub mod grid;
/// Continuous world coordinates.
pub mod position;

/// Re-export agent types.
pub use agent::{Agent, AgentId};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export genome types.
pub use genome::{
    Environment, GeneMutation, Genome, InheritanceParams, MAX_SIGHT_RADIUS, Mutated,
    MutationParams, TRAIT_COUNT, TraitBounds, TraitKind,
};
/// Re-export grid types.
pub use grid::{Biome, Cell, CellCoord, WorldGrid};
/// Re-export position type.
pub use position::Position;
