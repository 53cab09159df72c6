use ts_core::{AgentId, CoreError};

use crate::session::SessionState;

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Errors surfaced by the simulation engine.
///
/// Per-agent problems never appear here: decision faults are contained inside
/// the tick and recorded as events.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A configuration value is out of range. The session never starts.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The live population is at its configured maximum.
    #[error("population cap of {limit} agents reached")]
    CapacityExceeded {
        /// Configured maximum population.
        limit: usize,
    },

    /// No live agent has the given id.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The world grid violates a structural invariant.
    #[error(transparent)]
    MalformedWorld(#[from] CoreError),

    /// A control command is not legal in the session's current state.
    #[error("cannot {command} a session that is {state}")]
    InvalidTransition {
        /// State the session was in.
        state: SessionState,
        /// The rejected command.
        command: &'static str,
    },

    /// The Sense-phase worker pool could not be built.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}
