use ts_core::WorldGrid;

use crate::config::SimConfig;
use crate::event::{EventLog, SimEvent, SimEventKind};
use crate::registry::AgentRegistry;

/// Mutable session state handed to the engine for one tick.
pub struct TickContext<'a> {
    /// Terrain and resources.
    pub grid: &'a mut WorldGrid,
    /// Live agents.
    pub registry: &'a mut AgentRegistry,
    /// The session's event log.
    pub events: &'a mut EventLog,
    /// Session configuration.
    pub config: &'a SimConfig,
    /// The tick being executed.
    pub tick: u64,
}

impl TickContext<'_> {
    /// Emit a simulation event at the current tick.
    pub fn emit(&mut self, kind: SimEventKind, description: impl Into<String>) {
        self.events.push(SimEvent::new(self.tick, kind, description));
    }

    /// The tick being executed.
    pub fn tick(&self) -> u64 {
        self.tick
    }
}
