use std::collections::BTreeMap;

use ts_core::{Agent, AgentId, Genome, Position};

use crate::error::{SimError, SimResult};
use crate::event::{DeathCause, EventLog, SimEvent, SimEventKind};

/// Everything needed to place a new agent in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgent {
    /// Where the agent appears.
    pub position: Position,
    /// The agent's genome.
    pub genome: Genome,
    /// Starting energy.
    pub energy: f64,
    /// Parents, for agents born through reproduction.
    pub parents: Option<(AgentId, AgentId)>,
    /// Generation number.
    pub generation: u32,
}

impl NewAgent {
    /// A generation-0 agent with no parents.
    pub fn seeded(position: Position, genome: Genome, energy: f64) -> Self {
        Self {
            position,
            genome,
            energy,
            parents: None,
            generation: 0,
        }
    }
}

/// Owns the set of live agents.
///
/// Agents are kept in ascending id order, which is also the order every
/// serialized tick phase walks them in. Ids start at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
    next_id: u64,
    max_population: usize,
}

impl AgentRegistry {
    /// Create an empty registry holding at most `max_population` agents.
    pub fn new(max_population: usize) -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 1,
            max_population,
        }
    }

    /// Add an agent and record its `Birth` event.
    ///
    /// Fails with [`SimError::CapacityExceeded`] when the registry is full;
    /// in that case no id is consumed and nothing is logged.
    pub fn spawn(&mut self, new: NewAgent, tick: u64, events: &mut EventLog) -> SimResult<AgentId> {
        if self.is_full() {
            return Err(SimError::CapacityExceeded {
                limit: self.max_population,
            });
        }
        let id = AgentId(self.next_id);
        self.next_id += 1;

        let mut agent = Agent::new(id, new.position, new.energy, new.genome, tick);
        let description = match new.parents {
            Some((a, b)) => {
                agent = agent.with_parents((a, b), new.generation);
                format!("{id} born to {a} and {b} at {}", new.position)
            }
            None => format!("{id} spawned at {}", new.position),
        };
        events.push(SimEvent::new(
            tick,
            SimEventKind::Birth {
                agent: id,
                parents: agent.parents,
                generation: agent.generation,
                position: agent.position,
            },
            description,
        ));
        tracing::trace!(agent = %id, tick, "agent spawned");
        self.agents.insert(id, agent);
        Ok(id)
    }

    /// Remove an agent and record its `Death` event.
    ///
    /// Returns `false` without logging if the agent is already gone.
    pub fn kill(&mut self, id: AgentId, cause: DeathCause, tick: u64, events: &mut EventLog) -> bool {
        let Some(agent) = self.agents.remove(&id) else {
            return false;
        };
        events.push(SimEvent::new(
            tick,
            SimEventKind::Death {
                agent: id,
                cause,
                age: agent.age,
            },
            format!("{id} died of {cause} at age {}", agent.age),
        ));
        tracing::trace!(agent = %id, tick, %cause, "agent died");
        true
    }

    /// Look up a live agent.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Look up a live agent, failing with [`SimError::AgentNotFound`].
    pub fn require(&self, id: AgentId) -> SimResult<&Agent> {
        self.get(id).ok_or(SimError::AgentNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Iterate live agents in ascending id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    /// Ids of all live agents, ascending.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Number of live agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Return `true` if no agents are alive.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Whether another spawn would exceed the population cap.
    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.max_population
    }

    /// The configured population cap.
    pub fn max_population(&self) -> usize {
        self.max_population
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(x: f64) -> NewAgent {
        NewAgent::seeded(Position::new(x, 0.5), Genome::baseline(), 10.0)
    }

    #[test]
    fn spawn_assigns_increasing_ids() {
        let mut registry = AgentRegistry::new(10);
        let mut log = EventLog::new(0);
        let a = registry.spawn(seeded(0.5), 0, &mut log).unwrap();
        let b = registry.spawn(seeded(1.5), 0, &mut log).unwrap();
        assert_eq!(a, AgentId(1));
        assert_eq!(b, AgentId(2));
        assert_eq!(log.len(), 2);
        assert!(matches!(log.events()[0].kind, SimEventKind::Birth { parents: None, .. }));
    }

    #[test]
    fn spawn_fails_at_capacity() {
        let mut registry = AgentRegistry::new(1);
        let mut log = EventLog::new(0);
        registry.spawn(seeded(0.5), 0, &mut log).unwrap();
        let err = registry.spawn(seeded(1.5), 0, &mut log).unwrap_err();
        assert!(matches!(err, SimError::CapacityExceeded { limit: 1 }));
        assert_eq!(registry.len(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn kill_is_idempotent() {
        let mut registry = AgentRegistry::new(10);
        let mut log = EventLog::new(0);
        let id = registry.spawn(seeded(0.5), 0, &mut log).unwrap();
        assert!(registry.kill(id, DeathCause::Starvation, 1, &mut log));
        assert!(!registry.kill(id, DeathCause::Starvation, 1, &mut log));
        assert!(registry.is_empty());
        assert_eq!(log.events_for_agent(id).len(), 2);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = AgentRegistry::new(10);
        let mut log = EventLog::new(0);
        let first = registry.spawn(seeded(0.5), 0, &mut log).unwrap();
        registry.kill(first, DeathCause::OldAge, 1, &mut log);
        let second = registry.spawn(seeded(0.5), 1, &mut log).unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            registry.require(first),
            Err(SimError::AgentNotFound(id)) if id == first
        ));
    }

    #[test]
    fn child_records_lineage() {
        let mut registry = AgentRegistry::new(10);
        let mut log = EventLog::new(0);
        let child = NewAgent {
            parents: Some((AgentId(1), AgentId(2))),
            generation: 3,
            ..seeded(0.5)
        };
        let id = registry.spawn(child, 5, &mut log).unwrap();
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.generation, 3);
        assert_eq!(agent.born_at, 5);
        assert_eq!(agent.parents, Some((AgentId(1), AgentId(2))));
    }
}
