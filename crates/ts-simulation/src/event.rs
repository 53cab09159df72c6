use std::fmt;

use serde::{Deserialize, Serialize};
use ts_core::{AgentId, Position, TraitKind};

use crate::analytics::StepSummary;

/// Why an agent died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Energy fell to zero.
    Starvation,
    /// Thirst passed the configured maximum.
    Dehydration,
    /// Age reached the longevity trait.
    OldAge,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starvation => write!(f, "starvation"),
            Self::Dehydration => write!(f, "dehydration"),
            Self::OldAge => write!(f, "old age"),
        }
    }
}

/// What kind of simulation event occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEventKind {
    /// An agent entered the world.
    Birth {
        /// The new agent.
        agent: AgentId,
        /// Both parents; absent for seeded and externally spawned agents.
        parents: Option<(AgentId, AgentId)>,
        /// Generation number of the new agent.
        generation: u32,
        /// Where the agent appeared.
        position: Position,
    },
    /// An agent was removed from the world.
    Death {
        /// The agent that died.
        agent: AgentId,
        /// The cause of death.
        cause: DeathCause,
        /// Age in ticks at death.
        age: u64,
    },
    /// A newborn's gene differs from the allele it inherited.
    Mutation {
        /// The newborn.
        agent: AgentId,
        /// Which gene changed.
        gene: TraitKind,
        /// Inherited value.
        before: f64,
        /// Value after mutation.
        after: f64,
    },
    /// Periodic population snapshot.
    StepSummary(StepSummary),
    /// A spawn was dropped because the population was at its cap.
    CapacityExceeded {
        /// Parents of the dropped newborn; absent for external spawns.
        parents: Option<(AgentId, AgentId)>,
    },
    /// An agent's decision failed; it idled this tick.
    DecisionFault {
        /// The agent whose decision failed.
        agent: AgentId,
        /// Human-readable failure reason.
        reason: String,
    },
}

impl SimEventKind {
    /// Check whether a given agent is involved in this event.
    pub fn involves(&self, id: AgentId) -> bool {
        match self {
            Self::Birth { agent, parents, .. } => {
                *agent == id || parents.is_some_and(|(a, b)| a == id || b == id)
            }
            Self::Death { agent, .. }
            | Self::Mutation { agent, .. }
            | Self::DecisionFault { agent, .. } => *agent == id,
            Self::CapacityExceeded { parents } => parents.is_some_and(|(a, b)| a == id || b == id),
            Self::StepSummary(_) => false,
        }
    }

    /// Short label for the event type.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Birth { .. } => "birth",
            Self::Death { .. } => "death",
            Self::Mutation { .. } => "mutation",
            Self::StepSummary(_) => "step_summary",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::DecisionFault { .. } => "decision_fault",
        }
    }
}

/// A record of something that happened during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Position in the log, assigned on push. Strictly increasing.
    pub seq: u64,
    /// The simulation tick when this event occurred.
    pub tick: u64,
    /// The specific kind of event that occurred.
    pub kind: SimEventKind,
    /// A human-readable description of the event.
    pub description: String,
}

impl SimEvent {
    /// Create an event. Its sequence number is assigned by [`EventLog::push`].
    pub fn new(tick: u64, kind: SimEventKind, description: impl Into<String>) -> Self {
        Self {
            seq: 0,
            tick,
            kind,
            description: description.into(),
        }
    }
}

/// Append-only record of a simulation run.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
    max_events: usize,
    next_seq: u64,
}

impl EventLog {
    /// Create a new event log with the given maximum capacity (0 = unlimited).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
            next_seq: 0,
        }
    }

    /// Append an event, assigning its sequence number and dropping the oldest
    /// events if the log exceeds its capacity. Returns the assigned number.
    pub fn push(&mut self, mut event: SimEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        event.seq = seq;
        self.events.push(event);
        if self.max_events > 0 && self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(..drain_count);
        }
        seq
    }

    /// Return a slice of all retained events.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Sequence number the next pushed event will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Retained events with a sequence number of at least `seq`.
    ///
    /// Store [`EventLog::next_seq`] after reading and pass it back to poll
    /// only what arrived since.
    pub fn since(&self, seq: u64) -> &[SimEvent] {
        let start = self.events.partition_point(|e| e.seq < seq);
        &self.events[start..]
    }

    /// Return all events that occurred at the given tick.
    pub fn events_at_tick(&self, tick: u64) -> Vec<&SimEvent> {
        self.events.iter().filter(|e| e.tick == tick).collect()
    }

    /// Return all events involving the given agent.
    pub fn events_for_agent(&self, id: AgentId) -> Vec<&SimEvent> {
        self.events.iter().filter(|e| e.kind.involves(id)).collect()
    }

    /// Return the number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Return `true` if no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn death(agent: u64) -> SimEventKind {
        SimEventKind::Death {
            agent: AgentId(agent),
            cause: DeathCause::Starvation,
            age: 3,
        }
    }

    #[test]
    fn event_log_push_and_query() {
        let mut log = EventLog::new(0);
        let seq = log.push(SimEvent::new(1, death(1), "test"));
        assert_eq!(seq, 0);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events_at_tick(1).len(), 1);
        assert_eq!(log.events_for_agent(AgentId(1)).len(), 1);
        assert!(log.events_for_agent(AgentId(2)).is_empty());
    }

    #[test]
    fn event_log_max_events_trims() {
        let mut log = EventLog::new(2);
        for i in 0..5 {
            log.push(SimEvent::new(i, death(1), "test"));
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].tick, 3);
        assert_eq!(log.events()[1].tick, 4);
        // sequence numbers keep counting across trims
        assert_eq!(log.events()[1].seq, 4);
        assert_eq!(log.next_seq(), 5);
    }

    #[test]
    fn since_polls_incrementally() {
        let mut log = EventLog::new(0);
        log.push(SimEvent::new(1, death(1), "a"));
        let cursor = log.next_seq();
        assert!(log.since(cursor).is_empty());
        log.push(SimEvent::new(2, death(2), "b"));
        log.push(SimEvent::new(2, death(3), "c"));
        let fresh = log.since(cursor);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].description, "b");
        assert_eq!(log.since(0).len(), 3);
    }

    #[test]
    fn event_kind_involves_agent() {
        let birth = SimEventKind::Birth {
            agent: AgentId(3),
            parents: Some((AgentId(1), AgentId(2))),
            generation: 1,
            position: Position::new(0.0, 0.0),
        };
        assert!(birth.involves(AgentId(1)));
        assert!(birth.involves(AgentId(2)));
        assert!(birth.involves(AgentId(3)));
        assert!(!birth.involves(AgentId(4)));

        let dropped = SimEventKind::CapacityExceeded { parents: None };
        assert!(!dropped.involves(AgentId(1)));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = SimEvent::new(4, death(9), "#9 starved");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r##"{"seq":0,"tick":4,"kind":{"type":"death","agent":9,"cause":"starvation","age":3},"description":"#9 starved"}"##
        );
    }

    #[test]
    fn event_log_unlimited_capacity() {
        let mut log = EventLog::new(0);
        for i in 0..1000 {
            log.push(SimEvent::new(i, death(1), "test"));
        }
        assert_eq!(log.len(), 1000);
    }
}
