use std::fmt;

use rand::Rng;
use rand::rngs::StdRng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use ts_core::{Agent, AgentId, CoreError, Genome, Position, WorldGrid};

use crate::clock::SimClock;
use crate::command::{ControlCommand, SpawnGenome, SpawnPosition};
use crate::config::{self, SimConfig};
use crate::context::TickContext;
use crate::engine::{self, TickReport};
use crate::error::{SimError, SimResult};
use crate::event::EventLog;
use crate::registry::{AgentRegistry, NewAgent};
use crate::rng;
use crate::spatial::SpatialIndex;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started.
    Idle,
    /// Advancing on every `step`.
    Running,
    /// Started but holding between ticks.
    Paused,
    /// Finished. Terminal.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One explicitly placed initial agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    /// Starting position; must be on passable ground.
    pub position: Position,
    /// The agent's genome.
    pub genome: Genome,
    /// Starting energy. Defaults to the configured initial energy.
    #[serde(default)]
    pub energy: Option<f64>,
}

/// The population a session starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPopulation {
    /// `count` random genomes on random passable cells.
    Random {
        /// How many agents to seed.
        count: usize,
    },
    /// Exactly these agents, in order.
    Explicit(Vec<AgentSeed>),
}

/// Serializable picture of a session at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Last completed tick.
    pub tick: u64,
    /// Lifecycle state.
    pub state: SessionState,
    /// Live agents, ascending id.
    pub agents: Vec<Agent>,
    /// Terrain and resources.
    pub grid: WorldGrid,
}

#[derive(Debug, Clone)]
struct PendingSpawn {
    position: SpawnPosition,
    genome: SpawnGenome,
}

/// A complete, self-contained simulation.
///
/// Owns the world, agents, clock, RNG and event log. There is no global
/// engine state, so independent sessions can run side by side.
pub struct SimulationSession {
    config: SimConfig,
    grid: WorldGrid,
    registry: AgentRegistry,
    index: SpatialIndex,
    clock: SimClock,
    rng: StdRng,
    events: EventLog,
    state: SessionState,
    pending: Vec<PendingSpawn>,
    pool: Option<ThreadPool>,
}

impl fmt::Debug for SimulationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationSession")
            .field("state", &self.state)
            .field("tick", &self.clock.tick())
            .field("population", &self.registry.len())
            .field("events", &self.events.len())
            .finish()
    }
}

impl SimulationSession {
    /// Create an idle session. Fails if the configuration or world is invalid.
    pub fn new(world: WorldGrid, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        world.validate()?;
        let pool = match config.worker_threads {
            Some(threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| SimError::WorkerPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            registry: AgentRegistry::new(config.max_population),
            index: SpatialIndex::new(world.width(), world.height()),
            clock: SimClock::new(config.tick_rate),
            rng: rng::session_stream(config.seed),
            events: EventLog::new(config.max_events),
            state: SessionState::Idle,
            pending: Vec::new(),
            pool,
            grid: world,
            config,
        })
    }

    /// Seed the initial population at tick 0 and begin running.
    pub fn start(&mut self, population: InitialPopulation) -> SimResult<()> {
        self.require(SessionState::Idle, "start")?;
        let seeds = self.resolve_population(population)?;
        let count = seeds.len();
        for seed in seeds {
            self.registry.spawn(seed, self.clock.tick(), &mut self.events)?;
        }
        self.state = SessionState::Running;
        tracing::info!(seed = self.config.seed, population = count, "session started");
        Ok(())
    }

    /// Hold between ticks.
    pub fn pause(&mut self) -> SimResult<()> {
        self.require(SessionState::Running, "pause")?;
        self.state = SessionState::Paused;
        tracing::info!(tick = self.clock.tick(), "session paused");
        Ok(())
    }

    /// Continue after a pause.
    pub fn resume(&mut self) -> SimResult<()> {
        self.require(SessionState::Paused, "resume")?;
        self.state = SessionState::Running;
        tracing::info!(tick = self.clock.tick(), "session resumed");
        Ok(())
    }

    /// End the session. Observed at the next tick boundary; a tick in
    /// progress always completes.
    pub fn stop(&mut self) -> SimResult<()> {
        if self.state == SessionState::Stopped {
            return Err(self.transition_error("stop"));
        }
        self.state = SessionState::Stopped;
        self.pending.clear();
        tracing::info!(
            tick = self.clock.tick(),
            population = self.registry.len(),
            "session stopped"
        );
        Ok(())
    }

    /// Queue an agent for placement before the next tick's Sense phase.
    pub fn spawn_agent(&mut self, position: SpawnPosition, genome: SpawnGenome) -> SimResult<()> {
        if self.state == SessionState::Stopped {
            return Err(self.transition_error("spawn into"));
        }
        match position {
            SpawnPosition::At(pos) => self.check_ground(pos, "spawn position")?,
            SpawnPosition::Random => {
                if !self.grid.cells().iter().any(|c| c.passable) {
                    return Err(no_ground());
                }
            }
        }
        self.pending.push(PendingSpawn { position, genome });
        Ok(())
    }

    /// Dispatch a control command.
    pub fn apply(&mut self, command: ControlCommand) -> SimResult<()> {
        tracing::debug!(command = command.name(), state = %self.state, "control command");
        match command {
            ControlCommand::Start { population } => self.start(population),
            ControlCommand::Pause => self.pause(),
            ControlCommand::Resume => self.resume(),
            ControlCommand::Stop => self.stop(),
            ControlCommand::SpawnAgent { position, genome } => self.spawn_agent(position, genome),
        }
    }

    /// Run one tick if the session is running. Otherwise do nothing.
    pub fn step(&mut self) -> Option<TickReport> {
        if self.state != SessionState::Running {
            return None;
        }
        let spawns = self.drain_pending();
        let tick = self.clock.advance();
        let mut ctx = TickContext {
            grid: &mut self.grid,
            registry: &mut self.registry,
            events: &mut self.events,
            config: &self.config,
            tick,
        };
        Some(engine::run_tick(
            &mut ctx,
            &mut self.index,
            self.pool.as_ref(),
            spawns,
        ))
    }

    /// Step up to `n` times, stopping early if the session stops running.
    pub fn run(&mut self, n: u64) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..n {
            match self.step() {
                Some(report) => reports.push(report),
                None => break,
            }
        }
        reports
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tick: self.clock.tick(),
            state: self.state,
            agents: self.registry.iter_alive().cloned().collect(),
            grid: self.grid.clone(),
        }
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last completed tick.
    pub fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    /// The session clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The validated configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Terrain and resources.
    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    /// Live agents.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Look up a live agent.
    pub fn agent(&self, id: AgentId) -> SimResult<&Agent> {
        self.registry.require(id)
    }

    /// Number of live agents.
    pub fn population(&self) -> usize {
        self.registry.len()
    }

    /// The event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Spawns waiting for the next tick.
    pub fn pending_spawns(&self) -> usize {
        self.pending.len()
    }

    fn require(&self, expected: SessionState, command: &'static str) -> SimResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.transition_error(command))
        }
    }

    fn transition_error(&self, command: &'static str) -> SimError {
        SimError::InvalidTransition {
            state: self.state,
            command,
        }
    }

    fn check_ground(&self, pos: Position, what: &str) -> SimResult<()> {
        if self.grid.is_passable(pos) {
            Ok(())
        } else {
            Err(SimError::InvalidConfiguration(format!(
                "{what} {pos} is not on passable ground"
            )))
        }
    }

    fn resolve_population(&mut self, population: InitialPopulation) -> SimResult<Vec<NewAgent>> {
        let energy = self.config.initial_energy;
        let seeds = match population {
            InitialPopulation::Random { count } => {
                self.check_capacity(count)?;
                let mut seeds = Vec::with_capacity(count);
                for _ in 0..count {
                    let position = self.random_position().ok_or_else(no_ground)?;
                    let genome = Genome::random(&mut self.rng);
                    seeds.push(NewAgent::seeded(position, genome, energy));
                }
                seeds
            }
            InitialPopulation::Explicit(agents) => {
                self.check_capacity(agents.len())?;
                let mut seeds = Vec::with_capacity(agents.len());
                for (i, seed) in agents.into_iter().enumerate() {
                    self.check_ground(seed.position, &format!("seed agent {i} at"))?;
                    let energy = seed.energy.unwrap_or(energy);
                    config::within_energy(
                        &format!("seed agent {i} energy"),
                        energy,
                        self.config.max_energy,
                    )?;
                    seeds.push(NewAgent::seeded(seed.position, seed.genome, energy));
                }
                seeds
            }
        };
        Ok(seeds)
    }

    fn check_capacity(&self, count: usize) -> SimResult<()> {
        if count > self.config.max_population {
            return Err(SimError::CapacityExceeded {
                limit: self.config.max_population,
            });
        }
        Ok(())
    }

    /// Uniform point inside a random passable cell.
    fn random_position(&mut self) -> Option<Position> {
        let cells = self.grid.passable_cells();
        if cells.is_empty() {
            return None;
        }
        let coord = cells[self.rng.random_range(0..cells.len())];
        let pos = Position::new(
            f64::from(coord.x) + self.rng.random::<f64>(),
            f64::from(coord.y) + self.rng.random::<f64>(),
        );
        Some(self.grid.clamp(pos))
    }

    fn drain_pending(&mut self) -> Vec<NewAgent> {
        let pending = std::mem::take(&mut self.pending);
        let mut spawns = Vec::with_capacity(pending.len());
        for request in pending {
            let position = match request.position {
                SpawnPosition::At(pos) => Some(pos),
                SpawnPosition::Random => self.random_position(),
            };
            // random spawns are refused at queue time on worlds without ground
            let Some(position) = position else {
                continue;
            };
            let genome = match request.genome {
                SpawnGenome::Given(genome) => genome,
                SpawnGenome::Random => Genome::random(&mut self.rng),
            };
            spawns.push(NewAgent::seeded(position, genome, self.config.initial_energy));
        }
        spawns
    }
}

fn no_ground() -> SimError {
    SimError::MalformedWorld(CoreError::MalformedGrid(
        "world has no passable cell to seed agents on".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SimEventKind;
    use ts_core::Biome;

    fn grass(size: u32) -> WorldGrid {
        WorldGrid::uniform(size, size, Biome::Grass, 10.0).unwrap()
    }

    fn running(config: SimConfig, count: usize) -> SimulationSession {
        let mut session = SimulationSession::new(grass(20), config).unwrap();
        session.start(InitialPopulation::Random { count }).unwrap();
        session
    }

    #[test]
    fn full_run_integration() {
        let mut session = running(SimConfig::default(), 30);
        let reports = session.run(25);
        assert_eq!(reports.len(), 25);
        assert_eq!(session.current_tick(), 25);
        assert!(!session.events().is_empty());
        assert_eq!(crate::analytics::population_series(session.events()).len(), 25);
    }

    #[test]
    fn deterministic_rng() {
        let run = || {
            let mut session = running(SimConfig::default().with_seed(123), 20);
            session.run(15);
            session
                .events()
                .events()
                .iter()
                .map(|e| e.description.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn invalid_config_never_starts() {
        let result = SimulationSession::new(grass(5), SimConfig::default().with_mutation_rate(2.0));
        assert!(matches!(result, Err(SimError::InvalidConfiguration(_))));
    }

    #[test]
    fn step_does_nothing_unless_running() {
        let mut session = SimulationSession::new(grass(5), SimConfig::default()).unwrap();
        assert!(session.step().is_none());
        session.start(InitialPopulation::Random { count: 2 }).unwrap();
        session.pause().unwrap();
        assert!(session.step().is_none());
        assert_eq!(session.current_tick(), 0);
        session.resume().unwrap();
        assert!(session.step().is_some());
        session.stop().unwrap();
        assert!(session.step().is_none());
        assert_eq!(session.current_tick(), 1);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut session = SimulationSession::new(grass(5), SimConfig::default()).unwrap();
        let err = session.pause().unwrap_err();
        assert_eq!(err.to_string(), "cannot pause a session that is idle");
        session.apply(ControlCommand::Stop).unwrap();
        assert!(matches!(
            session.apply(ControlCommand::Start {
                population: InitialPopulation::Random { count: 1 }
            }),
            Err(SimError::InvalidTransition {
                state: SessionState::Stopped,
                ..
            })
        ));
        assert!(session.spawn_agent(SpawnPosition::Random, SpawnGenome::Random).is_err());
    }

    #[test]
    fn queued_spawn_applies_before_next_tick() {
        let mut session = running(SimConfig::default(), 0);
        session
            .apply(ControlCommand::SpawnAgent {
                position: SpawnPosition::At(Position::new(3.5, 3.5)),
                genome: SpawnGenome::Given(Genome::baseline()),
            })
            .unwrap();
        assert_eq!(session.pending_spawns(), 1);
        assert_eq!(session.population(), 0);
        let report = session.step().unwrap();
        assert_eq!(report.births, vec![AgentId(1)]);
        assert_eq!(session.population(), 1);
        assert_eq!(session.agent(AgentId(1)).unwrap().born_at, 1);
    }

    #[test]
    fn spawn_on_water_is_rejected() {
        let world = WorldGrid::uniform(4, 4, Biome::DeepOcean, 0.0).unwrap();
        let mut session = SimulationSession::new(world, SimConfig::default()).unwrap();
        assert!(
            session
                .spawn_agent(SpawnPosition::At(Position::new(1.0, 1.0)), SpawnGenome::Random)
                .is_err()
        );
        assert!(matches!(
            session.start(InitialPopulation::Random { count: 1 }),
            Err(SimError::MalformedWorld(_))
        ));
    }

    #[test]
    fn random_spawn_without_ground_is_refused() {
        let world = WorldGrid::uniform(3, 3, Biome::DeepOcean, 0.0).unwrap();
        let mut session = SimulationSession::new(world, SimConfig::default()).unwrap();
        session.start(InitialPopulation::Explicit(Vec::new())).unwrap();
        assert!(matches!(
            session.spawn_agent(SpawnPosition::Random, SpawnGenome::Random),
            Err(SimError::MalformedWorld(_))
        ));
        assert_eq!(session.pending_spawns(), 0);
        let report = session.step().unwrap();
        assert_eq!(report.dropped, 0);
        assert!(
            !session
                .events()
                .events()
                .iter()
                .any(|e| matches!(e.kind, SimEventKind::CapacityExceeded { .. }))
        );
    }

    #[test]
    fn queued_spawn_dropped_at_capacity() {
        let mut session = running(SimConfig::default().with_max_population(1), 1);
        session
            .spawn_agent(SpawnPosition::Random, SpawnGenome::Random)
            .unwrap();
        let report = session.step().unwrap();
        assert_eq!(report.dropped, 1);
        assert!(report.births.is_empty());
        assert!(session.population() <= 1);
        let dropped: Vec<_> = session
            .events()
            .events_at_tick(1)
            .into_iter()
            .filter(|e| matches!(e.kind, SimEventKind::CapacityExceeded { parents: None }))
            .collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].description, "population cap of 1 agents reached");
    }

    #[test]
    fn spawn_queued_while_paused_lands_after_resume() {
        let mut session = running(SimConfig::default(), 0);
        session.apply(ControlCommand::Pause).unwrap();
        session
            .apply(ControlCommand::SpawnAgent {
                position: SpawnPosition::At(Position::new(2.5, 2.5)),
                genome: SpawnGenome::Random,
            })
            .unwrap();
        assert!(session.step().is_none());
        assert_eq!(session.pending_spawns(), 1);
        assert_eq!(session.population(), 0);

        session.apply(ControlCommand::Resume).unwrap();
        let report = session.step().unwrap();
        assert_eq!(report.births, vec![AgentId(1)]);
        assert_eq!(session.pending_spawns(), 0);
        assert_eq!(session.agent(AgentId(1)).unwrap().born_at, 1);
    }

    #[test]
    fn seed_energy_above_maximum_is_rejected() {
        let mut session = SimulationSession::new(grass(5), SimConfig::default()).unwrap();
        let err = session
            .start(InitialPopulation::Explicit(vec![AgentSeed {
                position: Position::new(1.5, 1.5),
                genome: Genome::baseline(),
                energy: Some(150.0),
            }]))
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid configuration: seed agent 0 energy must be within (0, 100], got 150");
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.population(), 0);
    }

    #[test]
    fn oversized_start_is_capacity_error() {
        let mut session =
            SimulationSession::new(grass(5), SimConfig::default().with_max_population(3)).unwrap();
        assert!(matches!(
            session.start(InitialPopulation::Random { count: 4 }),
            Err(SimError::CapacityExceeded { limit: 3 })
        ));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn empty_world_no_crash() {
        let mut session = running(SimConfig::default(), 0);
        session.run(100);
        assert_eq!(session.current_tick(), 100);
        assert_eq!(session.population(), 0);
    }

    #[test]
    fn snapshot_serializes() {
        let mut session = running(SimConfig::default(), 5);
        session.run(3);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.tick, 3);
        assert_eq!(snapshot.state, SessionState::Running);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.agents.len(), snapshot.agents.len());
    }
}
