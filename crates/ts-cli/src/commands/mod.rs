pub mod config;
pub mod export;
pub mod run;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use ts_core::{Biome, WorldGrid};
use ts_simulation::{InitialPopulation, SimConfig, SimulationSession};

/// Options shared by every command that runs a session.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Number of ticks to simulate
    #[arg(short, long, default_value = "100")]
    pub ticks: u64,

    /// RNG seed (overrides the config file)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of random agents to start with
    #[arg(short, long, default_value = "50")]
    pub population: usize,

    /// Width of the generated grassland, in cells
    #[arg(long, default_value = "40")]
    pub width: u32,

    /// Height of the generated grassland, in cells
    #[arg(long, default_value = "40")]
    pub height: u32,

    /// Starting resource per cell of the generated grassland
    #[arg(long, default_value = "10.0")]
    pub resource: f64,

    /// Terrain snapshot (JSON world grid) instead of generated grassland
    #[arg(long)]
    pub terrain: Option<PathBuf>,

    /// Configuration file (JSON); missing fields use defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sense-phase worker threads (overrides the config file)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl SessionArgs {
    /// Build and start a session from these options.
    pub fn start_session(&self) -> Result<SimulationSession, String> {
        let world = self.load_world()?;
        let config = self.load_config()?;
        let mut session = SimulationSession::new(world, config).map_err(|e| e.to_string())?;
        session
            .start(InitialPopulation::Random {
                count: self.population,
            })
            .map_err(|e| e.to_string())?;
        Ok(session)
    }

    fn load_world(&self) -> Result<WorldGrid, String> {
        match &self.terrain {
            Some(path) => {
                let text = read(path)?;
                let grid: WorldGrid = serde_json::from_str(&text)
                    .map_err(|e| format!("cannot parse terrain {}: {e}", path.display()))?;
                grid.validate().map_err(|e| e.to_string())?;
                Ok(grid)
            }
            None => WorldGrid::uniform(self.width, self.height, Biome::Grass, self.resource)
                .map_err(|e| e.to_string()),
        }
    }

    fn load_config(&self) -> Result<SimConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let text = read(path)?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("cannot parse config {}: {e}", path.display()))?
            }
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(threads) = self.threads {
            config = config.with_worker_threads(threads);
        }
        Ok(config)
    }
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}
