use crate::error::CpmResult;
use crate::lattice::NECROTIC_POOL;
use crate::lifecycle::{LifecycleController, TransitionStats};
use crate::montecarlo::{MonteCarloEngine, SweepStats};
use crate::prognosis::Prognosis;
use crate::registry::CellType;
use crate::state::CpmState;
use anyhow::{Context, Result};
use cpm_common::{CpmParams, SimulationConfig, Snapshot};
use log::{debug, info};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// What happened during one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u32,
    /// Hamiltonian recomputed at sweep start.
    pub baseline_hamiltonian: f64,
    /// Running Hamiltonian after the sweep.
    pub hamiltonian: f64,
    pub sweep: SweepStats,
    pub transitions: TransitionStats,
    pub divisions: u32,
    /// Cells retired at refresh because they lost every site.
    pub vanished: u32,
    pub proliferating_cells: u32,
    pub quiescent_cells: u32,
    pub necrotic_sites: u32,
    pub tumor_sites: u32,
}

/// Initial oxygen drawn between `min` and `max`: the ratio is rounded to 3
/// decimals and the concentration to 5.
pub fn sample_initial_oxygen<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    let ratio = (rng.random::<f64>() * 1e3).round() / 1e3;
    ((min + (max - min) * ratio) * 1e5).round() / 1e5
}

/// Drives the tumor model generation by generation.
pub struct Simulation {
    /// The validated configuration the run was built from.
    pub config: SimulationConfig,
    pub state: CpmState,
    /// Single RNG for oxygen sampling and every Metropolis draw.
    pub rng: StdRng,
    /// Generations completed so far.
    pub current_generation: u32,
    engine: MonteCarloEngine,
    lifecycle: LifecycleController,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Validates the configuration, seeds the RNG and places the seed cell.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.initial_conditions.seed);
        let initial_oxygen = match config.oxygen.initial {
            Some(value) => value,
            None => {
                let value = sample_initial_oxygen(
                    config.oxygen.min_initial,
                    config.oxygen.max_initial,
                    &mut rng,
                );
                info!("Sampled initial oxygen concentration {:.5}.", value);
                value
            }
        };

        let params = config.cpm_params(initial_oxygen);
        let state = CpmState::new(&params).context("failed to place the seed cell")?;
        let engine = MonteCarloEngine::new(&params);
        let lifecycle = LifecycleController::new(&params);

        Ok(Simulation {
            config,
            state,
            rng,
            current_generation: 0,
            engine,
            lifecycle,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Runs one generation: refresh, sweep, consume, transition, divide.
    pub fn step(&mut self) -> Result<GenerationReport> {
        let generation = self.current_generation;
        let report = self
            .advance(generation)
            .with_context(|| format!("generation {}", generation))?;
        self.current_generation += 1;
        Ok(report)
    }

    fn advance(&mut self, generation: u32) -> CpmResult<GenerationReport> {
        let state = &mut self.state;

        // --- 1. Registry refresh ---
        let vanished = self.lifecycle.refresh_registry(&state.lattice, &mut state.registry)?;

        // --- 2. Metropolis sweep from a fresh baseline ---
        let baseline_hamiltonian = self
            .engine
            .energy()
            .total_hamiltonian(&state.lattice, &state.registry)?;
        state.hamiltonian = baseline_hamiltonian;
        let sweep = self
            .engine
            .sweep(&mut state.lattice, &state.registry, &mut state.hamiltonian, &mut self.rng)?;

        // --- 3. Oxygen consumption ---
        self.lifecycle.consume_oxygen(&state.lattice, &state.registry, &mut state.oxygen)?;

        // --- 4. Type transitions ---
        let transitions = self
            .lifecycle
            .update_cell_types(&mut state.lattice, &mut state.registry, &state.oxygen)?;

        // --- 5. Division ---
        let divisions = self.lifecycle.divide_cells(&mut state.lattice, &mut state.registry)?;

        state.check_invariants()?;
        debug!(
            "Generation {}: baseline H {:.3}, final H {:.3}, {} transitions, {} splits.",
            generation,
            baseline_hamiltonian,
            state.hamiltonian,
            transitions.demoted + transitions.necrotic,
            divisions.splits.len()
        );

        Ok(GenerationReport {
            generation,
            baseline_hamiltonian,
            hamiltonian: state.hamiltonian,
            sweep,
            transitions,
            divisions: divisions.splits.len() as u32,
            vanished,
            proliferating_cells: state.registry.count_cells(CellType::Proliferating),
            quiescent_cells: state.registry.count_cells(CellType::Quiescent),
            necrotic_sites: state.lattice.count(NECROTIC_POOL),
            tumor_sites: state.tumor_sites(),
        })
    }

    /// Builds a snapshot of the current state without storing it.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let state = &self.state;
        let display = state.registry.display_grid(&state.lattice)?;
        let cell_ids = if self.config.output.save_lattice_in_snapshot {
            Some(state.lattice.ids().to_vec())
        } else {
            None
        };

        Ok(Snapshot {
            generation: self.current_generation,
            hamiltonian: state.hamiltonian,
            proliferating_cells: state.registry.count_cells(CellType::Proliferating),
            quiescent_cells: state.registry.count_cells(CellType::Quiescent),
            necrotic_sites: state.lattice.count(NECROTIC_POOL),
            tumor_sites: state.tumor_sites(),
            mean_oxygen: state.oxygen.mean(),
            display,
            cell_ids,
        })
    }

    /// Collects the current state as a snapshot and stores it.
    pub fn record_snapshot(&mut self) -> Result<()> {
        debug!("Recording snapshot at generation {}...", self.current_generation);
        let snapshot = self.snapshot()?;
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }

    pub fn params(&self) -> &CpmParams {
        &self.state.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn initial_oxygen(&self) -> f64 {
        self.state.params.initial_oxygen
    }

    pub fn prognosis(&self) -> Prognosis {
        Prognosis::assess(&self.state.lattice, self.config.output.metastatic_fraction)
    }
}
