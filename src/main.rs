use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use std::path::PathBuf;
use std::time::Instant;

use cpm_common::SimulationConfig;
use tumor_cpm::output;
use tumor_cpm::Simulation;

/// Cellular Potts tumor growth simulation.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Override `timing.generations`.
    #[arg(short, long)]
    generations: Option<u32>,
    /// Override `initial_conditions.seed`.
    #[arg(short, long)]
    seed: Option<u64>,
    /// Fix the initial oxygen concentration instead of sampling it.
    #[arg(long)]
    initial_oxygen: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting tumor CPM simulation...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(generations) = args.generations {
        config.timing.generations = generations;
    }
    if let Some(seed) = args.seed {
        config.initial_conditions.seed = seed;
    }
    if let Some(oxygen) = args.initial_oxygen {
        config.oxygen.initial = Some(oxygen);
    }

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    let initial_oxygen = sim.initial_oxygen();
    info!(
        "Lattice {}x{} seeded; initial oxygen {}.",
        sim.params().size,
        sim.params().size,
        initial_oxygen
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    let output_config = sim.config().output.clone();
    let output_dir = output::prepare_output_dir(&output_config, initial_oxygen)?;
    info!("Writing results to {}", output_dir.display());

    // --- Generation Loop ---
    let generations = sim.config().timing.generations;
    let size = sim.params().size;
    let start_time = Instant::now();

    for generation in 0..generations {
        // State at the start of the generation.
        sim.record_snapshot()?;
        if output_config.save_text_grids {
            if let Some(snapshot) = sim.get_recorded_snapshots().last() {
                output::write_text_grids(
                    &output_dir,
                    initial_oxygen,
                    generation,
                    size,
                    &snapshot.display,
                    sim.state.lattice.ids(),
                )?;
            }
        }

        let step_start_time = Instant::now();
        let report = match sim.step() {
            Ok(report) => report,
            Err(e) => {
                error!("Error during generation {}: {:#}", generation, e);
                anyhow::bail!("Simulation step failed.");
            }
        };

        info!(
            "Generation [{}/{}] | H: {:.3} | P: {} | Q: {} | Necrotic sites: {} | \
             Accepted: {}/{} | Splits: {} | Time: {:.2} ms",
            generation + 1,
            generations,
            report.hamiltonian,
            report.proliferating_cells,
            report.quiescent_cells,
            report.necrotic_sites,
            report.sweep.accepted,
            report.sweep.trials,
            report.divisions,
            step_start_time.elapsed().as_secs_f64() * 1000.0
        );
    }

    // Final state after the last generation.
    sim.record_snapshot()?;

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    let prognosis = sim.prognosis();
    info!(
        "Prognosis: {} ({} of {} sites, tumor fraction {:.4}).",
        prognosis.outcome, prognosis.tumor_sites, prognosis.total_sites, prognosis.tumor_fraction
    );

    // --- Save Recorded Data ---
    if output_config.save_stats {
        output::save_snapshots(&output_dir, &output_config, sim.get_recorded_snapshots())?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output_config.save_cell_table {
        let path = output_dir.join(format!("{}_cells.csv", output_config.base_filename));
        output::write_cell_table(&path, &sim.state.registry)?;
        info!("Cell table saved to {}", path.display());
    }

    info!("Simulation Complete.");
    Ok(())
}
