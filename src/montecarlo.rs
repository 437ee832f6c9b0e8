use crate::energy::EnergyModel;
use crate::error::{CpmError, CpmResult};
use crate::lattice::{CellId, Lattice};
use crate::registry::CellRegistry;
use cpm_common::CpmParams;
use log::{debug, warn};
use rand::distr::Uniform;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Consecutive picks that may fail the site filter, per lattice site, before a sweep gives up.
const IDLE_PICKS_PER_SITE: u64 = 64;

/// Counters from one Metropolis sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Trial budget fixed at sweep start.
    pub budget: u64,
    /// Trials that reached the acceptance test.
    pub trials: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Picks discarded before the acceptance test (border or no boundary). Not budgeted.
    pub skipped: u64,
    /// True if the idle-pick guard ended the sweep early.
    pub stalled: bool,
}

/// Probability of accepting a move with energy change `delta_h`.
/// Downhill moves always pass; the exponential saturates at 1 instead of overflowing.
#[inline(always)]
pub fn acceptance_probability(delta_h: f64, kbt: f64) -> f64 {
    if delta_h < 0.0 {
        1.0
    } else {
        (-delta_h / kbt).exp().min(1.0)
    }
}

/// Outcome of a single proposed relabel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialOutcome {
    Accepted { delta_h: f64 },
    Rejected { delta_h: f64 },
}

/// Metropolis relaxation of the lattice under an `EnergyModel`.
///
/// Each sweep runs a fixed trial budget of `trials_per_site` times the number of
/// non-medium sites, counted at sweep start. Registry volumes are not touched here;
/// they lag the lattice until the next refresh.
#[derive(Debug, Clone)]
pub struct MonteCarloEngine {
    energy: EnergyModel,
    kbt: f64,
    trials_per_site: u64,
}

impl MonteCarloEngine {
    pub fn new(params: &CpmParams) -> Self {
        MonteCarloEngine {
            energy: EnergyModel::new(params),
            kbt: params.kbt,
            trials_per_site: params.trials_per_site as u64,
        }
    }

    pub fn energy(&self) -> &EnergyModel {
        &self.energy
    }

    /// Evaluates relabelling (x, y) to `new_id` and applies it if accepted.
    /// `hamiltonian` is advanced by `delta_h` on acceptance.
    pub fn attempt<R: Rng>(
        &self,
        lattice: &mut Lattice,
        registry: &CellRegistry,
        hamiltonian: &mut f64,
        x: usize,
        y: usize,
        new_id: CellId,
        rng: &mut R,
    ) -> CpmResult<TrialOutcome> {
        let old_id = lattice.get(x, y);
        let delta_h = self.energy.delta_h(lattice, registry, x, y, old_id, new_id)?;

        let accept = if delta_h < 0.0 {
            true
        } else {
            // Drawn only for uphill or flat moves.
            rng.random::<f64>() <= acceptance_probability(delta_h, self.kbt)
        };

        if accept {
            lattice.set(x, y, new_id);
            *hamiltonian += delta_h;
            Ok(TrialOutcome::Accepted { delta_h })
        } else {
            Ok(TrialOutcome::Rejected { delta_h })
        }
    }

    /// Runs one budgeted sweep. Returns the sweep counters; `hamiltonian` holds the
    /// running value on return.
    pub fn sweep<R: Rng>(
        &self,
        lattice: &mut Lattice,
        registry: &CellRegistry,
        hamiltonian: &mut f64,
        rng: &mut R,
    ) -> CpmResult<SweepStats> {
        let size = lattice.size();
        let mut stats = SweepStats {
            budget: self.trials_per_site * lattice.non_medium_sites() as u64,
            ..SweepStats::default()
        };

        // Candidate labels are fixed for the whole sweep.
        let candidates = lattice.present_ids();
        if candidates.len() < 2 {
            warn!(
                "Only {} label(s) on the lattice; nothing to exchange. Skipping sweep.",
                candidates.len()
            );
            return Ok(stats);
        }

        let site_dist = Uniform::new(0, size)?;
        let other_dist = Uniform::new(0, candidates.len() - 1)?;
        let idle_limit = IDLE_PICKS_PER_SITE * lattice.num_sites() as u64;
        let mut idle_streak = 0u64;

        while stats.trials < stats.budget {
            let x = rng.sample(site_dist);
            let y = rng.sample(site_dist);

            // Border sites lack a full neighbourhood; uniform blocks have no boundary to move.
            if !lattice.is_interior(x, y) || lattice.neighborhood_is_uniform(x, y) {
                stats.skipped += 1;
                idle_streak += 1;
                if idle_streak >= idle_limit {
                    warn!(
                        "Sweep stalled after {} consecutive idle picks ({} of {} trials done).",
                        idle_streak, stats.trials, stats.budget
                    );
                    stats.stalled = true;
                    break;
                }
                continue;
            }
            idle_streak = 0;

            // Uniform choice among the candidates other than the current label.
            let old_id = lattice.get(x, y);
            let mut pick = rng.sample(other_dist);
            if let Ok(own) = candidates.binary_search(&old_id) {
                if pick >= own {
                    pick += 1;
                }
            }
            let new_id = candidates[pick];

            match self.attempt(lattice, registry, hamiltonian, x, y, new_id, rng)? {
                TrialOutcome::Accepted { .. } => stats.accepted += 1,
                TrialOutcome::Rejected { .. } => stats.rejected += 1,
            }
            stats.trials += 1;

            if !hamiltonian.is_finite() {
                return Err(CpmError::NonFiniteEnergy { trial: stats.trials, value: *hamiltonian });
            }
        }

        debug!(
            "Sweep done: {} trials ({} accepted, {} rejected), {} skipped picks.",
            stats.trials, stats.accepted, stats.rejected, stats.skipped
        );
        Ok(stats)
    }
}
