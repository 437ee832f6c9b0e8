use crate::error::{CpmError, CpmResult};
use crate::lattice::{CellId, Lattice, NECROTIC_POOL};
use crate::oxygen::OxygenField;
use crate::registry::{CellRegistry, CellType};
use cpm_common::CpmParams;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Counters from the type-transition step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStats {
    /// Proliferating cells demoted to quiescent.
    pub demoted: u32,
    /// Quiescent cells merged into the necrotic pool.
    pub necrotic: u32,
    /// Sites handed to the pool by those merges.
    pub necrotic_sites: u32,
}

/// Counters from the division step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionStats {
    /// (parent, daughter) pairs in allocation order.
    pub splits: Vec<(CellId, CellId)>,
}

/// Per-generation cell bookkeeping: registry refresh, oxygen consumption,
/// oxygen-driven type transitions and division. Every step is a full-grid scan.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    params: CpmParams,
}

impl LifecycleController {
    pub fn new(params: &CpmParams) -> Self {
        LifecycleController { params: params.clone() }
    }

    /// Recounts every live entry and applies the per-type target/gamma rules.
    /// Living cells left with no sites are retired. Returns how many were retired.
    pub fn refresh_registry(
        &self,
        lattice: &Lattice,
        registry: &mut CellRegistry,
    ) -> CpmResult<u32> {
        let params = &self.params;
        let mut retired = 0;

        for id in registry.live_ids() {
            let volume = lattice.count(id);
            let entry = registry.get_mut(id)?;
            entry.volume = volume;

            match entry.cell_type {
                CellType::Proliferating => {
                    entry.target_volume += params.target_growth;
                    entry.gamma = params.gamma_p;
                }
                CellType::Necrotic => {
                    entry.target_volume = volume;
                    entry.gamma = params.gamma_n;
                }
                CellType::Quiescent => {
                    entry.target_volume = volume;
                    entry.gamma = params.gamma_q;
                }
                CellType::Medium => {
                    entry.target_volume = 0;
                    entry.gamma = params.gamma_m;
                }
            }

            if id > 0 && volume == 0 {
                debug!("Cell {} has no sites left; retiring.", id);
                registry.retire(id)?;
                retired += 1;
            }
        }

        Ok(retired)
    }

    /// Per-site consumption rate derived from the type of the label at each site.
    pub fn consumption_field(
        &self,
        lattice: &Lattice,
        registry: &CellRegistry,
    ) -> CpmResult<Vec<f64>> {
        let present = lattice.present_ids();
        let max_id = present.last().copied().unwrap_or(NECROTIC_POOL);
        let mut rate_by_slot = vec![0.0; (max_id + 2).max(2) as usize];
        for id in present {
            let cell_type = registry.live(id)?.cell_type;
            rate_by_slot[(id + 1) as usize] = cell_type.consumption_rate(&self.params);
        }

        Ok(lattice
            .ids()
            .par_iter()
            .map(|&id| rate_by_slot[(id + 1) as usize])
            .collect())
    }

    /// Single bulk decrement: `oxygen -= dt * n_iter_diff * rate`.
    pub fn consume_oxygen(
        &self,
        lattice: &Lattice,
        registry: &CellRegistry,
        oxygen: &mut OxygenField,
    ) -> CpmResult<()> {
        let rates = self.consumption_field(lattice, registry)?;
        oxygen.consume(&rates, self.params.consumption_scale);
        Ok(())
    }

    /// Demotes starved proliferating cells and merges starved quiescent cells into
    /// the necrotic pool. A cell below both thresholds goes all the way in one call.
    /// Merged entries are retired, so a repeated call leaves the pool unchanged.
    pub fn update_cell_types(
        &self,
        lattice: &mut Lattice,
        registry: &mut CellRegistry,
        oxygen: &OxygenField,
    ) -> CpmResult<TransitionStats> {
        let params = &self.params;
        let totals = oxygen.totals_by_label(lattice);
        let mut stats = TransitionStats::default();

        for id in registry.live_ids() {
            if id <= 0 {
                continue;
            }
            let Some(&(sum, count)) = totals.get((id + 1) as usize) else {
                continue;
            };
            if count == 0 {
                continue;
            }
            let mean = sum / count as f64;

            let entry = registry.get_mut(id)?;
            if entry.cell_type == CellType::Proliferating && mean < params.threshold_p2q {
                entry.cell_type = CellType::Quiescent;
                stats.demoted += 1;
                debug!("Cell {} demoted to quiescent (mean oxygen {:.5}).", id, mean);
            }

            if entry.cell_type == CellType::Quiescent && mean < params.threshold_q2n {
                entry.cell_type = CellType::Necrotic;
                entry.target_volume = 0;
                registry.retire(id)?;
                let moved = lattice.relabel_all(id, NECROTIC_POOL);
                stats.necrotic += 1;
                stats.necrotic_sites += moved;
                debug!(
                    "Cell {} merged {} sites into the necrotic pool (mean oxygen {:.5}).",
                    id, moved, mean
                );
            }
        }

        Ok(stats)
    }

    /// Splits every proliferating cell holding at least `division_min_sites` sites.
    ///
    /// The first `daughter_sites` sites of the parent in row-major order go to a new
    /// identifier; parent and daughter both restart at that nominal volume and target.
    /// Daughters created in this pass are not considered for splitting again.
    pub fn divide_cells(
        &self,
        lattice: &mut Lattice,
        registry: &mut CellRegistry,
    ) -> CpmResult<DivisionStats> {
        let params = &self.params;
        let daughter_sites = params.daughter_sites;
        let mut next_id = registry.next_id();
        let mut stats = DivisionStats::default();

        for id in registry.live_ids() {
            if id <= 0 {
                continue;
            }
            let parent = registry.live(id)?;
            if parent.cell_type != CellType::Proliferating
                || lattice.count(id) < params.division_min_sites
            {
                continue;
            }

            let mut daughter = parent.clone();
            daughter.volume = daughter_sites;
            daughter.target_volume = daughter_sites;

            for (x, y) in lattice.sites_of(id).into_iter().take(daughter_sites as usize) {
                lattice.set(x, y, next_id);
            }

            let allocated = registry.insert(daughter);
            if allocated != next_id {
                return Err(CpmError::IdAllocation { expected: next_id, allocated });
            }

            let parent = registry.get_mut(id)?;
            parent.volume = daughter_sites;
            parent.target_volume = daughter_sites;

            debug!("Cell {} split; daughter {} takes {} sites.", id, allocated, daughter_sites);
            stats.splits.push((id, allocated));
            next_id += 1;
        }

        Ok(stats)
    }
}
