use crate::error::{CpmError, CpmResult};
use crate::lattice::{CellId, Lattice};
use crate::registry::{CellEntry, CellRegistry};
use cpm_common::CpmParams;
use rayon::prelude::*;

/// Hamiltonian of the Potts lattice: adhesion between differing neighbours plus
/// a quadratic penalty on each cell's deviation from its target volume.
///
/// Adhesion is counted over interior sites only, each differing neighbour
/// contributing `J / 2` (every contact is seen from both sides). Volumes are the
/// live site counts tracked by the lattice, so `delta_h` and `total_hamiltonian`
/// agree exactly for any single-site relabel.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    adhesion: f64,
}

impl EnergyModel {
    pub fn new(params: &CpmParams) -> Self {
        EnergyModel { adhesion: params.adhesion }
    }

    #[inline(always)]
    fn contact_energy(&self, contacts: i64) -> f64 {
        contacts as f64 * self.adhesion / 2.0
    }

    /// `gamma * (target - volume)^2` for one entry at a given site count.
    #[inline(always)]
    pub fn volume_energy(entry: &CellEntry, volume: u32) -> f64 {
        let deviation = entry.target_volume as f64 - volume as f64;
        entry.gamma * deviation * deviation
    }

    /// Number of (site, neighbour) pairs with differing labels over all interior sites.
    /// Rows are independent, so the count is reduced in parallel.
    pub fn adhesive_contacts(lattice: &Lattice) -> u64 {
        let n = lattice.size();
        if n < 3 {
            return 0;
        }
        (1..n - 1)
            .into_par_iter()
            .map(|x| {
                let mut row_contacts = 0u64;
                for y in 1..n - 1 {
                    let center = lattice.get(x, y);
                    lattice.for_each_neighbor(x, y, |_, _, id| {
                        if id != center {
                            row_contacts += 1;
                        }
                        true
                    });
                }
                row_contacts
            })
            .sum()
    }

    /// Full recomputation. Used as the per-sweep baseline.
    pub fn total_hamiltonian(&self, lattice: &Lattice, registry: &CellRegistry) -> CpmResult<f64> {
        registry.check_lattice(lattice)?;

        let adhesive = self.contact_energy(Self::adhesive_contacts(lattice) as i64);
        let volume: f64 = registry
            .iter()
            .filter(|(_, entry)| !entry.retired)
            .map(|(id, entry)| Self::volume_energy(entry, lattice.count(id)))
            .sum();

        Ok(adhesive + volume)
    }

    /// Differing-neighbour pairs inside the 3x3 window around (x, y), clipped to the
    /// interior, with (x, y) read as `label` regardless of what the lattice holds.
    fn local_contacts(lattice: &Lattice, x: usize, y: usize, label: CellId) -> i64 {
        let n = lattice.size();
        let label_at = |i: usize, j: usize| {
            if i == x && j == y {
                label
            } else {
                lattice.get(i, j)
            }
        };

        let mut contacts = 0;
        for i in x.saturating_sub(1).max(1)..(x + 2).min(n - 1) {
            for j in y.saturating_sub(1).max(1)..(y + 2).min(n - 1) {
                let center = label_at(i, j);
                for di in 0..3 {
                    for dj in 0..3 {
                        if di == 1 && dj == 1 {
                            continue;
                        }
                        if label_at(i + di - 1, j + dj - 1) != center {
                            contacts += 1;
                        }
                    }
                }
            }
        }
        contacts
    }

    /// Energy change of relabelling (x, y) from `old_id` to `new_id`.
    ///
    /// The lattice must currently hold `old_id` at (x, y); it is not modified.
    /// Only the local window and the two affected entries are visited.
    pub fn delta_h(
        &self,
        lattice: &Lattice,
        registry: &CellRegistry,
        x: usize,
        y: usize,
        old_id: CellId,
        new_id: CellId,
    ) -> CpmResult<f64> {
        let actual = lattice.try_get(x, y)?;
        if actual != old_id {
            return Err(CpmError::LabelMismatch { x, y, expected: old_id, actual });
        }
        if old_id == new_id {
            return Ok(0.0);
        }

        // --- Adhesive term ---
        let before = Self::local_contacts(lattice, x, y, old_id);
        let after = Self::local_contacts(lattice, x, y, new_id);
        let adhesive_delta = self.contact_energy(after - before);

        // --- Volume term ---
        let old_entry = registry.live(old_id)?;
        let new_entry = registry.live(new_id)?;
        let old_volume = lattice.count(old_id);
        let new_volume = lattice.count(new_id);

        let volume_before = Self::volume_energy(old_entry, old_volume)
            + Self::volume_energy(new_entry, new_volume);
        let volume_after = Self::volume_energy(old_entry, old_volume - 1)
            + Self::volume_energy(new_entry, new_volume + 1);

        Ok(adhesive_delta + (volume_after - volume_before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{MEDIUM, NECROTIC_POOL};
    use crate::registry::CellType;
    use rand::prelude::*;

    const LABELS: [CellId; 5] = [NECROTIC_POOL, MEDIUM, 1, 2, 3];

    fn model() -> EnergyModel {
        EnergyModel { adhesion: 12.0 }
    }

    fn random_registry(rng: &mut StdRng) -> CellRegistry {
        let mut registry = CellRegistry::new(
            CellEntry::new(
                CellType::Medium,
                0,
                rng.random_range(0..40),
                rng.random_range(0..3) as f64,
            ),
            CellEntry::new(CellType::Necrotic, 0, rng.random_range(0..20), 50.0),
        );
        registry.insert(CellEntry::new(CellType::Proliferating, 0, rng.random_range(0..30), 10.0));
        registry.insert(CellEntry::new(CellType::Quiescent, 0, rng.random_range(0..30), 30.0));
        registry.insert(CellEntry::new(CellType::Proliferating, 0, rng.random_range(0..30), 10.0));
        registry
    }

    fn random_lattice(rng: &mut StdRng, size: usize) -> Lattice {
        let ids = (0..size * size).map(|_| LABELS[rng.random_range(0..LABELS.len())]).collect();
        Lattice::from_ids(size, ids).unwrap()
    }

    #[test]
    fn delta_h_matches_total_difference_on_random_relabels() {
        let mut rng = StdRng::seed_from_u64(2024);
        let model = model();

        for _ in 0..250 {
            let size = [3, 5, 7, 9][rng.random_range(0..4)];
            let mut lattice = random_lattice(&mut rng, size);
            let registry = random_registry(&mut rng);

            // Any site, border included.
            let x = rng.random_range(0..size);
            let y = rng.random_range(0..size);
            let old_id = lattice.get(x, y);
            let choices: Vec<CellId> = LABELS.iter().copied().filter(|&id| id != old_id).collect();
            let new_id = choices[rng.random_range(0..choices.len())];

            let before = model.total_hamiltonian(&lattice, &registry).unwrap();
            let delta = model.delta_h(&lattice, &registry, x, y, old_id, new_id).unwrap();
            lattice.set(x, y, new_id);
            let after = model.total_hamiltonian(&lattice, &registry).unwrap();

            assert_eq!(
                delta,
                after - before,
                "site ({x}, {y}) {old_id} -> {new_id} on size {size}"
            );
        }
    }

    #[test]
    fn delta_h_leaves_lattice_untouched() {
        let mut rng = StdRng::seed_from_u64(5);
        let lattice = random_lattice(&mut rng, 7);
        let registry = random_registry(&mut rng);
        let snapshot = lattice.ids().to_vec();
        let old_id = lattice.get(3, 3);
        let new_id = if old_id == 2 { 3 } else { 2 };
        model()
            .delta_h(&lattice, &registry, 3, 3, old_id, new_id)
            .unwrap();
        assert_eq!(lattice.ids(), &snapshot[..]);
    }

    #[test]
    fn total_hamiltonian_of_seed_block() {
        // 2x2 cell in a 5x5 medium lattice: each of the 4 cell sites sees 5 medium
        // neighbours; interior medium sites around it add the same contacts back.
        let mut lattice = Lattice::new(5);
        lattice.fill_block(1, 1, 2, 1).unwrap();
        let mut registry = CellRegistry::new(
            CellEntry::new(CellType::Medium, 21, 0, 0.0),
            CellEntry::new(CellType::Necrotic, 0, 0, 50.0),
        );
        registry.insert(CellEntry::new(CellType::Proliferating, 4, 6, 10.0));

        let contacts = EnergyModel::adhesive_contacts(&lattice);
        // Cell sites: 4 * 5 = 20. Interior medium sites (1,3),(2,3),(3,1),(3,2),(3,3):
        // 2 + 2 + 2 + 2 + 1 = 9.
        assert_eq!(contacts, 29);
        let total = model().total_hamiltonian(&lattice, &registry).unwrap();
        assert_eq!(total, 29.0 * 6.0 + 10.0 * 4.0);
    }

    #[test]
    fn delta_h_requires_matching_label() {
        let lattice = Lattice::new(5);
        let registry = CellRegistry::new(
            CellEntry::new(CellType::Medium, 25, 0, 0.0),
            CellEntry::new(CellType::Necrotic, 0, 0, 50.0),
        );
        let model = model();
        assert!(matches!(
            model.delta_h(&lattice, &registry, 2, 2, 1, MEDIUM),
            Err(CpmError::LabelMismatch { .. })
        ));
        assert!(matches!(
            model.delta_h(&lattice, &registry, 2, 2, MEDIUM, 4),
            Err(CpmError::UnknownCell { id: 4 })
        ));
        assert!(matches!(
            model.delta_h(&lattice, &registry, 7, 2, MEDIUM, NECROTIC_POOL),
            Err(CpmError::SiteOutOfRange { .. })
        ));
    }

    #[test]
    fn total_hamiltonian_rejects_unregistered_labels() {
        let mut lattice = Lattice::new(5);
        lattice.set(2, 2, 9);
        let registry = CellRegistry::new(
            CellEntry::new(CellType::Medium, 24, 0, 0.0),
            CellEntry::new(CellType::Necrotic, 0, 0, 50.0),
        );
        assert!(model().total_hamiltonian(&lattice, &registry).is_err());
    }
}
