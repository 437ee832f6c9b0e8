use crate::energy::EnergyModel;
use crate::error::{CpmError, CpmResult};
use crate::lattice::Lattice;
use crate::oxygen::OxygenField;
use crate::registry::{CellEntry, CellRegistry, CellType};
use cpm_common::CpmParams;

/// Everything that evolves over a run: the lattice, its registry, the oxygen
/// field and the running Hamiltonian.
#[derive(Debug, Clone)]
pub struct CpmState {
    pub params: CpmParams,
    pub lattice: Lattice,
    pub registry: CellRegistry,
    pub oxygen: OxygenField,
    /// Running value, rebased from a full recomputation at each sweep start.
    pub hamiltonian: f64,
}

impl CpmState {
    /// Medium lattice with a single proliferating seed cell next to the centre,
    /// a uniform oxygen field and an empty necrotic pool.
    pub fn new(params: &CpmParams) -> CpmResult<Self> {
        let size = params.size;
        let side = params.seed_block_size;
        let centre = (size - 1) / 2;
        let origin = centre + 1 - side;
        let seed_sites = (side * side) as u32;

        let mut lattice = Lattice::new(size);
        let mut registry = CellRegistry::new(
            CellEntry::new(
                CellType::Medium,
                params.num_sites() as u32 - seed_sites,
                0,
                params.gamma_m,
            ),
            CellEntry::new(CellType::Necrotic, 0, 0, params.gamma_n),
        );
        let seed = registry.insert(CellEntry::new(
            CellType::Proliferating,
            seed_sites,
            params.seed_target_volume,
            params.gamma_p,
        ));
        lattice.fill_block(origin, origin, side, seed)?;

        let oxygen = OxygenField::uniform(size, params.initial_oxygen);
        let hamiltonian = EnergyModel::new(params).total_hamiltonian(&lattice, &registry)?;

        Ok(CpmState { params: params.clone(), lattice, registry, oxygen, hamiltonian })
    }

    /// Every label on the lattice has a live entry and the Hamiltonian is finite.
    pub fn check_invariants(&self) -> CpmResult<()> {
        self.registry.check_lattice(&self.lattice)?;
        if !self.hamiltonian.is_finite() {
            return Err(CpmError::NonFiniteHamiltonian { value: self.hamiltonian });
        }
        Ok(())
    }

    /// Sites not held by medium.
    pub fn tumor_sites(&self) -> u32 {
        self.lattice.non_medium_sites()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::MEDIUM;
    use cpm_common::SimulationConfig;

    fn params(size: usize) -> CpmParams {
        let mut config = SimulationConfig::default();
        config.lattice.size = size;
        config.cpm_params(0.08)
    }

    #[test]
    fn seed_cell_sits_next_to_centre() {
        let state = CpmState::new(&params(11)).unwrap();
        assert_eq!(state.lattice.sites_of(1), vec![(4, 4), (4, 5), (5, 4), (5, 5)]);
        assert_eq!(state.tumor_sites(), 4);
        assert_eq!(state.lattice.count(MEDIUM), 117);

        let seed = state.registry.get(1).unwrap();
        assert_eq!(seed.cell_type, CellType::Proliferating);
        assert_eq!((seed.volume, seed.target_volume, seed.gamma), (4, 6, 10.0));
        assert_eq!(state.registry.get(MEDIUM).unwrap().volume, 117);
        assert_eq!(state.registry.total_volume(), 121);
        assert_eq!(state.registry.next_id(), 2);
        assert!(state.oxygen.values().iter().all(|&v| v == 0.08));
    }

    #[test]
    fn initial_hamiltonian_counts_seed_contacts_and_volume() {
        // 20 contacts from the seed sites plus 20 from the ring of medium around it.
        let state = CpmState::new(&params(11)).unwrap();
        assert_eq!(state.hamiltonian, 40.0 * 6.0 + 10.0 * 4.0);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn non_finite_hamiltonian_breaks_invariants() {
        let mut state = CpmState::new(&params(7)).unwrap();
        state.hamiltonian = f64::NAN;
        assert!(matches!(state.check_invariants(), Err(CpmError::NonFiniteHamiltonian { .. })));
    }
}
