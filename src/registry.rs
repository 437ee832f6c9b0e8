use crate::error::{CpmError, CpmResult};
use crate::lattice::{CellId, Lattice, MEDIUM, NECROTIC_POOL};
use cpm_common::CpmParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Proliferating,
    Quiescent,
    Necrotic,
    Medium,
}

impl CellType {
    /// Volume-energy coefficient for this type.
    pub fn gamma(self, params: &CpmParams) -> f64 {
        match self {
            CellType::Proliferating => params.gamma_p,
            CellType::Quiescent => params.gamma_q,
            CellType::Necrotic => params.gamma_n,
            CellType::Medium => params.gamma_m,
        }
    }

    /// Oxygen consumed per site per unit time.
    pub fn consumption_rate(self, params: &CpmParams) -> f64 {
        match self {
            CellType::Proliferating => params.consumption_p,
            CellType::Quiescent => params.consumption_q,
            CellType::Necrotic => params.consumption_n,
            CellType::Medium => 0.0,
        }
    }
}

/// Attributes of one cell identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEntry {
    pub cell_type: CellType,
    /// Site count as of the last registry refresh (lags the live lattice during a sweep).
    pub volume: u32,
    pub target_volume: u32,
    pub gamma: f64,
    /// Set once the cell has merged into the necrotic pool or vanished from the lattice.
    pub retired: bool,
}

impl CellEntry {
    pub fn new(cell_type: CellType, volume: u32, target_volume: u32, gamma: f64) -> Self {
        CellEntry { cell_type, volume, target_volume, gamma, retired: false }
    }
}

/// Arena of cell entries indexed by identifier.
///
/// Medium (0) and the necrotic pool (-1) have fixed slots; living cells occupy
/// `cells[id - 1]`. Slots are never removed or reused, so the next identifier is
/// always one past the highest ever allocated.
#[derive(Debug, Clone)]
pub struct CellRegistry {
    medium: CellEntry,
    necrotic: CellEntry,
    cells: Vec<CellEntry>,
}

impl CellRegistry {
    pub fn new(medium: CellEntry, necrotic: CellEntry) -> Self {
        CellRegistry { medium, necrotic, cells: Vec::new() }
    }

    /// Identifier the next division will receive.
    pub fn next_id(&self) -> CellId {
        self.cells.len() as CellId + 1
    }

    /// Appends a living cell and returns its identifier.
    pub fn insert(&mut self, entry: CellEntry) -> CellId {
        self.cells.push(entry);
        self.cells.len() as CellId
    }

    pub fn get(&self, id: CellId) -> CpmResult<&CellEntry> {
        match id {
            MEDIUM => Ok(&self.medium),
            NECROTIC_POOL => Ok(&self.necrotic),
            id if id > 0 => self.cells.get(id as usize - 1).ok_or(CpmError::UnknownCell { id }),
            id => Err(CpmError::UnknownCell { id }),
        }
    }

    pub fn get_mut(&mut self, id: CellId) -> CpmResult<&mut CellEntry> {
        match id {
            MEDIUM => Ok(&mut self.medium),
            NECROTIC_POOL => Ok(&mut self.necrotic),
            id if id > 0 => self.cells.get_mut(id as usize - 1).ok_or(CpmError::UnknownCell { id }),
            id => Err(CpmError::UnknownCell { id }),
        }
    }

    /// Like `get`, but a retired entry is an error.
    pub fn live(&self, id: CellId) -> CpmResult<&CellEntry> {
        let entry = self.get(id)?;
        if entry.retired {
            return Err(CpmError::RetiredCell { id });
        }
        Ok(entry)
    }

    /// All entries: living cells in ascending id order, then medium and the pool.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &CellEntry)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, entry)| (i as CellId + 1, entry))
            .chain([(MEDIUM, &self.medium), (NECROTIC_POOL, &self.necrotic)])
    }

    /// Identifiers of entries that are not retired, in `iter` order.
    pub fn live_ids(&self) -> Vec<CellId> {
        self.iter().filter(|(_, entry)| !entry.retired).map(|(id, _)| id).collect()
    }

    pub fn retire(&mut self, id: CellId) -> CpmResult<()> {
        if id == MEDIUM || id == NECROTIC_POOL {
            // The two fixed slots always stay live.
            return Ok(());
        }
        self.get_mut(id)?.retired = true;
        Ok(())
    }

    /// Sum of the bookkeeping volumes of live entries. Equals the site count right after a refresh.
    pub fn total_volume(&self) -> u64 {
        self.iter()
            .filter(|(_, entry)| !entry.retired)
            .map(|(_, entry)| entry.volume as u64)
            .sum()
    }

    /// Number of live entries of the given type, excluding medium and the pool.
    pub fn count_cells(&self, cell_type: CellType) -> u32 {
        self.cells
            .iter()
            .filter(|entry| !entry.retired && entry.cell_type == cell_type)
            .count() as u32
    }

    /// Fails on the first identifier present on the lattice without a live entry.
    pub fn check_lattice(&self, lattice: &Lattice) -> CpmResult<()> {
        for id in lattice.present_ids() {
            self.live(id)?;
        }
        Ok(())
    }

    /// Visualisation code for an identifier.
    pub fn display_code(&self, id: CellId) -> CpmResult<i8> {
        if id < 0 {
            return Ok(-1);
        }
        Ok(match self.live(id)?.cell_type {
            CellType::Proliferating => 1,
            CellType::Quiescent => 2,
            CellType::Necrotic => -1,
            CellType::Medium => 0,
        })
    }

    /// Row-major grid of display codes for the current lattice.
    pub fn display_grid(&self, lattice: &Lattice) -> CpmResult<Vec<i8>> {
        let present = lattice.present_ids();
        let max_id = present.last().copied().unwrap_or(MEDIUM);
        // codes[id + 1], matching the lattice tally layout.
        let mut codes = vec![0i8; (max_id + 2) as usize];
        for id in present {
            codes[(id + 1) as usize] = self.display_code(id)?;
        }
        Ok(lattice.ids().iter().map(|&id| codes[(id + 1) as usize]).collect())
    }
}
