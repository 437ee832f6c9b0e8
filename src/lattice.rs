use crate::error::{CpmError, CpmResult};

/// Label stored at every lattice site.
pub type CellId = i32;

/// Background (non-cell) label.
pub const MEDIUM: CellId = 0;
/// Shared label absorbing every cell that died of hypoxia.
pub const NECROTIC_POOL: CellId = -1;

/// Square grid of cell labels, stored row-major (`x` is the row, `y` the column).
///
/// The lattice keeps a live per-label site tally so volume lookups during the
/// Monte Carlo sweep are O(1) instead of a full-grid scan.
#[derive(Debug, Clone)]
pub struct Lattice {
    size: usize,
    ids: Vec<CellId>,
    // counts[id + 1]; the pool (-1) lives at index 0.
    counts: Vec<u32>,
}

#[inline(always)]
fn tally_slot(id: CellId) -> usize {
    debug_assert!(id >= NECROTIC_POOL, "cell ids below the necrotic pool are never allocated");
    (id + 1) as usize
}

impl Lattice {
    /// Creates a lattice filled with medium.
    pub fn new(size: usize) -> Self {
        let mut counts = vec![0; 2];
        counts[tally_slot(MEDIUM)] = (size * size) as u32;
        Lattice { size, ids: vec![MEDIUM; size * size], counts }
    }

    /// Builds a lattice from raw row-major labels.
    #[cfg(test)]
    pub(crate) fn from_ids(size: usize, ids: Vec<CellId>) -> CpmResult<Self> {
        if ids.len() != size * size {
            return Err(CpmError::SiteOutOfRange { x: ids.len() / size.max(1), y: 0, size });
        }
        let mut lattice = Lattice { size, ids, counts: vec![0; 2] };
        for i in 0..lattice.ids.len() {
            let id = lattice.ids[i];
            if id < NECROTIC_POOL {
                return Err(CpmError::UnknownCell { id });
            }
            lattice.bump(id, 1);
        }
        Ok(lattice)
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn num_sites(&self) -> usize {
        self.ids.len()
    }

    #[inline(always)]
    pub fn index(&self, x: usize, y: usize) -> usize {
        x * self.size + y
    }

    /// Raw row-major labels.
    pub fn ids(&self) -> &[CellId] {
        &self.ids
    }

    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> CellId {
        self.ids[self.index(x, y)]
    }

    /// Bounds-checked read.
    pub fn try_get(&self, x: usize, y: usize) -> CpmResult<CellId> {
        if x >= self.size || y >= self.size {
            return Err(CpmError::SiteOutOfRange { x, y, size: self.size });
        }
        Ok(self.get(x, y))
    }

    /// Relabels one site and keeps the tally in step.
    #[inline(always)]
    pub fn set(&mut self, x: usize, y: usize, id: CellId) {
        let idx = self.index(x, y);
        let old = self.ids[idx];
        if old == id {
            return;
        }
        self.ids[idx] = id;
        self.bump(old, -1);
        self.bump(id, 1);
    }

    fn bump(&mut self, id: CellId, delta: i64) {
        let slot = tally_slot(id);
        if slot >= self.counts.len() {
            self.counts.resize(slot + 1, 0);
        }
        self.counts[slot] = (self.counts[slot] as i64 + delta) as u32;
    }

    /// Live number of sites holding `id`.
    #[inline(always)]
    pub fn count(&self, id: CellId) -> u32 {
        self.counts.get(tally_slot(id)).copied().unwrap_or(0)
    }

    /// Sites not holding medium (living cells plus the necrotic pool).
    pub fn non_medium_sites(&self) -> u32 {
        self.num_sites() as u32 - self.count(MEDIUM)
    }

    /// Sorted labels currently present on the lattice.
    pub fn present_ids(&self) -> Vec<CellId> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(slot, _)| slot as CellId - 1)
            .collect()
    }

    /// Sites off the one-site border. Only these carry adhesion energy or receive proposals.
    #[inline(always)]
    pub fn is_interior(&self, x: usize, y: usize) -> bool {
        x >= 1 && y >= 1 && x + 1 < self.size && y + 1 < self.size
    }

    /// Calls `f` for each of the 8 neighbours of an interior site.
    /// Stops early when `f` returns `false`.
    #[inline(always)]
    pub fn for_each_neighbor<F>(&self, x: usize, y: usize, mut f: F)
    where
        F: FnMut(usize, usize, CellId) -> bool,
    {
        debug_assert!(self.is_interior(x, y));
        for dx in 0..3 {
            for dy in 0..3 {
                if dx == 1 && dy == 1 {
                    continue;
                }
                let nx = x + dx - 1;
                let ny = y + dy - 1;
                if !f(nx, ny, self.get(nx, ny)) {
                    return;
                }
            }
        }
    }

    /// True when every site in the 3x3 block around an interior site shares its label,
    /// i.e. there is no cell boundary to move.
    pub fn neighborhood_is_uniform(&self, x: usize, y: usize) -> bool {
        let center = self.get(x, y);
        let mut uniform = true;
        self.for_each_neighbor(x, y, |_, _, id| {
            uniform = id == center;
            uniform
        });
        uniform
    }

    /// Coordinates holding `id`, in row-major scan order.
    pub fn sites_of(&self, id: CellId) -> Vec<(usize, usize)> {
        self.ids
            .iter()
            .enumerate()
            .filter(|&(_, &site)| site == id)
            .map(|(idx, _)| (idx / self.size, idx % self.size))
            .collect()
    }

    /// Reassigns every site holding `from` to `to`. Returns the number of sites moved.
    pub fn relabel_all(&mut self, from: CellId, to: CellId) -> u32 {
        if from == to {
            return 0;
        }
        let mut moved = 0;
        for site in self.ids.iter_mut().filter(|site| **site == from) {
            *site = to;
            moved += 1;
        }
        self.bump(from, -(moved as i64));
        self.bump(to, moved as i64);
        moved
    }

    /// Fills the `side` x `side` block whose top-left corner is (x0, y0).
    pub fn fill_block(&mut self, x0: usize, y0: usize, side: usize, id: CellId) -> CpmResult<()> {
        if x0 + side > self.size || y0 + side > self.size {
            return Err(CpmError::SiteOutOfRange { x: x0 + side, y: y0 + side, size: self.size });
        }
        for x in x0..x0 + side {
            for y in y0..y0 + side {
                self.set(x, y, id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lattice_is_all_medium() {
        let lattice = Lattice::new(5);
        assert_eq!(lattice.count(MEDIUM), 25);
        assert_eq!(lattice.non_medium_sites(), 0);
        assert_eq!(lattice.present_ids(), vec![MEDIUM]);
    }

    #[test]
    fn set_keeps_tally_consistent() {
        let mut lattice = Lattice::new(5);
        lattice.set(2, 2, 3);
        lattice.set(2, 3, 3);
        lattice.set(1, 1, NECROTIC_POOL);
        assert_eq!(lattice.count(3), 2);
        assert_eq!(lattice.count(NECROTIC_POOL), 1);
        assert_eq!(lattice.count(MEDIUM), 22);
        assert_eq!(lattice.count(2), 0);
        assert_eq!(lattice.present_ids(), vec![NECROTIC_POOL, MEDIUM, 3]);

        lattice.set(2, 2, MEDIUM);
        assert_eq!(lattice.count(3), 1);
        assert_eq!(lattice.count(MEDIUM), 23);
    }

    #[test]
    fn uniform_neighborhood_detection() {
        let mut lattice = Lattice::new(5);
        assert!(lattice.neighborhood_is_uniform(2, 2));
        lattice.set(1, 3, 1);
        assert!(!lattice.neighborhood_is_uniform(2, 2));
        assert!(lattice.neighborhood_is_uniform(3, 1));
    }

    #[test]
    fn interior_excludes_border() {
        let lattice = Lattice::new(5);
        assert!(!lattice.is_interior(0, 2));
        assert!(!lattice.is_interior(4, 2));
        assert!(!lattice.is_interior(2, 4));
        assert!(lattice.is_interior(1, 3));
    }

    #[test]
    fn sites_are_listed_in_row_major_order() {
        let mut lattice = Lattice::new(5);
        lattice.set(3, 1, 1);
        lattice.set(1, 3, 1);
        lattice.set(1, 2, 1);
        assert_eq!(lattice.sites_of(1), vec![(1, 2), (1, 3), (3, 1)]);
    }

    #[test]
    fn relabel_all_moves_every_site() {
        let mut lattice = Lattice::new(5);
        lattice.fill_block(1, 1, 2, 4).unwrap();
        assert_eq!(lattice.relabel_all(4, NECROTIC_POOL), 4);
        assert_eq!(lattice.count(4), 0);
        assert_eq!(lattice.count(NECROTIC_POOL), 4);
        assert_eq!(lattice.relabel_all(4, NECROTIC_POOL), 0);
    }

    #[test]
    fn from_ids_rebuilds_tally() {
        let ids = vec![0, 0, 0, 0, 1, -1, 0, 1, 0];
        let lattice = Lattice::from_ids(3, ids).unwrap();
        assert_eq!(lattice.count(1), 2);
        assert_eq!(lattice.count(NECROTIC_POOL), 1);
        assert_eq!(lattice.count(MEDIUM), 6);
        assert!(Lattice::from_ids(3, vec![0; 8]).is_err());
    }

    #[test]
    fn fill_block_rejects_overflow() {
        let mut lattice = Lattice::new(5);
        assert!(lattice.fill_block(4, 4, 2, 1).is_err());
    }
}
