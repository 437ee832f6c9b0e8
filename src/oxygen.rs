use crate::lattice::Lattice;
use rayon::prelude::*;

/// Oxygen concentration per lattice site, co-indexed with the lattice.
#[derive(Debug, Clone)]
pub struct OxygenField {
    size: usize,
    values: Vec<f64>,
}

impl OxygenField {
    /// Field with the same concentration everywhere.
    pub fn uniform(size: usize, concentration: f64) -> Self {
        OxygenField { size, values: vec![concentration; size * size] }
    }

    #[cfg(test)]
    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: usize, y: usize) -> f64 {
        self.values[x * self.size + y]
    }

    /// Mean over the whole field.
    /// Row sums run in parallel; they are combined in row order so the result does
    /// not depend on the thread count.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let row_sums: Vec<f64> = self
            .values
            .par_chunks(self.size.max(1))
            .map(|row| row.iter().sum::<f64>())
            .collect();
        row_sums.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Applies `value -= scale * rate` per site, flooring at zero.
    /// This is the whole oxygen update: one bulk decrement, not a diffusion solve.
    pub fn consume(&mut self, rates: &[f64], scale: f64) {
        debug_assert_eq!(rates.len(), self.values.len());
        self.values
            .par_iter_mut()
            .zip(rates.par_iter())
            .for_each(|(value, &rate)| {
                *value = (*value - scale * rate).max(0.0);
            });
    }

    /// Per-label `(sum, site_count)` of oxygen, indexed by `id + 1`.
    /// Each row is tallied in parallel from read-only views of both grids; the row
    /// partials are then added in row order, so sums are identical for any thread count.
    pub fn totals_by_label(&self, lattice: &Lattice) -> Vec<(f64, u32)> {
        let slots = lattice
            .present_ids()
            .last()
            .map_or(2, |&max_id| (max_id + 2) as usize);
        let row = self.size.max(1);
        let partials: Vec<Vec<(f64, u32)>> = self
            .values
            .par_chunks(row)
            .zip(lattice.ids().par_chunks(row))
            .map(|(oxygen_row, id_row)| {
                let mut acc = vec![(0.0, 0u32); slots];
                for (&value, &id) in oxygen_row.iter().zip(id_row) {
                    let slot = &mut acc[(id + 1) as usize];
                    slot.0 += value;
                    slot.1 += 1;
                }
                acc
            })
            .collect();

        let mut totals = vec![(0.0, 0u32); slots];
        for partial in partials {
            for (total, (sum, count)) in totals.iter_mut().zip(partial) {
                total.0 += sum;
                total.1 += count;
            }
        }
        totals
    }
}
