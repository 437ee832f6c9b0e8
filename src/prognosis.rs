use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Benign,
    Metastatic,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Benign => write!(f, "benign"),
            Outcome::Metastatic => write!(f, "metastatic"),
        }
    }
}

/// End-of-run classification by the share of the lattice the tumor occupies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prognosis {
    pub tumor_sites: u32,
    pub total_sites: u32,
    pub tumor_fraction: f64,
    pub outcome: Outcome,
}

impl Prognosis {
    /// Metastatic when the non-medium fraction strictly exceeds `threshold`.
    pub fn assess(lattice: &Lattice, threshold: f64) -> Self {
        let tumor_sites = lattice.non_medium_sites();
        let total_sites = lattice.num_sites() as u32;
        let tumor_fraction = if total_sites == 0 {
            0.0
        } else {
            tumor_sites as f64 / total_sites as f64
        };
        let outcome = if tumor_fraction > threshold {
            Outcome::Metastatic
        } else {
            Outcome::Benign
        };
        Prognosis { tumor_sites, total_sites, tumor_fraction, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::NECROTIC_POOL;

    #[test]
    fn small_tumor_is_benign() {
        // 4 / 441 = 0.0091
        let mut lattice = Lattice::new(21);
        lattice.fill_block(9, 9, 2, 1).unwrap();
        let prognosis = Prognosis::assess(&lattice, 0.0225);
        assert_eq!(prognosis.tumor_sites, 4);
        assert_eq!(prognosis.total_sites, 441);
        assert_eq!(prognosis.outcome, Outcome::Benign);
        assert_eq!(prognosis.outcome.to_string(), "benign");
    }

    #[test]
    fn necrotic_sites_count_toward_tumor() {
        // 9 living sites alone: 9 / 441 = 0.0204, still benign.
        let mut lattice = Lattice::new(21);
        lattice.fill_block(9, 9, 3, 1).unwrap();
        assert_eq!(Prognosis::assess(&lattice, 0.0225).outcome, Outcome::Benign);

        // One pool site tips it over: 10 / 441 = 0.0227.
        lattice.set(8, 8, NECROTIC_POOL);
        let prognosis = Prognosis::assess(&lattice, 0.0225);
        assert_eq!(prognosis.tumor_sites, 10);
        assert_eq!(prognosis.outcome, Outcome::Metastatic);
        assert_eq!(prognosis.outcome.to_string(), "metastatic");
    }

    #[test]
    fn fraction_equal_to_threshold_is_benign() {
        let mut lattice = Lattice::new(5);
        lattice.set(2, 2, 1);
        let prognosis = Prognosis::assess(&lattice, 1.0 / 25.0);
        assert_eq!(prognosis.outcome, Outcome::Benign);
    }
}
