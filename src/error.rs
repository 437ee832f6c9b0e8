use crate::lattice::CellId;
use thiserror::Error;

/// Failures of the core model. Every variant is a broken invariant; none is recoverable.
#[derive(Debug, Error)]
pub enum CpmError {
    #[error("cell id {id} is on the lattice but has no registry entry")]
    UnknownCell { id: CellId },
    #[error("cell id {id} is on the lattice but its registry entry is retired")]
    RetiredCell { id: CellId },
    #[error("site ({x}, {y}) is outside a lattice of size {size}")]
    SiteOutOfRange { x: usize, y: usize, size: usize },
    #[error("site ({x}, {y}) holds id {actual}, expected {expected}")]
    LabelMismatch { x: usize, y: usize, expected: CellId, actual: CellId },
    #[error("division allocated id {allocated}, expected {expected}")]
    IdAllocation { expected: CellId, allocated: CellId },
    #[error("hamiltonian became non-finite ({value}) at trial {trial}")]
    NonFiniteEnergy { trial: u64, value: f64 },
    #[error("hamiltonian is non-finite ({value}) at a generation boundary")]
    NonFiniteHamiltonian { value: f64 },
    #[error("invalid sampling range: {0}")]
    Sampling(#[from] rand::distr::uniform::Error),
}

pub type CpmResult<T> = Result<T, CpmError>;
