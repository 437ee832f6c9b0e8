//! Cellular Potts model of avascular tumor growth under oxygen limitation.

pub mod energy;
pub mod error;
pub mod lattice;
pub mod lifecycle;
pub mod montecarlo;
pub mod output;
pub mod oxygen;
pub mod prognosis;
pub mod registry;
pub mod simulation;
pub mod state;

pub use error::{CpmError, CpmResult};
pub use simulation::{GenerationReport, Simulation};
