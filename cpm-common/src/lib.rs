pub mod config;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{
    DivisionConfig, InitialConditions, LatticeConfig, MonteCarloConfig, OutputConfig,
    OxygenConfig, SimulationConfig, TimingConfig, VolumeConfig,
};
pub use sim_params::CpmParams;
pub use snapshot::Snapshot;
