use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, shared read-only by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpmParams {
    // Lattice & seed
    pub size: usize,
    pub seed_block_size: usize,
    pub seed_target_volume: u32,

    // Monte Carlo
    pub adhesion: f64, // J
    pub kbt: f64,
    pub trials_per_site: u32,

    // Volume energy
    pub gamma_p: f64,
    pub gamma_q: f64,
    pub gamma_m: f64,
    pub gamma_n: f64,
    pub target_growth: u32,

    // Oxygen
    pub initial_oxygen: f64,
    pub consumption_scale: f64, // dt * n_iter_diff
    pub consumption_p: f64,
    pub consumption_q: f64,
    pub consumption_n: f64,
    pub threshold_p2q: f64,
    pub threshold_q2n: f64,

    // Division
    pub division_min_sites: u32,
    pub daughter_sites: u32,
}

impl CpmParams {
    /// Total number of lattice sites.
    pub fn num_sites(&self) -> usize {
        self.size * self.size
    }
}
