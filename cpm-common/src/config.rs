use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::CpmParams;
use std::path::Path;

// Lattice geometry and the initial seed cell
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    /// Sites per dimension. Must be odd so the seed block sits on the centre.
    pub size: usize,
    /// Side length of the square block occupied by the seed cell.
    #[serde(default = "default_seed_block_size")]
    pub seed_block_size: usize,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub generations: u32,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub seed: u64,
    #[serde(default = "default_seed_target_volume")]
    pub seed_target_volume: u32,
}

// Metropolis parameters
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MonteCarloConfig {
    /// Adhesion constant J applied per differing neighbour pair.
    pub adhesion: f64,
    /// Boltzmann-scale constant in the acceptance probability exp(-dH / kbT).
    pub kbt: f64,
    #[serde(default = "default_trials_per_site")]
    pub trials_per_site: u32,
}

// Volume energy coefficients per cell type
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct VolumeConfig {
    pub gamma_p: f64,
    pub gamma_q: f64,
    pub gamma_m: f64,
    pub gamma_n: f64,
    /// Target volume gained by a proliferating cell every generation.
    #[serde(default = "default_target_growth")]
    pub target_growth: u32,
}

// Oxygen field, consumption and the type transition thresholds
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OxygenConfig {
    /// Uniform starting concentration. Sampled from [min_initial, max_initial] when absent.
    #[serde(default)]
    pub initial: Option<f64>,
    #[serde(default = "default_min_initial")]
    pub min_initial: f64,
    #[serde(default = "default_max_initial")]
    pub max_initial: f64,
    pub dt: f64,
    pub n_iter_diff: u32,
    pub consumption_p: f64,
    pub consumption_q: f64,
    pub consumption_n: f64,
    pub threshold_p2q: f64,
    pub threshold_q2n: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DivisionConfig {
    /// Minimum occupied sites before a proliferating cell splits.
    pub min_sites: u32,
    /// Sites handed to the daughter cell (and left as the parent's nominal volume).
    pub daughter_sites: u32,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub directory: String,
    pub base_filename: String,
    pub save_stats: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub save_lattice_in_snapshot: bool,
    #[serde(default)]
    pub save_text_grids: bool,
    #[serde(default)]
    pub save_cell_table: bool,
    /// Tumor fraction above which the prognosis is reported as metastatic.
    #[serde(default = "default_metastatic_fraction")]
    pub metastatic_fraction: f64,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    pub monte_carlo: MonteCarloConfig,
    pub volume: VolumeConfig,
    pub oxygen: OxygenConfig,
    pub division: DivisionConfig,
    pub output: OutputConfig,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig { size: 101, seed_block_size: default_seed_block_size() }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig { generations: 21 }
    }
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions { seed: 42, seed_target_volume: default_seed_target_volume() }
    }
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            adhesion: 12.0,
            kbt: 4.183365e-21,
            trials_per_site: default_trials_per_site(),
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig {
            gamma_p: 10.0,
            gamma_q: 30.0,
            gamma_m: 0.0,
            gamma_n: 50.0,
            target_growth: default_target_growth(),
        }
    }
}

impl Default for OxygenConfig {
    fn default() -> Self {
        OxygenConfig {
            initial: None,
            min_initial: default_min_initial(),
            max_initial: default_max_initial(),
            dt: 9e-8,
            n_iter_diff: 600,
            consumption_p: 50.0,
            consumption_q: 20.0,
            consumption_n: 0.0,
            threshold_p2q: 0.06,
            threshold_q2n: 0.045,
        }
    }
}

impl Default for DivisionConfig {
    fn default() -> Self {
        DivisionConfig { min_sites: 8, daughter_sites: 4 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: "results".to_string(),
            base_filename: "tumor".to_string(),
            save_stats: true,
            format: Some("json".to_string()),
            save_lattice_in_snapshot: false,
            save_text_grids: false,
            save_cell_table: false,
            metastatic_fraction: default_metastatic_fraction(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| {
                anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e)
            })?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| {
                anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e)
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the model cannot run with. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        let n = self.lattice.size;
        if n < 3 || n % 2 == 0 {
            anyhow::bail!("lattice.size must be an odd integer >= 3 (got {}).", n);
        }
        let block = self.lattice.seed_block_size;
        // Block spans [c + 1 - block, c], which must stay off the border.
        let centre = (n - 1) / 2;
        if block == 0 || block > centre {
            anyhow::bail!(
                "lattice.seed_block_size must be in 1..={} for a lattice of size {} (got {}).",
                centre, n, block
            );
        }
        if self.timing.generations == 0 {
            anyhow::bail!("timing.generations must be greater than 0.");
        }

        require_positive("monte_carlo.adhesion", self.monte_carlo.adhesion)?;
        require_positive("monte_carlo.kbt", self.monte_carlo.kbt)?;
        if self.monte_carlo.trials_per_site == 0 {
            anyhow::bail!("monte_carlo.trials_per_site must be greater than 0.");
        }

        require_non_negative("volume.gamma_p", self.volume.gamma_p)?;
        require_non_negative("volume.gamma_q", self.volume.gamma_q)?;
        require_non_negative("volume.gamma_m", self.volume.gamma_m)?;
        require_non_negative("volume.gamma_n", self.volume.gamma_n)?;

        let oxygen = &self.oxygen;
        if let Some(initial) = oxygen.initial {
            require_positive("oxygen.initial", initial)?;
        } else {
            require_positive("oxygen.min_initial", oxygen.min_initial)?;
            require_positive("oxygen.max_initial", oxygen.max_initial)?;
            if oxygen.min_initial > oxygen.max_initial {
                anyhow::bail!(
                    "oxygen.min_initial ({}) must not exceed oxygen.max_initial ({}).",
                    oxygen.min_initial, oxygen.max_initial
                );
            }
        }
        require_positive("oxygen.dt", oxygen.dt)?;
        if oxygen.n_iter_diff == 0 {
            anyhow::bail!("oxygen.n_iter_diff must be greater than 0.");
        }
        require_non_negative("oxygen.consumption_p", oxygen.consumption_p)?;
        require_non_negative("oxygen.consumption_q", oxygen.consumption_q)?;
        require_non_negative("oxygen.consumption_n", oxygen.consumption_n)?;
        require_positive("oxygen.threshold_p2q", oxygen.threshold_p2q)?;
        require_positive("oxygen.threshold_q2n", oxygen.threshold_q2n)?;
        if oxygen.threshold_q2n > oxygen.threshold_p2q {
            anyhow::bail!(
                "oxygen.threshold_q2n ({}) must not exceed oxygen.threshold_p2q ({}).",
                oxygen.threshold_q2n, oxygen.threshold_p2q
            );
        }

        if self.division.daughter_sites == 0
            || self.division.min_sites <= self.division.daughter_sites
        {
            anyhow::bail!(
                "division.min_sites ({}) must exceed division.daughter_sites ({}), \
                 which must be positive.",
                self.division.min_sites, self.division.daughter_sites
            );
        }

        let fraction = self.output.metastatic_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            anyhow::bail!("output.metastatic_fraction must lie in (0, 1) (got {}).", fraction);
        }

        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    /// `initial_oxygen` is resolved by the caller (fixed or sampled).
    pub fn cpm_params(&self, initial_oxygen: f64) -> CpmParams {
        CpmParams {
            size: self.lattice.size,
            seed_block_size: self.lattice.seed_block_size,
            seed_target_volume: self.initial_conditions.seed_target_volume,

            adhesion: self.monte_carlo.adhesion,
            kbt: self.monte_carlo.kbt,
            trials_per_site: self.monte_carlo.trials_per_site,

            gamma_p: self.volume.gamma_p,
            gamma_q: self.volume.gamma_q,
            gamma_m: self.volume.gamma_m,
            gamma_n: self.volume.gamma_n,
            target_growth: self.volume.target_growth,

            initial_oxygen,
            // Consumption is applied as one bulk decrement per generation.
            consumption_scale: self.oxygen.dt * self.oxygen.n_iter_diff as f64,
            consumption_p: self.oxygen.consumption_p,
            consumption_q: self.oxygen.consumption_q,
            consumption_n: self.oxygen.consumption_n,
            threshold_p2q: self.oxygen.threshold_p2q,
            threshold_q2n: self.oxygen.threshold_q2n,

            division_min_sites: self.division.min_sites,
            daughter_sites: self.division.daughter_sites,
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        anyhow::bail!("{} must be positive and finite (got {}).", name, value);
    }
    Ok(())
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("{} must be non-negative and finite (got {}).", name, value);
    }
    Ok(())
}

fn default_seed_block_size() -> usize {
    2
}

fn default_seed_target_volume() -> u32 {
    6
}

fn default_trials_per_site() -> u32 {
    300
}

fn default_target_growth() -> u32 {
    2
}

fn default_min_initial() -> f64 {
    0.07
}

fn default_max_initial() -> f64 {
    0.082
}

fn default_metastatic_fraction() -> f64 {
    0.0225
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        [lattice]
        size = 11

        [timing]
        generations = 5

        [initial_conditions]
        seed = 7

        [monte_carlo]
        adhesion = 12.0
        kbt = 4.183365e-21

        [volume]
        gamma_p = 10.0
        gamma_q = 30.0
        gamma_m = 0.0
        gamma_n = 50.0

        [oxygen]
        initial = 0.08
        dt = 9e-8
        n_iter_diff = 600
        consumption_p = 50.0
        consumption_q = 20.0
        consumption_n = 0.0
        threshold_p2q = 0.06
        threshold_q2n = 0.045

        [division]
        min_sites = 8
        daughter_sites = 4

        [output]
        directory = "results"
        base_filename = "tumor"
        save_stats = false
    "#;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: SimulationConfig = toml::from_str(MINIMAL_TOML).unwrap();
        config.validate().unwrap();
        assert_eq!(config.lattice.seed_block_size, 2);
        assert_eq!(config.initial_conditions.seed_target_volume, 6);
        assert_eq!(config.monte_carlo.trials_per_site, 300);
        assert_eq!(config.volume.target_growth, 2);
        assert_eq!(config.oxygen.initial, Some(0.08));
        assert!((config.output.metastatic_fraction - 0.0225).abs() < 1e-12);
    }

    #[test]
    fn even_lattice_size_is_rejected() {
        let mut config = SimulationConfig::default();
        config.lattice.size = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lattice.size"));
    }

    #[test]
    fn tiny_lattice_is_rejected() {
        let mut config = SimulationConfig::default();
        config.lattice.size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_kbt_is_rejected() {
        let mut config = SimulationConfig::default();
        config.monte_carlo.kbt = 0.0;
        assert!(config.validate().unwrap_err().to_string().contains("kbt"));
        config.monte_carlo.kbt = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let mut config = SimulationConfig::default();
        config.oxygen.threshold_q2n = -0.01;
        assert!(config.validate().unwrap_err().to_string().contains("threshold_q2n"));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = SimulationConfig::default();
        config.oxygen.threshold_q2n = 0.07;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_consumption_rate_is_rejected() {
        let mut config = SimulationConfig::default();
        config.oxygen.consumption_q = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn division_must_leave_parent_sites() {
        let mut config = SimulationConfig::default();
        config.division.min_sites = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn seed_block_must_fit_interior() {
        let mut config = SimulationConfig::default();
        config.lattice.size = 5;
        config.lattice.seed_block_size = 3;
        assert!(config.validate().is_err());
        config.lattice.seed_block_size = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn params_fold_diffusion_step_into_scale() {
        let config = SimulationConfig::default();
        let params = config.cpm_params(0.08);
        assert!((params.consumption_scale - 9e-8 * 600.0).abs() < 1e-18);
        assert_eq!(params.size, 101);
        assert_eq!(params.initial_oxygen, 0.08);
    }
}
