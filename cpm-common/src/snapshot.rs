use serde::{Serialize, Deserialize};

/// A snapshot of the lattice and summary metrics at the start of a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Generation index the snapshot was taken before.
    /// The final snapshot carries the generation count.
    pub generation: u32,
    /// Running Hamiltonian at snapshot time (informational).
    pub hamiltonian: f64,
    /// Number of live proliferating cells.
    pub proliferating_cells: u32,
    /// Number of live quiescent cells.
    pub quiescent_cells: u32,
    /// Sites held by the shared necrotic pool.
    pub necrotic_sites: u32,
    /// All non-medium sites.
    pub tumor_sites: u32,
    /// Mean oxygen concentration over the whole field.
    pub mean_oxygen: f64,
    /// Row-major type codes: 1 proliferating, 2 quiescent, -1 necrotic, 0 medium.
    pub display: Vec<i8>,
    /// Optional: raw row-major cell identifiers.
    /// Filled only if `config.output.save_lattice_in_snapshot` is true. Always serialized
    /// (as null when absent) so the positional bincode and MessagePack encodings round-trip.
    pub cell_ids: Option<Vec<i32>>,
}
