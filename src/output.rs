use crate::lattice::CellId;
use crate::registry::CellRegistry;
use anyhow::{Context, Result};
use cpm_common::{OutputConfig, Snapshot};
use log::{error, info};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// `<directory>/<initial_oxygen>`, created if missing.
pub fn prepare_output_dir(output: &OutputConfig, initial_oxygen: f64) -> Result<PathBuf> {
    let dir = Path::new(&output.directory).join(initial_oxygen.to_string());
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    Ok(dir)
}

/// Writes a row-major grid as space-separated integers, one row per line.
fn write_grid<T: Display>(path: &Path, size: usize, values: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in values.chunks(size.max(1)) {
        let line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Dumps `display_<oxygen>_<gen>.txt` and `cellIDs_<oxygen>_<gen>.txt` into `dir`.
pub fn write_text_grids(
    dir: &Path,
    initial_oxygen: f64,
    generation: u32,
    size: usize,
    display: &[i8],
    ids: &[CellId],
) -> Result<()> {
    write_grid(&dir.join(format!("display_{}_{}.txt", initial_oxygen, generation)), size, display)?;
    write_grid(&dir.join(format!("cellIDs_{}_{}.txt", initial_oxygen, generation)), size, ids)?;
    Ok(())
}

/// Final registry as CSV, one row per entry.
pub fn write_cell_table(path: &Path, registry: &CellRegistry) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["id", "type", "volume", "target_volume", "gamma", "retired"])?;
    for (id, entry) in registry.iter() {
        writer.write_record(&[
            id.to_string(),
            format!("{:?}", entry.cell_type).to_lowercase(),
            entry.volume.to_string(),
            entry.target_volume.to_string(),
            entry.gamma.to_string(),
            entry.retired.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn save_json(path: &Path, snapshots: &[Snapshot]) -> Result<()> {
    let json_string = serde_json::to_string(snapshots).context("serializing snapshots to JSON")?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    info!("All snapshots saved to {} ({} KB)", path.display(), json_string.len() / 1024);
    Ok(())
}

/// Saves every recorded snapshot in the configured format. Unknown formats fall back to JSON.
/// Returns the path written.
pub fn save_snapshots(
    dir: &Path,
    output: &OutputConfig,
    snapshots: &[Snapshot],
) -> Result<PathBuf> {
    let output_format = output.format.as_deref().unwrap_or("json");
    let base = &output.base_filename;

    match output_format {
        "json" => {
            let path = dir.join(format!("{}_snapshots.json", base));
            save_json(&path, snapshots)?;
            Ok(path)
        }
        "bincode" => {
            // Binary format (much more compact)
            let path = dir.join(format!("{}_snapshots.bin", base));
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, snapshots)
                .context("serializing snapshots to bincode")?;
            writer.flush()?;
            info!("All snapshots saved to {} (binary format)", path.display());
            Ok(path)
        }
        "messagepack" => {
            let path = dir.join(format!("{}_snapshots.msgpack", base));
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("serializing snapshots to MessagePack")?;
            writer.flush()?;
            info!("All snapshots saved to {} (MessagePack format)", path.display());
            Ok(path)
        }
        _ => {
            error!("Unknown output format: {}. Using JSON instead.", output_format);
            let path = dir.join(format!("{}_snapshots.json", base));
            save_json(&path, snapshots)?;
            Ok(path)
        }
    }
}
