//! `kite compile`: payloads in, unit files out.

use crate::output::StyledOutput;
use kite_runtime::{compile_with_config, KiteConfig, RuntimeError};
use std::path::Path;

pub fn execute(entry: &Path, out_dir: &Path, config: Option<&Path>, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config = KiteConfig::discover(entry, config).map_err(RuntimeError::from)?;
    let artifact = compile_with_config(entry, out_dir, &config)?;
    out.status(
        "Compiled",
        &format!(
            "{} -> {} ({} unit(s))",
            entry.display(),
            artifact.output_dir.display(),
            artifact.units.len()
        ),
    );
    for unit in &artifact.units {
        log::info!("wrote {}", unit.display());
    }
    Ok(())
}
