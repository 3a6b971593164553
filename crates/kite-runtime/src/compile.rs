//! Compilation entry point.
//!
//! Picks up `kite.toml`, builds the configured front end and runs the
//! engine's compiler into an output directory.

use crate::config::KiteConfig;
use crate::error::RuntimeError;
use kite_engine::compiler::{CompiledArtifact, Compiler};
use std::path::Path;

/// Compile `entry` into `out_dir` with the configuration discovered next
/// to the entry file.
pub fn compile(entry: &Path, out_dir: &Path) -> Result<CompiledArtifact, RuntimeError> {
    let config = KiteConfig::discover(entry, None)?;
    compile_with_config(entry, out_dir, &config)
}

/// Compile `entry` into `out_dir` with an explicit configuration.
pub fn compile_with_config(
    entry: &Path,
    out_dir: &Path,
    config: &KiteConfig,
) -> Result<CompiledArtifact, RuntimeError> {
    let front_end = config.front_end();
    let artifact = Compiler::new(front_end.as_ref())
        .with_options(config.compile_options())
        .compile(entry, out_dir)?;
    log::debug!(
        "compiled {} into {} unit(s) in {}",
        entry.display(),
        artifact.units.len(),
        artifact.output_dir.display()
    );
    Ok(artifact)
}
