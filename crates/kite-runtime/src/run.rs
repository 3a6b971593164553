//! Run entry point.
//!
//! Loads a compiled program (output directory first, then the classpath),
//! runs module initialization and drains the microtask queue.

use crate::error::RuntimeError;
use kite_engine::compiler::CompiledArtifact;
use kite_engine::vm::{load_program, LoadedProgram, SchedulerStats, SiteStats, Vm};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Counters collected while a program ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Property cache counters
    pub sites: SiteStats,
    /// Microtask scheduler counters
    pub scheduler: SchedulerStats,
}

/// Run a compiled artifact, writing program output to `stdout`/`stderr`.
/// `classpath` directories are searched for units after the artifact's
/// output directory.
pub fn run(
    artifact: &CompiledArtifact,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    classpath: &[PathBuf],
) -> Result<RunReport, RuntimeError> {
    run_units(&artifact.output_dir, &artifact.entry_unit, stdout, stderr, classpath)
}

/// Run the entry unit `entry_unit` found in `dir` or on the classpath
pub fn run_units(
    dir: &Path,
    entry_unit: &str,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    classpath: &[PathBuf],
) -> Result<RunReport, RuntimeError> {
    let program = load(dir, entry_unit, classpath)?;
    let mut vm = Vm::new(program, stdout, stderr);
    let result = vm.run_entry();
    let report = RunReport {
        sites: vm.site_stats(),
        scheduler: vm.scheduler_stats(),
    };
    log::debug!(
        "run finished: {} microtask(s), {} site hit(s), {} miss(es)",
        report.scheduler.executed,
        report.sites.hits,
        report.sites.misses
    );
    result?;
    Ok(report)
}

/// Load and verify a program without running it
pub fn load(dir: &Path, entry_unit: &str, classpath: &[PathBuf]) -> Result<LoadedProgram, RuntimeError> {
    check_classpath(classpath)?;
    Ok(load_program(dir, entry_unit, classpath)?)
}

fn check_classpath(classpath: &[PathBuf]) -> Result<(), RuntimeError> {
    match classpath.iter().find(|entry| !entry.is_dir()) {
        Some(entry) => Err(RuntimeError::Classpath(format!(
            "classpath entry {} is not a directory",
            entry.display()
        ))),
        None => Ok(()),
    }
}
