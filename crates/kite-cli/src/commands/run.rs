//! `kite run`: compile an entry file, then execute it.

use kite_runtime::{compile_with_config, run, KiteConfig, RunReport, RuntimeError};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunArgs<'a> {
    pub entry: &'a Path,
    pub out_dir: &'a Path,
    pub classpath: &'a [PathBuf],
    pub config: Option<&'a Path>,
    pub stats: bool,
}

pub fn execute(args: RunArgs<'_>) -> anyhow::Result<()> {
    let config = KiteConfig::discover(args.entry, args.config).map_err(RuntimeError::from)?;
    let artifact = compile_with_config(args.entry, args.out_dir, &config)?;

    // CLI entries come before the configured ones
    let classpath: Vec<PathBuf> = args
        .classpath
        .iter()
        .chain(config.run.classpath.iter())
        .cloned()
        .collect();

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut stdout = stdout.lock();
    let mut stderr = stderr.lock();
    let result = run(&artifact, &mut stdout, &mut stderr, &classpath);
    stdout.flush()?;
    let report = result?;
    if args.stats {
        print_stats(&mut stderr, &report)?;
    }
    Ok(())
}

fn print_stats(w: &mut dyn Write, report: &RunReport) -> std::io::Result<()> {
    writeln!(
        w,
        "microtasks:  {} scheduled, {} run, peak queue {}",
        report.scheduler.scheduled, report.scheduler.executed, report.scheduler.peak_len
    )?;
    writeln!(
        w,
        "prop sites:  {} hit(s), {} miss(es), {} demotion(s)",
        report.sites.hits, report.sites.misses, report.sites.demotions
    )
}
