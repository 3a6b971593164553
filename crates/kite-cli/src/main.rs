//! Kite command-line tool
//!
//! `compile` turns front-end payloads into unit files, `run` compiles and
//! executes an entry file, `inspect` decodes a unit file.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use kite_runtime::RuntimeError;
use output::StyledOutput;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kite")]
#[command(about = "Kite compiler and runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Colorize output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an entry file and its imports to unit files
    Compile {
        /// Entry source file
        entry: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// Configuration file (default: kite.toml next to the entry)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compile and run an entry file
    Run {
        /// Entry source file
        entry: PathBuf,
        /// Output directory for the compiled units
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// Extra directories searched for units
        #[arg(long = "classpath", value_delimiter = ',')]
        classpath: Vec<PathBuf>,
        /// Configuration file (default: kite.toml next to the entry)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print scheduler and property cache counters to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Print the contents of a unit file
    Inspect {
        /// Unit file (`.kbc`)
        unit: PathBuf,
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let choice = output::resolve_color_choice(cli.color.as_deref());
    if let Err(e) = output::init_logger(output::level_filter(cli.verbose, cli.quiet), choice) {
        eprintln!("Error: {}", e);
    }
    let mut out = StyledOutput::new(choice);

    let result = match &cli.command {
        Commands::Compile {
            entry,
            out_dir,
            config,
        } => commands::compile::execute(entry, out_dir, config.as_deref(), &mut out),

        Commands::Run {
            entry,
            out_dir,
            classpath,
            config,
            stats,
        } => commands::run::execute(commands::run::RunArgs {
            entry,
            out_dir,
            classpath,
            config: config.as_deref(),
            stats: *stats,
        }),

        Commands::Inspect { unit, json } => commands::inspect::execute(unit, *json, &mut out),
    };

    if let Err(e) = result {
        report(&e, &mut out);
        std::process::exit(1);
    }
}

fn report(error: &anyhow::Error, out: &mut StyledOutput) {
    out.stderr_error(&format!("{:#}", error));
    if let Some(RuntimeError::Compile(diagnostic)) = error.downcast_ref::<RuntimeError>() {
        if let Some(guidance) = &diagnostic.guidance {
            out.stderr_hint(guidance);
        }
    }
}
