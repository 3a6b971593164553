//! Kite Runtime
//!
//! Binds the Kite engine with front-end adapters and project configuration:
//! - [`compile`] / [`compile_with_config`] turn an entry file into units
//! - [`run`] loads and executes a compiled artifact
//! - [`SidecarFrontEnd`] and [`CommandFrontEnd`] supply normalized programs
//! - [`KiteConfig`] reads `kite.toml`

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod compile;
pub mod config;
pub mod error;
pub mod frontend;
pub mod run;

pub use compile::{compile, compile_with_config};
pub use config::{ConfigError, FrontEndMode, KiteConfig, CONFIG_FILE};
pub use error::RuntimeError;
pub use frontend::{sidecar_path, CommandFrontEnd, SidecarFrontEnd, SIDECAR_SUFFIX};
pub use run::{load, run, run_units, RunReport};

pub use kite_engine::compiler::CompiledArtifact;
