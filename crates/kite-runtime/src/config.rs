//! Project configuration (kite.toml)
//!
//! A `kite.toml` next to the entry file configures the optimizer, the front
//! end and extra unit directories for `run`. Every section and key is
//! optional.

use crate::frontend::{CommandFrontEnd, SidecarFrontEnd};
use kite_engine::compiler::{CompileOptions, OptimizationOptions};
use kite_engine::FrontEnd;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up next to the entry file
pub const CONFIG_FILE: &str = "kite.toml";

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Parsed but inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `kite.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct KiteConfig {
    /// Compiler settings
    pub compile: CompileSection,

    /// Front-end selection
    pub frontend: FrontEndSection,

    /// Runner settings
    pub run: RunSection,
}

/// `[compile]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompileSection {
    /// Fold constant expressions
    pub constant_folding: bool,

    /// Remove unreachable statements
    pub dead_code_elimination: bool,
}

impl Default for CompileSection {
    fn default() -> Self {
        Self {
            constant_folding: true,
            dead_code_elimination: true,
        }
    }
}

/// How normalized programs are obtained
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrontEndMode {
    /// Read `<file>.ast.json` written next to each source file
    #[default]
    Sidecar,
    /// Run an external command that prints the payload
    Command,
}

/// `[frontend]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FrontEndSection {
    /// Front-end kind
    pub mode: FrontEndMode,

    /// Program and leading arguments; the source path is appended
    pub command: Vec<String>,
}

/// `[run]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    /// Extra directories searched for units, after the output directory
    pub classpath: Vec<PathBuf>,
}

impl KiteConfig {
    /// Parse configuration text. Relative classpath entries are resolved
    /// against `base`.
    pub fn parse(text: &str, path: &Path, base: &Path) -> Result<Self, ConfigError> {
        let mut config: KiteConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        for entry in &mut config.run.classpath {
            if entry.is_relative() {
                *entry = base.join(&*entry);
            }
        }
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, path, base)
    }

    /// Configuration for an entry file: `explicit` when given, else the
    /// `kite.toml` in the entry's directory, else defaults
    pub fn discover(entry: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            log::debug!("using configuration {}", path.display());
            return Self::load(path);
        }
        let candidate = entry
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE);
        if candidate.is_file() {
            log::debug!("found configuration {}", candidate.display());
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend.mode == FrontEndMode::Command && self.frontend.command.is_empty() {
            return Err(ConfigError::Invalid(
                "[frontend] mode = \"command\" requires a non-empty `command`".to_string(),
            ));
        }
        Ok(())
    }

    /// Compiler options from `[compile]`
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            optimization: OptimizationOptions {
                constant_folding: self.compile.constant_folding,
                dead_code_elimination: self.compile.dead_code_elimination,
            },
        }
    }

    /// Front end selected by `[frontend]`
    pub fn front_end(&self) -> Box<dyn FrontEnd> {
        match self.frontend.mode {
            FrontEndMode::Sidecar => Box::new(SidecarFrontEnd),
            FrontEndMode::Command => Box::new(CommandFrontEnd::new(self.frontend.command.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KiteConfig::parse("", Path::new("kite.toml"), Path::new("/p")).unwrap();
        assert_eq!(config, KiteConfig::default());
        assert!(config.compile.constant_folding);
        assert_eq!(config.frontend.mode, FrontEndMode::Sidecar);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
[compile]
constant_folding = false

[frontend]
mode = "command"
command = ["node", "bridge.cjs"]

[run]
classpath = ["lib", "/abs/units"]
"#;
        let config = KiteConfig::parse(text, Path::new("/p/kite.toml"), Path::new("/p")).unwrap();
        assert!(!config.compile.constant_folding);
        assert!(config.compile.dead_code_elimination);
        assert_eq!(config.frontend.mode, FrontEndMode::Command);
        assert_eq!(config.frontend.command, vec!["node", "bridge.cjs"]);
        assert_eq!(
            config.run.classpath,
            vec![PathBuf::from("/p/lib"), PathBuf::from("/abs/units")]
        );
        assert!(!config.compile_options().optimization.constant_folding);
    }

    #[test]
    fn test_command_mode_without_command_is_invalid() {
        let err = KiteConfig::parse("[frontend]\nmode = \"command\"\n", Path::new("kite.toml"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = KiteConfig::parse("[compile]\ninline = true\n", Path::new("kite.toml"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_discovery_next_to_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[run]\nclasspath = [\"units\"]\n").unwrap();
        let config = KiteConfig::discover(&dir.path().join("main.ts"), None).unwrap();
        assert_eq!(config.run.classpath, vec![dir.path().join("units")]);

        let other = tempfile::tempdir().unwrap();
        let config = KiteConfig::discover(&other.path().join("main.ts"), None).unwrap();
        assert_eq!(config, KiteConfig::default());
    }
}
