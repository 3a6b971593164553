//! Runtime error types.

use crate::config::ConfigError;
use kite_engine::compiler::CompileError;
use kite_engine::vm::{LoadError, VmError};

/// Errors that can occur during compilation, loading, or execution.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Compilation failed
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// Configuration could not be loaded
    #[error("KITE-CONFIG: {0}")]
    Config(#[from] ConfigError),

    /// A unit of the program is missing
    #[error("KITE-RUN-UNIT-NOT-FOUND: {0}")]
    UnitNotFound(String),

    /// A classpath entry is not a directory
    #[error("KITE-RUN-CLASSPATH: {0}")]
    Classpath(String),

    /// Units are unreadable, corrupted or rejected by the verifier
    #[error("KITE-RUN-LOAD: {0}")]
    Load(String),

    /// An exception escaped the program
    #[error("KITE-RUN-UNCAUGHT: {0}")]
    Uncaught(String),

    /// A rejected promise was never handled
    #[error("KITE-RUN-UNHANDLED-REJECTION: {0}")]
    UnhandledRejection(String),

    /// Writing program output failed
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Stable code of the error
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::Compile(error) => error.code_str(),
            RuntimeError::Config(_) => "KITE-CONFIG",
            RuntimeError::UnitNotFound(_) => "KITE-RUN-UNIT-NOT-FOUND",
            RuntimeError::Classpath(_) => "KITE-RUN-CLASSPATH",
            RuntimeError::Load(_) => "KITE-RUN-LOAD",
            RuntimeError::Uncaught(_) => "KITE-RUN-UNCAUGHT",
            RuntimeError::UnhandledRejection(_) => "KITE-RUN-UNHANDLED-REJECTION",
            RuntimeError::Io(_) => "KITE-IO",
        }
    }
}

impl From<LoadError> for RuntimeError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::NotFound { .. } => RuntimeError::UnitNotFound(error.to_string()),
            other => RuntimeError::Load(other.to_string()),
        }
    }
}

impl From<VmError> for RuntimeError {
    fn from(error: VmError) -> Self {
        match error {
            VmError::Uncaught { .. } => RuntimeError::Uncaught(error.to_string()),
            VmError::UnhandledRejection(reason) => RuntimeError::UnhandledRejection(reason),
            VmError::Load(load) => load.into(),
            VmError::Output(io) => RuntimeError::Io(io),
            VmError::InvalidProgram(_) | VmError::Decode(_) => RuntimeError::Load(error.to_string()),
        }
    }
}
