//! Kite VM
//!
//! This module provides the runtime for compiled units:
//! - Value and heap object model with shapes
//! - Runtime support library (equality, coercions, property site caches)
//! - Promises and the FIFO microtask scheduler
//! - Bytecode interpreter with async state machine resumption
//! - Unit loader

pub mod builtins;
pub mod interpreter;
pub mod loader;
pub mod object;
pub mod promise;
pub mod runtime;
pub mod scheduler;
pub mod value;

pub use interpreter::{Frame, Vm};
pub use loader::{load_program, LoadError, LoadedProgram};
pub use runtime::{PropertySites, SiteState, SiteStats};
pub use scheduler::{Scheduler, SchedulerStats};
pub use value::Value;

use crate::compiler::bytecode::DecodeError;

/// VM execution errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Exception escaped the entry point, a dispatcher call or a microtask
    #[error("Uncaught {message}{}", location.as_ref().map(|l| format!(" (at {})", l)).unwrap_or_default())]
    Uncaught {
        /// Display string of the thrown value
        message: String,
        /// `file:line` where it was thrown, when known
        location: Option<String>,
    },

    /// A promise was still rejected without a handler after the final drain
    #[error("Unhandled promise rejection: {0}")]
    UnhandledRejection(String),

    /// Code or metadata the loader should have rejected
    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    /// Instruction decoding failed
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Loading units failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Writing program output failed
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
