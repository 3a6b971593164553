//! Kite Engine
//!
//! This crate provides the Kite compiler backend and virtual machine:
//! - **AST**: the normalized program model handed over by a front end (`ast` module)
//! - **Front ends**: the seam that produces normalized trees (`frontend` module)
//! - **Compiler**: module linking, lowering, the async transform, property
//!   site planning, optimizations and verified binary units (`compiler` module)
//! - **VM**: loader, interpreter, promises and the microtask scheduler (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use kite_engine::{compile, load_program, Vm};
//!
//! let artifact = compile(Path::new("app/main.ts"), Path::new("out"), &front_end)?;
//! let program = load_program(&artifact.output_dir, &artifact.entry_unit, &[])?;
//! let mut stdout = std::io::stdout();
//! let mut stderr = std::io::stderr();
//! Vm::new(program, &mut stdout, &mut stderr).run_entry()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Normalized program model
pub mod ast;

/// Front-end seam and payload decoding
pub mod frontend;

/// Compiler module: linking, lowering, transforms and code generation
pub mod compiler;

/// VM module: loader, interpreter and scheduler
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use compiler::{
    compile, entry_unit_name, CompileError, CompileOptions, CompileResult, CompiledArtifact,
    Compiler, DiagnosticCode, GeneratedProgram, OptimizationOptions,
};
pub use frontend::{program_from_payload, FrontEnd, StaticFrontEnd};
pub use vm::{load_program, LoadError, LoadedProgram, Value, Vm, VmError, VmResult};
