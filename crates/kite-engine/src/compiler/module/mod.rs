//! Multi-file module system
//!
//! Resolves relative imports, builds the import graph, orders modules for
//! one-time initialization and links imported names to exported bindings.

pub mod graph;
pub mod linker;
pub mod loader;
pub mod resolver;

pub use graph::{GraphError, ModuleGraph, ModuleNode};
pub use linker::{declared_name, link_modules, ModuleBinding, ModuleScope};
pub use loader::{load_modules, ModuleImport, ModuleSet, SourceModule};
pub use resolver::{is_relative, normalize_path, ModuleResolver, ResolveError};
