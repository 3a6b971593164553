//! IR Optimization Passes
//!
//! Tree-level clean-ups run after lowering and before the async transform.
//! Both passes preserve evaluation order and every observable effect.

mod constant_fold;
mod dce;

pub use constant_fold::ConstantFolder;
pub use dce::DeadCodeEliminator;

use crate::compiler::ir::IrProgram;
use serde::{Deserialize, Serialize};

/// Per-pass switches, as read from the `[compile]` configuration table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    /// Fold literal arithmetic, comparisons, concatenation and unary operators
    pub constant_folding: bool,
    /// Remove unreachable statements and collapse constant branches
    pub dead_code_elimination: bool,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            constant_folding: true,
            dead_code_elimination: true,
        }
    }
}

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// No optimizations
    None,
    /// Constant folding and dead code elimination
    #[default]
    Basic,
    /// Basic, plus a second folding round after DCE
    Full,
}

impl OptLevel {
    /// Parse a level name (`none`, `basic`, `full`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "0" => Some(Self::None),
            "basic" | "1" => Some(Self::Basic),
            "full" | "2" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Optimizer that runs the passes selected by a level
pub struct Optimizer {
    level: OptLevel,
    constant_folding: bool,
    dead_code_elimination: bool,
}

impl Optimizer {
    /// Create a new optimizer with the given level
    pub fn new(level: OptLevel) -> Self {
        let enabled = level != OptLevel::None;
        Self {
            level,
            constant_folding: enabled,
            dead_code_elimination: enabled,
        }
    }

    /// Create a basic-level optimizer running only the selected passes
    pub fn from_options(options: &OptimizationOptions) -> Self {
        Self {
            level: OptLevel::Basic,
            constant_folding: options.constant_folding,
            dead_code_elimination: options.dead_code_elimination,
        }
    }

    /// Create an optimizer with basic optimizations
    pub fn basic() -> Self {
        Self::new(OptLevel::Basic)
    }

    /// Run all passes on the program
    pub fn optimize(&self, program: &mut IrProgram) -> OptStats {
        let mut stats = OptStats::default();
        if self.level == OptLevel::None {
            return stats;
        }

        let folder = ConstantFolder::new();
        if self.constant_folding {
            stats.constants_folded += folder.fold(program);
        }

        if self.dead_code_elimination {
            stats.statements_removed += DeadCodeEliminator::new().eliminate(program);
        }

        if self.level == OptLevel::Full && self.constant_folding {
            stats.constants_folded += folder.fold(program);
        }
        log::debug!(
            "optimizer: {} constant(s) folded, {} statement(s) removed",
            stats.constants_folded,
            stats.statements_removed
        );
        stats
    }
}

/// Statistics about optimizations performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStats {
    /// Expressions replaced by a constant
    pub constants_folded: usize,
    /// Statements removed or collapsed
    pub statements_removed: usize,
}
