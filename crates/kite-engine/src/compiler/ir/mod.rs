//! Intermediate Representation (IR) for Kite
//!
//! A structured, tree-shaped representation between the normalized AST and
//! bytecode. Names are already resolved: every variable access refers either
//! to a `BindingId` (function-owned storage whose stack-or-cell placement is
//! decided at code generation) or to a module-level `GlobalId`.
//!
//! # Structure
//!
//! - `IrProgram` - all functions, classes, bindings and globals of one compile
//! - `IrFunction` - a function with its parameters, environment and body
//! - `IrStmt` / `IrExpr` - statements and expressions

pub mod expr;
pub mod function;
pub mod module;
pub mod stmt;

pub use expr::{BinaryOp, IrExpr, LogicalOp, UnaryOp, Var};
pub use function::{FunctionKind, IrFunction};
pub use module::{
    BindingInfo, BindingKind, DeclarationInfo, GlobalInfo, IrClass, IrProgram, ModuleInfo,
};
pub use stmt::{walk_stmts_mut, CatchClause, IrStmt, IrStmtKind, SourcePos};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Index into the owning table
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

id_type!(
    /// Function in `IrProgram::functions`
    FunctionId
);
id_type!(
    /// Class in `IrProgram::classes`
    ClassId
);
id_type!(
    /// Function-owned variable in `IrProgram::bindings`
    BindingId
);
id_type!(
    /// Module-level binding in `IrProgram::globals`
    GlobalId
);
id_type!(
    /// Property access site
    SiteId
);

impl SiteId {
    /// Placeholder until the property cache planner numbers the site
    pub const UNPLANNED: SiteId = SiteId(u32::MAX);
}
