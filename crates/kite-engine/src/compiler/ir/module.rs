//! IR Program
//!
//! Top-level container for one compile: every linked module's code ends up
//! here, with program-wide function, class, binding and global tables.

use super::{BindingId, ClassId, FunctionId, GlobalId, IrFunction, SourcePos};
use crate::ast::{DeclKind, Decorator};
use crate::compiler::bytecode::{DeclarationKind, SiteEntry};

/// What introduced a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `this` of a function
    This,
    /// Parameter
    Param,
    /// `let` / `var`
    Let,
    /// `const`
    Const,
    /// Block-level function declaration
    Function,
    /// `catch` parameter
    Catch,
    /// Compiler temporary
    Temp,
    /// Top-level class
    Class,
    /// Named import
    Import,
}

impl BindingKind {
    /// Whether assignments after initialization are rejected
    pub fn is_immutable(self) -> bool {
        matches!(self, Self::Const | Self::Class | Self::Import)
    }
}

impl From<DeclKind> for BindingKind {
    fn from(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Const => Self::Const,
            DeclKind::Let | DeclKind::Var => Self::Let,
        }
    }
}

/// A function-owned variable
#[derive(Debug, Clone)]
pub struct BindingInfo {
    /// Source name (temporaries are named `%tN`)
    pub name: String,
    /// Origin
    pub kind: BindingKind,
    /// Function whose activation owns the storage
    pub owner: FunctionId,
    /// Referenced from a nested function, so stored in a capture cell
    pub captured: bool,
}

/// A module-level binding
#[derive(Debug, Clone)]
pub struct GlobalInfo {
    /// `<module>:<name>`
    pub name: String,
    /// Origin
    pub kind: BindingKind,
}

/// One linked source module
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Canonical path
    pub path: String,
    /// Index into `IrProgram::source_files`
    pub file: u32,
}

/// A lowered class
#[derive(Debug, Clone)]
pub struct IrClass {
    /// Class id
    pub id: ClassId,
    /// Class name
    pub name: String,
    /// Parent class
    pub parent: Option<ClassId>,
    /// Fields declared by this class
    pub own_fields: Vec<String>,
    /// Instance layout: inherited fields first
    pub fields: Vec<String>,
    /// Constructor function
    pub constructor: FunctionId,
    /// Methods declared by this class
    pub own_methods: Vec<(String, FunctionId)>,
    /// Resolved method table, most derived override wins
    pub methods: Vec<(String, FunctionId)>,
    /// Module-level binding holding the class
    pub global: GlobalId,
    /// Markers applied to the class
    pub decorators: Vec<Decorator>,
    /// Declaration position
    pub pos: SourcePos,
}

/// Reflection-visible declaration of the entry module
#[derive(Debug, Clone)]
pub struct DeclarationInfo {
    /// Kind
    pub kind: DeclarationKind,
    /// Declared name
    pub name: String,
    /// Owning class for methods and constructors
    pub owner: Option<String>,
    /// Function for functions, methods and constructors
    pub function: Option<FunctionId>,
    /// Class for class declarations
    pub class: Option<ClassId>,
    /// Exported from the entry module
    pub exported: bool,
}

/// All lowered code of one compile
#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    /// Entry unit name (`MainProgram`)
    pub name: String,
    /// Functions, indexed by `FunctionId`
    pub functions: Vec<IrFunction>,
    /// Classes, indexed by `ClassId`
    pub classes: Vec<IrClass>,
    /// Function-owned bindings, indexed by `BindingId`
    pub bindings: Vec<BindingInfo>,
    /// Module-level bindings, indexed by `GlobalId`
    pub globals: Vec<GlobalInfo>,
    /// Property sites, filled by the planner
    pub sites: Vec<SiteEntry>,
    /// Source files, indexed by `SourcePos::file`
    pub source_files: Vec<String>,
    /// Modules in initialization order
    pub modules: Vec<ModuleInfo>,
    /// Reflective declarations of the entry module
    pub declarations: Vec<DeclarationInfo>,
    /// Initialization function
    pub entry: Option<FunctionId>,
    /// `$invoke`
    pub invoke: Option<FunctionId>,
    /// `$invokeClass`
    pub invoke_class: Option<FunctionId>,
}

impl IrProgram {
    /// Create an empty program
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reserve the next function id
    pub fn next_function_id(&self) -> FunctionId {
        FunctionId(self.functions.len() as u32)
    }

    /// Add a function, returning its id
    pub fn add_function(&mut self, func: IrFunction) -> FunctionId {
        let id = func.id;
        debug_assert_eq!(id.index(), self.functions.len());
        self.functions.push(func);
        id
    }

    /// Get a function
    pub fn function(&self, id: FunctionId) -> &IrFunction {
        &self.functions[id.index()]
    }

    /// Get a function mutably
    pub fn function_mut(&mut self, id: FunctionId) -> &mut IrFunction {
        &mut self.functions[id.index()]
    }

    /// Create a binding owned by `owner`
    pub fn new_binding(&mut self, name: impl Into<String>, kind: BindingKind, owner: FunctionId) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(BindingInfo {
            name: name.into(),
            kind,
            owner,
            captured: false,
        });
        id
    }

    /// Create a compiler temporary owned by `owner` and register it as a local
    pub fn new_temp(&mut self, owner: FunctionId) -> BindingId {
        let name = format!("%t{}", self.bindings.len());
        let id = self.new_binding(name, BindingKind::Temp, owner);
        self.function_mut(owner).locals.push(id);
        id
    }

    /// Get a binding
    pub fn binding(&self, id: BindingId) -> &BindingInfo {
        &self.bindings[id.index()]
    }

    /// Create a module-level binding
    pub fn new_global(&mut self, name: impl Into<String>, kind: BindingKind) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(GlobalInfo {
            name: name.into(),
            kind,
        });
        id
    }

    /// Get a class
    pub fn class(&self, id: ClassId) -> &IrClass {
        &self.classes[id.index()]
    }

    /// Find a class by its declared name
    pub fn class_by_name(&self, name: &str) -> Option<&IrClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}
