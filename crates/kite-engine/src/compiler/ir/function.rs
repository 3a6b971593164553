//! IR Functions

use super::{BindingId, ClassId, FunctionId, IrStmt, SourcePos};
use crate::ast::Decorator;

/// Where a function comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Program initialization: every module's top-level code
    Entry,
    /// Generated reflective dispatcher
    Invoke,
    /// `function f() {}`
    Declaration,
    /// Function expression or arrow
    Expression,
    /// Class method
    Method,
    /// Class constructor (explicit or synthesized)
    Constructor,
}

/// An IR function
#[derive(Debug, Clone)]
pub struct IrFunction {
    /// Function id
    pub id: FunctionId,
    /// Function name (empty for anonymous expressions)
    pub name: String,
    /// Origin
    pub kind: FunctionKind,
    /// `this` pseudo-binding, always slot 0
    pub this_binding: BindingId,
    /// Parameter bindings, slots 1..=n
    pub params: Vec<BindingId>,
    /// Declared parameter names
    pub param_names: Vec<String>,
    /// Every other binding owned by the function
    pub locals: Vec<BindingId>,
    /// Environment record: outer bindings this function reaches, in
    /// environment index order
    pub captures: Vec<BindingId>,
    /// `this` is inherited from the defining scope
    pub lexical_this: bool,
    /// Declared `async`
    pub is_async: bool,
    /// Number of async states, set by the async transform
    pub state_count: u16,
    /// Lexically enclosing function
    pub parent: Option<FunctionId>,
    /// Owning class for methods and constructors
    pub class: Option<ClassId>,
    /// Body
    pub body: Vec<IrStmt>,
    /// Declaration position
    pub pos: SourcePos,
    /// Markers applied to the declaration
    pub decorators: Vec<Decorator>,
    /// Markers applied to each parameter
    pub param_decorators: Vec<Vec<Decorator>>,
}

impl IrFunction {
    /// Create an empty function
    pub fn new(id: FunctionId, name: impl Into<String>, kind: FunctionKind, this_binding: BindingId) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            this_binding,
            params: Vec::new(),
            param_names: Vec::new(),
            locals: Vec::new(),
            captures: Vec::new(),
            lexical_this: false,
            is_async: false,
            state_count: 0,
            parent: None,
            class: None,
            body: Vec::new(),
            pos: SourcePos::default(),
            decorators: Vec::new(),
            param_decorators: Vec::new(),
        }
    }

    /// Index of a binding in the environment record
    pub fn env_index(&self, binding: BindingId) -> Option<usize> {
        self.captures.iter().position(|&b| b == binding)
    }

    /// Display name used in units and diagnostics
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("<anonymous#{}>", self.id.0)
        } else {
            self.name.clone()
        }
    }
}
