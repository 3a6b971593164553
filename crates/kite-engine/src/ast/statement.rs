//! Statement nodes

use super::{ClassNode, Expr, FunctionNode};
use serde::{Deserialize, Serialize};

/// A statement with its source position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    /// Statement kind and payload
    #[serde(flatten)]
    pub kind: StmtKind,
    /// Source line (1-based)
    pub line: u32,
    /// Source column (1-based)
    pub column: u32,
}

impl Stmt {
    /// Create a statement without position
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            line: 0,
            column: 0,
        }
    }

    /// Set the source position
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Wire name of the statement kind, used in diagnostics
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            StmtKind::Variable { .. } => "VariableDeclaration",
            StmtKind::Assign { .. } => "AssignmentStatement",
            StmtKind::Function { .. } => "FunctionDeclarationStatement",
            StmtKind::Class { .. } => "ClassDeclarationStatement",
            StmtKind::If { .. } => "IfStatement",
            StmtKind::While { .. } => "WhileStatement",
            StmtKind::For => "ForStatement",
            StmtKind::ForOf => "ForOfStatement",
            StmtKind::ForIn => "ForInStatement",
            StmtKind::Try { .. } => "TryStatement",
            StmtKind::Break => "BreakStatement",
            StmtKind::Continue => "ContinueStatement",
            StmtKind::Block { .. } => "BlockStatement",
            StmtKind::SuperCall { .. } => "SuperCallStatement",
            StmtKind::Return { .. } => "ReturnStatement",
            StmtKind::Throw { .. } => "ThrowStatement",
            StmtKind::ConsoleLog { .. } => "ConsoleLogStatement",
            StmtKind::Expression { .. } => "ExpressionStatement",
            StmtKind::Import { .. } => "ImportDeclaration",
            StmtKind::Export { .. } => "ExportDeclaration",
            StmtKind::ExportNamed { .. } => "ExportNamedDeclaration",
            StmtKind::Unsupported { name } => name,
            StmtKind::Unknown => "Unknown",
        }
    }
}

/// `let`, `const` or `var`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    /// Block-scoped, reassignable
    #[default]
    Let,
    /// Block-scoped, single assignment
    Const,
    /// Treated like `let`
    Var,
}

/// One `{ imported as local }` entry of an import declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Name exported by the target module
    pub imported: String,
    /// Local binding name
    pub local: String,
}

/// One `{ local as exported }` entry of an export list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpecifier {
    /// Local binding name
    pub local: String,
    /// Exported name
    pub exported: String,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum StmtKind {
    /// `let x = e;`
    #[serde(rename = "VariableDeclaration")]
    Variable {
        /// Bound name
        name: String,
        /// Initializer
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression: Option<Expr>,
        /// Declaration keyword
        #[serde(default)]
        declaration_kind: DeclKind,
    },

    /// `target = e;`
    #[serde(rename = "AssignmentStatement")]
    Assign {
        /// Variable, member or element target
        target: Expr,
        /// Assigned value
        expression: Expr,
    },

    /// `function f() {}`
    #[serde(rename = "FunctionDeclarationStatement")]
    Function {
        /// The function
        declaration: FunctionNode,
    },

    /// `class C {}`
    #[serde(rename = "ClassDeclarationStatement")]
    Class {
        /// The class
        declaration: ClassNode,
    },

    /// `if (c) {} else {}`
    #[serde(rename = "IfStatement")]
    If {
        /// Condition
        condition: Expr,
        /// Then branch
        #[serde(default)]
        then_block: Vec<Stmt>,
        /// Else branch (empty when absent)
        #[serde(default)]
        else_block: Vec<Stmt>,
    },

    /// `while (c) {}`
    #[serde(rename = "WhileStatement")]
    While {
        /// Condition
        condition: Expr,
        /// Loop body
        #[serde(default)]
        body: Vec<Stmt>,
    },

    /// `for (;;)`, never compiled
    #[serde(rename = "ForStatement")]
    For,

    /// `for (x of xs)`, never compiled
    #[serde(rename = "ForOfStatement")]
    ForOf,

    /// `for (k in o)`, never compiled
    #[serde(rename = "ForInStatement")]
    ForIn,

    /// `try {} catch (e) {} finally {}`
    #[serde(rename = "TryStatement")]
    Try {
        /// Protected block
        #[serde(default)]
        try_block: Vec<Stmt>,
        /// Catch parameter name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catch_binding: Option<String>,
        /// Catch block, if present
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catch_block: Option<Vec<Stmt>>,
        /// Finally block, if present
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finally_block: Option<Vec<Stmt>>,
    },

    /// `break;`
    #[serde(rename = "BreakStatement")]
    Break,

    /// `continue;`
    #[serde(rename = "ContinueStatement")]
    Continue,

    /// `{ ... }`
    #[serde(rename = "BlockStatement")]
    Block {
        /// Block statements
        #[serde(default)]
        statements: Vec<Stmt>,
    },

    /// `super(...)` in a constructor
    #[serde(rename = "SuperCallStatement")]
    SuperCall {
        /// Arguments
        #[serde(default)]
        arguments: Vec<Expr>,
    },

    /// `return e;`
    #[serde(rename = "ReturnStatement")]
    Return {
        /// Returned value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression: Option<Expr>,
    },

    /// `throw e;`
    #[serde(rename = "ThrowStatement")]
    Throw {
        /// Thrown value
        expression: Expr,
    },

    /// `console.log(e);`
    #[serde(rename = "ConsoleLogStatement")]
    ConsoleLog {
        /// Printed value
        expression: Expr,
    },

    /// `e;`
    #[serde(rename = "ExpressionStatement")]
    Expression {
        /// Evaluated expression
        expression: Expr,
    },

    /// `import { a } from "./m";`
    #[serde(rename = "ImportDeclaration")]
    Import {
        /// Module specifier
        source: String,
        /// Named bindings
        #[serde(default)]
        named_bindings: Vec<ImportBinding>,
        /// `import d from ..`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_binding: Option<String>,
        /// `import * as ns from ..`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace_binding: Option<String>,
    },

    /// `export <declaration>`
    #[serde(rename = "ExportDeclaration")]
    Export {
        /// Exported declaration
        declaration: Box<Stmt>,
    },

    /// `export { a, b as c };`
    #[serde(rename = "ExportNamedDeclaration")]
    ExportNamed {
        /// Export list
        #[serde(default)]
        specifiers: Vec<ExportSpecifier>,
    },

    /// Statement kind outside the supported subset
    #[serde(rename = "Unsupported")]
    Unsupported {
        /// Original node kind
        #[serde(rename = "unsupportedKind")]
        name: String,
    },

    /// Placeholder produced while decoding an unknown kind
    #[serde(other, skip_serializing)]
    Unknown,
}
