//! IR statements

use super::{BindingId, ClassId, IrExpr};

/// Source position of a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePos {
    /// Index into `IrProgram::source_files`
    pub file: u32,
    /// Line (1-based)
    pub line: u32,
    /// Column (1-based)
    pub column: u32,
}

/// `catch (binding) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Binding receiving the thrown value
    pub binding: Option<BindingId>,
    /// Handler body
    pub body: Vec<IrStmt>,
}

/// IR statement
#[derive(Debug, Clone, PartialEq)]
pub struct IrStmt {
    /// Statement kind
    pub kind: IrStmtKind,
    /// Source position
    pub pos: SourcePos,
}

impl IrStmt {
    /// Create a statement
    pub fn new(kind: IrStmtKind, pos: SourcePos) -> Self {
        Self { kind, pos }
    }

    /// Whether control never continues to the next statement
    pub fn is_exit(&self) -> bool {
        matches!(
            self.kind,
            IrStmtKind::Return(_)
                | IrStmtKind::Throw(_)
                | IrStmtKind::Break
                | IrStmtKind::Continue
        )
    }
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum IrStmtKind {
    /// Evaluate and discard
    Expr(IrExpr),
    /// Initialize a function-owned binding at its declaration
    Let {
        /// Declared binding
        binding: BindingId,
        /// Initial value (undefined when absent)
        value: Option<IrExpr>,
    },
    /// Lexical block; captured `bindings` get a fresh cell on every entry
    Block {
        /// Bindings declared directly in the block
        bindings: Vec<BindingId>,
        /// Statements
        body: Vec<IrStmt>,
    },
    /// `if`
    If {
        /// Condition
        condition: IrExpr,
        /// Then branch
        then_branch: Vec<IrStmt>,
        /// Else branch
        else_branch: Vec<IrStmt>,
    },
    /// `while`
    While {
        /// Condition
        condition: IrExpr,
        /// Body
        body: Vec<IrStmt>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return`
    Return(Option<IrExpr>),
    /// `throw`
    Throw(IrExpr),
    /// `try`
    Try {
        /// Protected body
        body: Vec<IrStmt>,
        /// Handler
        catch: Option<CatchClause>,
        /// Finalizer
        finally: Option<Vec<IrStmt>>,
    },
    /// Console output of the values joined by spaces
    Print(Vec<IrExpr>),
    /// Run the parent constructor on `this`
    SuperCall {
        /// Parent class
        class: ClassId,
        /// Arguments
        args: Vec<IrExpr>,
    },
    /// Suspension point produced by the async transform
    Await {
        /// Receives the settled value
        target: BindingId,
        /// Awaited operand (contains no `await`)
        operand: IrExpr,
        /// State resumed after settlement
        state: u16,
    },
}

impl IrStmtKind {
    /// Expressions evaluated directly by this statement (not by nested
    /// statements), mutably
    pub fn exprs_mut(&mut self) -> Vec<&mut IrExpr> {
        match self {
            IrStmtKind::Expr(e) | IrStmtKind::Throw(e) => vec![e],
            IrStmtKind::Let { value, .. } | IrStmtKind::Return(value) => value.iter_mut().collect(),
            IrStmtKind::If { condition, .. } | IrStmtKind::While { condition, .. } => {
                vec![condition]
            }
            IrStmtKind::Print(values) | IrStmtKind::SuperCall { args: values, .. } => {
                values.iter_mut().collect()
            }
            IrStmtKind::Await { operand, .. } => vec![operand],
            _ => Vec::new(),
        }
    }

    /// Nested statement lists, mutably
    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<IrStmt>> {
        match self {
            IrStmtKind::Block { body, .. } | IrStmtKind::While { body, .. } => vec![body],
            IrStmtKind::If {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch, else_branch],
            IrStmtKind::Try {
                body,
                catch,
                finally,
            } => {
                let mut out = vec![body];
                if let Some(c) = catch {
                    out.push(&mut c.body);
                }
                if let Some(f) = finally {
                    out.push(f);
                }
                out
            }
            _ => Vec::new(),
        }
    }
}

/// Visit every statement of a body, depth first
pub fn walk_stmts_mut(body: &mut [IrStmt], f: &mut dyn FnMut(&mut IrStmt)) {
    for stmt in body.iter_mut() {
        f(stmt);
        for block in stmt.kind.blocks_mut() {
            walk_stmts_mut(block, f);
        }
    }
}
