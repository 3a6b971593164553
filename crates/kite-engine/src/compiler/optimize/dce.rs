//! Dead Code Elimination (DCE)
//!
//! Removes statements that can never run: code after `return`, `throw`,
//! `break` or `continue` in the same list, `if` branches behind a constant
//! condition, `while (false)` loops and constant expression statements.

use crate::compiler::ir::{IrExpr, IrProgram, IrStmt, IrStmtKind};

/// Dead code eliminator
#[derive(Debug, Default)]
pub struct DeadCodeEliminator;

impl DeadCodeEliminator {
    /// Create a new DCE pass
    pub fn new() -> Self {
        Self
    }

    /// Eliminate dead code in every function, returning the number of
    /// statements removed or collapsed
    pub fn eliminate(&self, program: &mut IrProgram) -> usize {
        program
            .functions
            .iter_mut()
            .map(|f| self.eliminate_body(&mut f.body))
            .sum()
    }

    fn eliminate_body(&self, body: &mut Vec<IrStmt>) -> usize {
        let mut removed = 0;
        let mut out = Vec::with_capacity(body.len());
        for mut stmt in body.drain(..) {
            for block in stmt.kind.blocks_mut() {
                removed += self.eliminate_body(block);
            }
            match stmt.kind {
                IrStmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } if condition.is_constant() => {
                    removed += 1;
                    out.extend(if truthy(&condition) { then_branch } else { else_branch });
                }
                IrStmtKind::While { ref condition, .. }
                    if condition.is_constant() && !truthy(condition) =>
                {
                    removed += 1;
                }
                IrStmtKind::Expr(ref e) if e.is_constant() => removed += 1,
                _ => out.push(stmt),
            }
        }
        // Everything after the first unconditional exit is unreachable
        if let Some(exit) = out.iter().position(IrStmt::is_exit) {
            removed += out.len() - exit - 1;
            out.truncate(exit + 1);
        }
        *body = out;
        removed
    }
}

fn truthy(c: &IrExpr) -> bool {
    match c {
        IrExpr::Undefined | IrExpr::Null => false,
        IrExpr::Bool(b) => *b,
        IrExpr::Number(n) => *n != 0.0 && !n.is_nan(),
        IrExpr::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{BindingKind, FunctionKind, IrFunction, SourcePos};

    fn s(kind: IrStmtKind) -> IrStmt {
        IrStmt::new(kind, SourcePos::default())
    }

    fn print(n: f64) -> IrStmt {
        s(IrStmtKind::Print(vec![IrExpr::Number(n)]))
    }

    fn run(body: Vec<IrStmt>) -> (Vec<IrStmt>, usize) {
        let mut program = IrProgram::new("Test");
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut f = IrFunction::new(id, "f", FunctionKind::Declaration, this);
        f.body = body;
        program.add_function(f);
        let removed = DeadCodeEliminator::new().eliminate(&mut program);
        (program.functions[0].body.clone(), removed)
    }

    #[test]
    fn test_code_after_return_is_removed() {
        let (body, removed) = run(vec![
            print(1.0),
            s(IrStmtKind::Return(None)),
            print(2.0),
            print(3.0),
        ]);
        assert_eq!(body.len(), 2);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_constant_if_is_collapsed() {
        let (body, _) = run(vec![s(IrStmtKind::If {
            condition: IrExpr::Bool(false),
            then_branch: vec![print(1.0)],
            else_branch: vec![print(2.0), print(3.0)],
        })]);
        assert_eq!(body, vec![print(2.0), print(3.0)]);
    }

    #[test]
    fn test_while_false_and_nested_bodies() {
        let (body, _) = run(vec![
            s(IrStmtKind::While {
                condition: IrExpr::Number(0.0),
                body: vec![print(1.0)],
            }),
            s(IrStmtKind::While {
                condition: IrExpr::Bool(true),
                body: vec![s(IrStmtKind::Break), print(2.0)],
            }),
        ]);
        assert_eq!(
            body,
            vec![s(IrStmtKind::While {
                condition: IrExpr::Bool(true),
                body: vec![s(IrStmtKind::Break)],
            })]
        );
    }
}
