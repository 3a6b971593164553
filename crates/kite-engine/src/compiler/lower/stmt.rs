//! Statement Lowering
//!
//! Converts AST statements to IR statements.

use super::Lowerer;
use crate::ast::{Expr, Stmt, StmtKind};
use crate::compiler::error::{CompileResult, DiagnosticCode};
use crate::compiler::ir::{BindingKind, CatchClause, IrExpr, IrStmt, IrStmtKind, Var};

impl<'a> Lowerer<'a> {
    /// Lower a statement of the module body
    pub(super) fn lower_top_level(&mut self, stmt: &Stmt) -> CompileResult<Vec<IrStmt>> {
        let pos = self.pos(stmt.line, stmt.column);
        match &stmt.kind {
            StmtKind::Variable {
                name, expression, ..
            } => {
                let Some(binding) = self.module.get(name) else {
                    return Err(self.error(
                        DiagnosticCode::Unresolved,
                        format!("`{}` is not linked", name),
                        stmt.line,
                        stmt.column,
                    ));
                };
                let value = self.lower_optional(expression.as_ref())?;
                Ok(vec![IrStmt::new(
                    IrStmtKind::Expr(IrExpr::Store(Var::Global(binding.global), value.boxed())),
                    pos,
                )])
            }
            StmtKind::Class { declaration } => self.lower_class(stmt, declaration),
            StmtKind::Export { declaration } => self.lower_top_level(declaration),
            StmtKind::Import { .. } | StmtKind::ExportNamed { .. } => Ok(Vec::new()),
            StmtKind::Return { .. } => Err(self.error(
                DiagnosticCode::UnsupportedStatement,
                "`return` outside a function",
                stmt.line,
                stmt.column,
            )),
            _ => self.lower_stmt(stmt),
        }
    }

    /// Lower a statement inside a function or block
    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<Vec<IrStmt>> {
        let pos = self.pos(stmt.line, stmt.column);
        let kind = match &stmt.kind {
            StmtKind::Variable {
                name, expression, ..
            } => {
                let value = match expression {
                    Some(e) => Some(self.lower_expr(e)?),
                    None => None,
                };
                let Some(binding) = self.scopes.resolve(self.program, name) else {
                    return Err(self.error(
                        DiagnosticCode::Unresolved,
                        format!("`{}` is not declared in this block", name),
                        stmt.line,
                        stmt.column,
                    ));
                };
                IrStmtKind::Let { binding, value }
            }
            StmtKind::Assign { target, expression } => {
                IrStmtKind::Expr(self.lower_assignment(target, "=", expression)?)
            }
            // Hoisted by the enclosing block
            StmtKind::Function { .. } => return Ok(Vec::new()),
            StmtKind::Class { declaration } => {
                return Err(self
                    .error(
                        DiagnosticCode::ClassNested,
                        format!("class `{}` must be declared at module top level", declaration.name),
                        stmt.line,
                        stmt.column,
                    )
                    .with_guidance("Move the class declaration to the top level of the module"))
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => IrStmtKind::If {
                condition: self.lower_expr(condition)?,
                then_branch: self.lower_scoped(then_block, Vec::new())?,
                else_branch: self.lower_scoped(else_block, Vec::new())?,
            },
            StmtKind::While { condition, body } => {
                let condition = self.lower_expr(condition)?;
                self.scopes.enter_loop();
                let body = self.lower_scoped(body, Vec::new());
                self.scopes.exit_loop();
                IrStmtKind::While {
                    condition,
                    body: body?,
                }
            }
            StmtKind::For | StmtKind::ForOf | StmtKind::ForIn => {
                return Err(self
                    .error(
                        DiagnosticCode::UnsupportedFor,
                        format!("`{}` is not supported", stmt.kind_name()),
                        stmt.line,
                        stmt.column,
                    )
                    .with_guidance("Rewrite the loop as a `while` loop"))
            }
            StmtKind::Try {
                try_block,
                catch_binding,
                catch_block,
                finally_block,
            } => {
                let body = self.lower_scoped(try_block, Vec::new())?;
                let catch = match catch_block {
                    Some(block) => Some(self.lower_catch(catch_binding.as_deref(), block, stmt)?),
                    None => None,
                };
                let finally = match finally_block {
                    Some(block) => Some(self.lower_scoped(block, Vec::new())?),
                    None => None,
                };
                IrStmtKind::Try {
                    body,
                    catch,
                    finally,
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if !self.scopes.in_loop() {
                    return Err(self.error(
                        DiagnosticCode::BreakOutsideLoop,
                        format!("`{}` outside a loop", stmt.kind_name()),
                        stmt.line,
                        stmt.column,
                    ));
                }
                if matches!(stmt.kind, StmtKind::Break) {
                    IrStmtKind::Break
                } else {
                    IrStmtKind::Continue
                }
            }
            StmtKind::Block { statements } => {
                return self.lower_scoped(statements, Vec::new());
            }
            StmtKind::SuperCall { .. } => {
                return Err(self.error(
                    DiagnosticCode::SuperMisuse,
                    "`super(..)` is only allowed as the first statement of a derived constructor",
                    stmt.line,
                    stmt.column,
                ))
            }
            StmtKind::Return { expression } => {
                if self.scopes.depth() <= 1 {
                    return Err(self.error(
                        DiagnosticCode::UnsupportedStatement,
                        "`return` outside a function",
                        stmt.line,
                        stmt.column,
                    ));
                }
                match expression {
                    Some(e) => IrStmtKind::Return(Some(self.lower_expr(e)?)),
                    None => IrStmtKind::Return(None),
                }
            }
            StmtKind::Throw { expression } => IrStmtKind::Throw(self.lower_expr(expression)?),
            StmtKind::ConsoleLog { expression } => {
                IrStmtKind::Print(vec![self.lower_expr(expression)?])
            }
            StmtKind::Expression { expression } => IrStmtKind::Expr(self.lower_expr(expression)?),
            StmtKind::Import { .. } | StmtKind::Export { .. } | StmtKind::ExportNamed { .. } => {
                return Err(self.error(
                    DiagnosticCode::UnsupportedStatement,
                    format!("`{}` is only allowed at module top level", stmt.kind_name()),
                    stmt.line,
                    stmt.column,
                ))
            }
            StmtKind::Unsupported { .. } | StmtKind::Unknown => {
                return Err(self.error(
                    DiagnosticCode::UnsupportedStatement,
                    format!("`{}` is not supported", stmt.kind_name()),
                    stmt.line,
                    stmt.column,
                ))
            }
        };
        Ok(vec![IrStmt::new(kind, pos)])
    }

    fn lower_catch(
        &mut self,
        binding: Option<&str>,
        block: &[Stmt],
        stmt: &Stmt,
    ) -> CompileResult<CatchClause> {
        self.scopes.push_block();
        let result = self.lower_catch_body(binding, block, stmt);
        self.scopes.pop_block();
        result
    }

    fn lower_catch_body(
        &mut self,
        binding: Option<&str>,
        block: &[Stmt],
        stmt: &Stmt,
    ) -> CompileResult<CatchClause> {
        let binding = match binding {
            Some(name) => {
                let id = self.new_local(name, BindingKind::Catch);
                if !self.scopes.declare(name, id) {
                    return Err(self.error(
                        DiagnosticCode::DuplicateDeclaration,
                        format!("`{}` is declared more than once", name),
                        stmt.line,
                        stmt.column,
                    ));
                }
                Some(id)
            }
            None => None,
        };
        let body = self.lower_scoped(block, Vec::new())?;
        Ok(CatchClause { binding, body })
    }

    /// Lower an optional initializer, defaulting to `undefined`
    pub(super) fn lower_optional(&mut self, expr: Option<&Expr>) -> CompileResult<IrExpr> {
        match expr {
            Some(e) => self.lower_expr(e),
            None => Ok(IrExpr::Undefined),
        }
    }
}
