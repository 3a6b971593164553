//! Async state machine transform
//!
//! Rewrites every async function so each `await` becomes a statement-level
//! suspension point. Operands evaluated before an `await` are spilled into
//! temporaries (locals, which survive suspension) so evaluation order is
//! unchanged and the operand stack is empty whenever the function suspends.
//! Each suspension point gets the next state number; state 0 is the entry.

use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{
    walk_stmts_mut, BinaryOp, BindingId, BindingKind, FunctionId, FunctionKind, IrExpr, IrProgram,
    IrStmt, IrStmtKind, LogicalOp, SourcePos, UnaryOp, Var,
};
use std::path::Path;

/// Transform every async function of `program`
pub fn transform_async(program: &mut IrProgram) -> CompileResult<()> {
    for index in 0..program.functions.len() {
        let id = FunctionId(index as u32);
        if program.function(id).kind == FunctionKind::Entry {
            let suspends = body_has_await(&mut program.function_mut(id).body);
            program.function_mut(id).is_async = suspends;
        }
        if !program.function(id).is_async {
            continue;
        }

        let body = std::mem::take(&mut program.function_mut(id).body);
        let mut machine = StateMachine {
            program: &mut *program,
            owner: id,
            next_state: 1,
        };
        let body = machine.transform_body(body)?;
        let states = machine.next_state;
        if states > u16::MAX as u32 {
            return Err(CompileError::new(
                DiagnosticCode::Limit,
                format!("`{}` has too many await points", program.function(id).display_name()),
            ));
        }
        let function = program.function_mut(id);
        function.body = body;
        function.state_count = states as u16;
        log::trace!("{}: {} async state(s)", function.display_name(), states);
    }
    Ok(())
}

fn body_has_await(body: &mut [IrStmt]) -> bool {
    let mut found = false;
    walk_stmts_mut(body, &mut |stmt| {
        found |= stmt.kind.exprs_mut().iter().any(|e| e.contains_await());
    });
    found
}

struct StateMachine<'p> {
    program: &'p mut IrProgram,
    owner: FunctionId,
    next_state: u32,
}

impl<'p> StateMachine<'p> {
    fn transform_body(&mut self, body: Vec<IrStmt>) -> CompileResult<Vec<IrStmt>> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            self.transform_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn transform_stmt(&mut self, stmt: IrStmt, out: &mut Vec<IrStmt>) -> CompileResult<()> {
        let pos = stmt.pos;
        let kind = match stmt.kind {
            IrStmtKind::Expr(e) => IrStmtKind::Expr(self.spill(e, pos, out)),
            IrStmtKind::Let { binding, value } => IrStmtKind::Let {
                binding,
                value: value.map(|v| self.spill(v, pos, out)),
            },
            IrStmtKind::Return(value) => IrStmtKind::Return(value.map(|v| self.spill(v, pos, out))),
            IrStmtKind::Throw(e) => IrStmtKind::Throw(self.spill(e, pos, out)),
            IrStmtKind::Print(values) => IrStmtKind::Print(self.spill_list(values, pos, out)),
            IrStmtKind::SuperCall { class, args } => IrStmtKind::SuperCall {
                class,
                args: self.spill_list(args, pos, out),
            },
            IrStmtKind::Block { bindings, body } => IrStmtKind::Block {
                bindings,
                body: self.transform_body(body)?,
            },
            IrStmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(&condition, pos)?;
                IrStmtKind::If {
                    condition,
                    then_branch: self.transform_body(then_branch)?,
                    else_branch: self.transform_body(else_branch)?,
                }
            }
            IrStmtKind::While { condition, body } => {
                self.check_condition(&condition, pos)?;
                IrStmtKind::While {
                    condition,
                    body: self.transform_body(body)?,
                }
            }
            IrStmtKind::Try {
                body,
                catch,
                finally,
            } => {
                let body = self.transform_body(body)?;
                let catch = match catch {
                    Some(mut clause) => {
                        clause.body = self.transform_body(clause.body)?;
                        Some(clause)
                    }
                    None => None,
                };
                let finally = match finally {
                    Some(mut block) => {
                        if body_has_await(&mut block) {
                            return Err(self
                                .error(DiagnosticCode::UnsupportedStatement, "`await` inside `finally`", pos)
                                .with_guidance("Move the awaited call before the `try` statement"));
                        }
                        Some(block)
                    }
                    None => None,
                };
                IrStmtKind::Try {
                    body,
                    catch,
                    finally,
                }
            }
            other => other,
        };
        out.push(IrStmt::new(kind, pos));
        Ok(())
    }

    fn check_condition(&self, condition: &IrExpr, pos: SourcePos) -> CompileResult<()> {
        if condition.contains_await() {
            return Err(self
                .error(DiagnosticCode::AwaitCondition, "`await` in a loop or branch condition", pos)
                .with_guidance("Await into a variable before the statement and test the variable"));
        }
        Ok(())
    }

    /// Hoist every `await` of `expr` into statements appended to `out`,
    /// returning the await-free remainder
    fn spill(&mut self, expr: IrExpr, pos: SourcePos, out: &mut Vec<IrStmt>) -> IrExpr {
        if !expr.contains_await() {
            return expr;
        }
        match expr {
            IrExpr::Await(operand) => {
                let operand = self.spill(*operand, pos, out);
                let target = self.program.new_temp(self.owner);
                let state = self.next_state as u16;
                self.next_state += 1;
                out.push(IrStmt::new(
                    IrStmtKind::Await {
                        target,
                        operand,
                        state,
                    },
                    pos,
                ));
                IrExpr::Load(Var::Binding(target))
            }
            IrExpr::Logical(op, left, right) => {
                let left = self.spill(*left, pos, out);
                if !right.contains_await() {
                    return IrExpr::Logical(op, left.boxed(), right);
                }
                // t = left; if (<t selects right>) { t = right }
                let temp = self.program.new_temp(self.owner);
                out.push(IrStmt::new(
                    IrStmtKind::Let {
                        binding: temp,
                        value: Some(left),
                    },
                    pos,
                ));
                let current = IrExpr::Load(Var::Binding(temp));
                let condition = match op {
                    LogicalOp::And => current,
                    LogicalOp::Or => IrExpr::Unary(UnaryOp::Not, current.boxed()),
                    LogicalOp::Nullish => {
                        IrExpr::Binary(BinaryOp::LooseEq, current.boxed(), IrExpr::Null.boxed())
                    }
                };
                let branch = self.assign_branch(temp, *right, pos);
                out.push(IrStmt::new(
                    IrStmtKind::If {
                        condition,
                        then_branch: branch,
                        else_branch: Vec::new(),
                    },
                    pos,
                ));
                IrExpr::Load(Var::Binding(temp))
            }
            IrExpr::Conditional(condition, when_true, when_false)
                if when_true.contains_await() || when_false.contains_await() =>
            {
                let condition = self.spill(*condition, pos, out);
                let temp = self.program.new_temp(self.owner);
                let then_branch = self.assign_branch(temp, *when_true, pos);
                let else_branch = self.assign_branch(temp, *when_false, pos);
                out.push(IrStmt::new(
                    IrStmtKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    pos,
                ));
                IrExpr::Load(Var::Binding(temp))
            }
            mut other => {
                let mut children = other.children_mut();
                self.spill_children(&mut children, pos, out);
                other
            }
        }
    }

    /// `temp = value`, with `value`'s awaits spilled inside the branch
    fn assign_branch(&mut self, temp: BindingId, value: IrExpr, pos: SourcePos) -> Vec<IrStmt> {
        let mut branch = Vec::new();
        let value = self.spill(value, pos, &mut branch);
        branch.push(IrStmt::new(
            IrStmtKind::Expr(IrExpr::Store(Var::Binding(temp), value.boxed())),
            pos,
        ));
        branch
    }

    fn spill_list(&mut self, mut values: Vec<IrExpr>, pos: SourcePos, out: &mut Vec<IrStmt>) -> Vec<IrExpr> {
        let mut children: Vec<&mut IrExpr> = values.iter_mut().collect();
        self.spill_children(&mut children, pos, out);
        values
    }

    /// Operands left of the last awaiting operand are pinned in temporaries
    /// unless re-evaluating them later is unobservable
    fn spill_children(&mut self, children: &mut [&mut IrExpr], pos: SourcePos, out: &mut Vec<IrStmt>) {
        let Some(last) = children.iter().rposition(|c| c.contains_await()) else {
            return;
        };
        for child in children[..last].iter_mut() {
            let slot: &mut IrExpr = match &mut **child {
                IrExpr::Spread(inner) => inner,
                other => other,
            };
            if slot.contains_await() {
                let value = std::mem::replace(slot, IrExpr::Undefined);
                *slot = self.spill(value, pos, out);
            }
            self.pin(slot, pos, out);
        }
        let awaiting = std::mem::replace(&mut *children[last], IrExpr::Undefined);
        *children[last] = match awaiting {
            IrExpr::Spread(inner) => IrExpr::Spread(self.spill(*inner, pos, out).boxed()),
            e => self.spill(e, pos, out),
        };
    }

    fn pin(&mut self, slot: &mut IrExpr, pos: SourcePos, out: &mut Vec<IrStmt>) {
        if self.is_stable(slot) {
            return;
        }
        let temp = self.program.new_temp(self.owner);
        let value = std::mem::replace(slot, IrExpr::Load(Var::Binding(temp)));
        out.push(IrStmt::new(
            IrStmtKind::Let {
                binding: temp,
                value: Some(value),
            },
            pos,
        ));
    }

    fn is_stable(&self, expr: &IrExpr) -> bool {
        match expr {
            IrExpr::Load(Var::Binding(b)) => self.program.binding(*b).kind == BindingKind::Temp,
            e => e.is_stable(),
        }
    }

    fn error(&self, code: DiagnosticCode, message: &str, pos: SourcePos) -> CompileError {
        let file = self
            .program
            .source_files
            .get(pos.file as usize)
            .map(String::as_str)
            .unwrap_or_default();
        CompileError::new(code, message)
            .at(pos.line, pos.column)
            .in_file(Path::new(file))
    }
}
