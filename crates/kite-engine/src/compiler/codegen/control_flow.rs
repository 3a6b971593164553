//! Statement and control flow code generation
//!
//! Statements start and end with an empty operand stack. Early exits
//! (`return`, `break`, `continue`) that leave `try` regions run the
//! enclosing finalizers inline, innermost first, with the regions they
//! leave closed so a throwing finalizer is not caught by its own handler.

use super::context::{FunctionContext, LoopLabels, Operand, TryRegion};
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::{CompileResult, DiagnosticCode};
use crate::compiler::ir::{BindingId, CatchClause, IrExpr, IrStmt, IrStmtKind, Var};
use Operand::{U16, U32, U8};

impl<'a, 'u> FunctionContext<'a, 'u> {
    /// Box captured `this` and parameters into cells
    pub fn emit_prologue(&mut self) -> CompileResult<()> {
        let function = self.function;
        let owned = std::iter::once(&function.this_binding).chain(function.params.iter());
        for &binding in owned {
            if self.program.binding(binding).captured {
                let slot = self.own_slot(binding)?;
                self.emit(Opcode::BoxLocal, &[U16(slot)]);
            }
        }
        Ok(())
    }

    /// Generate a statement list
    pub fn emit_block(&mut self, body: &'a [IrStmt]) -> CompileResult<()> {
        for stmt in body {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &'a IrStmt) -> CompileResult<()> {
        self.mark(stmt.pos);
        match &stmt.kind {
            IrStmtKind::Expr(expr) => self.emit_discarded(expr)?,
            IrStmtKind::Let { binding, value } => {
                match value {
                    Some(value) => self.emit_expr(value)?,
                    None => self.op(Opcode::ConstUndefined),
                }
                self.store_var(Var::Binding(*binding))?;
            }
            IrStmtKind::Block { bindings, body } => {
                for &binding in bindings {
                    if self.program.binding(binding).captured {
                        let slot = self.own_slot(binding)?;
                        self.emit(Opcode::NewCell, &[U16(slot)]);
                    }
                }
                self.emit_block(body)?;
            }
            IrStmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let otherwise = self.new_label();
                self.emit_expr(condition)?;
                self.jump(Opcode::JmpIfFalse, otherwise);
                self.emit_block(then_branch)?;
                if else_branch.is_empty() {
                    self.bind(otherwise);
                } else {
                    let end = self.new_label();
                    self.jump(Opcode::Jmp, end);
                    self.bind(otherwise);
                    self.emit_block(else_branch)?;
                    self.bind(end);
                }
            }
            IrStmtKind::While { condition, body } => self.emit_while(condition, body)?,
            IrStmtKind::Break | IrStmtKind::Continue => {
                let Some(target) = self.loops.last().copied() else {
                    return Err(self.error(
                        DiagnosticCode::BreakOutsideLoop,
                        "`break`/`continue` outside a loop",
                    ));
                };
                let label = if matches!(stmt.kind, IrStmtKind::Break) {
                    target.break_to
                } else {
                    target.continue_to
                };
                let saved = self.leave_tries(target.try_depth)?;
                self.jump(Opcode::Jmp, label);
                self.restore_tries(saved);
            }
            IrStmtKind::Return(value) => self.emit_return(value.as_ref())?,
            IrStmtKind::Throw(value) => {
                self.emit_expr(value)?;
                self.op(Opcode::Throw);
            }
            IrStmtKind::Try {
                body,
                catch,
                finally,
            } => self.emit_try(body, catch.as_ref(), finally.as_deref())?,
            IrStmtKind::Print(values) => {
                let count = self.emit_plain_args(values, "console output")?;
                self.emit(Opcode::Print, &[U8(count)]);
            }
            IrStmtKind::SuperCall { class, args } => {
                let argc = self.emit_plain_args(args, "`super(..)` calls")?;
                self.emit(Opcode::SuperCall, &[U32(class.0), U8(argc)]);
                self.op(Opcode::Pop);
            }
            IrStmtKind::Await {
                target,
                operand,
                state,
            } => {
                let Some(&resume) = self.states.get(*state as usize) else {
                    return Err(self.error(
                        DiagnosticCode::Verify,
                        format!(
                            "async state {} out of range in `{}`",
                            state,
                            self.function.display_name()
                        ),
                    ));
                };
                self.emit_expr(operand)?;
                self.emit(Opcode::Await, &[U16(*state)]);
                self.bind(resume);
                self.op(Opcode::Resume);
                self.store_var(Var::Binding(*target))?;
            }
        }
        Ok(())
    }

    fn own_slot(&self, binding: BindingId) -> CompileResult<u16> {
        self.slot(binding).ok_or_else(|| {
            self.error(
                DiagnosticCode::Verify,
                format!(
                    "`{}` has no slot in `{}`",
                    self.program.binding(binding).name,
                    self.function.display_name()
                ),
            )
        })
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn emit_while(&mut self, condition: &'a IrExpr, body: &'a [IrStmt]) -> CompileResult<()> {
        let start = self.new_label();
        let end = self.new_label();
        self.bind(start);
        if *condition != IrExpr::Bool(true) {
            self.emit_expr(condition)?;
            self.jump(Opcode::JmpIfFalse, end);
        }
        self.loops.push(LoopLabels {
            continue_to: start,
            break_to: end,
            try_depth: self.tries.len(),
        });
        let result = self.emit_block(body);
        self.loops.pop();
        result?;
        self.jump(Opcode::Jmp, start);
        self.bind(end);
        Ok(())
    }

    // ========================================================================
    // Exits
    // ========================================================================

    fn emit_return(&mut self, value: Option<&'a IrExpr>) -> CompileResult<()> {
        match value {
            Some(value) => self.emit_expr(value)?,
            None => self.op(Opcode::ConstUndefined),
        }
        if self.tries.iter().all(|t| t.finally.is_none()) {
            self.op(Opcode::Return);
            return Ok(());
        }
        let slot = self.scratch_slot()?;
        self.emit(Opcode::StoreLocal, &[U16(slot)]);
        let saved = self.leave_tries(0)?;
        self.emit(Opcode::LoadLocal, &[U16(slot)]);
        self.op(Opcode::Return);
        self.restore_tries(saved);
        Ok(())
    }

    /// Close every region above `floor`, running finalizers innermost first.
    /// The closed regions are returned for `restore_tries`.
    fn leave_tries(&mut self, floor: usize) -> CompileResult<Vec<TryRegion<'a>>> {
        let mut saved = Vec::new();
        while self.tries.len() > floor {
            let Some(mut region) = self.tries.pop() else {
                break;
            };
            region.close(self.offset());
            let finally = region.finally;
            saved.push(region);
            if let Some(body) = finally {
                self.emit_block(body)?;
            }
        }
        Ok(saved)
    }

    fn restore_tries(&mut self, mut saved: Vec<TryRegion<'a>>) {
        let at = self.offset();
        while let Some(mut region) = saved.pop() {
            region.reopen(at);
            self.tries.push(region);
        }
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Layout:
    ///
    /// ```text
    ///       body                 ; catch region, inside the finally region
    ///       jmp normal
    /// catch:                     ; thrown value on the stack
    ///       store binding | pop
    ///       catch body           ; inside the finally region
    /// normal:
    ///       finally body
    ///       jmp after
    /// rethrow:                   ; thrown value on the stack
    ///       store scratch
    ///       finally body
    ///       load scratch
    ///       throw
    /// after:
    /// ```
    fn emit_try(
        &mut self,
        body: &'a [IrStmt],
        catch: Option<&'a CatchClause>,
        finally: Option<&'a [IrStmt]>,
    ) -> CompileResult<()> {
        if finally.is_some() {
            self.tries.push(TryRegion::new(self.offset(), finally));
        }

        match catch {
            Some(clause) => {
                self.tries.push(TryRegion::new(self.offset(), None));
                self.emit_block(body)?;
                let segments = self.pop_region()?;
                let normal = self.new_label();
                self.jump(Opcode::Jmp, normal);

                let handler = self.new_label();
                let target = self.offset();
                self.bind_handler(handler);
                self.add_handler(&segments, target);
                match clause.binding {
                    Some(binding) => {
                        if self.program.binding(binding).captured {
                            let slot = self.own_slot(binding)?;
                            self.emit(Opcode::NewCell, &[U16(slot)]);
                        }
                        self.store_var(Var::Binding(binding))?;
                    }
                    None => self.op(Opcode::Pop),
                }
                self.emit_block(&clause.body)?;
                self.bind(normal);
            }
            None => self.emit_block(body)?,
        }

        if let Some(finally) = finally {
            let segments = self.pop_region()?;
            let after = self.new_label();
            self.emit_block(finally)?;
            self.jump(Opcode::Jmp, after);

            let rethrow = self.new_label();
            let target = self.offset();
            self.bind_handler(rethrow);
            self.add_handler(&segments, target);
            let scratch = self.scratch_slot()?;
            self.emit(Opcode::StoreLocal, &[U16(scratch)]);
            self.emit_block(finally)?;
            self.emit(Opcode::LoadLocal, &[U16(scratch)]);
            self.op(Opcode::Throw);
            self.bind(after);
        }
        Ok(())
    }

    fn pop_region(&mut self) -> CompileResult<Vec<(u32, u32)>> {
        let at = self.offset();
        match self.tries.pop() {
            Some(region) => Ok(region.finish(at)),
            None => Err(self.error(DiagnosticCode::Verify, "unbalanced exception regions")),
        }
    }
}
