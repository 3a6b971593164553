//! Expression code generation
//!
//! Every expression leaves exactly one value on the operand stack.

use super::context::{FunctionContext, Label, Operand};
use crate::compiler::bytecode::Opcode;
use crate::compiler::error::{CompileResult, DiagnosticCode};
use crate::compiler::ir::{
    BinaryOp, BindingId, FunctionId, IrExpr, LogicalOp, SiteId, UnaryOp, Var,
};
use Operand::{U16, U32, U8};

/// Storage of a binding as seen from the current function
#[derive(Debug, Clone, Copy)]
enum Access {
    /// Plain local slot
    Local(u16),
    /// Local slot holding a capture cell
    Cell(u16),
    /// Environment record entry
    Env(u16),
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::LooseEq => Opcode::LooseEq,
        BinaryOp::LooseNe => Opcode::LooseNe,
        BinaryOp::StrictEq => Opcode::StrictEq,
        BinaryOp::StrictNe => Opcode::StrictNe,
    }
}

fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Neg => Opcode::Neg,
        UnaryOp::Plus => Opcode::ToNumber,
        UnaryOp::Not => Opcode::Not,
        UnaryOp::TypeOf => Opcode::TypeOf,
    }
}

fn has_spread(args: &[IrExpr]) -> bool {
    args.iter().any(|a| matches!(a, IrExpr::Spread(_)))
}

impl<'a, 'u> FunctionContext<'a, 'u> {
    /// Generate code for an expression
    pub fn emit_expr(&mut self, expr: &IrExpr) -> CompileResult<()> {
        match expr {
            IrExpr::Undefined => self.op(Opcode::ConstUndefined),
            IrExpr::Null => self.op(Opcode::ConstNull),
            IrExpr::Bool(true) => self.op(Opcode::ConstTrue),
            IrExpr::Bool(false) => self.op(Opcode::ConstFalse),
            IrExpr::Number(n) => {
                let index = self.number(*n);
                self.emit(Opcode::ConstNumber, &[U32(index)]);
            }
            IrExpr::String(s) => {
                let index = self.string(s);
                self.emit(Opcode::ConstString, &[U32(index)]);
            }
            IrExpr::Load(var) => self.load_var(*var)?,
            IrExpr::Store(var, value) => {
                self.emit_expr(value)?;
                self.op(Opcode::Dup);
                self.store_var(*var)?;
            }
            IrExpr::Builtin(builtin) => self.emit(Opcode::LoadBuiltin, &[U8(*builtin as u8)]),
            IrExpr::Class(class) => self.emit(Opcode::LoadClass, &[U32(class.0)]),
            IrExpr::Closure(id) => self.emit_closure(*id)?,
            IrExpr::Unary(op, operand) => {
                self.emit_expr(operand)?;
                self.op(unary_opcode(*op));
            }
            IrExpr::Binary(op, left, right) => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                self.op(binary_opcode(*op));
            }
            IrExpr::Logical(op, left, right) => self.emit_logical(*op, left, right)?,
            IrExpr::Conditional(condition, when_true, when_false) => {
                let otherwise = self.new_label();
                let end = self.new_label();
                self.emit_expr(condition)?;
                self.jump(Opcode::JmpIfFalse, otherwise);
                self.emit_expr(when_true)?;
                self.jump(Opcode::Jmp, end);
                self.bind(otherwise);
                self.emit_expr(when_false)?;
                self.bind(end);
            }
            IrExpr::Call {
                callee,
                args,
                optional,
            } => {
                self.emit_expr(callee)?;
                let nullish = optional.then(|| self.optional_guard());
                match self.emit_args(args)? {
                    Some(argc) => self.emit(Opcode::Call, &[U8(argc)]),
                    None => self.op(Opcode::CallSpread),
                }
                if let Some(label) = nullish {
                    self.optional_end(label);
                }
            }
            IrExpr::CallMethod {
                receiver,
                name,
                site,
                args,
                optional,
            } => {
                self.emit_expr(receiver)?;
                let nullish = optional.then(|| self.optional_guard());
                let name = self.string(name);
                let site = self.site(*site)?;
                match self.emit_args(args)? {
                    Some(argc) => self.emit(Opcode::CallMethod, &[U32(name), U32(site), U8(argc)]),
                    None => self.emit(Opcode::CallMethodSpread, &[U32(name), U32(site)]),
                }
                if let Some(label) = nullish {
                    self.optional_end(label);
                }
            }
            IrExpr::CallIndex {
                receiver,
                key,
                args,
            } => {
                self.emit_expr(receiver)?;
                self.emit_expr(key)?;
                self.emit_array(args)?;
                self.op(Opcode::InvokeDynamic);
            }
            IrExpr::New { constructor, args } => {
                self.emit_expr(constructor)?;
                match self.emit_args(args)? {
                    Some(argc) => self.emit(Opcode::New, &[U8(argc)]),
                    None => self.op(Opcode::NewSpread),
                }
            }
            IrExpr::GetProp {
                object,
                name,
                site,
                optional,
            } => {
                self.emit_expr(object)?;
                let nullish = optional.then(|| self.optional_guard());
                let name = self.string(name);
                let site = self.site(*site)?;
                self.emit(Opcode::GetProp, &[U32(name), U32(site)]);
                if let Some(label) = nullish {
                    self.optional_end(label);
                }
            }
            IrExpr::SetProp {
                object,
                name,
                site,
                value,
            } => {
                self.emit_expr(object)?;
                self.emit_expr(value)?;
                let name = self.string(name);
                let site = self.site(*site)?;
                self.emit(Opcode::SetProp, &[U32(name), U32(site)]);
            }
            IrExpr::UpdateProp {
                object,
                name,
                site,
                op,
                value,
            } => {
                // object, object -> object, old -> object, old, rhs -> object, new -> new
                self.emit_expr(object)?;
                self.op(Opcode::Dup);
                let name = self.string(name);
                let site = self.site(*site)?;
                self.emit(Opcode::GetProp, &[U32(name), U32(site)]);
                self.emit_expr(value)?;
                self.op(binary_opcode(*op));
                self.emit(Opcode::SetProp, &[U32(name), U32(site)]);
            }
            IrExpr::GetIndex { object, index } => {
                self.emit_expr(object)?;
                self.emit_expr(index)?;
                self.op(Opcode::GetIndex);
            }
            IrExpr::SetIndex {
                object,
                index,
                value,
            } => {
                self.emit_expr(object)?;
                self.emit_expr(index)?;
                self.emit_expr(value)?;
                self.op(Opcode::SetIndex);
            }
            IrExpr::Delete { object, name } => {
                self.emit_expr(object)?;
                let name = self.string(name);
                self.emit(Opcode::DeleteProp, &[U32(name)]);
            }
            IrExpr::Array(items) => self.emit_array(items)?,
            IrExpr::Object(entries) => {
                self.op(Opcode::NewObject);
                for (key, value) in entries {
                    self.emit_expr(value)?;
                    let key = self.string(key);
                    self.emit(Opcode::DefineField, &[U32(key)]);
                }
            }
            IrExpr::Spread(_) => {
                return Err(self.error(
                    DiagnosticCode::UnsupportedExpression,
                    "spread is only allowed in argument lists and array literals",
                ))
            }
            IrExpr::Await(_) => {
                return Err(self.error(
                    DiagnosticCode::Verify,
                    format!(
                        "`await` left in `{}` after the async transform",
                        self.function.display_name()
                    ),
                ))
            }
        }
        Ok(())
    }

    /// Generate an expression whose value is not used
    pub fn emit_discarded(&mut self, expr: &IrExpr) -> CompileResult<()> {
        match expr {
            IrExpr::Store(var, value) => {
                self.emit_expr(value)?;
                self.store_var(*var)
            }
            _ => {
                self.emit_expr(expr)?;
                self.op(Opcode::Pop);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Variables
    // ========================================================================

    fn access(&self, binding: BindingId) -> CompileResult<Access> {
        let info = self.program.binding(binding);
        if info.owner == self.function.id {
            let slot = self.slot(binding).ok_or_else(|| {
                self.error(
                    DiagnosticCode::Verify,
                    format!("`{}` has no slot in `{}`", info.name, self.function.display_name()),
                )
            })?;
            Ok(if info.captured {
                Access::Cell(slot)
            } else {
                Access::Local(slot)
            })
        } else {
            let index = self.function.env_index(binding).ok_or_else(|| {
                self.error(
                    DiagnosticCode::Verify,
                    format!(
                        "`{}` is not in the environment of `{}`",
                        info.name,
                        self.function.display_name()
                    ),
                )
            })?;
            Ok(Access::Env(self.count_u16(index, "captured variables")?))
        }
    }

    /// Push the value of a variable
    pub fn load_var(&mut self, var: Var) -> CompileResult<()> {
        match var {
            Var::Global(global) => self.emit(Opcode::LoadGlobal, &[U32(global.0)]),
            Var::Binding(binding) => match self.access(binding)? {
                Access::Local(slot) => self.emit(Opcode::LoadLocal, &[U16(slot)]),
                Access::Cell(slot) => self.emit(Opcode::LoadCell, &[U16(slot)]),
                Access::Env(index) => self.emit(Opcode::LoadEnv, &[U16(index)]),
            },
        }
        Ok(())
    }

    /// Pop the top of the stack into a variable
    pub fn store_var(&mut self, var: Var) -> CompileResult<()> {
        match var {
            Var::Global(global) => self.emit(Opcode::StoreGlobal, &[U32(global.0)]),
            Var::Binding(binding) => match self.access(binding)? {
                Access::Local(slot) => self.emit(Opcode::StoreLocal, &[U16(slot)]),
                Access::Cell(slot) => self.emit(Opcode::StoreCell, &[U16(slot)]),
                Access::Env(index) => self.emit(Opcode::StoreEnv, &[U16(index)]),
            },
        }
        Ok(())
    }

    /// Push the capture cells of `id` and instantiate the closure
    fn emit_closure(&mut self, id: FunctionId) -> CompileResult<()> {
        let program = self.program;
        let target = program.function(id);
        for &binding in &target.captures {
            match self.access(binding)? {
                Access::Cell(slot) => self.emit(Opcode::CaptureLocal, &[U16(slot)]),
                Access::Env(index) => self.emit(Opcode::CaptureEnv, &[U16(index)]),
                Access::Local(_) => {
                    return Err(self.error(
                        DiagnosticCode::Verify,
                        format!(
                            "`{}` is captured by `{}` but not stored in a cell",
                            program.binding(binding).name,
                            target.display_name()
                        ),
                    ))
                }
            }
        }
        let count = self.count_u16(target.captures.len(), "captured variables")?;
        let function = self.layout.final_id(id);
        self.emit(Opcode::MakeClosure, &[U32(function), U16(count)]);
        Ok(())
    }

    fn site(&self, site: SiteId) -> CompileResult<u32> {
        if site == SiteId::UNPLANNED {
            return Err(self.error(DiagnosticCode::Verify, "property access without a site"));
        }
        Ok(site.0)
    }

    // ========================================================================
    // Short-circuit forms
    // ========================================================================

    fn emit_logical(&mut self, op: LogicalOp, left: &IrExpr, right: &IrExpr) -> CompileResult<()> {
        let end = self.new_label();
        self.emit_expr(left)?;
        self.op(Opcode::Dup);
        match op {
            LogicalOp::And => self.jump(Opcode::JmpIfFalse, end),
            LogicalOp::Or => self.jump(Opcode::JmpIfTrue, end),
            LogicalOp::Nullish => {
                self.op(Opcode::IsNullish);
                self.jump(Opcode::JmpIfFalse, end);
            }
        }
        self.op(Opcode::Pop);
        self.emit_expr(right)?;
        self.bind(end);
        Ok(())
    }

    /// Skip to the returned label when the value on top of the stack is
    /// nullish
    fn optional_guard(&mut self) -> Label {
        let nullish = self.new_label();
        self.op(Opcode::Dup);
        self.op(Opcode::IsNullish);
        self.jump(Opcode::JmpIfTrue, nullish);
        nullish
    }

    /// Replace the guarded value with `undefined` on the nullish path
    fn optional_end(&mut self, nullish: Label) {
        let end = self.new_label();
        self.jump(Opcode::Jmp, end);
        self.bind(nullish);
        self.op(Opcode::Pop);
        self.op(Opcode::ConstUndefined);
        self.bind(end);
    }

    // ========================================================================
    // Argument lists
    // ========================================================================

    /// Push call arguments. Plain lists stay on the stack and their count
    /// is returned; lists with a spread are collected into one array.
    fn emit_args(&mut self, args: &[IrExpr]) -> CompileResult<Option<u8>> {
        if has_spread(args) {
            self.emit_array(args)?;
            return Ok(None);
        }
        for arg in args {
            self.emit_expr(arg)?;
        }
        Ok(Some(self.count_u8(args.len(), "arguments")?))
    }

    /// Build an array from elements that may contain spreads
    fn emit_array(&mut self, items: &[IrExpr]) -> CompileResult<()> {
        let leading = items
            .iter()
            .take_while(|e| !matches!(e, IrExpr::Spread(_)))
            .count();
        for item in &items[..leading] {
            self.emit_expr(item)?;
        }
        let count = self.count_u16(leading, "array elements")?;
        self.emit(Opcode::NewArray, &[U16(count)]);
        for item in &items[leading..] {
            match item {
                IrExpr::Spread(inner) => {
                    self.emit_expr(inner)?;
                    self.op(Opcode::ArraySpread);
                }
                other => {
                    self.emit_expr(other)?;
                    self.op(Opcode::ArrayPush);
                }
            }
        }
        Ok(())
    }

    /// Push plain arguments of a fixed-arity form that does not accept spread
    pub fn emit_plain_args(&mut self, args: &[IrExpr], what: &str) -> CompileResult<u8> {
        if has_spread(args) {
            return Err(self.error(
                DiagnosticCode::UnsupportedExpression,
                format!("spread is not supported in {}", what),
            ));
        }
        for arg in args {
            self.emit_expr(arg)?;
        }
        self.count_u8(args.len(), "arguments")
    }
}
