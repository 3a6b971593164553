//! Expression Lowering
//!
//! Converts AST expressions to IR expressions, resolving every identifier to
//! a function-owned binding, a module global or a host builtin.

use super::{FunctionSpec, Lowerer};
use crate::ast::{Expr, ExprKind, ThisMode};
use crate::compiler::bytecode::Builtin;
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{
    BinaryOp, FunctionKind, IrExpr, LogicalOp, SiteId, UnaryOp, Var,
};

impl<'a> Lowerer<'a> {
    /// Lower an expression
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> CompileResult<IrExpr> {
        Ok(match &expr.kind {
            ExprKind::Number { text } => match parse_number(text) {
                Some(n) => IrExpr::Number(n),
                None => {
                    return Err(self.unsupported(expr, format!("invalid numeric literal `{}`", text)))
                }
            },
            ExprKind::String { text } => IrExpr::String(text.clone()),
            ExprKind::Boolean { value } => IrExpr::Bool(*value),
            ExprKind::Null => IrExpr::Null,
            ExprKind::Undefined => IrExpr::Undefined,
            ExprKind::Template {
                quasis,
                expressions,
            } => self.lower_template(quasis, expressions)?,
            ExprKind::Variable { name } => self.resolve_name(name, expr)?,
            ExprKind::This => match self.scopes.resolve_this(self.program) {
                Some(binding) => IrExpr::Load(Var::Binding(binding)),
                None => IrExpr::Undefined,
            },
            ExprKind::Unary {
                operator,
                expression,
            } => self.lower_unary(operator, expression, expr)?,
            ExprKind::Await { expression } => {
                if !self.scopes.is_async() {
                    return Err(self
                        .error(
                            DiagnosticCode::AwaitOutsideAsync,
                            "`await` is only allowed in async functions",
                            expr.line,
                            expr.column,
                        )
                        .with_guidance("Mark the enclosing function `async`"));
                }
                IrExpr::Await(self.lower_expr(expression)?.boxed())
            }
            ExprKind::Function(node) => {
                let id = self.lower_function(
                    FunctionSpec {
                        name: node.name.clone(),
                        params: &node.parameters,
                        is_async: node.is_async,
                        lexical_this: node.this_mode == ThisMode::Lexical,
                        kind: FunctionKind::Expression,
                        decorators: &[],
                        class: None,
                        line: expr.line,
                        column: expr.column,
                    },
                    &node.body,
                )?;
                IrExpr::Closure(id)
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let l = self.lower_expr(left)?.boxed();
                let r = self.lower_expr(right)?.boxed();
                if let Some(op) = LogicalOp::from_token(operator) {
                    IrExpr::Logical(op, l, r)
                } else if let Some(op) = BinaryOp::from_token(operator) {
                    IrExpr::Binary(op, l, r)
                } else {
                    return Err(self.unsupported(expr, format!("operator `{}` is not supported", operator)));
                }
            }
            ExprKind::Assign {
                target,
                operator,
                expression,
            } => self.lower_assignment(target, operator, expression)?,
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            } => IrExpr::Conditional(
                self.lower_expr(condition)?.boxed(),
                self.lower_expr(when_true)?.boxed(),
                self.lower_expr(when_false)?.boxed(),
            ),
            ExprKind::Call { callee, arguments } => self.lower_call(callee, arguments)?,
            ExprKind::OptionalCall { callee, arguments } => IrExpr::Call {
                callee: self.lower_expr(callee)?.boxed(),
                args: self.lower_args(arguments)?,
                optional: true,
            },
            ExprKind::Member { receiver, member } => IrExpr::GetProp {
                object: self.lower_expr(receiver)?.boxed(),
                name: member.clone(),
                site: SiteId::UNPLANNED,
                optional: false,
            },
            ExprKind::OptionalMember { receiver, member } => IrExpr::GetProp {
                object: self.lower_expr(receiver)?.boxed(),
                name: member.clone(),
                site: SiteId::UNPLANNED,
                optional: true,
            },
            ExprKind::Element { receiver, index } => IrExpr::GetIndex {
                object: self.lower_expr(receiver)?.boxed(),
                index: self.lower_expr(index)?.boxed(),
            },
            ExprKind::New {
                constructor,
                arguments,
            } => IrExpr::New {
                constructor: self.lower_expr(constructor)?.boxed(),
                args: self.lower_args(arguments)?,
            },
            ExprKind::Array { elements } => IrExpr::Array(self.lower_args(elements)?),
            ExprKind::Object { entries } => {
                let mut out = Vec::with_capacity(entries.len());
                for entry in entries {
                    out.push((entry.key.clone(), self.lower_expr(&entry.value)?));
                }
                IrExpr::Object(out)
            }
            ExprKind::Spread { .. } => {
                return Err(self.unsupported(
                    expr,
                    "spread is only allowed in argument lists and array literals",
                ))
            }
            ExprKind::ImportCall { .. } => {
                return Err(self
                    .error(
                        DiagnosticCode::DynamicImport,
                        "dynamic `import(..)` is not supported",
                        expr.line,
                        expr.column,
                    )
                    .with_guidance("Use static relative imports"))
            }
            ExprKind::Unsupported { .. } | ExprKind::Unknown => {
                return Err(self.unsupported(expr, format!("`{}` is not supported", expr.kind_name())))
            }
        })
    }

    /// Lower arguments or array elements, where spread is allowed
    pub(super) fn lower_args(&mut self, args: &[Expr]) -> CompileResult<Vec<IrExpr>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(match &arg.kind {
                ExprKind::Spread { expression } => IrExpr::Spread(self.lower_expr(expression)?.boxed()),
                _ => self.lower_expr(arg)?,
            });
        }
        Ok(out)
    }

    fn lower_call(&mut self, callee: &Expr, arguments: &[Expr]) -> CompileResult<IrExpr> {
        Ok(match &callee.kind {
            ExprKind::Member { receiver, member } | ExprKind::OptionalMember { receiver, member } => {
                IrExpr::CallMethod {
                    receiver: self.lower_expr(receiver)?.boxed(),
                    name: member.clone(),
                    site: SiteId::UNPLANNED,
                    args: self.lower_args(arguments)?,
                    optional: matches!(callee.kind, ExprKind::OptionalMember { .. }),
                }
            }
            ExprKind::Element { receiver, index } => IrExpr::CallIndex {
                receiver: self.lower_expr(receiver)?.boxed(),
                key: self.lower_expr(index)?.boxed(),
                args: self.lower_args(arguments)?,
            },
            _ => IrExpr::Call {
                callee: self.lower_expr(callee)?.boxed(),
                args: self.lower_args(arguments)?,
                optional: false,
            },
        })
    }

    fn lower_template(&mut self, quasis: &[String], expressions: &[Expr]) -> CompileResult<IrExpr> {
        let mut acc = IrExpr::String(quasis.first().cloned().unwrap_or_default());
        for (i, e) in expressions.iter().enumerate() {
            let value = self.lower_expr(e)?;
            acc = IrExpr::Binary(BinaryOp::Add, acc.boxed(), value.boxed());
            if let Some(chunk) = quasis.get(i + 1).filter(|q| !q.is_empty()) {
                acc = IrExpr::Binary(BinaryOp::Add, acc.boxed(), IrExpr::String(chunk.clone()).boxed());
            }
        }
        Ok(acc)
    }

    fn lower_unary(&mut self, operator: &str, operand: &Expr, expr: &Expr) -> CompileResult<IrExpr> {
        let op = match operator {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Plus,
            "!" => UnaryOp::Not,
            "typeof" => UnaryOp::TypeOf,
            "delete" => {
                let ExprKind::Member { receiver, member } = &operand.kind else {
                    return Err(self.unsupported(expr, "`delete` needs a property access operand"));
                };
                return Ok(IrExpr::Delete {
                    object: self.lower_expr(receiver)?.boxed(),
                    name: member.clone(),
                });
            }
            _ => {
                return Err(self.unsupported(
                    expr,
                    format!("unary operator `{}` is not supported", operator),
                ))
            }
        };
        Ok(IrExpr::Unary(op, self.lower_expr(operand)?.boxed()))
    }

    /// Lower `target op= value`
    pub(super) fn lower_assignment(
        &mut self,
        target: &Expr,
        operator: &str,
        value: &Expr,
    ) -> CompileResult<IrExpr> {
        if operator == "=" {
            return Ok(match &target.kind {
                ExprKind::Variable { name } => {
                    let var = self.assignable(name, target)?;
                    IrExpr::Store(var, self.lower_expr(value)?.boxed())
                }
                ExprKind::Member { receiver, member } => IrExpr::SetProp {
                    object: self.lower_expr(receiver)?.boxed(),
                    name: member.clone(),
                    site: SiteId::UNPLANNED,
                    value: self.lower_expr(value)?.boxed(),
                },
                ExprKind::Element { receiver, index } => IrExpr::SetIndex {
                    object: self.lower_expr(receiver)?.boxed(),
                    index: self.lower_expr(index)?.boxed(),
                    value: self.lower_expr(value)?.boxed(),
                },
                _ => return Err(self.bad_target(target)),
            });
        }

        let op = operator
            .strip_suffix('=')
            .and_then(BinaryOp::from_token)
            .filter(|op| {
                matches!(
                    op,
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
                )
            })
            .ok_or_else(|| {
                self.unsupported(target, format!("assignment operator `{}` is not supported", operator))
            })?;
        Ok(match &target.kind {
            ExprKind::Variable { name } => {
                let var = self.assignable(name, target)?;
                let rhs = self.lower_expr(value)?;
                IrExpr::Store(
                    var,
                    IrExpr::Binary(op, IrExpr::Load(var).boxed(), rhs.boxed()).boxed(),
                )
            }
            ExprKind::Member { receiver, member } => IrExpr::UpdateProp {
                object: self.lower_expr(receiver)?.boxed(),
                name: member.clone(),
                site: SiteId::UNPLANNED,
                op,
                value: self.lower_expr(value)?.boxed(),
            },
            ExprKind::Element { .. } => {
                return Err(self
                    .unsupported(target, format!("`{}` on an element is not supported", operator))
                    .with_guidance("Read the element into a variable, update it and store it back"))
            }
            _ => return Err(self.bad_target(target)),
        })
    }

    /// Resolve a variable read
    fn resolve_name(&mut self, name: &str, expr: &Expr) -> CompileResult<IrExpr> {
        if let Some(binding) = self.scopes.resolve(self.program, name) {
            return Ok(IrExpr::Load(Var::Binding(binding)));
        }
        if let Some(binding) = self.module.get(name) {
            return Ok(IrExpr::Load(Var::Global(binding.global)));
        }
        if name == "undefined" {
            return Ok(IrExpr::Undefined);
        }
        if let Some(err) = self.forbidden_name(name, expr) {
            return Err(err);
        }
        match Builtin::from_name(name) {
            Some(builtin) => Ok(IrExpr::Builtin(builtin)),
            None => Err(self.error(
                DiagnosticCode::Unresolved,
                format!("cannot find name `{}`", name),
                expr.line,
                expr.column,
            )),
        }
    }

    /// Resolve an assignment target, rejecting immutable bindings
    fn assignable(&mut self, name: &str, expr: &Expr) -> CompileResult<Var> {
        let (var, kind) = if let Some(binding) = self.scopes.resolve(self.program, name) {
            (Var::Binding(binding), self.program.binding(binding).kind)
        } else if let Some(binding) = self.module.get(name) {
            (Var::Global(binding.global), binding.kind)
        } else if let Some(err) = self.forbidden_name(name, expr) {
            return Err(err);
        } else if name == "undefined" || Builtin::from_name(name).is_some() {
            return Err(self.error(
                DiagnosticCode::AssignTarget,
                format!("cannot assign to `{}`", name),
                expr.line,
                expr.column,
            ));
        } else {
            return Err(self.error(
                DiagnosticCode::Unresolved,
                format!("cannot find name `{}`", name),
                expr.line,
                expr.column,
            ));
        };
        if kind.is_immutable() {
            return Err(self.error(
                DiagnosticCode::ConstAssign,
                format!("cannot assign to `{}` because it is a constant", name),
                expr.line,
                expr.column,
            ));
        }
        Ok(var)
    }

    /// Dynamic-evaluation and meta-programming names
    fn forbidden_name(&self, name: &str, expr: &Expr) -> Option<CompileError> {
        let (code, guidance) = match name {
            "eval" => (
                DiagnosticCode::Eval,
                "Call the code directly instead of evaluating source text",
            ),
            "Function" => (
                DiagnosticCode::FunctionConstructor,
                "Use a function declaration or an arrow function",
            ),
            "Proxy" => (
                DiagnosticCode::Proxy,
                "Use a plain object with explicit methods",
            ),
            _ => return None,
        };
        Some(
            self.error(code, format!("`{}` is not supported", name), expr.line, expr.column)
                .with_guidance(guidance),
        )
    }

    fn unsupported(&self, expr: &Expr, message: impl Into<String>) -> CompileError {
        self.error(
            DiagnosticCode::UnsupportedExpression,
            message,
            expr.line,
            expr.column,
        )
    }

    fn bad_target(&self, target: &Expr) -> CompileError {
        self.error(
            DiagnosticCode::AssignTarget,
            format!("cannot assign to a `{}`", target.kind_name()),
            target.line,
            target.column,
        )
    }
}

/// Parse a numeric literal as written in source
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let text: String = text.chars().filter(|&c| c != '_').collect();
    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => 16,
        Some("0o") | Some("0O") => 8,
        Some("0b") | Some("0B") => 2,
        _ => {
            let first = text.chars().next()?;
            if !(first.is_ascii_digit() || first == '.') {
                return None;
            }
            return text.parse::<f64>().ok();
        }
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
    })
}
