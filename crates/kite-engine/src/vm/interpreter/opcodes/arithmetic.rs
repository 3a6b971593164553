use crate::compiler::bytecode::Opcode;
use crate::vm::interpreter::{Completion, ControlFlow, Frame, Vm};
use crate::vm::runtime::{add, compare, loose_equals, strict_equals, to_number, Relation};
use crate::vm::value::Value;
use crate::vm::VmError;

impl<'o> Vm<'o> {
    pub(in crate::vm::interpreter) fn exec_arithmetic_ops(
        &mut self,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> Completion<ControlFlow> {
        match opcode {
            // =========================================================
            // Unary
            // =========================================================
            Opcode::Neg | Opcode::ToNumber | Opcode::Not | Opcode::TypeOf | Opcode::IsNullish => {
                let value = frame.pop()?;
                let result = match opcode {
                    Opcode::Neg => Value::Number(-to_number(&value)),
                    Opcode::ToNumber => Value::Number(to_number(&value)),
                    Opcode::Not => Value::Bool(!value.is_truthy()),
                    Opcode::TypeOf => Value::from(value.type_of()),
                    _ => Value::Bool(value.is_nullish()),
                };
                frame.push(result);
            }

            // =========================================================
            // Binary
            // =========================================================
            _ => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                let number = |f: fn(f64, f64) -> f64| Value::Number(f(to_number(&a), to_number(&b)));
                let result = match opcode {
                    Opcode::Add => add(&a, &b, &self.shapes),
                    Opcode::Sub => number(|x, y| x - y),
                    Opcode::Mul => number(|x, y| x * y),
                    Opcode::Div => number(|x, y| x / y),
                    // truncated remainder, sign of the dividend
                    Opcode::Mod => number(|x, y| x % y),
                    Opcode::Lt => Value::Bool(compare(&a, &b, Relation::Less)),
                    Opcode::Le => Value::Bool(compare(&a, &b, Relation::LessEqual)),
                    Opcode::Gt => Value::Bool(compare(&a, &b, Relation::Greater)),
                    Opcode::Ge => Value::Bool(compare(&a, &b, Relation::GreaterEqual)),
                    Opcode::LooseEq => Value::Bool(loose_equals(&a, &b, &self.shapes)),
                    Opcode::LooseNe => Value::Bool(!loose_equals(&a, &b, &self.shapes)),
                    Opcode::StrictEq => Value::Bool(strict_equals(&a, &b)),
                    Opcode::StrictNe => Value::Bool(!strict_equals(&a, &b)),
                    _ => {
                        return Err(VmError::InvalidProgram(format!(
                            "{} is not an arithmetic opcode",
                            opcode.name()
                        ))
                        .into())
                    }
                };
                frame.push(result);
            }
        }
        Ok(ControlFlow::Continue)
    }
}
