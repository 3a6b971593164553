use crate::compiler::bytecode::{Builtin, BytecodeReader, ConstantPool, Opcode};
use crate::vm::interpreter::{Completion, ControlFlow, Frame, Local, Vm};
use crate::vm::object::{Object, ObjectKind};
use crate::vm::value::{CellRef, Value};
use crate::vm::VmError;
use std::cell::RefCell;
use std::rc::Rc;

impl<'o> Vm<'o> {
    pub(in crate::vm::interpreter) fn exec_variable_ops(
        &mut self,
        frame: &mut Frame,
        reader: &mut BytecodeReader<'_>,
        constants: &ConstantPool,
        opcode: Opcode,
    ) -> Completion<ControlFlow> {
        match opcode {
            // =========================================================
            // Constants
            // =========================================================
            Opcode::ConstUndefined => frame.push(Value::Undefined),
            Opcode::ConstNull => frame.push(Value::Null),
            Opcode::ConstTrue => frame.push(Value::Bool(true)),
            Opcode::ConstFalse => frame.push(Value::Bool(false)),
            Opcode::ConstNumber => {
                let index = reader.read_u32()?;
                let n = constants.get_number(index).ok_or_else(|| {
                    VmError::InvalidProgram(format!("number constant {} out of range", index))
                })?;
                frame.push(Value::Number(n));
            }
            Opcode::ConstString => {
                let index = reader.read_u32()?;
                frame.push(Value::from(string_constant(constants, index)?));
            }

            // =========================================================
            // Stack
            // =========================================================
            Opcode::Pop => {
                frame.pop()?;
            }
            Opcode::Dup => {
                let top = frame.pop()?;
                frame.push(top.clone());
                frame.push(top);
            }
            Opcode::Swap => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(b);
                frame.push(a);
            }

            // =========================================================
            // Locals and capture cells
            // =========================================================
            Opcode::LoadLocal => {
                let slot = reader.read_u16()?;
                let value = match frame.local(slot)? {
                    Local::Value(value) => value.clone(),
                    Local::Cell(cell) => cell.borrow().clone(),
                };
                frame.push(value);
            }
            Opcode::StoreLocal => {
                let slot = reader.read_u16()?;
                let value = frame.pop()?;
                *frame.local_mut(slot)? = Local::Value(value);
            }
            Opcode::NewCell => {
                let slot = reader.read_u16()?;
                *frame.local_mut(slot)? = Local::Cell(new_cell(Value::Undefined));
            }
            Opcode::BoxLocal => {
                let slot = reader.read_u16()?;
                let local = frame.local_mut(slot)?;
                if let Local::Value(value) = local {
                    *local = Local::Cell(new_cell(std::mem::take(value)));
                }
            }
            Opcode::LoadCell => {
                let slot = reader.read_u16()?;
                let value = match frame.local(slot)? {
                    Local::Cell(cell) => cell.borrow().clone(),
                    Local::Value(value) => value.clone(),
                };
                frame.push(value);
            }
            Opcode::StoreCell => {
                let slot = reader.read_u16()?;
                let value = frame.pop()?;
                match frame.local_mut(slot)? {
                    Local::Cell(cell) => *cell.borrow_mut() = value,
                    local => *local = Local::Value(value),
                }
            }
            Opcode::CaptureLocal => {
                let slot = reader.read_u16()?;
                let local = frame.local_mut(slot)?;
                let cell = match local {
                    Local::Cell(cell) => cell.clone(),
                    Local::Value(value) => {
                        let cell = new_cell(std::mem::take(value));
                        *local = Local::Cell(cell.clone());
                        cell
                    }
                };
                frame.captures.push(cell);
                frame.push(Value::Undefined);
            }

            // =========================================================
            // Environment
            // =========================================================
            Opcode::LoadEnv => {
                let index = reader.read_u16()?;
                let value = frame.env_cell(index)?.borrow().clone();
                frame.push(value);
            }
            Opcode::StoreEnv => {
                let index = reader.read_u16()?;
                let value = frame.pop()?;
                *frame.env_cell(index)?.borrow_mut() = value;
            }
            Opcode::CaptureEnv => {
                let index = reader.read_u16()?;
                let cell = frame.env_cell(index)?.clone();
                frame.captures.push(cell);
                frame.push(Value::Undefined);
            }

            // =========================================================
            // Globals and builtins
            // =========================================================
            Opcode::LoadGlobal => {
                let index = reader.read_u32()?;
                let value = self
                    .globals
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| VmError::InvalidProgram(format!("global {} out of range", index)))?;
                frame.push(value);
            }
            Opcode::StoreGlobal => {
                let index = reader.read_u32()?;
                let value = frame.pop()?;
                let slot = self
                    .globals
                    .get_mut(index as usize)
                    .ok_or_else(|| VmError::InvalidProgram(format!("global {} out of range", index)))?;
                *slot = value;
            }
            Opcode::LoadBuiltin => {
                let id = reader.read_u8()?;
                let builtin = Builtin::from_u8(id)
                    .ok_or_else(|| VmError::InvalidProgram(format!("unknown builtin {}", id)))?;
                let value = self.builtin_value(builtin);
                frame.push(value);
            }

            _ => {
                return Err(VmError::InvalidProgram(format!(
                    "{} is not a variable opcode",
                    opcode.name()
                ))
                .into())
            }
        }
        Ok(ControlFlow::Continue)
    }

    /// Value of a builtin identifier
    pub(crate) fn builtin_value(&mut self, builtin: Builtin) -> Value {
        match builtin {
            Builtin::NaN => Value::Number(f64::NAN),
            Builtin::Infinity => Value::Number(f64::INFINITY),
            _ => self.builtin_values[builtin as usize]
                .get_or_insert_with(|| Value::object(Object::new(ObjectKind::Builtin(builtin))))
                .clone(),
        }
    }
}

fn new_cell(value: Value) -> CellRef {
    Rc::new(RefCell::new(value))
}

/// String constant by pool index
pub(super) fn string_constant(constants: &ConstantPool, index: u32) -> Result<&str, VmError> {
    constants
        .get_string(index)
        .ok_or_else(|| VmError::InvalidProgram(format!("string constant {} out of range", index)))
}
