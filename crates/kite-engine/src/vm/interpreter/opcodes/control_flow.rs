use crate::compiler::bytecode::{BytecodeReader, Function, Opcode};
use crate::vm::interpreter::{Abrupt, Completion, ControlFlow, Frame, Vm};
use crate::vm::promise::Settled;
use crate::vm::VmError;

impl<'o> Vm<'o> {
    pub(in crate::vm::interpreter) fn exec_control_ops(
        &mut self,
        frame: &mut Frame,
        reader: &mut BytecodeReader<'_>,
        function: &Function,
        opcode: Opcode,
        instr_pc: usize,
    ) -> Completion<ControlFlow> {
        match opcode {
            Opcode::Jmp => {
                let offset = reader.read_i32()?;
                jump(reader, function, instr_pc, offset)?;
            }
            Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                let offset = reader.read_i32()?;
                let condition = frame.pop()?.is_truthy();
                if condition == (opcode == Opcode::JmpIfTrue) {
                    jump(reader, function, instr_pc, offset)?;
                }
            }
            Opcode::Return => return Ok(ControlFlow::Return(frame.pop()?)),
            Opcode::Throw => return Err(Abrupt::Throw(frame.pop()?)),

            // =========================================================
            // Async state machine
            // =========================================================
            Opcode::AsyncDispatch => {
                let count = reader.read_u16()?;
                let mut target = None;
                for state in 0..count {
                    let offset = reader.read_i32()?;
                    if state == frame.state {
                        target = Some(offset);
                    }
                }
                let Some(offset) = target else {
                    return Err(VmError::InvalidProgram(format!(
                        "`{}` has no async state {}",
                        function.name, frame.state
                    ))
                    .into());
                };
                jump(reader, function, instr_pc, offset)?;
            }
            Opcode::Await => {
                let state = reader.read_u16()?;
                let awaited = frame.pop()?;
                frame.state = state;
                return Ok(ControlFlow::Suspend(awaited));
            }
            Opcode::Resume => match frame.resume.take() {
                Some(Settled::Fulfilled(value)) => frame.push(value),
                Some(Settled::Rejected(reason)) => return Err(Abrupt::Throw(reason)),
                None => {
                    return Err(VmError::InvalidProgram(format!(
                        "`{}` resumed without a settled await",
                        function.name
                    ))
                    .into())
                }
            },

            _ => {
                return Err(VmError::InvalidProgram(format!(
                    "{} is not a control flow opcode",
                    opcode.name()
                ))
                .into())
            }
        }
        Ok(ControlFlow::Continue)
    }
}

/// Move the reader to `instr_pc + offset`
fn jump(reader: &mut BytecodeReader<'_>, function: &Function, instr_pc: usize, offset: i32) -> Result<(), VmError> {
    let target = instr_pc as i64 + offset as i64;
    if target < 0 || target as usize >= function.code.len() {
        return Err(VmError::InvalidProgram(format!(
            "jump to {} outside `{}`",
            target, function.name
        )));
    }
    reader.seek(target as usize);
    Ok(())
}
