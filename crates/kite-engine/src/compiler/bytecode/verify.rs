//! Bytecode verification
//!
//! Every function is checked before it is written and again when it is
//! loaded: operands must reference existing constants, locals, globals,
//! functions, classes and property sites; jumps and handlers must land on
//! instruction boundaries; and a dataflow pass proves the operand stack
//! depth is consistent at every merge point and never exceeds `max_stack`.

use super::constants::ConstantPool;
use super::opcode::{decode_all, Builtin, Instruction, Opcode};
use super::unit::{Function, Unit};

/// Bytecode verification errors
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Code could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Stack underflow
    #[error("Stack underflow at offset {0}")]
    StackUnderflow(usize),

    /// Stack deeper than declared
    #[error("Stack overflow at offset {offset} (depth {depth}, max {max})")]
    StackOverflow {
        /// Offending instruction
        offset: usize,
        /// Computed depth
        depth: usize,
        /// Declared maximum
        max: usize,
    },

    /// Two paths reach an instruction with different depths
    #[error("Inconsistent stack depth at offset {offset}: {first} vs {second}")]
    StackMismatch {
        /// Merge point
        offset: usize,
        /// Depth recorded first
        first: usize,
        /// Depth of the conflicting path
        second: usize,
    },

    /// Suspension with live operand stack entries
    #[error("Await at offset {0} suspends with a non-empty operand stack")]
    AwaitWithLiveStack(usize),

    /// Jump into the middle of an instruction or outside the code
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Target offset
        target: usize,
        /// Jumping instruction
        offset: usize,
    },

    /// Bad exception handler range
    #[error("Invalid exception handler [{start}, {end}) -> {target}")]
    InvalidHandler {
        /// Range start
        start: u32,
        /// Range end
        end: u32,
        /// Handler entry
        target: u32,
    },

    /// Index operand out of range
    #[error("Invalid {what} reference {index} (limit {limit}) at offset {offset}")]
    InvalidReference {
        /// Kind of referenced entity
        what: &'static str,
        /// Referenced index
        index: u32,
        /// Exclusive limit
        limit: u32,
        /// Instruction offset
        offset: usize,
    },

    /// Async-only instruction in an ordinary function, or malformed dispatch
    #[error("Invalid async instruction {opcode} at offset {offset}")]
    InvalidAsync {
        /// Opcode mnemonic
        opcode: &'static str,
        /// Instruction offset
        offset: usize,
    },

    /// Execution falls off the end
    #[error("Execution falls off end of function at offset {0}")]
    FallOffEnd(usize),

    /// Error located in a named function
    #[error("in function `{function}`: {error}")]
    InFunction {
        /// Function name
        function: String,
        /// Underlying error
        error: Box<VerifyError>,
    },
}

/// Program-wide index limits a function is checked against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramLimits {
    /// Total number of functions across all units
    pub function_count: u32,
    /// Number of classes
    pub class_count: u32,
    /// Number of module-level bindings
    pub global_count: u32,
    /// Number of property access sites
    pub site_count: u32,
}

/// Verify every function of a unit
pub fn verify_unit(unit: &Unit, limits: &ProgramLimits) -> Result<(), VerifyError> {
    for function in &unit.functions {
        verify_function(function, &unit.constants, limits).map_err(|error| {
            VerifyError::InFunction {
                function: format!("{}::{}", unit.name, function.name),
                error: Box::new(error),
            }
        })?;
    }
    Ok(())
}

/// Verify a single function
pub fn verify_function(
    function: &Function,
    constants: &ConstantPool,
    limits: &ProgramLimits,
) -> Result<(), VerifyError> {
    let instructions =
        decode_all(&function.code).map_err(|e| VerifyError::Decode(e.to_string()))?;
    let Some(last) = instructions.last() else {
        return Err(VerifyError::FallOffEnd(0));
    };
    if !last.opcode.is_terminator() {
        return Err(VerifyError::FallOffEnd(last.offset));
    }

    let index_of = |offset: usize| {
        instructions
            .binary_search_by_key(&offset, |instr| instr.offset)
            .ok()
    };

    for instr in &instructions {
        for &target in &instr.targets {
            if index_of(target).is_none() {
                return Err(VerifyError::InvalidJumpTarget {
                    target,
                    offset: instr.offset,
                });
            }
        }
        check_operands(instr, function, constants, limits)?;
    }

    let code_len = function.code.len() as u32;
    for h in &function.handlers {
        let boundary = |offset: u32| offset == code_len || index_of(offset as usize).is_some();
        if h.start >= h.end
            || h.end > code_len
            || !boundary(h.start)
            || !boundary(h.end)
            || index_of(h.target as usize).is_none()
        {
            return Err(VerifyError::InvalidHandler {
                start: h.start,
                end: h.end,
                target: h.target,
            });
        }
    }

    verify_stack_depth(function, &instructions, &index_of)
}

fn check_operands(
    instr: &Instruction,
    function: &Function,
    constants: &ConstantPool,
    limits: &ProgramLimits,
) -> Result<(), VerifyError> {
    let check = |what: &'static str, index: u32, limit: u32| {
        if index < limit {
            Ok(())
        } else {
            Err(VerifyError::InvalidReference {
                what,
                index,
                limit,
                offset: instr.offset,
            })
        }
    };
    let strings = constants.strings.len() as u32;
    let is_async = function.is_async();

    use Opcode::*;
    match instr.opcode {
        ConstNumber => check("number constant", instr.operand(0), constants.numbers.len() as u32),
        ConstString | DefineField | DeleteProp => check("string constant", instr.operand(0), strings),
        LoadLocal | StoreLocal | NewCell | BoxLocal | LoadCell | StoreCell | CaptureLocal => {
            check("local", instr.operand(0), function.local_count as u32)
        }
        LoadEnv | StoreEnv | CaptureEnv => {
            check("environment", instr.operand(0), function.env_size as u32)
        }
        LoadGlobal | StoreGlobal => check("global", instr.operand(0), limits.global_count),
        LoadBuiltin => check("builtin", instr.operand(0), Builtin::COUNT),
        LoadClass => check("class", instr.operand(0), limits.class_count),
        SuperCall => check("class", instr.operand(0), limits.class_count),
        MakeClosure => check("function", instr.operand(0), limits.function_count),
        GetProp | SetProp | CallMethod | CallMethodSpread => {
            check("string constant", instr.operand(0), strings)?;
            check("property site", instr.operand(1), limits.site_count)
        }
        Await => {
            if !is_async {
                return Err(VerifyError::InvalidAsync {
                    opcode: instr.opcode.name(),
                    offset: instr.offset,
                });
            }
            check("async state", instr.operand(0), function.state_count as u32)
        }
        AsyncDispatch => {
            if !is_async || instr.operand(0) != function.state_count as u32 || instr.offset != 0 {
                return Err(VerifyError::InvalidAsync {
                    opcode: instr.opcode.name(),
                    offset: instr.offset,
                });
            }
            Ok(())
        }
        Resume if !is_async => Err(VerifyError::InvalidAsync {
            opcode: instr.opcode.name(),
            offset: instr.offset,
        }),
        _ => Ok(()),
    }
}

fn verify_stack_depth(
    function: &Function,
    instructions: &[Instruction],
    index_of: &dyn Fn(usize) -> Option<usize>,
) -> Result<(), VerifyError> {
    let max = function.max_stack as usize;
    let mut depth: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut worklist: Vec<(usize, usize)> = vec![(0, 0)];
    for h in &function.handlers {
        if let Some(index) = index_of(h.target as usize) {
            worklist.push((index, 1));
        }
    }

    while let Some((index, incoming)) = worklist.pop() {
        let instr = &instructions[index];
        match depth[index] {
            Some(existing) if existing == incoming => continue,
            Some(existing) => {
                return Err(VerifyError::StackMismatch {
                    offset: instr.offset,
                    first: existing,
                    second: incoming,
                })
            }
            None => depth[index] = Some(incoming),
        }
        if incoming > max {
            return Err(VerifyError::StackOverflow {
                offset: instr.offset,
                depth: incoming,
                max,
            });
        }

        let (pops, pushes) = instr.stack_effect();
        if incoming < pops {
            return Err(VerifyError::StackUnderflow(instr.offset));
        }
        let after = incoming - pops + pushes;
        if after > max {
            return Err(VerifyError::StackOverflow {
                offset: instr.offset,
                depth: after,
                max,
            });
        }
        if instr.opcode == Opcode::Await && after != 0 {
            return Err(VerifyError::AwaitWithLiveStack(instr.offset));
        }

        for &target in &instr.targets {
            if let Some(t) = index_of(target) {
                worklist.push((t, after));
            }
        }
        if !instr.opcode.is_terminator() {
            if index + 1 >= instructions.len() {
                return Err(VerifyError::FallOffEnd(instr.offset));
            }
            worklist.push((index + 1, after));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::encoder::BytecodeWriter;
    use crate::compiler::bytecode::unit::{function_flags, Handler};

    fn function(code: Vec<u8>, max_stack: u16) -> Function {
        Function {
            name: "f".to_string(),
            param_names: vec![],
            local_count: 2,
            max_stack,
            env_size: 0,
            state_count: 0,
            flags: 0,
            source_file: 0,
            code,
            handlers: vec![],
            lines: vec![],
        }
    }

    fn limits() -> ProgramLimits {
        ProgramLimits {
            function_count: 1,
            class_count: 0,
            global_count: 1,
            site_count: 0,
        }
    }

    #[test]
    fn test_simple_function_verifies() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::ConstTrue);
        w.emit_opcode(Opcode::ConstFalse);
        w.emit_opcode(Opcode::StrictEq);
        w.emit_opcode(Opcode::Return);
        let f = function(w.into_bytes(), 2);
        assert!(verify_function(&f, &ConstantPool::new(), &limits()).is_ok());
    }

    #[test]
    fn test_underflow_is_rejected() {
        let f = function(vec![Opcode::Add as u8, Opcode::Return as u8], 4);
        assert_eq!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::StackUnderflow(0))
        );
    }

    #[test]
    fn test_declared_max_stack_is_enforced() {
        let code = vec![
            Opcode::ConstNull as u8,
            Opcode::ConstNull as u8,
            Opcode::Pop as u8,
            Opcode::Return as u8,
        ];
        let f = function(code, 1);
        assert!(matches!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::StackOverflow { depth: 2, .. })
        ));
    }

    #[test]
    fn test_fall_off_end_is_rejected() {
        let f = function(vec![Opcode::ConstNull as u8, Opcode::Pop as u8], 1);
        assert_eq!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::FallOffEnd(1))
        );
    }

    #[test]
    fn test_merge_with_different_depths_is_rejected() {
        // true ? (push 1 value) : (push 2 values) then return
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::ConstTrue); // 0
        w.emit_opcode(Opcode::JmpIfFalse); // 1
        w.emit_i32(7); // -> 8
        w.emit_opcode(Opcode::ConstNull); // 6
        w.emit_opcode(Opcode::ConstNull); // 7
        w.emit_opcode(Opcode::ConstNull); // 8
        w.emit_opcode(Opcode::Return); // 9
        let f = function(w.into_bytes(), 4);
        assert!(matches!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::StackMismatch { offset: 8, .. })
        ));
    }

    #[test]
    fn test_jump_into_operand_is_rejected() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::Jmp);
        w.emit_i32(2);
        w.emit_opcode(Opcode::ConstUndefined);
        w.emit_opcode(Opcode::Return);
        let f = function(w.into_bytes(), 1);
        assert!(matches!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::InvalidJumpTarget { target: 2, .. })
        ));
    }

    #[test]
    fn test_out_of_range_references_are_rejected() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::LoadGlobal);
        w.emit_u32(5);
        w.emit_opcode(Opcode::Return);
        let f = function(w.into_bytes(), 1);
        assert!(matches!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::InvalidReference { what: "global", index: 5, .. })
        ));
    }

    #[test]
    fn test_handler_entry_starts_with_thrown_value() {
        // try { throw null } catch { return it }
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::ConstNull); // 0
        w.emit_opcode(Opcode::Throw); // 1
        w.emit_opcode(Opcode::Return); // 2: handler, thrown value on stack
        let mut f = function(w.into_bytes(), 1);
        f.handlers.push(Handler {
            start: 0,
            end: 2,
            target: 2,
        });
        assert!(verify_function(&f, &ConstantPool::new(), &limits()).is_ok());
    }

    #[test]
    fn test_await_requires_async_function() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::ConstNull);
        w.emit_opcode(Opcode::Await);
        w.emit_u16(0);
        let f = function(w.into_bytes(), 1);
        assert!(matches!(
            verify_function(&f, &ConstantPool::new(), &limits()),
            Err(VerifyError::InvalidAsync { .. })
        ));
    }

    #[test]
    fn test_state_machine_dispatch_verifies() {
        // dispatch [s0 -> 11, s1 -> 14]; s0: null; await 0 ; s1: resume; return
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::AsyncDispatch); // 0
        w.emit_u16(2);
        w.emit_i32(11);
        w.emit_i32(15);
        w.emit_opcode(Opcode::ConstNull); // 11
        w.emit_opcode(Opcode::Await); // 12
        w.emit_u16(1);
        w.emit_opcode(Opcode::Resume); // 15
        w.emit_opcode(Opcode::Return); // 16
        let mut f = function(w.into_bytes(), 1);
        f.flags = function_flags::ASYNC;
        f.state_count = 2;
        assert!(verify_function(&f, &ConstantPool::new(), &limits()).is_ok());
    }
}
