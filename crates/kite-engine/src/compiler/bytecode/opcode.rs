//! Instruction set of the Kite VM
//!
//! All opcodes are single bytes followed by fixed little-endian operands,
//! except `AsyncDispatch` which carries a u16 state count followed by one
//! i32 offset per state. Jump offsets are relative to the first byte of the
//! jumping instruction.

use super::encoder::{BytecodeReader, DecodeError};

/// Bytecode opcode enumeration
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Constants
/// - 0x10-0x1F: Stack manipulation
/// - 0x20-0x2F: Locals, capture cells, environment and globals
/// - 0x30-0x3F: Arithmetic and unary operators
/// - 0x40-0x4F: Comparison
/// - 0x50-0x5F: Control flow and async suspension
/// - 0x60-0x6F: Calls and closures
/// - 0x70-0x7F: Objects, arrays and classes
/// - 0x80-0x8F: Console output
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Push `undefined`
    ConstUndefined = 0x01,
    /// Push `null`
    ConstNull = 0x02,
    /// Push `true`
    ConstTrue = 0x03,
    /// Push `false`
    ConstFalse = 0x04,
    /// Push number constant (operand: u32 pool index)
    ConstNumber = 0x05,
    /// Push string constant (operand: u32 pool index)
    ConstString = 0x06,

    // ===== Stack (0x10-0x1F) =====
    /// Pop top value
    Pop = 0x10,
    /// Duplicate top value
    Dup = 0x11,
    /// Swap top two values
    Swap = 0x12,

    // ===== Variables (0x20-0x2F) =====
    /// Load local slot (operand: u16 slot)
    LoadLocal = 0x20,
    /// Store into local slot (operand: u16 slot)
    StoreLocal = 0x21,
    /// Put a fresh `undefined` capture cell into a slot (operand: u16 slot)
    NewCell = 0x22,
    /// Wrap the slot's current value into a capture cell (operand: u16 slot)
    BoxLocal = 0x23,
    /// Load through the cell held in a slot (operand: u16 slot)
    LoadCell = 0x24,
    /// Store through the cell held in a slot (operand: u16 slot)
    StoreCell = 0x25,
    /// Load through the closure environment (operand: u16 index)
    LoadEnv = 0x26,
    /// Store through the closure environment (operand: u16 index)
    StoreEnv = 0x27,
    /// Push the cell held in a slot, for closure creation (operand: u16 slot)
    CaptureLocal = 0x28,
    /// Push an environment cell, for closure creation (operand: u16 index)
    CaptureEnv = 0x29,
    /// Load module-level binding (operand: u32 global)
    LoadGlobal = 0x2A,
    /// Store module-level binding (operand: u32 global)
    StoreGlobal = 0x2B,
    /// Push a builtin value (operand: u8 builtin id)
    LoadBuiltin = 0x2C,

    // ===== Arithmetic (0x30-0x3F) =====
    /// Dynamic `+` (concatenation or numeric addition)
    Add = 0x30,
    /// Numeric subtraction
    Sub = 0x31,
    /// Numeric multiplication
    Mul = 0x32,
    /// Numeric division
    Div = 0x33,
    /// Numeric remainder
    Mod = 0x34,
    /// Numeric negation
    Neg = 0x35,
    /// Unary plus
    ToNumber = 0x36,
    /// Logical not
    Not = 0x37,
    /// `typeof`
    TypeOf = 0x38,

    // ===== Comparison (0x40-0x4F) =====
    /// `<`
    Lt = 0x40,
    /// `<=`
    Le = 0x41,
    /// `>`
    Gt = 0x42,
    /// `>=`
    Ge = 0x43,
    /// `==`
    LooseEq = 0x44,
    /// `!=`
    LooseNe = 0x45,
    /// `===`
    StrictEq = 0x46,
    /// `!==`
    StrictNe = 0x47,
    /// Push whether the popped value is `null` or `undefined`
    IsNullish = 0x48,

    // ===== Control Flow (0x50-0x5F) =====
    /// Unconditional jump (operand: i32 offset)
    Jmp = 0x50,
    /// Jump if popped value is falsy (operand: i32 offset)
    JmpIfFalse = 0x51,
    /// Jump if popped value is truthy (operand: i32 offset)
    JmpIfTrue = 0x52,
    /// Return popped value
    Return = 0x53,
    /// Throw popped value
    Throw = 0x54,
    /// Jump to the resume point of the current async state (operands: u16 count, count x i32)
    AsyncDispatch = 0x55,
    /// Suspend on the popped operand, resuming later in state (operand: u16 state)
    Await = 0x56,
    /// Push the settled value of the last await, or throw its rejection
    Resume = 0x57,

    // ===== Calls (0x60-0x6F) =====
    /// Call with `this = undefined` (operand: u8 argc)
    Call = 0x60,
    /// Call a named method of the receiver (operands: u32 name, u32 site, u8 argc)
    CallMethod = 0x61,
    /// Construct (operand: u8 argc)
    New = 0x62,
    /// Run the parent constructor on `this` (operands: u32 class, u8 argc)
    SuperCall = 0x63,
    /// Call with arguments taken from an array
    CallSpread = 0x64,
    /// Construct with arguments taken from an array
    NewSpread = 0x65,
    /// Call `receiver[key]` with arguments taken from an array
    InvokeDynamic = 0x66,
    /// Call a named method with arguments taken from an array (operands: u32 name, u32 site)
    CallMethodSpread = 0x67,
    /// Create a closure over popped cells (operands: u32 function, u16 captures)
    MakeClosure = 0x68,

    // ===== Objects (0x70-0x7F) =====
    /// Push a new empty object
    NewObject = 0x70,
    /// Build an array from popped values (operand: u16 count)
    NewArray = 0x71,
    /// Append a value to an array, leaving the array
    ArrayPush = 0x72,
    /// Append all elements of an array to an array, leaving the array
    ArraySpread = 0x73,
    /// Read a named property through a property site (operands: u32 name, u32 site)
    GetProp = 0x74,
    /// Write a named property through a property site (operands: u32 name, u32 site)
    SetProp = 0x75,
    /// Read a computed property
    GetIndex = 0x76,
    /// Write a computed property
    SetIndex = 0x77,
    /// Define a field on an object literal, leaving the object (operand: u32 name)
    DefineField = 0x78,
    /// Delete a named property (operand: u32 name)
    DeleteProp = 0x79,
    /// Push a class value (operand: u32 class)
    LoadClass = 0x7A,

    // ===== Output (0x80-0x8F) =====
    /// Print popped values joined by spaces (operand: u8 count)
    Print = 0x80,
}

/// Operand encodings following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// 8-bit unsigned
    U8,
    /// 16-bit unsigned
    U16,
    /// 32-bit unsigned
    U32,
    /// 32-bit signed jump offset
    I32,
}

use OperandKind::{I32, U16, U32, U8};

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Nop,
            0x01 => Self::ConstUndefined,
            0x02 => Self::ConstNull,
            0x03 => Self::ConstTrue,
            0x04 => Self::ConstFalse,
            0x05 => Self::ConstNumber,
            0x06 => Self::ConstString,
            0x10 => Self::Pop,
            0x11 => Self::Dup,
            0x12 => Self::Swap,
            0x20 => Self::LoadLocal,
            0x21 => Self::StoreLocal,
            0x22 => Self::NewCell,
            0x23 => Self::BoxLocal,
            0x24 => Self::LoadCell,
            0x25 => Self::StoreCell,
            0x26 => Self::LoadEnv,
            0x27 => Self::StoreEnv,
            0x28 => Self::CaptureLocal,
            0x29 => Self::CaptureEnv,
            0x2A => Self::LoadGlobal,
            0x2B => Self::StoreGlobal,
            0x2C => Self::LoadBuiltin,
            0x30 => Self::Add,
            0x31 => Self::Sub,
            0x32 => Self::Mul,
            0x33 => Self::Div,
            0x34 => Self::Mod,
            0x35 => Self::Neg,
            0x36 => Self::ToNumber,
            0x37 => Self::Not,
            0x38 => Self::TypeOf,
            0x40 => Self::Lt,
            0x41 => Self::Le,
            0x42 => Self::Gt,
            0x43 => Self::Ge,
            0x44 => Self::LooseEq,
            0x45 => Self::LooseNe,
            0x46 => Self::StrictEq,
            0x47 => Self::StrictNe,
            0x48 => Self::IsNullish,
            0x50 => Self::Jmp,
            0x51 => Self::JmpIfFalse,
            0x52 => Self::JmpIfTrue,
            0x53 => Self::Return,
            0x54 => Self::Throw,
            0x55 => Self::AsyncDispatch,
            0x56 => Self::Await,
            0x57 => Self::Resume,
            0x60 => Self::Call,
            0x61 => Self::CallMethod,
            0x62 => Self::New,
            0x63 => Self::SuperCall,
            0x64 => Self::CallSpread,
            0x65 => Self::NewSpread,
            0x66 => Self::InvokeDynamic,
            0x67 => Self::CallMethodSpread,
            0x68 => Self::MakeClosure,
            0x70 => Self::NewObject,
            0x71 => Self::NewArray,
            0x72 => Self::ArrayPush,
            0x73 => Self::ArraySpread,
            0x74 => Self::GetProp,
            0x75 => Self::SetProp,
            0x76 => Self::GetIndex,
            0x77 => Self::SetIndex,
            0x78 => Self::DefineField,
            0x79 => Self::DeleteProp,
            0x7A => Self::LoadClass,
            0x80 => Self::Print,
            _ => return None,
        })
    }

    /// Human-readable mnemonic
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::ConstUndefined => "CONST_UNDEFINED",
            Self::ConstNull => "CONST_NULL",
            Self::ConstTrue => "CONST_TRUE",
            Self::ConstFalse => "CONST_FALSE",
            Self::ConstNumber => "CONST_NUMBER",
            Self::ConstString => "CONST_STRING",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::NewCell => "NEW_CELL",
            Self::BoxLocal => "BOX_LOCAL",
            Self::LoadCell => "LOAD_CELL",
            Self::StoreCell => "STORE_CELL",
            Self::LoadEnv => "LOAD_ENV",
            Self::StoreEnv => "STORE_ENV",
            Self::CaptureLocal => "CAPTURE_LOCAL",
            Self::CaptureEnv => "CAPTURE_ENV",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::StoreGlobal => "STORE_GLOBAL",
            Self::LoadBuiltin => "LOAD_BUILTIN",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::ToNumber => "TO_NUMBER",
            Self::Not => "NOT",
            Self::TypeOf => "TYPEOF",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::LooseEq => "LOOSE_EQ",
            Self::LooseNe => "LOOSE_NE",
            Self::StrictEq => "STRICT_EQ",
            Self::StrictNe => "STRICT_NE",
            Self::IsNullish => "IS_NULLISH",
            Self::Jmp => "JMP",
            Self::JmpIfFalse => "JMP_IF_FALSE",
            Self::JmpIfTrue => "JMP_IF_TRUE",
            Self::Return => "RETURN",
            Self::Throw => "THROW",
            Self::AsyncDispatch => "ASYNC_DISPATCH",
            Self::Await => "AWAIT",
            Self::Resume => "RESUME",
            Self::Call => "CALL",
            Self::CallMethod => "CALL_METHOD",
            Self::New => "NEW",
            Self::SuperCall => "SUPER_CALL",
            Self::CallSpread => "CALL_SPREAD",
            Self::NewSpread => "NEW_SPREAD",
            Self::InvokeDynamic => "INVOKE_DYNAMIC",
            Self::CallMethodSpread => "CALL_METHOD_SPREAD",
            Self::MakeClosure => "MAKE_CLOSURE",
            Self::NewObject => "NEW_OBJECT",
            Self::NewArray => "NEW_ARRAY",
            Self::ArrayPush => "ARRAY_PUSH",
            Self::ArraySpread => "ARRAY_SPREAD",
            Self::GetProp => "GET_PROP",
            Self::SetProp => "SET_PROP",
            Self::GetIndex => "GET_INDEX",
            Self::SetIndex => "SET_INDEX",
            Self::DefineField => "DEFINE_FIELD",
            Self::DeleteProp => "DELETE_PROP",
            Self::LoadClass => "LOAD_CLASS",
            Self::Print => "PRINT",
        }
    }

    /// Fixed operands of this opcode (the dispatch table of `AsyncDispatch` is not included)
    pub fn operands(self) -> &'static [OperandKind] {
        match self {
            Self::ConstNumber
            | Self::ConstString
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::DefineField
            | Self::DeleteProp
            | Self::LoadClass => &[U32],
            Self::LoadLocal
            | Self::StoreLocal
            | Self::NewCell
            | Self::BoxLocal
            | Self::LoadCell
            | Self::StoreCell
            | Self::LoadEnv
            | Self::StoreEnv
            | Self::CaptureLocal
            | Self::CaptureEnv
            | Self::NewArray
            | Self::Await
            | Self::AsyncDispatch => &[U16],
            Self::LoadBuiltin | Self::Call | Self::New | Self::Print => &[U8],
            Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue => &[I32],
            Self::CallMethod => &[U32, U32, U8],
            Self::SuperCall => &[U32, U8],
            Self::CallMethodSpread | Self::GetProp | Self::SetProp => &[U32, U32],
            Self::MakeClosure => &[U32, U16],
            _ => &[],
        }
    }

    /// Whether this opcode is a (conditional or unconditional) jump
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue)
    }

    /// Whether execution never falls through to the next instruction
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::Return | Self::Throw | Self::Await | Self::AsyncDispatch
        )
    }
}

/// Host values reachable through `LoadBuiltin`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `console`
    Console = 0,
    /// `Promise`
    Promise = 1,
    /// `queueMicrotask`
    QueueMicrotask = 2,
    /// `Error`
    Error = 3,
    /// `TypeError`
    TypeError = 4,
    /// `String`
    String = 5,
    /// `Number`
    Number = 6,
    /// `NaN`
    NaN = 7,
    /// `Infinity`
    Infinity = 8,
    /// `Boolean`
    Boolean = 9,
}

impl Builtin {
    /// Number of builtin ids
    pub const COUNT: u32 = 10;

    /// Resolve a free identifier to a builtin
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "console" => Self::Console,
            "Promise" => Self::Promise,
            "queueMicrotask" => Self::QueueMicrotask,
            "Error" => Self::Error,
            "TypeError" => Self::TypeError,
            "String" => Self::String,
            "Number" => Self::Number,
            "NaN" => Self::NaN,
            "Infinity" => Self::Infinity,
            "Boolean" => Self::Boolean,
            _ => return None,
        })
    }

    /// Convert an operand byte to a builtin
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Console,
            1 => Self::Promise,
            2 => Self::QueueMicrotask,
            3 => Self::Error,
            4 => Self::TypeError,
            5 => Self::String,
            6 => Self::Number,
            7 => Self::NaN,
            8 => Self::Infinity,
            9 => Self::Boolean,
            _ => return None,
        })
    }

    /// Source-level name
    pub fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Promise => "Promise",
            Self::QueueMicrotask => "queueMicrotask",
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::String => "String",
            Self::Number => "Number",
            Self::NaN => "NaN",
            Self::Infinity => "Infinity",
            Self::Boolean => "Boolean",
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// Decoded fixed operands, in order
    pub operands: Vec<i64>,
    /// Absolute jump targets (jumps and dispatch tables)
    pub targets: Vec<usize>,
    /// Encoded size in bytes
    pub size: usize,
}

impl Instruction {
    /// Operand `index` as u32
    pub fn operand(&self, index: usize) -> u32 {
        self.operands.get(index).copied().unwrap_or(0) as u32
    }

    /// Values popped and pushed by this instruction
    pub fn stack_effect(&self) -> (usize, usize) {
        use Opcode::*;
        let arg = |i: usize| self.operand(i) as usize;
        match self.opcode {
            Nop | Jmp | AsyncDispatch | NewCell | BoxLocal => (0, 0),
            ConstUndefined | ConstNull | ConstTrue | ConstFalse | ConstNumber | ConstString
            | LoadLocal | LoadCell | LoadEnv | CaptureLocal | CaptureEnv | LoadGlobal
            | LoadBuiltin | Resume | NewObject | LoadClass => (0, 1),
            Pop | StoreLocal | StoreCell | StoreEnv | StoreGlobal | JmpIfFalse | JmpIfTrue
            | Return | Throw | Await => (1, 0),
            Dup => (1, 2),
            Swap => (2, 2),
            Neg | ToNumber | Not | TypeOf | IsNullish | GetProp | DeleteProp => (1, 1),
            Add | Sub | Mul | Div | Mod | Lt | Le | Gt | Ge | LooseEq | LooseNe | StrictEq
            | StrictNe | GetIndex | SetProp | ArrayPush | ArraySpread | DefineField
            | CallSpread | NewSpread | CallMethodSpread => (2, 1),
            SetIndex | InvokeDynamic => (3, 1),
            Call | New => (arg(0) + 1, 1),
            CallMethod => (arg(2) + 1, 1),
            SuperCall => (arg(1), 1),
            MakeClosure => (arg(1), 1),
            NewArray => (arg(0), 1),
            Print => (arg(0), 0),
        }
    }
}

/// Decode the instruction starting at `offset`
pub fn decode_instruction(code: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let mut reader = BytecodeReader::new(code);
    reader.seek(offset);
    let opcode = reader.read_opcode()?;
    let mut operands = Vec::with_capacity(3);
    let mut targets = Vec::new();
    for kind in opcode.operands() {
        let value = match kind {
            U8 => reader.read_u8()? as i64,
            U16 => reader.read_u16()? as i64,
            U32 => reader.read_u32()? as i64,
            I32 => {
                let rel = reader.read_i32()? as i64;
                targets.push(offset as i64 + rel);
                rel
            }
        };
        operands.push(value);
    }
    if opcode == Opcode::AsyncDispatch {
        let count = operands[0] as usize;
        for _ in 0..count {
            let rel = reader.read_i32()? as i64;
            targets.push(offset as i64 + rel);
        }
    }
    let targets = targets
        .into_iter()
        .map(|t| if t < 0 { usize::MAX } else { t as usize })
        .collect();
    Ok(Instruction {
        offset,
        opcode,
        operands,
        targets,
        size: reader.position() - offset,
    })
}

/// Decode every instruction of a code buffer
pub fn decode_all(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let instr = decode_instruction(code, offset)?;
        offset += instr.size;
        out.push(instr);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::encoder::BytecodeWriter;

    #[test]
    fn test_every_opcode_round_trips_through_from_u8() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op as u8, byte, "{}", op.name());
            }
        }
    }

    #[test]
    fn test_decode_jump_targets_are_absolute() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::Nop);
        w.emit_opcode(Opcode::Jmp);
        w.emit_i32(-1);
        let instrs = decode_all(w.buffer()).unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[1].targets, vec![0]);
        assert_eq!(instrs[1].size, 5);
    }

    #[test]
    fn test_decode_dispatch_table() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::AsyncDispatch);
        w.emit_u16(2);
        w.emit_i32(11);
        w.emit_i32(12);
        let instr = decode_instruction(w.buffer(), 0).unwrap();
        assert_eq!(instr.targets, vec![11, 12]);
        assert_eq!(instr.size, 11);
        assert!(instr.opcode.is_terminator());
    }

    #[test]
    fn test_call_method_stack_effect() {
        let mut w = BytecodeWriter::new();
        w.emit_opcode(Opcode::CallMethod);
        w.emit_u32(0);
        w.emit_u32(3);
        w.emit_u8(2);
        let instr = decode_instruction(w.buffer(), 0).unwrap();
        assert_eq!(instr.stack_effect(), (3, 1));
    }
}
