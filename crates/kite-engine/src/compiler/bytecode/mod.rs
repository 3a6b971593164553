//! Kite VM Bytecode Definitions
//!
//! This module provides the instruction set, the binary unit format, the
//! constant pool and the verifier shared by the code generator and the VM
//! loader.

pub mod constants;
pub mod encoder;
pub mod opcode;
pub mod unit;
pub mod verify;

pub use constants::ConstantPool;
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::{decode_all, decode_instruction, Builtin, Instruction, Opcode};
pub use unit::{
    function_flags, ClassDef, Declaration, DeclarationKind, DecoratorEntry, Function, Handler,
    LineEntry, Metadata, MethodEntry, SiteEntry, Unit, UnitError, UnitKind,
};
pub use verify::{verify_function, verify_unit, ProgramLimits, VerifyError};
