//! Opcode handler modules for the interpreter
//!
//! Each module implements one category of opcodes as methods on [`Vm`](super::Vm).

mod arithmetic;
mod calls;
mod control_flow;
mod objects;
mod variables;
