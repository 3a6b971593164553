//! Execution result types for the suspendable interpreter
//!
//! A frame either completes, throws, suspends at an `await`, or fails with
//! a host-level error (malformed code, output failure). Script exceptions
//! are values and travel as [`Abrupt::Throw`]; host errors never reach
//! script handlers.

use crate::compiler::bytecode::DecodeError;
use crate::vm::value::Value;
use crate::vm::VmError;

/// Result of running a frame
#[derive(Debug)]
pub enum ExecutionResult {
    /// Returned a value
    Completed(Value),
    /// Threw a value no handler of the frame caught
    Threw(Value),
    /// Suspended at an `await`; the frame now waits on a promise
    Suspended,
    /// Host-level failure
    Failed(VmError),
}

/// Control flow directive from executing one instruction
#[derive(Debug)]
pub enum ControlFlow {
    /// Continue with the next instruction (or a jump target already set)
    Continue,
    /// Return from the current function
    Return(Value),
    /// Suspend on the awaited value
    Suspend(Value),
}

/// Non-local exit of an operation
#[derive(Debug)]
pub enum Abrupt {
    /// Script exception
    Throw(Value),
    /// Host-level failure
    Error(VmError),
}

impl From<VmError> for Abrupt {
    fn from(error: VmError) -> Self {
        Abrupt::Error(error)
    }
}

impl From<DecodeError> for Abrupt {
    fn from(error: DecodeError) -> Self {
        Abrupt::Error(VmError::Decode(error))
    }
}

impl From<std::io::Error> for Abrupt {
    fn from(error: std::io::Error) -> Self {
        Abrupt::Error(VmError::Output(error))
    }
}

/// Result of an operation that may throw
pub type Completion<T = Value> = Result<T, Abrupt>;
