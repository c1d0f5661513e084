use bytes::Bytes;

use crate::call_frame::CallFrame;
use crate::errors::VMError;
use crate::vm::VM;

/// Executes a frame's bytecode.
///
/// The interpreter gets the VM back so it can dispatch nested call
/// primitives, write storage through [`VM::sstore`] and append trace lines
/// through [`VM::write_trace`]. It charges gas from `frame` as it goes and
/// should return [`crate::errors::ExceptionalHalt::Cancelled`] once
/// [`VM::is_cancelled`] turns true.
pub trait Interpreter {
    fn run(&self, vm: &mut VM<'_>, frame: &mut CallFrame, input: &Bytes)
    -> Result<Bytes, VMError>;
}

/// Returns empty output for any code. Useful for plain value transfers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterpreter;

impl Interpreter for NoopInterpreter {
    fn run(
        &self,
        _vm: &mut VM<'_>,
        _frame: &mut CallFrame,
        _input: &Bytes,
    ) -> Result<Bytes, VMError> {
        Ok(Bytes::new())
    }
}
