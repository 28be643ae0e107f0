//! Control flow sentinels for the interpreter.

use crate::value::Value;

/// How control left a statement or block. `Return` carries the returned
/// value (`Value::Null` for a bare `return`), which is how the caller
/// distinguishes "returned" from "fell through".
#[derive(Debug)]
pub(crate) enum Flow {
    /// Fall through to the next statement.
    Next,
    /// Leave the enclosing loop.
    Break,
    /// Resume the next iteration of the enclosing loop.
    Continue,
    /// Unwind out of the current method with a value.
    Return(Value),
}
