//! Diagnostics shared by every stage of the While toolchain.
//!
//! Each pass reports at most one [`Diagnostic`]: a kind, a human-readable
//! message, and the source span the problem is anchored to. Passes abort on
//! the first error; there is no recovery.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// Classification of a diagnostic, one per failure mode of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown character, unterminated string/char, bad escape.
    Lexical,
    /// Token mismatch, duplicate declaration, undeclared name, and other
    /// structural problems caught during parsing.
    Syntax,
    /// Operator or subtype violation found by the type checker.
    Type,
    /// Statement follows an unconditional transfer.
    UnreachableCode,
    /// Non-void method with a fall-through path.
    MissingReturn,
    /// Variable read before assignment on some path.
    DefiniteAssignment,
    /// Fault raised while executing the program.
    Runtime,
    /// Invariant violated inside the compiler itself.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Type => "type error",
            ErrorKind::UnreachableCode => "unreachable code",
            ErrorKind::MissingReturn => "missing return",
            ErrorKind::DefiniteAssignment => "definite assignment error",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// A single reported failure with its source location.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }
}

/// A specialized `Result` carrying a [`Diagnostic`] on failure.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Convenience constructor for an error result.
pub fn err<T>(kind: ErrorKind, message: impl Into<String>, span: Span) -> Result<T> {
    Err(Diagnostic::new(kind, message, span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind() {
        let d = Diagnostic::new(ErrorKind::Type, "expected int, found bool", Span::new(4, 7));
        assert_eq!(d.to_string(), "type error: expected int, found bool");
    }

    #[test]
    fn err_helper_builds_diagnostic() {
        let r: Result<()> = err(ErrorKind::Lexical, "unexpected character '#'", Span::new(0, 0));
        let d = r.unwrap_err();
        assert_eq!(d.kind, ErrorKind::Lexical);
        assert_eq!(d.span, Span::new(0, 0));
    }
}
