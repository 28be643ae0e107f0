//! While interpreter: executes the elaborated AST with a tree walker.
//!
//! This crate provides the runtime for the While language. It realises
//! strict value semantics: every assignment, declaration and argument
//! transfer installs an owned copy of the source value, so mutation of one
//! variable is never observable through another.

pub mod flow;
pub mod interpreter;
pub mod value;

pub use interpreter::Interpreter;
pub use value::Value;
