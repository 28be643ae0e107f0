//! While language syntax definitions and abstract syntax tree.
//!
//! This crate provides the foundational types shared by every stage of the
//! `wlc` toolchain: source spans, tokens, AST nodes, and diagnostics. All
//! other crates in the workspace depend on it.

pub mod ast;
pub mod error;
pub mod span;
pub mod token;

pub use ast::*;
pub use error::{err, Diagnostic, ErrorKind, Result};
pub use span::Span;
pub use token::{Token, TokenKind};
