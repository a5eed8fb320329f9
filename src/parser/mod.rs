//! Bundle parsing.
//!
//! This module handles:
//! - Error-tolerant parsing of bundled scripts with oxc
//! - Lowering the oxc AST into an owned, ESTree-shaped syntax tree

pub mod ast_parser;
pub mod tree;

pub use ast_parser::{BundleParser, ParsedBundle};
pub use tree::{Scalar, Span, SyntaxNode, Value};
