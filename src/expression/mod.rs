//! Condition language compiler.
//!
//! Callers write key conditions, filters and put conditions in a small readable language
//! (`PK = "USER#1" and begins_with(SK, "ORDER#")`). This module turns that text into the
//! placeholder form DynamoDB expects:
//!
//! 1. **Lexing and parsing** into a [`Condition`] tree ([`parser`]).
//! 2. **Compiling** the tree into expression text plus name/value placeholder maps
//!    ([`compiler`]).

pub mod ast;
pub mod compiler;
pub mod parser;

pub use ast::{CompareOp, Condition, FunctionName, Literal, LogicalOp, Path};
pub use compiler::{compile_filter, compile_key, CompiledExpression};
pub use parser::{parse_condition, ExpressionError};
