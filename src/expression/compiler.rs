//! Placeholder compiler.
//!
//! Walks a [`Condition`] left to right and rewrites it into the wire form: every path
//! segment becomes a `#segment` name placeholder and every literal a fresh `:n` value
//! placeholder. Compilation state (names, values, next index) is an explicit value: it is
//! seeded from a previous [`CompiledExpression`] and returned in the new one, which is how
//! a key condition and a filter share one request without colliding.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use super::ast::{Condition, FunctionName, Literal, Path};
use super::parser::{parse_condition, ExpressionError};

const FIRST_VALUE_INDEX: usize = 1;

/// A condition rewritten into wire form, plus its placeholder maps.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    /// Expression text referencing only placeholders.
    pub expression: String,
    /// `#placeholder` to real attribute name.
    pub attribute_names: HashMap<String, String>,
    /// `:n` placeholder to value.
    pub attribute_values: HashMap<String, AttributeValue>,
    /// Index the next chained expression starts numbering values from.
    pub next_value_index: usize,
}

/// Compiles an optional filter or condition expression.
///
/// Returns `Ok(None)` when `text` is absent or empty. Placeholder numbering continues from
/// `previous` when one is supplied.
pub fn compile_filter(
    text: Option<&str>,
    previous: Option<&CompiledExpression>,
) -> Result<Option<CompiledExpression>, ExpressionError> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };
    let condition = parse_condition(text)?;
    let mut emitter = Emitter::new(previous);
    emitter.condition(&condition);
    Ok(Some(emitter.finish()))
}

/// Compiles a mandatory key condition expression.
pub fn compile_key(
    text: &str,
    previous: Option<&CompiledExpression>,
) -> Result<CompiledExpression, ExpressionError> {
    compile_filter(Some(text), previous)?.ok_or(ExpressionError::MissingExpression("key"))
}

struct Emitter {
    text: String,
    // Suppresses the separator before the next token.
    glue: bool,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_index: usize,
}

impl Emitter {
    fn new(previous: Option<&CompiledExpression>) -> Self {
        let (names, values, next_index) = previous.map_or_else(
            || (HashMap::new(), HashMap::new(), FIRST_VALUE_INDEX),
            |p| {
                (
                    p.attribute_names.clone(),
                    p.attribute_values.clone(),
                    p.next_value_index,
                )
            },
        );
        Self {
            text: String::new(),
            glue: true,
            names,
            values,
            next_index,
        }
    }

    fn token(&mut self, token: &str) {
        let attach = self.glue || token.starts_with(&[')', ',', '.'][..]);
        if !attach {
            self.text.push(' ');
        }
        self.text.push_str(token);
        self.glue = token.ends_with(&['(', '.'][..]);
    }

    fn function(&mut self, name: FunctionName) {
        self.token(name.as_str());
        self.glue = true;
    }

    fn path(&mut self, path: &Path) {
        for (i, segment) in path.segments.iter().enumerate() {
            if i > 0 {
                self.token(".");
            }
            let placeholder = format!("#{segment}");
            self.names.insert(placeholder.clone(), segment.clone());
            self.token(&placeholder);
        }
    }

    fn literal(&mut self, literal: &Literal) {
        let placeholder = format!(":{}", self.next_index);
        self.next_index += 1;
        self.values
            .insert(placeholder.clone(), literal.to_attribute_value());
        self.token(&placeholder);
    }

    fn condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Compare { path, op, value } => {
                self.path(path);
                self.token(op.as_str());
                self.literal(value);
            }
            Condition::Between { path, low, high } => {
                self.path(path);
                self.token("between");
                self.literal(low);
                self.token("and");
                self.literal(high);
            }
            Condition::In { path, values } => {
                self.path(path);
                self.token("in");
                self.token("(");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.token(",");
                    }
                    self.literal(value);
                }
                self.token(")");
            }
            Condition::Function {
                name,
                path,
                argument,
            } => {
                self.function(*name);
                self.token("(");
                self.path(path);
                if let Some(argument) = argument {
                    self.token(",");
                    self.literal(argument);
                }
                self.token(")");
            }
            Condition::Size { path, op, value } => {
                self.function(FunctionName::Size);
                self.token("(");
                self.path(path);
                self.token(")");
                self.token(op.as_str());
                self.literal(value);
            }
            Condition::Logical { op, left, right } => {
                self.condition(left);
                self.token(op.as_str());
                self.condition(right);
            }
            Condition::Group(inner) => {
                self.token("(");
                self.condition(inner);
                self.token(")");
            }
        }
    }

    fn finish(self) -> CompiledExpression {
        CompiledExpression {
            expression: self.text,
            attribute_names: self.names,
            attribute_values: self.values,
            next_value_index: self.next_index,
        }
    }
}
