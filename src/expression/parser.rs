//! Lexer and recursive-descent parser for the condition language.
//!
//! Keywords (`and`, `or`, `between`, `in`) and function names are matched
//! case-insensitively. A function name is only treated as a function when it is directly
//! followed by `(`, so attributes called `size` or `contains` remain usable as paths.
//! `true` and `false` are case-sensitive literals.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::{CompareOp, Condition, FunctionName, Literal, LogicalOp, Path};

/// Errors produced while parsing or compiling a condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// A token other than the expected one was found.
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What the grammar allows at this point.
        expected: String,
        /// What the input contained.
        found: String,
    },
    /// A character that cannot start any token.
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    /// A string literal without its closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// An identifier followed by `(` that is not a known function.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// A mandatory expression was empty.
    #[error("{0} expression cannot be empty")]
    MissingExpression(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Str(String),
    Number(String),
    True,
    False,
    And,
    Or,
    Between,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    Comma,
    LParen,
    RParen,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Str(s) => write!(f, "string \"{s}\""),
            Self::Number(n) => write!(f, "number {n}"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Between => write!(f, "between"),
            Self::In => write!(f, "in"),
            Self::Eq => write!(f, "'='"),
            Self::Ne => write!(f, "'<>'"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        let single = match ch {
            '=' => Some(Token::Eq),
            '.' => Some(Token::Dot),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(tok) = single {
            self.chars.next();
            return Ok(tok);
        }

        match ch {
            '<' => {
                self.chars.next();
                Ok(match self.chars.peek() {
                    Some('=') => {
                        self.chars.next();
                        Token::Le
                    }
                    Some('>') => {
                        self.chars.next();
                        Token::Ne
                    }
                    _ => Token::Lt,
                })
            }
            '>' => {
                self.chars.next();
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            '"' => self.read_string(),
            '-' | '0'..='9' => self.read_number(),
            c if is_ident_start(c) => Ok(self.read_word()),
            c => Err(ExpressionError::InvalidCharacter(c)),
        }
    }

    fn read_string(&mut self) -> Result<Token, ExpressionError> {
        self.chars.next(); // opening quote
        let mut s = String::new();
        for c in self.chars.by_ref() {
            if c == '"' {
                return Ok(Token::Str(s));
            }
            s.push(c);
        }
        Err(ExpressionError::UnterminatedString)
    }

    fn read_number(&mut self) -> Result<Token, ExpressionError> {
        let mut s = String::new();
        if self.chars.peek() == Some(&'-') {
            s.push('-');
            self.chars.next();
            if !self.chars.peek().is_some_and(char::is_ascii_digit) {
                return Err(ExpressionError::InvalidCharacter('-'));
            }
        }
        self.read_digits(&mut s);

        // Fraction only when a digit follows the dot.
        if self.chars.peek() == Some(&'.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(char::is_ascii_digit) {
                s.push('.');
                self.chars.next();
                self.read_digits(&mut s);
            }
        }

        if matches!(self.chars.peek(), Some('e' | 'E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some('+' | '-')) {
                lookahead.next();
            }
            if lookahead.peek().is_some_and(char::is_ascii_digit) {
                if let Some(e) = self.chars.next() {
                    s.push(e);
                }
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        s.push(sign);
                        self.chars.next();
                    }
                }
                self.read_digits(&mut s);
            }
        }

        Ok(Token::Number(s))
    }

    fn read_digits(&mut self, s: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            s.push(c);
            self.chars.next();
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if !is_ident_continue(c) {
                break;
            }
            word.push(c);
            self.chars.next();
        }

        match word.as_str() {
            "true" => return Token::True,
            "false" => return Token::False,
            _ => {}
        }
        match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "between" => Token::Between,
            "in" => Token::In,
            _ => Token::Identifier(word),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        let tok = self.advance();
        if std::mem::discriminant(&tok) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(unexpected(&expected.to_string(), &tok))
        }
    }

    /// Parses a chain of terms joined by `and`/`or`, grouped strictly left to right.
    fn parse_condition(&mut self) -> Result<Condition, ExpressionError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::And => LogicalOp::And,
                Token::Or => LogicalOp::Or,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Condition::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Condition, ExpressionError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let inner = self.parse_condition()?;
            self.expect(&Token::RParen)?;
            return Ok(Condition::Group(Box::new(inner)));
        }

        if let Token::Identifier(ident) = self.peek() {
            if matches!(self.peek_nth(1), Token::LParen) {
                let ident = ident.clone();
                let name = FunctionName::from_identifier(&ident)
                    .ok_or(ExpressionError::UnknownFunction(ident))?;
                return self.parse_function(name);
            }
        }

        let path = self.parse_path()?;
        self.parse_predicate(path)
    }

    fn parse_function(&mut self, name: FunctionName) -> Result<Condition, ExpressionError> {
        self.advance(); // function name
        self.expect(&Token::LParen)?;
        let path = self.parse_path()?;

        if name == FunctionName::Size {
            self.expect(&Token::RParen)?;
            let op = self.parse_compare_op()?;
            let value = self.parse_literal()?;
            return Ok(Condition::Size { path, op, value });
        }

        let argument = if name.takes_argument() {
            self.expect(&Token::Comma)?;
            Some(self.parse_literal()?)
        } else {
            None
        };
        self.expect(&Token::RParen)?;

        Ok(Condition::Function {
            name,
            path,
            argument,
        })
    }

    fn parse_predicate(&mut self, path: Path) -> Result<Condition, ExpressionError> {
        match self.peek() {
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge => {
                let op = self.parse_compare_op()?;
                let value = self.parse_literal()?;
                Ok(Condition::Compare { path, op, value })
            }
            Token::Between => {
                self.advance();
                let low = self.parse_literal()?;
                self.expect(&Token::And)?;
                let high = self.parse_literal()?;
                Ok(Condition::Between { path, low, high })
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut values = vec![self.parse_literal()?];
                while matches!(self.peek(), Token::Comma) {
                    self.advance();
                    values.push(self.parse_literal()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Condition::In { path, values })
            }
            tok => Err(unexpected("comparator, between or in", tok)),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, ExpressionError> {
        let tok = self.advance();
        match tok {
            Token::Eq => Ok(CompareOp::Eq),
            Token::Ne => Ok(CompareOp::Ne),
            Token::Lt => Ok(CompareOp::Lt),
            Token::Le => Ok(CompareOp::Le),
            Token::Gt => Ok(CompareOp::Gt),
            Token::Ge => Ok(CompareOp::Ge),
            _ => Err(unexpected("comparator", &tok)),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, ExpressionError> {
        let tok = self.advance();
        match tok {
            Token::Str(s) => Ok(Literal::String(s)),
            Token::Number(n) => Ok(Literal::Number(n)),
            Token::True => Ok(Literal::Bool(true)),
            Token::False => Ok(Literal::Bool(false)),
            _ => Err(unexpected("literal", &tok)),
        }
    }

    fn parse_path(&mut self) -> Result<Path, ExpressionError> {
        let mut segments = vec![self.parse_identifier()?];
        while matches!(self.peek(), Token::Dot) {
            self.advance();
            segments.push(self.parse_identifier()?);
        }
        Ok(Path { segments })
    }

    fn parse_identifier(&mut self) -> Result<String, ExpressionError> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            tok => Err(unexpected("attribute name", &tok)),
        }
    }
}

fn unexpected(expected: &str, found: &Token) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        expected: expected.to_owned(),
        found: found.to_string(),
    }
}

/// Parses a complete condition; trailing input is an error.
pub fn parse_condition(input: &str) -> Result<Condition, ExpressionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    let condition = parser.parse_condition()?;
    match parser.peek() {
        Token::Eof => Ok(condition),
        tok => Err(unexpected("and, or or end of input", tok)),
    }
}
