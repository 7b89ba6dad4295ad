//! Error type definitions for the expression engine
//!
//! This module defines all error types used throughout the engine,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level expression engine error type
///
/// Groups the failure modes of the full pipeline (preprocess → lex → parse
/// → evaluate → apply). Uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum ExpressionError {
    /// Tokenization failures
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    /// Grammar / token mismatch failures
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Evaluation-time failures (numeric coercion, regex compilation)
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Helper invocation failures
    #[error("Helper error: {0}")]
    Helper(#[from] HelperError),
}

/// Lexer error with source position
///
/// `position` is the byte offset into the (preprocessed) expression text;
/// `line` and `column` are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    pub message: String,
    pub position: usize,
    pub line: u32,
    pub column: u32,
}

/// Parser error with source position of the offending token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    pub fn new<M: Into<String>>(message: M, position: usize, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            position,
            line,
            column,
        }
    }
}

/// Evaluation errors
///
/// These surface lazily: a rule can parse cleanly and still fail at
/// evaluation time against a particular record.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Numeric comparison against a value that does not parse as a number
    #[error("Non-numeric operand for numeric comparison on field '{field}': '{value}'")]
    NonNumericOperand { field: String, value: String },

    /// Regex compilation failure, detected at first evaluation
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Helper invocation errors, propagated from a helper's `process`
#[derive(Error, Debug)]
pub enum HelperError {
    /// Unknown operation for a helper (e.g. `@time:frobnicate`)
    #[error("Helper '{helper}' does not support operation '{operation}'")]
    UnknownOperation { helper: String, operation: String },

    /// Malformed or missing arguments
    #[error("Helper '{helper}': {message}")]
    InvalidArguments { helper: String, message: String },

    /// Datetime parsing / formatting failure inside the time helper
    #[error("Helper 'time': {message}")]
    Time { message: String },

    /// Logo resolver call-out failure
    #[error("Helper 'logo': {message}")]
    LogoResolver { message: String },
}

impl HelperError {
    pub fn unknown_operation<H: Into<String>, O: Into<String>>(helper: H, operation: O) -> Self {
        Self::UnknownOperation {
            helper: helper.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_arguments<H: Into<String>, M: Into<String>>(helper: H, message: M) -> Self {
        Self::InvalidArguments {
            helper: helper.into(),
            message: message.into(),
        }
    }

    pub fn time<M: Into<String>>(message: M) -> Self {
        Self::Time {
            message: message.into(),
        }
    }
}
