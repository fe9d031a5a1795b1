//! Error types for expression parsing and resolution.

use thiserror::Error;

/// Coarse classification of an error, stable across message wording.
///
/// The render layer extends this set with its own kinds; see
/// `deckfill_render::ErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed segment, stray brace or disallowed character.
    BadExpression,
    /// An attribute or key was absent at some path step.
    MissingData,
    /// Arguments given to a non-callable, or the callable itself failed.
    NotCallable,
    /// List nesting exceeded the configured broadcast depth.
    ExpansionLimit,
}

/// Errors that can occur when parsing or resolving an expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// The expression text does not follow the segment grammar.
    #[error("bad expression '{expr}': {reason}")]
    BadExpression { expr: String, reason: String },

    /// A segment named an attribute that does not exist.
    #[error("'{segment}' not found while resolving '{expr}'")]
    MissingData { segment: String, expr: String },

    /// A callable could not be invoked, or failed while running.
    #[error("cannot call '{name}' in '{expr}': {reason}")]
    NotCallable {
        name: String,
        expr: String,
        reason: String,
    },

    /// Broadcasting went deeper than allowed.
    #[error("'{expr}' nests lists deeper than {depth} levels")]
    ExpansionLimit { expr: String, depth: usize },
}

impl ExprError {
    pub(crate) fn bad(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        ExprError::BadExpression {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExprError::BadExpression { .. } => ErrorKind::BadExpression,
            ExprError::MissingData { .. } => ErrorKind::MissingData,
            ExprError::NotCallable { .. } => ErrorKind::NotCallable,
            ExprError::ExpansionLimit { .. } => ErrorKind::ExpansionLimit,
        }
    }

    /// The expression this error was raised for.
    pub fn expression(&self) -> &str {
        match self {
            ExprError::BadExpression { expr, .. }
            | ExprError::MissingData { expr, .. }
            | ExprError::NotCallable { expr, .. }
            | ExprError::ExpansionLimit { expr, .. } => expr,
        }
    }
}

/// Error returned by a callable or a lazy collection.
///
/// Collaborators report failures as plain messages; the resolver wraps them
/// into [`ExprError::NotCallable`] with the segment and expression attached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CallError(pub String);

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        CallError(message.into())
    }
}

/// Error returned when a date value cannot be formatted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FormatError(pub String);

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;
