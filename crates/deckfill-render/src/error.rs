//! Error types for rendering.
//!
//! Rendering never stops at the first problem. Each unit of work (a
//! placeholder, a page, a loop section) records its errors and processing
//! continues with its siblings. [`Outcome`] carries an output together with
//! the errors recorded while producing it; [`RenderErrors`] is the complete
//! list reported when a top-level call fails.

use std::fmt;

use deckfill_expr::ExprError;
use thiserror::Error;

/// Coarse classification of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadExpression,
    MissingData,
    NotCallable,
    ExpansionLimit,
    PermissionDenied,
    LoopStructure,
    CollectionResolution,
    Format,
    Usage,
    Layout,
    Config,
}

impl From<deckfill_expr::ErrorKind> for ErrorKind {
    fn from(kind: deckfill_expr::ErrorKind) -> Self {
        match kind {
            deckfill_expr::ErrorKind::BadExpression => ErrorKind::BadExpression,
            deckfill_expr::ErrorKind::MissingData => ErrorKind::MissingData,
            deckfill_expr::ErrorKind::NotCallable => ErrorKind::NotCallable,
            deckfill_expr::ErrorKind::ExpansionLimit => ErrorKind::ExpansionLimit,
        }
    }
}

/// Error type for rendering operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// Parsing or resolving a placeholder expression failed.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// The authorization predicate rejected a resolved value.
    #[error("permission denied for expression '{expr}': {value}")]
    PermissionDenied { expr: String, value: String },

    /// Loop markers are nested, unterminated, unmatched or mixed on one page.
    #[error("loop structure error on page {page}: {reason}")]
    LoopStructure { page: usize, reason: String },

    /// A loop collection is missing, unresolvable or not iterable.
    #[error("cannot iterate '{expr}': {reason}")]
    CollectionResolution { expr: String, reason: String },

    /// A format specifier could not be applied.
    #[error("cannot format '{expr}': {reason}")]
    Format { expr: String, reason: String },

    /// Text or arguments used in a way the processor does not support.
    #[error("usage error: {0}")]
    Usage(String),

    /// Layout lookup or composition input problem.
    #[error("layout error: {0}")]
    Layout(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An error attributed to an output page (1-based).
    #[error("page {page}: {error}")]
    OnPage {
        page: usize,
        #[source]
        error: Box<RenderError>,
    },
}

impl RenderError {
    /// Taxonomy tag of this error; page attribution is looked through.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Expr(e) => e.kind().into(),
            RenderError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            RenderError::LoopStructure { .. } => ErrorKind::LoopStructure,
            RenderError::CollectionResolution { .. } => ErrorKind::CollectionResolution,
            RenderError::Format { .. } => ErrorKind::Format,
            RenderError::Usage(_) => ErrorKind::Usage,
            RenderError::Layout(_) => ErrorKind::Layout,
            RenderError::Config(_) => ErrorKind::Config,
            RenderError::OnPage { error, .. } => error.kind(),
        }
    }

    /// Attributes this error to an output page.
    pub fn on_page(self, page: usize) -> Self {
        match self {
            RenderError::OnPage { .. } | RenderError::LoopStructure { .. } => self,
            other => RenderError::OnPage {
                page,
                error: Box::new(other),
            },
        }
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(err: serde_yaml::Error) -> Self {
        RenderError::Config(err.to_string())
    }
}

/// Every error recorded by a failed top-level call, in the order found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderErrors(Vec<RenderError>);

impl RenderErrors {
    pub fn new(errors: Vec<RenderError>) -> Self {
        Self(errors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderError> {
        self.0.iter()
    }

    /// The kind of every error, in order.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.0.iter().map(RenderError::kind).collect()
    }

    pub fn into_vec(self) -> Vec<RenderError> {
        self.0
    }
}

impl fmt::Display for RenderErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rendering aborted with {} error(s):", self.0.len())?;
        for err in &self.0 {
            writeln!(f, " - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderErrors {}

impl From<RenderError> for RenderErrors {
    fn from(err: RenderError) -> Self {
        Self(vec![err])
    }
}

impl From<Vec<RenderError>> for RenderErrors {
    fn from(errors: Vec<RenderError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for RenderErrors {
    type Item = RenderError;
    type IntoIter = std::vec::IntoIter<RenderError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RenderErrors {
    type Item = &'a RenderError;
    type IntoIter = std::slice::Iter<'a, RenderError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An output paired with the errors recorded while producing it.
///
/// The output is always present, possibly degraded (empty strings for
/// failed placeholders, skipped pages for failed loops). Callers decide
/// whether to keep it with [`Outcome::into_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub output: T,
    pub errors: Vec<RenderError>,
}

impl<T> Outcome<T> {
    /// An outcome with no errors.
    pub fn new(output: T) -> Self {
        Self {
            output,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(output: T, errors: Vec<RenderError>) -> Self {
        Self { output, errors }
    }

    /// Records an error.
    pub fn record(&mut self, err: RenderError) {
        tracing::warn!(kind = ?err.kind(), "{}", err);
        self.errors.push(err);
    }

    /// Moves another outcome's errors into this one and returns its output.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.errors.extend(other.errors);
        other.output
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            output: f(self.output),
            errors: self.errors,
        }
    }

    /// Rewrites every recorded error.
    pub fn map_errors(self, f: impl FnMut(RenderError) -> RenderError) -> Outcome<T> {
        Outcome {
            output: self.output,
            errors: self.errors.into_iter().map(f).collect(),
        }
    }

    /// Keeps the output only if no error was recorded.
    pub fn into_result(self) -> Result<T, RenderErrors> {
        if self.errors.is_empty() {
            Ok(self.output)
        } else {
            Err(RenderErrors(self.errors))
        }
    }
}
