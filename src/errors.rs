//! Error types
//!
//! Three distinct failure channels exist and must not be conflated:
//!
//! 1. routine PEG mismatch: a `false` return with state rolled back, never
//!    an error value;
//! 2. user-visible parse errors: [`ParseError`] values collected by the
//!    reporting and recovering runners;
//! 3. aborts: [`ParseRuntimeError`] for illegal API usage, recursion
//!    overrun, or a failure escaping a semantic action (wrapped exactly once
//!    with the input position and matcher path).

use crate::buffer::Position;
use std::error::Error;
use std::fmt;

/// One element of a [`MatcherPath`]: a matcher label and where its frame
/// started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherPathElement {
    /// Label of the matcher at this level.
    pub label: String,
    /// Input index at which the matcher's frame started.
    pub start_index: usize,
}

/// The chain of matchers from the root down to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherPath {
    /// Path elements, root first.
    pub elements: Vec<MatcherPathElement>,
}

impl MatcherPath {
    /// Label of the deepest matcher on the path.
    pub fn leaf_label(&self) -> &str {
        self.elements
            .last()
            .map(|e| e.label.as_str())
            .unwrap_or("")
    }
}

impl fmt::Display for MatcherPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&element.label)?;
        }
        Ok(())
    }
}

/// A user-visible syntax error collected during a reporting or recovering
/// run.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Input index of the error, in original-input coordinates.
    pub error_index: usize,
    /// Line/column of `error_index`.
    pub position: Position,
    /// Paths of the matchers that failed at the error index: the
    /// expected-set.
    pub failed_paths: Vec<MatcherPath>,
    /// Optional override message.
    pub message: Option<String>,
}

impl ParseError {
    /// Create a parse error.
    pub fn new(
        error_index: usize,
        position: Position,
        failed_paths: Vec<MatcherPath>,
        message: Option<String>,
    ) -> Self {
        Self {
            error_index,
            position,
            failed_paths,
            message,
        }
    }

    /// Deduplicated labels of the matchers that were expected at the error
    /// position, in first-failure order.
    pub fn expected_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for path in &self.failed_paths {
            let label = path.leaf_label();
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            return write!(f, "{} at {}", message, self.position);
        }
        let expected = self.expected_labels();
        if expected.is_empty() {
            write!(f, "Invalid input at {}", self.position)
        } else {
            write!(
                f,
                "Invalid input at {}, expected one of: {}",
                self.position,
                expected.join(", ")
            )
        }
    }
}

impl Error for ParseError {}

/// A failure that aborts the parse.
#[derive(Debug)]
pub enum ParseRuntimeError {
    /// A precondition of the engine API was violated.
    IllegalUsage {
        /// What was violated.
        message: String,
    },
    /// A semantic action returned an error; wrapped once with position and
    /// path.
    Action {
        /// Input index at which the action ran.
        error_index: usize,
        /// Matcher path of the action frame.
        path: String,
        /// The underlying failure.
        source: Box<dyn Error + Send + Sync>,
    },
    /// The frame stack outgrew the configured limit.
    RecursionLimitExceeded {
        /// Depth that was requested.
        depth: usize,
        /// Configured limit.
        max_depth: usize,
    },
}

impl ParseRuntimeError {
    /// Shorthand for an [`ParseRuntimeError::IllegalUsage`] value.
    pub fn usage(message: impl Into<String>) -> Self {
        ParseRuntimeError::IllegalUsage {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseRuntimeError::IllegalUsage { message } => {
                write!(f, "illegal usage: {}", message)
            }
            ParseRuntimeError::Action {
                error_index,
                path,
                source,
            } => {
                write!(
                    f,
                    "error while evaluating action at input position {} in {}: {}",
                    error_index, path, source
                )
            }
            ParseRuntimeError::RecursionLimitExceeded { depth, max_depth } => {
                write!(
                    f,
                    "Recursion limit exceeded: depth {} exceeds limit of {}",
                    depth, max_depth
                )
            }
        }
    }
}

impl Error for ParseRuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseRuntimeError::Action { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
