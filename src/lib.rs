//! Pegrun - Runtime PEG Matching Engine
//!
//! This is the execution core of a Parsing Expression Grammar runtime: given
//! a grammar expressed as a graph of composable matchers and an input text,
//! it decides whether the text conforms, produces a parse tree, evaluates
//! semantic actions against a value stack, and, in richer runs, reports and
//! recovers from syntax errors. It provides:
//! - A matcher graph arena with stable handles and cycle-friendly proxies
//! - A frame-reusing matcher-context machine with O(1) backtracking
//! - A persistent value stack with constant-time snapshot/restore
//! - Pluggable match handlers for basic, reporting and recovering runs
//! - Parse runners that locate errors, name expected alternatives, and
//!   resynchronize
//! - A serde-backed declarative graph schema for action-free grammars
//! - Parallel batch parsing over one shared grammar
//!
//! ## Quick Start
//!
//! ```rust
//! use pegrun::{BasicParseRunner, GraphBuilder, ParseRunner};
//!
//! // number <- [0-9]+ , then an action turning the match into a value
//! let mut b = GraphBuilder::<i64>::new();
//! let digit = b.char_range('0', '9');
//! let digits = b.one_or_more(digit);
//! let to_value = b.action(|ctx| {
//!     let text = ctx.get_match()?;
//!     ctx.value_stack().push(text.parse::<i64>()?);
//!     Ok(true)
//! });
//! let number = b.seq([digits, to_value]);
//! let graph = b.build().unwrap();
//!
//! let runner = BasicParseRunner::new(&graph, number);
//! let result = runner.parse("1234").unwrap();
//! assert!(result.matched);
//! assert_eq!(result.result_value, Some(1234));
//! ```
//!
//! ## Error reporting
//!
//! ```rust
//! use pegrun::{GraphBuilder, ParseRunner, ReportingParseRunner};
//!
//! let mut b = GraphBuilder::<()>::new();
//! let a = b.ch('a');
//! let root = b.one_or_more(a);
//! let graph = b.build().unwrap();
//!
//! let result = ReportingParseRunner::new(&graph, root).parse("b").unwrap();
//! assert!(!result.matched);
//! assert_eq!(result.parse_errors[0].position.line, 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Debug logging through the `log` crate
//! - `parallel` - Batch parsing over a rayon thread pool

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

pub mod buffer;
pub mod chars;
pub mod context;
pub mod errors;
pub mod graph;
pub mod handlers;
pub mod matchers;
pub mod node;
pub mod parallel;
pub mod runner;
pub mod schema;
pub mod stack;

// ============================================================================
// Input & Values
// ============================================================================

pub use buffer::{InputBuffer, Position, EOI};
pub use stack::{StackIter, StackSnapshot, ValueStack};

// ============================================================================
// Matcher Graph
// ============================================================================

pub use chars::CharSet;
pub use graph::{GraphAnalysis, GraphBuilder, MatcherGraph};
pub use matchers::{
    ActionFn, ActionResult, FramedVar, Matcher, MatcherKind, MatcherRef, MatcherVisitor, RuleVar,
};

// ============================================================================
// Execution Core
// ============================================================================

pub use context::{ActionContext, MatcherContext, DEFAULT_MAX_RECURSION_DEPTH};
pub use handlers::{
    BasicMatchHandler, ErrorCollectingHandler, ErrorLocatingHandler, MatchHandler,
};

// ============================================================================
// Results & Errors
// ============================================================================

pub use errors::{MatcherPath, MatcherPathElement, ParseError, ParseRuntimeError};
pub use node::ParseNode;

// ============================================================================
// Runners
// ============================================================================

pub use runner::{
    BasicParseRunner, ParseRunner, ParsingResult, RecoveringParseRunner, ReportingParseRunner,
    DEFAULT_MAX_RECOVERIES,
};

// ============================================================================
// Declarative Schema & Batch Parsing
// ============================================================================

pub use parallel::{parse_batch_parallel, parse_batch_parallel_owned};
pub use schema::{GraphSchema, MatcherSchema};
