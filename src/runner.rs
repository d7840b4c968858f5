//! Parse runners
//!
//! A runner owns one way of driving the matcher-context machine over an
//! input. The basic runner does a single pass and reports only success or
//! failure. The reporting runner escalates a failed parse into located,
//! explained errors; the recovering runner additionally resynchronizes and
//! keeps parsing, so one run can surface several errors.
//!
//! Fast string matching is enabled for first passes only: once the input has
//! proven to contain errors, string literals degrade to character sequences
//! so failures can be located at character granularity.

use crate::buffer::InputBuffer;
use crate::context::{MatcherContext, DEFAULT_MAX_RECURSION_DEPTH};
use crate::errors::{ParseError, ParseRuntimeError};
use crate::graph::MatcherGraph;
use crate::handlers::{BasicMatchHandler, ErrorCollectingHandler, ErrorLocatingHandler};
use crate::matchers::MatcherRef;
use crate::node::ParseNode;
use crate::stack::ValueStack;
use std::sync::Arc;

/// Default bound on resynchronization attempts of the recovering runner.
pub const DEFAULT_MAX_RECOVERIES: usize = 16;

/// Everything a parsing run produced.
pub struct ParsingResult<V: Clone> {
    /// Whether the root matcher matched.
    pub matched: bool,
    /// Root of the parse tree, when one was built.
    pub root_node: Option<Arc<ParseNode<V>>>,
    /// User-visible errors collected by reporting/recovering runs.
    pub parse_errors: Vec<ParseError>,
    /// Final state of the value stack.
    pub value_stack: ValueStack<V>,
    /// The value on top of the stack, if any: the conventional parse result.
    pub result_value: Option<V>,
}

impl<V: Clone> ParsingResult<V> {
    /// True if any parse errors were collected.
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty()
    }
}

impl<V: Clone> std::fmt::Debug for ParsingResult<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingResult")
            .field("matched", &self.matched)
            .field("root_node", &self.root_node)
            .field("parse_errors", &self.parse_errors)
            .field("value_stack", &self.value_stack.len())
            .field("has_result_value", &self.result_value.is_some())
            .finish()
    }
}

/// A strategy for running a matcher graph over an input.
pub trait ParseRunner<V: Clone> {
    /// Parse `input` from scratch.
    ///
    /// # Errors
    ///
    /// Only aborts surface here: illegal usage, recursion overrun, or a
    /// failure escaping a semantic action. A merely non-matching input is a
    /// result with `matched == false`, not an error.
    fn parse(&self, input: &str) -> Result<ParsingResult<V>, ParseRuntimeError>;
}

fn finish<V: Clone>(machine: MatcherContext<'_, V>, matched: bool) -> ParsingResult<V> {
    let (_root_has_error, root_node, parse_errors, value_stack) = machine.into_parts();
    let result_value = if value_stack.is_empty() {
        None
    } else {
        Some(value_stack.peek().clone())
    };
    ParsingResult {
        matched,
        root_node,
        parse_errors,
        value_stack,
        result_value,
    }
}

/// Single-pass runner: matched or not, nothing more.
///
/// # Example
///
/// ```
/// use pegrun::{BasicParseRunner, GraphBuilder, ParseRunner};
///
/// let mut b = GraphBuilder::<i64>::new();
/// let a = b.ch('a');
/// let root = b.one_or_more(a);
/// let graph = b.build().unwrap();
///
/// let runner = BasicParseRunner::new(&graph, root);
/// assert!(runner.parse("aaa").unwrap().matched);
/// assert!(!runner.parse("bbb").unwrap().matched);
/// ```
pub struct BasicParseRunner<'g, V: Clone> {
    graph: &'g MatcherGraph<V>,
    root: MatcherRef,
    max_depth: usize,
}

impl<'g, V: Clone> BasicParseRunner<'g, V> {
    /// Create a runner for `root` within `graph`.
    pub fn new(graph: &'g MatcherGraph<V>, root: MatcherRef) -> Self {
        Self {
            graph,
            root,
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    /// Replace the maximum frame depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl<'g, V: Clone> ParseRunner<V> for BasicParseRunner<'g, V> {
    fn parse(&self, input: &str) -> Result<ParsingResult<V>, ParseRuntimeError> {
        let buffer = InputBuffer::new(input);
        let mut machine = MatcherContext::new(&buffer, self.graph, self.root, true)?
            .with_max_depth(self.max_depth);
        let matched = machine.run(&mut BasicMatchHandler)?;
        Ok(finish(machine, matched))
    }
}

/// Runner that explains failures.
///
/// Performs a basic pass first and escalates only if it fails: one pass to
/// locate the furthest failed input index outside lookaheads, then one pass
/// collecting the terminal matchers that failed exactly there. The result
/// carries a single [`ParseError`] naming the expected alternatives at the
/// error position.
pub struct ReportingParseRunner<'g, V: Clone> {
    graph: &'g MatcherGraph<V>,
    root: MatcherRef,
    max_depth: usize,
}

impl<'g, V: Clone> ReportingParseRunner<'g, V> {
    /// Create a runner for `root` within `graph`.
    pub fn new(graph: &'g MatcherGraph<V>, root: MatcherRef) -> Self {
        Self {
            graph,
            root,
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    /// Replace the maximum frame depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl<'g, V: Clone> ParseRunner<V> for ReportingParseRunner<'g, V> {
    fn parse(&self, input: &str) -> Result<ParsingResult<V>, ParseRuntimeError> {
        let buffer = InputBuffer::new(input);
        {
            let mut machine = MatcherContext::new(&buffer, self.graph, self.root, true)?
                .with_max_depth(self.max_depth);
            if machine.run(&mut BasicMatchHandler)? {
                return Ok(finish(machine, true));
            }
        }

        // the input has errors; locate the failure at character granularity
        let mut locating = ErrorLocatingHandler::new();
        let mut machine = MatcherContext::new(&buffer, self.graph, self.root, false)?
            .with_max_depth(self.max_depth);
        if machine.run(&mut locating)? {
            return Ok(finish(machine, true));
        }
        let error_index = locating.error_index().unwrap_or(0);

        // then collect what was expected there
        let mut collecting = ErrorCollectingHandler::new(error_index);
        let mut machine = MatcherContext::new(&buffer, self.graph, self.root, false)?
            .with_max_depth(self.max_depth);
        machine.run(&mut collecting)?;
        machine.mark_error(0);
        let failed_paths = collecting.into_failed_paths();
        let message = if failed_paths.is_empty() {
            Some("invalid input".to_string())
        } else {
            None
        };
        machine.push_parse_error(ParseError::new(
            error_index,
            buffer.position_of(error_index),
            failed_paths,
            message,
        ));
        Ok(finish(machine, false))
    }
}

/// Runner that records errors and keeps going.
///
/// After locating an error it records it, removes the offending character
/// and reparses, up to a bounded number of attempts. Reported error
/// positions are mapped back to original-input coordinates. A recovered run
/// can end with `matched == true` and a non-empty error list; its parse tree
/// describes the input with the skipped characters removed.
pub struct RecoveringParseRunner<'g, V: Clone> {
    graph: &'g MatcherGraph<V>,
    root: MatcherRef,
    max_depth: usize,
    max_recoveries: usize,
}

impl<'g, V: Clone> RecoveringParseRunner<'g, V> {
    /// Create a runner for `root` within `graph`.
    pub fn new(graph: &'g MatcherGraph<V>, root: MatcherRef) -> Self {
        Self {
            graph,
            root,
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_recoveries: DEFAULT_MAX_RECOVERIES,
        }
    }

    /// Replace the maximum frame depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Replace the bound on resynchronization attempts.
    pub fn with_max_recoveries(mut self, max_recoveries: usize) -> Self {
        self.max_recoveries = max_recoveries;
        self
    }

    fn locate_and_collect(
        &self,
        buffer: &InputBuffer,
    ) -> Result<RecoveryProbe, ParseRuntimeError> {
        let mut locating = ErrorLocatingHandler::new();
        let mut machine = MatcherContext::new(buffer, self.graph, self.root, false)?
            .with_max_depth(self.max_depth);
        if machine.run(&mut locating)? {
            return Ok(RecoveryProbe::Matched);
        }
        let error_index = locating.error_index().unwrap_or(0);
        let mut collecting = ErrorCollectingHandler::new(error_index);
        let mut machine = MatcherContext::new(buffer, self.graph, self.root, false)?
            .with_max_depth(self.max_depth);
        machine.run(&mut collecting)?;
        Ok(RecoveryProbe::Failed {
            error_index,
            failed_paths: collecting.into_failed_paths(),
        })
    }
}

enum RecoveryProbe {
    Matched,
    Failed {
        error_index: usize,
        failed_paths: Vec<crate::errors::MatcherPath>,
    },
}

impl<'g, V: Clone> ParseRunner<V> for RecoveringParseRunner<'g, V> {
    fn parse(&self, input: &str) -> Result<ParsingResult<V>, ParseRuntimeError> {
        let original = InputBuffer::new(input);
        {
            let mut machine = MatcherContext::new(&original, self.graph, self.root, true)?
                .with_max_depth(self.max_depth);
            if machine.run(&mut BasicMatchHandler)? {
                return Ok(finish(machine, true));
            }
        }

        let mut errors: Vec<ParseError> = Vec::new();
        let mut work: Vec<char> = input.chars().collect();
        let mut skipped: Vec<usize> = Vec::new();

        for _ in 0..self.max_recoveries {
            let buffer = InputBuffer::from_chars(work.clone());
            match self.locate_and_collect(&buffer)? {
                RecoveryProbe::Matched => {
                    // reparse once more to build the final tree and stack
                    let mut machine =
                        MatcherContext::new(&buffer, self.graph, self.root, false)?
                            .with_max_depth(self.max_depth);
                    let matched = machine.run(&mut BasicMatchHandler)?;
                    if !errors.is_empty() {
                        machine.mark_error(0);
                    }
                    for error in errors {
                        machine.push_parse_error(error);
                    }
                    return Ok(finish(machine, matched));
                }
                RecoveryProbe::Failed {
                    error_index,
                    failed_paths,
                } => {
                    let original_index = original_index_of(error_index, &skipped);
                    errors.push(ParseError::new(
                        original_index,
                        original.position_of(original_index),
                        failed_paths,
                        None,
                    ));
                    if error_index >= work.len() {
                        // the error sits at end of input; nothing to skip
                        break;
                    }
                    work.remove(error_index);
                    skipped.push(original_index);
                    skipped.sort_unstable();
                }
            }
        }

        Ok(ParsingResult {
            matched: false,
            root_node: None,
            parse_errors: errors,
            value_stack: ValueStack::new(),
            result_value: None,
        })
    }
}

/// Map an index in the shrunken working input back to original coordinates.
fn original_index_of(index: usize, skipped: &[usize]) -> usize {
    let mut original = index;
    for &s in skipped {
        if s <= original {
            original += 1;
        }
    }
    original
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn letters_graph() -> (MatcherGraph<i64>, MatcherRef) {
        let mut b = GraphBuilder::<i64>::new();
        let a = b.ch('a');
        let rep = b.one_or_more(a);
        let end = b.ch(';');
        let root = b.seq([rep, end]);
        (b.build().unwrap(), root)
    }

    #[test]
    fn test_basic_runner_matched_flag() {
        let (graph, root) = letters_graph();
        let runner = BasicParseRunner::new(&graph, root);
        assert!(runner.parse("aaa;").unwrap().matched);
        assert!(!runner.parse("aab;").unwrap().matched);
    }

    #[test]
    fn test_reporting_runner_clean_input_has_no_errors() {
        let (graph, root) = letters_graph();
        let runner = ReportingParseRunner::new(&graph, root);
        let result = runner.parse("aa;").unwrap();
        assert!(result.matched);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_reporting_runner_locates_and_explains() {
        let (graph, root) = letters_graph();
        let runner = ReportingParseRunner::new(&graph, root);
        let result = runner.parse("aaX;").unwrap();
        assert!(!result.matched);
        assert_eq!(result.parse_errors.len(), 1);
        let error = &result.parse_errors[0];
        assert_eq!(error.error_index, 2);
        assert_eq!(error.position.line, 1);
        assert_eq!(error.position.column, 3);
        let expected = error.expected_labels();
        assert!(expected.contains(&"'a'"), "expected set: {:?}", expected);
        assert!(expected.contains(&"';'"), "expected set: {:?}", expected);
    }

    #[test]
    fn test_recovering_runner_skips_offending_character() {
        let (graph, root) = letters_graph();
        let runner = RecoveringParseRunner::new(&graph, root);
        let result = runner.parse("aaXa;").unwrap();
        assert!(result.matched);
        assert_eq!(result.parse_errors.len(), 1);
        assert_eq!(result.parse_errors[0].error_index, 2);
    }

    #[test]
    fn test_recovering_runner_reports_original_positions() {
        let (graph, root) = letters_graph();
        let runner = RecoveringParseRunner::new(&graph, root);
        let result = runner.parse("aXaYa;").unwrap();
        assert!(result.matched);
        assert_eq!(result.parse_errors.len(), 2);
        assert_eq!(result.parse_errors[0].error_index, 1);
        // the second error is reported where 'Y' sat in the original input
        assert_eq!(result.parse_errors[1].error_index, 3);
    }

    #[test]
    fn test_recovering_runner_gives_up_at_bound() {
        let (graph, root) = letters_graph();
        let runner = RecoveringParseRunner::new(&graph, root).with_max_recoveries(2);
        let result = runner.parse("XXXXXX").unwrap();
        assert!(!result.matched);
        assert_eq!(result.parse_errors.len(), 2);
    }

    #[test]
    fn test_original_index_mapping() {
        assert_eq!(original_index_of(3, &[]), 3);
        assert_eq!(original_index_of(3, &[1]), 4);
        assert_eq!(original_index_of(3, &[1, 2]), 5);
        assert_eq!(original_index_of(0, &[5]), 0);
    }
}
