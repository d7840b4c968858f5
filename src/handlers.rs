//! Match handlers
//!
//! Every frame executes its matcher through the run's handler, so a handler
//! sees every match attempt in the run and its outcome. The basic handler
//! calls straight through; the error-oriented handlers ride the same walk to
//! locate the failure point and to collect the expected-set there.
//!
//! A handler must execute the frame's matcher exactly once per invocation
//! and must communicate rule failure by returning `Ok(false)`, never through
//! the error channel: position and value-stack restoration happen in the
//! calling frame and rely on the `bool` path.

use crate::context::MatcherContext;
use crate::errors::{MatcherPath, ParseRuntimeError};

/// Strategy invoked by each frame to execute `matcher.match`.
pub trait MatchHandler<V: Clone> {
    /// Execute the matcher of the frame at `level`.
    fn match_frame(
        &mut self,
        context: &mut MatcherContext<'_, V>,
        level: usize,
    ) -> Result<bool, ParseRuntimeError>;
}

/// Pass-through handler for plain runs.
pub struct BasicMatchHandler;

impl<V: Clone> MatchHandler<V> for BasicMatchHandler {
    fn match_frame(
        &mut self,
        context: &mut MatcherContext<'_, V>,
        level: usize,
    ) -> Result<bool, ParseRuntimeError> {
        context.execute_match(level, self)
    }
}

/// Handler that records the furthest input index at which a match attempt
/// failed outside of lookaheads: the error location of the run.
pub struct ErrorLocatingHandler {
    error_index: Option<usize>,
}

impl ErrorLocatingHandler {
    /// Create a locator with no failure seen yet.
    pub fn new() -> Self {
        Self { error_index: None }
    }

    /// The furthest failed index, if any frame failed outside a lookahead.
    pub fn error_index(&self) -> Option<usize> {
        self.error_index
    }
}

impl Default for ErrorLocatingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> MatchHandler<V> for ErrorLocatingHandler {
    fn match_frame(
        &mut self,
        context: &mut MatcherContext<'_, V>,
        level: usize,
    ) -> Result<bool, ParseRuntimeError> {
        let matched = context.execute_match(level, self)?;
        if !matched && !context.in_predicate(level) {
            let index = context.current_index(level);
            if self.error_index.map_or(true, |seen| index > seen) {
                self.error_index = Some(index);
            }
        }
        Ok(matched)
    }
}

/// Handler that collects the paths of terminal matchers failing exactly at a
/// known error index: the expected-set for error reporting.
///
/// Frames that contribute to the expected-set are also flagged as erroneous,
/// which propagates up to the root frame.
pub struct ErrorCollectingHandler {
    error_index: usize,
    failed_paths: Vec<MatcherPath>,
}

impl ErrorCollectingHandler {
    /// Create a collector for failures at `error_index`.
    pub fn new(error_index: usize) -> Self {
        Self {
            error_index,
            failed_paths: Vec::new(),
        }
    }

    /// The collected paths, in first-failure order.
    pub fn into_failed_paths(self) -> Vec<MatcherPath> {
        self.failed_paths
    }
}

impl<V: Clone> MatchHandler<V> for ErrorCollectingHandler {
    fn match_frame(
        &mut self,
        context: &mut MatcherContext<'_, V>,
        level: usize,
    ) -> Result<bool, ParseRuntimeError> {
        let matched = context.execute_match(level, self)?;
        if !matched
            && !context.in_predicate(level)
            && context.current_index(level) == self.error_index
        {
            let terminal = context
                .frame_matcher(level)
                .map_or(false, |m| context.graph().resolved(m).kind().is_terminal());
            if terminal {
                let path = context.path(level);
                if !self.failed_paths.contains(&path) {
                    self.failed_paths.push(path);
                }
                context.mark_error(level);
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InputBuffer;
    use crate::graph::GraphBuilder;

    #[test]
    fn test_locating_handler_finds_furthest_failure() {
        let mut b = GraphBuilder::<i64>::new();
        let a = b.ch('a');
        let b_ = b.ch('b');
        let c = b.ch('c');
        let root = b.seq([a, b_, c]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("abX");
        let mut machine = MatcherContext::new(&buffer, &graph, root, false).unwrap();
        let mut handler = ErrorLocatingHandler::new();
        assert!(!machine.run(&mut handler).unwrap());
        assert_eq!(handler.error_index(), Some(2));
    }

    #[test]
    fn test_locating_handler_ignores_lookahead_failures() {
        let mut b = GraphBuilder::<i64>::new();
        let x = b.ch('x');
        let not_x = b.test_not(x);
        let any = b.any();
        let root = b.seq([not_x, any]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("a");
        let mut machine = MatcherContext::new(&buffer, &graph, root, false).unwrap();
        let mut handler = ErrorLocatingHandler::new();
        assert!(machine.run(&mut handler).unwrap());
        // the 'x' probe failed, but inside a predicate
        assert_eq!(handler.error_index(), None);
    }

    #[test]
    fn test_collecting_handler_gathers_expected_terminals() {
        let mut b = GraphBuilder::<i64>::new();
        let a = b.ch('a');
        let b_ = b.ch('b');
        let root = b.first_of([a, b_]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("z");
        let mut machine = MatcherContext::new(&buffer, &graph, root, false).unwrap();
        let mut handler = ErrorCollectingHandler::new(0);
        assert!(!machine.run(&mut handler).unwrap());
        assert!(machine.root_has_error());
        let paths = handler.into_failed_paths();
        let labels: Vec<String> = paths.iter().map(|p| p.leaf_label().to_string()).collect();
        assert_eq!(labels, vec!["'a'", "'b'"]);
    }
}
