//! Parallel batch parsing
//!
//! The matcher graph is immutable and carries no run-specific state, so many
//! inputs can be parsed against one shared graph at once; every run gets its
//! own context tree and value stack.
//!
//! With the `parallel` feature enabled the batch is spread over a rayon
//! thread pool; without it the same functions run sequentially with the same
//! contract.

use crate::errors::ParseRuntimeError;
use crate::graph::MatcherGraph;
use crate::matchers::MatcherRef;
use crate::runner::{BasicParseRunner, ParseRunner, ParsingResult};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Parse multiple inputs against one shared graph.
///
/// Results come back in input order. Each input gets an independent run; a
/// failing or aborting input does not affect the others.
#[cfg(feature = "parallel")]
pub fn parse_batch_parallel<V>(
    graph: &MatcherGraph<V>,
    root: MatcherRef,
    inputs: &[&str],
) -> Vec<Result<ParsingResult<V>, ParseRuntimeError>>
where
    V: Clone + Send + Sync,
{
    inputs
        .par_iter()
        .map(|input| BasicParseRunner::new(graph, root).parse(input))
        .collect()
}

/// Sequential fallback used when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub fn parse_batch_parallel<V>(
    graph: &MatcherGraph<V>,
    root: MatcherRef,
    inputs: &[&str],
) -> Vec<Result<ParsingResult<V>, ParseRuntimeError>>
where
    V: Clone + Send + Sync,
{
    inputs
        .iter()
        .map(|input| BasicParseRunner::new(graph, root).parse(input))
        .collect()
}

/// Owned-input variant of [`parse_batch_parallel`].
#[cfg(feature = "parallel")]
pub fn parse_batch_parallel_owned<V>(
    graph: &MatcherGraph<V>,
    root: MatcherRef,
    inputs: Vec<String>,
) -> Vec<Result<ParsingResult<V>, ParseRuntimeError>>
where
    V: Clone + Send + Sync,
{
    inputs
        .into_par_iter()
        .map(|input| BasicParseRunner::new(graph, root).parse(&input))
        .collect()
}

/// Sequential fallback used when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub fn parse_batch_parallel_owned<V>(
    graph: &MatcherGraph<V>,
    root: MatcherRef,
    inputs: Vec<String>,
) -> Vec<Result<ParsingResult<V>, ParseRuntimeError>>
where
    V: Clone + Send + Sync,
{
    inputs
        .into_iter()
        .map(|input| BasicParseRunner::new(graph, root).parse(&input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn hello_graph() -> (MatcherGraph<i64>, MatcherRef) {
        let mut b = GraphBuilder::<i64>::new();
        let root = b.string("hello");
        (b.build().unwrap(), root)
    }

    #[test]
    fn test_batch_preserves_order() {
        let (graph, root) = hello_graph();
        let results = parse_batch_parallel(&graph, root, &["hello", "world", "hello"]);
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().matched);
        assert!(!results[1].as_ref().unwrap().matched);
        assert!(results[2].as_ref().unwrap().matched);
    }

    #[test]
    fn test_batch_owned() {
        let (graph, root) = hello_graph();
        let inputs = vec!["hello".to_string(), "hello".to_string()];
        let results = parse_batch_parallel_owned(&graph, root, inputs);
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(result.unwrap().matched);
        }
    }

    #[test]
    fn test_shared_graph_with_actions() {
        let mut b = GraphBuilder::<i64>::new();
        let digit = b.char_range('0', '9');
        let digits = b.one_or_more(digit);
        let tally = b.action(|ctx| {
            let text = ctx.get_match()?;
            ctx.value_stack().push(text.parse::<i64>()?);
            Ok(true)
        });
        let root = b.seq([digits, tally]);
        let graph = b.build().unwrap();

        let results = parse_batch_parallel(&graph, root, &["12", "7", "100"]);
        let values: Vec<i64> = results
            .into_iter()
            .map(|r| r.unwrap().result_value.unwrap())
            .collect();
        assert_eq!(values, vec![12, 7, 100]);
    }
}
