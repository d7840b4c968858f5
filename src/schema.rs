//! Declarative graph schema
//!
//! An action-free matcher graph can be described as plain data: a list of
//! matcher descriptions referencing each other by index, plus a root index.
//! The schema serializes with serde (JSON helpers included) and compiles
//! into a live [`MatcherGraph`], so grammars can be authored, stored and
//! shipped independently of the host program.
//!
//! Semantic actions cannot cross a serialization boundary; grammars that
//! need them are built with [`crate::GraphBuilder`] directly.

use crate::graph::{GraphBuilder, MatcherGraph};
use crate::errors::ParseRuntimeError;
use crate::matchers::MatcherRef;
use serde::{Deserialize, Serialize};

/// One matcher description; indices refer to positions in
/// [`GraphSchema::matchers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatcherSchema {
    /// Match one literal character.
    Char {
        /// The character to match.
        ch: char,
    },
    /// Match one character from a set.
    AnyOf {
        /// The listed characters.
        chars: String,
        /// Whether the set is negated.
        #[serde(default)]
        negated: bool,
    },
    /// Match one character in an inclusive range.
    CharRange {
        /// Lower bound (inclusive).
        lo: char,
        /// Upper bound (inclusive).
        hi: char,
    },
    /// Match any one character except end of input.
    Any,
    /// Match a literal string.
    Str {
        /// The literal text.
        text: String,
    },
    /// Match each referenced matcher in order.
    Sequence {
        /// Child indices.
        matchers: Vec<usize>,
    },
    /// Try each referenced matcher in order.
    FirstOf {
        /// Child indices.
        matchers: Vec<usize>,
    },
    /// Greedily repeat the referenced matcher at least once.
    OneOrMore {
        /// Child index.
        matcher: usize,
    },
    /// Greedily repeat the referenced matcher any number of times.
    ZeroOrMore {
        /// Child index.
        matcher: usize,
    },
    /// Attempt the referenced matcher, succeeding either way.
    Optional {
        /// Child index.
        matcher: usize,
    },
    /// Positive lookahead.
    Test {
        /// Child index.
        matcher: usize,
    },
    /// Negative lookahead.
    TestNot {
        /// Child index.
        matcher: usize,
    },
    /// Always succeed without consuming.
    Empty,
    /// Always fail.
    Nothing,
}

/// A complete, serializable description of an action-free matcher graph.
///
/// # Example
///
/// ```
/// use pegrun::{BasicParseRunner, GraphSchema, MatcherSchema, ParseRunner};
///
/// let schema = GraphSchema {
///     matchers: vec![
///         MatcherSchema::Char { ch: 'a' },
///         MatcherSchema::OneOrMore { matcher: 0 },
///     ],
///     root: 1,
/// };
///
/// let (graph, root) = schema.compile::<i64>().unwrap();
/// let runner = BasicParseRunner::new(&graph, root);
/// assert!(runner.parse("aaa").unwrap().matched);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// All matcher descriptions, referenced by index.
    pub matchers: Vec<MatcherSchema>,
    /// Index of the root matcher.
    pub root: usize,
}

impl GraphSchema {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Compile into a live matcher graph, returning the graph and the handle
    /// of the root matcher.
    ///
    /// # Errors
    ///
    /// Rejects out-of-range matcher indices, including the root.
    pub fn compile<V: Clone>(&self) -> Result<(MatcherGraph<V>, MatcherRef), ParseRuntimeError> {
        let count = self.matchers.len();
        let check = |index: usize| -> Result<(), ParseRuntimeError> {
            if index < count {
                Ok(())
            } else {
                Err(ParseRuntimeError::usage(format!(
                    "matcher index {} out of range ({} matchers)",
                    index, count
                )))
            }
        };
        check(self.root)?;

        let mut builder = GraphBuilder::<V>::new();
        // one proxy per schema entry, so forward references resolve by index
        let handles: Vec<MatcherRef> = self.matchers.iter().map(|_| builder.proxy()).collect();

        for (schema, &handle) in self.matchers.iter().zip(&handles) {
            let target = match schema {
                MatcherSchema::Char { ch } => builder.ch(*ch),
                MatcherSchema::AnyOf { chars, negated } => {
                    if *negated {
                        builder.none_of(chars)
                    } else {
                        builder.any_of(chars)
                    }
                }
                MatcherSchema::CharRange { lo, hi } => builder.char_range(*lo, *hi),
                MatcherSchema::Any => builder.any(),
                MatcherSchema::Str { text } => builder.string(text),
                MatcherSchema::Sequence { matchers } => {
                    let children = self.resolve(matchers, &handles, &check)?;
                    builder.seq(children)
                }
                MatcherSchema::FirstOf { matchers } => {
                    let children = self.resolve(matchers, &handles, &check)?;
                    builder.first_of(children)
                }
                MatcherSchema::OneOrMore { matcher } => {
                    check(*matcher)?;
                    builder.one_or_more(handles[*matcher])
                }
                MatcherSchema::ZeroOrMore { matcher } => {
                    check(*matcher)?;
                    builder.zero_or_more(handles[*matcher])
                }
                MatcherSchema::Optional { matcher } => {
                    check(*matcher)?;
                    builder.optional(handles[*matcher])
                }
                MatcherSchema::Test { matcher } => {
                    check(*matcher)?;
                    builder.test(handles[*matcher])
                }
                MatcherSchema::TestNot { matcher } => {
                    check(*matcher)?;
                    builder.test_not(handles[*matcher])
                }
                MatcherSchema::Empty => builder.empty(),
                MatcherSchema::Nothing => builder.nothing(),
            };
            builder.arm(handle, target);
        }

        let root = handles[self.root];
        Ok((builder.build()?, root))
    }

    fn resolve(
        &self,
        indices: &[usize],
        handles: &[MatcherRef],
        check: &impl Fn(usize) -> Result<(), ParseRuntimeError>,
    ) -> Result<Vec<MatcherRef>, ParseRuntimeError> {
        indices
            .iter()
            .map(|&index| {
                check(index)?;
                Ok(handles[index])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{BasicParseRunner, ParseRunner};

    fn ab_schema() -> GraphSchema {
        GraphSchema {
            matchers: vec![
                MatcherSchema::Char { ch: 'a' },
                MatcherSchema::Char { ch: 'b' },
                MatcherSchema::Sequence { matchers: vec![0, 1] },
            ],
            root: 2,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let schema = ab_schema();
        let json = schema.to_json().unwrap();
        let parsed = GraphSchema::from_json(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_compiled_schema_parses() {
        let (graph, root) = ab_schema().compile::<i64>().unwrap();
        let runner = BasicParseRunner::new(&graph, root);
        assert!(runner.parse("ab").unwrap().matched);
        assert!(!runner.parse("ba").unwrap().matched);
    }

    #[test]
    fn test_forward_references_compile() {
        // root references an entry defined after it
        let schema = GraphSchema {
            matchers: vec![
                MatcherSchema::OneOrMore { matcher: 1 },
                MatcherSchema::CharRange { lo: '0', hi: '9' },
            ],
            root: 0,
        };
        let (graph, root) = schema.compile::<i64>().unwrap();
        let runner = BasicParseRunner::new(&graph, root);
        assert!(runner.parse("0123").unwrap().matched);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let schema = GraphSchema {
            matchers: vec![MatcherSchema::OneOrMore { matcher: 7 }],
            root: 0,
        };
        assert!(schema.compile::<i64>().is_err());
    }

    #[test]
    fn test_out_of_range_root_rejected() {
        let schema = GraphSchema {
            matchers: vec![MatcherSchema::Any],
            root: 9,
        };
        assert!(schema.compile::<i64>().is_err());
    }

    #[test]
    fn test_negated_set_schema() {
        let schema = GraphSchema {
            matchers: vec![
                MatcherSchema::AnyOf {
                    chars: ",".to_string(),
                    negated: true,
                },
                MatcherSchema::OneOrMore { matcher: 0 },
            ],
            root: 1,
        };
        let (graph, root) = schema.compile::<i64>().unwrap();
        let runner = BasicParseRunner::new(&graph, root);
        let result = runner.parse("abc").unwrap();
        assert!(result.matched);
        assert!(!runner.parse(",x").unwrap().matched);
    }
}
