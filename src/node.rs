//! Parse-tree nodes
//!
//! Nodes record which matcher matched which span of the input, in document
//! order. They are immutable once created and shared behind `Arc`: the frame
//! that built a node and the parent's child list both hold it, and whole
//! trees move across threads in batch parsing.

use crate::buffer::InputBuffer;
use crate::graph::MatcherGraph;
use crate::matchers::MatcherRef;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Child list of a parse-tree node or an in-flight frame.
///
/// Most nodes have zero or one child, so one slot is kept inline; the list
/// spills to the heap on the second insertion.
pub(crate) type NodeList<V> = SmallVec<[Arc<ParseNode<V>>; 1]>;

/// One node of the parse tree.
pub struct ParseNode<V> {
    matcher: MatcherRef,
    start_index: usize,
    end_index: usize,
    children: NodeList<V>,
    value: Option<V>,
    has_error: bool,
}

impl<V: Clone> ParseNode<V> {
    pub(crate) fn new(
        matcher: MatcherRef,
        children: NodeList<V>,
        start_index: usize,
        end_index: usize,
        value: Option<V>,
        has_error: bool,
    ) -> Self {
        Self {
            matcher,
            start_index,
            end_index,
            children,
            value,
            has_error,
        }
    }

    /// Handle of the matcher that produced this node (wrappers resolved).
    #[inline]
    pub fn matcher(&self) -> MatcherRef {
        self.matcher
    }

    /// Start of the matched span (inclusive).
    #[inline]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// End of the matched span (exclusive).
    #[inline]
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    /// Child nodes in document order.
    #[inline]
    pub fn children(&self) -> &[Arc<ParseNode<V>>] {
        &self.children
    }

    /// The value on top of the value stack when the node was created.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// True if an error was marked inside this node's subtree.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// The input text covered by this node's span.
    pub fn text(&self, input: &InputBuffer) -> String {
        input.extract(self.start_index, self.end_index)
    }

    /// Concatenation of the leaf spans of this subtree, in document order.
    pub fn leaf_text(&self, input: &InputBuffer) -> String {
        if self.children.is_empty() {
            return self.text(input);
        }
        let mut out = String::new();
        for child in &self.children {
            out.push_str(&child.leaf_text(input));
        }
        out
    }

    /// Render the subtree as an indented listing of labels and spans.
    pub fn format_tree(&self, graph: &MatcherGraph<V>, input: &InputBuffer) -> String {
        let mut out = String::new();
        self.format_into(graph, input, 0, &mut out);
        out
    }

    fn format_into(
        &self,
        graph: &MatcherGraph<V>,
        input: &InputBuffer,
        depth: usize,
        out: &mut String,
    ) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let label = graph.matcher(self.matcher).label();
        out.push_str(label);
        out.push_str(&format!(
            " [{}..{}] {:?}",
            self.start_index,
            self.end_index,
            self.text(input)
        ));
        if self.has_error {
            out.push_str(" (error)");
        }
        out.push('\n');
        for child in &self.children {
            child.format_into(graph, input, depth + 1, out);
        }
    }
}

impl<V: Clone> fmt::Debug for ParseNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseNode")
            .field("matcher", &self.matcher)
            .field("span", &(self.start_index..self.end_index))
            .field("children", &self.children.len())
            .field("has_error", &self.has_error)
            .finish()
    }
}
