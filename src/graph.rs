//! Matcher graph arena and builder
//!
//! All matchers of a grammar live in one arena owned by the graph and refer
//! to each other by [`MatcherRef`] handles. Recursion in the grammar forms
//! cycles between handles, never between owners. `Proxy` matchers stand in
//! for rules that are not built yet and are armed by the builder; after
//! construction they merely forward.

use crate::chars::CharSet;
use crate::context::ActionContext;
use crate::errors::ParseRuntimeError;
use crate::matchers::{ActionFn, ActionResult, FramedVar, Matcher, MatcherKind, MatcherRef, MatcherVisitor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An immutable arena of matchers forming one grammar.
///
/// The graph carries no run-specific state, so one instance can back any
/// number of concurrent parsing runs.
pub struct MatcherGraph<V: Clone> {
    matchers: Vec<Matcher<V>>,
}

impl<V: Clone> MatcherGraph<V> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Append a matcher, returning its handle.
    pub fn add(&mut self, matcher: Matcher<V>) -> MatcherRef {
        let r = MatcherRef::new(self.matchers.len());
        self.matchers.push(matcher);
        r
    }

    /// The matcher behind a handle, as stored (proxies not resolved).
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this graph.
    #[inline]
    pub fn matcher(&self, r: MatcherRef) -> &Matcher<V> {
        &self.matchers[r.index()]
    }

    /// Resolve a handle through `Proxy` and `VarFraming` wrappers.
    ///
    /// Idempotent, and the two unwraps commute. Used for every identity and
    /// flag check; match dispatch instead walks one wrapper at a time so
    /// `VarFraming` can run its enter/exit hooks.
    ///
    /// # Panics
    ///
    /// Panics on a proxy that was never armed, or on a wrapper cycle.
    pub fn unwrap(&self, r: MatcherRef) -> MatcherRef {
        let mut current = r;
        for _ in 0..=self.matchers.len() {
            match self.matcher(current).kind() {
                MatcherKind::Proxy(target) => {
                    current = target.expect("proxy matcher used before being armed");
                }
                MatcherKind::VarFraming { inner, .. } => current = *inner,
                _ => return current,
            }
        }
        panic!("cycle of proxy/var-framing wrappers in matcher graph");
    }

    /// Resolve a handle through `Proxy` wrappers only.
    ///
    /// Unlike [`unwrap`], this keeps `VarFraming` wrappers in place so their
    /// enter/exit hooks still run when the handle is matched.
    ///
    /// [`unwrap`]: MatcherGraph::unwrap
    ///
    /// # Panics
    ///
    /// Panics on a proxy that was never armed, or on a proxy cycle.
    pub fn unwrap_proxy(&self, r: MatcherRef) -> MatcherRef {
        let mut current = r;
        for _ in 0..=self.matchers.len() {
            match self.matcher(current).kind() {
                MatcherKind::Proxy(target) => {
                    current = target.expect("proxy matcher used before being armed");
                }
                _ => return current,
            }
        }
        panic!("cycle of proxy matchers in matcher graph");
    }

    /// The matcher behind a handle with wrappers resolved.
    #[inline]
    pub fn resolved(&self, r: MatcherRef) -> &Matcher<V> {
        self.matcher(self.unwrap(r))
    }

    /// Number of matchers in the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// True if the arena is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Drive a visitor over every matcher reachable from `root`, depth-first
    /// pre-order, visiting each matcher once even in cyclic graphs.
    pub fn accept<Vis: MatcherVisitor<V>>(&self, root: MatcherRef, visitor: &mut Vis) {
        let mut seen: HashSet<MatcherRef> = HashSet::new();
        let mut pending = vec![root];
        while let Some(r) = pending.pop() {
            if !seen.insert(r) {
                continue;
            }
            let matcher = self.matcher(r);
            visitor.visit(r, matcher);
            let children = matcher.kind().children();
            for child in children.into_iter().rev() {
                pending.push(child);
            }
        }
    }

    /// Census of the matchers reachable from `root`.
    pub fn analyze(&self, root: MatcherRef) -> GraphAnalysis {
        let mut census = KindCensus::default();
        self.accept(root, &mut census);
        GraphAnalysis {
            reachable_matchers: census.total,
            kind_counts: census.counts,
            has_actions: census.has_actions,
            has_lookaheads: census.has_lookaheads,
        }
    }
}

impl<V: Clone> Default for MatcherGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`MatcherGraph::analyze`].
#[derive(Debug)]
pub struct GraphAnalysis {
    /// Matchers reachable from the analyzed root.
    pub reachable_matchers: usize,
    /// Count per matcher kind name.
    pub kind_counts: HashMap<&'static str, usize>,
    /// Whether the reachable graph evaluates semantic actions.
    pub has_actions: bool,
    /// Whether the reachable graph contains lookahead matchers.
    pub has_lookaheads: bool,
}

#[derive(Default)]
struct KindCensus {
    total: usize,
    counts: HashMap<&'static str, usize>,
    has_actions: bool,
    has_lookaheads: bool,
}

impl<V: Clone> MatcherVisitor<V> for KindCensus {
    fn visit(&mut self, _r: MatcherRef, matcher: &Matcher<V>) {
        self.total += 1;
        *self.counts.entry(matcher.kind().kind_name()).or_insert(0) += 1;
        match matcher.kind() {
            MatcherKind::Action(_) => self.has_actions = true,
            MatcherKind::Test(_) | MatcherKind::TestNot(_) => self.has_lookaheads = true,
            _ => {}
        }
    }
}

/// Builder for matcher graphs.
///
/// Every constructor appends a matcher to the arena and returns its handle.
/// Recursive rules are expressed either with an explicit [`proxy`] armed
/// later, or by name with [`rule`]/[`rule_ref`]; named forward references
/// are resolved by [`build`].
///
/// [`proxy`]: GraphBuilder::proxy
/// [`rule`]: GraphBuilder::rule
/// [`rule_ref`]: GraphBuilder::rule_ref
/// [`build`]: GraphBuilder::build
///
/// # Example
///
/// ```
/// use pegrun::GraphBuilder;
///
/// let mut b = GraphBuilder::<i64>::new();
/// let a = b.ch('a');
/// let b_ = b.ch('b');
/// let ab = b.seq([a, b_]);
/// let graph = b.build().unwrap();
/// assert_eq!(graph.resolved(ab).label(), "Sequence");
/// ```
pub struct GraphBuilder<V: Clone> {
    graph: MatcherGraph<V>,
    rules: HashMap<String, MatcherRef>,
    pending: Vec<(MatcherRef, String)>,
}

impl<V: Clone> GraphBuilder<V> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            graph: MatcherGraph::new(),
            rules: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// A matcher for one literal character.
    pub fn ch(&mut self, c: char) -> MatcherRef {
        self.graph
            .add(Matcher::new(format!("{:?}", c), MatcherKind::Char(c)))
    }

    /// A matcher for one character out of `chars`.
    pub fn any_of(&mut self, chars: &str) -> MatcherRef {
        let set = CharSet::of(chars);
        self.graph
            .add(Matcher::new(set.label(), MatcherKind::AnyOf(set)))
    }

    /// A matcher for one character not in `chars` (and not end of input).
    pub fn none_of(&mut self, chars: &str) -> MatcherRef {
        let set = CharSet::none_of(chars);
        self.graph
            .add(Matcher::new(set.label(), MatcherKind::AnyOf(set)))
    }

    /// A matcher for one character in `lo..=hi`.
    pub fn char_range(&mut self, lo: char, hi: char) -> MatcherRef {
        self.graph.add(Matcher::new(
            format!("{:?}..{:?}", lo, hi),
            MatcherKind::CharRange { lo, hi },
        ))
    }

    /// A matcher for any one character except end of input.
    pub fn any(&mut self) -> MatcherRef {
        self.graph.add(Matcher::new("ANY", MatcherKind::Any))
    }

    /// A matcher for a literal string.
    ///
    /// Builds one `Char` matcher per character so the literal can degrade to
    /// a character sequence when fast string matching is off.
    pub fn string(&mut self, text: &str) -> MatcherRef {
        let chars: Vec<MatcherRef> = text.chars().map(|c| self.ch(c)).collect();
        self.graph.add(Matcher::new(
            format!("{:?}", text),
            MatcherKind::Str {
                text: text.chars().collect(),
                chars,
            },
        ))
    }

    /// A matcher that matches each child in order.
    pub fn seq(&mut self, children: impl Into<Vec<MatcherRef>>) -> MatcherRef {
        self.graph
            .add(Matcher::new("Sequence", MatcherKind::Sequence(children.into())))
    }

    /// A matcher that commits to the first succeeding child.
    pub fn first_of(&mut self, children: impl Into<Vec<MatcherRef>>) -> MatcherRef {
        self.graph
            .add(Matcher::new("FirstOf", MatcherKind::FirstOf(children.into())))
    }

    /// A matcher that greedily repeats its child at least once.
    pub fn one_or_more(&mut self, child: MatcherRef) -> MatcherRef {
        self.graph
            .add(Matcher::new("OneOrMore", MatcherKind::OneOrMore(child)))
    }

    /// A matcher that greedily repeats its child any number of times.
    pub fn zero_or_more(&mut self, child: MatcherRef) -> MatcherRef {
        self.graph
            .add(Matcher::new("ZeroOrMore", MatcherKind::ZeroOrMore(child)))
    }

    /// A matcher that attempts its child and succeeds either way.
    pub fn optional(&mut self, child: MatcherRef) -> MatcherRef {
        self.graph
            .add(Matcher::new("Optional", MatcherKind::Optional(child)))
    }

    /// A positive lookahead over `child`.
    pub fn test(&mut self, child: MatcherRef) -> MatcherRef {
        self.graph.add(Matcher::new("Test", MatcherKind::Test(child)))
    }

    /// A negative lookahead over `child`.
    pub fn test_not(&mut self, child: MatcherRef) -> MatcherRef {
        self.graph
            .add(Matcher::new("TestNot", MatcherKind::TestNot(child)))
    }

    /// A semantic action evaluating the given predicate.
    pub fn action<F>(&mut self, f: F) -> MatcherRef
    where
        F: Fn(&mut ActionContext<'_, '_, V>) -> ActionResult + Send + Sync + 'static,
    {
        let f: ActionFn<V> = Arc::new(f);
        self.graph.add(Matcher::new("Action", MatcherKind::Action(f)))
    }

    /// A matcher that always fails.
    pub fn nothing(&mut self) -> MatcherRef {
        self.graph.add(Matcher::new("NOTHING", MatcherKind::Nothing))
    }

    /// A matcher that always succeeds without consuming input.
    pub fn empty(&mut self) -> MatcherRef {
        self.graph.add(Matcher::new("EMPTY", MatcherKind::Empty))
    }

    /// An unarmed proxy, to be pointed at its target with [`arm`].
    ///
    /// [`arm`]: GraphBuilder::arm
    pub fn proxy(&mut self) -> MatcherRef {
        self.graph.add(Matcher::new("Proxy", MatcherKind::Proxy(None)))
    }

    /// Point a proxy at its target.
    pub fn arm(&mut self, proxy: MatcherRef, target: MatcherRef) {
        self.graph.matchers[proxy.index()].arm_proxy(target);
    }

    /// Scope `vars` around `inner`: each invocation gets a fresh frame.
    pub fn var_framing(
        &mut self,
        inner: MatcherRef,
        vars: Vec<Arc<dyn FramedVar>>,
    ) -> MatcherRef {
        let label = self.graph.matcher(inner).label().to_string();
        self.graph
            .add(Matcher::new(label, MatcherKind::VarFraming { inner, vars }))
    }

    /// Register `matcher` under a rule name, also using the name as its
    /// label.
    pub fn rule(&mut self, name: &str, matcher: MatcherRef) -> MatcherRef {
        self.graph.matchers[matcher.index()].set_label(name);
        self.rules.insert(name.to_string(), matcher);
        matcher
    }

    /// A forward reference to a named rule, resolved by [`build`].
    ///
    /// [`build`]: GraphBuilder::build
    pub fn rule_ref(&mut self, name: &str) -> MatcherRef {
        let proxy = self.proxy();
        self.pending.push((proxy, name.to_string()));
        proxy
    }

    /// Override a matcher's label.
    pub fn label(&mut self, matcher: MatcherRef, label: &str) -> MatcherRef {
        self.graph.matchers[matcher.index()].set_label(label);
        matcher
    }

    /// Suppress the matcher's own parse-tree node.
    pub fn suppress_node(&mut self, matcher: MatcherRef) -> MatcherRef {
        self.graph.matchers[matcher.index()].set_node_suppressed(true);
        matcher
    }

    /// Suppress every parse-tree node below the matcher.
    pub fn suppress_subnodes(&mut self, matcher: MatcherRef) -> MatcherRef {
        self.graph.matchers[matcher.index()].set_subnodes_suppressed(true);
        matcher
    }

    /// Make the matcher's children attach to its nearest non-skipped
    /// ancestor.
    pub fn skip_node(&mut self, matcher: MatcherRef) -> MatcherRef {
        self.graph.matchers[matcher.index()].set_node_skipped(true);
        matcher
    }

    /// The handle registered for a rule name, if any.
    pub fn find_rule(&self, name: &str) -> Option<MatcherRef> {
        self.rules.get(name).copied()
    }

    /// Resolve named forward references, verify that every proxy is armed,
    /// and freeze the graph.
    pub fn build(mut self) -> Result<MatcherGraph<V>, ParseRuntimeError> {
        for (proxy, name) in std::mem::take(&mut self.pending) {
            match self.rules.get(&name) {
                Some(&target) => self.graph.matchers[proxy.index()].arm_proxy(target),
                None => {
                    return Err(ParseRuntimeError::usage(format!(
                        "forward reference to unknown rule '{}'",
                        name
                    )))
                }
            }
        }
        for (index, matcher) in self.graph.matchers.iter().enumerate() {
            if matches!(matcher.kind(), MatcherKind::Proxy(None)) {
                return Err(ParseRuntimeError::usage(format!(
                    "proxy matcher #{} was never armed",
                    index
                )));
            }
        }
        Ok(self.graph)
    }
}

impl<V: Clone> Default for GraphBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_appends_and_labels() {
        let mut b = GraphBuilder::<()>::new();
        let a = b.ch('a');
        let lit = b.string("ab");
        let graph = b.build().unwrap();
        assert_eq!(graph.matcher(a).label(), "'a'");
        assert_eq!(graph.matcher(lit).label(), "\"ab\"");
        // the literal expanded into one char matcher per character
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_unwrap_resolves_proxy_chains() {
        let mut b = GraphBuilder::<()>::new();
        let target = b.ch('x');
        let p1 = b.proxy();
        let p2 = b.proxy();
        b.arm(p1, target);
        b.arm(p2, p1);
        let graph = b.build().unwrap();
        assert_eq!(graph.unwrap(p2), target);
        assert_eq!(graph.unwrap(graph.unwrap(p2)), target);
    }

    #[test]
    fn test_unwrap_resolves_var_framing() {
        let mut b = GraphBuilder::<()>::new();
        let inner = b.ch('x');
        let framed = b.var_framing(inner, Vec::new());
        let proxied = b.proxy();
        b.arm(proxied, framed);
        let graph = b.build().unwrap();
        assert_eq!(graph.unwrap(framed), inner);
        assert_eq!(graph.unwrap(proxied), inner);
    }

    #[test]
    fn test_build_rejects_unarmed_proxy() {
        let mut b = GraphBuilder::<()>::new();
        b.proxy();
        assert!(b.build().is_err());
    }

    #[test]
    fn test_build_rejects_unknown_rule_ref() {
        let mut b = GraphBuilder::<()>::new();
        b.rule_ref("missing");
        assert!(b.build().is_err());
    }

    #[test]
    fn test_named_forward_reference_resolves() {
        let mut b = GraphBuilder::<()>::new();
        let fwd = b.rule_ref("digit");
        let digit = b.char_range('0', '9');
        b.rule("digit", digit);
        let graph = b.build().unwrap();
        assert_eq!(graph.unwrap(fwd), digit);
        assert_eq!(graph.matcher(digit).label(), "digit");
    }

    #[test]
    fn test_analyze_counts_reachable_kinds() {
        let mut b = GraphBuilder::<()>::new();
        let a = b.ch('a');
        let rep = b.one_or_more(a);
        let look = b.test(rep);
        let root = b.seq([look, rep]);
        b.ch('z'); // unreachable
        let graph = b.build().unwrap();

        let analysis = graph.analyze(root);
        assert_eq!(analysis.reachable_matchers, 4);
        assert_eq!(analysis.kind_counts["char"], 1);
        assert_eq!(analysis.kind_counts["one_or_more"], 1);
        assert!(analysis.has_lookaheads);
        assert!(!analysis.has_actions);
    }

    #[test]
    fn test_analyze_handles_cycles() {
        let mut b = GraphBuilder::<()>::new();
        let p = b.proxy();
        let a = b.ch('a');
        let root = b.first_of([a, p]);
        b.arm(p, root);
        let graph = b.build().unwrap();
        // must terminate and count each matcher once
        let analysis = graph.analyze(root);
        assert_eq!(analysis.reachable_matchers, 3);
    }
}
