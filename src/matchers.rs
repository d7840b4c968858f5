//! Matcher types for the grammar graph
//!
//! A grammar is a directed, possibly cyclic graph of matchers. The graph
//! itself lives in an arena ([`crate::MatcherGraph`]); matchers refer to each
//! other through [`MatcherRef`] handles, never through owning pointers, which
//! is what lets recursive grammars exist without reference cycles.
//!
//! Matchers are immutable once built and carry no run-specific state, so one
//! graph can serve any number of concurrent parsing runs.

use crate::chars::CharSet;
use crate::context::ActionContext;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A stable handle to a matcher inside a [`crate::MatcherGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatcherRef(pub(crate) u32);

impl MatcherRef {
    /// The arena index of this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Result type of a semantic action: `Ok(bool)` is the match outcome, `Err`
/// aborts the parse and is wrapped once with input position and matcher path.
pub type ActionResult = Result<bool, Box<dyn std::error::Error + Send + Sync>>;

/// A semantic action: a user predicate over the current [`ActionContext`].
///
/// Actions read and write the value stack freely; their stack effects are
/// rolled back automatically when an enclosing rule fails.
pub type ActionFn<V> = Arc<dyn Fn(&mut ActionContext<'_, '_, V>) -> ActionResult + Send + Sync>;

/// The closed set of matcher behaviors.
///
/// Composite variants reference their children by [`MatcherRef`]; the arena
/// index is resolved at match time, so forward references are fine as long as
/// the arena is complete before the first run.
#[derive(Clone)]
pub enum MatcherKind<V: Clone> {
    /// Match one character equal to the given one.
    Char(char),
    /// Match one character contained in the set.
    AnyOf(CharSet),
    /// Match one character in the inclusive range.
    CharRange {
        /// Lower bound (inclusive).
        lo: char,
        /// Upper bound (inclusive).
        hi: char,
    },
    /// Match any one character except end of input.
    Any,
    /// Match a literal string.
    ///
    /// With fast string matching the literal is compared atomically; without
    /// it the matcher behaves as a `Sequence` over the `chars` children, so
    /// error reporting can work at character granularity.
    Str {
        /// The literal, pre-split into characters.
        text: Box<[char]>,
        /// One `Char` matcher per character, for the slow path.
        chars: Vec<MatcherRef>,
    },
    /// Match every child in order; fail on the first failing child.
    Sequence(Vec<MatcherRef>),
    /// Try each child in order, committing to the first success.
    FirstOf(Vec<MatcherRef>),
    /// Greedily match the child one or more times.
    OneOrMore(MatcherRef),
    /// Greedily match the child zero or more times; always succeeds.
    ZeroOrMore(MatcherRef),
    /// Attempt the child once; always succeeds.
    Optional(MatcherRef),
    /// Positive lookahead: succeed iff the child matches, consuming nothing.
    Test(MatcherRef),
    /// Negative lookahead: succeed iff the child fails, consuming nothing.
    TestNot(MatcherRef),
    /// Evaluate a user predicate against the value stack.
    Action(ActionFn<V>),
    /// Always fail.
    Nothing,
    /// Always succeed without consuming anything.
    Empty,
    /// Forwarding stand-in used to break cycles during graph construction.
    ///
    /// The target is armed by the builder; an unarmed proxy reached at match
    /// time is a usage error.
    Proxy(Option<MatcherRef>),
    /// Scope rule-local variables around the inner matcher.
    ///
    /// Semantically transparent: variables get a fresh frame on entry and
    /// the previous one back on exit.
    VarFraming {
        /// The wrapped matcher.
        inner: MatcherRef,
        /// Variables to frame around each invocation.
        vars: Vec<Arc<dyn FramedVar>>,
    },
}

impl<V: Clone> MatcherKind<V> {
    /// True for matchers that consume at most a fixed token of input and
    /// have no child rules: the granularity at which expected-sets are
    /// reported.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatcherKind::Char(_)
                | MatcherKind::AnyOf(_)
                | MatcherKind::CharRange { .. }
                | MatcherKind::Any
                | MatcherKind::Str { .. }
                | MatcherKind::Nothing
                | MatcherKind::Empty
        )
    }

    /// A short static name for the variant, used by graph analysis.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MatcherKind::Char(_) => "char",
            MatcherKind::AnyOf(_) => "any_of",
            MatcherKind::CharRange { .. } => "char_range",
            MatcherKind::Any => "any",
            MatcherKind::Str { .. } => "str",
            MatcherKind::Sequence(_) => "sequence",
            MatcherKind::FirstOf(_) => "first_of",
            MatcherKind::OneOrMore(_) => "one_or_more",
            MatcherKind::ZeroOrMore(_) => "zero_or_more",
            MatcherKind::Optional(_) => "optional",
            MatcherKind::Test(_) => "test",
            MatcherKind::TestNot(_) => "test_not",
            MatcherKind::Action(_) => "action",
            MatcherKind::Nothing => "nothing",
            MatcherKind::Empty => "empty",
            MatcherKind::Proxy(_) => "proxy",
            MatcherKind::VarFraming { .. } => "var_framing",
        }
    }

    /// Direct children of this matcher, in order.
    pub fn children(&self) -> Vec<MatcherRef> {
        match self {
            MatcherKind::Str { chars, .. } => chars.clone(),
            MatcherKind::Sequence(children) | MatcherKind::FirstOf(children) => children.clone(),
            MatcherKind::OneOrMore(child)
            | MatcherKind::ZeroOrMore(child)
            | MatcherKind::Optional(child)
            | MatcherKind::Test(child)
            | MatcherKind::TestNot(child) => vec![*child],
            MatcherKind::Proxy(target) => target.iter().copied().collect(),
            MatcherKind::VarFraming { inner, .. } => vec![*inner],
            _ => Vec::new(),
        }
    }
}

impl<V: Clone> fmt::Debug for MatcherKind<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherKind::Char(c) => write!(f, "Char({:?})", c),
            MatcherKind::AnyOf(set) => write!(f, "AnyOf({})", set),
            MatcherKind::CharRange { lo, hi } => write!(f, "CharRange({:?}..={:?})", lo, hi),
            MatcherKind::Any => f.write_str("Any"),
            MatcherKind::Str { text, .. } => {
                write!(f, "Str({:?})", text.iter().collect::<String>())
            }
            MatcherKind::Sequence(children) => write!(f, "Sequence({:?})", children),
            MatcherKind::FirstOf(children) => write!(f, "FirstOf({:?})", children),
            MatcherKind::OneOrMore(child) => write!(f, "OneOrMore({:?})", child),
            MatcherKind::ZeroOrMore(child) => write!(f, "ZeroOrMore({:?})", child),
            MatcherKind::Optional(child) => write!(f, "Optional({:?})", child),
            MatcherKind::Test(child) => write!(f, "Test({:?})", child),
            MatcherKind::TestNot(child) => write!(f, "TestNot({:?})", child),
            MatcherKind::Action(_) => f.write_str("Action(..)"),
            MatcherKind::Nothing => f.write_str("Nothing"),
            MatcherKind::Empty => f.write_str("Empty"),
            MatcherKind::Proxy(target) => write!(f, "Proxy({:?})", target),
            MatcherKind::VarFraming { inner, vars } => {
                write!(f, "VarFraming({:?}, {} vars)", inner, vars.len())
            }
        }
    }
}

/// A matcher: a behavior plus static properties.
///
/// The flags control parse-tree construction:
/// `node_suppressed` suppresses the matcher's own node,
/// `subnodes_suppressed` suppresses every descendant node, and
/// `node_skipped` makes the matcher's children attach to its nearest
/// non-skipped ancestor instead.
#[derive(Clone)]
pub struct Matcher<V: Clone> {
    label: String,
    node_suppressed: bool,
    node_skipped: bool,
    subnodes_suppressed: bool,
    kind: MatcherKind<V>,
}

impl<V: Clone> Matcher<V> {
    /// Create a matcher with default flags for its kind.
    ///
    /// Lookahead matchers start with their own node and all sub-nodes
    /// suppressed; actions start with their own node suppressed. All other
    /// kinds start unsuppressed.
    pub fn new(label: impl Into<String>, kind: MatcherKind<V>) -> Self {
        let (node_suppressed, subnodes_suppressed) = match &kind {
            MatcherKind::Test(_) | MatcherKind::TestNot(_) => (true, true),
            MatcherKind::Action(_) => (true, false),
            _ => (false, false),
        };
        Self {
            label: label.into(),
            node_suppressed,
            node_skipped: false,
            subnodes_suppressed,
            kind,
        }
    }

    /// The matcher's display label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The matcher's behavior.
    #[inline]
    pub fn kind(&self) -> &MatcherKind<V> {
        &self.kind
    }

    /// True if this matcher never creates a parse-tree node for itself.
    #[inline]
    pub fn is_node_suppressed(&self) -> bool {
        self.node_suppressed
    }

    /// True if this matcher's children attach to its nearest non-skipped
    /// ancestor.
    #[inline]
    pub fn is_node_skipped(&self) -> bool {
        self.node_skipped
    }

    /// True if no descendant of this matcher creates parse-tree nodes.
    #[inline]
    pub fn are_subnodes_suppressed(&self) -> bool {
        self.subnodes_suppressed
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub(crate) fn set_node_suppressed(&mut self, value: bool) {
        self.node_suppressed = value;
    }

    pub(crate) fn set_node_skipped(&mut self, value: bool) {
        self.node_skipped = value;
    }

    pub(crate) fn set_subnodes_suppressed(&mut self, value: bool) {
        self.subnodes_suppressed = value;
    }

    pub(crate) fn arm_proxy(&mut self, target: MatcherRef) {
        if let MatcherKind::Proxy(slot) = &mut self.kind {
            *slot = Some(target);
        }
    }
}

impl<V: Clone> fmt::Debug for Matcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A variable that is framed by `VarFraming` matchers: a fresh frame on rule
/// entry, the previous one back on rule exit.
pub trait FramedVar: Send + Sync {
    /// Enter a new frame, saving the current value.
    fn enter_frame(&self);
    /// Exit the current frame, restoring the saved value.
    fn exit_frame(&self);
}

/// A rule-local variable usable from actions.
///
/// Wrapped in `VarFraming` around a recursive rule, each invocation of the
/// rule sees its own fresh copy of the initial value; the enclosing
/// invocation's value comes back when the rule returns.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pegrun::{FramedVar, RuleVar};
///
/// let count = Arc::new(RuleVar::new(0));
/// count.set(3);
/// count.enter_frame();
/// assert_eq!(count.get(), 0);
/// count.exit_frame();
/// assert_eq!(count.get(), 3);
/// ```
pub struct RuleVar<T: Clone + Send + Sync> {
    initial: T,
    slot: Mutex<VarSlot<T>>,
}

struct VarSlot<T> {
    value: T,
    saved: Vec<T>,
}

impl<T: Clone + Send + Sync> RuleVar<T> {
    /// Create a variable with the given per-frame initial value.
    pub fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(VarSlot {
                value: initial.clone(),
                saved: Vec::new(),
            }),
            initial,
        }
    }

    /// The current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Replace the current value.
    pub fn set(&self, value: T) {
        self.lock().value = value;
    }

    /// Apply a function to the current value in place.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.lock().value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VarSlot<T>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T: Clone + Send + Sync> FramedVar for RuleVar<T> {
    fn enter_frame(&self) {
        let initial = self.initial.clone();
        let mut slot = self.lock();
        let previous = std::mem::replace(&mut slot.value, initial);
        slot.saved.push(previous);
    }

    fn exit_frame(&self) {
        let mut slot = self.lock();
        if let Some(previous) = slot.saved.pop() {
            slot.value = previous;
        }
    }
}

/// Visitor over the matchers of a graph, driven by
/// [`crate::MatcherGraph::accept`].
pub trait MatcherVisitor<V: Clone> {
    /// Called once per reachable matcher, in depth-first pre-order.
    fn visit(&mut self, matcher_ref: MatcherRef, matcher: &Matcher<V>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_by_kind() {
        let m: Matcher<()> = Matcher::new("'a'", MatcherKind::Char('a'));
        assert!(!m.is_node_suppressed());
        assert!(!m.is_node_skipped());
        assert!(!m.are_subnodes_suppressed());

        let t: Matcher<()> = Matcher::new("Test", MatcherKind::Test(MatcherRef::new(0)));
        assert!(t.is_node_suppressed());
        assert!(t.are_subnodes_suppressed());
    }

    #[test]
    fn test_terminal_classification() {
        let c: MatcherKind<()> = MatcherKind::Char('a');
        assert!(c.is_terminal());
        let s: MatcherKind<()> = MatcherKind::Sequence(vec![]);
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_rule_var_framing_nests() {
        let var = RuleVar::new(0);
        var.set(1);
        var.enter_frame();
        assert_eq!(var.get(), 0);
        var.set(2);
        var.enter_frame();
        assert_eq!(var.get(), 0);
        var.exit_frame();
        assert_eq!(var.get(), 2);
        var.exit_frame();
        assert_eq!(var.get(), 1);
    }

    #[test]
    fn test_rule_var_update() {
        let var = RuleVar::new(10);
        var.update(|v| *v += 5);
        assert_eq!(var.get(), 15);
    }
}
