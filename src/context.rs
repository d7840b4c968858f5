//! Matcher contexts: the execution core
//!
//! A parsing run is a depth-first walk of the matcher graph. Each level of
//! that walk is recorded in a frame holding the matcher being attempted, the
//! input window, the sub-nodes collected so far and the error/suppression
//! state. The frames form the call stack of the parse.
//!
//! Frames are reused rather than recreated: each depth is allocated once per
//! run, the first time the walk reaches it, and reinitialized on every
//! subsequent visit. A frame whose matcher has been cleared is *retired* and
//! waits at its depth for the next sub-context acquisition. A parse of depth
//! D therefore allocates at most D + 1 frames no matter how much work it
//! performs.
//!
//! The machine never executes a matcher directly; every frame goes through
//! the run's [`MatchHandler`], which is what lets reporting and recovering
//! runs interpose on the exact same walk.

use crate::buffer::{InputBuffer, EOI};
use crate::errors::{MatcherPath, MatcherPathElement, ParseError, ParseRuntimeError};
use crate::graph::MatcherGraph;
use crate::handlers::MatchHandler;
use crate::matchers::{ActionFn, MatcherKind, MatcherRef};
use crate::node::{NodeList, ParseNode};
use crate::stack::ValueStack;
use std::sync::Arc;

/// Logging macro - no-op when the logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macro - uses the log crate when the logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

/// Default maximum frame depth before a run is aborted.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Per-level execution record of a parsing run.
pub(crate) struct Frame<V> {
    /// Current matcher, or `None` while the frame is retired.
    pub(crate) matcher: Option<MatcherRef>,
    pub(crate) start_index: usize,
    pub(crate) current_index: usize,
    pub(crate) current_char: char,
    /// Node built by this frame's matcher, if any.
    pub(crate) node: Option<Arc<ParseNode<V>>>,
    /// Nodes contributed by children, in document order.
    pub(crate) sub_nodes: NodeList<V>,
    /// Matcher-private counter; `Sequence` keeps the 1-based index of the
    /// child being attempted here.
    pub(crate) int_tag: usize,
    pub(crate) has_error: bool,
    pub(crate) node_suppressed: bool,
}

impl<V> Frame<V> {
    fn retired() -> Self {
        Self {
            matcher: None,
            start_index: 0,
            current_index: 0,
            current_char: EOI,
            node: None,
            sub_nodes: NodeList::new(),
            int_tag: 0,
            has_error: false,
            node_suppressed: false,
        }
    }
}

/// The matcher-context machine for one parsing run.
///
/// Owns the frame stack, the value stack and the collected parse errors;
/// borrows the input buffer and the (shared, immutable) matcher graph.
/// Construct one per run, drive it once with [`run`], then take the results
/// apart.
///
/// [`run`]: MatcherContext::run
pub struct MatcherContext<'run, V: Clone> {
    input: &'run InputBuffer,
    graph: &'run MatcherGraph<V>,
    value_stack: ValueStack<V>,
    parse_errors: Vec<ParseError>,
    frames: Vec<Frame<V>>,
    fast_string_matching: bool,
    max_depth: usize,
}

impl<'run, V: Clone> MatcherContext<'run, V> {
    /// Create the machine with its root frame initialized for `root`.
    ///
    /// Fast string matching compares string literals atomically instead of
    /// running them as character sequences; it speeds up clean parses but
    /// hides character-level failures, so error-oriented passes disable it.
    ///
    /// # Errors
    ///
    /// Rejects a root matcher marked node-skipped: skipped matchers hand
    /// their children to an ancestor, and the root has none.
    pub fn new(
        input: &'run InputBuffer,
        graph: &'run MatcherGraph<V>,
        root: MatcherRef,
        fast_string_matching: bool,
    ) -> Result<Self, ParseRuntimeError> {
        // resolve proxies only; a var-framing root still runs its hooks
        let root = graph.unwrap_proxy(root);
        let root_matcher = graph.resolved(root);
        if root_matcher.is_node_skipped() {
            return Err(ParseRuntimeError::usage(
                "the root matcher must not be marked node-skipped",
            ));
        }
        let mut root_frame = Frame::retired();
        root_frame.matcher = Some(root);
        root_frame.current_char = input.char_at(0);
        root_frame.node_suppressed = root_matcher.is_node_suppressed();
        Ok(Self {
            input,
            graph,
            value_stack: ValueStack::new(),
            parse_errors: Vec::new(),
            frames: vec![root_frame],
            fast_string_matching,
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
        })
    }

    /// Replace the maximum frame depth (default
    /// [`DEFAULT_MAX_RECURSION_DEPTH`]).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Execute the run: drive the root frame through the handler.
    pub fn run<H: MatchHandler<V>>(&mut self, handler: &mut H) -> Result<bool, ParseRuntimeError> {
        log_debug!(
            "starting matching run over {} characters, fast_string_matching={}",
            self.input.len(),
            self.fast_string_matching
        );
        self.run_matcher(0, handler)
    }

    // ------------------------------------------------------------------
    // Frame machinery
    // ------------------------------------------------------------------

    /// Run the matcher of the frame at `level` through the handler.
    ///
    /// On success the reached position is propagated into the parent frame;
    /// on failure the value stack is restored to its state before the call.
    /// Either way the frame is retired and left in place for reuse.
    pub(crate) fn run_matcher<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        let snapshot = self.value_stack.take_snapshot();
        if handler.match_frame(self, level)? {
            if level > 0 {
                let (current_index, current_char) = {
                    let frame = &self.frames[level];
                    (frame.current_index, frame.current_char)
                };
                let parent = &mut self.frames[level - 1];
                parent.current_index = current_index;
                parent.current_char = current_char;
            }
            self.frames[level].matcher = None;
            Ok(true)
        } else {
            // the rule failed, so any stack effects it had are invalid
            self.value_stack.restore_snapshot(snapshot);
            self.frames[level].matcher = None;
            Ok(false)
        }
    }

    /// Execute the matcher of the frame at `level`.
    ///
    /// This is the entry point for [`MatchHandler`] implementations: a basic
    /// handler calls straight through, richer handlers observe the outcome.
    pub fn execute_match<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        let matcher = self.frames[level]
            .matcher
            .ok_or_else(|| ParseRuntimeError::usage("match attempted on a retired frame"))?;
        self.match_kind(level, matcher, handler)
    }

    /// Initialize the child frame of `level` for `matcher`.
    ///
    /// The child frame is created the first time this depth is reached and
    /// reused afterwards. Action matchers go through the basic path instead:
    /// only the matcher field changes, so the frame still carries the
    /// previous sibling's span and node, which is exactly what
    /// [`ActionContext::get_match`] reads.
    pub(crate) fn get_sub_context(
        &mut self,
        level: usize,
        matcher: MatcherRef,
    ) -> Result<(), ParseRuntimeError> {
        self.ensure_child_frame(level)?;
        let graph = self.graph;
        if matches!(graph.resolved(matcher).kind(), MatcherKind::Action(_)) {
            self.frames[level + 1].matcher = Some(matcher);
            return Ok(());
        }
        let (current_index, current_char, suppressed) = {
            let parent = &self.frames[level];
            let parent_matcher = parent.matcher.ok_or_else(|| {
                ParseRuntimeError::usage("sub-context requested from a retired frame")
            })?;
            let suppressed = parent.node_suppressed
                || graph.resolved(parent_matcher).are_subnodes_suppressed()
                || graph.resolved(matcher).is_node_suppressed();
            (parent.current_index, parent.current_char, suppressed)
        };
        let child = &mut self.frames[level + 1];
        child.matcher = Some(matcher);
        child.start_index = current_index;
        child.current_index = current_index;
        child.current_char = current_char;
        child.node = None;
        child.sub_nodes.clear();
        child.node_suppressed = suppressed;
        child.has_error = false;
        child.int_tag = 0;
        Ok(())
    }

    fn ensure_child_frame(&mut self, level: usize) -> Result<(), ParseRuntimeError> {
        if level + 1 >= self.max_depth {
            return Err(ParseRuntimeError::RecursionLimitExceeded {
                depth: level + 1,
                max_depth: self.max_depth,
            });
        }
        if self.frames.len() == level + 1 {
            self.frames.push(Frame::retired());
        }
        Ok(())
    }

    /// Move the position of the frame at `level` forward by `delta`
    /// characters, stopping at the end of the buffer.
    pub(crate) fn advance_index(&mut self, level: usize, delta: usize) {
        let input = self.input;
        let len = input.len();
        let frame = &mut self.frames[level];
        if frame.current_index < len {
            frame.current_index = (frame.current_index + delta).min(len);
        }
        frame.current_char = input.char_at(frame.current_index);
    }

    /// Set the position of the frame at `level`, refreshing its character.
    pub(crate) fn set_current_index(&mut self, level: usize, index: usize) {
        let input = self.input;
        let frame = &mut self.frames[level];
        frame.current_index = index;
        frame.current_char = input.char_at(index);
    }

    /// Flag the frame at `level` and all its ancestors as containing an
    /// error. Stops early at the first already-flagged ancestor.
    pub fn mark_error(&mut self, level: usize) {
        let mut l = level;
        loop {
            if self.frames[l].has_error {
                break;
            }
            self.frames[l].has_error = true;
            if l == 0 {
                break;
            }
            l -= 1;
        }
    }

    /// Clear node suppression on the frame at `level` and on every ancestor
    /// that was suppressed.
    pub(crate) fn clear_node_suppression(&mut self, level: usize) {
        let mut l = level;
        loop {
            if !self.frames[l].node_suppressed {
                break;
            }
            self.frames[l].node_suppressed = false;
            if l == 0 {
                break;
            }
            l -= 1;
        }
    }

    /// Build the parse-tree node for the frame at `level` and attach it to
    /// the nearest ancestor whose matcher is not node-skipped.
    ///
    /// No-op when the frame is suppressed or its matcher is node-skipped.
    pub(crate) fn create_node(&mut self, level: usize) -> Result<(), ParseRuntimeError> {
        if self.frames[level].node_suppressed {
            return Ok(());
        }
        let graph = self.graph;
        let matcher = self.frames[level]
            .matcher
            .ok_or_else(|| ParseRuntimeError::usage("create_node on a retired frame"))?;
        let resolved = graph.unwrap(matcher);
        if graph.matcher(resolved).is_node_skipped() {
            return Ok(());
        }
        let value = if self.value_stack.is_empty() {
            None
        } else {
            Some(self.value_stack.peek().clone())
        };
        let frame = &mut self.frames[level];
        let node = Arc::new(ParseNode::new(
            resolved,
            std::mem::take(&mut frame.sub_nodes),
            frame.start_index,
            frame.current_index,
            value,
            frame.has_error,
        ));
        frame.node = Some(Arc::clone(&node));
        if level == 0 {
            return Ok(());
        }
        let mut parent_level = level - 1;
        loop {
            let parent_matcher = self.frames[parent_level].matcher.ok_or_else(|| {
                ParseRuntimeError::usage("node attachment crossed a retired frame")
            })?;
            if !graph.resolved(parent_matcher).is_node_skipped() {
                break;
            }
            if parent_level == 0 {
                return Err(ParseRuntimeError::usage(
                    "the root matcher must not be marked node-skipped",
                ));
            }
            parent_level -= 1;
        }
        self.frames[parent_level].sub_nodes.push(node);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Matcher algorithms
    // ------------------------------------------------------------------

    fn match_kind<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        matcher: MatcherRef,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        let graph = self.graph;
        match graph.matcher(matcher).kind() {
            MatcherKind::Char(c) => {
                let c = *c;
                if self.frames[level].current_char == c {
                    self.advance_index(level, 1);
                    self.create_node(level)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MatcherKind::AnyOf(set) => {
                if set.contains(self.frames[level].current_char) {
                    self.advance_index(level, 1);
                    self.create_node(level)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MatcherKind::CharRange { lo, hi } => {
                let c = self.frames[level].current_char;
                if *lo <= c && c <= *hi {
                    self.advance_index(level, 1);
                    self.create_node(level)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MatcherKind::Any => {
                if self.frames[level].current_char != EOI {
                    self.advance_index(level, 1);
                    self.create_node(level)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MatcherKind::Str { text, chars } => {
                if self.fast_string_matching {
                    self.match_string(level, text)
                } else {
                    self.match_sequence(level, chars, handler)
                }
            }
            MatcherKind::Sequence(children) => self.match_sequence(level, children, handler),
            MatcherKind::FirstOf(children) => self.match_first_of(level, children, handler),
            MatcherKind::OneOrMore(child) => self.match_one_or_more(level, *child, handler),
            MatcherKind::ZeroOrMore(child) => self.match_zero_or_more(level, *child, handler),
            MatcherKind::Optional(child) => {
                self.get_sub_context(level, *child)?;
                self.run_matcher(level + 1, handler)?;
                self.create_node(level)?;
                Ok(true)
            }
            MatcherKind::Test(child) => self.match_test(level, *child, handler),
            MatcherKind::TestNot(child) => Ok(!self.match_test(level, *child, handler)?),
            MatcherKind::Action(action) => {
                let action = action.clone();
                self.match_action(level, action)
            }
            MatcherKind::Nothing => Ok(false),
            MatcherKind::Empty => {
                self.create_node(level)?;
                Ok(true)
            }
            MatcherKind::Proxy(target) => {
                let target = target.ok_or_else(|| {
                    ParseRuntimeError::usage("proxy matcher used before being armed")
                })?;
                self.match_kind(level, target, handler)
            }
            MatcherKind::VarFraming { inner, vars } => {
                for var in vars {
                    var.enter_frame();
                }
                let result = self.match_kind(level, *inner, handler);
                for var in vars {
                    var.exit_frame();
                }
                result
            }
        }
    }

    fn match_string(&mut self, level: usize, text: &[char]) -> Result<bool, ParseRuntimeError> {
        let start = self.frames[level].current_index;
        if !self.input.test_at(start, text) {
            return Ok(false);
        }
        self.advance_index(level, text.len());
        self.create_node(level)?;
        Ok(true)
    }

    fn match_sequence<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        children: &[MatcherRef],
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        for (i, &child) in children.iter().enumerate() {
            // 1-based position of the child being attempted, observable from
            // actions through get_match
            self.frames[level].int_tag = i + 1;
            self.get_sub_context(level, child)?;
            if !self.run_matcher(level + 1, handler)? {
                return Ok(false);
            }
        }
        self.create_node(level)?;
        Ok(true)
    }

    fn match_first_of<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        children: &[MatcherRef],
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        for &child in children {
            // a failed child has already restored position and stack
            self.get_sub_context(level, child)?;
            if self.run_matcher(level + 1, handler)? {
                self.create_node(level)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn match_one_or_more<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        child: MatcherRef,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        self.get_sub_context(level, child)?;
        if !self.run_matcher(level + 1, handler)? {
            return Ok(false);
        }
        self.repeat_while_consuming(level, child, handler)?;
        self.create_node(level)?;
        Ok(true)
    }

    fn match_zero_or_more<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        child: MatcherRef,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        self.repeat_while_consuming(level, child, handler)?;
        self.create_node(level)?;
        Ok(true)
    }

    fn repeat_while_consuming<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        child: MatcherRef,
        handler: &mut H,
    ) -> Result<(), ParseRuntimeError> {
        let mut before = self.frames[level].current_index;
        loop {
            self.get_sub_context(level, child)?;
            if !self.run_matcher(level + 1, handler)? {
                break;
            }
            let after = self.frames[level].current_index;
            if after == before {
                // the child matched without consuming; stop to guarantee
                // termination
                break;
            }
            before = after;
        }
        Ok(())
    }

    fn match_test<H: MatchHandler<V>>(
        &mut self,
        level: usize,
        child: MatcherRef,
        handler: &mut H,
    ) -> Result<bool, ParseRuntimeError> {
        let index = self.frames[level].current_index;
        let snapshot = self.value_stack.take_snapshot();
        self.get_sub_context(level, child)?;
        let matched = self.run_matcher(level + 1, handler)?;
        // predicates never move the position nor keep stack effects
        self.set_current_index(level, index);
        self.value_stack.restore_snapshot(snapshot);
        Ok(matched)
    }

    fn match_action(
        &mut self,
        level: usize,
        action: ActionFn<V>,
    ) -> Result<bool, ParseRuntimeError> {
        // the action frame was acquired through the basic path and still
        // carries the previous sibling's position; sync with the parent
        if level > 0 {
            let index = self.frames[level - 1].current_index;
            self.set_current_index(level, index);
        }
        let outcome = {
            let mut context = ActionContext {
                machine: self,
                level,
            };
            (*action)(&mut context)
        };
        match outcome {
            Ok(matched) => Ok(matched),
            Err(source) => Err(ParseRuntimeError::Action {
                error_index: self.frames[level].current_index,
                path: self.path(level).to_string(),
                source,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The graph this run matches against.
    #[inline]
    pub fn graph(&self) -> &'run MatcherGraph<V> {
        self.graph
    }

    /// The input buffer of this run.
    #[inline]
    pub fn input(&self) -> &'run InputBuffer {
        self.input
    }

    /// Current input index of the frame at `level`.
    #[inline]
    pub fn current_index(&self, level: usize) -> usize {
        self.frames[level].current_index
    }

    /// Start index of the frame at `level`.
    #[inline]
    pub fn start_index(&self, level: usize) -> usize {
        self.frames[level].start_index
    }

    /// Matcher of the frame at `level`, or `None` if the frame is retired.
    #[inline]
    pub fn frame_matcher(&self, level: usize) -> Option<MatcherRef> {
        self.frames[level].matcher
    }

    /// True if the frame at `level` sits inside a `Test` or `TestNot`.
    pub fn in_predicate(&self, level: usize) -> bool {
        self.frames[..=level].iter().any(|frame| {
            frame.matcher.map_or(false, |m| {
                matches!(
                    self.graph.resolved(m).kind(),
                    MatcherKind::Test(_) | MatcherKind::TestNot(_)
                )
            })
        })
    }

    /// The chain of matcher labels from the root down to `level`.
    pub fn path(&self, level: usize) -> MatcherPath {
        let mut elements = Vec::with_capacity(level + 1);
        for frame in &self.frames[..=level] {
            if let Some(matcher) = frame.matcher {
                elements.push(MatcherPathElement {
                    label: self.graph.resolved(matcher).label().to_string(),
                    start_index: frame.start_index,
                });
            }
        }
        MatcherPath { elements }
    }

    /// Record a user-visible parse error for this run.
    pub fn push_parse_error(&mut self, error: ParseError) {
        self.parse_errors.push(error);
    }

    /// The parse errors recorded so far.
    pub fn parse_errors(&self) -> &[ParseError] {
        &self.parse_errors
    }

    /// True if an error was marked anywhere in the run.
    pub fn root_has_error(&self) -> bool {
        self.frames[0].has_error
    }

    /// Number of frames allocated so far; never exceeds parse depth + 1.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn into_parts(
        mut self,
    ) -> (bool, Option<Arc<ParseNode<V>>>, Vec<ParseError>, ValueStack<V>) {
        let root_has_error = self.frames[0].has_error;
        let root_node = self.frames[0].node.take();
        (root_has_error, root_node, self.parse_errors, self.value_stack)
    }

    // ------------------------------------------------------------------
    // Previous-match access for actions
    // ------------------------------------------------------------------

    fn deepest_active_level(&self, from: usize) -> usize {
        let mut level = from;
        while level + 1 < self.frames.len() && self.frames[level + 1].matcher.is_some() {
            level += 1;
        }
        level
    }

    fn prev_sequence_level(&self, from: usize) -> Result<usize, ParseRuntimeError> {
        let illegal = || {
            ParseRuntimeError::usage(
                "get_match is only valid in Sequence rule actions that are not in first position",
            )
        };
        let action_level = self.deepest_active_level(from);
        if action_level == 0 {
            return Err(illegal());
        }
        let action_matcher = self.frames[action_level].matcher.ok_or_else(illegal)?;
        if !matches!(
            self.graph.resolved(action_matcher).kind(),
            MatcherKind::Action(_)
        ) {
            return Err(illegal());
        }
        let sequence_level = action_level - 1;
        let sequence_frame = &self.frames[sequence_level];
        let sequence_matcher = sequence_frame.matcher.ok_or_else(illegal)?;
        if !matches!(
            self.graph.resolved(sequence_matcher).kind(),
            MatcherKind::Sequence(_)
        ) || sequence_frame.int_tag <= 1
        {
            return Err(illegal());
        }
        Ok(sequence_level)
    }

    pub(crate) fn get_match(&self, from: usize) -> Result<String, ParseRuntimeError> {
        let sequence_level = self.prev_sequence_level(from)?;
        let prev = &self.frames[sequence_level + 1];
        if self.frames[sequence_level].has_error {
            Ok(prev
                .node
                .as_ref()
                .map(|node| node.text(self.input))
                .unwrap_or_default())
        } else {
            Ok(self.input.extract(prev.start_index, prev.current_index))
        }
    }

    pub(crate) fn get_match_start_index(&self, from: usize) -> Result<usize, ParseRuntimeError> {
        let sequence_level = self.prev_sequence_level(from)?;
        Ok(self.frames[sequence_level + 1].start_index)
    }

    pub(crate) fn get_match_end_index(&self, from: usize) -> Result<usize, ParseRuntimeError> {
        let sequence_level = self.prev_sequence_level(from)?;
        Ok(self.frames[sequence_level + 1].current_index)
    }
}

/// The view a semantic action gets of the running machine.
///
/// Actions read and write the value stack, inspect their position, and read
/// the text matched by the previous sibling of their enclosing sequence.
pub struct ActionContext<'c, 'run, V: Clone> {
    machine: &'c mut MatcherContext<'run, V>,
    level: usize,
}

impl<'c, 'run, V: Clone> ActionContext<'c, 'run, V> {
    /// The run's value stack.
    pub fn value_stack(&mut self) -> &mut ValueStack<V> {
        &mut self.machine.value_stack
    }

    /// The input buffer.
    pub fn input(&self) -> &InputBuffer {
        self.machine.input
    }

    /// Current input index of the action's frame.
    pub fn current_index(&self) -> usize {
        self.machine.frames[self.level].current_index
    }

    /// Character at the current input index.
    pub fn current_char(&self) -> char {
        self.machine.frames[self.level].current_char
    }

    /// Depth of the action's frame.
    pub fn level(&self) -> usize {
        self.level
    }

    /// True if the action runs inside a lookahead.
    pub fn in_predicate(&self) -> bool {
        self.machine.in_predicate(self.level)
    }

    /// Text matched by the previous sibling of the enclosing sequence.
    ///
    /// # Errors
    ///
    /// Usage error unless the action is a non-first element of a `Sequence`.
    pub fn get_match(&self) -> Result<String, ParseRuntimeError> {
        self.machine.get_match(self.level)
    }

    /// Start index of the previous sibling's match.
    pub fn get_match_start_index(&self) -> Result<usize, ParseRuntimeError> {
        self.machine.get_match_start_index(self.level)
    }

    /// End index of the previous sibling's match.
    pub fn get_match_end_index(&self) -> Result<usize, ParseRuntimeError> {
        self.machine.get_match_end_index(self.level)
    }

    /// Flag the action's frame (and its ancestors) as erroneous.
    pub fn mark_error(&mut self) {
        self.machine.mark_error(self.level);
    }

    /// Re-enable node building from the action's frame upward.
    pub fn clear_node_suppression(&mut self) {
        self.machine.clear_node_suppression(self.level);
    }

    /// Record a user-visible parse error.
    pub fn push_parse_error(&mut self, error: ParseError) {
        self.machine.push_parse_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::handlers::BasicMatchHandler;

    fn run_on(graph: &MatcherGraph<i64>, root: MatcherRef, input: &str) -> bool {
        let buffer = InputBuffer::new(input);
        let mut machine = MatcherContext::new(&buffer, graph, root, true).unwrap();
        machine.run(&mut BasicMatchHandler).unwrap()
    }

    #[test]
    fn test_single_char_match() {
        let mut b = GraphBuilder::<i64>::new();
        let root = b.ch('a');
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("a");
        let mut machine = MatcherContext::new(&buffer, &graph, root, true).unwrap();
        assert!(machine.run(&mut BasicMatchHandler).unwrap());
        let (has_error, node, errors, _stack) = machine.into_parts();
        assert!(!has_error);
        assert!(errors.is_empty());
        let node = node.expect("root node");
        assert_eq!(node.start_index(), 0);
        assert_eq!(node.end_index(), 1);
    }

    #[test]
    fn test_frame_reuse_bounds_allocation() {
        let mut b = GraphBuilder::<i64>::new();
        let a = b.ch('a');
        let many = b.one_or_more(a);
        let bang = b.ch('!');
        let root = b.seq([many, bang]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("aaaaaaaa!");
        let mut machine = MatcherContext::new(&buffer, &graph, root, true).unwrap();
        assert!(machine.run(&mut BasicMatchHandler).unwrap());
        // depth is root -> repetition -> char, so at most 3 frames ever exist
        assert!(machine.frame_count() <= 3, "frames: {}", machine.frame_count());
    }

    #[test]
    fn test_failure_restores_value_stack() {
        let mut b = GraphBuilder::<i64>::new();
        let push = b.action(|ctx| {
            ctx.value_stack().push(42);
            Ok(true)
        });
        let a = b.ch('a');
        let x = b.ch('x');
        // the action pushes, then 'x' fails on input "ab"
        let seq = b.seq([a, push, x]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("ab");
        let mut machine = MatcherContext::new(&buffer, &graph, seq, true).unwrap();
        assert!(!machine.run(&mut BasicMatchHandler).unwrap());
        let (_, _, _, stack) = machine.into_parts();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lookahead_keeps_position_and_stack() {
        let mut b = GraphBuilder::<i64>::new();
        let push = b.action(|ctx| {
            ctx.value_stack().push(1);
            Ok(true)
        });
        let a = b.ch('a');
        let probe = b.seq([push, a]);
        let look = b.test(probe);
        let a2 = b.ch('a');
        let root = b.seq([look, a2]);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new("a");
        let mut machine = MatcherContext::new(&buffer, &graph, root, true).unwrap();
        assert!(machine.run(&mut BasicMatchHandler).unwrap());
        let (_, node, _, stack) = machine.into_parts();
        // the lookahead's push was rolled back
        assert!(stack.is_empty());
        // and the lookahead consumed nothing: 'a' was still matchable
        assert_eq!(node.unwrap().end_index(), 1);
    }

    #[test]
    fn test_recursion_limit() {
        let mut b = GraphBuilder::<i64>::new();
        let p = b.proxy();
        let a = b.ch('a');
        let deeper = b.seq([a, p]);
        let root = b.first_of([deeper, a]);
        b.arm(p, root);
        let graph = b.build().unwrap();

        let buffer = InputBuffer::new(&"a".repeat(100));
        let mut machine = MatcherContext::new(&buffer, &graph, root, true)
            .unwrap()
            .with_max_depth(16);
        let err = machine.run(&mut BasicMatchHandler).unwrap_err();
        assert!(matches!(
            err,
            ParseRuntimeError::RecursionLimitExceeded { max_depth: 16, .. }
        ));
    }

    #[test]
    fn test_skipped_root_rejected() {
        let mut b = GraphBuilder::<i64>::new();
        let a = b.ch('a');
        b.skip_node(a);
        let graph = b.build().unwrap();
        let buffer = InputBuffer::new("a");
        assert!(MatcherContext::new(&buffer, &graph, a, true).is_err());
    }

    #[test]
    fn test_run_on_helper_sanity() {
        let mut b = GraphBuilder::<i64>::new();
        let root = b.string("ok");
        let graph = b.build().unwrap();
        assert!(run_on(&graph, root, "ok"));
        assert!(!run_on(&graph, root, "no"));
    }
}
