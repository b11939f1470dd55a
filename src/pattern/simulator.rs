//! Breadth-first simulation of a compiled [`Graph`].
//!
//! A simulation never backtracks. It keeps a worklist of states, refuses any
//! state whose `(node, cursor, counters)` key it has already explored, and
//! ranks every state it produces, terminal or not, so the best partial
//! match is always available for diagnostics.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;

use itertools::{EitherOrBoth, Itertools};
use log::trace;

use super::graph::{Graph, Matcher, NodeId};
use crate::location::Span;

/// Simulation steps allowed per top-level match unless configured otherwise.
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    StepBudgetExceeded { limit: usize },
    NestingTooDeep { limit: usize },
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StepBudgetExceeded { limit } => {
                write!(f, "Match abandoned after exceeding the step budget of {limit} steps")
            }
            Self::NestingTooDeep { limit } => {
                write!(f, "Match abandoned after nesting more than {limit} expressions deep")
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Step allowance shared by a match and every nested match it spawns.
#[derive(Debug, Clone)]
pub struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn charge(&mut self) -> Result<(), MatchError> {
        if self.used >= self.limit {
            return Err(MatchError::StepBudgetExceeded { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

/// Something that would have let a match get further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    /// Production that was being matched.
    pub expectant: String,
    /// `"NAME token"` or `"Name expression"`.
    pub message: String,
    pub index: usize,
}

/// Merge diagnostics, keeping only those at the furthest index.
pub fn merge_expected(into: &mut Vec<Expected>, incoming: impl IntoIterator<Item = Expected>) {
    for entry in incoming {
        match into.first().map(|first| entry.index.cmp(&first.index)) {
            None => into.push(entry),
            Some(Ordering::Greater) => {
                into.clear();
                into.push(entry);
            }
            Some(Ordering::Equal) => {
                if !into.contains(&entry) {
                    into.push(entry);
                }
            }
            Some(Ordering::Less) => {}
        }
    }
}

/// Result of trying one matcher at one cursor.
#[derive(Debug, Clone)]
pub enum Evaluation<V> {
    Fail(Option<Expected>),
    /// A nested match made progress but did not complete.
    Partial(Vec<Expected>),
    /// Zero-width success.
    Empty,
    Consumed(Step<V>),
}

#[derive(Debug, Clone)]
pub struct Step<V> {
    pub value: V,
    /// Units credited towards ranking: one per character or token.
    pub units: usize,
    pub span: Span,
    pub expected: Vec<Expected>,
}

/// The input side of a simulation.
pub trait Source {
    type Value: Clone;

    fn budget(&mut self) -> &mut Budget;

    /// Skip input that never takes part in a match.
    fn skip_insignificant(&self, cursor: usize) -> usize {
        cursor
    }

    fn evaluate(
        &mut self,
        graph: &Graph,
        matcher: &Matcher,
        cursor: usize,
        expectant: &str,
    ) -> Result<Evaluation<Self::Value>, MatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Only states at an accepting node are candidates.
    AcceptingOnly,
    /// Every state is a candidate; completeness is part of the ranking.
    Any,
}

/// The best state a simulation found.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<V> {
    pub complete: bool,
    pub units: usize,
    /// Cursor the simulation started from.
    pub start: usize,
    pub cursor: usize,
    /// Extent of everything consumed, if anything was.
    pub span: Option<Span>,
    pub counters: Vec<Option<usize>>,
    pub captures: BTreeMap<String, Vec<V>>,
    pub promoted: Vec<V>,
    pub expected: Vec<Expected>,
}

impl<V> Outcome<V> {
    /// An incomplete outcome that consumed nothing.
    pub fn unmatched(start: usize) -> Self {
        Self {
            complete: false,
            units: 0,
            start,
            cursor: start,
            span: None,
            counters: Vec::new(),
            captures: BTreeMap::new(),
            promoted: Vec::new(),
            expected: Vec::new(),
        }
    }

    /// End of the consumed input.
    pub fn end(&self) -> usize {
        self.span.map_or(self.start, |span| span.end)
    }

    pub fn standing(&self) -> Standing<'_> {
        Standing {
            complete: self.complete,
            units: self.units,
            counters: &self.counters,
        }
    }
}

/// The parts of a match that decide which of two is better.
#[derive(Debug, Clone, Copy)]
pub struct Standing<'a> {
    pub complete: bool,
    pub units: usize,
    pub counters: &'a [Option<usize>],
}

impl Standing<'_> {
    /// A complete match displaces an incomplete one. Otherwise a longer
    /// match wins, complete or not, as long as it repeated no non-greedy
    /// quantifier more often. Between equally long matches of the same
    /// completeness, fewer repeats win.
    ///
    /// The relation is applied in discovery order and is not transitive.
    pub fn outranks(&self, incumbent: &Standing<'_>) -> bool {
        if self.complete && !incumbent.complete {
            return true;
        }
        match self.units.cmp(&incumbent.units) {
            Ordering::Greater => counters_not_worse(incumbent.counters, self.counters),
            Ordering::Equal => {
                self.complete == incumbent.complete
                    && self.counters != incumbent.counters
                    && counters_not_worse(incumbent.counters, self.counters)
            }
            Ordering::Less => false,
        }
    }
}

/// Whether `candidate` repeated no non-greedy quantifier more than `current`.
///
/// A slot the candidate used but `current` never entered counts as worse.
pub fn counters_not_worse(current: &[Option<usize>], candidate: &[Option<usize>]) -> bool {
    current
        .iter()
        .zip_longest(candidate)
        .all(|pair| match pair {
            EitherOrBoth::Both(Some(old), Some(new)) => new <= old,
            EitherOrBoth::Both(None, Some(_)) | EitherOrBoth::Right(Some(_)) => false,
            _ => true,
        })
}

#[derive(Debug, Clone)]
struct MatchState<V> {
    node: NodeId,
    complete: bool,
    cursor: usize,
    units: usize,
    span: Option<Span>,
    counters: Vec<Option<usize>>,
    captures: Rc<BTreeMap<String, Vec<V>>>,
    promoted: Rc<Vec<V>>,
    /// Diagnostics inherited along the path and folded in from partial
    /// nested matches.
    expected: Vec<Expected>,
    /// Connections that failed at this state's cursor.
    frontier: Vec<Expected>,
}

impl<V: Clone> MatchState<V> {
    fn initial(graph: &Graph, entry: NodeId, cursor: usize) -> Self {
        Self {
            node: entry,
            complete: graph.node(entry).accepting,
            cursor,
            units: 0,
            span: None,
            counters: vec![None; graph.counter_slots()],
            captures: Rc::default(),
            promoted: Rc::default(),
            expected: Vec::new(),
            frontier: Vec::new(),
        }
    }

    fn standing(&self) -> Standing<'_> {
        Standing {
            complete: self.complete,
            units: self.units,
            counters: &self.counters,
        }
    }

    fn reported(&self) -> Vec<Expected> {
        let mut reported = self.expected.clone();
        if !self.complete {
            merge_expected(&mut reported, self.frontier.iter().cloned());
        }
        reported
    }

    fn successor(&self, graph: &Graph, target: NodeId, step: Option<Step<V>>) -> Self {
        let node = graph.node(target);
        let mut next = Self {
            node: target,
            complete: node.accepting,
            cursor: self.cursor,
            units: self.units,
            span: self.span,
            counters: self.counters.clone(),
            captures: Rc::clone(&self.captures),
            promoted: Rc::clone(&self.promoted),
            expected: self.expected.clone(),
            frontier: Vec::new(),
        };
        let Some(step) = step else {
            return next;
        };

        next.cursor = step.span.end;
        next.units += step.units;
        if step.units > 0 {
            next.span = Some(match self.span {
                Some(span) => Span::new(span.start, step.span.end),
                None => step.span,
            });
            // Only steps that consume count as repeats.
            if let Some(slot) = node.counter {
                *next.counters[slot].get_or_insert(0) += 1;
            }
        }
        for capture in &node.captures {
            Rc::make_mut(&mut next.captures)
                .entry(capture.name.clone())
                .or_default()
                .push(step.value.clone());
            if capture.promoted {
                Rc::make_mut(&mut next.promoted).push(step.value.clone());
            }
        }
        merge_expected(&mut next.expected, step.expected);
        next
    }

    fn into_outcome(self, start: usize) -> Outcome<V> {
        let expected = self.reported();
        Outcome {
            complete: self.complete,
            units: self.units,
            start,
            cursor: self.cursor,
            span: self.span,
            counters: self.counters,
            captures: Rc::unwrap_or_clone(self.captures),
            promoted: Rc::unwrap_or_clone(self.promoted),
            expected,
        }
    }
}

/// Run `graph` from `entry` against `source` starting at `cursor`.
///
/// Returns `None` only when `selection` rules out every state produced.
pub fn simulate<S: Source>(
    graph: &Graph,
    entry: NodeId,
    source: &mut S,
    cursor: usize,
    expectant: &str,
    selection: Selection,
) -> Result<Option<Outcome<S::Value>>, MatchError> {
    let mut queue = VecDeque::from([MatchState::initial(graph, entry, cursor)]);
    let mut seen = HashSet::new();
    let mut best: Option<MatchState<S::Value>> = None;
    let mut steps = 0usize;

    while let Some(mut state) = queue.pop_front() {
        source.budget().charge()?;
        steps += 1;
        state.cursor = source.skip_insignificant(state.cursor);
        if seen.insert((state.node, state.cursor, state.counters.clone())) {
            advance(graph, source, expectant, &mut state, &mut queue)?;
        }

        if selection == Selection::AcceptingOnly && !state.complete {
            continue;
        }
        let replaces = match &best {
            None => true,
            Some(incumbent) => state.standing().outranks(&incumbent.standing()),
        };
        if replaces {
            if let Some(old) = best.take()
                && old.units > state.units
            {
                merge_expected(&mut state.expected, old.reported());
            }
            best = Some(state);
        }
    }

    trace!("{expectant:?}: {steps} steps from cursor {cursor}");
    Ok(best.map(|state| state.into_outcome(cursor)))
}

fn advance<S: Source>(
    graph: &Graph,
    source: &mut S,
    expectant: &str,
    state: &mut MatchState<S::Value>,
    queue: &mut VecDeque<MatchState<S::Value>>,
) -> Result<(), MatchError> {
    let mut steps = Vec::new();
    for conn in &graph.node(state.node).connections {
        match source.evaluate(graph, &conn.matcher, state.cursor, expectant)? {
            Evaluation::Fail(expected) => merge_expected(&mut state.frontier, expected),
            Evaluation::Partial(expected) => merge_expected(&mut state.expected, expected),
            Evaluation::Empty => steps.push((conn.target, None)),
            Evaluation::Consumed(step) => steps.push((conn.target, Some(step))),
        }
    }
    // Successors are created only once every sibling partial has been
    // folded in, so they all inherit the same diagnostics.
    queue.extend(
        steps
            .into_iter()
            .map(|(target, step)| state.successor(graph, target, step)),
    );
    Ok(())
}
