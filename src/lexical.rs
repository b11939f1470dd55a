//! Character-level patterns.
//!
//! A [`LexicalPattern`] is a compiled regular-expression-like pattern. Only
//! accepting states are candidates, so a lexical match is always complete;
//! among them the longest wins unless a non-greedy quantifier would have to
//! repeat more often to get there.

use std::collections::BTreeMap;

use crate::location::Span;
use crate::pattern::char_class::{charset_matches, shorthand_matches};
use crate::pattern::simulator::{Evaluation, Selection, Source, Step, simulate};
use crate::pattern::{Budget, Graph, MatchError, Matcher, PatternError, parse_lexical};

#[derive(Debug, Clone)]
pub struct LexicalPattern {
    source: String,
    anchored: bool,
    graph: Graph,
}

/// A successful lexical match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalMatch {
    /// Matched text, excluding anything only looked ahead at.
    pub text: String,
    /// Text recorded by each named group. Repeated groups concatenate.
    pub captures: BTreeMap<String, String>,
    pub span: Span,
}

impl LexicalPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let def = parse_lexical(pattern)?;
        Ok(Self {
            source: pattern.to_string(),
            anchored: def.anchored,
            graph: Graph::compile(&def.items),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern began with `^`.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Find the first match at or after `cursor` (a character index).
    pub fn find(&self, input: &str, cursor: usize) -> Result<Option<LexicalMatch>, MatchError> {
        let chars: Vec<char> = input.chars().collect();
        self.find_with_budget(&chars, cursor, &mut Budget::default())
    }

    /// As [`find`](Self::find), over pre-split input and an explicit budget.
    ///
    /// An anchored pattern is only tried at `cursor`.
    pub fn find_with_budget(
        &self,
        input: &[char],
        cursor: usize,
        budget: &mut Budget,
    ) -> Result<Option<LexicalMatch>, MatchError> {
        let mut start = cursor;
        loop {
            if let Some(found) = self.match_at(input, start, budget)? {
                return Ok(Some(found));
            }
            start += 1;
            if self.anchored || start > input.len() {
                return Ok(None);
            }
        }
    }

    /// Try the pattern at exactly `cursor`.
    pub fn match_at(
        &self,
        input: &[char],
        cursor: usize,
        budget: &mut Budget,
    ) -> Result<Option<LexicalMatch>, MatchError> {
        if cursor > input.len() {
            return Ok(None);
        }
        let mut source = CharSource { input, budget };
        let outcome = simulate(
            &self.graph,
            self.graph.entry(),
            &mut source,
            cursor,
            "",
            Selection::AcceptingOnly,
        )?;
        Ok(outcome.map(|outcome| LexicalMatch {
            text: input[cursor..outcome.cursor].iter().collect(),
            captures: outcome
                .captures
                .into_iter()
                .map(|(name, chars)| (name, chars.into_iter().collect()))
                .collect(),
            span: Span::new(cursor, outcome.cursor),
        }))
    }
}

struct CharSource<'a> {
    input: &'a [char],
    budget: &'a mut Budget,
}

impl Source for CharSource<'_> {
    type Value = char;

    fn budget(&mut self) -> &mut Budget {
        &mut *self.budget
    }

    fn evaluate(
        &mut self,
        graph: &Graph,
        matcher: &Matcher,
        cursor: usize,
        _expectant: &str,
    ) -> Result<Evaluation<char>, MatchError> {
        let next = self.input.get(cursor).copied();
        let accepted = match matcher {
            Matcher::Empty => return Ok(Evaluation::Empty),
            Matcher::EndOfInput => {
                return Ok(if next.is_none() {
                    Evaluation::Empty
                } else {
                    Evaluation::Fail(None)
                });
            }
            Matcher::Lookahead(entry) => {
                let ahead = simulate(graph, *entry, self, cursor, "", Selection::AcceptingOnly)?;
                return Ok(if ahead.is_some() {
                    Evaluation::Empty
                } else {
                    Evaluation::Fail(None)
                });
            }
            Matcher::Any => next,
            Matcher::Literal(c) => next.filter(|ch| ch == c),
            Matcher::CharSet(cs) => next.filter(|ch| charset_matches(cs, *ch)),
            Matcher::Shorthand(s) => next.filter(|ch| shorthand_matches(*s, *ch)),
            Matcher::Identifier(_) => None,
        };
        Ok(match accepted {
            Some(ch) => Evaluation::Consumed(Step {
                value: ch,
                units: 1,
                span: Span::new(cursor, cursor + 1),
                expected: Vec::new(),
            }),
            None => Evaluation::Fail(None),
        })
    }
}
