//! Token and production tables, and matching against them.
//!
//! Grammar patterns match source text directly. An identifier resolves to a
//! production first, whose alternatives are simulated recursively and
//! ranked, and otherwise to a token, whose lexical pattern is tried at the
//! cursor. Whitespace between members is skipped.
//!
//! Production results are memoized per cursor. Re-entering a production at
//! the cursor it is already being evaluated at yields its current seed
//! (initially a failure); the seed is then grown until re-evaluation stops
//! improving it, which gives left-recursive productions their longest
//! complete parse. Productions may nest at most [`MAX_NESTING`] deep at
//! once; deeper input is abandoned with [`MatchError::NestingTooDeep`].

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use itertools::Itertools;
use log::trace;

use crate::lexical::LexicalPattern;
use crate::location::Span;
use crate::pattern::ast::{CaptureName, Element, Group, GroupKind, Item, Quantifier};
use crate::pattern::simulator::{Evaluation, Selection, Source, Step, simulate};
use crate::pattern::{
    Budget, Expected, Graph, MatchError, Matcher, Outcome, PatternError, merge_expected,
    parse_grammar,
};
use crate::token::Token;

/// Name of the built-in comment production.
pub const COMMENT: &str = "Comment";

/// Productions that may be under evaluation at once.
pub const MAX_NESTING: usize = 128;

const SEED_TOKENS: [(&str, &str); 2] = [
    ("LINE_COMMENT", r"^//(?<comment>[^\r\n]+)"),
    ("BLOCK_COMMENT", r"^/\*(?<comment>.*?)\*/"),
];

const COMMENT_BODY: &str = "(?<comment>LINE_COMMENT | BLOCK_COMMENT)";

/// A value recorded under a capture name.
#[derive(Debug, Clone)]
pub enum Capture {
    Token(Token),
    Expression(Rc<ExpressionMatch>),
}

pub type GrammarOutcome = Outcome<Capture>;

/// A production matched as a single unit.
#[derive(Debug, Clone)]
pub struct ExpressionMatch {
    pub production: String,
    pub outcome: Rc<GrammarOutcome>,
}

#[derive(Debug, Clone)]
pub struct TokenDef {
    pub name: String,
    pub pattern: LexicalPattern,
}

#[derive(Debug, Clone)]
pub struct Production {
    pub name: String,
    /// Tried in declaration order; the best outcome wins.
    pub alternatives: Vec<GrammarPattern>,
}

/// A compiled production body.
#[derive(Debug, Clone)]
pub struct GrammarPattern {
    source: String,
    graph: Graph,
}

impl GrammarPattern {
    pub fn new(body: &str) -> Result<Self, PatternError> {
        Ok(Self {
            source: body.to_string(),
            graph: Graph::compile(&parse_grammar(body)?),
        })
    }

    /// Compile `body` behind any number of leading comments, captured as
    /// `comments`.
    pub fn with_leading_comments(body: &str) -> Result<Self, PatternError> {
        let members = parse_grammar(body)?;
        let comments = Item {
            quantifier: Quantifier::ZeroOrMore,
            greedy: true,
            element: Element::Group(Group {
                members: vec![Item::once(Element::Identifier(COMMENT.to_string()))],
                captures: vec![CaptureName {
                    name: "comments".to_string(),
                    promoted: false,
                }],
                kind: GroupKind::Plain,
            }),
        };
        let wrapped = Item::once(Element::Group(Group {
            members,
            captures: Vec::new(),
            kind: GroupKind::Plain,
        }));
        Ok(Self {
            source: body.to_string(),
            graph: Graph::compile(&[comments, wrapped]),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match this body alone against `input` from `cursor`.
    pub fn match_source(
        &self,
        grammar: &Grammar,
        input: &str,
        cursor: usize,
        expectant: &str,
        budget: &mut Budget,
    ) -> Result<GrammarOutcome, MatchError> {
        let chars: Vec<char> = input.chars().collect();
        let mut resolver = Resolver::new(grammar, &chars, budget);
        let outcome = simulate(
            &self.graph,
            self.graph.entry(),
            &mut resolver,
            cursor,
            expectant,
            Selection::Any,
        )?;
        Ok(outcome.unwrap_or_else(|| Outcome::unmatched(cursor)))
    }
}

/// The live token and production tables.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    tokens: Vec<TokenDef>,
    token_index: HashMap<String, usize>,
    productions: Vec<Production>,
    production_index: HashMap<String, usize>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grammar seeded with the comment tokens and the `Comment` production.
    pub fn with_comments() -> Result<Self, PatternError> {
        let mut grammar = Self::new();
        for (name, pattern) in SEED_TOKENS {
            grammar.define_token(name, pattern)?;
        }
        grammar.define_production(COMMENT, COMMENT_BODY)?;
        Ok(grammar)
    }

    /// Register a token, replacing any earlier token of the same name.
    ///
    /// Tokens are only ever tried at the cursor, so the pattern should
    /// normally be anchored with `^`.
    pub fn define_token(&mut self, name: &str, pattern: &str) -> Result<(), PatternError> {
        let def = TokenDef {
            name: name.to_string(),
            pattern: LexicalPattern::new(pattern)?,
        };
        match self.token_index.get(name) {
            Some(&index) => self.tokens[index] = def,
            None => {
                self.token_index.insert(name.to_string(), self.tokens.len());
                self.tokens.push(def);
            }
        }
        Ok(())
    }

    /// Append an alternative to a production, creating it if needed.
    pub fn define_production(&mut self, name: &str, body: &str) -> Result<(), PatternError> {
        let pattern = GrammarPattern::new(body)?;
        self.add_alternative(name, pattern);
        Ok(())
    }

    /// As [`define_production`](Self::define_production), allowing leading
    /// comments before the body.
    pub fn define_commented_production(&mut self, name: &str, body: &str) -> Result<(), PatternError> {
        let pattern = GrammarPattern::with_leading_comments(body)?;
        self.add_alternative(name, pattern);
        Ok(())
    }

    fn add_alternative(&mut self, name: &str, pattern: GrammarPattern) {
        let index = match self.production_index.get(name) {
            Some(&index) => index,
            None => {
                self.production_index
                    .insert(name.to_string(), self.productions.len());
                self.productions.push(Production {
                    name: name.to_string(),
                    alternatives: Vec::new(),
                });
                self.productions.len() - 1
            }
        };
        self.productions[index].alternatives.push(pattern);
    }

    pub fn token(&self, name: &str) -> Option<&TokenDef> {
        self.token_index.get(name).map(|&i| &self.tokens[i])
    }

    /// Tokens in declaration order.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenDef> {
        self.tokens.iter()
    }

    pub fn production(&self, name: &str) -> Option<&Production> {
        self.production_index.get(name).map(|&i| &self.productions[i])
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.iter()
    }

    /// Identifiers used in some production that name neither a production
    /// nor a token.
    pub fn undefined_references(&self) -> Vec<String> {
        self.productions
            .iter()
            .flat_map(|p| &p.alternatives)
            .flat_map(|alt| alt.graph.identifiers())
            .filter(|name| {
                !self.production_index.contains_key(*name) && !self.token_index.contains_key(*name)
            })
            .unique()
            .sorted()
            .map(str::to_string)
            .collect()
    }

    /// Match the production `name` against `input` from `cursor`.
    ///
    /// Returns `None` when no such production exists.
    pub fn match_production(
        &self,
        name: &str,
        input: &str,
        cursor: usize,
        budget: &mut Budget,
    ) -> Result<Option<ExpressionMatch>, MatchError> {
        let chars: Vec<char> = input.chars().collect();
        self.match_production_chars(name, &chars, cursor, budget)
    }

    pub(crate) fn match_production_chars(
        &self,
        name: &str,
        input: &[char],
        cursor: usize,
        budget: &mut Budget,
    ) -> Result<Option<ExpressionMatch>, MatchError> {
        let Some(&index) = self.production_index.get(name) else {
            return Ok(None);
        };
        let mut resolver = Resolver::new(self, input, budget);
        let cursor = resolver.skip_insignificant(cursor);
        let outcome = resolver.production(index, cursor)?;
        Ok(outcome.map(|outcome| ExpressionMatch {
            production: name.to_string(),
            outcome,
        }))
    }
}

type MemoKey = (usize, usize);

enum Memo {
    /// Under evaluation; re-entry sees this seed.
    Growing(Option<Rc<GrammarOutcome>>),
    Done(Option<Rc<GrammarOutcome>>),
}

/// Resolves identifiers against a grammar for one input.
struct Resolver<'g, 'b> {
    grammar: &'g Grammar,
    input: &'g [char],
    budget: &'b mut Budget,
    memo: HashMap<MemoKey, Memo>,
    token_memo: HashMap<MemoKey, Option<Token>>,
    /// Productions under evaluation, innermost last.
    stack: Vec<MemoKey>,
    /// Productions re-entered while under evaluation.
    heads: HashSet<MemoKey>,
    /// Productions whose result depended on some head's seed.
    involved: HashSet<MemoKey>,
}

impl<'g, 'b> Resolver<'g, 'b> {
    fn new(grammar: &'g Grammar, input: &'g [char], budget: &'b mut Budget) -> Self {
        Self {
            grammar,
            input,
            budget,
            memo: HashMap::new(),
            token_memo: HashMap::new(),
            stack: Vec::new(),
            heads: HashSet::new(),
            involved: HashSet::new(),
        }
    }

    fn resolve(
        &mut self,
        name: &str,
        cursor: usize,
        expectant: &str,
    ) -> Result<Evaluation<Capture>, MatchError> {
        let grammar = self.grammar;
        if let Some(&index) = grammar.production_index.get(name) {
            let descriptor = expected(expectant, format!("{name} expression"), cursor);
            return Ok(match self.production(index, cursor)? {
                // An expression that matched nothing is a zero-width step.
                Some(outcome) if outcome.complete && outcome.units == 0 => Evaluation::Empty,
                Some(outcome) if outcome.complete => {
                    let span = Span::new(cursor, outcome.end().max(cursor));
                    let units = outcome.units;
                    let diagnostics = outcome.expected.clone();
                    Evaluation::Consumed(Step {
                        value: Capture::Expression(Rc::new(ExpressionMatch {
                            production: name.to_string(),
                            outcome,
                        })),
                        units,
                        span,
                        expected: diagnostics,
                    })
                }
                Some(outcome) if outcome.units > 0 => {
                    let mut diagnostics = vec![descriptor];
                    merge_expected(&mut diagnostics, outcome.expected.iter().cloned());
                    Evaluation::Partial(diagnostics)
                }
                // Comment failures are not reported.
                _ => Evaluation::Fail((name != COMMENT).then_some(descriptor)),
            });
        }

        if let Some(&index) = grammar.token_index.get(name)
            && let Some(token) = self.token(index, cursor)?
        {
            return Ok(Evaluation::Consumed(Step {
                units: 1,
                span: token.span,
                expected: Vec::new(),
                value: Capture::Token(token),
            }));
        }
        if !grammar.token_index.contains_key(name) {
            trace!("{name} is neither a production nor a token");
        }
        Ok(Evaluation::Fail(Some(expected(
            expectant,
            format!("{name} token"),
            cursor,
        ))))
    }

    fn token(&mut self, index: usize, cursor: usize) -> Result<Option<Token>, MatchError> {
        if let Some(cached) = self.token_memo.get(&(index, cursor)) {
            return Ok(cached.clone());
        }
        let grammar = self.grammar;
        let def = &grammar.tokens[index];
        let token = def
            .pattern
            .match_at(self.input, cursor, self.budget)?
            .filter(|found| !found.text.is_empty())
            .map(|found| Token {
                kind: def.name.clone(),
                lexeme: found.text,
                values: found.captures,
                span: found.span,
            });
        self.token_memo.insert((index, cursor), token.clone());
        Ok(token)
    }

    fn production(
        &mut self,
        index: usize,
        cursor: usize,
    ) -> Result<Option<Rc<GrammarOutcome>>, MatchError> {
        let key = (index, cursor);
        match self.memo.get(&key) {
            Some(Memo::Done(outcome)) => return Ok(outcome.clone()),
            Some(Memo::Growing(seed)) => {
                let seed = seed.clone();
                self.heads.insert(key);
                if let Some(at) = self.stack.iter().rposition(|k| *k == key) {
                    self.involved.extend(self.stack[at + 1..].iter().copied());
                }
                return Ok(seed);
            }
            None => {}
        }
        if self.stack.len() >= MAX_NESTING {
            return Err(MatchError::NestingTooDeep { limit: MAX_NESTING });
        }

        self.memo.insert(key, Memo::Growing(None));
        self.stack.push(key);
        let mut seed = self.alternatives(index, cursor)?;
        if self.heads.remove(&key) {
            loop {
                self.memo.insert(key, Memo::Growing(seed.clone()));
                let next = self.alternatives(index, cursor)?;
                if !grows(&next, &seed) {
                    break;
                }
                seed = next;
            }
            self.heads.remove(&key);
        }
        self.stack.pop();

        if self.involved.remove(&key) {
            self.memo.remove(&key);
        } else {
            self.memo.insert(key, Memo::Done(seed.clone()));
        }
        Ok(seed)
    }

    /// Best outcome across every alternative of a production.
    fn alternatives(
        &mut self,
        index: usize,
        cursor: usize,
    ) -> Result<Option<Rc<GrammarOutcome>>, MatchError> {
        let grammar = self.grammar;
        let production = &grammar.productions[index];
        let mut best: Option<GrammarOutcome> = None;
        for alternative in &production.alternatives {
            let graph = &alternative.graph;
            let Some(outcome) = simulate(
                graph,
                graph.entry(),
                self,
                cursor,
                &production.name,
                Selection::Any,
            )?
            else {
                continue;
            };
            let better = match &best {
                None => true,
                Some(incumbent) => improves(&outcome, incumbent),
            };
            if better {
                best = Some(outcome);
            }
        }
        Ok(best.map(Rc::new))
    }
}

impl Source for Resolver<'_, '_> {
    type Value = Capture;

    fn budget(&mut self) -> &mut Budget {
        &mut *self.budget
    }

    fn skip_insignificant(&self, cursor: usize) -> usize {
        let mut cursor = cursor;
        while self.input.get(cursor).is_some_and(|c| c.is_whitespace()) {
            cursor += 1;
        }
        cursor
    }

    fn evaluate(
        &mut self,
        _graph: &Graph,
        matcher: &Matcher,
        cursor: usize,
        expectant: &str,
    ) -> Result<Evaluation<Capture>, MatchError> {
        match matcher {
            Matcher::Empty => Ok(Evaluation::Empty),
            Matcher::Identifier(name) => self.resolve(name, cursor, expectant),
            Matcher::Any
            | Matcher::Literal(_)
            | Matcher::CharSet(_)
            | Matcher::Shorthand(_)
            | Matcher::EndOfInput
            | Matcher::Lookahead(_) => Ok(Evaluation::Fail(None)),
        }
    }
}

/// Whether `next` beats `incumbent` when both come from different graphs:
/// more units win, and at equal length a complete outcome beats an
/// incomplete one.
fn improves(next: &GrammarOutcome, incumbent: &GrammarOutcome) -> bool {
    next.units > incumbent.units
        || (next.units == incumbent.units && next.complete && !incumbent.complete)
}

fn grows(next: &Option<Rc<GrammarOutcome>>, seed: &Option<Rc<GrammarOutcome>>) -> bool {
    match (next, seed) {
        (Some(_), None) => true,
        (Some(next), Some(seed)) => improves(next, seed),
        (None, _) => false,
    }
}

fn expected(expectant: &str, message: String, index: usize) -> Expected {
    Expected {
        expectant: expectant.to_string(),
        message,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(tokens: &[(&str, &str)], productions: &[(&str, &str)]) -> Grammar {
        let mut grammar = Grammar::new();
        for (name, pattern) in tokens {
            grammar.define_token(name, pattern).unwrap();
        }
        for (name, body) in productions {
            grammar.define_production(name, body).unwrap();
        }
        grammar
    }

    fn foo_bar(productions: &[(&str, &str)]) -> Grammar {
        grammar(&[("FOO", "^foo"), ("BAR", "^bar")], productions)
    }

    fn run(grammar: &Grammar, name: &str, input: &str) -> ExpressionMatch {
        grammar
            .match_production(name, input, 0, &mut Budget::default())
            .unwrap()
            .unwrap()
    }

    fn token_kinds(outcome: &GrammarOutcome, capture: &str) -> Vec<String> {
        outcome.captures[capture]
            .iter()
            .map(|value| match value {
                Capture::Token(token) => token.kind.clone(),
                Capture::Expression(expr) => expr.production.clone(),
            })
            .collect()
    }

    // --- Sequences ---

    #[test]
    fn sequence_of_tokens() {
        let g = foo_bar(&[("Test", "FOO BAR")]);
        let m = run(&g, "Test", "foo bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
        assert_eq!(m.outcome.end(), 7);
    }

    #[test]
    fn whitespace_is_skipped_before_members() {
        let g = foo_bar(&[("Test", "FOO BAR")]);
        let m = run(&g, "Test", "  foo\n\t bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.span, Some(Span::new(2, 11)));
    }

    #[test]
    fn missing_token_is_reported() {
        let g = foo_bar(&[("Test", "FOO BAR")]);
        let m = run(&g, "Test", "foo foo");
        assert!(!m.outcome.complete);
        assert_eq!(m.outcome.units, 1);
        assert_eq!(
            m.outcome.expected,
            vec![Expected {
                expectant: "Test".into(),
                message: "BAR token".into(),
                index: 4,
            }]
        );
    }

    #[test]
    fn alternatives_report_together() {
        let g = foo_bar(&[("Test", "FOO (FOO | BAR)")]);
        let m = run(&g, "Test", "foo baz");
        let messages: Vec<_> = m.outcome.expected.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["FOO token", "BAR token"]);
    }

    #[test]
    fn nested_partial_explains_itself() {
        let g = foo_bar(&[("Pair", "FOO BAR"), ("Test", "Pair Pair")]);
        let m = run(&g, "Test", "foo bar foo");
        assert!(!m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
        let messages: Vec<_> = m.outcome.expected.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["BAR token"]);
        assert_eq!(m.outcome.expected[0].expectant, "Pair");
        assert_eq!(m.outcome.expected[0].index, 11);
    }

    // --- Non-greedy repetition ---

    #[test]
    fn lazy_star_between_tokens() {
        let g = foo_bar(&[("Fizz", "FOO"), ("Test", "FOO Fizz*? BAR")]);
        let m = run(&g, "Test", "foo foo bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 3);
    }

    #[test]
    fn lazy_star_yields_to_what_follows() {
        let g = foo_bar(&[("Fizz", "FOO"), ("Test", "Fizz*? FOO FOO")]);
        let m = run(&g, "Test", "foo foo foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
    }

    #[test]
    fn lazy_plus_takes_one() {
        let g = foo_bar(&[("Fizz", "FOO"), ("Test", "Fizz+? FOO FOO")]);
        let m = run(&g, "Test", "foo foo foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 3);
    }

    #[test]
    fn two_lazy_runs() {
        let g = foo_bar(&[("Test", "FOO+? BAR+?")]);
        let m = run(&g, "Test", "foo foo foo bar bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 4);
    }

    #[test]
    fn lazy_run_beside_greedy_run() {
        let g = foo_bar(&[("Test", "FOO+? BAR+")]);
        let m = run(&g, "Test", "foo foo foo bar bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 5);
    }

    #[test]
    fn lazy_plus_extends_when_forced() {
        let g = foo_bar(&[("Test", "FOO+? BAR")]);
        let m = run(&g, "Test", "foo foo foo bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 4);
    }

    // --- Captures ---

    #[test]
    fn captures_tokens_and_expressions() {
        let g = foo_bar(&[("Inner", "BAR"), ("Test", "(?<first>FOO) (?<rest>Inner)")]);
        let m = run(&g, "Test", "foo bar");
        assert_eq!(token_kinds(&m.outcome, "first"), vec!["FOO"]);
        assert_eq!(token_kinds(&m.outcome, "rest"), vec!["Inner"]);
        let Capture::Expression(inner) = &m.outcome.captures["rest"][0] else {
            panic!("expected an expression capture");
        };
        assert!(inner.outcome.complete);
        assert_eq!(inner.outcome.span, Some(Span::new(4, 7)));
    }

    #[test]
    fn repeated_capture_collects_every_value() {
        let g = foo_bar(&[("Test", "(?<items>FOO)+")]);
        let m = run(&g, "Test", "foo foo foo");
        assert_eq!(m.outcome.captures["items"].len(), 3);
    }

    #[test]
    fn promoted_capture() {
        let g = foo_bar(&[("Test", "FOO (?<@value>BAR)")]);
        let m = run(&g, "Test", "foo bar");
        assert_eq!(m.outcome.promoted.len(), 1);
        assert_eq!(token_kinds(&m.outcome, "value"), vec!["BAR"]);
    }

    #[test]
    fn token_values_survive() {
        let g = grammar(
            &[("NUM", r"^(?<digits>\d+)")],
            &[("Test", "(?<n>NUM)")],
        );
        let m = run(&g, "Test", "42");
        let Capture::Token(token) = &m.outcome.captures["n"][0] else {
            panic!("expected a token capture");
        };
        assert_eq!(token.lexeme, "42");
        assert_eq!(token.values["digits"], "42");
    }

    // --- Alternatives ---

    #[test]
    fn best_alternative_wins() {
        let mut g = foo_bar(&[("Test", "FOO")]);
        g.define_production("Test", "FOO BAR").unwrap();
        let m = run(&g, "Test", "foo bar");
        assert_eq!(m.outcome.units, 2);
        assert_eq!(g.production("Test").unwrap().alternatives.len(), 2);
    }

    #[test]
    fn earlier_alternative_wins_ties() {
        let mut g = foo_bar(&[("Test", "(?<a>FOO)")]);
        g.define_production("Test", "(?<b>FOO)").unwrap();
        let m = run(&g, "Test", "foo");
        assert!(m.outcome.captures.contains_key("a"));
        assert!(!m.outcome.captures.contains_key("b"));
    }

    #[test]
    fn longer_partial_alternative_beats_shorter_complete() {
        let mut g = foo_bar(&[("Test", "FOO FOO BAR")]);
        g.define_production("Test", "FOO").unwrap();
        let m = run(&g, "Test", "foo foo");
        assert!(!m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
        assert_eq!(m.outcome.expected[0].message, "BAR token");
    }

    #[test]
    fn complete_alternative_wins_at_equal_length() {
        let mut g = foo_bar(&[("Test", "FOO BAR")]);
        g.define_production("Test", "FOO").unwrap();
        let m = run(&g, "Test", "foo foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 1);
    }

    #[test]
    fn longer_partial_state_beats_earlier_complete_state() {
        let g = foo_bar(&[("Test", "FOO (BAR BAR)?")]);
        let m = run(&g, "Test", "foo bar");
        assert!(!m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
        assert_eq!(
            m.outcome.expected,
            vec![Expected {
                expectant: "Test".into(),
                message: "BAR token".into(),
                index: 7,
            }]
        );
    }

    // --- Left recursion ---

    #[test]
    fn direct_left_recursion() {
        let g = foo_bar(&[("Fizz", "Fizz FOO | FOO")]);
        let m = run(&g, "Fizz", "foo foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 2);
    }

    #[test]
    fn direct_left_recursion_grows_fully() {
        let g = foo_bar(&[("Fizz", "Fizz FOO | FOO")]);
        let m = run(&g, "Fizz", "foo foo foo foo");
        assert_eq!(m.outcome.units, 4);
    }

    #[test]
    fn indirect_left_recursion() {
        let g = grammar(
            &[("NUM", r"^\d+"), ("PLUS", r"^\+")],
            &[("Expr", "Sum | NUM"), ("Sum", "Expr PLUS NUM")],
        );
        let m = run(&g, "Expr", "1 + 2 + 3");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 5);
    }

    // --- Edge cases ---

    #[test]
    fn unknown_identifier_fails_as_token() {
        let g = foo_bar(&[("Test", "FOO Missing")]);
        let m = run(&g, "Test", "foo x");
        assert!(!m.outcome.complete);
        assert_eq!(m.outcome.expected[0].message, "Missing token");
        assert_eq!(g.undefined_references(), vec!["Missing".to_string()]);
    }

    #[test]
    fn zero_length_production_completes() {
        let g = foo_bar(&[("Test", "FOO*")]);
        let m = run(&g, "Test", "bar");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 0);
    }

    #[test]
    fn zero_width_production_under_lazy_star() {
        let g = foo_bar(&[("Opt", "BAR?"), ("Test", "Opt*? FOO")]);
        let mut budget = Budget::new(1_000);
        let m = g
            .match_production("Test", "foo", 0, &mut budget)
            .unwrap()
            .unwrap();
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 1);
    }

    #[test]
    fn zero_width_production_is_an_empty_step() {
        let g = foo_bar(&[("Opt", "BAR?"), ("Test", "(?<opt>Opt) FOO")]);
        let m = run(&g, "Test", "foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 1);
        assert!(!m.outcome.captures.contains_key("opt"));
    }

    #[test]
    fn zero_length_tokens_never_match() {
        let g = grammar(&[("MAYBE", "^x?")], &[("Test", "MAYBE")]);
        let m = run(&g, "Test", "y");
        assert!(!m.outcome.complete);
    }

    #[test]
    fn missing_production() {
        let g = Grammar::new();
        let result = g.match_production("Program", "", 0, &mut Budget::default());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn token_redefinition_replaces() {
        let mut g = foo_bar(&[("Test", "FOO")]);
        g.define_token("FOO", "^fu").unwrap();
        assert_eq!(g.tokens().count(), 2);
        assert_eq!(g.token("FOO").unwrap().pattern.as_str(), "^fu");
        assert!(run(&g, "Test", "fu").outcome.complete);
    }

    #[test]
    fn budget_is_shared_with_nested_matches() {
        let g = foo_bar(&[("Fizz", "FOO"), ("Test", "Fizz Fizz Fizz")]);
        let result = g.match_production("Test", "foo foo foo", 0, &mut Budget::new(5));
        assert_eq!(result.err(), Some(MatchError::StepBudgetExceeded { limit: 5 }));
    }

    /// Runs `f` on a thread whose stack fits [`MAX_NESTING`] levels.
    fn on_deep_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    fn right_recursive_list(items: usize) -> Result<Option<ExpressionMatch>, MatchError> {
        let g = foo_bar(&[("List", "FOO List | FOO")]);
        let input = vec!["foo"; items].join(" ");
        g.match_production("List", &input, 0, &mut Budget::default())
    }

    #[test]
    fn right_recursion_within_nesting_limit() {
        let (complete, units) = on_deep_stack(|| {
            let m = right_recursive_list(50).unwrap().unwrap();
            (m.outcome.complete, m.outcome.units)
        });
        assert!(complete);
        assert_eq!(units, 50);
    }

    #[test]
    fn right_recursion_past_nesting_limit_is_an_error() {
        let err = on_deep_stack(|| right_recursive_list(1_000).err());
        assert_eq!(err, Some(MatchError::NestingTooDeep { limit: MAX_NESTING }));
    }

    #[test]
    fn standalone_pattern_match() {
        let g = foo_bar(&[]);
        let pattern = GrammarPattern::new("FOO BAR?").unwrap();
        let outcome = pattern
            .match_source(&g, "foo", 0, "Inline", &mut Budget::default())
            .unwrap();
        assert!(outcome.complete);
        assert_eq!(pattern.as_str(), "FOO BAR?");
    }

    // --- Comments ---

    #[test]
    fn seeded_comment_tokens() {
        let g = Grammar::with_comments().unwrap();
        assert!(g.token("LINE_COMMENT").is_some());
        assert!(g.token("BLOCK_COMMENT").is_some());
        let m = run(&g, COMMENT, "/* note */");
        assert!(m.outcome.complete);
    }

    #[test]
    fn leading_comments_are_captured() {
        let mut g = Grammar::with_comments().unwrap();
        g.define_token("FOO", "^foo").unwrap();
        g.define_commented_production("Test", "FOO").unwrap();
        let m = run(&g, "Test", "// first\n/* second */ foo");
        assert!(m.outcome.complete);
        assert_eq!(m.outcome.units, 3);
        assert_eq!(token_kinds(&m.outcome, "comments"), vec![COMMENT, COMMENT]);
    }

    #[test]
    fn comments_are_optional() {
        let mut g = Grammar::with_comments().unwrap();
        g.define_token("FOO", "^foo").unwrap();
        g.define_commented_production("Test", "FOO").unwrap();
        let m = run(&g, "Test", "foo");
        assert!(m.outcome.complete);
        assert!(!m.outcome.captures.contains_key("comments"));
    }
}
