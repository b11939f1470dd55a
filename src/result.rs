//! The parse tree handed to callers.
//!
//! Everything here is plain data with resolved line/column positions, so
//! consumers never see graphs, outcomes or character indices alone.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::grammar::{Capture, ExpressionMatch};
use crate::location::{LineIndex, Location, Position, Span};
use crate::pattern::{Expected, merge_expected};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub is_complete_match: bool,
    /// What would have let the match get further, at the furthest position.
    pub expected: Vec<Expectation>,
    /// Tokens consumed, counting each nested production's tokens.
    pub matched_token_count: usize,
    #[serde(rename = "type")]
    pub production: String,
    pub location: Location,
    #[serde(flatten)]
    pub captures: BTreeMap<String, Vec<CaptureValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CaptureValue {
    Token(TokenResult),
    Result(Box<ParseResult>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub lexeme: String,
    pub location: Location,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expectation {
    pub expectant: String,
    pub message: String,
    #[serde(flatten)]
    pub position: Position,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected {} at {}",
            self.expectant, self.message, self.position
        )
    }
}

impl ParseResult {
    /// Build the tree for a root match.
    ///
    /// A root whose body promoted a nested expression is replaced by that
    /// expression's result, recursively.
    ///
    /// A root that promoted a token is *not* replaced: the result is always
    /// a [`ParseResult`], so the root's own result is returned and the token
    /// stays reachable under its capture name. Promoted tokens only replace
    /// nested expressions (see [`CaptureValue`]).
    pub fn from_root(root: &ExpressionMatch, lines: &LineIndex) -> Self {
        match root.outcome.promoted.first() {
            Some(Capture::Expression(inner)) => Self::from_root(inner, lines),
            _ => Self::build(root, lines),
        }
    }

    fn build(expr: &ExpressionMatch, lines: &LineIndex) -> Self {
        let outcome = &expr.outcome;
        let mut expected: Vec<Expected> = Vec::new();
        merge_expected(&mut expected, outcome.expected.iter().cloned());
        let span = outcome.span.unwrap_or(Span::empty(outcome.start));

        Self {
            is_complete_match: outcome.complete,
            expected: expected
                .iter()
                .map(|entry| Expectation::locate(entry, lines))
                .collect(),
            matched_token_count: outcome.units,
            production: expr.production.clone(),
            location: lines.locate(span),
            captures: outcome
                .captures
                .iter()
                .map(|(name, values)| {
                    let values = values
                        .iter()
                        .map(|value| CaptureValue::build(value, lines))
                        .collect();
                    (name.clone(), values)
                })
                .collect(),
        }
    }
}

impl CaptureValue {
    fn build(capture: &Capture, lines: &LineIndex) -> Self {
        match capture {
            Capture::Token(token) => Self::Token(TokenResult::locate(token, lines)),
            Capture::Expression(expr) => match expr.outcome.promoted.first() {
                Some(promoted) => Self::build(promoted, lines),
                None => Self::Result(Box::new(ParseResult::build(expr, lines))),
            },
        }
    }

    pub fn as_token(&self) -> Option<&TokenResult> {
        match self {
            Self::Token(token) => Some(token),
            Self::Result(_) => None,
        }
    }

    pub fn as_result(&self) -> Option<&ParseResult> {
        match self {
            Self::Result(result) => Some(result),
            Self::Token(_) => None,
        }
    }
}

impl TokenResult {
    pub fn locate(token: &Token, lines: &LineIndex) -> Self {
        Self {
            kind: token.kind.clone(),
            lexeme: token.lexeme.clone(),
            location: lines.locate(token.span),
            values: token.values.clone(),
        }
    }
}

impl Expectation {
    fn locate(entry: &Expected, lines: &LineIndex) -> Self {
        Self {
            expectant: entry.expectant.clone(),
            message: entry.message.clone(),
            position: lines.position(entry.index),
        }
    }
}
