//! Documents that define their own grammar.
//!
//! A document mixes directive lines with content:
//!
//! ```text
//! #token NAME [a-z]+
//! #expr Program = (?<names>NAME)*
//! alpha beta
//! ```
//!
//! `#token` registers a lexical pattern, anchored at the cursor. `#expr`
//! appends an alternative to a production. Directive lines are blanked to
//! spaces so positions in the remaining content are unchanged, and the
//! content is then parsed from the root production.

use std::fmt;

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::Serialize;

use crate::grammar::Grammar;
use crate::lexical::{LexicalMatch, LexicalPattern};
use crate::location::{LineIndex, Position};
use crate::pattern::{Budget, DEFAULT_MAX_STEPS};
use crate::result::ParseResult;
use crate::token::Token;

const TOKEN_DIRECTIVE: &str = r"^[\t ]*#token[\t ]+(?<name>[A-Z_]+)[\t ]+(?<body>[^\r\n]+)";
const EXPR_DIRECTIVE: &str =
    r"^[\t ]*#expr[\t ]+(?<name>[a-zA-Z_]+)[\t ]*=[\t ]*(?<body>[^\r\n]+)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Production the content is parsed from.
    pub root: String,
    /// Simulation steps allowed for one parse or scan.
    pub max_steps: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            root: "Program".to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// A character no token could start at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanError {
    pub message: String,
    pub position: Position,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

#[derive(Debug, Clone)]
pub struct Parser {
    grammar: Grammar,
    content: String,
    options: ParserOptions,
}

impl Parser {
    /// Read every directive in `source`.
    ///
    /// Fails on the first directive whose pattern does not compile.
    pub fn new(source: &str) -> Result<Self> {
        Self::with_options(source, ParserOptions::default())
    }

    pub fn with_options(source: &str, options: ParserOptions) -> Result<Self> {
        let token_directive = LexicalPattern::new(TOKEN_DIRECTIVE)?;
        let expr_directive = LexicalPattern::new(EXPR_DIRECTIVE)?;
        let mut grammar = Grammar::with_comments()?;
        let mut content = String::with_capacity(source.len());

        for (number, line) in source.split_inclusive('\n').enumerate() {
            let number = number + 1;
            let chars: Vec<char> = line.chars().collect();
            if let Some(found) = directive(&token_directive, &chars)? {
                let (name, body) = name_and_body(&found);
                grammar
                    .define_token(name, &format!("^{body}"))
                    .with_context(|| format!("invalid #token {name} on line {number}"))?;
                debug!("line {number}: token {name} = {body}");
            } else if let Some(found) = directive(&expr_directive, &chars)? {
                let (name, body) = name_and_body(&found);
                grammar
                    .define_commented_production(name, body)
                    .with_context(|| format!("invalid #expr {name} on line {number}"))?;
                debug!("line {number}: expression {name} = {body}");
            } else {
                content.push_str(line);
                continue;
            }
            content.extend(
                line.chars()
                    .map(|c| if c == '\r' || c == '\n' { c } else { ' ' }),
            );
        }

        Ok(Self {
            grammar,
            content,
            options,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The source with directive lines blanked.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse the content from the root production.
    ///
    /// An incomplete match is still a result; it is an error only when the
    /// root production is missing or nothing at all could be matched.
    pub fn parse(&self) -> Result<ParseResult> {
        let root = self.options.root.as_str();
        for name in self.grammar.undefined_references() {
            warn!("{name} is neither a token nor an expression");
        }

        let chars: Vec<char> = self.content.chars().collect();
        let mut budget = Budget::new(self.options.max_steps);
        debug!("parsing {} characters from {root}", chars.len());
        let Some(found) = self
            .grammar
            .match_production_chars(root, &chars, 0, &mut budget)?
        else {
            bail!("Could not parse input: no \"{root}\" expression defined");
        };
        debug!(
            "parse finished after {} steps, complete: {}",
            budget.used(),
            found.outcome.complete
        );

        let outcome = &found.outcome;
        if !outcome.complete && outcome.units == 0 && outcome.expected.is_empty() {
            bail!("Could not parse input: no matching expression");
        }
        Ok(ParseResult::from_root(&found, &LineIndex::new(&self.content)))
    }

    /// Split the content into tokens, longest match first.
    ///
    /// Ties go to the token declared first. Unrecognized characters are
    /// reported and skipped.
    pub fn scan(&self) -> Result<(Vec<Token>, Vec<ScanError>)> {
        let chars: Vec<char> = self.content.chars().collect();
        let lines = LineIndex::new(&self.content);
        let mut budget = Budget::new(self.options.max_steps);
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        let mut cursor = 0;
        while cursor < chars.len() {
            if chars[cursor].is_whitespace() {
                cursor += 1;
                continue;
            }
            let mut best: Option<Token> = None;
            for def in self.grammar.tokens() {
                if let Some(found) = def.pattern.match_at(&chars, cursor, &mut budget)?
                    && !found.text.is_empty()
                    && best.as_ref().is_none_or(|b| found.span.len() > b.span.len())
                {
                    best = Some(Token {
                        kind: def.name.clone(),
                        lexeme: found.text,
                        values: found.captures,
                        span: found.span,
                    });
                }
            }
            match best {
                Some(token) => {
                    cursor = token.span.end;
                    tokens.push(token);
                }
                None => {
                    errors.push(ScanError {
                        message: format!("Unexpected character \"{}\"", chars[cursor]),
                        position: lines.position(cursor),
                    });
                    cursor += 1;
                }
            }
        }
        debug!(
            "scanned {} tokens, {} errors in {} steps",
            tokens.len(),
            errors.len(),
            budget.used()
        );
        Ok((tokens, errors))
    }
}

fn directive(pattern: &LexicalPattern, line: &[char]) -> Result<Option<LexicalMatch>> {
    Ok(pattern.match_at(line, 0, &mut Budget::default())?)
}

fn name_and_body(found: &LexicalMatch) -> (&str, &str) {
    let get = |key: &str| found.captures.get(key).map_or("", |value| value.as_str());
    (get("name"), get("body").trim())
}
