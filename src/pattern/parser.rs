//! Recursive descent parser for both pattern dialects.
//!
//! The lexical dialect works on characters: escapes are resolved up front
//! into [`Sym`]s so that the grammar proper never sees a backslash. The
//! grammar dialect works on identifiers and ignores whitespace between
//! members.

use std::iter::Peekable;
use std::str::Chars;

use phf::{Map, phf_map};

use super::ast::*;

/// Errors that can occur while parsing a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternError {
    EmptyPattern,
    UnbalancedParentheses,
    UnexpectedCloseParen,
    InvalidCaptureName,
    InvalidGroupModifier(char),
    InvalidCharacterSet,
    IllegalEscape,
    InvalidUnicodeEscape,
    InvalidRepetition,
    UnexpectedChar(char),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPattern => write!(f, "Cannot parse empty regular expression"),
            Self::UnbalancedParentheses => write!(f, "Unbalanced parentheses"),
            Self::UnexpectedCloseParen => write!(f, "Unexpected token \")\""),
            Self::InvalidCaptureName => write!(f, "Invalid capture group name"),
            Self::InvalidGroupModifier(c) => write!(f, "Invalid group modifier \"{c}\""),
            Self::InvalidCharacterSet => write!(f, "Invalid character set"),
            Self::IllegalEscape => write!(f, "Illegal escape sequence"),
            Self::InvalidUnicodeEscape => write!(f, "Invalid unicode escape sequence"),
            Self::InvalidRepetition => write!(f, "Invalid repetition sequence"),
            Self::UnexpectedChar(c) => write!(f, "Unexpected character \"{c}\""),
        }
    }
}

impl std::error::Error for PatternError {}

/// Largest bound accepted in `{m}`, `{m,}` and `{m,n}`.
pub const MAX_REPETITION: usize = 100;

const SHORTHAND_ESCAPES: Map<char, Shorthand> = phf_map! {
    'd' => Shorthand::Digit,
    'D' => Shorthand::NotDigit,
    's' => Shorthand::Whitespace,
    'S' => Shorthand::NotWhitespace,
    'w' => Shorthand::Word,
    'W' => Shorthand::NotWord,
};

const CONTROL_ESCAPES: Map<char, char> = phf_map! {
    't' => '\t',
    'n' => '\n',
    'r' => '\r',
};

/// Parse a character-level pattern.
pub fn parse_lexical(pattern: &str) -> Result<PatternDef, PatternError> {
    let mut syms = resolve_escapes(pattern)?;
    let anchored = syms.first() == Some(&Sym::Raw('^'));
    if anchored {
        syms.remove(0);
    }
    let items = Parser::new(syms, Dialect::Lexical).parse_root()?;
    Ok(PatternDef { anchored, items })
}

/// Parse a production body.
pub fn parse_grammar(pattern: &str) -> Result<Vec<Item>, PatternError> {
    let syms = pattern.chars().map(Sym::Raw).collect();
    Parser::new(syms, Dialect::Grammar).parse_root()
}

/// One logical input symbol after escape resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sym {
    /// Unescaped character; may be a metacharacter.
    Raw(char),
    /// Escaped character; always literal.
    Escaped(char),
    Class(Shorthand),
}

fn resolve_escapes(pattern: &str) -> Result<Vec<Sym>, PatternError> {
    let mut chars = pattern.chars().peekable();
    let mut syms = Vec::new();
    while let Some(c) = chars.next() {
        if c != '\\' {
            syms.push(Sym::Raw(c));
            continue;
        }
        let escaped = chars.next().ok_or(PatternError::IllegalEscape)?;
        let sym = if let Some(shorthand) = SHORTHAND_ESCAPES.get(&escaped) {
            Sym::Class(*shorthand)
        } else if let Some(control) = CONTROL_ESCAPES.get(&escaped) {
            Sym::Escaped(*control)
        } else if escaped == 'u' {
            Sym::Escaped(unicode_escape(&mut chars)?)
        } else {
            Sym::Escaped(escaped)
        };
        syms.push(sym);
    }
    Ok(syms)
}

/// `\uXXXX` or `\u{X...}` (the `\u` has already been consumed).
fn unicode_escape(chars: &mut Peekable<Chars<'_>>) -> Result<char, PatternError> {
    let digits = if chars.peek() == Some(&'{') {
        chars.next();
        let mut digits = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(PatternError::InvalidUnicodeEscape),
            }
        }
        digits
    } else {
        (0..4)
            .map(|_| {
                chars
                    .next()
                    .filter(char::is_ascii_hexdigit)
                    .ok_or(PatternError::InvalidUnicodeEscape)
            })
            .collect::<Result<String, _>>()?
    };
    if digits.is_empty() || digits.len() > 6 {
        return Err(PatternError::InvalidUnicodeEscape);
    }
    u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or(PatternError::InvalidUnicodeEscape)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Lexical,
    Grammar,
}

struct Parser {
    syms: Vec<Sym>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    fn new(syms: Vec<Sym>, dialect: Dialect) -> Self {
        Self {
            syms,
            pos: 0,
            dialect,
        }
    }

    fn parse_root(&mut self) -> Result<Vec<Item>, PatternError> {
        let items = self.parse_sequence(&[])?;
        if self.peek().is_some() {
            return Err(PatternError::UnexpectedCloseParen);
        }
        if items.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Ok(items)
    }

    /// Parse members up to end of input or an unconsumed `)`.
    ///
    /// A `|` folds everything parsed so far into the left side of an
    /// alternation whose right side is the rest of the sequence.
    fn parse_sequence(&mut self, captures: &[CaptureName]) -> Result<Vec<Item>, PatternError> {
        let mut items = Vec::new();
        loop {
            self.skip_space();
            match self.peek() {
                None | Some(Sym::Raw(')')) => return Ok(items),
                Some(Sym::Raw('|')) => {
                    self.pos += 1;
                    let right = self.parse_sequence(captures)?;
                    if right.is_empty() {
                        return Err(PatternError::EmptyPattern);
                    }
                    return Ok(vec![Item::once(Element::Alternation {
                        left: items,
                        right,
                    })]);
                }
                Some(_) => {
                    let element = self.parse_element(captures)?;
                    self.parse_quantifier(element, &mut items)?;
                }
            }
        }
    }

    fn parse_element(&mut self, captures: &[CaptureName]) -> Result<Element, PatternError> {
        let sym = self.next().ok_or(PatternError::EmptyPattern)?;
        match (self.dialect, sym) {
            (_, Sym::Raw('(')) => self.parse_group(captures),
            (Dialect::Grammar, Sym::Raw(c)) if is_identifier_start(c) => {
                Ok(Element::Identifier(self.parse_identifier(c)))
            }
            (Dialect::Grammar, Sym::Raw(c) | Sym::Escaped(c)) => {
                Err(PatternError::UnexpectedChar(c))
            }
            (Dialect::Grammar, Sym::Class(_)) => Err(PatternError::IllegalEscape),
            (Dialect::Lexical, Sym::Raw('.')) => Ok(Element::Any),
            (Dialect::Lexical, Sym::Raw('$')) => Ok(Element::EndOfInput),
            (Dialect::Lexical, Sym::Raw('[')) => Ok(Element::CharSet(self.parse_charset()?)),
            (Dialect::Lexical, Sym::Raw(c) | Sym::Escaped(c)) => Ok(Element::Literal(c)),
            (Dialect::Lexical, Sym::Class(s)) => Ok(Element::Shorthand(s)),
        }
    }

    /// Parse a group body (the opening `(` has already been consumed).
    fn parse_group(&mut self, captures: &[CaptureName]) -> Result<Element, PatternError> {
        let mut kind = GroupKind::Plain;
        let mut inner = captures.to_vec();
        if self.eat(Sym::Raw('?')) {
            match (self.dialect, self.next()) {
                (_, Some(Sym::Raw('<'))) => {
                    let name = self.parse_capture_name()?;
                    if !inner.contains(&name) {
                        inner.push(name);
                    }
                }
                (Dialect::Lexical, Some(Sym::Raw('='))) => kind = GroupKind::Lookahead,
                (Dialect::Lexical, Some(Sym::Raw(c) | Sym::Escaped(c))) => {
                    return Err(PatternError::InvalidGroupModifier(c));
                }
                (_, None) => return Err(PatternError::UnbalancedParentheses),
                _ => return Err(PatternError::InvalidCaptureName),
            }
        }

        let members = self.parse_sequence(&inner)?;
        if !self.eat(Sym::Raw(')')) {
            return Err(PatternError::UnbalancedParentheses);
        }
        if members.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Ok(Element::Group(Group {
            members,
            captures: inner,
            kind,
        }))
    }

    /// Parse `name>` or, in the grammar dialect, `@name>`.
    fn parse_capture_name(&mut self) -> Result<CaptureName, PatternError> {
        let promoted = self.dialect == Dialect::Grammar && self.eat(Sym::Raw('@'));
        let mut name = String::new();
        loop {
            match self.next() {
                Some(Sym::Raw('>')) => break,
                Some(Sym::Raw(c)) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
                None => return Err(PatternError::UnbalancedParentheses),
                Some(_) => return Err(PatternError::InvalidCaptureName),
            }
        }
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(PatternError::InvalidCaptureName);
        }
        Ok(CaptureName { name, promoted })
    }

    fn parse_identifier(&mut self, first: char) -> String {
        let mut name = String::from(first);
        while let Some(Sym::Raw(c)) = self.peek()
            && is_identifier_char(c)
        {
            name.push(c);
            self.pos += 1;
        }
        name
    }

    /// Parse a `[...]` class (the opening `[` has already been consumed).
    fn parse_charset(&mut self) -> Result<CharSet, PatternError> {
        let negated = self.eat(Sym::Raw('^'));
        let mut members = Vec::new();
        loop {
            let member = match self.next().ok_or(PatternError::InvalidCharacterSet)? {
                Sym::Raw(']') => return Ok(CharSet { negated, members }),
                Sym::Class(s) => CharClass::Shorthand(s),
                Sym::Raw(lo) | Sym::Escaped(lo) => {
                    let is_range = self.peek() == Some(Sym::Raw('-'))
                        && !matches!(self.peek_at(1), None | Some(Sym::Raw(']')));
                    if is_range {
                        self.pos += 1;
                        let hi = match self.next() {
                            Some(Sym::Raw(c) | Sym::Escaped(c)) => c,
                            _ => return Err(PatternError::InvalidCharacterSet),
                        };
                        if hi < lo {
                            return Err(PatternError::InvalidCharacterSet);
                        }
                        CharClass::Range(lo, hi)
                    } else {
                        CharClass::Single(lo)
                    }
                }
            };
            members.push(member);
        }
    }

    /// Attach an optional trailing quantifier to `element` and append the
    /// result to `items`.
    fn parse_quantifier(&mut self, element: Element, items: &mut Vec<Item>) -> Result<(), PatternError> {
        let quantifier = match self.peek() {
            Some(Sym::Raw('*')) => Quantifier::ZeroOrMore,
            Some(Sym::Raw('+')) => Quantifier::OneOrMore,
            Some(Sym::Raw('?')) => Quantifier::ZeroOrOne,
            Some(Sym::Raw('{')) if self.dialect == Dialect::Lexical => {
                self.pos += 1;
                return self.parse_repetition(element, items);
            }
            _ => {
                items.push(Item::once(element));
                return Ok(());
            }
        };
        self.pos += 1;
        let greedy = !self.eat(Sym::Raw('?'));
        items.push(Item {
            quantifier,
            greedy,
            element,
        });
        Ok(())
    }

    /// Desugar `{m}`, `{m,}` and `{m,n}` (the `{` has already been consumed).
    ///
    /// Bounds above [`MAX_REPETITION`] are rejected, since every optional
    /// copy nests one group deeper.
    fn parse_repetition(&mut self, element: Element, items: &mut Vec<Item>) -> Result<(), PatternError> {
        let min = self.parse_number()?.ok_or(PatternError::InvalidRepetition)?;
        let max = if self.eat(Sym::Raw(',')) {
            self.parse_number()?
        } else {
            Some(min)
        };
        if !self.eat(Sym::Raw('}')) {
            return Err(PatternError::InvalidRepetition);
        }
        if let Some(max) = max
            && max < min
        {
            return Err(PatternError::InvalidRepetition);
        }
        if min.max(max.unwrap_or(0)) > MAX_REPETITION {
            return Err(PatternError::InvalidRepetition);
        }
        let greedy = !self.eat(Sym::Raw('?'));

        items.extend((0..min).map(|_| Item::once(element.clone())));
        match max {
            None => items.push(Item {
                quantifier: Quantifier::ZeroOrMore,
                greedy,
                element,
            }),
            Some(max) => items.extend(optional_tail(&element, max - min, greedy)),
        }
        Ok(())
    }

    fn parse_number(&mut self) -> Result<Option<usize>, PatternError> {
        let mut digits = String::new();
        while let Some(Sym::Raw(c)) = self.peek()
            && c.is_ascii_digit()
        {
            digits.push(c);
            self.pos += 1;
        }
        if digits.is_empty() {
            return Ok(None);
        }
        digits
            .parse::<usize>()
            .map(Some)
            .map_err(|_| PatternError::InvalidRepetition)
    }

    fn skip_space(&mut self) {
        if self.dialect == Dialect::Grammar {
            while matches!(self.peek(), Some(Sym::Raw(c)) if c.is_whitespace()) {
                self.pos += 1;
            }
        }
    }

    fn peek(&self) -> Option<Sym> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<Sym> {
        self.syms.get(self.pos + offset).copied()
    }

    fn next(&mut self) -> Option<Sym> {
        let sym = self.peek()?;
        self.pos += 1;
        Some(sym)
    }

    fn eat(&mut self, sym: Sym) -> bool {
        if self.peek() == Some(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

/// `count` nested optional copies: `(x(x(x)?)?)?`.
fn optional_tail(element: &Element, count: usize, greedy: bool) -> Option<Item> {
    let mut tail: Option<Item> = None;
    for _ in 0..count {
        let mut members = vec![Item::once(element.clone())];
        members.extend(tail.take());
        tail = Some(Item {
            quantifier: Quantifier::ZeroOrOne,
            greedy,
            element: Element::Group(Group {
                members,
                captures: Vec::new(),
                kind: GroupKind::Plain,
            }),
        });
    }
    tail
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
