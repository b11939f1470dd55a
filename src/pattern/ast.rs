//! AST types shared by the lexical and grammar pattern dialects.

/// A parsed lexical pattern.
///
/// `anchored` records a leading `^`: the match must begin exactly at the
/// cursor it is attempted from.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDef {
    pub anchored: bool,
    pub items: Vec<Item>,
}

/// One quantified element.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub quantifier: Quantifier,
    /// `false` when the quantifier was followed by `?`.
    pub greedy: bool,
    pub element: Element,
}

impl Item {
    pub fn once(element: Element) -> Self {
        Self {
            quantifier: Quantifier::Once,
            greedy: true,
            element,
        }
    }

    pub fn is_lazy(&self) -> bool {
        !self.greedy && self.quantifier != Quantifier::Once
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Once,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Literal(char),
    /// `.`
    Any,
    /// `$`
    EndOfInput,
    CharSet(CharSet),
    Shorthand(Shorthand),
    Group(Group),
    /// `left|right`. Right-associative: `right` holds the whole remainder.
    Alternation {
        left: Vec<Item>,
        right: Vec<Item>,
    },
    /// A token or production name (grammar dialect only).
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub members: Vec<Item>,
    /// Names of this group and every enclosing capture group.
    pub captures: Vec<CaptureName>,
    pub kind: GroupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Plain,
    Lookahead,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureName {
    pub name: String,
    /// `(?<@name>...)`: the captured value stands in for the whole production.
    pub promoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharSet {
    pub negated: bool,
    pub members: Vec<CharClass>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CharClass {
    Single(char),
    Range(char, char),
    Shorthand(Shorthand),
}

/// `\d \D \s \S \w \W`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shorthand {
    Digit,
    NotDigit,
    Whitespace,
    NotWhitespace,
    Word,
    NotWord,
}
