//! Character class membership tests.

use super::ast::{CharClass, CharSet, Shorthand};

/// Test whether `ch` is a member of `cs`.
pub fn charset_matches(cs: &CharSet, ch: char) -> bool {
    let base = cs.members.iter().any(|c| char_in_class(c, ch));
    if cs.negated { !base } else { base }
}

/// Test whether `ch` falls within a single `CharClass`.
pub fn char_in_class(class: &CharClass, ch: char) -> bool {
    match class {
        CharClass::Single(c) => *c == ch,
        CharClass::Range(lo, hi) => *lo <= ch && ch <= *hi,
        CharClass::Shorthand(s) => shorthand_matches(*s, ch),
    }
}

pub fn shorthand_matches(shorthand: Shorthand, ch: char) -> bool {
    match shorthand {
        Shorthand::Digit => ch.is_ascii_digit(),
        Shorthand::NotDigit => !ch.is_ascii_digit(),
        Shorthand::Whitespace => is_space(ch),
        Shorthand::NotWhitespace => !is_space(ch),
        Shorthand::Word => is_word(ch),
        Shorthand::NotWord => !is_word(ch),
    }
}

fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_word(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
