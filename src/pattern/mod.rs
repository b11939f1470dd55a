//! Pattern syntax, compilation and simulation.
//!
//! Both dialects share one parser, one graph compiler and one simulator.
//! Lexical patterns match characters; grammar patterns match token and
//! production names, with whitespace between members ignored.
//!
//! # Pattern syntax
//!
//! | Syntax        | Meaning                                        |
//! |---------------|------------------------------------------------|
//! | `a`           | Literal character (lexical)                     |
//! | `NAME`        | Token or production reference (grammar)         |
//! | `.`           | Any character                                   |
//! | `\d \w \s`    | Digit, word, whitespace (`\D \W \S` negate)     |
//! | `\t \n \r`    | Control characters                              |
//! | `\uXXXX`      | Unicode escape, also `\u{X...}`                 |
//! | `[a-z\d]`     | Character set (`[^...]` negates)                |
//! | `(...)`       | Group                                           |
//! | `(?<name>...)`| Named capture (`(?<@name>...)` promotes)        |
//! | `(?=...)`     | Lookahead                                       |
//! | `X\|Y`        | Alternation                                     |
//! | `X? X* X+`    | Quantifiers, followed by `?` for non-greedy     |
//! | `X{n} X{n,} X{n,m}` | Bounded repetition, bounds up to 100     |
//! | `^`           | Anchor at the cursor (leading, lexical)         |
//! | `$`           | End of input (lexical)                          |

pub mod ast;
pub mod char_class;
pub mod graph;
pub mod parser;
pub mod simulator;

pub use graph::{Connection, Graph, Matcher, NodeId, StateNode};
pub use parser::{MAX_REPETITION, PatternError, parse_grammar, parse_lexical};
pub use simulator::{
    Budget, DEFAULT_MAX_STEPS, Expected, MatchError, Outcome, Standing, counters_not_worse,
    merge_expected,
};
