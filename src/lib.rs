//! Self-extensible text matching: a lexical pattern engine, a grammar
//! engine over tokens and productions, and a parser for documents that
//! declare their own grammar.
//!
//! # Example
//!
//! ```rust
//! use sagebrush::Parser;
//!
//! let source = "\
//! #token NUMBER \\d+
//! #token PLUS \\+
//! #expr Program = (?<left>NUMBER) PLUS (?<right>NUMBER)
//! 1 + 2";
//!
//! let result = Parser::new(source)?.parse()?;
//! assert!(result.is_complete_match);
//! assert_eq!(result.matched_token_count, 3);
//! assert_eq!(result.captures["right"][0].as_token().unwrap().lexeme, "2");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Lexical patterns can also be used on their own:
//!
//! ```rust
//! use sagebrush::LexicalPattern;
//!
//! let pattern = LexicalPattern::new(r"(?<key>\w+)=(?<value>\d+)").unwrap();
//! let found = pattern.find("set x=42", 0).unwrap().unwrap();
//! assert_eq!(found.text, "x=42");
//! assert_eq!(found.captures["value"], "42");
//! ```

pub mod grammar;
pub mod lexical;
pub mod location;
pub mod parser;
pub mod pattern;
pub mod result;
pub mod token;

pub use grammar::{
    Capture, ExpressionMatch, Grammar, GrammarPattern, MAX_NESTING, Production, TokenDef,
};
pub use lexical::{LexicalMatch, LexicalPattern};
pub use location::{LineIndex, Location, Position, Span};
pub use parser::{Parser, ParserOptions, ScanError};
pub use pattern::{Budget, DEFAULT_MAX_STEPS, Expected, MatchError, PatternError};
pub use result::{CaptureValue, Expectation, ParseResult, TokenResult};
pub use token::Token;
