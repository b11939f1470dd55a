use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use crate::location::Span;

/// A recognized lexical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Name of the token definition that matched.
    pub kind: String,
    pub lexeme: String,
    /// Named captures of the token's pattern.
    pub values: BTreeMap<String, String>,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.values.is_empty() {
            let values = self
                .values
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .join(", ");
            write!(f, "[{values}]")?;
        }
        write!(
            f,
            " {} at [index {}-{}]",
            self.lexeme, self.span.start, self.span.end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_values() {
        let token = Token {
            kind: "NAME".into(),
            lexeme: "hello".into(),
            values: BTreeMap::new(),
            span: Span::new(3, 8),
        };
        assert_eq!(token.to_string(), "NAME hello at [index 3-8]");
    }

    #[test]
    fn display_with_values() {
        let token = Token {
            kind: "STRING".into(),
            lexeme: "\"hi\"".into(),
            values: BTreeMap::from([("value".to_string(), "hi".to_string())]),
            span: Span::new(0, 4),
        };
        assert_eq!(token.to_string(), "STRING[value=hi] \"hi\" at [index 0-4]");
    }
}
