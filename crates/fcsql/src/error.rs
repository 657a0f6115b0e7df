//! Error types for query scanning and parsing.
//!
//! Scanning and parsing record positioned diagnostics; the parser facade
//! reports the earliest one wrapped in a [`QueryParserError`].

use std::{error, fmt};

use thiserror::Error;

/// Category of a query parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tokenization failed (unterminated quote, bad escape, bad flag letter).
    Lexical,
    /// The token stream does not match the grammar.
    Syntax,
    /// The query is well-formed but violates a semantic constraint.
    Semantic,
}

/// Scanner error with position information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LexError {
    /// Error message.
    pub message: String,
    /// Character offset in the input where the error occurred.
    pub offset: usize,
}

impl LexError {
    /// Creates a new scanner error.
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Parser error with optional position information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// Error category.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Character offset of the offending token, if known.
    pub offset: Option<usize>,
}

impl ParseError {
    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            offset,
        }
    }

    /// Creates a semantic error.
    pub fn semantic(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            kind: ErrorKind::Semantic,
            message: message.into(),
            offset,
        }
    }

    /// Creates a lexical error surfaced while reducing a grammar rule
    /// (escape expansion, flag letters).
    pub fn lexical(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            kind: ErrorKind::Lexical,
            message: message.into(),
            offset,
        }
    }
}

/// A single positioned diagnostic recorded during scanning or parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error category.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Character offset, if known.
    pub offset: Option<usize>,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    pub fn new(kind: ErrorKind, message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset,
        }
    }
}

impl From<LexError> for Diagnostic {
    fn from(err: LexError) -> Self {
        Self::new(ErrorKind::Lexical, err.message, Some(err.offset))
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Self::new(err.kind, err.message, err.offset)
    }
}

/// Collects positioned diagnostics in encounter order.
///
/// The scanner records recoverable problems here without halting token
/// consumption; the facade reports only the earliest diagnostic by offset.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Recorded diagnostics, in encounter order.
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Checks whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the earliest diagnostic by source offset.
    ///
    /// Diagnostics without an offset sort after positioned ones; ties keep
    /// encounter order.
    pub fn into_earliest(self) -> Option<Diagnostic> {
        self.entries
            .into_iter()
            .enumerate()
            .min_by_key(|(index, diagnostic)| (diagnostic.offset.unwrap_or(usize::MAX), *index))
            .map(|(_, diagnostic)| diagnostic)
    }
}

/// Error returned when a query cannot be parsed.
///
/// Carries the failure category, a human-readable message, the zero-based
/// character offset of the first offending token when available, and the
/// query itself for context rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParserError {
    /// Error category.
    kind: ErrorKind,
    /// Error message.
    message: String,
    /// Character offset, if known.
    offset: Option<usize>,
    /// The query being parsed.
    query: String,
}

impl QueryParserError {
    /// Creates a new error for the given query.
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        offset: Option<usize>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            offset,
            query: query.into(),
        }
    }

    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error message without context.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Zero-based character offset of the first offending token, if known.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// The query that failed to parse.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns a suggestion for common errors.
    pub fn suggestion(&self) -> Option<&'static str> {
        if self.message.contains("unterminated quote") {
            Some("Add a closing quote (\" or ') to complete the regular expression")
        } else if self.message.contains("']'") {
            Some("Add a closing bracket ] to match the opening one")
        } else if self.message.contains("')'") {
            Some("Add a closing parenthesis ) to match the opening one")
        } else if self.message.contains("mutually exclusive") {
            Some("Keep only one of the conflicting modifier letters")
        } else if self.message.contains("'within'") {
            Some("Valid scopes are: sentence, utterance, paragraph, turn, text, session")
        } else {
            None
        }
    }
}

impl fmt::Display for QueryParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ErrorKind::Lexical | ErrorKind::Syntax => "query syntax error",
            ErrorKind::Semantic => "query error",
        };

        writeln!(f, "{}: {}", prefix, self.message)?;

        // Show the query with a pointer to the offending position.
        if !self.query.is_empty() {
            writeln!(f, "  {}", self.query)?;
            if let Some(offset) = self.offset {
                let clamped = offset.min(self.query.chars().count());
                writeln!(f, "  {}^", " ".repeat(clamped))?;
            }
        }

        if let Some(suggestion) = self.suggestion() {
            write!(f, "hint: {}", suggestion)?;
        }

        Ok(())
    }
}

impl error::Error for QueryParserError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_error_display() {
        let err = QueryParserError::new(
            ErrorKind::Lexical,
            "unterminated quoted regex",
            Some(6),
            "[word=\"dog",
        );
        let display = err.to_string();
        assert!(display.contains("query syntax error"));
        assert!(display.contains("unterminated quote"));
        assert!(display.contains("[word=\"dog"));
        assert!(display.contains("      ^"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn semantic_error_prefix() {
        let err = QueryParserError::new(
            ErrorKind::Semantic,
            "invalid combination of regex modifier flags: 'i' or 'c' and 'I' or 'C' \
             are mutually exclusive",
            Some(8),
            "[word=\"a\"/iI]",
        );
        let display = err.to_string();
        assert!(display.starts_with("query error:"));
        assert!(display.contains("hint: Keep only one"));
    }

    #[test]
    fn offset_clamped_to_query_length() {
        let err = QueryParserError::new(ErrorKind::Syntax, "unexpected end of query", Some(99), "[a=");
        // The caret must not run past the query text.
        assert!(err.to_string().contains("   ^"));
    }

    #[test]
    fn earliest_diagnostic_wins() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(Diagnostic::new(ErrorKind::Syntax, "late", Some(9)));
        diagnostics.report(Diagnostic::new(ErrorKind::Lexical, "early", Some(2)));
        diagnostics.report(Diagnostic::new(ErrorKind::Syntax, "unpositioned", None));
        let earliest = diagnostics.into_earliest().unwrap();
        assert_eq!(earliest.message, "early");
    }

    #[test]
    fn encounter_order_breaks_ties() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(Diagnostic::new(ErrorKind::Syntax, "first", Some(4)));
        diagnostics.report(Diagnostic::new(ErrorKind::Syntax, "second", Some(4)));
        assert_eq!(diagnostics.into_earliest().unwrap().message, "first");
    }

    #[test]
    fn empty_collector() {
        assert!(Diagnostics::new().into_earliest().is_none());
    }

    #[test]
    fn parse_error_conversion_keeps_kind() {
        let err = ParseError::semantic("bad repetition range: min > max (3 > 2)", Some(7));
        let diagnostic = Diagnostic::from(err);
        assert_eq!(diagnostic.kind, ErrorKind::Semantic);
        assert_eq!(diagnostic.offset, Some(7));
    }
}
