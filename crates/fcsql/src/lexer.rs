//! Query scanner (tokenizer).
//!
//! Converts a raw FCS-QL string into a stream of offset-tagged tokens for
//! the parser. Recoverable problems (an unexpected character, a flag
//! separator with no letters) are recorded in the diagnostics collector and
//! scanning continues; an unterminated quote aborts the scan.

use std::{fmt, iter::Peekable, str::Chars};

use crate::error::{Diagnostic, Diagnostics, ErrorKind, LexError};

/// A token in the query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An attribute, qualifier, or scope name.
    Identifier(String),

    /// A run of decimal digits, kept raw for error reporting.
    Integer(String),

    /// The raw, unprocessed content of a quoted regex literal.
    Regex(String),

    /// The run of modifier letters trailing a quoted regex literal.
    RegexFlags(String),

    /// `and` or `&`.
    And,

    /// `or`.
    Or,

    /// `not` or `!`.
    Not,

    /// `within`.
    Within,

    /// `[`.
    LBracket,

    /// `]`.
    RBracket,

    /// `(`.
    LParen,

    /// `)`.
    RParen,

    /// `=`.
    Equals,

    /// `!=`.
    NotEquals,

    /// `*`.
    Star,

    /// `+`.
    Plus,

    /// `?`.
    Question,

    /// `{`.
    LBrace,

    /// `}`.
    RBrace,

    /// `,`.
    Comma,

    /// `:`.
    Colon,

    /// `|` — query alternation, or expression "or".
    Pipe,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier '{name}'"),
            Self::Integer(value) => write!(f, "integer '{value}'"),
            Self::Regex(_) => f.write_str("quoted regex"),
            Self::RegexFlags(letters) => write!(f, "regex flags '{letters}'"),
            Self::And => f.write_str("'and'"),
            Self::Or => f.write_str("'or'"),
            Self::Not => f.write_str("'not'"),
            Self::Within => f.write_str("'within'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Equals => f.write_str("'='"),
            Self::NotEquals => f.write_str("'!='"),
            Self::Star => f.write_str("'*'"),
            Self::Plus => f.write_str("'+'"),
            Self::Question => f.write_str("'?'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::Comma => f.write_str("','"),
            Self::Colon => f.write_str("':'"),
            Self::Pipe => f.write_str("'|'"),
        }
    }
}

/// A token tagged with the character offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Zero-based character offset of the token's first character.
    pub offset: usize,
}

/// Tokenizes a query string.
struct Lexer<'a> {
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
    /// Current character position in the input.
    position: usize,
    /// Scanned tokens.
    tokens: Vec<SpannedToken>,
    /// Sink for recoverable scan errors.
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    fn new(input: &'a str, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            tokens: Vec::new(),
            diagnostics,
        }
    }

    /// Tokenizes the entire input, returning all tokens or a fatal error.
    fn tokenize(mut self) -> Result<Vec<SpannedToken>, LexError> {
        loop {
            self.skip_whitespace();
            let Some(&ch) = self.chars.peek() else {
                break;
            };
            self.scan_token(ch)?;
        }
        Ok(self.tokens)
    }

    /// Scans one token (or records a diagnostic and skips a character).
    fn scan_token(&mut self, ch: char) -> Result<(), LexError> {
        match ch {
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '{' => self.single(Token::LBrace),
            '}' => self.single(Token::RBrace),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Colon),
            '*' => self.single(Token::Star),
            '+' => self.single(Token::Plus),
            '?' => self.single(Token::Question),
            '|' => self.single(Token::Pipe),
            '&' => self.single(Token::And),
            '=' => self.single(Token::Equals),
            '!' => {
                let start = self.position;
                self.advance();
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    self.push(Token::NotEquals, start);
                } else {
                    self.push(Token::Not, start);
                }
            }
            '"' | '\'' => return self.read_quoted(ch),
            c if c.is_ascii_digit() => self.read_integer(),
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            c => {
                self.diagnostics.report(Diagnostic::new(
                    ErrorKind::Lexical,
                    format!("unexpected character: '{c}'"),
                    Some(self.position),
                ));
                self.advance();
            }
        }
        Ok(())
    }

    /// Reads a quoted regex literal, leaving the content raw.
    ///
    /// Escape pairs are carried over verbatim so a `\"` does not end the
    /// literal; the parser expands them later.
    fn read_quoted(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.position;
        self.advance(); // consume opening quote

        let mut content = String::new();
        loop {
            match self.chars.peek() {
                Some(&ch) if ch == quote => {
                    self.advance(); // consume closing quote
                    break;
                }
                Some(&'\\') => {
                    content.push('\\');
                    self.advance();
                    match self.chars.peek() {
                        Some(&escaped) => {
                            content.push(escaped);
                            self.advance();
                        }
                        None => return Err(LexError::new("unterminated quoted regex", start)),
                    }
                }
                Some(&ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => return Err(LexError::new("unterminated quoted regex", start)),
            }
        }

        self.push(Token::Regex(content), start);
        self.read_regex_flags();
        Ok(())
    }

    /// Reads a modifier-letter run directly after a closing quote: either
    /// `/letters`, or letters with no separator at all.
    fn read_regex_flags(&mut self) {
        match self.chars.peek() {
            Some(&'/') => {
                let slash = self.position;
                self.advance();
                let start = self.position;
                let letters = self.read_letters();
                if letters.is_empty() {
                    self.diagnostics.report(Diagnostic::new(
                        ErrorKind::Lexical,
                        "expected regex flags after '/'",
                        Some(slash),
                    ));
                } else {
                    self.push(Token::RegexFlags(letters), start);
                }
            }
            Some(&ch) if ch.is_alphabetic() => {
                let start = self.position;
                let letters = self.read_letters();
                self.push(Token::RegexFlags(letters), start);
            }
            _ => {}
        }
    }

    /// Reads a run of letters.
    fn read_letters(&mut self) -> String {
        let mut letters = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphabetic() {
                letters.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        letters
    }

    /// Reads a run of decimal digits.
    fn read_integer(&mut self) {
        let start = self.position;
        let mut digits = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        self.push(Token::Integer(digits), start);
    }

    /// Reads a word, classifying the reserved keywords.
    fn read_word(&mut self) {
        let start = self.position;
        let mut word = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let token = match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "within" => Token::Within,
            _ => Token::Identifier(word),
        };
        self.push(token, start);
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Emits a single-character token at the current position.
    fn single(&mut self, token: Token) {
        let offset = self.position;
        self.advance();
        self.push(token, offset);
    }

    /// Appends a token with its start offset.
    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(SpannedToken { token, offset });
    }

    /// Advances to the next character.
    fn advance(&mut self) {
        if self.chars.next().is_some() {
            self.position += 1;
        }
    }
}

/// Tokenizes a query string.
///
/// Recoverable problems are recorded in `diagnostics`; an unterminated
/// quote aborts the scan with a fatal error at the opening quote.
pub fn tokenize(input: &str, diagnostics: &mut Diagnostics) -> Result<Vec<SpannedToken>, LexError> {
    Lexer::new(input, diagnostics).tokenize()
}
