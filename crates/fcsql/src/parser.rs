//! Query parser.
//!
//! Parses a token stream into an FCS-QL expression tree using recursive
//! descent. Each grammar rule returns the node it built; list-producing
//! rules collapse to their single element when only one was present.
//!
//! # Grammar
//!
//! ```text
//! query        → disjunction ("within" scope)?
//! disjunction  → sequence ("|" sequence)*
//! sequence     → segment+
//! segment      → "[" expression? "]" quantifier?
//!              | "(" disjunction ")" quantifier?
//!              | implicit quantifier?
//! implicit     → REGEX FLAGS?                    (defaults applied)
//!              | attribute
//! expression   → or_expr
//! or_expr      → and_expr (("|" | "or") and_expr)*
//! and_expr     → not_expr (("&" | "and") not_expr)*
//! not_expr     → ("!" | "not") not_expr | atom
//! atom         → attribute | "(" or_expr ")"
//! attribute    → (IDENTIFIER ":")? IDENTIFIER ("=" | "!=") REGEX FLAGS?
//! quantifier   → "*" | "+" | "?" | "{" INTEGER? ("," INTEGER?)? "}"
//! ```
//!
//! # Precedence within a segment (highest to lowest)
//!
//! 1. Grouping: `(...)`
//! 2. Negation: `!` / `not`
//! 3. Conjunction: `&` / `and`
//! 4. Disjunction: `|` / `or`

use std::mem;

use unicode_normalization::UnicodeNormalization;

use crate::{
    ast::{Operator, QueryNode, RegexFlag, RegexFlags, SimpleWithinScope},
    error::{Diagnostics, ParseError, QueryParserError},
    escape::unescape,
    lexer::{SpannedToken, Token, tokenize},
};

/// Default attribute identifier applied to implicit segments.
pub const DEFAULT_IDENTIFIER: &str = "text";

/// Default comparison operator applied to implicit segments.
pub const DEFAULT_OPERATOR: Operator = Operator::Equals;

/// Unicode normalization form applied to regex values after unescaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnicodeNormalizationForm {
    /// Canonical composition.
    #[default]
    Nfc,
    /// Canonical decomposition.
    Nfd,
    /// Compatibility composition.
    Nfkc,
    /// Compatibility decomposition.
    Nfkd,
}

impl UnicodeNormalizationForm {
    /// Normalizes a string to this form.
    fn apply(self, value: &str) -> String {
        match self {
            Self::Nfc => value.nfc().collect(),
            Self::Nfd => value.nfd().collect(),
            Self::Nfkc => value.nfkc().collect(),
            Self::Nfkd => value.nfkd().collect(),
        }
    }
}

/// FCS-QL parser facade producing expression trees.
///
/// The configuration is read-only during a parse, so one configured parser
/// can serve any number of concurrent parses.
#[derive(Debug, Clone)]
pub struct QueryParser {
    /// Attribute identifier substituted into implicit segments.
    default_identifier: String,
    /// Operator substituted into implicit segments.
    default_operator: Operator,
    /// Normalization applied to regex values; `None` disables it.
    unicode_normalization_form: Option<UnicodeNormalizationForm>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self {
            default_identifier: DEFAULT_IDENTIFIER.to_string(),
            default_operator: DEFAULT_OPERATOR,
            unicode_normalization_form: Some(UnicodeNormalizationForm::Nfc),
        }
    }
}

impl QueryParser {
    /// Creates a parser with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attribute identifier used for implicit segments.
    pub fn with_default_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.default_identifier = identifier.into();
        self
    }

    /// Sets the comparison operator used for implicit segments.
    pub fn with_default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Sets the Unicode normalization applied to regex values;
    /// `None` disables normalization.
    pub fn with_unicode_normalization(mut self, form: Option<UnicodeNormalizationForm>) -> Self {
        self.unicode_normalization_form = form;
        self
    }

    /// Parses a query into an expression tree.
    ///
    /// Runs the full scan-then-build pipeline and returns the single root
    /// node, or the earliest recorded diagnostic as a [`QueryParserError`].
    pub fn parse(&self, query: &str) -> Result<QueryNode, QueryParserError> {
        let mut diagnostics = Diagnostics::new();
        let tokens = match tokenize(query, &mut diagnostics) {
            Ok(tokens) => tokens,
            Err(err) => {
                diagnostics.report(err.into());
                Vec::new()
            }
        };
        if let Some(earliest) = diagnostics.into_earliest() {
            return Err(QueryParserError::new(
                earliest.kind,
                earliest.message,
                earliest.offset,
                query,
            ));
        }

        Parser::new(tokens, self)
            .parse()
            .map_err(|err| QueryParserError::new(err.kind, err.message, err.offset, query))
    }
}

/// Parses a query with the default configuration.
pub fn parse(query: &str) -> Result<QueryNode, QueryParserError> {
    QueryParser::new().parse(query)
}

/// Recursive descent parser over the scanned tokens.
struct Parser<'a> {
    /// Token stream to parse.
    tokens: Vec<SpannedToken>,
    /// Current position in the token stream.
    position: usize,
    /// Facade configuration (defaults, normalization).
    options: &'a QueryParser,
}

impl<'a> Parser<'a> {
    /// Creates a new parser over a token stream.
    fn new(tokens: Vec<SpannedToken>, options: &'a QueryParser) -> Self {
        Self {
            tokens,
            position: 0,
            options,
        }
    }

    /// Parses the token stream into a single root node.
    fn parse(mut self) -> Result<QueryNode, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::syntax("empty query", None));
        }

        let query = self.parse_disjunction()?;
        let root = if self.take(&Token::Within) {
            let within = self.parse_within_scope()?;
            QueryNode::with_within(query, Some(within))
        } else {
            query
        };

        if let Some(spanned) = self.tokens.get(self.position) {
            return Err(ParseError::syntax(
                format!("unexpected token: {}", spanned.token),
                Some(spanned.offset),
            ));
        }

        Ok(root)
    }

    /// Parses: disjunction → sequence ("|" sequence)*
    fn parse_disjunction(&mut self) -> Result<QueryNode, ParseError> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.take(&Token::Pipe) {
            alternatives.push(self.parse_sequence()?);
        }
        Ok(QueryNode::disjunction(alternatives))
    }

    /// Parses: sequence → segment+
    fn parse_sequence(&mut self) -> Result<QueryNode, ParseError> {
        let mut items = vec![self.parse_segment()?];
        while self.can_start_segment() {
            items.push(self.parse_segment()?);
        }
        Ok(QueryNode::sequence(items))
    }

    /// Checks if the current token can start a segment.
    fn can_start_segment(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::LBracket | Token::LParen | Token::Regex(_) | Token::Identifier(_))
        )
    }

    /// Parses one segment alternative: a bracketed expression (or the
    /// wildcard), a parenthesized sub-query, or an implicit segment.
    ///
    /// A quantifier may trail any of them; a parenthesized sub-query
    /// without one contributes no node of its own.
    fn parse_segment(&mut self) -> Result<QueryNode, ParseError> {
        match self.peek() {
            Some(Token::LBracket) => {
                self.advance();
                let expression = if self.check(&Token::RBracket) {
                    QueryNode::ExpressionWildcard
                } else {
                    self.parse_or_expr()?
                };
                self.expect(&Token::RBracket, "expected ']' to close segment")?;
                let (min_occurs, max_occurs) = self.parse_quantifier()?.unwrap_or((1, Some(1)));
                Ok(QueryNode::segment(expression, min_occurs, max_occurs))
            }

            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_disjunction()?;
                self.expect(&Token::RParen, "expected ')' to close group")?;
                match self.parse_quantifier()? {
                    Some((min_occurs, max_occurs)) => {
                        Ok(QueryNode::query_group(inner, min_occurs, max_occurs))
                    }
                    None => Ok(inner),
                }
            }

            Some(Token::Regex(_)) => {
                let expression = self.parse_implicit_expression()?;
                let (min_occurs, max_occurs) = self.parse_quantifier()?.unwrap_or((1, Some(1)));
                Ok(QueryNode::segment(expression, min_occurs, max_occurs))
            }

            Some(Token::Identifier(_)) => {
                let expression = self.parse_attribute()?;
                let (min_occurs, max_occurs) = self.parse_quantifier()?.unwrap_or((1, Some(1)));
                Ok(QueryNode::segment(expression, min_occurs, max_occurs))
            }

            Some(token) => Err(ParseError::syntax(
                format!("unexpected token: {token}"),
                self.current_offset(),
            )),

            None => Err(ParseError::syntax("unexpected end of query", None)),
        }
    }

    /// Parses a bare quoted regex into a full expression using the
    /// configured default identifier and operator.
    fn parse_implicit_expression(&mut self) -> Result<QueryNode, ParseError> {
        let (regex, regex_flags) = self.parse_regex_value()?;
        Ok(QueryNode::expression(
            None,
            self.options.default_identifier.clone(),
            self.options.default_operator,
            regex,
            regex_flags,
        ))
    }

    /// Parses: or_expr → and_expr (("|" | "or") and_expr)*
    fn parse_or_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut operands = vec![self.parse_and_expr()?];
        while self.take(&Token::Or) || self.take(&Token::Pipe) {
            operands.push(self.parse_and_expr()?);
        }
        Ok(QueryNode::or(operands))
    }

    /// Parses: and_expr → not_expr (("&" | "and") not_expr)*
    fn parse_and_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut operands = vec![self.parse_not_expr()?];
        while self.take(&Token::And) {
            operands.push(self.parse_not_expr()?);
        }
        Ok(QueryNode::and(operands))
    }

    /// Parses: not_expr → ("!" | "not") not_expr | atom
    fn parse_not_expr(&mut self) -> Result<QueryNode, ParseError> {
        if self.take(&Token::Not) {
            let expression = self.parse_not_expr()?;
            return Ok(QueryNode::not(expression));
        }
        self.parse_atom()
    }

    /// Parses: atom → attribute | "(" or_expr ")"
    fn parse_atom(&mut self) -> Result<QueryNode, ParseError> {
        match self.peek() {
            Some(Token::LParen) => {
                self.advance();
                let expression = self.parse_or_expr()?;
                self.expect(&Token::RParen, "expected ')' to close expression group")?;
                Ok(QueryNode::group(expression))
            }

            Some(Token::Identifier(_)) => self.parse_attribute(),

            Some(token) => Err(ParseError::syntax(
                format!("expected attribute expression, found {token}"),
                self.current_offset(),
            )),

            None => Err(ParseError::syntax("unexpected end of query", None)),
        }
    }

    /// Parses: attribute → (IDENTIFIER ":")? IDENTIFIER ("=" | "!=") regex
    fn parse_attribute(&mut self) -> Result<QueryNode, ParseError> {
        let first = self.expect_identifier("expected attribute name")?;
        let (qualifier, identifier) = if self.take(&Token::Colon) {
            let identifier = self.expect_identifier("expected attribute name after qualifier")?;
            (Some(first), identifier)
        } else {
            (None, first)
        };

        let operator = match self.peek() {
            Some(Token::Equals) => {
                self.advance();
                Operator::Equals
            }
            Some(Token::NotEquals) => {
                self.advance();
                Operator::NotEquals
            }
            _ => {
                return Err(ParseError::syntax(
                    "expected '=' or '!=' after attribute name",
                    self.current_offset(),
                ));
            }
        };

        let (regex, regex_flags) = self.parse_regex_value()?;
        Ok(QueryNode::expression(
            qualifier,
            identifier,
            operator,
            regex,
            regex_flags,
        ))
    }

    /// Parses `REGEX FLAGS?`, unescaping and normalizing the value.
    fn parse_regex_value(&mut self) -> Result<(String, Option<RegexFlags>), ParseError> {
        let (raw, offset) = match self.tokens.get(self.position) {
            Some(SpannedToken {
                token: Token::Regex(raw),
                offset,
            }) => {
                let raw = (raw.clone(), *offset);
                self.advance();
                raw
            }
            _ => {
                return Err(ParseError::syntax(
                    "expected quoted regular expression",
                    self.current_offset(),
                ));
            }
        };

        // Escape expansion only when escapes are present; the literal
        // content starts one character after the opening quote.
        let mut regex = if raw.contains('\\') {
            unescape(&raw, offset + 1)?
        } else {
            raw
        };
        if let Some(form) = self.options.unicode_normalization_form {
            regex = form.apply(&regex);
        }

        let regex_flags = match self.tokens.get(self.position) {
            Some(SpannedToken {
                token: Token::RegexFlags(letters),
                offset,
            }) => {
                let flags = parse_regex_flags(letters, *offset)?;
                self.advance();
                Some(flags)
            }
            _ => None,
        };

        Ok((regex, regex_flags))
    }

    /// Parses the scope keyword after `within`.
    fn parse_within_scope(&mut self) -> Result<QueryNode, ParseError> {
        match self.tokens.get(self.position) {
            Some(SpannedToken {
                token: Token::Identifier(word),
                offset,
            }) => {
                let scope = SimpleWithinScope::from_keyword(word).ok_or_else(|| {
                    ParseError::semantic(
                        format!("invalid scope for 'within' clause: {word}"),
                        Some(*offset),
                    )
                })?;
                self.advance();
                Ok(QueryNode::SimpleWithin(scope))
            }
            _ => Err(ParseError::syntax(
                "expected scope keyword after 'within'",
                self.current_offset(),
            )),
        }
    }

    /// Parses an optional repetition quantifier into `(min, max)`,
    /// where a `None` max is unbounded.
    fn parse_quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>, ParseError> {
        match self.peek() {
            Some(Token::Star) => {
                self.advance();
                Ok(Some((0, None)))
            }
            Some(Token::Plus) => {
                self.advance();
                Ok(Some((1, None)))
            }
            Some(Token::Question) => {
                self.advance();
                Ok(Some((0, Some(1))))
            }
            Some(Token::LBrace) => self.parse_repetition_range().map(Some),
            _ => Ok(None),
        }
    }

    /// Parses the `{n}` / `{n,}` / `{,m}` / `{n,m}` quantifier forms.
    fn parse_repetition_range(&mut self) -> Result<(u32, Option<u32>), ParseError> {
        let open = self.current_offset();
        self.advance(); // consume {

        let lower = self.take_integer()?;
        if !self.check(&Token::Comma) {
            // {n} — exact repetition
            let Some(exact) = lower else {
                return Err(ParseError::syntax(
                    "repetition quantifier needs at least one bound",
                    open,
                ));
            };
            self.expect(&Token::RBrace, "expected '}' to close quantifier")?;
            return Ok((exact, Some(exact)));
        }
        self.advance(); // consume comma

        let upper = self.take_integer()?;
        self.expect(&Token::RBrace, "expected '}' to close quantifier")?;

        if lower.is_none() && upper.is_none() {
            return Err(ParseError::syntax(
                "repetition quantifier needs at least one bound",
                open,
            ));
        }
        let min_occurs = lower.unwrap_or(0);
        if let Some(max_occurs) = upper {
            if min_occurs > max_occurs {
                return Err(ParseError::semantic(
                    format!("bad repetition range: min > max ({min_occurs} > {max_occurs})"),
                    open,
                ));
            }
        }
        Ok((min_occurs, upper))
    }

    /// Consumes an integer token, if one is current.
    fn take_integer(&mut self) -> Result<Option<u32>, ParseError> {
        match self.tokens.get(self.position) {
            Some(SpannedToken {
                token: Token::Integer(text),
                offset,
            }) => {
                let value = text.parse::<u32>().map_err(|_| {
                    ParseError::syntax(format!("invalid integer: {text}"), Some(*offset))
                })?;
                self.advance();
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    /// Consumes an identifier token or fails with the given message.
    fn expect_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.tokens.get(self.position) {
            Some(SpannedToken {
                token: Token::Identifier(name),
                ..
            }) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::syntax(message, self.current_offset())),
        }
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|spanned| &spanned.token)
    }

    /// Returns the offset of the current token.
    fn current_offset(&self) -> Option<usize> {
        self.tokens.get(self.position).map(|spanned| spanned.offset)
    }

    /// Checks if the current token matches the given token kind.
    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|current| mem::discriminant(current) == mem::discriminant(token))
    }

    /// Consumes the current token if it matches the given token kind.
    fn take(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes the expected token or fails with the given message.
    fn expect(&mut self, token: &Token, message: &str) -> Result<(), ParseError> {
        if self.take(token) {
            Ok(())
        } else {
            Err(ParseError::syntax(message, self.current_offset()))
        }
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Maps a run of modifier letters to a flag set, enforcing the
/// exclusivity rules.
fn parse_regex_flags(letters: &str, offset: usize) -> Result<RegexFlags, ParseError> {
    let mut flags = RegexFlags::new();
    for (idx, letter) in letters.chars().enumerate() {
        let flag = match letter {
            'i' | 'c' => RegexFlag::CaseInsensitive,
            'I' | 'C' => RegexFlag::CaseSensitive,
            'l' => RegexFlag::LiteralMatching,
            'd' => RegexFlag::IgnoreDiacritics,
            _ => {
                return Err(ParseError::lexical(
                    format!("unknown regex modifier flag: '{letter}'"),
                    Some(offset + idx),
                ));
            }
        };
        flags.insert(flag);
    }

    if flags.contains(RegexFlag::CaseInsensitive) && flags.contains(RegexFlag::CaseSensitive) {
        return Err(ParseError::semantic(
            "invalid combination of regex modifier flags: \
             'i' or 'c' and 'I' or 'C' are mutually exclusive",
            Some(offset),
        ));
    }
    if flags.contains(RegexFlag::LiteralMatching)
        && (flags.contains(RegexFlag::CaseInsensitive)
            || flags.contains(RegexFlag::CaseSensitive)
            || flags.contains(RegexFlag::IgnoreDiacritics))
    {
        return Err(ParseError::semantic(
            "invalid combination of regex modifier flags: \
             'l' is mutually exclusive with 'i', 'c', 'I', 'C' or 'd'",
            Some(offset),
        ));
    }

    Ok(flags)
}
