//! FCS-QL expression trees.
//!
//! Represents parsed queries as an immutable, strictly owned tree of
//! [`QueryNode`] values, built bottom-up by the parser and handed to the
//! caller as a single root. Downstream planners traverse the tree through
//! the generic child accessors or a [`QueryVisitor`].

use std::fmt;

use crate::escape::escape;

/// Comparison operator of an attribute condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=` — the pattern must match.
    Equals,
    /// `!=` — the pattern must not match.
    NotEquals,
}

impl Operator {
    /// The operator's textual form in a query.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Modifier flag attached to a regex value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexFlag {
    /// `i` (or `c`) — match case-insensitively.
    CaseInsensitive,
    /// `I` (or `C`) — match case-sensitively.
    CaseSensitive,
    /// `l` — match the value literally, not as a regex.
    LiteralMatching,
    /// `d` — ignore diacritics when matching.
    IgnoreDiacritics,
}

impl RegexFlag {
    /// All flags, in canonical serialization order.
    const ALL: [Self; 4] = [
        Self::CaseInsensitive,
        Self::CaseSensitive,
        Self::LiteralMatching,
        Self::IgnoreDiacritics,
    ];

    /// Canonical single-letter form used when serializing.
    pub fn letter(self) -> char {
        match self {
            Self::CaseInsensitive => 'i',
            Self::CaseSensitive => 'I',
            Self::LiteralMatching => 'l',
            Self::IgnoreDiacritics => 'd',
        }
    }

    /// Bit used by [`RegexFlags`].
    fn bit(self) -> u8 {
        match self {
            Self::CaseInsensitive => 1,
            Self::CaseSensitive => 1 << 1,
            Self::LiteralMatching => 1 << 2,
            Self::IgnoreDiacritics => 1 << 3,
        }
    }
}

/// A set of [`RegexFlag`] values.
///
/// An empty set is distinct from an *absent* flag run: an expression stores
/// `Option<RegexFlags>`, where `None` means no flag run was written at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexFlags(u8);

impl RegexFlags {
    /// Creates an empty flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag to the set.
    pub fn insert(&mut self, flag: RegexFlag) {
        self.0 |= flag.bit();
    }

    /// Checks whether a flag is in the set.
    pub fn contains(self, flag: RegexFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Checks whether no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the set flags in canonical `i I l d` order.
    pub fn iter(self) -> impl Iterator<Item = RegexFlag> {
        RegexFlag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl FromIterator<RegexFlag> for RegexFlags {
    fn from_iter<I: IntoIterator<Item = RegexFlag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

/// Bounding scope of a `within` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleWithinScope {
    /// `sentence` / `s`.
    Sentence,
    /// `utterance` / `u`.
    Utterance,
    /// `paragraph` / `p`.
    Paragraph,
    /// `turn` / `t`.
    Turn,
    /// `text`.
    Text,
    /// `session`.
    Session,
}

impl SimpleWithinScope {
    /// Maps a scope keyword (full name or abbreviation) to its scope.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "sentence" | "s" => Some(Self::Sentence),
            "utterance" | "u" => Some(Self::Utterance),
            "paragraph" | "p" => Some(Self::Paragraph),
            "turn" | "t" => Some(Self::Turn),
            "text" => Some(Self::Text),
            "session" => Some(Self::Session),
            _ => None,
        }
    }

    /// The scope's full keyword form.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Sentence => "sentence",
            Self::Utterance => "utterance",
            Self::Paragraph => "paragraph",
            Self::Turn => "turn",
            Self::Text => "text",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for SimpleWithinScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Discriminant of a [`QueryNode`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryNodeType {
    /// An attribute condition leaf.
    Expression,
    /// The "any token" segment content.
    ExpressionWildcard,
    /// Explicit parentheses around an expression.
    ExpressionGroup,
    /// Logical negation of an expression.
    ExpressionNot,
    /// Conjunction of expressions.
    ExpressionAnd,
    /// Disjunction of expressions.
    ExpressionOr,
    /// One positional slot with repetition bounds.
    QuerySegment,
    /// A quantified parenthesized sub-query.
    QueryGroup,
    /// Concatenation of queries.
    QuerySequence,
    /// Alternation of queries.
    QueryDisjunction,
    /// The bounding search context.
    SimpleWithin,
    /// Root pairing a query with its within clause.
    QueryWithWithin,
}

impl QueryNodeType {
    /// The type's display name.
    fn name(self) -> &'static str {
        match self {
            Self::Expression => "Expression",
            Self::ExpressionWildcard => "ExpressionWildcard",
            Self::ExpressionGroup => "ExpressionGroup",
            Self::ExpressionNot => "ExpressionNot",
            Self::ExpressionAnd => "ExpressionAnd",
            Self::ExpressionOr => "ExpressionOr",
            Self::QuerySegment => "QuerySegment",
            Self::QueryGroup => "QueryGroup",
            Self::QuerySequence => "QuerySequence",
            Self::QueryDisjunction => "QueryDisjunction",
            Self::SimpleWithin => "SimpleWithin",
            Self::QueryWithWithin => "QueryWithWithin",
        }
    }
}

impl fmt::Display for QueryNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node in a parsed FCS-QL expression tree.
///
/// The tree is immutable after construction; every node exclusively owns
/// its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// An `attribute = "pattern"` condition.
    Expression {
        /// Optional sub-attribute disambiguator (`qualifier:identifier`).
        qualifier: Option<String>,
        /// Attribute name.
        identifier: String,
        /// Comparison operator.
        operator: Operator,
        /// Pattern with escape sequences already expanded.
        regex: String,
        /// Modifier flags; `None` when no flag run was written.
        regex_flags: Option<RegexFlags>,
    },

    /// `[]` — matches any token.
    ExpressionWildcard,

    /// Parenthesized expression, kept to preserve explicit grouping.
    ExpressionGroup(Box<QueryNode>),

    /// Negated expression.
    ExpressionNot(Box<QueryNode>),

    /// Conjunction of two or more expressions.
    ExpressionAnd(Vec<QueryNode>),

    /// Disjunction of two or more expressions.
    ExpressionOr(Vec<QueryNode>),

    /// One positional slot with repetition bounds.
    QuerySegment {
        /// The segment's condition (an expression or the wildcard).
        expression: Box<QueryNode>,
        /// Minimum occurrence count.
        min_occurs: u32,
        /// Maximum occurrence count; `None` is unbounded.
        max_occurs: Option<u32>,
    },

    /// Quantified parenthesized sub-query.
    QueryGroup {
        /// The grouped query.
        content: Box<QueryNode>,
        /// Minimum occurrence count.
        min_occurs: u32,
        /// Maximum occurrence count; `None` is unbounded.
        max_occurs: Option<u32>,
    },

    /// Two or more queries in token order.
    QuerySequence(Vec<QueryNode>),

    /// Two or more alternative queries.
    QueryDisjunction(Vec<QueryNode>),

    /// A `within` bounding scope.
    SimpleWithin(SimpleWithinScope),

    /// Root node pairing a query with an optional within clause.
    QueryWithWithin {
        /// The query part.
        query: Box<QueryNode>,
        /// The within clause, when present.
        within: Option<Box<QueryNode>>,
    },
}

impl QueryNode {
    /// Creates an attribute condition, normalizing an empty or
    /// all-whitespace qualifier to absent.
    pub fn expression(
        qualifier: Option<String>,
        identifier: String,
        operator: Operator,
        regex: String,
        regex_flags: Option<RegexFlags>,
    ) -> Self {
        let qualifier = qualifier.filter(|qualifier| !qualifier.trim().is_empty());
        Self::Expression {
            qualifier,
            identifier,
            operator,
            regex,
            regex_flags,
        }
    }

    /// Creates a conjunction, flattening nested conjunctions and collapsing
    /// a single operand to itself.
    ///
    /// Panics if `operands` is empty.
    pub fn and(operands: Vec<Self>) -> Self {
        let flattened: Vec<Self> = operands
            .into_iter()
            .flat_map(|operand| match operand {
                Self::ExpressionAnd(inner) => inner,
                other => vec![other],
            })
            .collect();

        assert!(!flattened.is_empty(), "conjunction needs at least one operand");
        match flattened.len() {
            1 => flattened.into_iter().next().unwrap(),
            _ => Self::ExpressionAnd(flattened),
        }
    }

    /// Creates a disjunction of expressions, flattening nested disjunctions
    /// and collapsing a single operand to itself.
    ///
    /// Panics if `operands` is empty.
    pub fn or(operands: Vec<Self>) -> Self {
        let flattened: Vec<Self> = operands
            .into_iter()
            .flat_map(|operand| match operand {
                Self::ExpressionOr(inner) => inner,
                other => vec![other],
            })
            .collect();

        assert!(!flattened.is_empty(), "disjunction needs at least one operand");
        match flattened.len() {
            1 => flattened.into_iter().next().unwrap(),
            _ => Self::ExpressionOr(flattened),
        }
    }

    /// Creates a query sequence, flattening nested sequences and collapsing
    /// a single item to itself.
    ///
    /// Panics if `items` is empty.
    pub fn sequence(items: Vec<Self>) -> Self {
        let flattened: Vec<Self> = items
            .into_iter()
            .flat_map(|item| match item {
                Self::QuerySequence(inner) => inner,
                other => vec![other],
            })
            .collect();

        assert!(!flattened.is_empty(), "sequence needs at least one item");
        match flattened.len() {
            1 => flattened.into_iter().next().unwrap(),
            _ => Self::QuerySequence(flattened),
        }
    }

    /// Creates a query disjunction, flattening nested disjunctions and
    /// collapsing a single alternative to itself.
    ///
    /// Panics if `alternatives` is empty.
    pub fn disjunction(alternatives: Vec<Self>) -> Self {
        let flattened: Vec<Self> = alternatives
            .into_iter()
            .flat_map(|alternative| match alternative {
                Self::QueryDisjunction(inner) => inner,
                other => vec![other],
            })
            .collect();

        assert!(!flattened.is_empty(), "disjunction needs at least one alternative");
        match flattened.len() {
            1 => flattened.into_iter().next().unwrap(),
            _ => Self::QueryDisjunction(flattened),
        }
    }

    /// Creates a negated expression.
    pub fn not(expression: Self) -> Self {
        Self::ExpressionNot(Box::new(expression))
    }

    /// Creates an explicit expression group.
    pub fn group(expression: Self) -> Self {
        Self::ExpressionGroup(Box::new(expression))
    }

    /// Creates a segment with repetition bounds.
    pub fn segment(expression: Self, min_occurs: u32, max_occurs: Option<u32>) -> Self {
        Self::QuerySegment {
            expression: Box::new(expression),
            min_occurs,
            max_occurs,
        }
    }

    /// Creates a quantified query group.
    pub fn query_group(content: Self, min_occurs: u32, max_occurs: Option<u32>) -> Self {
        Self::QueryGroup {
            content: Box::new(content),
            min_occurs,
            max_occurs,
        }
    }

    /// Creates a root node pairing a query with an optional within clause.
    pub fn with_within(query: Self, within: Option<Self>) -> Self {
        Self::QueryWithWithin {
            query: Box::new(query),
            within: within.map(Box::new),
        }
    }

    /// The node's discriminant.
    pub fn node_type(&self) -> QueryNodeType {
        match self {
            Self::Expression { .. } => QueryNodeType::Expression,
            Self::ExpressionWildcard => QueryNodeType::ExpressionWildcard,
            Self::ExpressionGroup(_) => QueryNodeType::ExpressionGroup,
            Self::ExpressionNot(_) => QueryNodeType::ExpressionNot,
            Self::ExpressionAnd(_) => QueryNodeType::ExpressionAnd,
            Self::ExpressionOr(_) => QueryNodeType::ExpressionOr,
            Self::QuerySegment { .. } => QueryNodeType::QuerySegment,
            Self::QueryGroup { .. } => QueryNodeType::QueryGroup,
            Self::QuerySequence(_) => QueryNodeType::QuerySequence,
            Self::QueryDisjunction(_) => QueryNodeType::QueryDisjunction,
            Self::SimpleWithin(_) => QueryNodeType::SimpleWithin,
            Self::QueryWithWithin { .. } => QueryNodeType::QueryWithWithin,
        }
    }

    /// Checks whether the node is of the given type.
    pub fn has_node_type(&self, node_type: QueryNodeType) -> bool {
        self.node_type() == node_type
    }

    /// Direct children, in order.
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Expression { .. } | Self::ExpressionWildcard | Self::SimpleWithin(_) => {
                Vec::new()
            }
            Self::ExpressionGroup(child) | Self::ExpressionNot(child) => vec![child.as_ref()],
            Self::QuerySegment { expression, .. } => vec![expression.as_ref()],
            Self::QueryGroup { content, .. } => vec![content.as_ref()],
            Self::ExpressionAnd(children)
            | Self::ExpressionOr(children)
            | Self::QuerySequence(children)
            | Self::QueryDisjunction(children) => children.iter().collect(),
            Self::QueryWithWithin { query, within } => {
                let mut children = vec![query.as_ref()];
                if let Some(within) = within {
                    children.push(within.as_ref());
                }
                children
            }
        }
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        match self {
            Self::Expression { .. } | Self::ExpressionWildcard | Self::SimpleWithin(_) => 0,
            Self::ExpressionGroup(_)
            | Self::ExpressionNot(_)
            | Self::QuerySegment { .. }
            | Self::QueryGroup { .. } => 1,
            Self::ExpressionAnd(children)
            | Self::ExpressionOr(children)
            | Self::QuerySequence(children)
            | Self::QueryDisjunction(children) => children.len(),
            Self::QueryWithWithin { within, .. } => 1 + usize::from(within.is_some()),
        }
    }

    /// Child by index.
    pub fn child(&self, idx: usize) -> Option<&Self> {
        self.children().get(idx).copied()
    }

    /// Child by index, counting only children of the given type.
    pub fn child_of_type(&self, idx: usize, node_type: QueryNodeType) -> Option<&Self> {
        self.children()
            .into_iter()
            .filter(|child| child.node_type() == node_type)
            .nth(idx)
    }

    /// First child, if any.
    pub fn first_child(&self) -> Option<&Self> {
        self.child(0)
    }

    /// Last child, if any.
    pub fn last_child(&self) -> Option<&Self> {
        self.children().pop()
    }

    /// For an [`Expression`](Self::Expression): checks the attribute
    /// identifier. `false` for any other node kind.
    pub fn has_layer_identifier(&self, identifier: &str) -> bool {
        matches!(self, Self::Expression { identifier: id, .. } if id == identifier)
    }

    /// For an [`Expression`](Self::Expression): checks the qualifier.
    /// `false` for other node kinds or when no qualifier is set.
    pub fn has_layer_qualifier(&self, qualifier: &str) -> bool {
        matches!(self, Self::Expression { qualifier: Some(q), .. } if q == qualifier)
    }

    /// For an [`Expression`](Self::Expression): `true` when no qualifier is
    /// set. `false` for any other node kind.
    pub fn is_layer_qualifier_empty(&self) -> bool {
        matches!(self, Self::Expression { qualifier: None, .. })
    }

    /// For an [`Expression`](Self::Expression): checks the operator.
    pub fn has_operator(&self, operator: Operator) -> bool {
        matches!(self, Self::Expression { operator: op, .. } if *op == operator)
    }

    /// For an [`Expression`](Self::Expression): checks a modifier flag.
    pub fn has_regex_flag(&self, flag: RegexFlag) -> bool {
        matches!(self, Self::Expression { regex_flags: Some(flags), .. } if flags.contains(flag))
    }

    /// For an [`Expression`](Self::Expression): `true` when no modifier
    /// flag is set, whether the flag run was absent or explicitly empty.
    pub fn is_regex_flags_empty(&self) -> bool {
        match self {
            Self::Expression { regex_flags, .. } => {
                regex_flags.map_or(true, |flags| flags.is_empty())
            }
            _ => false,
        }
    }

    /// Walks the tree post-order: children first, then this node.
    pub fn accept(&self, visitor: &mut dyn QueryVisitor) {
        for child in self.children() {
            child.accept(visitor);
        }
        match self {
            Self::Expression { .. } => visitor.visit_expression(self),
            Self::ExpressionWildcard => visitor.visit_expression_wildcard(self),
            Self::ExpressionGroup(_) => visitor.visit_expression_group(self),
            Self::ExpressionNot(_) => visitor.visit_expression_not(self),
            Self::ExpressionAnd(_) => visitor.visit_expression_and(self),
            Self::ExpressionOr(_) => visitor.visit_expression_or(self),
            Self::QuerySegment { .. } => visitor.visit_query_segment(self),
            Self::QueryGroup { .. } => visitor.visit_query_group(self),
            Self::QuerySequence(_) => visitor.visit_query_sequence(self),
            Self::QueryDisjunction(_) => visitor.visit_query_disjunction(self),
            Self::SimpleWithin(_) => visitor.visit_simple_within(self),
            Self::QueryWithWithin { .. } => visitor.visit_query_with_within(self),
        }
    }

    /// Formats the tree as canonical FCS-QL query text.
    ///
    /// Re-parsing the output yields a structurally equal tree.
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        self.write_query_string(&mut out);
        out
    }

    /// Appends this node's canonical query text to `out`.
    fn write_query_string(&self, out: &mut String) {
        match self {
            Self::Expression {
                qualifier,
                identifier,
                operator,
                regex,
                regex_flags,
            } => {
                if let Some(qualifier) = qualifier {
                    out.push_str(qualifier);
                    out.push(':');
                }
                out.push_str(identifier);
                out.push_str(operator.symbol());
                out.push('"');
                out.push_str(&escape(regex));
                out.push('"');
                if let Some(flags) = regex_flags {
                    if !flags.is_empty() {
                        out.push('/');
                        for flag in flags.iter() {
                            out.push(flag.letter());
                        }
                    }
                }
            }
            Self::ExpressionWildcard => {}
            Self::ExpressionGroup(child) => {
                out.push('(');
                child.write_query_string(out);
                out.push(')');
            }
            Self::ExpressionNot(child) => {
                out.push('!');
                child.write_query_string(out);
            }
            Self::ExpressionAnd(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(" & ");
                    }
                    child.write_query_string(out);
                }
            }
            Self::ExpressionOr(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(" | ");
                    }
                    child.write_query_string(out);
                }
            }
            Self::QuerySegment {
                expression,
                min_occurs,
                max_occurs,
            } => {
                out.push('[');
                expression.write_query_string(out);
                out.push(']');
                out.push_str(&occurs_suffix(*min_occurs, *max_occurs, false));
            }
            Self::QueryGroup {
                content,
                min_occurs,
                max_occurs,
            } => {
                out.push('(');
                content.write_query_string(out);
                out.push(')');
                out.push_str(&occurs_suffix(*min_occurs, *max_occurs, true));
            }
            Self::QuerySequence(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        out.push(' ');
                    }
                    // A bare disjunction would rebind the surrounding
                    // sequence; parentheses keep the structure.
                    if child.has_node_type(QueryNodeType::QueryDisjunction) {
                        out.push('(');
                        child.write_query_string(out);
                        out.push(')');
                    } else {
                        child.write_query_string(out);
                    }
                }
            }
            Self::QueryDisjunction(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(" | ");
                    }
                    child.write_query_string(out);
                }
            }
            Self::SimpleWithin(scope) => out.push_str(scope.keyword()),
            Self::QueryWithWithin { query, within } => {
                query.write_query_string(out);
                if let Some(within) = within {
                    out.push_str(" within ");
                    within.write_query_string(out);
                }
            }
        }
    }

    /// Formats the node as a tree structure with the given indentation.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::Expression {
                qualifier,
                identifier,
                operator,
                regex,
                regex_flags,
            } => {
                write!(f, "{prefix}Expression(")?;
                if let Some(qualifier) = qualifier {
                    write!(f, "{qualifier}:")?;
                }
                write!(f, "{identifier} {operator} {regex:?}")?;
                if let Some(flags) = regex_flags {
                    write!(f, " /")?;
                    for flag in flags.iter() {
                        write!(f, "{}", flag.letter())?;
                    }
                }
                writeln!(f, ")")
            }
            Self::QuerySegment {
                min_occurs,
                max_occurs,
                ..
            }
            | Self::QueryGroup {
                min_occurs,
                max_occurs,
                ..
            } => {
                writeln!(
                    f,
                    "{prefix}{}({})",
                    self.node_type(),
                    occurs_label(*min_occurs, *max_occurs)
                )?;
                self.fmt_children(f, indent)
            }
            Self::SimpleWithin(scope) => writeln!(f, "{prefix}SimpleWithin({scope})"),
            _ => {
                writeln!(f, "{prefix}{}", self.node_type())?;
                self.fmt_children(f, indent)
            }
        }
    }

    /// Formats all children one level deeper.
    fn fmt_children(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for child in self.children() {
            child.fmt_tree(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Renders repetition bounds for the debug tree, e.g. `2..3` or `0..*`.
fn occurs_label(min_occurs: u32, max_occurs: Option<u32>) -> String {
    match max_occurs {
        Some(max_occurs) => format!("{min_occurs}..{max_occurs}"),
        None => format!("{min_occurs}..*"),
    }
}

/// Renders repetition bounds as a quantifier suffix.
///
/// The default bounds (1,1) render as nothing for a segment; a query group
/// only exists because a quantifier was written, so `explicit_one` keeps an
/// explicit `{1}` there.
fn occurs_suffix(min_occurs: u32, max_occurs: Option<u32>, explicit_one: bool) -> String {
    match (min_occurs, max_occurs) {
        (1, Some(1)) if explicit_one => "{1}".to_string(),
        (1, Some(1)) => String::new(),
        (0, None) => "*".to_string(),
        (1, None) => "+".to_string(),
        (0, Some(1)) => "?".to_string(),
        (min, Some(max)) if min == max => format!("{{{min}}}"),
        (min, None) => format!("{{{min},}}"),
        (min, Some(max)) => format!("{{{min},{max}}}"),
    }
}

/// Visitor over [`QueryNode`] trees.
///
/// [`QueryNode::accept`] drives a post-order walk (children first, then the
/// node itself) and calls the method matching each node's kind. Default
/// implementations do nothing.
#[allow(unused_variables)]
pub trait QueryVisitor {
    /// Called for every attribute condition.
    fn visit_expression(&mut self, node: &QueryNode) {}
    /// Called for every wildcard.
    fn visit_expression_wildcard(&mut self, node: &QueryNode) {}
    /// Called for every explicit expression group.
    fn visit_expression_group(&mut self, node: &QueryNode) {}
    /// Called for every negation.
    fn visit_expression_not(&mut self, node: &QueryNode) {}
    /// Called for every expression conjunction.
    fn visit_expression_and(&mut self, node: &QueryNode) {}
    /// Called for every expression disjunction.
    fn visit_expression_or(&mut self, node: &QueryNode) {}
    /// Called for every segment.
    fn visit_query_segment(&mut self, node: &QueryNode) {}
    /// Called for every quantified query group.
    fn visit_query_group(&mut self, node: &QueryNode) {}
    /// Called for every query sequence.
    fn visit_query_sequence(&mut self, node: &QueryNode) {}
    /// Called for every query disjunction.
    fn visit_query_disjunction(&mut self, node: &QueryNode) {}
    /// Called for every within clause.
    fn visit_simple_within(&mut self, node: &QueryNode) {}
    /// Called for every query-with-within root.
    fn visit_query_with_within(&mut self, node: &QueryNode) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(identifier: &str, regex: &str) -> QueryNode {
        QueryNode::expression(
            None,
            identifier.to_string(),
            Operator::Equals,
            regex.to_string(),
            None,
        )
    }

    #[test]
    fn and_flattens_nested() {
        let nested = QueryNode::and(vec![
            expr("a", "1"),
            QueryNode::ExpressionAnd(vec![expr("b", "2"), expr("c", "3")]),
        ]);

        assert_eq!(
            nested,
            QueryNode::ExpressionAnd(vec![expr("a", "1"), expr("b", "2"), expr("c", "3")])
        );
    }

    #[test]
    fn and_single_element_unwraps() {
        assert_eq!(QueryNode::and(vec![expr("a", "1")]), expr("a", "1"));
    }

    #[test]
    fn or_flattens_nested() {
        let nested = QueryNode::or(vec![
            expr("a", "1"),
            QueryNode::ExpressionOr(vec![expr("b", "2"), expr("c", "3")]),
        ]);

        assert_eq!(
            nested,
            QueryNode::ExpressionOr(vec![expr("a", "1"), expr("b", "2"), expr("c", "3")])
        );
    }

    #[test]
    fn or_single_element_unwraps() {
        assert_eq!(QueryNode::or(vec![expr("a", "1")]), expr("a", "1"));
    }

    #[test]
    fn sequence_flattens_and_collapses() {
        let seg = QueryNode::segment(expr("a", "1"), 1, Some(1));
        assert_eq!(QueryNode::sequence(vec![seg.clone()]), seg.clone());

        let nested = QueryNode::sequence(vec![
            QueryNode::QuerySequence(vec![seg.clone(), seg.clone()]),
            seg.clone(),
        ]);
        assert_eq!(nested.child_count(), 3);
    }

    #[test]
    fn disjunction_flattens_and_collapses() {
        let seg = QueryNode::segment(expr("a", "1"), 1, Some(1));
        assert_eq!(QueryNode::disjunction(vec![seg.clone()]), seg.clone());

        let nested = QueryNode::disjunction(vec![
            QueryNode::QueryDisjunction(vec![seg.clone(), seg.clone()]),
            seg,
        ]);
        assert_eq!(nested.node_type(), QueryNodeType::QueryDisjunction);
        assert_eq!(nested.child_count(), 3);
    }

    #[test]
    #[should_panic(expected = "at least one operand")]
    fn empty_conjunction_panics() {
        let _ = QueryNode::and(vec![]);
    }

    #[test]
    fn whitespace_qualifier_treated_as_absent() {
        let node = QueryNode::expression(
            Some("   ".to_string()),
            "word".to_string(),
            Operator::Equals,
            "dog".to_string(),
            None,
        );
        assert!(node.is_layer_qualifier_empty());
        assert!(!node.has_layer_qualifier("   "));
    }

    #[test]
    fn expression_predicates() {
        let mut flags = RegexFlags::new();
        flags.insert(RegexFlag::CaseInsensitive);
        let node = QueryNode::expression(
            Some("x".to_string()),
            "word".to_string(),
            Operator::NotEquals,
            "dog".to_string(),
            Some(flags),
        );

        assert!(node.has_layer_identifier("word"));
        assert!(!node.has_layer_identifier("pos"));
        assert!(node.has_layer_qualifier("x"));
        assert!(!node.is_layer_qualifier_empty());
        assert!(node.has_operator(Operator::NotEquals));
        assert!(node.has_regex_flag(RegexFlag::CaseInsensitive));
        assert!(!node.has_regex_flag(RegexFlag::LiteralMatching));
        assert!(!node.is_regex_flags_empty());

        // Non-expression nodes answer false across the board.
        let wildcard = QueryNode::ExpressionWildcard;
        assert!(!wildcard.has_layer_identifier("word"));
        assert!(!wildcard.is_layer_qualifier_empty());
        assert!(!wildcard.is_regex_flags_empty());
    }

    #[test]
    fn explicitly_empty_flags_count_as_empty() {
        let node = QueryNode::expression(
            None,
            "word".to_string(),
            Operator::Equals,
            "dog".to_string(),
            Some(RegexFlags::new()),
        );
        assert!(node.is_regex_flags_empty());
    }

    #[test]
    fn child_accessors() {
        let seg = QueryNode::segment(expr("a", "1"), 1, Some(1));
        let within = QueryNode::SimpleWithin(SimpleWithinScope::Sentence);
        let root = QueryNode::with_within(seg.clone(), Some(within.clone()));

        assert_eq!(root.child_count(), 2);
        assert_eq!(root.child(0), Some(&seg));
        assert_eq!(root.child(1), Some(&within));
        assert_eq!(root.child(2), None);
        assert_eq!(root.first_child(), Some(&seg));
        assert_eq!(root.last_child(), Some(&within));
        assert_eq!(
            root.child_of_type(0, QueryNodeType::SimpleWithin),
            Some(&within)
        );
        assert_eq!(root.child_of_type(1, QueryNodeType::SimpleWithin), None);
    }

    #[test]
    fn leaf_nodes_have_no_children() {
        assert_eq!(expr("a", "1").child_count(), 0);
        assert_eq!(QueryNode::ExpressionWildcard.child_count(), 0);
        assert_eq!(
            QueryNode::SimpleWithin(SimpleWithinScope::Text).child_count(),
            0
        );
    }

    #[test]
    fn flag_set_operations() {
        let mut flags = RegexFlags::new();
        assert!(flags.is_empty());
        flags.insert(RegexFlag::IgnoreDiacritics);
        flags.insert(RegexFlag::CaseInsensitive);
        assert!(flags.contains(RegexFlag::CaseInsensitive));
        assert!(!flags.contains(RegexFlag::CaseSensitive));

        let letters: String = flags.iter().map(RegexFlag::letter).collect();
        assert_eq!(letters, "id");
    }

    #[test]
    fn scope_keywords() {
        let table = [
            ("sentence", SimpleWithinScope::Sentence),
            ("s", SimpleWithinScope::Sentence),
            ("utterance", SimpleWithinScope::Utterance),
            ("u", SimpleWithinScope::Utterance),
            ("paragraph", SimpleWithinScope::Paragraph),
            ("p", SimpleWithinScope::Paragraph),
            ("turn", SimpleWithinScope::Turn),
            ("t", SimpleWithinScope::Turn),
            ("text", SimpleWithinScope::Text),
            ("session", SimpleWithinScope::Session),
        ];
        for (keyword, scope) in table {
            assert_eq!(SimpleWithinScope::from_keyword(keyword), Some(scope));
        }
        assert_eq!(SimpleWithinScope::from_keyword("chapter"), None);
    }

    #[test]
    fn visitor_runs_post_order() {
        struct Recorder(Vec<QueryNodeType>);

        impl QueryVisitor for Recorder {
            fn visit_expression(&mut self, node: &QueryNode) {
                self.0.push(node.node_type());
            }
            fn visit_query_segment(&mut self, node: &QueryNode) {
                self.0.push(node.node_type());
            }
            fn visit_query_sequence(&mut self, node: &QueryNode) {
                self.0.push(node.node_type());
            }
            fn visit_simple_within(&mut self, node: &QueryNode) {
                self.0.push(node.node_type());
            }
            fn visit_query_with_within(&mut self, node: &QueryNode) {
                self.0.push(node.node_type());
            }
        }

        let root = QueryNode::with_within(
            QueryNode::QuerySequence(vec![
                QueryNode::segment(expr("a", "1"), 1, Some(1)),
                QueryNode::segment(expr("b", "2"), 1, Some(1)),
            ]),
            Some(QueryNode::SimpleWithin(SimpleWithinScope::Sentence)),
        );

        let mut recorder = Recorder(Vec::new());
        root.accept(&mut recorder);
        assert_eq!(
            recorder.0,
            vec![
                QueryNodeType::Expression,
                QueryNodeType::QuerySegment,
                QueryNodeType::Expression,
                QueryNodeType::QuerySegment,
                QueryNodeType::QuerySequence,
                QueryNodeType::SimpleWithin,
                QueryNodeType::QueryWithWithin,
            ]
        );
    }

    #[test]
    fn query_string_for_segment() {
        let seg = QueryNode::segment(expr("word", "dog"), 1, Some(1));
        assert_eq!(seg.to_query_string(), "[word=\"dog\"]");
    }

    #[test]
    fn query_string_for_wildcard_and_quantifiers() {
        let wildcard = QueryNode::segment(QueryNode::ExpressionWildcard, 0, None);
        assert_eq!(wildcard.to_query_string(), "[]*");

        let ranged = QueryNode::segment(expr("pos", "V"), 2, Some(3));
        assert_eq!(ranged.to_query_string(), "[pos=\"V\"]{2,3}");

        let exact = QueryNode::segment(expr("pos", "V"), 2, Some(2));
        assert_eq!(exact.to_query_string(), "[pos=\"V\"]{2}");

        let open = QueryNode::segment(expr("pos", "V"), 2, None);
        assert_eq!(open.to_query_string(), "[pos=\"V\"]{2,}");
    }

    #[test]
    fn query_string_keeps_group_with_default_bounds() {
        let group =
            QueryNode::query_group(QueryNode::segment(expr("a", "1"), 1, Some(1)), 1, Some(1));
        assert_eq!(group.to_query_string(), "([a=\"1\"]){1}");
    }

    #[test]
    fn query_string_escapes_regex() {
        let seg = QueryNode::segment(expr("word", "say \"hi\"\n"), 1, Some(1));
        assert_eq!(seg.to_query_string(), "[word=\"say \\\"hi\\\"\\n\"]");
    }

    #[test]
    fn query_string_with_flags_and_qualifier() {
        let mut flags = RegexFlags::new();
        flags.insert(RegexFlag::IgnoreDiacritics);
        flags.insert(RegexFlag::CaseInsensitive);
        let node = QueryNode::expression(
            Some("x".to_string()),
            "word".to_string(),
            Operator::NotEquals,
            "dog".to_string(),
            Some(flags),
        );
        assert_eq!(
            QueryNode::segment(node, 1, Some(1)).to_query_string(),
            "[x:word!=\"dog\"/id]"
        );
    }

    #[test]
    fn query_string_parenthesizes_disjunction_in_sequence() {
        let seg_a = QueryNode::segment(expr("a", "1"), 1, Some(1));
        let seg_b = QueryNode::segment(expr("b", "2"), 1, Some(1));
        let seg_c = QueryNode::segment(expr("c", "3"), 1, Some(1));
        let sequence = QueryNode::QuerySequence(vec![
            QueryNode::QueryDisjunction(vec![seg_a, seg_b]),
            seg_c,
        ]);
        assert_eq!(
            sequence.to_query_string(),
            "([a=\"1\"] | [b=\"2\"]) [c=\"3\"]"
        );
    }

    #[test]
    fn query_string_with_within() {
        let root = QueryNode::with_within(
            QueryNode::segment(expr("word", "a"), 1, Some(1)),
            Some(QueryNode::SimpleWithin(SimpleWithinScope::Sentence)),
        );
        assert_eq!(root.to_query_string(), "[word=\"a\"] within sentence");
    }

    #[test]
    fn display_renders_indented_tree() {
        let root = QueryNode::segment(
            QueryNode::ExpressionOr(vec![expr("word", "cat"), expr("word", "dog")]),
            1,
            Some(1),
        );
        let rendered = root.to_string();
        assert!(rendered.starts_with("QuerySegment(1..1)\n"));
        assert!(rendered.contains("  ExpressionOr\n"));
        assert!(rendered.contains("    Expression(word = \"cat\")\n"));
    }
}
