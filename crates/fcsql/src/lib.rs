//! FCS-QL query parsing and expression trees.
//!
//! This crate parses FCS-QL, a query language for structured searches over
//! annotated text corpora:
//!
//! - **Segments**: `[word="dog"]` - one token position, one attribute condition
//! - **Wildcards**: `[]` - any token
//! - **Boolean conditions**: `[word="sera" & !pos="VERB"]` - `&`/`and`, `|`/`or`, `!`/`not`
//! - **Repetition**: `[pos="ADJ"]{1,3}` - plus `*`, `+`, `?`
//! - **Sequences**: `[word="the"] [pos="NOUN"]` - token order matters
//! - **Alternation**: `[word="cat"] | [word="dog"]`
//! - **Implicit segments**: `"run"` - the configured default attribute applied
//! - **Bounding scopes**: `[word="dog"] within sentence`
//!
//! # Example
//!
//! ```
//! use fcsql::parse;
//!
//! let root = parse("[word=\"dog\"] within s").unwrap();
//! assert_eq!(root.child_count(), 2);
//! ```
//!
//! Parsing is a pure function of the query string and the [`QueryParser`]
//! configuration. The returned tree is immutable, exclusively owned by the
//! caller, and traversed through the generic child accessors or a
//! [`QueryVisitor`].

#![warn(missing_docs)]

mod ast;
mod error;
mod escape;
mod lexer;
mod parser;

pub use ast::{
    Operator, QueryNode, QueryNodeType, QueryVisitor, RegexFlag, RegexFlags, SimpleWithinScope,
};
pub use error::{ErrorKind, QueryParserError};
pub use parser::{
    DEFAULT_IDENTIFIER, DEFAULT_OPERATOR, QueryParser, UnicodeNormalizationForm, parse,
};
