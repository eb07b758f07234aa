//! Attribute filter expressions.
//!
//! Requirements select capabilities, service queries select
//! registrations and listener subscriptions select events — all by the
//! same small predicate language over attribute maps:
//!
//! ```text
//! filter  := "(" expr ")"
//! expr    := "&" filter+            conjunction
//!          | "|" filter+            disjunction
//!          | "!" filter             negation
//!          | key op literal         comparison
//! op      := "=" | ">=" | "<="
//! ```
//!
//! `(key=*)` tests presence; a trailing `*` in an equality literal is a
//! prefix match. `>=`/`<=` compare in the attribute's own domain, so
//! `(version>=1.10)` against a version-typed attribute uses version
//! ordering, not string ordering.
//!
//! # Example
//!
//! ```
//! use loam_types::{Attrs, AttrValue, Filter, Version};
//!
//! let filter = Filter::parse("(&(ns=pkg.http)(version>=1.2))").unwrap();
//!
//! let mut attrs = Attrs::new();
//! attrs.insert("ns".into(), AttrValue::from("pkg.http"));
//! attrs.insert("version".into(), AttrValue::Version(Version::new(1, 4, 0)));
//! assert!(filter.matches(&attrs));
//!
//! attrs.insert("version".into(), AttrValue::Version(Version::new(1, 0, 0)));
//! assert!(!filter.matches(&attrs));
//! ```

use crate::{Attrs, ErrorCode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error produced when parsing a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The input was empty.
    #[error("empty filter expression")]
    Empty,

    /// A parenthesis was missing or unbalanced.
    #[error("unbalanced parentheses at byte {0}")]
    Unbalanced(usize),

    /// A comparison clause was malformed.
    #[error("invalid clause '{0}'")]
    InvalidClause(String),

    /// Trailing characters after the top-level expression.
    #[error("trailing input '{0}'")]
    TrailingInput(String),

    /// An operator list (`&`, `|`) had no operands.
    #[error("operator '{0}' requires at least one operand")]
    MissingOperand(char),
}

impl ErrorCode for FilterError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "FILTER_EMPTY",
            Self::Unbalanced(_) => "FILTER_UNBALANCED",
            Self::InvalidClause(_) => "FILTER_INVALID_CLAUSE",
            Self::TrailingInput(_) => "FILTER_TRAILING_INPUT",
            Self::MissingOperand(_) => "FILTER_MISSING_OPERAND",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Comparison operator in a leaf clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equality; supports `*` presence and trailing-`*` prefix match.
    Eq,
    /// Greater-or-equal in the attribute's own domain.
    Ge,
    /// Less-or-equal in the attribute's own domain.
    Le,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// All sub-filters must match.
    And(Vec<Filter>),
    /// At least one sub-filter must match.
    Or(Vec<Filter>),
    /// The sub-filter must not match.
    Not(Box<Filter>),
    /// Leaf comparison against one attribute.
    Compare {
        /// Attribute key.
        key: String,
        /// Comparison operator.
        op: CompareOp,
        /// Literal right-hand side, uninterpreted until matched.
        literal: String,
    },
}

impl Filter {
    /// Parses a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] on syntax errors; the whole input must
    /// be a single parenthesised expression.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FilterError::Empty);
        }

        let bytes = text.as_bytes();
        let (filter, consumed) = parse_filter(bytes, 0)?;
        if consumed != bytes.len() {
            return Err(FilterError::TrailingInput(text[consumed..].to_string()));
        }
        Ok(filter)
    }

    /// Evaluates this filter against an attribute map.
    ///
    /// A missing attribute fails any comparison on it (including
    /// negated ones only via the enclosing `!`).
    #[must_use]
    pub fn matches(&self, attrs: &Attrs) -> bool {
        match self {
            Self::And(subs) => subs.iter().all(|f| f.matches(attrs)),
            Self::Or(subs) => subs.iter().any(|f| f.matches(attrs)),
            Self::Not(sub) => !sub.matches(attrs),
            Self::Compare { key, op, literal } => {
                let Some(value) = attrs.get(key) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => match_eq(value, literal),
                    CompareOp::Ge => match_ordered(value, literal, Ordering::Greater),
                    CompareOp::Le => match_ordered(value, literal, Ordering::Less),
                }
            }
        }
    }
}

fn match_eq(value: &crate::AttrValue, literal: &str) -> bool {
    if literal == "*" {
        return true; // Presence test.
    }
    if let Some(prefix) = literal.strip_suffix('*') {
        // Prefix match is a string-domain operation.
        return value.to_string().starts_with(prefix);
    }
    match value.coerce(literal) {
        Some(rhs) => value.partial_cmp_same_type(&rhs) == Some(Ordering::Equal),
        None => false,
    }
}

fn match_ordered(value: &crate::AttrValue, literal: &str, allowed: Ordering) -> bool {
    match value.coerce(literal) {
        Some(rhs) => matches!(
            value.partial_cmp_same_type(&rhs),
            Some(ord) if ord == allowed || ord == Ordering::Equal
        ),
        None => false,
    }
}

/// Parses one `( ... )` group starting at `pos`; returns the filter and
/// the byte offset just past the closing parenthesis.
fn parse_filter(bytes: &[u8], pos: usize) -> Result<(Filter, usize), FilterError> {
    if bytes.get(pos) != Some(&b'(') {
        return Err(FilterError::Unbalanced(pos));
    }
    let mut cursor = pos + 1;

    match bytes.get(cursor) {
        Some(b'&') | Some(b'|') => {
            let operator = bytes[cursor] as char;
            cursor += 1;
            let mut subs = Vec::new();
            while bytes.get(cursor) == Some(&b'(') {
                let (sub, next) = parse_filter(bytes, cursor)?;
                subs.push(sub);
                cursor = next;
            }
            if subs.is_empty() {
                return Err(FilterError::MissingOperand(operator));
            }
            if bytes.get(cursor) != Some(&b')') {
                return Err(FilterError::Unbalanced(cursor));
            }
            let filter = if operator == '&' {
                Filter::And(subs)
            } else {
                Filter::Or(subs)
            };
            Ok((filter, cursor + 1))
        }
        Some(b'!') => {
            let (sub, next) = parse_filter(bytes, cursor + 1)?;
            if bytes.get(next) != Some(&b')') {
                return Err(FilterError::Unbalanced(next));
            }
            Ok((Filter::Not(Box::new(sub)), next + 1))
        }
        _ => parse_clause(bytes, cursor),
    }
}

/// Parses a leaf `key op literal` clause up to its closing parenthesis.
fn parse_clause(bytes: &[u8], start: usize) -> Result<(Filter, usize), FilterError> {
    let close = bytes[start..]
        .iter()
        .position(|&b| b == b')')
        .map(|off| start + off)
        .ok_or(FilterError::Unbalanced(start))?;

    let clause = std::str::from_utf8(&bytes[start..close])
        .map_err(|_| FilterError::InvalidClause(String::from_utf8_lossy(&bytes[start..close]).into_owned()))?;

    let (key, op, literal) = if let Some((k, v)) = clause.split_once(">=") {
        (k, CompareOp::Ge, v)
    } else if let Some((k, v)) = clause.split_once("<=") {
        (k, CompareOp::Le, v)
    } else if let Some((k, v)) = clause.split_once('=') {
        (k, CompareOp::Eq, v)
    } else {
        return Err(FilterError::InvalidClause(clause.to_string()));
    };

    let key = key.trim();
    if key.is_empty() || key.contains(['(', ')', '&', '|', '!']) {
        return Err(FilterError::InvalidClause(clause.to_string()));
    }

    Ok((
        Filter::Compare {
            key: key.to_string(),
            op,
            literal: literal.trim().to_string(),
        },
        close + 1,
    ))
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(subs) => {
                write!(f, "(&")?;
                for sub in subs {
                    write!(f, "{sub}")?;
                }
                write!(f, ")")
            }
            Self::Or(subs) => {
                write!(f, "(|")?;
                for sub in subs {
                    write!(f, "{sub}")?;
                }
                write!(f, ")")
            }
            Self::Not(sub) => write!(f, "(!{sub})"),
            Self::Compare { key, op, literal } => {
                let op = match op {
                    CompareOp::Eq => "=",
                    CompareOp::Ge => ">=",
                    CompareOp::Le => "<=",
                };
                write!(f, "({key}{op}{literal})")
            }
        }
    }
}
