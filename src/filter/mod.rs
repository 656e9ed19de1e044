//! SCIM-style condition filters (RFC 7644 section 3.4.2.2).
//!
//! The AST is a closed sum. `Display` is the canonical serializer: operators
//! print lower-case, strings are double-quoted, numbers and booleans are bare,
//! and explicit parentheses survive as [`Expression::Precedence`].

mod parser;
mod value;

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

pub use parser::parse;
pub use value::Value;

/// Deepest expression tree accepted by the parser and the CEL mapper.
pub const MAX_DEPTH: usize = 512;

/// Comparison operators of an attribute expression.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CompareOperator {
    Pr,
    Eq,
    Ne,
    Co,
    Sw,
    Ew,
    Gt,
    Lt,
    Ge,
    Le,
    In,
}

/// `and` / `or`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

/// `path operator value`, or `path pr` when `value` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeExpression {
    pub path: String,
    pub operator: CompareOperator,
    pub value: Option<Value>,
}

impl AttributeExpression {
    pub fn new(path: impl Into<String>, operator: CompareOperator, value: Value) -> Self {
        AttributeExpression {
            path: path.into(),
            operator,
            value: Some(value),
        }
    }

    pub fn present(path: impl Into<String>) -> Self {
        AttributeExpression {
            path: path.into(),
            operator: CompareOperator::Pr,
            value: None,
        }
    }
}

impl Display for AttributeExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.value {
            Some(value) if self.operator != CompareOperator::Pr => {
                write!(f, "{} {} {}", self.path, self.operator, value)
            }
            _ => write!(f, "{} pr", self.path),
        }
    }
}

/// A filter expression. Children are owned; the tree has no back edges.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Attribute(AttributeExpression),
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    /// Author-written parentheses.
    Precedence(Box<Expression>),
    /// `emails[type eq "work"]`; names inside `filter` are relative to `path`.
    ValuePath {
        path: String,
        filter: Box<Expression>,
    },
}

impl Expression {
    pub fn attribute(path: impl Into<String>, operator: CompareOperator, value: Value) -> Self {
        Expression::Attribute(AttributeExpression::new(path, operator, value))
    }

    pub fn present(path: impl Into<String>) -> Self {
        Expression::Attribute(AttributeExpression::present(path))
    }

    pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Self {
        Expression::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::logical(LogicalOperator::Or, left, right)
    }

    pub fn negate(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn precedence(inner: Expression) -> Self {
        Expression::Precedence(Box::new(inner))
    }

    pub fn value_path(path: impl Into<String>, filter: Expression) -> Self {
        Expression::ValuePath {
            path: path.into(),
            filter: Box::new(filter),
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Expression::Logical { .. })
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((expr, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            match expr {
                Expression::Attribute(_) => {}
                Expression::Logical { left, right, .. } => {
                    pending.push((left.as_ref(), depth + 1));
                    pending.push((right.as_ref(), depth + 1));
                }
                Expression::Not(inner) | Expression::Precedence(inner) => {
                    pending.push((inner.as_ref(), depth + 1));
                }
                Expression::ValuePath { filter, .. } => pending.push((filter.as_ref(), depth + 1)),
            }
        }
        deepest
    }

    /// The expression under one level of author parentheses, if any.
    pub fn unparenthesized(&self) -> &Expression {
        match self {
            Expression::Precedence(inner) => inner.as_ref(),
            other => other,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Expression::Attribute(attr) => write!(f, "{attr}"),
            Expression::Logical {
                operator,
                left,
                right,
            } => write!(f, "{left} {operator} {right}"),
            Expression::Not(inner) => match inner.unparenthesized() {
                core @ Expression::Logical { .. } => write!(f, "not ({core})"),
                core => write!(f, "not({core})"),
            },
            Expression::Precedence(inner) => write!(f, "({inner})"),
            Expression::ValuePath { path, filter } => write!(f, "{path}[{filter}]"),
        }
    }
}
