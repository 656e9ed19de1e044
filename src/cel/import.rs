//! CEL text to filter AST, walking the tree produced by `cel-parser`.

use cel_parser::{Atom, Expression as Cel, Member, RelationOp, UnaryOp};

use crate::error::PolicyError;
use crate::filter::{CompareOperator, Expression, MAX_DEPTH, Value};
use crate::names::AttributeNameMapper;

pub(super) fn parse_cel(
    text: &str,
    names: &AttributeNameMapper,
) -> Result<Expression, PolicyError> {
    // Offsets are not carried over from the CEL parser; the whole input is
    // reported at position 0.
    let parsed = cel_parser::parse(text)
        .map_err(|e| PolicyError::parse(0, text, format!("invalid CEL: {e}")))?;
    Walker { names }.map(&parsed, false, 1)
}

struct Walker<'a> {
    names: &'a AttributeNameMapper,
}

impl Walker<'_> {
    /// `child` is set for operands of `&&`; an `||` found there was
    /// parenthesized in the source and gets a precedence node back.
    fn map(&self, expr: &Cel, child: bool, depth: usize) -> Result<Expression, PolicyError> {
        if depth > MAX_DEPTH {
            return Err(PolicyError::UnsupportedShape(format!(
                "CEL expression nested deeper than {MAX_DEPTH} levels"
            )));
        }
        let next = depth + 1;
        match expr {
            Cel::And(left, right) => Ok(Expression::and(
                self.map(left, true, next)?,
                self.map(right, true, next)?,
            )),
            Cel::Or(left, right) => {
                let or = Expression::or(
                    self.map(left, false, next)?,
                    self.map(right, false, next)?,
                );
                Ok(if child { Expression::precedence(or) } else { or })
            }
            Cel::Unary(UnaryOp::Not, inner) => {
                Ok(Expression::negate(self.map(inner, false, next)?))
            }
            Cel::Unary(UnaryOp::DoubleNot, inner) => Ok(Expression::negate(Expression::negate(
                self.map(inner, false, next)?,
            ))),
            Cel::Relation(left, op, right) => self.map_relation(left, op, right),
            Cel::FunctionCall(function, target, args) => {
                self.map_call(function, target.as_deref(), args)
            }
            other => Err(PolicyError::UnsupportedShape(format!(
                "CEL expression {other:?} is not a condition"
            ))),
        }
    }

    fn map_relation(
        &self,
        left: &Cel,
        op: &RelationOp,
        right: &Cel,
    ) -> Result<Expression, PolicyError> {
        let operator = match op {
            RelationOp::Equals => CompareOperator::Eq,
            RelationOp::NotEquals => CompareOperator::Ne,
            RelationOp::LessThan => CompareOperator::Lt,
            RelationOp::LessThanEq => CompareOperator::Le,
            RelationOp::GreaterThan => CompareOperator::Gt,
            RelationOp::GreaterThanEq => CompareOperator::Ge,
            RelationOp::In => CompareOperator::In,
        };
        let value = constant(right)?;

        // `!a == v` is read as `not(a eq v)`.
        if let Cel::Unary(UnaryOp::Not, negated) = left {
            let path = self.path(negated)?;
            return Ok(Expression::negate(Expression::attribute(path, operator, value)));
        }

        Ok(Expression::attribute(self.path(left)?, operator, value))
    }

    fn map_call(
        &self,
        function: &Cel,
        target: Option<&Cel>,
        args: &[Cel],
    ) -> Result<Expression, PolicyError> {
        let Cel::Ident(name) = function else {
            return Err(PolicyError::UnsupportedShape(format!(
                "call target {function:?} is not a function name"
            )));
        };

        let operator = match name.as_str() {
            "has" => {
                return match (target, args) {
                    (None, [arg]) => Ok(Expression::present(self.path(arg)?)),
                    _ => Err(PolicyError::UnsupportedShape(
                        "has() takes exactly one attribute".to_string(),
                    )),
                };
            }
            "startsWith" => CompareOperator::Sw,
            "endsWith" => CompareOperator::Ew,
            "contains" => CompareOperator::Co,
            other => return Err(PolicyError::UnsupportedOperator(other.to_string())),
        };

        match (target, args) {
            (Some(receiver), [arg]) => Ok(Expression::attribute(
                self.path(receiver)?,
                operator,
                constant(arg)?,
            )),
            _ => Err(PolicyError::UnsupportedShape(format!(
                "{name}() needs a receiver and one argument"
            ))),
        }
    }

    /// Dotted attribute path of an identifier or select chain, in IDQL names.
    fn path(&self, expr: &Cel) -> Result<String, PolicyError> {
        self.names.try_to_idql(&select_path(expr)?)
    }
}

fn select_path(expr: &Cel) -> Result<String, PolicyError> {
    match expr {
        Cel::Ident(name) => Ok(name.to_string()),
        Cel::Member(inner, member) => match member.as_ref() {
            Member::Attribute(name) => Ok(format!("{}.{}", select_path(inner)?, name)),
            other => Err(PolicyError::UnsupportedShape(format!(
                "member access {other:?} is not an attribute path"
            ))),
        },
        other => Err(PolicyError::UnsupportedShape(format!(
            "{other:?} is not an attribute path"
        ))),
    }
}

fn constant(expr: &Cel) -> Result<Value, PolicyError> {
    match expr {
        Cel::Atom(atom) => atom_value(atom, false),
        Cel::Unary(UnaryOp::Minus, inner) => match inner.as_ref() {
            Cel::Atom(atom) => atom_value(atom, true),
            other => Err(malformed(other)),
        },
        Cel::List(items) => Ok(Value::List(
            items.iter().map(constant).collect::<Result<_, _>>()?,
        )),
        other => Err(malformed(other)),
    }
}

fn atom_value(atom: &Atom, negative: bool) -> Result<Value, PolicyError> {
    let value = match atom {
        Atom::Int(i) => Value::Integer(if negative { -*i } else { *i }),
        Atom::UInt(u) => {
            let i = i64::try_from(*u).map_err(|_| {
                PolicyError::UnsupportedShape(format!("constant {u} is out of range"))
            })?;
            Value::Integer(if negative { -i } else { i })
        }
        Atom::Float(x) => Value::Float(if negative { -*x } else { *x }),
        Atom::String(s) if !negative => Value::String(s.to_string()),
        Atom::Bool(b) if !negative => Value::Boolean(*b),
        other => {
            return Err(PolicyError::UnsupportedShape(format!(
                "constant {other:?} cannot be used in a condition"
            )));
        }
    };
    Ok(value)
}

fn malformed(expr: &Cel) -> PolicyError {
    PolicyError::UnsupportedShape(format!("expected a constant, found {expr:?}"))
}
