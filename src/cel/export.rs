//! Filter AST to CEL text.

use crate::error::PolicyError;
use crate::filter::{AttributeExpression, CompareOperator, Expression, LogicalOperator, MAX_DEPTH};
use crate::names::AttributeNameMapper;

/// Render `expr` as CEL. Trees deeper than [`MAX_DEPTH`] are rejected.
pub(super) fn emit(expr: &Expression, names: &AttributeNameMapper) -> Result<String, PolicyError> {
    render(expr, names, false, 1)
}

/// `under_and` is set while rendering an operand of `&&`, where a bare `||`
/// needs parentheses to keep its grouping.
fn render(
    expr: &Expression,
    names: &AttributeNameMapper,
    under_and: bool,
    depth: usize,
) -> Result<String, PolicyError> {
    if depth > MAX_DEPTH {
        return Err(PolicyError::UnsupportedShape(format!(
            "expression nested deeper than {MAX_DEPTH} levels"
        )));
    }
    let child = depth + 1;
    match expr {
        Expression::Attribute(attr) => emit_attribute(attr, names),
        Expression::Logical {
            operator: LogicalOperator::And,
            left,
            right,
        } => Ok(format!(
            "{} && {}",
            render(left, names, true, child)?,
            render(right, names, true, child)?
        )),
        Expression::Logical {
            operator: LogicalOperator::Or,
            left,
            right,
        } => {
            let cel = format!(
                "{} || {}",
                render(left, names, false, child)?,
                render(right, names, false, child)?
            );
            Ok(if under_and { format!("({cel})") } else { cel })
        }
        Expression::Not(inner) => match inner.unparenthesized() {
            Expression::Attribute(attr) if !is_function_style(attr.operator) => {
                Ok(format!("!({})", emit_attribute(attr, names)?))
            }
            core @ Expression::Logical { .. } => {
                Ok(format!("!({})", render(core, names, false, child)?))
            }
            core => Ok(format!("!{}", render(core, names, false, child)?)),
        },
        Expression::Precedence(inner) => {
            Ok(format!("({})", render(inner, names, false, child)?))
        }
        Expression::ValuePath { path, .. } => Err(PolicyError::UnsupportedShape(format!(
            "value path filter on '{path}' has no CEL form"
        ))),
    }
}

fn is_function_style(operator: CompareOperator) -> bool {
    matches!(
        operator,
        CompareOperator::Pr | CompareOperator::Sw | CompareOperator::Ew | CompareOperator::Co
    )
}

fn emit_attribute(
    attr: &AttributeExpression,
    names: &AttributeNameMapper,
) -> Result<String, PolicyError> {
    let path = names.try_to_provider(&attr.path)?;

    let value = match (&attr.value, attr.operator) {
        (_, CompareOperator::Pr) => return Ok(format!("has({path})")),
        // CEL and SCIM share literal syntax for strings, numbers, booleans and lists.
        (Some(value), _) => value.to_string(),
        (None, op) => {
            return Err(PolicyError::UnsupportedShape(format!(
                "operator '{op}' on '{path}' has no value"
            )));
        }
    };

    let cel = match attr.operator {
        CompareOperator::Eq => format!("{path} == {value}"),
        CompareOperator::Ne => format!("{path} != {value}"),
        CompareOperator::Gt => format!("{path} > {value}"),
        CompareOperator::Ge => format!("{path} >= {value}"),
        CompareOperator::Lt => format!("{path} < {value}"),
        CompareOperator::Le => format!("{path} <= {value}"),
        CompareOperator::Sw => format!("{path}.startsWith({value})"),
        CompareOperator::Ew => format!("{path}.endsWith({value})"),
        CompareOperator::Co => format!("{path}.contains({value})"),
        CompareOperator::In => format!("{path} in {value}"),
        CompareOperator::Pr => format!("has({path})"),
    };
    Ok(cel)
}
