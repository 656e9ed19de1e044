use std::str::FromStr;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use tracing::debug;

use super::{
    ActionConstraint, Annotation, CedarDocument, CedarPolicy, Clause, ClauseKind, Effect,
    PolicyHead, ScopeConstraint, ScopeOperator,
};
use crate::error::PolicyError;

#[derive(Parser)]
#[grammar = "cedar/cedar.pest"]
struct CedarGrammar;

/// Parse a sequence of Cedar policies.
pub fn parse_document(text: &str) -> Result<CedarDocument, PolicyError> {
    let document = CedarGrammar::parse(Rule::document, text)?
        .next()
        .ok_or_else(|| PolicyError::parse(0, "", "empty Cedar document"))?;

    let mut policies = Vec::new();
    for pair in document.into_inner() {
        match pair.as_rule() {
            Rule::policy => policies.push(build_policy(pair)?),
            Rule::EOI => {}
            _ => return Err(unexpected(&pair)),
        }
    }

    debug!(event = "Cedar", phase = "Parsed", policies = policies.len());
    Ok(CedarDocument::new(policies))
}

fn unexpected(pair: &Pair<'_, Rule>) -> PolicyError {
    PolicyError::parse(
        pair.as_span().start(),
        pair.as_str(),
        format!("unexpected {:?}", pair.as_rule()),
    )
}

fn build_policy(pair: Pair<'_, Rule>) -> Result<CedarPolicy, PolicyError> {
    let mut annotations = Vec::new();
    let mut effect = None;
    let mut head = PolicyHead::default();
    let mut clauses = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::annotation => annotations.push(build_annotation(inner)?),
            Rule::effect => {
                effect = Some(
                    Effect::from_str(inner.as_str()).map_err(|_| unexpected(&inner))?,
                );
            }
            Rule::head => head = build_head(inner)?,
            Rule::clause => clauses.push(build_clause(inner)?),
            _ => return Err(unexpected(&inner)),
        }
    }

    Ok(CedarPolicy {
        annotations,
        effect: effect.ok_or_else(|| PolicyError::parse(0, "", "policy without effect"))?,
        head,
        clauses,
    })
}

fn build_annotation(pair: Pair<'_, Rule>) -> Result<Annotation, PolicyError> {
    let mut key = String::new();
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => key = inner.as_str().to_string(),
            Rule::string => value = Some(unquote(inner.as_str())),
            _ => return Err(unexpected(&inner)),
        }
    }
    Ok(Annotation { key, value })
}

fn build_head(pair: Pair<'_, Rule>) -> Result<PolicyHead, PolicyError> {
    let mut head = PolicyHead::default();
    for slot in pair.into_inner() {
        match slot.as_rule() {
            Rule::principal => head.principal = build_scope(slot)?,
            Rule::resource => head.resource = build_scope(slot)?,
            Rule::action => head.action = build_action(slot)?,
            _ => return Err(unexpected(&slot)),
        }
    }
    Ok(head)
}

fn build_scope(pair: Pair<'_, Rule>) -> Result<Option<ScopeConstraint>, PolicyError> {
    let mut inner = pair.into_inner();
    let Some(op) = inner.next() else {
        return Ok(None);
    };
    let operator = ScopeOperator::from_str(op.as_str()).map_err(|_| unexpected(&op))?;
    let entity = inner
        .next()
        .ok_or_else(|| PolicyError::parse(op.as_span().end(), "", "missing entity"))?;
    Ok(Some(ScopeConstraint {
        operator,
        entity: entity.as_str().to_string(),
    }))
}

fn build_action(pair: Pair<'_, Rule>) -> Result<Option<ActionConstraint>, PolicyError> {
    let Some(constraint) = pair.into_inner().next() else {
        return Ok(None);
    };
    let rule = constraint.as_rule();
    let entities: Vec<String> = constraint
        .into_inner()
        .map(|e| e.as_str().to_string())
        .collect();

    match (rule, entities.as_slice()) {
        (Rule::action_eq, [entity]) => Ok(Some(ActionConstraint::Eq(entity.clone()))),
        (Rule::action_in, _) => Ok(Some(ActionConstraint::In(entities))),
        _ => Err(PolicyError::parse(0, "action", "malformed action constraint")),
    }
}

fn build_clause(pair: Pair<'_, Rule>) -> Result<Clause, PolicyError> {
    let mut kind = None;
    let mut body = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::clause_kind => {
                kind = Some(ClauseKind::from_str(inner.as_str()).map_err(|_| unexpected(&inner))?);
            }
            Rule::body => {
                body = inner
                    .into_inner()
                    .next()
                    .map(|text| text.as_str().trim().to_string());
            }
            _ => return Err(unexpected(&inner)),
        }
    }
    match (kind, body) {
        (Some(kind), Some(body)) => Ok(Clause { kind, body }),
        _ => Err(PolicyError::parse(0, "", "malformed condition clause")),
    }
}

/// Strip the quotes of a string literal and resolve `\x` escapes.
fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
