//! IDQL <-> Cedar.
//!
//! Export fans a policy out into one Cedar policy per subject. Import folds
//! the clauses of each Cedar policy back into a single IDQL condition.

use tracing::{debug, info};

use crate::cedar::{
    ActionConstraint, CedarDocument, CedarPolicy, Clause, ClauseKind, Effect, PolicyHead,
    ScopeConstraint,
};
use crate::cel::CelMapper;
use crate::error::PolicyError;
use crate::filter::{CompareOperator, Expression, LogicalOperator, Value};
use crate::names::AttributeNameMapper;
use crate::traits::PolicyMapper;
use crate::types::{
    ANY, ANY_AUTHENTICATED, ConditionAction, ConditionInfo, EntityKind, MetaInfo, PolicyInfo,
    Subject,
};

/// Clause prepended to policies whose subject only requires authentication.
pub const AUTHENTICATED_CLAUSE: &str = "context.authenticated == true";

const CEDAR_ACTION_PREFIX: &str = "cedar:";
const ACTION_ENTITY_PREFIX: &str = "Action::\"";
const ID_ANNOTATION: &str = "id";
const DESCRIPTION_ANNOTATION: &str = "description";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CedarMapperOptions {
    /// Entity kinds matched with `in` rather than `==`.
    pub container_types: Vec<String>,
}

impl Default for CedarMapperOptions {
    fn default() -> Self {
        CedarMapperOptions {
            container_types: ["group", "domain", "role", "tenant", "folder", "directory"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CedarPolicyMapper {
    cel: CelMapper,
    options: CedarMapperOptions,
}

impl CedarPolicyMapper {
    pub fn new(names: AttributeNameMapper) -> Self {
        CedarPolicyMapper {
            cel: CelMapper::new(names),
            options: CedarMapperOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CedarMapperOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CedarMapperOptions {
        &self.options
    }

    /// One IDQL policy to one Cedar policy per subject.
    pub fn map_policy(&self, policy: &PolicyInfo) -> Result<Vec<CedarPolicy>, PolicyError> {
        let action = action_constraint(&policy.actions);
        let resource = self.scope_constraint(&policy.object);
        let condition = match &policy.condition {
            Some(condition) => {
                let body = self.cel.filter_to_cel(&condition.rule)?;
                Some(match condition.action {
                    ConditionAction::Allow => Clause::when(body),
                    ConditionAction::Deny => Clause::unless(body),
                })
            }
            None => None,
        };

        let any = [ANY.to_string()];
        let subjects = if policy.subjects.is_empty() {
            &any[..]
        } else {
            &policy.subjects[..]
        };

        let mut mapped = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let mut clauses = Vec::new();
            let principal = match Subject::classify(subject, &self.options.container_types) {
                Subject::Any => None,
                Subject::AnyAuthenticated => {
                    clauses.push(Clause::when(AUTHENTICATED_CLAUSE));
                    None
                }
                Subject::Single(entity) => Some(ScopeConstraint::equals(entity)),
                Subject::Container(entity) => Some(ScopeConstraint::member_of(entity)),
            };
            clauses.extend(condition.iter().cloned());

            let mut cedar = CedarPolicy::new(
                Effect::Permit,
                PolicyHead {
                    principal,
                    action: action.clone(),
                    resource: resource.clone(),
                },
            );
            cedar.clauses = clauses;
            if let Some(id) = &policy.meta.policy_id {
                cedar = cedar.with_annotation(ID_ANNOTATION, Some(id.clone()));
            }
            if let Some(description) = &policy.meta.description {
                cedar = cedar.with_annotation(DESCRIPTION_ANNOTATION, Some(description.clone()));
            }
            mapped.push(cedar);
        }

        debug!(
            event = "Mapper",
            phase = "Export",
            provider = "cedar",
            policy = %policy,
            fan_out = mapped.len()
        );
        Ok(mapped)
    }

    /// One Cedar policy back to IDQL.
    pub fn map_cedar_policy(&self, policy: &CedarPolicy) -> Result<PolicyInfo, PolicyError> {
        let mut clauses = &policy.clauses[..];
        let subjects = match &policy.head.principal {
            Some(constraint) => vec![constraint.entity.clone()],
            None => match clauses.split_first() {
                Some((first, rest)) if is_authenticated_clause(first) => {
                    clauses = rest;
                    vec![ANY_AUTHENTICATED.to_string()]
                }
                _ => vec![ANY.to_string()],
            },
        };

        let actions = policy
            .head
            .action
            .as_ref()
            .map(|a| a.entities().into_iter().map(action_name).collect())
            .unwrap_or_default();

        let object = policy
            .head
            .resource
            .as_ref()
            .map(|r| r.entity.clone())
            .unwrap_or_default();

        let idql = PolicyInfo {
            meta: MetaInfo {
                policy_id: policy.annotation(ID_ANNOTATION).map(str::to_string),
                description: policy
                    .annotation(DESCRIPTION_ANNOTATION)
                    .map(str::to_string),
                ..MetaInfo::default()
            },
            subjects,
            actions,
            object,
            condition: self.fold_clauses(policy.effect, clauses)?,
        };

        debug!(event = "Mapper", phase = "Import", provider = "cedar", policy = %idql);
        Ok(idql)
    }

    pub fn to_cedar_text(&self, policies: &[PolicyInfo]) -> Result<String, PolicyError> {
        Ok(self.to_target(policies)?.to_string())
    }

    pub fn from_cedar_text(&self, text: &str) -> Result<Vec<PolicyInfo>, PolicyError> {
        self.to_idql(&CedarDocument::parse(text)?)
    }

    fn scope_constraint(&self, entity: &str) -> Option<ScopeConstraint> {
        let entity = entity.trim();
        if entity.is_empty() {
            return None;
        }
        Some(
            match EntityKind::of(entity, &self.options.container_types) {
                EntityKind::Single => ScopeConstraint::equals(entity),
                EntityKind::Container => ScopeConstraint::member_of(entity),
            },
        )
    }

    /// A single clause keeps its own polarity. Several clauses are and-ed,
    /// with `unless` bodies negated, and take their polarity from the effect.
    fn fold_clauses(
        &self,
        effect: Effect,
        clauses: &[Clause],
    ) -> Result<Option<ConditionInfo>, PolicyError> {
        let forbid = effect == Effect::Forbid;
        match clauses {
            [] if forbid => Err(PolicyError::UnsupportedShape(
                "unconditional forbid has no IDQL equivalent".to_string(),
            )),
            [] => Ok(None),
            [clause] => {
                let rule = self.cel.cel_to_filter(&clause.body)?;
                let unless = clause.kind == ClauseKind::Unless;
                Ok(Some(condition(rule, forbid != unless)))
            }
            _ => {
                let mut folded: Option<Expression> = None;
                for clause in clauses {
                    let expr = self.cel.from_cel(&clause.body)?;
                    let term = match clause.kind {
                        ClauseKind::Unless => Expression::negate(expr),
                        ClauseKind::When if is_or(&expr) => Expression::precedence(expr),
                        ClauseKind::When => expr,
                    };
                    folded = Some(match folded {
                        Some(acc) => Expression::and(acc, term),
                        None => term,
                    });
                }
                Ok(folded.map(|expr| condition(expr.to_string(), forbid)))
            }
        }
    }
}

impl PolicyMapper for CedarPolicyMapper {
    type Target = CedarDocument;

    fn name(&self) -> &'static str {
        "cedar"
    }

    fn to_target(&self, policies: &[PolicyInfo]) -> Result<CedarDocument, PolicyError> {
        let mut mapped = Vec::new();
        for policy in policies {
            mapped.extend(self.map_policy(policy)?);
        }
        info!(
            event = "Mapper",
            phase = "Export",
            provider = self.name(),
            policies = policies.len(),
            cedar_policies = mapped.len()
        );
        Ok(CedarDocument::new(mapped))
    }

    fn to_idql(&self, document: &CedarDocument) -> Result<Vec<PolicyInfo>, PolicyError> {
        let policies = document
            .policies
            .iter()
            .map(|p| self.map_cedar_policy(p))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            event = "Mapper",
            phase = "Import",
            provider = self.name(),
            cedar_policies = document.len(),
            policies = policies.len()
        );
        Ok(policies)
    }
}

fn condition(rule: String, deny: bool) -> ConditionInfo {
    if deny {
        ConditionInfo::deny(rule)
    } else {
        ConditionInfo::allow(rule)
    }
}

fn is_or(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Logical {
            operator: LogicalOperator::Or,
            ..
        }
    )
}

/// A `when` clause whose body reads as `context.authenticated == true`,
/// however it is spaced or parenthesized.
fn is_authenticated_clause(clause: &Clause) -> bool {
    if clause.kind != ClauseKind::When {
        return false;
    }
    let authenticated =
        Expression::attribute("context.authenticated", CompareOperator::Eq, Value::Boolean(true));
    CelMapper::default()
        .from_cel(&clause.body)
        .is_ok_and(|body| body.unparenthesized() == &authenticated)
}

/// `view` becomes `Action::"view"`, `cedar:` is stripped, and anything that
/// already names an entity is kept verbatim.
fn action_entity(action: &str) -> String {
    let action = action
        .strip_prefix(CEDAR_ACTION_PREFIX)
        .unwrap_or(action);
    if action.contains("::") {
        action.to_string()
    } else {
        format!("{ACTION_ENTITY_PREFIX}{action}\"")
    }
}

fn action_constraint(actions: &[String]) -> Option<ActionConstraint> {
    match actions {
        [] => None,
        [action] => Some(ActionConstraint::Eq(action_entity(action))),
        _ => Some(ActionConstraint::In(
            actions.iter().map(|a| action_entity(a)).collect(),
        )),
    }
}

fn action_name(entity: &str) -> String {
    entity
        .strip_prefix(ACTION_ENTITY_PREFIX)
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|id| !id.contains('"'))
        .unwrap_or(entity)
        .to_string()
}
