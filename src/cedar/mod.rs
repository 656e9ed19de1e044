//! Cedar policy documents: a typed view of the header and clause structure.
//!
//! Entities are kept as the exact text that appeared in the source, and
//! clause bodies are opaque CEL-subset strings handed to [`crate::cel`].
//!
//! Canonical print form, one policy per block:
//!
//! ```text
//! @id("p1")
//! permit(principal == User::"alice", action in [Action::"view", Action::"edit"], resource)
//! when { level > 5 };
//! ```

mod loader;
mod parser;

use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::error::PolicyError;

pub use loader::compile_policy;
pub use parser::{Rule, parse_document};

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
pub enum Effect {
    Permit,
    Forbid,
}

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
pub enum ClauseKind {
    When,
    Unless,
}

/// `==` or `in` in a principal or resource slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, StrumDisplay)]
pub enum ScopeOperator {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "in", ascii_case_insensitive)]
    In,
}

impl ScopeOperator {
    /// Whether the operator matches members of the entity.
    pub fn is_membership(&self) -> bool {
        *self == ScopeOperator::In
    }
}

/// A constrained principal or resource slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeConstraint {
    pub operator: ScopeOperator,
    pub entity: String,
}

impl ScopeConstraint {
    pub fn equals(entity: impl Into<String>) -> Self {
        ScopeConstraint {
            operator: ScopeOperator::Eq,
            entity: entity.into(),
        }
    }

    pub fn member_of(entity: impl Into<String>) -> Self {
        ScopeConstraint {
            operator: ScopeOperator::In,
            entity: entity.into(),
        }
    }
}

/// A constrained action slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionConstraint {
    Eq(String),
    In(Vec<String>),
}

impl ActionConstraint {
    pub fn entities(&self) -> Vec<&str> {
        match self {
            ActionConstraint::Eq(entity) => vec![entity.as_str()],
            ActionConstraint::In(entities) => entities.iter().map(String::as_str).collect(),
        }
    }
}

/// `principal, action, resource`; `None` leaves the slot unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyHead {
    pub principal: Option<ScopeConstraint>,
    pub action: Option<ActionConstraint>,
    pub resource: Option<ScopeConstraint>,
}

impl Display for PolicyHead {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.principal {
            Some(c) => write!(f, "principal {} {}", c.operator, c.entity)?,
            None => write!(f, "principal")?,
        }
        match &self.action {
            Some(ActionConstraint::Eq(entity)) => write!(f, ", action == {entity}")?,
            Some(ActionConstraint::In(entities)) => {
                write!(f, ", action in [{}]", entities.iter().join(", "))?
            }
            None => write!(f, ", action")?,
        }
        match &self.resource {
            Some(c) => write!(f, ", resource {} {}", c.operator, c.entity),
            None => write!(f, ", resource"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    pub kind: ClauseKind,
    pub body: String,
}

impl Clause {
    pub fn when(body: impl Into<String>) -> Self {
        Clause {
            kind: ClauseKind::When,
            body: body.into(),
        }
    }

    pub fn unless(body: impl Into<String>) -> Self {
        Clause {
            kind: ClauseKind::Unless,
            body: body.into(),
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {{ {} }}", self.kind, self.body)
    }
}

/// `@key("value")` ahead of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CedarPolicy {
    pub annotations: Vec<Annotation>,
    pub effect: Effect,
    pub head: PolicyHead,
    pub clauses: Vec<Clause>,
}

impl CedarPolicy {
    pub fn new(effect: Effect, head: PolicyHead) -> Self {
        CedarPolicy {
            annotations: Vec::new(),
            effect,
            head,
            clauses: Vec::new(),
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.annotations.push(Annotation {
            key: key.into(),
            value,
        });
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }
}

impl Display for CedarPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for annotation in &self.annotations {
            match &annotation.value {
                Some(value) => writeln!(
                    f,
                    "@{}({})",
                    annotation.key,
                    crate::filter::Value::from(value.as_str())
                )?,
                None => writeln!(f, "@{}", annotation.key)?,
            }
        }
        write!(f, "{}({})", self.effect, self.head)?;
        for clause in &self.clauses {
            write!(f, "\n{clause}")?;
        }
        write!(f, ";")
    }
}

/// A parsed sequence of Cedar policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CedarDocument {
    pub policies: Vec<CedarPolicy>,
}

impl CedarDocument {
    pub fn new(policies: Vec<CedarPolicy>) -> Self {
        CedarDocument { policies }
    }

    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        parse_document(text)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Check the printed document against the reference Cedar parser.
    pub fn validate(&self) -> Result<(), PolicyError> {
        compile_policy(&self.to_string()).map(|_| ())
    }
}

impl Display for CedarDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.policies.iter().join("\n\n"))
    }
}
