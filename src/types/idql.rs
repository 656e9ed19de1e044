//! The IDQL policy document.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use crate::error::PolicyError;

/// Version stamped on policies created by an import.
pub const IDQL_VERSION: &str = "0.7";

/// `{ "policies": [ ... ] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Policies {
    pub policies: Vec<PolicyInfo>,
}

impl Policies {
    pub fn new(policies: Vec<PolicyInfo>) -> Self {
        Policies { policies }
    }

    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, PolicyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetaInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for MetaInfo {
    fn default() -> Self {
        MetaInfo {
            version: IDQL_VERSION.to_string(),
            policy_id: None,
            description: None,
        }
    }
}

/// Effect of a condition when its rule matches. Defaults to `allow`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ConditionAction {
    #[default]
    Allow,
    Deny,
}

/// A SCIM filter rule plus the effect it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConditionInfo {
    pub rule: String,
    #[serde(default)]
    pub action: ConditionAction,
}

impl ConditionInfo {
    pub fn allow(rule: impl Into<String>) -> Self {
        ConditionInfo {
            rule: rule.into(),
            action: ConditionAction::Allow,
        }
    }

    pub fn deny(rule: impl Into<String>) -> Self {
        ConditionInfo {
            rule: rule.into(),
            action: ConditionAction::Deny,
        }
    }
}

/// One IDQL policy. A missing condition means unconditional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PolicyInfo {
    #[serde(default)]
    pub meta: MetaInfo,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionInfo>,
}

impl PolicyInfo {
    pub fn new<S, A>(subjects: S, actions: A, object: impl Into<String>) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        PolicyInfo {
            meta: MetaInfo::default(),
            subjects: subjects.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().map(Into::into).collect(),
            object: object.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: ConditionInfo) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.meta.policy_id = Some(policy_id.into());
        self
    }
}

impl Display for PolicyInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{:?} may {:?} on '{}'",
            self.subjects, self.actions, self.object
        )?;
        if let Some(condition) = &self.condition {
            write!(f, " ({} if {})", condition.action, condition.rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    const DOCUMENT: &str = r#"{
        "policies": [
            {
                "meta": { "version": "0.7", "policyId": "p1" },
                "subjects": ["user:alice", "group:admins"],
                "actions": ["view"],
                "object": "doc1",
                "condition": { "rule": "level gt 5", "action": "deny" }
            },
            {
                "meta": { "version": "0.7" },
                "subjects": ["any"],
                "actions": ["list"],
                "object": "docs"
            }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let policies = Policies::from_json(DOCUMENT).unwrap();
        assert_eq!(policies.policies.len(), 2);

        let first = &policies.policies[0];
        assert_eq!(first.meta.policy_id.as_deref(), Some("p1"));
        assert_eq!(first.condition, Some(ConditionInfo::deny("level gt 5")));
        assert_eq!(policies.policies[1].condition, None);
    }

    #[test]
    fn test_condition_action_defaults_to_allow() {
        let condition: ConditionInfo = serde_json::from_str(r#"{ "rule": "a pr" }"#).unwrap();
        assert_eq!(condition.action, ConditionAction::Allow);
    }

    #[test]
    fn test_json_round_trip() {
        let policies = Policies::from_json(DOCUMENT).unwrap();
        let again = Policies::from_json(&policies.to_json().unwrap()).unwrap();
        assert_eq!(policies, again);
    }

    #[test]
    fn test_serialized_shape() {
        let policy = PolicyInfo::new(["user:alice"], ["view"], "doc1")
            .with_condition(ConditionInfo::allow(r#"title pr"#));
        assert_json_snapshot!(policy, @r#"
        {
          "meta": {
            "version": "0.7"
          },
          "subjects": [
            "user:alice"
          ],
          "actions": [
            "view"
          ],
          "object": "doc1",
          "condition": {
            "rule": "title pr",
            "action": "allow"
          }
        }
        "#);
    }

    #[test]
    fn test_display() {
        let policy = PolicyInfo::new(["any"], ["view"], "doc1")
            .with_condition(ConditionInfo::deny("level gt 5"));
        assert_eq!(
            policy.to_string(),
            r#"["any"] may ["view"] on 'doc1' (deny if level gt 5)"#
        );
    }
}
