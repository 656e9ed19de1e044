//! Google Cloud IAM role bindings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PolicyError;

/// IAM condition attached to a binding. `expression` is CEL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BindingCondition {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<BindingCondition>,
}

/// All bindings that apply to one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GcpBindAssignment {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl GcpBindAssignment {
    pub fn new(resource_id: impl Into<String>, bindings: Vec<Binding>) -> Self {
        GcpBindAssignment {
            resource_id: resource_id.into(),
            bindings,
        }
    }

    /// Parse an assignment, or a single binding that is wrapped with an
    /// empty resource id.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("bindings").is_some() {
            Ok(serde_json::from_value(value)?)
        } else if value.get("role").is_some() {
            let binding: Binding = serde_json::from_value(value)?;
            Ok(GcpBindAssignment::new("", vec![binding]))
        } else {
            Err(PolicyError::InvalidFormat(
                "expected a binding assignment or a single binding".to_string(),
            ))
        }
    }

    pub fn to_json(&self) -> Result<String, PolicyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_assignment() {
        let json = r#"{
            "resource_id": "projects/p1",
            "bindings": [{
                "role": "roles/viewer",
                "members": ["user:alice@example.com"],
                "condition": { "expression": "request.time < timestamp(\"2030-01-01T00:00:00Z\")", "title": "expires" }
            }]
        }"#;
        let assignment = GcpBindAssignment::from_json(json).unwrap();
        assert_eq!(assignment.resource_id, "projects/p1");
        assert_eq!(assignment.bindings.len(), 1);
        let condition = assignment.bindings[0].condition.as_ref().unwrap();
        assert_eq!(condition.title.as_deref(), Some("expires"));
    }

    #[test]
    fn test_from_json_single_binding_is_wrapped() {
        let json = r#"{ "role": "roles/editor", "members": ["group:ops@example.com"] }"#;
        let assignment = GcpBindAssignment::from_json(json).unwrap();
        assert_eq!(assignment.resource_id, "");
        assert_eq!(
            assignment.bindings,
            vec![Binding {
                role: "roles/editor".to_string(),
                members: vec!["group:ops@example.com".to_string()],
                condition: None,
            }]
        );
    }

    #[test]
    fn test_from_json_rejects_other_shapes() {
        assert!(matches!(
            GcpBindAssignment::from_json(r#"{ "etag": "x" }"#),
            Err(PolicyError::InvalidFormat(_))
        ));
        assert!(GcpBindAssignment::from_json("not json").is_err());
    }

    #[test]
    fn test_to_json_omits_empty_condition() {
        let assignment = GcpBindAssignment::new(
            "projects/p1",
            vec![Binding {
                role: "roles/viewer".to_string(),
                members: vec![],
                condition: None,
            }],
        );
        let json = assignment.to_json().unwrap();
        assert!(!json.contains("condition"));
        assert_eq!(GcpBindAssignment::from_json(&json).unwrap(), assignment);
    }
}
