//! IDQL <-> Google Cloud IAM bindings.
//!
//! Only actions carrying the `gcp:` prefix name IAM roles; everything else is
//! skipped on export. Each role becomes its own binding, and bindings are
//! grouped by resource in first-seen order.

use tracing::{debug, info, warn};

use crate::cel::CelMapper;
use crate::error::PolicyError;
use crate::names::AttributeNameMapper;
use crate::traits::PolicyMapper;
use crate::types::{
    Binding, BindingCondition, ConditionAction, ConditionInfo, GcpBindAssignment, MetaInfo,
    PolicyInfo,
};

pub const GCP_ACTION_PREFIX: &str = "gcp:";

#[derive(Debug, Clone, Default)]
pub struct GcpBindingMapper {
    cel: CelMapper,
}

impl GcpBindingMapper {
    pub fn new(names: AttributeNameMapper) -> Self {
        GcpBindingMapper {
            cel: CelMapper::new(names),
        }
    }

    /// The bindings one policy contributes to its resource.
    pub fn map_policy(&self, policy: &PolicyInfo) -> Result<Vec<Binding>, PolicyError> {
        let condition = match &policy.condition {
            Some(condition) => {
                if condition.action == ConditionAction::Deny {
                    return Err(PolicyError::UnsupportedShape(
                        "IAM bindings cannot carry a deny condition".to_string(),
                    ));
                }
                Some(BindingCondition {
                    expression: self.cel.filter_to_cel(&condition.rule)?,
                    title: policy.meta.policy_id.clone(),
                    description: policy.meta.description.clone(),
                })
            }
            None => None,
        };

        let mut bindings = Vec::new();
        for action in &policy.actions {
            match action.strip_prefix(GCP_ACTION_PREFIX) {
                Some(role) => bindings.push(Binding {
                    role: role.to_string(),
                    members: policy.subjects.clone(),
                    condition: condition.clone(),
                }),
                None => warn!(
                    event = "Mapper",
                    phase = "Export",
                    provider = "gcp",
                    action = action.as_str(),
                    reason = "not a gcp role"
                ),
            }
        }

        debug!(
            event = "Mapper",
            phase = "Export",
            provider = "gcp",
            policy = %policy,
            bindings = bindings.len()
        );
        Ok(bindings)
    }

    /// One binding on `resource_id` back to IDQL.
    pub fn map_binding(
        &self,
        binding: &Binding,
        resource_id: &str,
    ) -> Result<PolicyInfo, PolicyError> {
        let condition = match &binding.condition {
            Some(condition) => Some(ConditionInfo::allow(
                self.cel.cel_to_filter(&condition.expression)?,
            )),
            None => None,
        };
        let meta = match &binding.condition {
            Some(condition) => MetaInfo {
                policy_id: condition.title.clone(),
                description: condition.description.clone(),
                ..MetaInfo::default()
            },
            None => MetaInfo::default(),
        };
        Ok(PolicyInfo {
            meta,
            subjects: binding.members.clone(),
            actions: vec![format!("{GCP_ACTION_PREFIX}{}", binding.role)],
            object: resource_id.to_string(),
            condition,
        })
    }
}

impl PolicyMapper for GcpBindingMapper {
    type Target = Vec<GcpBindAssignment>;

    fn name(&self) -> &'static str {
        "gcp"
    }

    fn to_target(&self, policies: &[PolicyInfo]) -> Result<Vec<GcpBindAssignment>, PolicyError> {
        let mut assignments: Vec<GcpBindAssignment> = Vec::new();
        for policy in policies {
            let bindings = self.map_policy(policy)?;
            if bindings.is_empty() {
                continue;
            }
            match assignments
                .iter_mut()
                .find(|a| a.resource_id == policy.object)
            {
                Some(assignment) => assignment.bindings.extend(bindings),
                None => assignments.push(GcpBindAssignment::new(policy.object.clone(), bindings)),
            }
        }
        info!(
            event = "Mapper",
            phase = "Export",
            provider = self.name(),
            policies = policies.len(),
            assignments = assignments.len()
        );
        Ok(assignments)
    }

    fn to_idql(
        &self,
        assignments: &Vec<GcpBindAssignment>,
    ) -> Result<Vec<PolicyInfo>, PolicyError> {
        let mut policies = Vec::new();
        for assignment in assignments {
            for binding in &assignment.bindings {
                policies.push(self.map_binding(binding, &assignment.resource_id)?);
            }
        }
        info!(
            event = "Mapper",
            phase = "Import",
            provider = self.name(),
            assignments = assignments.len(),
            policies = policies.len()
        );
        Ok(policies)
    }
}
