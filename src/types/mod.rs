//! Data model for the policy documents on either side of a mapping.
//!
//! - IDQL: `{ meta, subjects[], actions[], object, condition? }`
//! - GCP: `{ resource_id, bindings[{ role, members[], condition?{ expression } }] }`
//!
//! Subjects and objects are plain strings; [`Subject`] and [`EntityKind`]
//! decide how they land in a Cedar header.

mod gcp;
mod idql;
mod subject;

pub use gcp::{Binding, BindingCondition, GcpBindAssignment};
pub use idql::{
    ConditionAction, ConditionInfo, IDQL_VERSION, MetaInfo, Policies, PolicyInfo,
};
pub use subject::{ANY, ANY_AUTHENTICATED, EntityKind, Subject, entity_type};
