//! IDQL mappers for the supported provider dialects.

mod cedar;
mod gcp;

pub use cedar::{AUTHENTICATED_CLAUSE, CedarMapperOptions, CedarPolicyMapper};
pub use gcp::{GCP_ACTION_PREFIX, GcpBindingMapper};
