use crate::error::PolicyError;
use crate::types::{Policies, PolicyInfo};

/// A provider policy dialect that IDQL can be exported to and imported from.
pub trait PolicyMapper {
    /// The provider-side document, e.g. a Cedar document or a list of GCP
    /// binding assignments.
    type Target;

    /// Short provider name used in log fields (e.g. "cedar", "gcp").
    fn name(&self) -> &'static str;

    /// Export IDQL policies into the provider dialect.
    fn to_target(&self, policies: &[PolicyInfo]) -> Result<Self::Target, PolicyError>;

    /// Import a provider document as IDQL policies.
    fn to_idql(&self, target: &Self::Target) -> Result<Vec<PolicyInfo>, PolicyError>;

    /// Import wrapped in the `{ "policies": [...] }` document, default is
    /// [`to_idql`](Self::to_idql) plus the wrapper.
    fn to_policies(&self, target: &Self::Target) -> Result<Policies, PolicyError> {
        Ok(Policies::new(self.to_idql(target)?))
    }
}
