//! Providers run the export and import flows against a [`PolicyStore`].
//!
//! Export: IDQL -> mapper -> provider bodies -> store.
//! Import: store -> provider bodies -> mapper -> IDQL.

use std::collections::HashMap;

use tracing::info;

use crate::error::PolicyError;
use crate::mapper::{CedarPolicyMapper, GcpBindingMapper};
use crate::store::PolicyStore;
use crate::traits::PolicyMapper;
use crate::types::{GcpBindAssignment, Policies};

/// Keeps one Cedar policy per store entry.
#[derive(Debug)]
pub struct CedarProvider<S> {
    store: S,
    mapper: CedarPolicyMapper,
}

impl<S: PolicyStore> CedarProvider<S> {
    pub fn new(store: S, mapper: CedarPolicyMapper) -> Self {
        CedarProvider { store, mapper }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get_policies(&self) -> Result<Policies, PolicyError> {
        let mut policies = Vec::new();
        for id in self.store.list()? {
            let body = self.store.get(&id)?;
            policies.extend(self.mapper.from_cedar_text(&body)?);
        }
        info!(
            event = "Provider",
            phase = "Import",
            provider = self.mapper.name(),
            policies = policies.len()
        );
        Ok(Policies::new(policies))
    }

    /// Replace the store contents. Returns the number of Cedar policies stored.
    pub fn set_policies(&self, policies: &Policies) -> Result<usize, PolicyError> {
        let document = self.mapper.to_target(&policies.policies)?;
        for id in self.store.list()? {
            self.store.delete(&id)?;
        }
        for policy in &document.policies {
            self.store.create(&policy.to_string())?;
        }
        info!(
            event = "Provider",
            phase = "Export",
            provider = self.mapper.name(),
            stored = document.len()
        );
        Ok(document.len())
    }
}

/// Keeps one binding assignment per store entry, keyed by resource id.
#[derive(Debug)]
pub struct GcpProvider<S> {
    store: S,
    mapper: GcpBindingMapper,
}

impl<S: PolicyStore> GcpProvider<S> {
    pub fn new(store: S, mapper: GcpBindingMapper) -> Self {
        GcpProvider { store, mapper }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn stored_assignments(&self) -> Result<Vec<(String, GcpBindAssignment)>, PolicyError> {
        self.store
            .list()?
            .into_iter()
            .map(|id| {
                let assignment = GcpBindAssignment::from_json(&self.store.get(&id)?)?;
                Ok((id, assignment))
            })
            .collect()
    }

    pub fn get_policies(&self) -> Result<Policies, PolicyError> {
        let assignments: Vec<GcpBindAssignment> = self
            .stored_assignments()?
            .into_iter()
            .map(|(_, assignment)| assignment)
            .collect();
        self.mapper.to_policies(&assignments)
    }

    /// Update assignments in place by resource id, create new ones and delete
    /// resources that no longer have bindings. Returns the number stored.
    pub fn set_policies(&self, policies: &Policies) -> Result<usize, PolicyError> {
        let assignments = self.mapper.to_target(&policies.policies)?;
        let mut existing: HashMap<String, String> = self
            .stored_assignments()?
            .into_iter()
            .map(|(id, assignment)| (assignment.resource_id, id))
            .collect();

        for assignment in &assignments {
            let body = assignment.to_json()?;
            match existing.remove(&assignment.resource_id) {
                Some(id) => self.store.update(&id, &body)?,
                None => {
                    self.store.create(&body)?;
                }
            }
        }
        for id in existing.values() {
            self.store.delete(id)?;
        }

        info!(
            event = "Provider",
            phase = "Export",
            provider = self.mapper.name(),
            stored = assignments.len(),
            removed = existing.len()
        );
        Ok(assignments.len())
    }
}
