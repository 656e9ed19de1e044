//! Policy stores: opaque CRUD over provider policy bodies.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::PolicyError;

/// CRUD over raw policy bodies keyed by store-assigned ids. Bodies are
/// whatever the provider keeps: Cedar text or binding-assignment JSON.
pub trait PolicyStore: Send + Sync {
    /// Ids of every stored policy, in a stable order.
    fn list(&self) -> Result<Vec<String>, PolicyError>;

    fn get(&self, id: &str) -> Result<String, PolicyError>;

    /// Store a new body and return its id.
    fn create(&self, body: &str) -> Result<String, PolicyError>;

    fn update(&self, id: &str, body: &str) -> Result<(), PolicyError>;

    fn delete(&self, id: &str) -> Result<(), PolicyError>;
}

/// A [`PolicyStore`] held in memory. Ids are `policy-<n>` and never reused.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    inner: RwLock<BTreeMap<String, String>>,
    next_id: AtomicU64,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, PolicyError> {
        Ok(self.inner.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, PolicyError> {
        Ok(self.len()? == 0)
    }

    fn next_id(&self) -> String {
        // Zero-padded so that lexical order follows insertion order.
        format!("policy-{:08}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

fn not_found(id: &str) -> PolicyError {
    PolicyError::Io(format!("no policy with id '{id}'"))
}

impl PolicyStore for InMemoryPolicyStore {
    fn list(&self) -> Result<Vec<String>, PolicyError> {
        Ok(self.inner.read()?.keys().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<String, PolicyError> {
        self.inner
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn create(&self, body: &str) -> Result<String, PolicyError> {
        let id = self.next_id();
        self.inner.write()?.insert(id.clone(), body.to_string());
        debug!(event = "Store", phase = "Create", id = id.as_str());
        Ok(id)
    }

    fn update(&self, id: &str, body: &str) -> Result<(), PolicyError> {
        let mut guard = self.inner.write()?;
        let slot = guard.get_mut(id).ok_or_else(|| not_found(id))?;
        *slot = body.to_string();
        debug!(event = "Store", phase = "Update", id = id);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), PolicyError> {
        self.inner.write()?.remove(id).ok_or_else(|| not_found(id))?;
        debug!(event = "Store", phase = "Delete", id = id);
        Ok(())
    }
}
