//! Bidirectional attribute name translation between IDQL and a provider.
//!
//! Lookups are case-insensitive and operate on dotted paths: the longest
//! registered prefix is replaced and the remaining segments are kept verbatim,
//! so with `emails.type -> mail.type` registered, `emails.type.value` becomes
//! `mail.type.value`.

use std::collections::{BTreeMap, HashMap};

use crate::error::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToProvider,
    ToIdql,
}

/// Immutable name map. Cheap to share across threads.
#[derive(Debug, Clone, Default)]
pub struct AttributeNameMapper {
    to_provider: HashMap<String, String>,
    to_idql: HashMap<String, String>,
    strict: bool,
}

impl AttributeNameMapper {
    /// A mapper with no entries; every name passes through unchanged.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn builder() -> NameMapperBuilder {
        NameMapperBuilder::default()
    }

    /// Build from a JSON object of `{ "<idql name>": "<provider name>" }`.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let pairs: BTreeMap<String, String> = serde_json::from_str(json)?;
        pairs
            .into_iter()
            .fold(Self::builder(), |b, (idql, provider)| b.map(idql, provider))
            .build()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn len(&self) -> usize {
        self.to_provider.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_provider.is_empty()
    }

    /// IDQL name to provider name; unknown names pass through.
    pub fn to_provider(&self, idql: &str) -> String {
        self.translate(idql, Direction::ToProvider)
            .unwrap_or_else(|| idql.to_string())
    }

    /// Provider name to IDQL name; unknown names pass through.
    pub fn to_idql(&self, provider: &str) -> String {
        self.translate(provider, Direction::ToIdql)
            .unwrap_or_else(|| provider.to_string())
    }

    /// Like [`to_provider`](Self::to_provider), but a strict mapper rejects unknown names.
    pub fn try_to_provider(&self, idql: &str) -> Result<String, PolicyError> {
        self.try_translate(idql, Direction::ToProvider)
    }

    /// Like [`to_idql`](Self::to_idql), but a strict mapper rejects unknown names.
    pub fn try_to_idql(&self, provider: &str) -> Result<String, PolicyError> {
        self.try_translate(provider, Direction::ToIdql)
    }

    fn try_translate(&self, name: &str, direction: Direction) -> Result<String, PolicyError> {
        match self.translate(name, direction) {
            Some(mapped) => Ok(mapped),
            None if self.strict => Err(PolicyError::NameMappingMissing(name.to_string())),
            None => Ok(name.to_string()),
        }
    }

    fn translate(&self, name: &str, direction: Direction) -> Option<String> {
        let table = match direction {
            Direction::ToProvider => &self.to_provider,
            Direction::ToIdql => &self.to_idql,
        };
        if table.is_empty() {
            return None;
        }

        let segments: Vec<&str> = name.split('.').collect();
        (1..=segments.len()).rev().find_map(|len| {
            let prefix = segments[..len].join(".").to_ascii_lowercase();
            table.get(&prefix).map(|mapped| {
                let mut out = mapped.clone();
                for rest in &segments[len..] {
                    out.push('.');
                    out.push_str(rest);
                }
                out
            })
        })
    }
}

/// Collects name pairs and checks that both sides stay unique.
#[derive(Debug, Clone, Default)]
pub struct NameMapperBuilder {
    pairs: Vec<(String, String)>,
    strict: bool,
}

impl NameMapperBuilder {
    pub fn map(mut self, idql: impl Into<String>, provider: impl Into<String>) -> Self {
        self.pairs.push((idql.into(), provider.into()));
        self
    }

    /// Reject unknown names instead of passing them through.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> Result<AttributeNameMapper, PolicyError> {
        let mut to_provider = HashMap::with_capacity(self.pairs.len());
        let mut to_idql = HashMap::with_capacity(self.pairs.len());

        for (idql, provider) in self.pairs {
            let idql_key = idql.to_ascii_lowercase();
            let provider_key = provider.to_ascii_lowercase();
            if to_provider.contains_key(&idql_key) {
                return Err(PolicyError::InvalidFormat(format!(
                    "duplicate IDQL attribute name '{idql}' in name map"
                )));
            }
            if to_idql.contains_key(&provider_key) {
                return Err(PolicyError::InvalidFormat(format!(
                    "duplicate provider attribute name '{provider}' in name map"
                )));
            }
            to_provider.insert(idql_key, provider);
            to_idql.insert(provider_key, idql);
        }

        Ok(AttributeNameMapper {
            to_provider,
            to_idql,
            strict: self.strict,
        })
    }
}
