//! Fallback data registry: static canned payloads keyed by operation

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LifelineError;
use crate::operation::OperationKey;

/// Fixture set bundled with the application
const BUILTIN_FIXTURES: &str = include_str!("../fixtures/fallback.json");

/// Read-only catalogue of fallback payloads.
///
/// Lookup is exact on the operation key first, then falls back to a
/// namespace wildcard entry (`content.*`). Absence means "no fallback", never
/// an empty success.
#[derive(Debug, Clone, Default)]
pub struct FallbackRegistry {
    entries: HashMap<OperationKey, Value>,
}

impl FallbackRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> FallbackRegistryBuilder {
        FallbackRegistryBuilder::default()
    }

    /// Registry holding the fixtures bundled with the application
    pub fn builtin() -> crate::Result<Self> {
        Self::from_json(BUILTIN_FIXTURES)
    }

    /// Parse a fixture set: a JSON object mapping operation keys to payloads
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(map) = value else {
            return Err(LifelineError::Config(
                "Fallback fixtures must be a JSON object keyed by operation".to_string(),
            ));
        };

        let entries = map
            .into_iter()
            .map(|(key, payload)| (OperationKey::new(key), payload))
            .collect();
        Ok(Self { entries })
    }

    /// Load a fixture set from a JSON file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LifelineError::Config(format!("Failed to read fixtures file {:?}: {}", path, e))
        })?;
        let registry = Self::from_json(&content)?;
        tracing::debug!(
            "Loaded {} fallback fixtures from {:?}",
            registry.len(),
            path
        );
        Ok(registry)
    }

    /// Look up the canned payload for an operation
    pub fn lookup(&self, key: &OperationKey) -> Option<&Value> {
        if let Some(payload) = self.entries.get(key) {
            return Some(payload);
        }
        let wildcard = format!("{}.*", key.namespace());
        self.entries.get(wildcard.as_str())
    }

    /// Look up and decode the payload for an operation
    pub fn lookup_as<T: DeserializeOwned>(&self, key: &OperationKey) -> Option<crate::Result<T>> {
        self.lookup(key).map(|payload| {
            serde_json::from_value(payload.clone()).map_err(|e| {
                LifelineError::Decode(format!("Fallback fixture for '{}': {}", key, e))
            })
        })
    }

    pub fn contains(&self, key: &OperationKey) -> bool {
        self.lookup(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &OperationKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for registries assembled in code
#[derive(Debug, Default)]
pub struct FallbackRegistryBuilder {
    entries: HashMap<OperationKey, Value>,
}

impl FallbackRegistryBuilder {
    pub fn entry(mut self, key: impl Into<OperationKey>, payload: Value) -> Self {
        self.entries.insert(key.into(), payload);
        self
    }

    pub fn build(self) -> FallbackRegistry {
        FallbackRegistry {
            entries: self.entries,
        }
    }
}
