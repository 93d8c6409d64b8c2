// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ambient named configuration used to resolve `${...}` placeholders

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Lookup of named configuration values
pub trait Environment: Send + Sync {
    /// Value of the property, if defined
    fn property(&self, key: &str) -> Option<String>;

    /// Whether the property is defined
    fn contains_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }
}

/// In-memory environment
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    properties: FxHashMap<String, String>,
}

impl MapEnvironment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add or replace a property
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for MapEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn contains_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

/// Process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Ordered list of environments; the first one defining a key wins
#[derive(Clone, Default)]
pub struct CompositeEnvironment {
    sources: Vec<Arc<dyn Environment>>,
}

impl CompositeEnvironment {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than the existing ones
    pub fn with_source(mut self, source: Arc<dyn Environment>) -> Self {
        self.sources.push(source);
        self
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Environment for CompositeEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.property(key))
    }
}

impl fmt::Debug for CompositeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeEnvironment")
            .field("sources", &self.sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_environment() {
        let env = MapEnvironment::new().with_property("app.name", "ledger");
        assert_eq!(env.property("app.name").as_deref(), Some("ledger"));
        assert!(!env.contains_property("app.version"));
    }

    #[test]
    fn test_composite_precedence() {
        let primary: MapEnvironment = [("region", "eu")].into_iter().collect();
        let fallback: MapEnvironment = [("region", "us"), ("tier", "gold")].into_iter().collect();
        let env = CompositeEnvironment::new()
            .with_source(Arc::new(primary))
            .with_source(Arc::new(fallback));

        assert_eq!(env.property("region").as_deref(), Some("eu"));
        assert_eq!(env.property("tier").as_deref(), Some("gold"));
        assert_eq!(env.property("missing"), None);
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_system_environment() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("OCTOFHIR_VALUE_MAPPING_TEST_ENV", "on") };
        assert_eq!(
            SystemEnvironment
                .property("OCTOFHIR_VALUE_MAPPING_TEST_ENV")
                .as_deref(),
            Some("on")
        );
    }
}
