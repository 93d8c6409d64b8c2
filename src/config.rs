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

//! Configuration for conversions and expression support

use crate::error::{Result, ValueMappingError};
use crate::expression::DEFAULT_EXPRESSION_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};

/// Tuning knobs shared by the conversion façade and the expression support layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValueMappingConfig {
    /// Memoize property to converter lookups
    pub converter_cache_enabled: bool,
    /// Assemble the converter factory chain on first lookup instead of requiring `init()`
    pub lazy_initialization: bool,
    /// Number of parsed expressions retained by the caching support holder
    pub expression_cache_capacity: usize,
    /// Hand out async-capable context providers when the delegate supports them
    pub async_evaluation: bool,
}

impl Default for ValueMappingConfig {
    fn default() -> Self {
        Self {
            converter_cache_enabled: true,
            lazy_initialization: true,
            expression_cache_capacity: DEFAULT_EXPRESSION_CACHE_CAPACITY,
            async_evaluation: true,
        }
    }
}

impl ValueMappingConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> ValueMappingConfigBuilder {
        ValueMappingConfigBuilder::new()
    }

    /// Read a configuration from a JSON document; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ValueMappingError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can honour
    pub fn validate(&self) -> Result<()> {
        if self.expression_cache_capacity == 0 {
            return Err(ValueMappingError::configuration(
                "expressionCacheCapacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`ValueMappingConfig`]
#[derive(Debug, Clone, Default)]
pub struct ValueMappingConfigBuilder {
    config: ValueMappingConfig,
}

impl ValueMappingConfigBuilder {
    /// Create a builder seeded with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the converter cache
    pub fn converter_cache_enabled(mut self, enabled: bool) -> Self {
        self.config.converter_cache_enabled = enabled;
        self
    }

    /// Enable or disable lazy factory assembly
    pub fn lazy_initialization(mut self, enabled: bool) -> Self {
        self.config.lazy_initialization = enabled;
        self
    }

    /// Set the parsed expression cache capacity
    pub fn expression_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.expression_cache_capacity = capacity;
        self
    }

    /// Enable or disable async-capable providers
    pub fn async_evaluation(mut self, enabled: bool) -> Self {
        self.config.async_evaluation = enabled;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<ValueMappingConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ValueMappingConfig::default();
        assert!(config.converter_cache_enabled);
        assert!(config.lazy_initialization);
        assert!(config.async_evaluation);
        assert_eq!(config.expression_cache_capacity, 256);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ValueMappingConfig::from_json(r#"{"converterCacheEnabled": false}"#).unwrap();
        assert_eq!(
            config,
            ValueMappingConfig {
                converter_cache_enabled: false,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = ValueMappingConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ValueMappingError::Configuration { .. }));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ValueMappingConfig::builder()
            .expression_cache_capacity(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("expressionCacheCapacity"));
    }

    #[test]
    fn test_builder() {
        let config = ValueMappingConfig::builder()
            .converter_cache_enabled(false)
            .lazy_initialization(false)
            .expression_cache_capacity(16)
            .async_evaluation(false)
            .build()
            .unwrap();
        assert!(!config.converter_cache_enabled);
        assert!(!config.lazy_initialization);
        assert!(!config.async_evaluation);
        assert_eq!(config.expression_cache_capacity, 16);
    }
}
