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

//! Property value conversions façade
//!
//! The object mapping layer asks this façade whether a property has a
//! converter and for the converter itself. The façade assembles its factory
//! chain exactly once, either through [`SimplePropertyValueConversions::init`]
//! or on the first lookup.

use super::converter::{ConverterRef, SimpleValueConversionContext};
use super::factory::{self, FactoryRef};
use super::property::PersistentProperty;
use super::registry::ValueConverterRegistry;
use crate::config::ValueMappingConfig;
use crate::error::{Result, ValueMappingError};
use once_cell::sync::OnceCell;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Entry point used by the mapping layer to locate property converters
pub trait PropertyValueConversions: Send + Sync {
    /// Whether a converter exists for the property
    fn has_value_converter(&self, property: &dyn PersistentProperty) -> Result<bool>;

    /// The converter for the property; fails when there is none
    fn value_converter(&self, property: &dyn PersistentProperty) -> Result<ConverterRef>;

    /// Convert a store-side value with the property's converter
    fn read_value(&self, property: &dyn PersistentProperty, value: &Value) -> Result<Value> {
        let converter = self.value_converter(property)?;
        converter.read(value, &SimpleValueConversionContext::new(property))
    }

    /// Convert a domain-side value with the property's converter
    fn write_value(&self, property: &dyn PersistentProperty, value: &Value) -> Result<Value> {
        let converter = self.value_converter(property)?;
        converter.write(value, &SimpleValueConversionContext::new(property))
    }
}

/// Default [`PropertyValueConversions`] assembling a factory chain from its settings.
///
/// Settings only take effect before the chain is assembled. Once initialized
/// the resolved factory never changes.
pub struct SimplePropertyValueConversions {
    converter_factory: Option<FactoryRef>,
    value_converter_registry: Option<Arc<dyn ValueConverterRegistry>>,
    converter_cache_enabled: bool,
    lazy_initialization: bool,
    resolved: OnceCell<FactoryRef>,
}

impl Default for SimplePropertyValueConversions {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplePropertyValueConversions {
    /// Create unconfigured conversions with caching and lazy initialization enabled
    pub fn new() -> Self {
        Self::from_config(&ValueMappingConfig::default())
    }

    /// Create unconfigured conversions from the shared configuration
    pub fn from_config(config: &ValueMappingConfig) -> Self {
        Self {
            converter_factory: None,
            value_converter_registry: None,
            converter_cache_enabled: config.converter_cache_enabled,
            lazy_initialization: config.lazy_initialization,
            resolved: OnceCell::new(),
        }
    }

    /// Set the factory creating converters; replaces the simple default
    pub fn set_converter_factory(&mut self, converter_factory: Option<FactoryRef>) {
        if self.warn_if_initialized("converter factory") {
            return;
        }
        self.converter_factory = converter_factory;
    }

    /// Set the registry of path-configured converters
    pub fn set_value_converter_registry(
        &mut self,
        registry: Option<Arc<dyn ValueConverterRegistry>>,
    ) {
        if self.warn_if_initialized("value converter registry") {
            return;
        }
        self.value_converter_registry = registry;
    }

    /// Configure whether resolved converters are cached; enabled by default
    pub fn set_converter_cache_enabled(&mut self, enabled: bool) {
        if self.warn_if_initialized("converter cache flag") {
            return;
        }
        self.converter_cache_enabled = enabled;
    }

    /// Builder style variant of [`Self::set_converter_factory`]
    pub fn with_converter_factory(mut self, converter_factory: FactoryRef) -> Self {
        self.set_converter_factory(Some(converter_factory));
        self
    }

    /// Builder style variant of [`Self::set_value_converter_registry`]
    pub fn with_value_converter_registry(
        mut self,
        registry: Arc<dyn ValueConverterRegistry>,
    ) -> Self {
        self.set_value_converter_registry(Some(registry));
        self
    }

    /// Builder style variant of [`Self::set_converter_cache_enabled`]
    pub fn with_converter_cache_enabled(mut self, enabled: bool) -> Self {
        self.set_converter_cache_enabled(enabled);
        self
    }

    /// The assembled factory once initialized, otherwise the configured one
    pub fn converter_factory(&self) -> Option<&FactoryRef> {
        self.resolved.get().or(self.converter_factory.as_ref())
    }

    /// The configured registry
    pub fn value_converter_registry(&self) -> Option<&Arc<dyn ValueConverterRegistry>> {
        self.value_converter_registry.as_ref()
    }

    /// Whether resolved converters are cached
    pub fn is_converter_cache_enabled(&self) -> bool {
        self.converter_cache_enabled
    }

    /// Whether the factory chain has been assembled
    pub fn is_initialized(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Assemble the factory chain.
    ///
    /// Safe to call from several threads; exactly one assembly happens and
    /// every caller receives the same factory. Later calls are no-ops.
    pub fn init(&self) -> &FactoryRef {
        self.resolved.get_or_init(|| self.assemble())
    }

    /// Lifecycle hook invoked once all settings are applied
    pub fn after_properties_set(&self) {
        self.init();
    }

    fn assemble(&self) -> FactoryRef {
        let mut delegates: SmallVec<[FactoryRef; 3]> = SmallVec::new();

        delegates.push(
            self.converter_factory
                .clone()
                .unwrap_or_else(factory::simple),
        );

        if let Some(registry) = self
            .value_converter_registry
            .as_ref()
            .filter(|registry| !registry.is_empty())
        {
            delegates.push(factory::configured_instance(Arc::clone(registry)));
        }

        let target = if delegates.len() > 1 {
            factory::chained(delegates)
        } else {
            delegates.remove(0)
        };

        let resolved = if self.converter_cache_enabled {
            factory::caching(target)
        } else {
            target
        };

        log::debug!(
            "Assembled property value converter factory: {}",
            resolved.describe()
        );
        resolved
    }

    fn require_converter_factory(&self) -> Result<&FactoryRef> {
        if self.lazy_initialization {
            return Ok(self.init());
        }
        self.converter_factory()
            .ok_or(ValueMappingError::MissingConverterFactory)
    }

    fn warn_if_initialized(&self, setting: &str) -> bool {
        let initialized = self.is_initialized();
        if initialized {
            log::warn!(
                "Ignoring {setting} change: property value conversions already initialized"
            );
        }
        initialized
    }
}

impl PropertyValueConversions for SimplePropertyValueConversions {
    fn has_value_converter(&self, property: &dyn PersistentProperty) -> Result<bool> {
        Ok(self
            .require_converter_factory()?
            .converter(property)
            .is_some())
    }

    fn value_converter(&self, property: &dyn PersistentProperty) -> Result<ConverterRef> {
        self.require_converter_factory()?
            .converter(property)
            .ok_or_else(|| ValueMappingError::converter_not_found(property.key()))
    }
}

impl fmt::Debug for SimplePropertyValueConversions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplePropertyValueConversions")
            .field(
                "converter_factory",
                &self.converter_factory().map(|factory| factory.describe()),
            )
            .field(
                "registry_empty",
                &self.value_converter_registry.as_ref().map(|r| r.is_empty()),
            )
            .field("converter_cache_enabled", &self.converter_cache_enabled)
            .field("lazy_initialization", &self.lazy_initialization)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::converter::{FnPropertyValueConverter, IdentityConverter};
    use crate::convert::property::PropertyDescriptor;
    use crate::convert::registry::SimplePropertyValueConverterRegistry;
    use serde_json::json;

    fn registry_with(
        owner: &str,
        path: &str,
        converter: ConverterRef,
    ) -> Arc<dyn ValueConverterRegistry> {
        let mut registry = SimplePropertyValueConverterRegistry::new();
        registry.register_converter(owner, path, converter);
        Arc::new(registry)
    }

    #[test]
    fn test_defaults_to_cached_simple_factory() {
        let conversions = SimplePropertyValueConversions::new();
        assert_eq!(
            conversions.init().describe(),
            "caching(simple)".to_string()
        );
    }

    #[test]
    fn test_registry_appended_after_simple() {
        let conversions = SimplePropertyValueConversions::new().with_value_converter_registry(
            registry_with("Person", "ssn", Arc::new(IdentityConverter)),
        );
        assert_eq!(
            conversions.init().describe(),
            "caching(chained[simple, configured-instance])"
        );
    }

    #[test]
    fn test_empty_registry_is_skipped() {
        let conversions = SimplePropertyValueConversions::new()
            .with_value_converter_registry(Arc::new(SimplePropertyValueConverterRegistry::new()))
            .with_converter_cache_enabled(false);
        assert_eq!(conversions.init().describe(), "simple");
    }

    #[test]
    fn test_explicit_factory_replaces_simple() {
        let registry = registry_with("Person", "ssn", Arc::new(IdentityConverter));
        let conversions = SimplePropertyValueConversions::new()
            .with_converter_factory(factory::configured_instance(registry))
            .with_converter_cache_enabled(false);
        assert_eq!(conversions.init().describe(), "configured-instance");
    }

    #[test]
    fn test_registered_converter_identity_preserved() {
        let registered: ConverterRef = Arc::new(IdentityConverter);
        let conversions = SimplePropertyValueConversions::new()
            .with_value_converter_registry(registry_with("Person", "ssn", registered.clone()));
        let property = PropertyDescriptor::new("Person", "ssn");

        for _ in 0..3 {
            let found = conversions.value_converter(&property).unwrap();
            assert!(Arc::ptr_eq(&found, &registered));
        }
        assert!(conversions.has_value_converter(&property).unwrap());
    }

    #[test]
    fn test_missing_converter_is_not_found() {
        let conversions = SimplePropertyValueConversions::new();
        let property = PropertyDescriptor::new("Person", "name");

        assert!(!conversions.has_value_converter(&property).unwrap());
        let err = conversions
            .value_converter(&property)
            .err()
            .expect("expected ConverterNotFound error");
        assert_eq!(
            err,
            ValueMappingError::ConverterNotFound {
                property: "Person.name".to_string()
            }
        );
    }

    #[test]
    fn test_lookup_initializes_lazily() {
        let conversions = SimplePropertyValueConversions::new();
        assert!(!conversions.is_initialized());
        conversions
            .has_value_converter(&PropertyDescriptor::new("Person", "name"))
            .unwrap();
        assert!(conversions.is_initialized());
    }

    #[test]
    fn test_strict_mode_requires_factory() {
        let config = ValueMappingConfig::builder()
            .lazy_initialization(false)
            .build()
            .unwrap();
        let conversions = SimplePropertyValueConversions::from_config(&config);

        let err = conversions
            .has_value_converter(&PropertyDescriptor::new("Person", "name"))
            .unwrap_err();
        assert_eq!(err, ValueMappingError::MissingConverterFactory);

        conversions.after_properties_set();
        assert!(!conversions
            .has_value_converter(&PropertyDescriptor::new("Person", "name"))
            .unwrap());
    }

    #[test]
    fn test_strict_mode_uses_explicit_factory_uninitialized() {
        let config = ValueMappingConfig::builder()
            .lazy_initialization(false)
            .build()
            .unwrap();
        let conversions = SimplePropertyValueConversions::from_config(&config)
            .with_converter_factory(factory::simple());

        let property = PropertyDescriptor::new("Person", "ssn")
            .with_converter(|| Arc::new(IdentityConverter));
        assert!(conversions.has_value_converter(&property).unwrap());
        assert!(!conversions.is_initialized());
    }

    #[test]
    fn test_init_is_single_assembly() {
        let conversions = SimplePropertyValueConversions::new();
        let first = Arc::clone(conversions.init());
        let second = Arc::clone(conversions.init());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_settings_ignored_after_init() {
        let mut conversions = SimplePropertyValueConversions::new();
        conversions.init();
        conversions.set_converter_cache_enabled(false);
        assert!(conversions.is_converter_cache_enabled());
        assert_eq!(conversions.init().describe(), "caching(simple)");
    }

    #[test]
    fn test_read_and_write_value() {
        let converter = FnPropertyValueConverter::new(
            |value, _| Ok(json!(value.as_i64().unwrap_or_default() / 100)),
            |value, _| Ok(json!(value.as_i64().unwrap_or_default() * 100)),
        );
        let conversions = SimplePropertyValueConversions::new()
            .with_value_converter_registry(registry_with("Order", "total", Arc::new(converter)));
        let property = PropertyDescriptor::new("Order", "total");

        assert_eq!(conversions.write_value(&property, &json!(12)).unwrap(), json!(1200));
        assert_eq!(conversions.read_value(&property, &json!(1200)).unwrap(), json!(12));
    }
}
