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

//! Path-configured converter registry
//!
//! Converters can be attached to properties without touching entity metadata
//! by registering them for an owner type and a property path. The registry is
//! populated up front and read-only afterwards.

use super::converter::{ConversionFn, ConverterRef, FnPropertyValueConverter};
use super::property::PropertyKey;
use crate::error::Result;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Read-only mapping from property identity to a pre-built converter
pub trait ValueConverterRegistry: Send + Sync {
    /// Converter registered for the property, if any
    fn converter_for(&self, key: &PropertyKey) -> Option<ConverterRef>;

    /// Whether a converter is registered for the property
    fn contains(&self, key: &PropertyKey) -> bool {
        self.converter_for(key).is_some()
    }

    /// Whether nothing is registered at all
    fn is_empty(&self) -> bool;
}

/// Hash map backed registry
#[derive(Clone, Default)]
pub struct SimplePropertyValueConverterRegistry {
    converters: FxHashMap<PropertyKey, ConverterRef>,
}

impl SimplePropertyValueConverterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter, replacing any previous one for the same property
    pub fn register_converter(
        &mut self,
        owner_type: &str,
        path: &str,
        converter: ConverterRef,
    ) -> Option<ConverterRef> {
        self.converters
            .insert(PropertyKey::new(owner_type, path), converter)
    }

    /// Number of registered converters
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Registered property identities
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.converters.keys()
    }
}

impl ValueConverterRegistry for SimplePropertyValueConverterRegistry {
    fn converter_for(&self, key: &PropertyKey) -> Option<ConverterRef> {
        self.converters.get(key).cloned()
    }

    fn contains(&self, key: &PropertyKey) -> bool {
        self.converters.contains_key(key)
    }

    fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for SimplePropertyValueConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.converters.keys().collect();
        keys.sort();
        f.debug_struct("SimplePropertyValueConverterRegistry")
            .field("properties", &keys)
            .finish()
    }
}

/// Fluent registration of path-configured converters
#[derive(Default)]
pub struct PropertyValueConverterRegistrar {
    registry: SimplePropertyValueConverterRegistry,
}

impl PropertyValueConverterRegistrar {
    /// Create an empty registrar
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already built converter for `owner_type.path`
    pub fn register_converter(
        &mut self,
        owner_type: &str,
        path: &str,
        converter: ConverterRef,
    ) -> &mut Self {
        self.registry.register_converter(owner_type, path, converter);
        self
    }

    /// Start registering a function based converter for `owner_type.path`
    pub fn register<'r>(
        &'r mut self,
        owner_type: &str,
        path: &str,
    ) -> WritingConverterRegistrationBuilder<'r> {
        WritingConverterRegistrationBuilder {
            registrar: self,
            key: PropertyKey::new(owner_type, path),
        }
    }

    /// Copy every registration into an existing registry
    pub fn register_converters_in(&self, target: &mut SimplePropertyValueConverterRegistry) {
        for (key, converter) in &self.registry.converters {
            target.register_converter(key.owner_type(), key.name(), Arc::clone(converter));
        }
    }

    /// Produce the registry holding all registrations
    pub fn build_registry(self) -> SimplePropertyValueConverterRegistry {
        self.registry
    }
}

/// First step of a function converter registration: the writing direction
pub struct WritingConverterRegistrationBuilder<'r> {
    registrar: &'r mut PropertyValueConverterRegistrar,
    key: PropertyKey,
}

impl<'r> WritingConverterRegistrationBuilder<'r> {
    /// Function converting domain values into their store form
    pub fn writing<W>(self, writer: W) -> ReadingConverterRegistrationBuilder<'r>
    where
        W: Fn(&Value, &dyn super::ValueConversionContext) -> Result<Value> + Send + Sync + 'static,
    {
        ReadingConverterRegistrationBuilder {
            registrar: self.registrar,
            key: self.key,
            writer: Arc::new(writer),
        }
    }
}

/// Second step of a function converter registration: the reading direction
pub struct ReadingConverterRegistrationBuilder<'r> {
    registrar: &'r mut PropertyValueConverterRegistrar,
    key: PropertyKey,
    writer: ConversionFn,
}

impl<'r> ReadingConverterRegistrationBuilder<'r> {
    /// Function converting store values into their domain form; completes the registration
    pub fn reading<R>(self, reader: R) -> &'r mut PropertyValueConverterRegistrar
    where
        R: Fn(&Value, &dyn super::ValueConversionContext) -> Result<Value> + Send + Sync + 'static,
    {
        let converter = FnPropertyValueConverter::from_parts(Arc::new(reader), self.writer);
        self.registrar.registry.register_converter(
            self.key.owner_type(),
            self.key.name(),
            Arc::new(converter),
        );
        self.registrar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::converter::{IdentityConverter, SimpleValueConversionContext};
    use crate::convert::property::PropertyDescriptor;
    use serde_json::json;

    #[test]
    fn test_empty_registry() {
        let registry = SimplePropertyValueConverterRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains(&PropertyKey::new("Person", "ssn")));
    }

    #[test]
    fn test_register_replaces_previous() {
        let mut registry = SimplePropertyValueConverterRegistry::new();
        let first: ConverterRef = Arc::new(IdentityConverter);
        assert!(registry
            .register_converter("Person", "ssn", first.clone())
            .is_none());

        let replaced = registry
            .register_converter("Person", "ssn", Arc::new(IdentityConverter))
            .unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registrar_fluent_function_converter() {
        let mut registrar = PropertyValueConverterRegistrar::new();
        registrar
            .register("Person", "ssn")
            .writing(|value, _| Ok(json!(format!("enc:{}", value.as_str().unwrap_or_default()))))
            .reading(|value, _| {
                Ok(json!(value.as_str().unwrap_or_default().trim_start_matches("enc:")))
            })
            .register_converter("Person", "name", Arc::new(IdentityConverter));

        let registry = registrar.build_registry();
        assert_eq!(registry.len(), 2);

        let property = PropertyDescriptor::new("Person", "ssn");
        let context = SimpleValueConversionContext::new(&property);
        let converter = registry.converter_for(&PropertyKey::new("Person", "ssn")).unwrap();
        assert_eq!(converter.write(&json!("123"), &context).unwrap(), json!("enc:123"));
        assert_eq!(converter.read(&json!("enc:123"), &context).unwrap(), json!("123"));
    }

    #[test]
    fn test_register_converters_in_existing_registry() {
        let mut registrar = PropertyValueConverterRegistrar::new();
        registrar.register_converter("Order", "total", Arc::new(IdentityConverter));

        let mut target = SimplePropertyValueConverterRegistry::new();
        target.register_converter("Person", "ssn", Arc::new(IdentityConverter));
        registrar.register_converters_in(&mut target);

        assert_eq!(target.len(), 2);
        assert!(target.contains(&PropertyKey::new("Order", "total")));
    }
}
