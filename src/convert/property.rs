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

//! Persistent property handles and their lookup identity

use super::converter::ConverterRef;
use std::fmt;
use std::sync::Arc;

/// Identity of a persistent property for cache and registry lookups.
///
/// Two handles describing the same property of the same owner type are the
/// same key, regardless of which object instance carries them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey {
    owner_type: Arc<str>,
    name: Arc<str>,
}

impl PropertyKey {
    /// Create a key from the declaring type and the property name
    pub fn new(owner_type: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
        }
    }

    /// Declaring type of the property
    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Property name or dotted path
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_type, self.name)
    }
}

/// A property of a persistent entity, as seen by the conversion layer.
///
/// The entity metadata model lives elsewhere; the conversion layer only
/// needs an identity and, optionally, the converter the property declares.
pub trait PersistentProperty: Send + Sync {
    /// Declaring entity type
    fn owner_type(&self) -> &str;

    /// Property name
    fn name(&self) -> &str;

    /// Converter declared on the property metadata itself, if any
    fn declared_converter(&self) -> Option<ConverterRef> {
        None
    }

    /// Lookup identity of this property
    fn key(&self) -> PropertyKey {
        PropertyKey::new(self.owner_type(), self.name())
    }
}

/// Supplies a fresh converter instance for a property declaring one
pub type ConverterSupplier = Arc<dyn Fn() -> ConverterRef + Send + Sync>;

/// Concrete property handle
#[derive(Clone)]
pub struct PropertyDescriptor {
    key: PropertyKey,
    value_type: Arc<str>,
    converter: Option<ConverterSupplier>,
}

impl PropertyDescriptor {
    /// Create a property without a declared converter
    pub fn new(owner_type: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            key: PropertyKey::new(owner_type, name),
            value_type: Arc::from("any"),
            converter: None,
        }
    }

    /// Set the declared value type name
    pub fn with_value_type(mut self, value_type: impl Into<Arc<str>>) -> Self {
        self.value_type = value_type.into();
        self
    }

    /// Declare a converter; the supplier runs on every resolution
    pub fn with_converter<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> ConverterRef + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(supplier));
        self
    }

    /// Declared value type name
    pub fn value_type(&self) -> &str {
        &self.value_type
    }

    /// Whether the property declares a converter
    pub fn has_declared_converter(&self) -> bool {
        self.converter.is_some()
    }
}

impl PersistentProperty for PropertyDescriptor {
    fn owner_type(&self) -> &str {
        self.key.owner_type()
    }

    fn name(&self) -> &str {
        self.key.name()
    }

    fn declared_converter(&self) -> Option<ConverterRef> {
        self.converter.as_ref().map(|supplier| supplier())
    }

    fn key(&self) -> PropertyKey {
        self.key.clone()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("declares_converter", &self.converter.is_some())
            .finish()
    }
}

impl fmt::Display for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}
