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

//! Converter factories
//!
//! A factory locates (or declines to locate) the converter for a property.
//! Factories compose: [`chained`] tries members in order and [`caching`]
//! memoizes whatever its delegate answers, including "no converter".

use super::converter::ConverterRef;
use super::property::{PersistentProperty, PropertyKey};
use super::registry::ValueConverterRegistry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared handle to a converter factory
pub type FactoryRef = Arc<dyn PropertyValueConverterFactory>;

/// Strategy locating the converter responsible for a property
pub trait PropertyValueConverterFactory: Send + Sync {
    /// Converter for the property, or `None` when this factory has nothing to offer
    fn converter(&self, property: &dyn PersistentProperty) -> Option<ConverterRef>;

    /// Short description used in logs
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

/// Factory serving converters declared on the property metadata
pub fn simple() -> FactoryRef {
    Arc::new(SimplePropertyValueConverterFactory)
}

/// Factory serving converters from a registry
pub fn configured_instance(registry: Arc<dyn ValueConverterRegistry>) -> FactoryRef {
    Arc::new(ConfiguredInstanceServingValueConverterFactory::new(registry))
}

/// Factory trying each delegate in order; the first match wins
pub fn chained<I>(factories: I) -> FactoryRef
where
    I: IntoIterator<Item = FactoryRef>,
{
    Arc::new(ChainedPropertyValueConverterFactory::new(factories))
}

/// Factory memoizing the answers of its delegate
pub fn caching(delegate: FactoryRef) -> FactoryRef {
    Arc::new(CachingPropertyValueConverterFactory::new(delegate))
}

/// Stateless factory returning the converter a property declares itself
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePropertyValueConverterFactory;

impl PropertyValueConverterFactory for SimplePropertyValueConverterFactory {
    fn converter(&self, property: &dyn PersistentProperty) -> Option<ConverterRef> {
        property.declared_converter()
    }

    fn describe(&self) -> String {
        "simple".to_string()
    }
}

/// Factory backed by a [`ValueConverterRegistry`]
#[derive(Clone)]
pub struct ConfiguredInstanceServingValueConverterFactory {
    registry: Arc<dyn ValueConverterRegistry>,
}

impl ConfiguredInstanceServingValueConverterFactory {
    /// Wrap the registry
    pub fn new(registry: Arc<dyn ValueConverterRegistry>) -> Self {
        Self { registry }
    }

    /// The wrapped registry
    pub fn registry(&self) -> &Arc<dyn ValueConverterRegistry> {
        &self.registry
    }
}

impl PropertyValueConverterFactory for ConfiguredInstanceServingValueConverterFactory {
    fn converter(&self, property: &dyn PersistentProperty) -> Option<ConverterRef> {
        self.registry.converter_for(&property.key())
    }

    fn describe(&self) -> String {
        "configured-instance".to_string()
    }
}

impl fmt::Debug for ConfiguredInstanceServingValueConverterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredInstanceServingValueConverterFactory")
            .field("empty", &self.registry.is_empty())
            .finish()
    }
}

/// Ordered chain of factories
#[derive(Clone)]
pub struct ChainedPropertyValueConverterFactory {
    // Fixed at construction
    delegates: SmallVec<[FactoryRef; 3]>,
}

impl ChainedPropertyValueConverterFactory {
    /// Create a chain; iteration order is lookup order
    pub fn new<I>(factories: I) -> Self
    where
        I: IntoIterator<Item = FactoryRef>,
    {
        Self {
            delegates: factories.into_iter().collect(),
        }
    }

    /// Members in lookup order
    pub fn factories(&self) -> &[FactoryRef] {
        &self.delegates
    }
}

impl PropertyValueConverterFactory for ChainedPropertyValueConverterFactory {
    fn converter(&self, property: &dyn PersistentProperty) -> Option<ConverterRef> {
        self.delegates
            .iter()
            .find_map(|factory| factory.converter(property))
    }

    fn describe(&self) -> String {
        let members: Vec<String> = self.delegates.iter().map(|f| f.describe()).collect();
        format!("chained[{}]", members.join(", "))
    }
}

impl fmt::Debug for ChainedPropertyValueConverterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Statistics of a [`CachingPropertyValueConverterFactory`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterCacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups forwarded to the delegate
    pub misses: u64,
    /// Cached properties, negative answers included
    pub entries: usize,
}

/// Memoizing wrapper around another factory.
///
/// Keys are [`PropertyKey`]s and entries are never evicted: the property set
/// is bounded by the entity metadata. Negative answers are cached as well.
///
/// The delegate runs outside the map's locks, so it may look up other properties
/// through this factory. Concurrent first lookups of one key wait on that key's
/// cell and the delegate runs once.
pub struct CachingPropertyValueConverterFactory {
    delegate: FactoryRef,
    cache: DashMap<PropertyKey, Arc<OnceCell<Option<ConverterRef>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingPropertyValueConverterFactory {
    /// Wrap the delegate
    pub fn new(delegate: FactoryRef) -> Self {
        Self {
            delegate,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped factory
    pub fn delegate(&self) -> &FactoryRef {
        &self.delegate
    }

    /// Current cache statistics
    pub fn stats(&self) -> ConverterCacheStats {
        ConverterCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }
}

impl PropertyValueConverterFactory for CachingPropertyValueConverterFactory {
    fn converter(&self, property: &dyn PersistentProperty) -> Option<ConverterRef> {
        let key = property.key();

        // Shard guards are released at the end of each statement.
        let existing = self.cache.get(&key).map(|entry| Arc::clone(entry.value()));
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(self.cache.entry(key).or_default().value()),
        };

        let mut computed = false;
        let converter = cell
            .get_or_init(|| {
                computed = true;
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.delegate.converter(property)
            })
            .clone();
        if !computed {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        converter
    }

    fn describe(&self) -> String {
        format!("caching({})", self.delegate.describe())
    }
}

impl fmt::Debug for CachingPropertyValueConverterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingPropertyValueConverterFactory")
            .field("delegate", &self.delegate.describe())
            .field("stats", &self.stats())
            .finish()
    }
}
