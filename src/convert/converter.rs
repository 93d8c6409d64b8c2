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

//! Property value converters
//!
//! A converter turns a store-side value into its domain-side form (`read`)
//! and back (`write`). Both sides are represented as JSON values; the
//! conversion layer never looks inside a converter, it only locates and
//! caches instances.

use super::property::PersistentProperty;
use crate::error::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a converter
pub type ConverterRef = Arc<dyn PropertyValueConverter>;

/// Context handed to converters while they run
pub trait ValueConversionContext: Send + Sync {
    /// Property whose value is being converted
    fn property(&self) -> &dyn PersistentProperty;
}

/// Context carrying only the property
#[derive(Clone, Copy)]
pub struct SimpleValueConversionContext<'a> {
    property: &'a dyn PersistentProperty,
}

impl<'a> SimpleValueConversionContext<'a> {
    /// Create a context for the given property
    pub fn new(property: &'a dyn PersistentProperty) -> Self {
        Self { property }
    }
}

impl ValueConversionContext for SimpleValueConversionContext<'_> {
    fn property(&self) -> &dyn PersistentProperty {
        self.property
    }
}

impl fmt::Debug for SimpleValueConversionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleValueConversionContext")
            .field("property", &self.property.key())
            .finish()
    }
}

/// Bidirectional conversion between store and domain representation
pub trait PropertyValueConverter: Send + Sync {
    /// Convert a store-side value into its domain-side form
    fn read(&self, value: &Value, context: &dyn ValueConversionContext) -> Result<Value>;

    /// Convert a domain-side value into its store-side form
    fn write(&self, value: &Value, context: &dyn ValueConversionContext) -> Result<Value>;
}

/// Converter passing values through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl PropertyValueConverter for IdentityConverter {
    fn read(&self, value: &Value, _context: &dyn ValueConversionContext) -> Result<Value> {
        Ok(value.clone())
    }

    fn write(&self, value: &Value, _context: &dyn ValueConversionContext) -> Result<Value> {
        Ok(value.clone())
    }
}

/// Conversion function signature used by [`FnPropertyValueConverter`]
pub type ConversionFn =
    Arc<dyn Fn(&Value, &dyn ValueConversionContext) -> Result<Value> + Send + Sync>;

/// Converter assembled from a reading and a writing function
#[derive(Clone)]
pub struct FnPropertyValueConverter {
    reader: ConversionFn,
    writer: ConversionFn,
}

impl FnPropertyValueConverter {
    /// Create a converter from both directions
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Fn(&Value, &dyn ValueConversionContext) -> Result<Value> + Send + Sync + 'static,
        W: Fn(&Value, &dyn ValueConversionContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            reader: Arc::new(reader),
            writer: Arc::new(writer),
        }
    }

    pub(crate) fn from_parts(reader: ConversionFn, writer: ConversionFn) -> Self {
        Self { reader, writer }
    }
}

impl PropertyValueConverter for FnPropertyValueConverter {
    fn read(&self, value: &Value, context: &dyn ValueConversionContext) -> Result<Value> {
        (self.reader)(value, context)
    }

    fn write(&self, value: &Value, context: &dyn ValueConversionContext) -> Result<Value> {
        (self.writer)(value, context)
    }
}

impl fmt::Debug for FnPropertyValueConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPropertyValueConverter")
    }
}
