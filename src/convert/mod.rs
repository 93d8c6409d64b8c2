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

//! Property value conversion
//!
//! Pluggable resolution of the converter responsible for a single persistent
//! property, with optional chaining and caching of converter factories.

pub mod conversions;
pub mod converter;
pub mod factory;
pub mod property;
pub mod registry;

pub use conversions::{PropertyValueConversions, SimplePropertyValueConversions};
pub use converter::{
    ConversionFn, ConverterRef, FnPropertyValueConverter, IdentityConverter,
    PropertyValueConverter, SimpleValueConversionContext, ValueConversionContext,
};
pub use factory::{
    CachingPropertyValueConverterFactory, ChainedPropertyValueConverterFactory,
    ConfiguredInstanceServingValueConverterFactory, ConverterCacheStats, FactoryRef,
    PropertyValueConverterFactory, SimplePropertyValueConverterFactory,
};
pub use property::{ConverterSupplier, PersistentProperty, PropertyDescriptor, PropertyKey};
pub use registry::{
    PropertyValueConverterRegistrar, ReadingConverterRegistrationBuilder,
    SimplePropertyValueConverterRegistry, ValueConverterRegistry,
    WritingConverterRegistrationBuilder,
};
