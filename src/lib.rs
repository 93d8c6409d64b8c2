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

//! Property value conversion and cached value expression support
//!
//! The [`convert`] module resolves the converter responsible for a persistent
//! property through a chain of converter factories, optionally memoized per property.
//! The [`expression`] and [`query`] modules parse value expressions once, keep
//! them in a bounded LRU cache, and evaluate them against contexts built from query
//! method arguments, either synchronously or asynchronously.

pub mod config;
pub mod convert;
pub mod error;
pub mod expression;
pub mod query;

pub use config::{ValueMappingConfig, ValueMappingConfigBuilder};
pub use convert::{
    PersistentProperty, PropertyDescriptor, PropertyKey, PropertyValueConversions,
    PropertyValueConverter, PropertyValueConverterFactory, SimplePropertyValueConversions,
    SimplePropertyValueConverterRegistry, ValueConverterRegistry,
};
pub use error::{ParseError, ParseResult, Result, ValueMappingError};
pub use expression::{
    ConcurrentLruCache, Environment, EvaluationContext, ExpressionDependencies,
    TemplateExpressionParser, ValueEvaluationContext, ValueExpression, ValueExpressionParser,
};
pub use query::{
    CachingValueExpressionSupportHolder, Parameters,
    QueryMethodValueEvaluationContextProviderFactory, ValueContextProvider,
    ValueExpressionSupport, ValueExpressionSupportHolder,
};
