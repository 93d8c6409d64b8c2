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

//! Query method expression support
//!
//! Binds query method arguments into evaluation contexts, synchronously or
//! asynchronously, and pairs the resulting providers with a (cached) expression parser.

pub mod factory;
pub mod parameters;
pub mod provider;
pub mod support;

pub use factory::{
    DefaultQueryMethodValueEvaluationContextProvider,
    DefaultReactiveQueryMethodValueEvaluationContextProvider,
    QueryMethodValueEvaluationContextProvider, QueryMethodValueEvaluationContextProviderFactory,
    ReactiveQueryMethodValueEvaluationContextProvider, ValueContextProvider,
};
pub use parameters::{Parameter, Parameters, ParametersBuilder};
pub use provider::{
    DefaultQueryMethodEvaluationContextProvider, EvaluationContextExtension,
    ExtensionAwareEvaluationContextProvider, QueryMethodEvaluationContextProvider,
    ReactiveEvaluationContextExtension, ReactiveExtensionAwareEvaluationContextProvider,
    ReactiveQueryMethodEvaluationContextProvider,
};
pub use support::{
    CachingValueExpressionSupportHolder, ValueExpressionSupport, ValueExpressionSupportHolder,
};
