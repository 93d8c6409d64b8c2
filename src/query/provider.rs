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

//! Delegate providers building raw evaluation contexts from query method arguments
//!
//! A [`QueryMethodEvaluationContextProvider`] turns the parameter metadata and the
//! actual argument values of one invocation into an [`EvaluationContext`]. Providers
//! that can also build contexts asynchronously advertise it through
//! [`QueryMethodEvaluationContextProvider::as_reactive`].

use super::parameters::Parameters;
use crate::error::{Result, ValueMappingError};
use crate::expression::{EvaluationContext, ExpressionDependencies};
use async_trait::async_trait;
use futures::future::try_join_all;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds raw evaluation contexts synchronously
pub trait QueryMethodEvaluationContextProvider: Send + Sync {
    /// Context for one invocation.
    ///
    /// `dependencies` lists the names the expression will reference; providers may use
    /// it to skip contributing anything else.
    fn evaluation_context(
        &self,
        parameters: &Parameters,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext>;

    /// Asynchronous view of this provider, if it has one
    fn as_reactive(
        self: Arc<Self>,
    ) -> Option<Arc<dyn ReactiveQueryMethodEvaluationContextProvider>> {
        None
    }
}

/// Builds raw evaluation contexts asynchronously
#[async_trait]
pub trait ReactiveQueryMethodEvaluationContextProvider: QueryMethodEvaluationContextProvider {
    /// Context for one invocation, produced later
    async fn evaluation_context_later(
        &self,
        parameters: &Parameters,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext>;
}

/// Root is the argument array, named parameters become variables
fn bind_arguments(parameters: &Parameters, values: &[Value]) -> Result<EvaluationContext> {
    if values.len() < parameters.len() {
        return Err(ValueMappingError::invalid_argument(format!(
            "Expected {} argument values but got {}",
            parameters.len(),
            values.len()
        )));
    }

    let mut context = EvaluationContext::with_root(Value::Array(values.to_vec()));
    for parameter in parameters {
        if let Some(name) = parameter.name() {
            let value = values.get(parameter.index()).ok_or_else(|| {
                ValueMappingError::invalid_argument(format!(
                    "Parameter '{name}' refers to argument {} but only {} were given",
                    parameter.index(),
                    values.len()
                ))
            })?;
            context.set_variable(name, value.clone());
        }
    }
    Ok(context)
}

/// Binds arguments only; has no asynchronous capability
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryMethodEvaluationContextProvider;

impl DefaultQueryMethodEvaluationContextProvider {
    /// Provider binding arguments only
    pub fn new() -> Self {
        Self
    }
}

impl QueryMethodEvaluationContextProvider for DefaultQueryMethodEvaluationContextProvider {
    fn evaluation_context(
        &self,
        parameters: &Parameters,
        values: &[Value],
        _dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext> {
        bind_arguments(parameters, values)
    }
}

/// Contributes named values to evaluation contexts
pub trait EvaluationContextExtension: Send + Sync {
    /// Identifier used in log output
    fn extension_id(&self) -> &str;

    /// Values this extension contributes as variables
    fn properties(&self) -> FxHashMap<String, Value>;

    /// Whether the extension contributes `name`
    fn provides(&self, name: &str) -> bool {
        self.properties().contains_key(name)
    }
}

/// Extension whose contributions must be resolved asynchronously
#[async_trait]
pub trait ReactiveEvaluationContextExtension: Send + Sync {
    /// Identifier used in log output
    fn extension_id(&self) -> &str;

    /// Whether the resolved extension will contribute `name`
    fn provides(&self, name: &str) -> bool;

    /// Resolve into a synchronous extension
    async fn resolve(&self) -> Result<Arc<dyn EvaluationContextExtension>>;
}

fn is_required(provides: impl Fn(&str) -> bool, dependencies: &ExpressionDependencies) -> bool {
    dependencies.iter().any(provides)
}

/// Later extensions override earlier ones; arguments override every extension
fn apply_extensions<'a>(
    context: EvaluationContext,
    parameters: &Parameters,
    extensions: impl IntoIterator<Item = &'a Arc<dyn EvaluationContextExtension>>,
) -> EvaluationContext {
    let mut merged = EvaluationContext::with_root(context.root().clone());
    for extension in extensions {
        log::trace!("Applying evaluation context extension {}", extension.extension_id());
        for (name, value) in extension.properties() {
            merged.set_variable(name, value);
        }
    }
    for parameter in parameters {
        if let Some(name) = parameter.name() {
            if let Some(value) = context.variable(name) {
                merged.set_variable(name, value.clone());
            }
        }
    }
    merged
}

/// Binds arguments and contributes the properties of the registered extensions
#[derive(Clone, Default)]
pub struct ExtensionAwareEvaluationContextProvider {
    extensions: Vec<Arc<dyn EvaluationContextExtension>>,
}

impl ExtensionAwareEvaluationContextProvider {
    /// Provider consulting `extensions` in registration order
    pub fn new(extensions: Vec<Arc<dyn EvaluationContextExtension>>) -> Self {
        Self { extensions }
    }

    /// Register another extension
    pub fn with_extension(mut self, extension: Arc<dyn EvaluationContextExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    fn required<'a>(
        &'a self,
        dependencies: &'a ExpressionDependencies,
    ) -> impl Iterator<Item = &'a Arc<dyn EvaluationContextExtension>> + 'a {
        self.extensions
            .iter()
            .filter(move |extension| is_required(|name| extension.provides(name), dependencies))
    }
}

impl QueryMethodEvaluationContextProvider for ExtensionAwareEvaluationContextProvider {
    fn evaluation_context(
        &self,
        parameters: &Parameters,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext> {
        let context = bind_arguments(parameters, values)?;
        Ok(apply_extensions(
            context,
            parameters,
            self.required(dependencies),
        ))
    }
}

impl fmt::Debug for ExtensionAwareEvaluationContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionAwareEvaluationContextProvider")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Extension-aware provider that can also resolve reactive extensions.
///
/// The synchronous path consults the plain extensions only; the asynchronous path
/// additionally resolves the required reactive extensions concurrently and applies
/// them after the plain ones.
#[derive(Clone, Default)]
pub struct ReactiveExtensionAwareEvaluationContextProvider {
    sync: ExtensionAwareEvaluationContextProvider,
    reactive_extensions: Vec<Arc<dyn ReactiveEvaluationContextExtension>>,
}

impl ReactiveExtensionAwareEvaluationContextProvider {
    /// Provider with plain and reactive extensions, each in registration order
    pub fn new(
        extensions: Vec<Arc<dyn EvaluationContextExtension>>,
        reactive_extensions: Vec<Arc<dyn ReactiveEvaluationContextExtension>>,
    ) -> Self {
        Self {
            sync: ExtensionAwareEvaluationContextProvider::new(extensions),
            reactive_extensions,
        }
    }

    /// Register another plain extension
    pub fn with_extension(mut self, extension: Arc<dyn EvaluationContextExtension>) -> Self {
        self.sync = self.sync.with_extension(extension);
        self
    }

    /// Register another reactive extension
    pub fn with_reactive_extension(
        mut self,
        extension: Arc<dyn ReactiveEvaluationContextExtension>,
    ) -> Self {
        self.reactive_extensions.push(extension);
        self
    }
}

impl QueryMethodEvaluationContextProvider for ReactiveExtensionAwareEvaluationContextProvider {
    fn evaluation_context(
        &self,
        parameters: &Parameters,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext> {
        self.sync
            .evaluation_context(parameters, values, dependencies)
    }

    fn as_reactive(
        self: Arc<Self>,
    ) -> Option<Arc<dyn ReactiveQueryMethodEvaluationContextProvider>> {
        Some(self)
    }
}

#[async_trait]
impl ReactiveQueryMethodEvaluationContextProvider
    for ReactiveExtensionAwareEvaluationContextProvider
{
    async fn evaluation_context_later(
        &self,
        parameters: &Parameters,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<EvaluationContext> {
        let context = bind_arguments(parameters, values)?;

        let pending = self
            .reactive_extensions
            .iter()
            .filter(|extension| is_required(|name| extension.provides(name), dependencies))
            .map(|extension| extension.resolve());
        let resolved = try_join_all(pending).await?;

        let extensions = self.sync.required(dependencies).chain(resolved.iter());
        Ok(apply_extensions(context, parameters, extensions))
    }
}

impl fmt::Debug for ReactiveExtensionAwareEvaluationContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveExtensionAwareEvaluationContextProvider")
            .field("extensions", &self.sync.extensions.len())
            .field("reactive_extensions", &self.reactive_extensions.len())
            .finish()
    }
}
