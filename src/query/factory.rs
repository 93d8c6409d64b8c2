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

//! Factory producing value evaluation context providers for query methods
//!
//! The factory binds a query method's [`Parameters`] to a delegate provider and an
//! [`Environment`]. Whether the produced provider can also build contexts
//! asynchronously is decided once, in [`QueryMethodValueEvaluationContextProviderFactory::create`],
//! and encoded in the [`ValueContextProvider`] variant.

use super::parameters::Parameters;
use super::provider::{
    QueryMethodEvaluationContextProvider, ReactiveQueryMethodEvaluationContextProvider,
};
use crate::config::ValueMappingConfig;
use crate::error::Result;
use crate::expression::{Environment, ExpressionDependencies, ValueEvaluationContext};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds final evaluation contexts for one query method
pub trait QueryMethodValueEvaluationContextProvider: Send + Sync {
    /// Parameters bound at creation
    fn parameters(&self) -> &Arc<Parameters>;

    /// Context for one invocation
    fn evaluation_context(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext>;
}

/// Provider that can also build the context asynchronously
#[async_trait]
pub trait ReactiveQueryMethodValueEvaluationContextProvider:
    QueryMethodValueEvaluationContextProvider
{
    /// Context for one invocation, produced once the delegate resolves
    async fn evaluation_context_later(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext>;
}

/// Synchronous-only provider
#[derive(Clone)]
pub struct DefaultQueryMethodValueEvaluationContextProvider {
    environment: Arc<dyn Environment>,
    parameters: Arc<Parameters>,
    delegate: Arc<dyn QueryMethodEvaluationContextProvider>,
}

impl QueryMethodValueEvaluationContextProvider
    for DefaultQueryMethodValueEvaluationContextProvider
{
    fn parameters(&self) -> &Arc<Parameters> {
        &self.parameters
    }

    fn evaluation_context(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext> {
        let context = self
            .delegate
            .evaluation_context(&self.parameters, values, dependencies)?;
        Ok(ValueEvaluationContext::of(
            Arc::clone(&self.environment),
            context,
        ))
    }
}

impl fmt::Debug for DefaultQueryMethodValueEvaluationContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultQueryMethodValueEvaluationContextProvider")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Provider implementing both the synchronous and the asynchronous protocol
#[derive(Clone)]
pub struct DefaultReactiveQueryMethodValueEvaluationContextProvider {
    environment: Arc<dyn Environment>,
    parameters: Arc<Parameters>,
    delegate: Arc<dyn ReactiveQueryMethodEvaluationContextProvider>,
}

impl QueryMethodValueEvaluationContextProvider
    for DefaultReactiveQueryMethodValueEvaluationContextProvider
{
    fn parameters(&self) -> &Arc<Parameters> {
        &self.parameters
    }

    fn evaluation_context(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext> {
        let context = self
            .delegate
            .evaluation_context(&self.parameters, values, dependencies)?;
        Ok(ValueEvaluationContext::of(
            Arc::clone(&self.environment),
            context,
        ))
    }
}

#[async_trait]
impl ReactiveQueryMethodValueEvaluationContextProvider
    for DefaultReactiveQueryMethodValueEvaluationContextProvider
{
    async fn evaluation_context_later(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext> {
        let context = self
            .delegate
            .evaluation_context_later(&self.parameters, values, dependencies)
            .await?;
        Ok(ValueEvaluationContext::of(
            Arc::clone(&self.environment),
            context,
        ))
    }
}

impl fmt::Debug for DefaultReactiveQueryMethodValueEvaluationContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultReactiveQueryMethodValueEvaluationContextProvider")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Provider produced by the factory, tagged with its capability
#[derive(Debug, Clone)]
pub enum ValueContextProvider {
    /// Synchronous protocol only
    Sync(DefaultQueryMethodValueEvaluationContextProvider),
    /// Synchronous and asynchronous protocol
    SyncAndAsync(DefaultReactiveQueryMethodValueEvaluationContextProvider),
}

impl ValueContextProvider {
    /// Whether [`Self::as_reactive`] returns a provider
    pub fn supports_async(&self) -> bool {
        matches!(self, Self::SyncAndAsync(_))
    }

    /// Asynchronous protocol, when available
    pub fn as_reactive(&self) -> Option<&dyn ReactiveQueryMethodValueEvaluationContextProvider> {
        match self {
            Self::Sync(_) => None,
            Self::SyncAndAsync(provider) => {
                Some(provider as &dyn ReactiveQueryMethodValueEvaluationContextProvider)
            }
        }
    }

    fn inner(&self) -> &dyn QueryMethodValueEvaluationContextProvider {
        match self {
            Self::Sync(provider) => provider,
            Self::SyncAndAsync(provider) => provider,
        }
    }
}

impl QueryMethodValueEvaluationContextProvider for ValueContextProvider {
    fn parameters(&self) -> &Arc<Parameters> {
        self.inner().parameters()
    }

    fn evaluation_context(
        &self,
        values: &[Value],
        dependencies: &ExpressionDependencies,
    ) -> Result<ValueEvaluationContext> {
        self.inner().evaluation_context(values, dependencies)
    }
}

/// Creates [`ValueContextProvider`]s bound to an environment and a delegate
#[derive(Clone)]
pub struct QueryMethodValueEvaluationContextProviderFactory {
    environment: Arc<dyn Environment>,
    delegate: Arc<dyn QueryMethodEvaluationContextProvider>,
    async_support: bool,
}

impl QueryMethodValueEvaluationContextProviderFactory {
    /// Factory with asynchronous support enabled
    pub fn new(
        environment: Arc<dyn Environment>,
        delegate: Arc<dyn QueryMethodEvaluationContextProvider>,
    ) -> Self {
        Self {
            environment,
            delegate,
            async_support: true,
        }
    }

    /// Factory honouring the `async_evaluation` setting
    pub fn from_config(
        config: &ValueMappingConfig,
        environment: Arc<dyn Environment>,
        delegate: Arc<dyn QueryMethodEvaluationContextProvider>,
    ) -> Self {
        Self::new(environment, delegate).with_async_support(config.async_evaluation)
    }

    /// Enable or disable asynchronous providers regardless of the delegate
    pub fn with_async_support(mut self, enabled: bool) -> Self {
        self.async_support = enabled;
        self
    }

    /// Whether asynchronous providers may be produced
    pub fn async_support(&self) -> bool {
        self.async_support
    }

    /// Ambient environment handed to every provider
    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Bind `parameters` into a provider.
    ///
    /// Fails with an invalid-argument error when the parameter metadata is malformed;
    /// nothing is constructed in that case.
    pub fn create(&self, parameters: Arc<Parameters>) -> Result<ValueContextProvider> {
        parameters.validate()?;

        let reactive = if self.async_support {
            Arc::clone(&self.delegate).as_reactive()
        } else {
            None
        };

        let provider = match reactive {
            Some(delegate) => ValueContextProvider::SyncAndAsync(
                DefaultReactiveQueryMethodValueEvaluationContextProvider {
                    environment: Arc::clone(&self.environment),
                    parameters,
                    delegate,
                },
            ),
            None => ValueContextProvider::Sync(DefaultQueryMethodValueEvaluationContextProvider {
                environment: Arc::clone(&self.environment),
                parameters,
                delegate: Arc::clone(&self.delegate),
            }),
        };

        log::debug!(
            "Created {} evaluation context provider for {} parameter(s)",
            if provider.supports_async() { "sync+async" } else { "sync" },
            provider.parameters().len()
        );
        Ok(provider)
    }
}

impl fmt::Debug for QueryMethodValueEvaluationContextProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMethodValueEvaluationContextProviderFactory")
            .field("async_support", &self.async_support)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValueMappingError;
    use crate::expression::{EvaluationContext, MapEnvironment};
    use crate::query::parameters::Parameter;
    use crate::query::provider::{
        DefaultQueryMethodEvaluationContextProvider,
        ReactiveExtensionAwareEvaluationContextProvider,
    };
    use serde_json::json;

    struct BrokenReactiveProvider;

    impl QueryMethodEvaluationContextProvider for BrokenReactiveProvider {
        fn evaluation_context(
            &self,
            _parameters: &Parameters,
            _values: &[Value],
            _dependencies: &ExpressionDependencies,
        ) -> Result<EvaluationContext> {
            Ok(EvaluationContext::new())
        }

        fn as_reactive(
            self: Arc<Self>,
        ) -> Option<Arc<dyn ReactiveQueryMethodEvaluationContextProvider>> {
            Some(self)
        }
    }

    #[async_trait]
    impl ReactiveQueryMethodEvaluationContextProvider for BrokenReactiveProvider {
        async fn evaluation_context_later(
            &self,
            _parameters: &Parameters,
            _values: &[Value],
            _dependencies: &ExpressionDependencies,
        ) -> Result<EvaluationContext> {
            Err(ValueMappingError::evaluation("upstream unavailable"))
        }
    }

    fn environment() -> Arc<dyn Environment> {
        Arc::new(MapEnvironment::new().with_property("app.region", "eu"))
    }

    fn parameters() -> Arc<Parameters> {
        Parameters::builder().named("name", "String").build()
    }

    #[test]
    fn test_sync_delegate_yields_sync_provider() {
        let factory = QueryMethodValueEvaluationContextProviderFactory::new(
            environment(),
            Arc::new(DefaultQueryMethodEvaluationContextProvider),
        );
        let provider = factory.create(parameters()).unwrap();

        assert!(!provider.supports_async());
        assert!(provider.as_reactive().is_none());

        let context = provider
            .evaluation_context(&[json!("Ada")], &ExpressionDependencies::none())
            .unwrap();
        assert_eq!(context.variable("name"), Some(&json!("Ada")));
        assert_eq!(context.property("app.region").as_deref(), Some("eu"));
    }

    #[test]
    fn test_disabled_async_support_forces_sync_provider() {
        let factory = QueryMethodValueEvaluationContextProviderFactory::new(
            environment(),
            Arc::new(ReactiveExtensionAwareEvaluationContextProvider::default()),
        )
        .with_async_support(false);

        assert!(!factory.create(parameters()).unwrap().supports_async());
    }

    #[test]
    fn test_config_controls_async_support() {
        let config = ValueMappingConfig::builder()
            .async_evaluation(false)
            .build()
            .unwrap();
        let factory = QueryMethodValueEvaluationContextProviderFactory::from_config(
            &config,
            environment(),
            Arc::new(ReactiveExtensionAwareEvaluationContextProvider::default()),
        );
        assert!(!factory.async_support());
    }

    #[test]
    fn test_malformed_parameters_rejected() {
        let factory = QueryMethodValueEvaluationContextProviderFactory::new(
            environment(),
            Arc::new(DefaultQueryMethodEvaluationContextProvider),
        );
        let malformed = Arc::new(Parameters::new(vec![Parameter::new(3, None, "String")]));

        let err = factory.create(malformed).unwrap_err();
        assert!(matches!(err, ValueMappingError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_reactive_delegate_yields_equivalent_async_provider() {
        let env = environment();
        let factory = QueryMethodValueEvaluationContextProviderFactory::new(
            Arc::clone(&env),
            Arc::new(ReactiveExtensionAwareEvaluationContextProvider::default()),
        );
        let provider = factory.create(parameters()).unwrap();
        let reactive = provider.as_reactive().expect("async capable provider");

        let values = [json!("Ada")];
        let dependencies = ExpressionDependencies::of(["name"]);
        let later = reactive
            .evaluation_context_later(&values, &dependencies)
            .await
            .unwrap();
        let now = provider.evaluation_context(&values, &dependencies).unwrap();

        assert_eq!(later, now);
        assert!(Arc::ptr_eq(later.environment(), &env));
    }

    #[tokio::test]
    async fn test_async_delegate_failure_propagates_unchanged() {
        let factory = QueryMethodValueEvaluationContextProviderFactory::new(
            environment(),
            Arc::new(BrokenReactiveProvider),
        );
        let provider = factory.create(parameters()).unwrap();
        let err = provider
            .as_reactive()
            .unwrap()
            .evaluation_context_later(&[json!("x")], &ExpressionDependencies::none())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Evaluation error: upstream unavailable");
    }
}
