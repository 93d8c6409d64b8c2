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

//! Pairing of a provider factory with an expression parser

use super::factory::{
    QueryMethodValueEvaluationContextProvider, QueryMethodValueEvaluationContextProviderFactory,
    ValueContextProvider,
};
use super::parameters::Parameters;
use crate::config::ValueMappingConfig;
use crate::error::{ParseResult, Result};
use crate::expression::{
    CacheStats, ConcurrentLruCache, DEFAULT_EXPRESSION_CACHE_CAPACITY, SharedValueExpression,
    ValueExpressionParser,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Entry point used by the query layer to parse and evaluate value expressions
pub trait ValueExpressionSupport: Send + Sync {
    /// Provider for a query method with the given parameters
    fn create_value_context_provider(
        &self,
        parameters: Arc<Parameters>,
    ) -> Result<ValueContextProvider>;

    /// Parser for expression text
    fn value_expression_parser(&self) -> Arc<dyn ValueExpressionParser>;
}

/// Plain pairing of a provider factory and a parser
#[derive(Clone)]
pub struct ValueExpressionSupportHolder {
    factory: Arc<QueryMethodValueEvaluationContextProviderFactory>,
    parser: Arc<dyn ValueExpressionParser>,
}

impl ValueExpressionSupportHolder {
    /// Pair `factory` with `parser`
    pub fn new(
        factory: QueryMethodValueEvaluationContextProviderFactory,
        parser: Arc<dyn ValueExpressionParser>,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
            parser,
        }
    }

    /// Bound provider factory
    pub fn provider_factory(&self) -> &QueryMethodValueEvaluationContextProviderFactory {
        &self.factory
    }
}

impl ValueExpressionSupport for ValueExpressionSupportHolder {
    fn create_value_context_provider(
        &self,
        parameters: Arc<Parameters>,
    ) -> Result<ValueContextProvider> {
        self.factory.create(parameters)
    }

    fn value_expression_parser(&self) -> Arc<dyn ValueExpressionParser> {
        Arc::clone(&self.parser)
    }
}

impl fmt::Debug for ValueExpressionSupportHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueExpressionSupportHolder")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

/// Support holder that memoizes parsed expressions in a bounded LRU cache.
///
/// Clones share the cache, so the handle returned by
/// [`ValueExpressionSupport::value_expression_parser`] sees the same entries as the
/// holder itself.
#[derive(Clone)]
pub struct CachingValueExpressionSupportHolder {
    holder: ValueExpressionSupportHolder,
    cache: Arc<ConcurrentLruCache<String, SharedValueExpression>>,
}

impl CachingValueExpressionSupportHolder {
    /// Wrap `holder` with a cache of the default capacity
    pub fn from_holder(holder: ValueExpressionSupportHolder) -> Self {
        Self::with_capacity(holder, DEFAULT_EXPRESSION_CACHE_CAPACITY)
    }

    /// Build the wrapped holder from its parts
    pub fn new(
        factory: QueryMethodValueEvaluationContextProviderFactory,
        parser: Arc<dyn ValueExpressionParser>,
    ) -> Self {
        Self::from_holder(ValueExpressionSupportHolder::new(factory, parser))
    }

    /// Wrap `holder` with a cache sized from the configuration
    pub fn from_config(config: &ValueMappingConfig, holder: ValueExpressionSupportHolder) -> Self {
        Self::with_capacity(holder, config.expression_cache_capacity)
    }

    /// Wrap `holder` with a cache holding at most `capacity` expressions
    pub fn with_capacity(holder: ValueExpressionSupportHolder, capacity: usize) -> Self {
        Self {
            holder,
            cache: Arc::new(ConcurrentLruCache::new(capacity)),
        }
    }

    /// Bound provider factory
    pub fn provider_factory(&self) -> &QueryMethodValueEvaluationContextProviderFactory {
        self.holder.provider_factory()
    }

    /// Expression cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Parse (cached) and evaluate `expression` against one invocation's arguments
    pub fn evaluate(
        &self,
        expression: &str,
        provider: &dyn QueryMethodValueEvaluationContextProvider,
        values: &[Value],
    ) -> Result<Value> {
        let parsed = self.parse(expression)?;
        let context = provider.evaluation_context(values, parsed.dependencies())?;
        parsed.evaluate(&context)
    }

    /// Asynchronous variant of [`Self::evaluate`]; uses the synchronous protocol when
    /// the provider has no asynchronous one
    pub async fn evaluate_later(
        &self,
        expression: &str,
        provider: &ValueContextProvider,
        values: &[Value],
    ) -> Result<Value> {
        let parsed = self.parse(expression)?;
        let context = match provider.as_reactive() {
            Some(reactive) => {
                reactive
                    .evaluation_context_later(values, parsed.dependencies())
                    .await?
            }
            None => provider.evaluation_context(values, parsed.dependencies())?,
        };
        parsed.evaluate(&context)
    }
}

impl ValueExpressionParser for CachingValueExpressionSupportHolder {
    fn parse(&self, expression: &str) -> ParseResult<SharedValueExpression> {
        self.cache
            .get_or_try_insert_with(expression, |text| self.holder.parser.parse(text))
    }
}

impl ValueExpressionSupport for CachingValueExpressionSupportHolder {
    fn create_value_context_provider(
        &self,
        parameters: Arc<Parameters>,
    ) -> Result<ValueContextProvider> {
        self.holder.create_value_context_provider(parameters)
    }

    fn value_expression_parser(&self) -> Arc<dyn ValueExpressionParser> {
        Arc::new(self.clone())
    }
}

impl fmt::Debug for CachingValueExpressionSupportHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingValueExpressionSupportHolder")
            .field("holder", &self.holder)
            .field("cache", &self.cache)
            .finish()
    }
}
