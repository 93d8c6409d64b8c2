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

//! Value expressions, their evaluation contexts and the parsed expression cache

pub mod cache;
pub mod context;
pub mod dependencies;
pub mod environment;
pub mod value_expression;

pub use cache::{CacheStats, ConcurrentLruCache, DEFAULT_EXPRESSION_CACHE_CAPACITY};
pub use context::{EvaluationContext, ValueEvaluationContext};
pub use dependencies::ExpressionDependencies;
pub use environment::{CompositeEnvironment, Environment, MapEnvironment, SystemEnvironment};
pub use value_expression::{
    CompositeValueExpression, ReferenceTarget, SharedValueExpression, TemplateExpressionParser,
    TemplateSegment, ValueExpression, ValueExpressionParser,
};
