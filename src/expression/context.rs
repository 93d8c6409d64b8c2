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

//! Evaluation contexts

use super::environment::Environment;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Raw context built by a context provider: a root object plus named variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    root: Value,
    variables: FxHashMap<String, Value>,
}

impl EvaluationContext {
    /// Create a context with a `null` root and no variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context around the given root object
    pub fn with_root(root: Value) -> Self {
        Self {
            root,
            variables: FxHashMap::default(),
        }
    }

    /// Root object
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Bind a variable, replacing any previous binding
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Builder style variant of [`Self::set_variable`]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Value of a variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Whether a variable is bound
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// All bound variables
    pub fn variables(&self) -> &FxHashMap<String, Value> {
        &self.variables
    }
}

/// Final context an expression is evaluated against: the raw context plus the environment
#[derive(Clone)]
pub struct ValueEvaluationContext {
    environment: Arc<dyn Environment>,
    evaluation_context: EvaluationContext,
}

impl ValueEvaluationContext {
    /// Combine an environment with a raw evaluation context
    pub fn of(environment: Arc<dyn Environment>, evaluation_context: EvaluationContext) -> Self {
        Self {
            environment,
            evaluation_context,
        }
    }

    /// Ambient configuration
    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Raw context produced by the provider
    pub fn evaluation_context(&self) -> &EvaluationContext {
        &self.evaluation_context
    }

    /// Resolve a `${...}` placeholder key
    pub fn property(&self, key: &str) -> Option<String> {
        self.environment.property(key)
    }

    /// Resolve a context variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.evaluation_context.variable(name)
    }
}

impl PartialEq for ValueEvaluationContext {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.environment), Arc::as_ptr(&other.environment))
            && self.evaluation_context == other.evaluation_context
    }
}

impl fmt::Debug for ValueEvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueEvaluationContext")
            .field("evaluation_context", &self.evaluation_context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::environment::MapEnvironment;
    use serde_json::json;

    #[test]
    fn test_variables() {
        let context = EvaluationContext::with_root(json!([1, 2]))
            .with_variable("name", json!("Ada"));
        assert_eq!(context.root(), &json!([1, 2]));
        assert_eq!(context.variable("name"), Some(&json!("Ada")));
        assert!(!context.has_variable("age"));
    }

    #[test]
    fn test_value_context_equality_tracks_environment_identity() {
        let env: Arc<dyn Environment> = Arc::new(MapEnvironment::new().with_property("a", "1"));
        let other_env: Arc<dyn Environment> =
            Arc::new(MapEnvironment::new().with_property("a", "1"));
        let raw = EvaluationContext::new().with_variable("x", json!(1));

        let left = ValueEvaluationContext::of(Arc::clone(&env), raw.clone());
        let right = ValueEvaluationContext::of(Arc::clone(&env), raw.clone());
        let foreign = ValueEvaluationContext::of(other_env, raw);

        assert_eq!(left, right);
        assert_ne!(left, foreign);
        assert_eq!(left.property("a").as_deref(), Some("1"));
        assert_eq!(left.variable("x"), Some(&json!(1)));
    }
}
