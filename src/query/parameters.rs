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

//! Query method parameter metadata

use crate::error::{Result, ValueMappingError};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// One declared parameter of a query method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    index: usize,
    name: Option<String>,
    type_name: String,
}

impl Parameter {
    /// Describe the parameter at `index`
    pub fn new(index: usize, name: Option<String>, type_name: impl Into<String>) -> Self {
        Self {
            index,
            name,
            type_name: type_name.into(),
        }
    }

    /// Position in the argument list
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declared name, if the method metadata retains one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the parameter can be referenced by name
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

/// Ordered, immutable parameter list of a query method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    parameters: Vec<Parameter>,
}

impl Parameters {
    /// Wrap a parameter list; see [`Self::validate`] for the accepted shape
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    /// A method without parameters
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a builder assigning positions automatically
    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the method takes no parameters
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameters in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    /// Parameter at a position
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    /// Parameter with the given name
    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == Some(name))
    }

    /// Check that positions match declaration order and names are unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();
        for (position, parameter) in self.parameters.iter().enumerate() {
            if parameter.index != position {
                return Err(ValueMappingError::invalid_argument(format!(
                    "Parameter declared at position {position} claims index {}",
                    parameter.index
                )));
            }
            if let Some(name) = parameter.name() {
                if !seen.insert(name) {
                    return Err(ValueMappingError::invalid_argument(format!(
                        "Parameter name '{name}' is declared more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builder for [`Parameters`]
#[derive(Debug, Default)]
pub struct ParametersBuilder {
    parameters: Vec<Parameter>,
}

impl ParametersBuilder {
    /// Append a named parameter
    pub fn named(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let index = self.parameters.len();
        self.parameters
            .push(Parameter::new(index, Some(name.into()), type_name));
        self
    }

    /// Append a parameter without a retained name
    pub fn unnamed(mut self, type_name: impl Into<String>) -> Self {
        let index = self.parameters.len();
        self.parameters.push(Parameter::new(index, None, type_name));
        self
    }

    /// Finish and share the parameter list
    pub fn build(self) -> Arc<Parameters> {
        Arc::new(Parameters::new(self.parameters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_positions() {
        let parameters = Parameters::builder()
            .named("firstname", "String")
            .unnamed("Pageable")
            .named("age", "int")
            .build();

        assert_eq!(parameters.len(), 3);
        assert_eq!(parameters.by_name("age").map(Parameter::index), Some(2));
        assert!(!parameters.get(1).unwrap().is_named());
        assert!(parameters.validate().is_ok());
    }

    #[test]
    fn test_out_of_order_index_rejected() {
        let parameters = Parameters::new(vec![Parameter::new(1, None, "String")]);
        let err = parameters.validate().unwrap_err();
        assert!(matches!(err, ValueMappingError::InvalidArgument { .. }));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let parameters = Parameters::new(vec![
            Parameter::new(0, Some("x".into()), "String"),
            Parameter::new(1, Some("x".into()), "String"),
        ]);
        let err = parameters.validate().unwrap_err();
        assert!(err.to_string().contains("'x' is declared more than once"));
    }
}
