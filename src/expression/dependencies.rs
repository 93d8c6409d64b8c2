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

//! Named values an expression needs from its evaluation context

use indexmap::IndexSet;
use std::fmt;

/// Ordered set of variable names an expression references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionDependencies {
    names: IndexSet<String>,
}

impl ExpressionDependencies {
    /// No dependencies
    pub fn none() -> Self {
        Self::default()
    }

    /// Dependencies on the given names, duplicates collapsed
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a dependency; returns false when it was already present
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Union of both sets, keeping this set's order first
    pub fn merge(&self, other: &ExpressionDependencies) -> Self {
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        Self { names }
    }

    /// Whether the name is required
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether nothing is required
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of required names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Required names in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExpressionDependencies {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::of(iter)
    }
}

impl fmt::Display for ExpressionDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}")?;
        }
        write!(f, "]")
    }
}
