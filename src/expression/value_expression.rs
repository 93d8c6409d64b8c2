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

//! Value expressions and the default template parser
//!
//! The default grammar is deliberately small: literal text mixed with
//! `${key}` / `${key:default}` environment placeholders and `#{name.path}` /
//! `#{[index].path}` references into the evaluation context. A template
//! consisting of exactly one reference evaluates to the referenced JSON value;
//! anything else renders to a string.

use super::context::ValueEvaluationContext;
use super::dependencies::ExpressionDependencies;
use crate::error::{ParseError, ParseResult, Result, ValueMappingError};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a parsed expression
pub type SharedValueExpression = Arc<dyn ValueExpression>;

/// Parsed, immutable form of an expression string
pub trait ValueExpression: Send + Sync + fmt::Debug {
    /// Source text this expression was parsed from
    fn expression_string(&self) -> &str;

    /// Context variables the expression reads
    fn dependencies(&self) -> &ExpressionDependencies;

    /// Whether evaluation ignores the context entirely
    fn is_literal(&self) -> bool;

    /// Resolve the expression against a context
    fn evaluate(&self, context: &ValueEvaluationContext) -> Result<Value>;
}

/// Turns expression text into a [`ValueExpression`]
pub trait ValueExpressionParser: Send + Sync {
    /// Parse the expression text
    fn parse(&self, expression: &str) -> ParseResult<SharedValueExpression>;
}

/// Where a context reference starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// Named variable, `#{name}`
    Variable(String),
    /// Positional element of the root array, `#{[0]}`
    Index(usize),
}

/// One piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Text copied verbatim
    Literal(String),
    /// Environment lookup with optional fallback
    Placeholder {
        /// Property key
        key: String,
        /// Value used when the key is undefined
        default: Option<String>,
    },
    /// Context lookup followed by field navigation
    Reference {
        /// Variable or root index
        target: ReferenceTarget,
        /// Object fields navigated after the target
        path: Vec<String>,
    },
}

/// Expression produced by [`TemplateExpressionParser`]
#[derive(Debug, Clone)]
pub struct CompositeValueExpression {
    source: String,
    segments: SmallVec<[TemplateSegment; 4]>,
    dependencies: ExpressionDependencies,
}

impl CompositeValueExpression {
    /// Parsed segments in source order
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    fn evaluate_segment(
        &self,
        segment: &TemplateSegment,
        context: &ValueEvaluationContext,
    ) -> Result<Value> {
        match segment {
            TemplateSegment::Literal(text) => Ok(Value::String(text.clone())),
            TemplateSegment::Placeholder { key, default } => context
                .property(key)
                .or_else(|| default.clone())
                .map(Value::String)
                .ok_or_else(|| {
                    ValueMappingError::evaluation(format!(
                        "Could not resolve placeholder '${{{key}}}' in '{}'",
                        self.source
                    ))
                }),
            TemplateSegment::Reference { target, path } => {
                let start = match target {
                    ReferenceTarget::Variable(name) => context.variable(name).ok_or_else(|| {
                        ValueMappingError::evaluation(format!(
                            "Variable '{name}' is not bound in the evaluation context"
                        ))
                    })?,
                    ReferenceTarget::Index(index) => context
                        .evaluation_context()
                        .root()
                        .get(*index)
                        .ok_or_else(|| {
                            ValueMappingError::evaluation(format!(
                                "No argument at index {index}"
                            ))
                        })?,
                };
                let resolved = path
                    .iter()
                    .try_fold(start, |value, field| value.get(field.as_str()));
                Ok(resolved.cloned().unwrap_or(Value::Null))
            }
        }
    }
}

impl ValueExpression for CompositeValueExpression {
    fn expression_string(&self) -> &str {
        &self.source
    }

    fn dependencies(&self) -> &ExpressionDependencies {
        &self.dependencies
    }

    fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, TemplateSegment::Literal(_)))
    }

    fn evaluate(&self, context: &ValueEvaluationContext) -> Result<Value> {
        match self.segments.as_slice() {
            [] => Ok(Value::String(String::new())),
            [single] => self.evaluate_segment(single, context),
            segments => {
                let mut rendered = String::new();
                for segment in segments {
                    match self.evaluate_segment(segment, context)? {
                        Value::String(text) => rendered.push_str(&text),
                        other => rendered.push_str(&other.to_string()),
                    }
                }
                Ok(Value::String(rendered))
            }
        }
    }
}

/// Default parser for `${...}` / `#{...}` templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExpressionParser;

impl TemplateExpressionParser {
    /// Create the parser
    pub fn new() -> Self {
        Self
    }
}

impl ValueExpressionParser for TemplateExpressionParser {
    fn parse(&self, expression: &str) -> ParseResult<SharedValueExpression> {
        let segments = TemplateScanner::new(expression).scan()?;
        let dependencies = segments
            .iter()
            .filter_map(|segment| match segment {
                TemplateSegment::Reference {
                    target: ReferenceTarget::Variable(name),
                    ..
                } => Some(name.clone()),
                _ => None,
            })
            .collect();

        Ok(Arc::new(CompositeValueExpression {
            source: expression.to_string(),
            segments,
            dependencies,
        }))
    }
}

/// Single pass scanner over template text
struct TemplateScanner<'input> {
    input: &'input str,
    position: usize,
}

impl<'input> TemplateScanner<'input> {
    fn new(input: &'input str) -> Self {
        Self { input, position: 0 }
    }

    fn rest(&self) -> &'input str {
        &self.input[self.position..]
    }

    fn scan(mut self) -> ParseResult<SmallVec<[TemplateSegment; 4]>> {
        let mut segments = SmallVec::new();
        let mut literal = String::new();

        while self.position < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("\\${") || rest.starts_with("\\#{") {
                literal.push_str(&rest[1..3]);
                self.position += 3;
            } else if rest.starts_with("${") || rest.starts_with("#{") {
                if !literal.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(self.scan_block()?);
            } else {
                // Advance one char at a time to stay on UTF-8 boundaries
                let ch = rest.chars().next().unwrap_or_default();
                literal.push(ch);
                self.position += ch.len_utf8();
            }
        }

        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }
        Ok(segments)
    }

    fn scan_block(&mut self) -> ParseResult<TemplateSegment> {
        let input = self.input;
        let start = self.position;
        let delimiter = &input[start..start + 2];
        let body_start = start + 2;

        let close = input[body_start..]
            .find('}')
            .map(|offset| body_start + offset)
            .ok_or_else(|| ParseError::Unclosed {
                delimiter: delimiter.to_string(),
                position: start,
            })?;
        self.position = close + 1;

        let body = &input[body_start..close];
        if body.trim().is_empty() {
            return Err(ParseError::EmptyReference { position: start });
        }

        if delimiter == "${" {
            Ok(Self::placeholder(body))
        } else {
            Self::reference(body, body_start)
        }
    }

    fn placeholder(body: &str) -> TemplateSegment {
        match body.split_once(':') {
            Some((key, default)) => TemplateSegment::Placeholder {
                key: key.trim().to_string(),
                default: Some(default.to_string()),
            },
            None => TemplateSegment::Placeholder {
                key: body.trim().to_string(),
                default: None,
            },
        }
    }

    fn reference(body: &str, body_start: usize) -> ParseResult<TemplateSegment> {
        let leading = body.len() - body.trim_start().len();
        let body = body.trim();
        let offset = body_start + leading;

        let (target, path) = if let Some(indexed) = body.strip_prefix('[') {
            let close = indexed.find(']').ok_or_else(|| ParseError::Unclosed {
                delimiter: "[".to_string(),
                position: offset,
            })?;
            let raw = &indexed[..close];
            let index = raw.trim().parse::<usize>().map_err(|_| ParseError::InvalidIndex {
                value: raw.to_string(),
                position: offset + 1,
            })?;
            let remainder = &indexed[close + 1..];
            let path = match remainder.strip_prefix('.') {
                Some(path) => path,
                None if remainder.is_empty() => "",
                None => {
                    return Err(ParseError::custom(
                        offset + close + 2,
                        format!("expected '.' after index, found '{remainder}'"),
                    ));
                }
            };
            (ReferenceTarget::Index(index), path)
        } else {
            let (name, path) = body.split_once('.').unwrap_or((body, ""));
            (ReferenceTarget::Variable(name.to_string()), path)
        };

        let path = if path.is_empty() && !body.ends_with('.') {
            Vec::new()
        } else {
            path.split('.')
                .map(|field| {
                    if field.is_empty() {
                        Err(ParseError::custom(offset, format!("empty path segment in '{body}'")))
                    } else {
                        Ok(field.to_string())
                    }
                })
                .collect::<ParseResult<Vec<_>>>()?
        };

        if let ReferenceTarget::Variable(name) = &target {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ParseError::custom(offset, format!("invalid variable name '{name}'")));
            }
        }

        Ok(TemplateSegment::Reference { target, path })
    }
}
