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

//! Error types for value conversion and value expression support
//!
//! Every failure in this crate is either reported through a boolean check
//! (`has_value_converter`) or returned verbatim. Nothing is retried or
//! suppressed locally.

use thiserror::Error;

/// Result type alias for value mapping operations
pub type Result<T> = std::result::Result<T, ValueMappingError>;

/// Result type for expression parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Message used when a lookup happens before any converter factory can be resolved
pub const NO_CONVERTER_FACTORY_MESSAGE: &str = "PropertyValueConverterFactory is not set; \
    either set the converter factory or call init() to initialize the conversions";

/// Errors raised by the conversion and expression support layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueMappingError {
    /// No converter factory is resolvable at lookup time
    #[error("{}", NO_CONVERTER_FACTORY_MESSAGE)]
    MissingConverterFactory,

    /// A converter was requested for a property that has none
    #[error("No PropertyValueConverter registered for {property}")]
    ConverterNotFound {
        /// Identity of the property, `Owner.name`
        property: String,
    },

    /// Argument rejected before any state was touched
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable error message
        message: String,
    },

    /// Expression text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A converter failed to read or write a value
    #[error("Conversion of {property} failed: {message}")]
    Conversion {
        /// Identity of the property being converted
        property: String,
        /// Human-readable error message
        message: String,
    },

    /// An evaluation context could not be built or an expression could not be resolved
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// Human-readable error message
        message: String,
    },

    /// Malformed configuration document
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message
        message: String,
    },
}

impl ValueMappingError {
    /// Create a not-found error for the given property identity
    pub fn converter_not_found(property: impl ToString) -> Self {
        Self::ConverterNotFound {
            property: property.to_string(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion(property: impl ToString, message: impl Into<String>) -> Self {
        Self::Conversion {
            property: property.to_string(),
            message: message.into(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error stems from a caller or setup mistake rather than data
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConverterFactory
                | Self::InvalidArgument { .. }
                | Self::Configuration { .. }
        )
    }
}

/// Errors produced while parsing value expression text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A `${` or `#{` block was opened but never closed
    #[error("Unclosed '{delimiter}' starting at position {position}")]
    Unclosed {
        /// The opening delimiter
        delimiter: String,
        /// Position of the opening delimiter
        position: usize,
    },

    /// A reference block with nothing inside it
    #[error("Empty reference at position {position}")]
    EmptyReference {
        /// Position of the opening delimiter
        position: usize,
    },

    /// An index reference that is not a non-negative integer
    #[error("Invalid index '{value}' at position {position}")]
    InvalidIndex {
        /// The offending index text
        value: String,
        /// Position of the index text
        position: usize,
    },

    /// Parser-specific failure
    #[error("Parse error at position {position}: {message}")]
    Custom {
        /// Position in the input where the error occurred
        position: usize,
        /// Human-readable error message
        message: String,
    },
}

impl ParseError {
    /// Create a parser-specific error
    pub fn custom(position: usize, message: impl Into<String>) -> Self {
        Self::Custom {
            position,
            message: message.into(),
        }
    }

    /// Position in the input the error refers to
    pub fn position(&self) -> usize {
        match self {
            Self::Unclosed { position, .. }
            | Self::EmptyReference { position }
            | Self::InvalidIndex { position, .. }
            | Self::Custom { position, .. } => *position,
        }
    }
}
