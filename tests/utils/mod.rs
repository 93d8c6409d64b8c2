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

//! Shared helpers for integration tests

#![allow(dead_code)]

use octofhir_value_mapping::Result;
use octofhir_value_mapping::convert::{
    ConverterRef, FnPropertyValueConverter, ValueConversionContext,
};
use serde_json::Value;
use std::sync::Arc;

/// Route `log` output through env_logger once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reverse(value: &Value, _context: &dyn ValueConversionContext) -> Result<Value> {
    Ok(match value {
        Value::String(text) => Value::String(text.chars().rev().collect()),
        other => other.clone(),
    })
}

/// Converter storing strings reversed
pub fn reversing_converter() -> ConverterRef {
    Arc::new(FnPropertyValueConverter::new(reverse, reverse))
}
