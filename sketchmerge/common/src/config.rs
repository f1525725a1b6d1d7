// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! sketchmerge Configuration Options
//!
//! Every function that takes part in one merge tree must be built from the
//! same options; nothing here is renegotiated once a merge has started.

use std::collections::HashMap;

use arrow::datatypes::DataType;

use crate::error::Result;
use crate::scalar::ScalarValue;
use crate::config_err;

/// Configuration option "sketch.hll.lg_k"
pub const OPT_HLL_LG_K: &str = "sketch.hll.lg_k";
/// Configuration option "sketch.hll.target_type"
pub const OPT_HLL_TARGET_TYPE: &str = "sketch.hll.target_type";
/// Configuration option "sketch.theta.nominal_entries"
pub const OPT_THETA_NOMINAL_ENTRIES: &str = "sketch.theta.nominal_entries";
/// Configuration option "sketch.theta.sampling_probability"
pub const OPT_THETA_SAMPLING_PROBABILITY: &str = "sketch.theta.sampling_probability";
/// Configuration option "sketch.theta.ordered"
pub const OPT_THETA_ORDERED: &str = "sketch.theta.ordered";
/// Configuration option "sketch.tuple.nominal_entries"
pub const OPT_TUPLE_NOMINAL_ENTRIES: &str = "sketch.tuple.nominal_entries";
/// Configuration option "sketch.tuple.num_values"
pub const OPT_TUPLE_NUM_VALUES: &str = "sketch.tuple.num_values";
/// Configuration option "sketch.tuple.sampling_probability"
pub const OPT_TUPLE_SAMPLING_PROBABILITY: &str = "sketch.tuple.sampling_probability";

/// Definition of a configuration option
pub struct ConfigDefinition {
    /// key used to identifier this configuration option
    key: String,
    /// Description to be used in generated documentation
    description: String,
    /// Data type of this option
    data_type: DataType,
    /// Default value
    default_value: ScalarValue,
}

impl ConfigDefinition {
    /// Create a configuration option definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        data_type: DataType,
        default_value: ScalarValue,
    ) -> Self {
        Self {
            key: name.into(),
            description: description.into(),
            data_type,
            default_value,
        }
    }

    /// Create a configuration option definition with a boolean value
    pub fn new_bool(name: &str, description: &str, default_value: bool) -> Self {
        Self::new(name, description, DataType::Boolean, default_value.into())
    }

    /// Create a configuration option definition with an unsigned integer value
    pub fn new_u64(name: &str, description: &str, default_value: u64) -> Self {
        Self::new(name, description, DataType::UInt64, default_value.into())
    }

    /// Create a configuration option definition with a float value
    pub fn new_f64(name: &str, description: &str, default_value: f64) -> Self {
        Self::new(name, description, DataType::Float64, default_value.into())
    }

    /// Create a configuration option definition with a string value
    pub fn new_string(name: &str, description: &str, default_value: &str) -> Self {
        Self::new(name, description, DataType::Utf8, default_value.into())
    }
}

/// Contains definitions for all built-in configuration options
pub struct BuiltInConfigs {
    /// Configuration option definitions
    config_definitions: Vec<ConfigDefinition>,
}

impl Default for BuiltInConfigs {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltInConfigs {
    /// Create a new BuiltInConfigs struct containing definitions for all built-in
    /// configuration options
    pub fn new() -> Self {
        Self {
            config_definitions: vec![
                ConfigDefinition::new_u64(
                    OPT_HLL_LG_K,
                    "Log2 of the number of HLL registers. Larger values are more \
                    accurate and use more memory. Valid range is 4 to 21.",
                    12,
                ),
                ConfigDefinition::new_string(
                    OPT_HLL_TARGET_TYPE,
                    "Register width of serialized HLL results: HLL_4, HLL_6 or HLL_8.",
                    "HLL_4",
                ),
                ConfigDefinition::new_u64(
                    OPT_THETA_NOMINAL_ENTRIES,
                    "Number of hashes a theta sketch retains. Must be a power of two.",
                    4096,
                ),
                ConfigDefinition::new_f64(
                    OPT_THETA_SAMPLING_PROBABILITY,
                    "Probability with which a raw value is admitted into a theta sketch.",
                    1.0,
                ),
                ConfigDefinition::new_bool(
                    OPT_THETA_ORDERED,
                    "When set to true, serialized theta sketches keep their hashes sorted.",
                    true,
                ),
                ConfigDefinition::new_u64(
                    OPT_TUPLE_NOMINAL_ENTRIES,
                    "Number of keys a tuple sketch retains. Must be a power of two.",
                    4096,
                ),
                ConfigDefinition::new_u64(
                    OPT_TUPLE_NUM_VALUES,
                    "Number of double values attached to every key of a tuple sketch.",
                    1,
                ),
                ConfigDefinition::new_f64(
                    OPT_TUPLE_SAMPLING_PROBABILITY,
                    "Probability with which a raw key is admitted into a tuple sketch.",
                    1.0,
                ),
            ],
        }
    }

    /// Generate documentation that can be included in the user guide
    pub fn generate_config_markdown() -> String {
        let configs = Self::new();
        let mut docs = "| key | type | default | description |\n".to_string();
        docs += "|-----|------|---------|-------------|\n";
        for config in configs.config_definitions {
            docs += &format!(
                "| {} | {} | {} | {} |\n",
                config.key, config.data_type, config.default_value, config.description
            );
        }
        docs
    }
}

/// Configuration options struct. This can contain values for built-in and custom options
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    options: HashMap<String, ScalarValue>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigOptions {
    /// Create new ConfigOptions struct
    pub fn new() -> Self {
        let mut options = HashMap::new();
        let built_in = BuiltInConfigs::new();
        for config_def in &built_in.config_definitions {
            options.insert(config_def.key.clone(), config_def.default_value.clone());
        }
        Self { options }
    }

    /// set a configuration option
    pub fn set(&mut self, key: &str, value: ScalarValue) {
        self.options.insert(key.to_string(), value);
    }

    /// set a boolean configuration option
    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, ScalarValue::Boolean(Some(value)))
    }

    /// set an unsigned integer configuration option
    pub fn set_u64(&mut self, key: &str, value: u64) {
        self.set(key, ScalarValue::UInt64(Some(value)))
    }

    /// set a float configuration option
    pub fn set_f64(&mut self, key: &str, value: f64) {
        self.set(key, ScalarValue::Float64(Some(value)))
    }

    /// set a string configuration option
    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, ScalarValue::Utf8(Some(value.into())))
    }

    /// get a configuration option
    pub fn get(&self, key: &str) -> Option<ScalarValue> {
        self.options.get(key).cloned()
    }

    /// get a boolean configuration option
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(ScalarValue::Boolean(Some(b))) => b,
            _ => false,
        }
    }

    /// get a required boolean option
    pub fn require_bool(&self, key: &str) -> Result<bool> {
        match self.options.get(key) {
            Some(ScalarValue::Boolean(Some(b))) => Ok(*b),
            Some(other) => {
                config_err!("option {} must be a boolean, got {:?}", key, other)
            }
            None => config_err!("option {} is not set", key),
        }
    }

    /// get a required unsigned integer option; integer values of other
    /// widths are accepted when non-negative
    pub fn require_u64(&self, key: &str) -> Result<u64> {
        match self.options.get(key) {
            Some(ScalarValue::UInt64(Some(v))) => Ok(*v),
            Some(ScalarValue::Int64(Some(v))) if *v >= 0 => Ok(*v as u64),
            Some(ScalarValue::Int32(Some(v))) if *v >= 0 => Ok(*v as u64),
            Some(other) => config_err!(
                "option {} must be a non-negative integer, got {:?}",
                key,
                other
            ),
            None => config_err!("option {} is not set", key),
        }
    }

    /// get a required float option; integers are widened
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        match self.options.get(key).and_then(|v| v.as_f64()) {
            Some(v) => Ok(v),
            None => config_err!("option {} must be set to a number", key),
        }
    }

    /// get a required string option
    pub fn require_string(&self, key: &str) -> Result<&str> {
        match self.options.get(key) {
            Some(ScalarValue::Utf8(Some(v))) => Ok(v.as_str()),
            Some(other) => config_err!("option {} must be a string, got {:?}", key, other),
            None => config_err!("option {} is not set", key),
        }
    }
}
