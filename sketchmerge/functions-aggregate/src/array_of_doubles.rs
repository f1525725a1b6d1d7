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

//! ArrayOfDoubles tuple family: distinct keys with summed value arrays.
//!
//! A raw record is `(key, v1, ..., vn)` where `n` is the family's
//! `num_values` and every value is numeric.

use std::mem::size_of;

use sketchmerge_common::config::{
    ConfigOptions, OPT_TUPLE_NOMINAL_ENTRIES, OPT_TUPLE_NUM_VALUES,
    OPT_TUPLE_SAMPLING_PROBABILITY,
};
use sketchmerge_common::{config_err, exec_err, Result, Tuple};
use sketchmerge_sketches::array_of_doubles::check_num_values;
use sketchmerge_sketches::theta::{
    check_nominal_entries, check_sampling_probability, DEFAULT_NOMINAL_ENTRIES,
};
use sketchmerge_sketches::{
    ArrayOfDoublesSketch, ArrayOfDoublesUnion, UpdateArrayOfDoublesSketch,
};

use crate::family::{raw_value, SketchFamily, SketchMerger, SketchUpdater};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayOfDoublesFamily {
    nominal_entries: usize,
    sampling_probability: f64,
    num_values: usize,
}

impl ArrayOfDoublesFamily {
    pub fn try_new(
        nominal_entries: usize,
        sampling_probability: f64,
        num_values: usize,
    ) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        check_sampling_probability(sampling_probability)?;
        check_num_values(num_values)?;
        Ok(Self {
            nominal_entries,
            sampling_probability,
            num_values,
        })
    }

    pub fn try_from_config(config: &ConfigOptions) -> Result<Self> {
        let nominal_entries = config_usize(config, OPT_TUPLE_NOMINAL_ENTRIES)?;
        let num_values = config_usize(config, OPT_TUPLE_NUM_VALUES)?;
        Self::try_new(
            nominal_entries,
            config.require_f64(OPT_TUPLE_SAMPLING_PROBABILITY)?,
            num_values,
        )
    }

    pub fn nominal_entries(&self) -> usize {
        self.nominal_entries
    }

    pub fn sampling_probability(&self) -> f64 {
        self.sampling_probability
    }

    pub fn num_values(&self) -> usize {
        self.num_values
    }
}

fn config_usize(config: &ConfigOptions, key: &str) -> Result<usize> {
    let value = config.require_u64(key)?;
    match usize::try_from(value) {
        Ok(value) => Ok(value),
        Err(_) => config_err!("{} out of range: {}", key, value),
    }
}

impl Default for ArrayOfDoublesFamily {
    fn default() -> Self {
        Self {
            nominal_entries: DEFAULT_NOMINAL_ENTRIES,
            sampling_probability: 1.0,
            num_values: 1,
        }
    }
}

impl SketchFamily for ArrayOfDoublesFamily {
    type Sketch = ArrayOfDoublesSketch;
    type Updater = UpdateArrayOfDoublesSketch;
    type Union = ArrayOfDoublesUnion;
    type Target = ();

    const NAME: &'static str = "ArrayOfDoubles";

    fn new_updater(&self) -> Result<UpdateArrayOfDoublesSketch> {
        UpdateArrayOfDoublesSketch::new(
            self.nominal_entries,
            self.sampling_probability,
            self.num_values,
        )
    }

    fn new_union(&self) -> Result<ArrayOfDoublesUnion> {
        ArrayOfDoublesUnion::new(self.nominal_entries, self.num_values)
    }

    fn empty_sketch(&self) -> Result<ArrayOfDoublesSketch> {
        Ok(ArrayOfDoublesSketch::empty(self.num_values))
    }

    fn decode(&self, bytes: &[u8]) -> Result<ArrayOfDoublesSketch> {
        ArrayOfDoublesSketch::from_bytes(bytes)
    }

    fn encode(&self, sketch: &ArrayOfDoublesSketch) -> Vec<u8> {
        sketch.to_bytes()
    }

    fn estimate(&self, sketch: &ArrayOfDoublesSketch) -> f64 {
        sketch.estimate()
    }

    fn target(&self) {}
}

impl SketchUpdater for UpdateArrayOfDoublesSketch {
    type Sketch = ArrayOfDoublesSketch;

    fn update_record(&mut self, record: &Tuple) -> Result<()> {
        let key = raw_value(ArrayOfDoublesFamily::NAME, record)?;
        if key.is_null() {
            return Ok(());
        }
        let n = self.num_values();
        if record.len() < n + 1 {
            return exec_err!(
                "tuple record {} needs a key and {} values",
                record,
                n
            );
        }
        let values = record.fields()[1..=n]
            .iter()
            .enumerate()
            .map(|(i, value)| match value.as_f64() {
                Some(v) => Ok(v),
                None => exec_err!(
                    "value {} of tuple record {} is not numeric: {:?}",
                    i + 1,
                    record,
                    value
                ),
            })
            .collect::<Result<Vec<_>>>()?;
        self.update(key, &values)
    }

    fn freeze(&self) -> ArrayOfDoublesSketch {
        self.compact()
    }

    fn size(&self) -> usize {
        self.num_retained() * size_of::<u64>() * (1 + self.num_values())
    }
}

impl SketchMerger for ArrayOfDoublesUnion {
    type Sketch = ArrayOfDoublesSketch;
    type Target = ();

    fn fold(&mut self, sketch: &ArrayOfDoublesSketch) -> Result<()> {
        self.update(sketch)
    }

    fn result(&self, _target: ()) -> ArrayOfDoublesSketch {
        ArrayOfDoublesUnion::result(self)
    }

    fn size(&self) -> usize {
        self.num_retained() * size_of::<u64>() * (1 + self.num_values())
    }
}
