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

//! Tuple sketches carrying an array of doubles per retained key.
//!
//! Retention works like a theta sketch over the key hashes; the value arrays
//! of equal keys are summed, both on update and on union.
//!
//! ```text
//!  ┌──────┬─────┬───────┬──────────┬─────────┬───────┬───────────────────────────┐
//!  │family│ ver │ flags │num_values│count u32│ theta │ count × (hash, n × f64)   │
//!  └──────┴─────┴───────┴──────────┴─────────┴───────┴───────────────────────────┘
//! ```

use std::collections::BTreeMap;

use sketchmerge_common::hash_utils::hash_scalar;
use sketchmerge_common::{codec_err, config_err, exec_err, Result, ScalarValue};

use crate::codec::{ByteReader, FAMILY_TUPLE};
use crate::theta::{
    check_nominal_entries, check_sampling_probability, estimate, start_theta, theta_hash,
    FLAG_EMPTY, MAX_THETA,
};

const SERIAL_VERSION: u8 = 1;

pub const MAX_NUM_VALUES: u8 = 127;

/// Returns an error unless `num_values` is in `1..=127`
pub fn check_num_values(num_values: usize) -> Result<()> {
    if num_values == 0 || num_values > usize::from(MAX_NUM_VALUES) {
        return config_err!(
            "number of values must be between 1 and {}, got {}",
            MAX_NUM_VALUES,
            num_values
        );
    }
    Ok(())
}

fn trim(entries: &mut BTreeMap<u64, Vec<f64>>, k: usize) -> Option<u64> {
    let cut = *entries.keys().nth(k)?;
    entries.split_off(&cut);
    Some(cut)
}

fn add_values(target: &mut [f64], values: &[f64]) {
    for (t, v) in target.iter_mut().zip(values) {
        *t += v;
    }
}

/// Mutable tuple sketch built from `(key, values)` records
#[derive(Debug, Clone)]
pub struct UpdateArrayOfDoublesSketch {
    nominal_entries: usize,
    num_values: usize,
    theta: u64,
    entries: BTreeMap<u64, Vec<f64>>,
    empty: bool,
}

impl UpdateArrayOfDoublesSketch {
    pub fn new(
        nominal_entries: usize,
        sampling_probability: f64,
        num_values: usize,
    ) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        check_sampling_probability(sampling_probability)?;
        check_num_values(num_values)?;
        Ok(Self {
            nominal_entries,
            num_values,
            theta: start_theta(sampling_probability),
            entries: BTreeMap::new(),
            empty: true,
        })
    }

    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Add `values` to the array kept for `key`. Null keys are ignored.
    pub fn update(&mut self, key: &ScalarValue, values: &[f64]) -> Result<()> {
        if values.len() != self.num_values {
            return exec_err!(
                "tuple sketch expects {} values per key, got {}",
                self.num_values,
                values.len()
            );
        }
        if let Some(hash) = hash_scalar(key) {
            self.update_hash(hash, values);
        }
        Ok(())
    }

    fn update_hash(&mut self, hash: u64, values: &[f64]) {
        self.empty = false;
        let Some(h) = theta_hash(hash) else {
            return;
        };
        if h >= self.theta {
            return;
        }
        self.entries
            .entry(h)
            .and_modify(|sum| add_values(sum, values))
            .or_insert_with(|| values.to_vec());
        if self.entries.len() > 2 * self.nominal_entries {
            if let Some(theta) = trim(&mut self.entries, self.nominal_entries) {
                self.theta = theta;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    pub fn compact(&self) -> ArrayOfDoublesSketch {
        if self.empty {
            return ArrayOfDoublesSketch::empty(self.num_values);
        }
        let mut entries = self.entries.clone();
        let theta = trim(&mut entries, self.nominal_entries).unwrap_or(self.theta);
        ArrayOfDoublesSketch {
            num_values: self.num_values,
            theta,
            entries: entries.into_iter().collect(),
            empty: false,
        }
    }
}

/// Immutable tuple sketch, the serialized form
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOfDoublesSketch {
    num_values: usize,
    theta: u64,
    entries: Vec<(u64, Vec<f64>)>,
    empty: bool,
}

impl ArrayOfDoublesSketch {
    pub fn empty(num_values: usize) -> Self {
        Self {
            num_values,
            theta: MAX_THETA,
            entries: vec![],
            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn num_values(&self) -> usize {
        self.num_values
    }

    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    pub fn estimate(&self) -> f64 {
        if self.empty {
            return 0.0;
        }
        estimate(self.entries.len(), self.theta)
    }

    /// Per column sums of the retained value arrays
    pub fn value_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_values];
        for (_, values) in &self.entries {
            add_values(&mut sums, values);
        }
        sums
    }

    /// Per column sums scaled up by the sampling fraction
    pub fn estimated_value_sums(&self) -> Vec<f64> {
        let theta = self.theta();
        self.value_sums().into_iter().map(|s| s / theta).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let flags = if self.empty { FLAG_EMPTY } else { 0 };
        let mut out =
            Vec::with_capacity(16 + self.entries.len() * 8 * (1 + self.num_values));
        out.extend_from_slice(&[FAMILY_TUPLE, SERIAL_VERSION, flags, self.num_values as u8]);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.theta.to_le_bytes());
        for (hash, values) in &self.entries {
            out.extend_from_slice(&hash.to_le_bytes());
            for v in values {
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        reader.read_header(FAMILY_TUPLE, SERIAL_VERSION)?;
        let flags = reader.read_u8()?;
        let num_values = usize::from(reader.read_u8()?);
        if check_num_values(num_values).is_err() {
            return codec_err!("serialized tuple sketch has {} values per key", num_values);
        }
        let count = reader.read_u32()? as usize;
        let theta = reader.read_u64()?;
        if theta == 0 || theta > MAX_THETA {
            return codec_err!("invalid theta {}", theta);
        }
        let empty = flags & FLAG_EMPTY != 0;
        if empty && (count != 0 || theta != MAX_THETA) {
            return codec_err!("empty tuple sketch with {} entries", count);
        }

        let mut entries: Vec<(u64, Vec<f64>)> = Vec::with_capacity(count.min(bytes.len() / 8));
        for _ in 0..count {
            let hash = reader.read_u64()?;
            if hash == 0 || hash >= theta {
                return codec_err!("tuple sketch hash {} outside (0, {})", hash, theta);
            }
            if entries.last().map_or(false, |(last, _)| *last >= hash) {
                return codec_err!("tuple sketch has unsorted keys");
            }
            let values = (0..num_values)
                .map(|_| reader.read_f64())
                .collect::<Result<Vec<_>>>()?;
            entries.push((hash, values));
        }
        reader.finish()?;
        Ok(Self {
            num_values,
            theta,
            entries,
            empty,
        })
    }
}

/// Union of [`ArrayOfDoublesSketch`]es, summing the values of equal keys
#[derive(Debug, Clone)]
pub struct ArrayOfDoublesUnion {
    nominal_entries: usize,
    num_values: usize,
    theta: u64,
    entries: BTreeMap<u64, Vec<f64>>,
    empty: bool,
}

impl ArrayOfDoublesUnion {
    pub fn new(nominal_entries: usize, num_values: usize) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        check_num_values(num_values)?;
        Ok(Self {
            nominal_entries,
            num_values,
            theta: MAX_THETA,
            entries: BTreeMap::new(),
            empty: true,
        })
    }

    pub fn update(&mut self, sketch: &ArrayOfDoublesSketch) -> Result<()> {
        if sketch.num_values != self.num_values {
            return codec_err!(
                "cannot union a tuple sketch with {} values into one with {}",
                sketch.num_values,
                self.num_values
            );
        }
        if sketch.empty {
            return Ok(());
        }
        self.empty = false;
        if sketch.theta < self.theta {
            self.theta = sketch.theta;
            self.entries.split_off(&self.theta);
        }
        for (hash, values) in &sketch.entries {
            if *hash >= self.theta {
                break;
            }
            self.entries
                .entry(*hash)
                .and_modify(|sum| add_values(sum, values))
                .or_insert_with(|| values.clone());
        }
        if let Some(theta) = trim(&mut self.entries, self.nominal_entries) {
            self.theta = theta;
        }
        Ok(())
    }

    pub fn num_values(&self) -> usize {
        self.num_values
    }

    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    pub fn result(&self) -> ArrayOfDoublesSketch {
        if self.empty {
            return ArrayOfDoublesSketch::empty(self.num_values);
        }
        ArrayOfDoublesSketch {
            num_values: self.num_values,
            theta: self.theta,
            entries: self
                .entries
                .iter()
                .map(|(hash, values)| (*hash, values.clone()))
                .collect(),
            empty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use sketchmerge_common::SketchError;

    use super::*;

    fn sketch_of(
        k: usize,
        num_values: usize,
        records: impl IntoIterator<Item = (i64, Vec<f64>)>,
    ) -> ArrayOfDoublesSketch {
        let mut sketch = UpdateArrayOfDoublesSketch::new(k, 1.0, num_values).unwrap();
        for (key, values) in records {
            sketch.update(&ScalarValue::from(key), &values).unwrap();
        }
        sketch.compact()
    }

    #[test]
    fn equal_keys_sum_their_values() {
        let sketch = sketch_of(
            16,
            2,
            vec![(1, vec![1.0, 10.0]), (2, vec![2.0, 20.0]), (1, vec![3.0, 30.0])],
        );
        assert_eq!(sketch.num_retained(), 2);
        assert_eq!(sketch.estimate(), 2.0);
        assert_eq!(sketch.value_sums(), vec![6.0, 60.0]);
    }

    #[test]
    fn wrong_value_count_is_an_execution_error() {
        let mut sketch = UpdateArrayOfDoublesSketch::new(16, 1.0, 2).unwrap();
        assert!(matches!(
            sketch.update(&ScalarValue::from(1i64), &[1.0]),
            Err(SketchError::Execution(_))
        ));
    }

    #[test]
    fn union_sums_overlapping_keys() {
        let a = sketch_of(1024, 1, (0..100).map(|k| (k, vec![1.0])));
        let b = sketch_of(1024, 1, (50..150).map(|k| (k, vec![1.0])));
        let mut union = ArrayOfDoublesUnion::new(1024, 1).unwrap();
        union.update(&a).unwrap();
        union.update(&b).unwrap();
        union.update(&ArrayOfDoublesSketch::empty(1)).unwrap();
        let result = union.result();
        assert_eq!(result.estimate(), 150.0);
        assert_eq!(result.value_sums(), vec![200.0]);
    }

    #[test]
    fn union_in_estimation_mode_matches_direct_retention() {
        let records: Vec<(i64, Vec<f64>)> = (0..20_000).map(|k| (k, vec![2.0])).collect();
        let direct = sketch_of(256, 1, records.clone());
        let mut union = ArrayOfDoublesUnion::new(256, 1).unwrap();
        for chunk in records.chunks(4_000) {
            union.update(&sketch_of(256, 1, chunk.to_vec())).unwrap();
        }
        let result = union.result();
        assert_eq!(result.num_retained(), 256);
        assert_eq!(result.theta(), direct.theta());
        assert_eq!(result, direct);
        let sums = result.estimated_value_sums();
        assert!((sums[0] - 40_000.0).abs() / 40_000.0 < 0.25);
    }

    #[test]
    fn mismatched_num_values_cannot_be_unioned() {
        let mut union = ArrayOfDoublesUnion::new(16, 2).unwrap();
        assert!(matches!(
            union.update(&ArrayOfDoublesSketch::empty(1)),
            Err(SketchError::Codec(_))
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        for sketch in [
            ArrayOfDoublesSketch::empty(3),
            sketch_of(64, 3, (0..1000).map(|k| (k, vec![k as f64, 0.5, -1.0]))),
        ] {
            let bytes = sketch.to_bytes();
            assert_eq!(ArrayOfDoublesSketch::from_bytes(&bytes).unwrap(), sketch);
        }
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        let bytes = sketch_of(64, 1, (0..10).map(|k| (k, vec![1.0]))).to_bytes();
        assert!(ArrayOfDoublesSketch::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        let mut zero_values = bytes.clone();
        zero_values[3] = 0;
        assert!(ArrayOfDoublesSketch::from_bytes(&zero_values).is_err());
        assert!(ArrayOfDoublesSketch::from_bytes(&bytes[..3]).is_err());
    }
}
