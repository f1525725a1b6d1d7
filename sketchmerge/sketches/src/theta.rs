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

//! Theta (k minimum values) distinct count sketches.
//!
//! A theta sketch retains every 63-bit hash below `theta`, and at most
//! `nominal_entries` of them; the estimate is `retained / (theta / MAX_THETA)`.
//! Compact sketches serialize as:
//!
//! ```text
//!  ┌──────┬─────┬───────┬─────┬─────────┬───────┬──────────────────┐
//!  │family│ ver │ flags │ pad │count u32│ theta │ count × hash u64 │
//!  └──────┴─────┴───────┴─────┴─────────┴───────┴──────────────────┘
//! ```

use std::collections::BTreeSet;

use sketchmerge_common::hash_utils::hash_scalar;
use sketchmerge_common::{codec_err, config_err, Result, ScalarValue};

use crate::codec::{ByteReader, FAMILY_THETA};

pub const MIN_LG_NOMINAL_ENTRIES: u32 = 4;
pub const MAX_LG_NOMINAL_ENTRIES: u32 = 26;
pub const DEFAULT_NOMINAL_ENTRIES: usize = 4096;

/// Theta of a sketch that has not been sampled or trimmed
pub const MAX_THETA: u64 = i64::MAX as u64;

const SERIAL_VERSION: u8 = 3;

pub(crate) const FLAG_EMPTY: u8 = 1;
pub(crate) const FLAG_ORDERED: u8 = 2;

/// Returns an error unless `nominal_entries` is a supported power of two
pub fn check_nominal_entries(nominal_entries: usize) -> Result<()> {
    let min = 1usize << MIN_LG_NOMINAL_ENTRIES;
    let max = 1usize << MAX_LG_NOMINAL_ENTRIES;
    if !nominal_entries.is_power_of_two() || nominal_entries < min || nominal_entries > max
    {
        return config_err!(
            "nominal entries must be a power of two between {} and {}, got {}",
            min,
            max,
            nominal_entries
        );
    }
    Ok(())
}

/// Returns an error unless `p` is in `(0, 1]`
pub fn check_sampling_probability(p: f64) -> Result<()> {
    if !(p > 0.0 && p <= 1.0) {
        return config_err!("sampling probability must be in (0, 1], got {}", p);
    }
    Ok(())
}

/// Starting theta of an update sketch sampling with probability `p`
pub(crate) fn start_theta(p: f64) -> u64 {
    if p >= 1.0 {
        MAX_THETA
    } else {
        ((p * MAX_THETA as f64) as u64).max(1)
    }
}

/// Sketch coordinate of a 64-bit value hash. Zero is reserved.
#[inline]
pub(crate) fn theta_hash(hash: u64) -> Option<u64> {
    let h = hash >> 1;
    (h != 0).then_some(h)
}

pub(crate) fn estimate(retained: usize, theta: u64) -> f64 {
    retained as f64 / (theta as f64 / MAX_THETA as f64)
}

/// Keep the `k` smallest hashes, returning the new theta if anything was cut
fn trim(entries: &mut BTreeSet<u64>, k: usize) -> Option<u64> {
    let cut = *entries.iter().nth(k)?;
    entries.split_off(&cut);
    Some(cut)
}

/// Mutable theta sketch built from raw values
#[derive(Debug, Clone)]
pub struct UpdateThetaSketch {
    nominal_entries: usize,
    theta: u64,
    entries: BTreeSet<u64>,
    empty: bool,
}

impl UpdateThetaSketch {
    pub fn new(nominal_entries: usize, sampling_probability: f64) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        check_sampling_probability(sampling_probability)?;
        Ok(Self {
            nominal_entries,
            theta: start_theta(sampling_probability),
            entries: BTreeSet::new(),
            empty: true,
        })
    }

    /// Present a raw value to the sketch. Nulls are ignored.
    pub fn update(&mut self, value: &ScalarValue) {
        if let Some(hash) = hash_scalar(value) {
            self.update_hash(hash);
        }
    }

    pub fn update_hash(&mut self, hash: u64) {
        self.empty = false;
        let Some(h) = theta_hash(hash) else {
            return;
        };
        if h >= self.theta {
            return;
        }
        self.entries.insert(h);
        // let the set grow to twice its nominal size before rebuilding
        if self.entries.len() > 2 * self.nominal_entries {
            if let Some(theta) = trim(&mut self.entries, self.nominal_entries) {
                self.theta = theta;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn estimate(&self) -> f64 {
        self.compact(true).estimate()
    }

    /// Hashes currently held, which may exceed `nominal_entries` until the
    /// next rebuild
    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    /// Immutable snapshot holding at most `nominal_entries` hashes
    pub fn compact(&self, ordered: bool) -> CompactThetaSketch {
        if self.empty {
            return CompactThetaSketch::empty(ordered);
        }
        let mut entries = self.entries.clone();
        let theta = trim(&mut entries, self.nominal_entries).unwrap_or(self.theta);
        CompactThetaSketch {
            theta,
            entries: entries.into_iter().collect(),
            empty: false,
            ordered,
        }
    }
}

/// Immutable theta sketch, the serialized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactThetaSketch {
    theta: u64,
    entries: Vec<u64>,
    empty: bool,
    ordered: bool,
}

impl CompactThetaSketch {
    pub fn empty(ordered: bool) -> Self {
        Self {
            theta: MAX_THETA,
            entries: vec![],
            empty: true,
            ordered,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Sampling fraction, `theta / MAX_THETA`
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    pub fn hashes(&self) -> &[u64] {
        &self.entries
    }

    pub fn estimate(&self) -> f64 {
        if self.empty {
            return 0.0;
        }
        estimate(self.entries.len(), self.theta)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0;
        if self.empty {
            flags |= FLAG_EMPTY;
        }
        if self.ordered {
            flags |= FLAG_ORDERED;
        }
        let mut out = Vec::with_capacity(16 + 8 * self.entries.len());
        out.extend_from_slice(&[FAMILY_THETA, SERIAL_VERSION, flags, 0]);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.theta.to_le_bytes());
        for hash in &self.entries {
            out.extend_from_slice(&hash.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        reader.read_header(FAMILY_THETA, SERIAL_VERSION)?;
        let flags = reader.read_u8()?;
        reader.read_u8()?;
        let count = reader.read_u32()? as usize;
        let theta = reader.read_u64()?;
        if theta == 0 || theta > MAX_THETA {
            return codec_err!("invalid theta {}", theta);
        }
        let empty = flags & FLAG_EMPTY != 0;
        let ordered = flags & FLAG_ORDERED != 0;
        if empty && (count != 0 || theta != MAX_THETA) {
            return codec_err!("empty theta sketch with {} entries", count);
        }

        let mut entries = Vec::with_capacity(count.min(bytes.len() / 8));
        for _ in 0..count {
            let hash = reader.read_u64()?;
            if hash == 0 || hash >= theta {
                return codec_err!("theta sketch hash {} outside (0, {})", hash, theta);
            }
            if ordered && entries.last().map_or(false, |last| *last >= hash) {
                return codec_err!("ordered theta sketch has unsorted hashes");
            }
            entries.push(hash);
        }
        reader.finish()?;
        Ok(Self {
            theta,
            entries,
            empty,
            ordered,
        })
    }
}

/// Union of [`CompactThetaSketch`]es
#[derive(Debug, Clone)]
pub struct ThetaUnion {
    nominal_entries: usize,
    theta: u64,
    entries: BTreeSet<u64>,
    empty: bool,
}

impl ThetaUnion {
    pub fn new(nominal_entries: usize) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        Ok(Self {
            nominal_entries,
            theta: MAX_THETA,
            entries: BTreeSet::new(),
            empty: true,
        })
    }

    pub fn update(&mut self, sketch: &CompactThetaSketch) {
        if sketch.empty {
            return;
        }
        self.empty = false;
        if sketch.theta < self.theta {
            self.theta = sketch.theta;
            self.entries.split_off(&self.theta);
        }
        let theta = self.theta;
        self.entries
            .extend(sketch.entries.iter().copied().filter(|h| *h < theta));
        if let Some(theta) = trim(&mut self.entries, self.nominal_entries) {
            self.theta = theta;
        }
    }

    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    pub fn result(&self, ordered: bool) -> CompactThetaSketch {
        if self.empty {
            return CompactThetaSketch::empty(ordered);
        }
        CompactThetaSketch {
            theta: self.theta,
            entries: self.entries.iter().copied().collect(),
            empty: false,
            ordered,
        }
    }
}
