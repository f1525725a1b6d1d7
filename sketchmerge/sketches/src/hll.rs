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

//! An implementation of the [HyperLogLog] distinct count sketch.
//!
//! Registers are kept one byte wide in memory; [`HllType`] only selects the
//! register width of the serialized form. Serialization picks the smaller of
//! a sparse coupon list and the dense register array:
//!
//! ```text
//!  ┌──────┬─────┬──────┬──────────┬──────┬──────────────────────────────┐
//!  │family│ ver │ lg_k │ tgt type │ mode │ payload                      │
//!  └──────┴─────┴──────┴──────────┴──────┴──────────────────────────────┘
//!     mode 0: empty, no payload
//!     mode 1: u32 count, count × (u32 slot, u8 value)
//!     mode 2: registers packed 4, 6 or 8 bits wide; HLL_4 appends
//!             u32 count, count × (u32 slot, u8 value) for values >= 15
//! ```
//!
//! [HyperLogLog]: https://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf

use std::fmt;
use std::str::FromStr;

use sketchmerge_common::hash_utils::hash_scalar;
use sketchmerge_common::{codec_err, config_err, Result, ScalarValue, SketchError};

use crate::codec::{ByteReader, FAMILY_HLL};

pub const MIN_LG_K: u8 = 4;
pub const MAX_LG_K: u8 = 21;
pub const DEFAULT_LG_K: u8 = 12;

const SERIAL_VERSION: u8 = 1;

const MODE_EMPTY: u8 = 0;
const MODE_LIST: u8 = 1;
const MODE_DENSE: u8 = 2;

/// Nibble value marking an HLL_4 register that lives in the aux table
const AUX_MARKER: u8 = 15;

/// Register width of a serialized [`HllSketch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HllType {
    #[default]
    Hll4,
    Hll6,
    Hll8,
}

impl HllType {
    fn id(self) -> u8 {
        match self {
            HllType::Hll4 => 4,
            HllType::Hll6 => 6,
            HllType::Hll8 => 8,
        }
    }

    fn try_from_id(id: u8) -> Result<Self> {
        match id {
            4 => Ok(HllType::Hll4),
            6 => Ok(HllType::Hll6),
            8 => Ok(HllType::Hll8),
            other => codec_err!("invalid HLL target type id {}", other),
        }
    }
}

impl FromStr for HllType {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HLL_4" | "HLL4" => Ok(HllType::Hll4),
            "HLL_6" | "HLL6" => Ok(HllType::Hll6),
            "HLL_8" | "HLL8" => Ok(HllType::Hll8),
            _ => config_err!("unknown HLL type '{}', expected HLL_4, HLL_6 or HLL_8", s),
        }
    }
}

impl fmt::Display for HllType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HLL_{}", self.id())
    }
}

/// Returns an error unless `lg_k` is a supported register count exponent
pub fn check_lg_k(lg_k: u8) -> Result<()> {
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_k) {
        return config_err!(
            "lg_k must be between {} and {}, got {}",
            MIN_LG_K,
            MAX_LG_K,
            lg_k
        );
    }
    Ok(())
}

/// Largest value a register can hold for `lg_k`
#[inline]
fn max_rho(lg_k: u8) -> u8 {
    64 - lg_k + 1
}

/// HyperLogLog sketch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HllSketch {
    lg_k: u8,
    tgt_type: HllType,
    registers: Vec<u8>,
}

impl HllSketch {
    pub fn new(lg_k: u8, tgt_type: HllType) -> Result<Self> {
        check_lg_k(lg_k)?;
        Ok(Self {
            lg_k,
            tgt_type,
            registers: vec![0; 1 << lg_k],
        })
    }

    #[inline]
    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    #[inline]
    pub fn tgt_type(&self) -> HllType {
        self.tgt_type
    }

    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|r| *r == 0)
    }

    /// Present a raw value to the sketch. Nulls are ignored.
    pub fn update(&mut self, value: &ScalarValue) {
        if let Some(hash) = hash_scalar(value) {
            self.update_hash(hash);
        }
    }

    /// The top `lg_k` bits of `hash` select the register, the position of
    /// the first set bit in the rest is the candidate register value.
    pub fn update_hash(&mut self, hash: u64) {
        let lg_k = u32::from(self.lg_k);
        let slot = (hash >> (64 - lg_k)) as usize;
        let rest = hash << lg_k;
        let rho = if rest == 0 {
            max_rho(self.lg_k)
        } else {
            rest.leading_zeros() as u8 + 1
        };
        let register = &mut self.registers[slot];
        if rho > *register {
            *register = rho;
        }
    }

    /// Estimated number of distinct values presented to this sketch
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha = match self.lg_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let (sum, zeros) = self.registers.iter().fold((0.0, 0usize), |(sum, zeros), r| {
            (sum + 2f64.powi(-i32::from(*r)), zeros + usize::from(*r == 0))
        });
        let raw = alpha * m * m / sum;
        if raw <= 2.5 * m && zeros > 0 {
            // linear counting
            m * (m / zeros as f64).ln()
        } else {
            raw
        }
    }

    /// Copy of this sketch that serializes with `tgt_type` registers
    pub fn with_tgt_type(&self, tgt_type: HllType) -> Self {
        Self {
            lg_k: self.lg_k,
            tgt_type,
            registers: self.registers.clone(),
        }
    }

    pub(crate) fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Serialize into the smallest of the list or dense layouts
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        let mut out = vec![FAMILY_HLL, SERIAL_VERSION, self.lg_k, self.tgt_type.id()];
        let coupons: Vec<(usize, u8)> = self
            .registers
            .iter()
            .enumerate()
            .filter(|(_, r)| **r != 0)
            .map(|(slot, r)| (slot, *r))
            .collect();
        if coupons.is_empty() {
            out.push(MODE_EMPTY);
            return out;
        }

        let dense = self.dense_registers();
        if 4 + coupons.len() * 5 < dense.len() {
            out.push(MODE_LIST);
            write_coupons(&mut out, &coupons);
        } else {
            out.push(MODE_DENSE);
            out.extend_from_slice(&dense);
        }
        out
    }

    fn dense_registers(&self) -> Vec<u8> {
        match self.tgt_type {
            HllType::Hll8 => self.registers.clone(),
            HllType::Hll6 => pack6(&self.registers),
            HllType::Hll4 => {
                let mut out: Vec<u8> = self
                    .registers
                    .chunks(2)
                    .map(|pair| pair[0].min(AUX_MARKER) | (pair[1].min(AUX_MARKER) << 4))
                    .collect();
                let aux: Vec<(usize, u8)> = self
                    .registers
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| **r >= AUX_MARKER)
                    .map(|(slot, r)| (slot, *r))
                    .collect();
                write_coupons(&mut out, &aux);
                out
            }
        }
    }

    /// Deserialize the output of [`Self::to_compact_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        reader.read_header(FAMILY_HLL, SERIAL_VERSION)?;
        let lg_k = reader.read_u8()?;
        if check_lg_k(lg_k).is_err() {
            return codec_err!("serialized HLL sketch has invalid lg_k {}", lg_k);
        }
        let tgt_type = HllType::try_from_id(reader.read_u8()?)?;
        let mut sketch = Self::new(lg_k, tgt_type)?;
        let m = sketch.registers.len();

        match reader.read_u8()? {
            MODE_EMPTY => {}
            MODE_LIST => {
                for (slot, value) in read_coupons(&mut reader, m)? {
                    sketch.registers[slot] = value;
                }
            }
            MODE_DENSE => match tgt_type {
                HllType::Hll8 => sketch.registers.copy_from_slice(reader.take(m)?),
                HllType::Hll6 => {
                    sketch.registers = unpack6(reader.take(packed6_len(m))?, m)
                }
                HllType::Hll4 => {
                    let nibbles = reader.take(m / 2)?;
                    for (i, byte) in nibbles.iter().enumerate() {
                        sketch.registers[2 * i] = byte & 0x0f;
                        sketch.registers[2 * i + 1] = byte >> 4;
                    }
                    for (slot, value) in read_coupons(&mut reader, m)? {
                        if sketch.registers[slot] != AUX_MARKER {
                            return codec_err!(
                                "HLL_4 aux entry for slot {} without marker nibble",
                                slot
                            );
                        }
                        sketch.registers[slot] = value;
                    }
                }
            },
            other => return codec_err!("invalid HLL mode {}", other),
        }
        reader.finish()?;

        let limit = max_rho(lg_k);
        if let Some(bad) = sketch.registers.iter().find(|r| **r > limit) {
            return codec_err!("HLL register value {} exceeds {} for lg_k {}", bad, limit, lg_k);
        }
        Ok(sketch)
    }
}

fn write_coupons(out: &mut Vec<u8>, coupons: &[(usize, u8)]) {
    out.extend_from_slice(&(coupons.len() as u32).to_le_bytes());
    for (slot, value) in coupons {
        out.extend_from_slice(&(*slot as u32).to_le_bytes());
        out.push(*value);
    }
}

fn read_coupons(reader: &mut ByteReader, m: usize) -> Result<Vec<(usize, u8)>> {
    let count = reader.read_u32()? as usize;
    if count > m {
        return codec_err!("{} HLL coupons for {} registers", count, m);
    }
    let mut coupons = Vec::with_capacity(count);
    for _ in 0..count {
        let slot = reader.read_u32()? as usize;
        let value = reader.read_u8()?;
        if slot >= m || value == 0 {
            return codec_err!("invalid HLL coupon (slot {}, value {})", slot, value);
        }
        coupons.push((slot, value));
    }
    Ok(coupons)
}

#[inline]
fn packed6_len(m: usize) -> usize {
    (m * 6 + 7) / 8
}

fn pack6(registers: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; packed6_len(registers.len())];
    for (i, r) in registers.iter().enumerate() {
        let bit = i * 6;
        let (byte, shift) = (bit / 8, bit % 8);
        let v = u16::from(*r & 0x3f) << shift;
        out[byte] |= (v & 0xff) as u8;
        if byte + 1 < out.len() {
            out[byte + 1] |= (v >> 8) as u8;
        }
    }
    out
}

fn unpack6(bytes: &[u8], m: usize) -> Vec<u8> {
    (0..m)
        .map(|i| {
            let bit = i * 6;
            let (byte, shift) = (bit / 8, bit % 8);
            let lo = u16::from(bytes[byte]);
            let hi = bytes.get(byte + 1).map(|b| u16::from(*b)).unwrap_or(0);
            (((hi << 8 | lo) >> shift) & 0x3f) as u8
        })
        .collect()
}

/// Re-bucket registers of a `from`-bit sketch into `to` bits (`to < from`).
///
/// The slot bits that are dropped become the leading bits of the rank, so
/// the result is exactly the sketch the same stream would have produced at
/// `to` bits.
fn downsample(registers: &[u8], from: u8, to: u8) -> Vec<u8> {
    debug_assert!(to < from);
    let diff = from - to;
    let mask = (1usize << diff) - 1;
    let mut out = vec![0u8; 1 << to];
    for (slot, &value) in registers.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let low = slot & mask;
        let rho = if low == 0 {
            value + diff
        } else {
            diff - (usize::BITS - low.leading_zeros()) as u8 + 1
        };
        let target = &mut out[slot >> diff];
        if rho > *target {
            *target = rho;
        }
    }
    out
}

/// Union of [`HllSketch`]es.
///
/// Sketches with a smaller `lg_k` than the union's current one shrink the
/// union to their size; larger ones are down-sampled on the way in.
#[derive(Debug, Clone)]
pub struct HllUnion {
    lg_max_k: u8,
    lg_k: u8,
    registers: Vec<u8>,
}

impl HllUnion {
    pub fn new(lg_max_k: u8) -> Result<Self> {
        check_lg_k(lg_max_k)?;
        Ok(Self {
            lg_max_k,
            lg_k: lg_max_k,
            registers: vec![0; 1 << lg_max_k],
        })
    }

    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }

    /// Current register count exponent of the union
    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    pub fn update(&mut self, sketch: &HllSketch) {
        if sketch.is_empty() {
            return;
        }
        if sketch.lg_k < self.lg_k {
            self.registers = downsample(&self.registers, self.lg_k, sketch.lg_k);
            self.lg_k = sketch.lg_k;
        }
        let merge = |registers: &mut Vec<u8>, incoming: &[u8]| {
            for (r, v) in registers.iter_mut().zip(incoming) {
                if *v > *r {
                    *r = *v;
                }
            }
        };
        if sketch.lg_k == self.lg_k {
            merge(&mut self.registers, sketch.registers());
        } else {
            let incoming = downsample(sketch.registers(), sketch.lg_k, self.lg_k);
            merge(&mut self.registers, &incoming);
        }
    }

    /// Snapshot of the union as a sketch of `tgt_type`
    pub fn result(&self, tgt_type: HllType) -> HllSketch {
        HllSketch {
            lg_k: self.lg_k,
            tgt_type,
            registers: self.registers.clone(),
        }
    }

    pub fn estimate(&self) -> f64 {
        self.result(HllType::Hll8).estimate()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    // Assert the estimate of `$sketch` is within `$re` relative error of `$want`
    macro_rules! assert_estimate {
        ($sketch:expr, want = $want:expr, allowable_error = $re:expr) => {
            let ans = $sketch.estimate();
            let expected = $want as f64;
            let re = (expected - ans).abs() / expected;
            assert!(
                re < $re,
                "relative error {} is more than {} (got {}, want {})",
                re,
                $re,
                ans,
                expected
            );
        };
    }

    fn sketch_of(lg_k: u8, values: impl IntoIterator<Item = i64>) -> HllSketch {
        let mut sketch = HllSketch::new(lg_k, HllType::Hll4).unwrap();
        for v in values {
            sketch.update(&ScalarValue::Int64(Some(v)));
        }
        sketch
    }

    #[test]
    fn empty_sketch_estimates_zero() {
        let sketch = HllSketch::new(12, HllType::Hll8).unwrap();
        assert!(sketch.is_empty());
        assert_eq!(sketch.estimate(), 0.0);
    }

    #[test]
    fn nulls_are_ignored() {
        let mut sketch = HllSketch::new(10, HllType::Hll4).unwrap();
        sketch.update(&ScalarValue::Int64(None));
        sketch.update(&ScalarValue::Null);
        assert!(sketch.is_empty());
    }

    #[test]
    fn invalid_lg_k_is_a_configuration_error() {
        for lg_k in [0, 3, 22] {
            assert!(matches!(
                HllSketch::new(lg_k, HllType::Hll4),
                Err(SketchError::Configuration(_))
            ));
        }
    }

    #[test]
    fn parse_hll_type() {
        assert_eq!("HLL_6".parse::<HllType>().unwrap(), HllType::Hll6);
        assert_eq!("hll8".parse::<HllType>().unwrap(), HllType::Hll8);
        assert!("HLL_5".parse::<HllType>().is_err());
        assert_eq!(HllType::Hll4.to_string(), "HLL_4");
    }

    #[rstest]
    #[case(100)]
    #[case(10_000)]
    #[case(200_000)]
    fn estimate_within_error_bounds(#[case] n: i64) {
        let sketch = sketch_of(12, 0..n);
        assert_estimate!(sketch, want = n, allowable_error = 0.05);
    }

    #[test]
    fn duplicates_do_not_inflate_the_estimate() {
        let sketch = sketch_of(12, (0..5_000).chain(0..5_000).chain(0..5_000));
        assert_estimate!(sketch, want = 5_000, allowable_error = 0.05);
    }

    #[test]
    fn union_of_partitions_matches_direct_sketch() {
        let direct = sketch_of(11, 0..50_000);
        let mut union = HllUnion::new(11).unwrap();
        union.update(&sketch_of(11, 0..20_000));
        union.update(&sketch_of(11, 15_000..50_000));
        assert_eq!(union.result(HllType::Hll4), direct);
    }

    #[test]
    fn downsampling_matches_sketch_built_at_smaller_lg_k() {
        let values = 0..30_000;
        let small = sketch_of(8, values.clone());

        let mut union = HllUnion::new(12).unwrap();
        union.update(&sketch_of(12, values.clone()));
        union.update(&HllSketch::new(8, HllType::Hll4).unwrap());
        // empty sketches do not shrink the union
        assert_eq!(union.lg_k(), 12);
        union.update(&sketch_of(8, 0..1));
        assert_eq!(union.lg_k(), 8);
        assert_eq!(union.result(HllType::Hll4), small);

        let mut union = HllUnion::new(8).unwrap();
        union.update(&sketch_of(12, values));
        assert_eq!(union.result(HllType::Hll4), small);
    }

    #[rstest]
    #[case(HllType::Hll4, 10)]
    #[case(HllType::Hll4, 100_000)]
    #[case(HllType::Hll6, 100_000)]
    #[case(HllType::Hll8, 100_000)]
    fn serialization_preserves_registers(#[case] tgt_type: HllType, #[case] n: i64) {
        let sketch = sketch_of(10, 0..n).with_tgt_type(tgt_type);
        let bytes = sketch.to_compact_bytes();
        let decoded = HllSketch::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, sketch);
        assert_eq!(decoded.to_compact_bytes(), bytes);
    }

    #[test]
    fn sparse_sketch_serializes_as_list() {
        let sketch = sketch_of(12, 0..10);
        let bytes = sketch.to_compact_bytes();
        assert_eq!(bytes[4], MODE_LIST);
        assert!(bytes.len() < 100);

        let dense = sketch_of(12, 0..100_000).to_compact_bytes();
        assert_eq!(dense[4], MODE_DENSE);
    }

    #[test]
    fn hll4_keeps_large_registers_in_aux_table() {
        let mut sketch = HllSketch::new(4, HllType::Hll4).unwrap();
        // slot 0, rank 20
        sketch.update_hash(1u64 << (64 - 4 - 20));
        // every other slot at rank 1, so the dense layout wins
        for slot in 1..16u64 {
            sketch.update_hash((slot << 60) | (1 << 59));
        }
        assert_eq!(sketch.registers()[0], 20);
        assert_eq!(sketch.registers()[1], 1);
        let bytes = sketch.to_compact_bytes();
        assert_eq!(bytes[4], MODE_DENSE);
        let decoded = HllSketch::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.registers()[0], 20);
        assert_eq!(decoded, sketch);
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        let bytes = sketch_of(10, 0..1000).to_compact_bytes();
        assert!(matches!(
            HllSketch::from_bytes(&bytes[..bytes.len() - 1]),
            Err(SketchError::Codec(_))
        ));
        let mut wrong_family = bytes.clone();
        wrong_family[0] = 3;
        assert!(HllSketch::from_bytes(&wrong_family).is_err());
        let mut bad_lg_k = bytes;
        bad_lg_k[2] = 30;
        assert!(HllSketch::from_bytes(&bad_lg_k).is_err());
        assert!(HllSketch::from_bytes(&[]).is_err());
    }
}
