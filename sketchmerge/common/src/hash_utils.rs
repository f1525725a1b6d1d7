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

//! Hashing of raw values into sketch coordinates
//!
//! Sketches built by different tasks are only mergeable when the same value
//! lands on the same hash everywhere, so hashing uses fixed seeds and a
//! canonical byte form of each value rather than its in-memory layout.

use ahash::RandomState;

use crate::scalar::ScalarValue;

const SEEDS: [u64; 4] = [
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
    0x2545_f491_4f6c_dd1d,
];

fn random_state() -> RandomState {
    RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3])
}

/// Hash an arbitrary byte sequence
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    random_state().hash_one(bytes)
}

/// Hash a record field; `None` for nulls and nested bags, which never
/// contribute to a sketch.
///
/// Integers of every width hash as the equal `i64`, so `Int32(5)` and
/// `Int64(5)` count as the same item. Floats fold `-0.0` into `0.0` and all
/// NaNs into one NaN.
pub fn hash_scalar(value: &ScalarValue) -> Option<u64> {
    match value {
        ScalarValue::Null | ScalarValue::Bag(_) => None,
        ScalarValue::Boolean(v) => v.map(|v| hash_bytes(&i64::from(v).to_le_bytes())),
        ScalarValue::Int32(v) => v.map(|v| hash_bytes(&i64::from(v).to_le_bytes())),
        ScalarValue::Int64(v) => v.map(|v| hash_bytes(&v.to_le_bytes())),
        // same little-endian bytes as the i64 for every value that fits one
        ScalarValue::UInt64(v) => v.map(|v| hash_bytes(&v.to_le_bytes())),
        ScalarValue::Float32(v) => v.map(|v| hash_f64(f64::from(v))),
        ScalarValue::Float64(v) => v.map(hash_f64),
        ScalarValue::Utf8(v) => v.as_ref().map(|v| hash_bytes(v.as_bytes())),
        ScalarValue::Binary(v) => v.as_ref().map(|v| hash_bytes(v)),
    }
}

fn hash_f64(v: f64) -> u64 {
    let canonical = if v == 0.0 {
        0.0f64
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    };
    hash_bytes(&canonical.to_bits().to_le_bytes())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        let a = hash_scalar(&ScalarValue::from("datasketch"));
        let b = hash_scalar(&ScalarValue::from("datasketch"));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_ne!(a, hash_scalar(&ScalarValue::from("datasketches")));
    }

    #[rstest]
    #[case(ScalarValue::Int32(Some(42)), ScalarValue::Int64(Some(42)))]
    #[case(ScalarValue::UInt64(Some(42)), ScalarValue::Int64(Some(42)))]
    #[case(ScalarValue::Float64(Some(-0.0)), ScalarValue::Float64(Some(0.0)))]
    #[case(ScalarValue::Float32(Some(1.5)), ScalarValue::Float64(Some(1.5)))]
    #[case(
        ScalarValue::Float64(Some(f64::NAN)),
        ScalarValue::Float64(Some(-f64::NAN))
    )]
    fn equivalent_values_hash_equally(
        #[case] left: ScalarValue,
        #[case] right: ScalarValue,
    ) {
        assert_eq!(hash_scalar(&left), hash_scalar(&right));
    }

    #[rstest]
    #[case(ScalarValue::Null)]
    #[case(ScalarValue::Utf8(None))]
    #[case(ScalarValue::Bag(Some(vec![])))]
    fn nulls_and_bags_have_no_hash(#[case] value: ScalarValue) {
        assert_eq!(hash_scalar(&value), None);
    }
}
