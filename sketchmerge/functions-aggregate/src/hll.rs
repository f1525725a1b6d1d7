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

//! HLL family: distinct counting with HyperLogLog registers.

use sketchmerge_common::config::{ConfigOptions, OPT_HLL_LG_K, OPT_HLL_TARGET_TYPE};
use sketchmerge_common::{config_err, Result, Tuple};
use sketchmerge_sketches::hll::{check_lg_k, DEFAULT_LG_K};
use sketchmerge_sketches::{HllSketch, HllType, HllUnion};

use crate::family::{raw_value, SketchFamily, SketchMerger, SketchUpdater};

/// HLL sketches with `2^lg_k` registers, merged results serialized as
/// `tgt_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HllFamily {
    lg_k: u8,
    tgt_type: HllType,
}

impl HllFamily {
    pub fn try_new(lg_k: u8, tgt_type: HllType) -> Result<Self> {
        check_lg_k(lg_k)?;
        Ok(Self { lg_k, tgt_type })
    }

    /// Reads `sketch.hll.lg_k` and `sketch.hll.target_type`
    pub fn try_from_config(config: &ConfigOptions) -> Result<Self> {
        let lg_k = config.require_u64(OPT_HLL_LG_K)?;
        let Ok(lg_k) = u8::try_from(lg_k) else {
            return config_err!("{} out of range: {}", OPT_HLL_LG_K, lg_k);
        };
        let tgt_type = config.require_string(OPT_HLL_TARGET_TYPE)?.parse()?;
        Self::try_new(lg_k, tgt_type)
    }

    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    pub fn tgt_type(&self) -> HllType {
        self.tgt_type
    }
}

impl Default for HllFamily {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            tgt_type: HllType::default(),
        }
    }
}

impl SketchFamily for HllFamily {
    type Sketch = HllSketch;
    type Updater = HllSketch;
    type Union = HllUnion;
    type Target = HllType;

    const NAME: &'static str = "HLL";

    fn new_updater(&self) -> Result<HllSketch> {
        HllSketch::new(self.lg_k, self.tgt_type)
    }

    fn new_union(&self) -> Result<HllUnion> {
        HllUnion::new(self.lg_k)
    }

    fn empty_sketch(&self) -> Result<HllSketch> {
        HllSketch::new(self.lg_k, self.tgt_type)
    }

    fn decode(&self, bytes: &[u8]) -> Result<HllSketch> {
        HllSketch::from_bytes(bytes)
    }

    fn encode(&self, sketch: &HllSketch) -> Vec<u8> {
        sketch.to_compact_bytes()
    }

    fn estimate(&self, sketch: &HllSketch) -> f64 {
        sketch.estimate()
    }

    fn target(&self) -> HllType {
        self.tgt_type
    }
}

impl SketchUpdater for HllSketch {
    type Sketch = HllSketch;

    fn update_record(&mut self, record: &Tuple) -> Result<()> {
        let value = raw_value(HllFamily::NAME, record)?;
        self.update(value);
        Ok(())
    }

    fn freeze(&self) -> HllSketch {
        self.clone()
    }

    fn size(&self) -> usize {
        1 << self.lg_k()
    }
}

impl SketchMerger for HllUnion {
    type Sketch = HllSketch;
    type Target = HllType;

    fn fold(&mut self, sketch: &HllSketch) -> Result<()> {
        self.update(sketch);
        Ok(())
    }

    fn result(&self, target: HllType) -> HllSketch {
        HllUnion::result(self, target)
    }

    fn size(&self) -> usize {
        1 << self.lg_k()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sketchmerge_common::{ScalarValue, SketchError};

    use super::*;

    #[test]
    fn from_default_config() {
        let family = HllFamily::try_from_config(&ConfigOptions::new()).unwrap();
        assert_eq!(family, HllFamily::default());
    }

    #[rstest]
    #[case(2, "HLL_4")]
    #[case(300, "HLL_4")]
    #[case(12, "HLL_5")]
    fn invalid_config(#[case] lg_k: u64, #[case] tgt_type: &str) {
        let mut config = ConfigOptions::new();
        config.set_u64(OPT_HLL_LG_K, lg_k);
        config.set_string(OPT_HLL_TARGET_TYPE, tgt_type);
        assert!(matches!(
            HllFamily::try_from_config(&config),
            Err(SketchError::Configuration(_))
        ));
    }

    #[test]
    fn records_update_by_field_zero() {
        let family = HllFamily::try_new(10, HllType::Hll8).unwrap();
        let mut updater = family.new_updater().unwrap();
        for v in 0..100i64 {
            updater
                .update_record(&Tuple::new(vec![ScalarValue::from(v), ScalarValue::from("x")]))
                .unwrap();
        }
        updater
            .update_record(&Tuple::single(ScalarValue::Int64(None)))
            .unwrap();
        assert!((family.estimate(&updater.freeze()) - 100.0).abs() < 10.0);
        assert!(matches!(
            updater.update_record(&Tuple::default()),
            Err(SketchError::Execution(_))
        ));
    }

    #[test]
    fn empty_union_result_encodes_like_empty_sketch() {
        let family = HllFamily::default();
        let union = family.new_union().unwrap();
        assert_eq!(
            family.encode(&SketchMerger::result(&union, family.target())),
            family.encode(&family.empty_sketch().unwrap())
        );
    }
}
