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

//! Theta family: distinct counting with retained hashes.

use std::mem::size_of;

use sketchmerge_common::config::{
    ConfigOptions, OPT_THETA_NOMINAL_ENTRIES, OPT_THETA_ORDERED,
    OPT_THETA_SAMPLING_PROBABILITY,
};
use sketchmerge_common::{config_err, Result, Tuple};
use sketchmerge_sketches::theta::{
    check_nominal_entries, check_sampling_probability, DEFAULT_NOMINAL_ENTRIES,
};
use sketchmerge_sketches::{CompactThetaSketch, ThetaUnion, UpdateThetaSketch};

use crate::family::{raw_value, SketchFamily, SketchMerger, SketchUpdater};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThetaFamily {
    nominal_entries: usize,
    sampling_probability: f64,
    ordered: bool,
}

impl ThetaFamily {
    pub fn try_new(
        nominal_entries: usize,
        sampling_probability: f64,
        ordered: bool,
    ) -> Result<Self> {
        check_nominal_entries(nominal_entries)?;
        check_sampling_probability(sampling_probability)?;
        Ok(Self {
            nominal_entries,
            sampling_probability,
            ordered,
        })
    }

    pub fn try_from_config(config: &ConfigOptions) -> Result<Self> {
        let nominal_entries = config.require_u64(OPT_THETA_NOMINAL_ENTRIES)?;
        let Ok(nominal_entries) = usize::try_from(nominal_entries) else {
            return config_err!(
                "{} out of range: {}",
                OPT_THETA_NOMINAL_ENTRIES,
                nominal_entries
            );
        };
        Self::try_new(
            nominal_entries,
            config.require_f64(OPT_THETA_SAMPLING_PROBABILITY)?,
            config.require_bool(OPT_THETA_ORDERED)?,
        )
    }

    pub fn nominal_entries(&self) -> usize {
        self.nominal_entries
    }

    pub fn sampling_probability(&self) -> f64 {
        self.sampling_probability
    }

    pub fn ordered(&self) -> bool {
        self.ordered
    }
}

impl Default for ThetaFamily {
    fn default() -> Self {
        Self {
            nominal_entries: DEFAULT_NOMINAL_ENTRIES,
            sampling_probability: 1.0,
            ordered: true,
        }
    }
}

impl SketchFamily for ThetaFamily {
    type Sketch = CompactThetaSketch;
    type Updater = UpdateThetaSketch;
    type Union = ThetaUnion;
    /// Whether results keep their hashes sorted
    type Target = bool;

    const NAME: &'static str = "Theta";

    fn new_updater(&self) -> Result<UpdateThetaSketch> {
        UpdateThetaSketch::new(self.nominal_entries, self.sampling_probability)
    }

    fn new_union(&self) -> Result<ThetaUnion> {
        ThetaUnion::new(self.nominal_entries)
    }

    fn empty_sketch(&self) -> Result<CompactThetaSketch> {
        Ok(CompactThetaSketch::empty(self.ordered))
    }

    fn decode(&self, bytes: &[u8]) -> Result<CompactThetaSketch> {
        CompactThetaSketch::from_bytes(bytes)
    }

    fn encode(&self, sketch: &CompactThetaSketch) -> Vec<u8> {
        sketch.to_bytes()
    }

    fn estimate(&self, sketch: &CompactThetaSketch) -> f64 {
        sketch.estimate()
    }

    fn target(&self) -> bool {
        self.ordered
    }
}

impl SketchUpdater for UpdateThetaSketch {
    type Sketch = CompactThetaSketch;

    fn update_record(&mut self, record: &Tuple) -> Result<()> {
        let value = raw_value(ThetaFamily::NAME, record)?;
        self.update(value);
        Ok(())
    }

    fn freeze(&self) -> CompactThetaSketch {
        self.compact(true)
    }

    fn size(&self) -> usize {
        self.num_retained() * size_of::<u64>()
    }
}

impl SketchMerger for ThetaUnion {
    type Sketch = CompactThetaSketch;
    type Target = bool;

    fn fold(&mut self, sketch: &CompactThetaSketch) -> Result<()> {
        self.update(sketch);
        Ok(())
    }

    fn result(&self, ordered: bool) -> CompactThetaSketch {
        ThetaUnion::result(self, ordered)
    }

    fn size(&self) -> usize {
        self.num_retained() * size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use sketchmerge_common::{ScalarValue, SketchError};

    use super::*;

    #[test]
    fn from_config() {
        let mut config = ConfigOptions::new();
        assert_eq!(
            ThetaFamily::try_from_config(&config).unwrap(),
            ThetaFamily::default()
        );

        config.set_u64(OPT_THETA_NOMINAL_ENTRIES, 1024);
        config.set_f64(OPT_THETA_SAMPLING_PROBABILITY, 0.5);
        config.set_bool(OPT_THETA_ORDERED, false);
        let family = ThetaFamily::try_from_config(&config).unwrap();
        assert_eq!(family.nominal_entries(), 1024);
        assert_eq!(family.sampling_probability(), 0.5);
        assert!(!family.target());
        assert!(!family.empty_sketch().unwrap().is_ordered());

        config.set_u64(OPT_THETA_NOMINAL_ENTRIES, 1000);
        assert!(matches!(
            ThetaFamily::try_from_config(&config),
            Err(SketchError::Configuration(_))
        ));
    }

    #[test]
    fn from_config_rejects_mistyped_options() {
        let mut config = ConfigOptions::new();
        config.set_string(OPT_THETA_ORDERED, "true");
        assert!(matches!(
            ThetaFamily::try_from_config(&config),
            Err(SketchError::Configuration(_))
        ));

        let mut config = ConfigOptions::new();
        config.set(OPT_THETA_ORDERED, ScalarValue::Boolean(None));
        assert!(matches!(
            ThetaFamily::try_from_config(&config),
            Err(SketchError::Configuration(_))
        ));
    }

    #[test]
    fn union_result_uses_target_ordering() {
        let family = ThetaFamily::try_new(64, 1.0, false).unwrap();
        let mut updater = family.new_updater().unwrap();
        for v in ["a", "b", "c"] {
            updater.update_record(&Tuple::single(v)).unwrap();
        }
        updater
            .update_record(&Tuple::single(ScalarValue::Utf8(None)))
            .unwrap();
        let mut union = family.new_union().unwrap();
        union.fold(&updater.freeze()).unwrap();
        let result = SketchMerger::result(&union, family.target());
        assert!(!result.is_ordered());
        assert_eq!(family.estimate(&result), 3.0);
    }
}
