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

//! Three stage algebraic sketch functions.
//!
//! ```text
//!   map side                 combiner (0..n runs)          reducer
//!  ┌─────────┐   raw group  ┌──────────────┐  sketch   ┌─────────┐
//!  │ initial │ ───────────▶ │ intermediate │ ────────▶ │ final_  │ ──▶ sketch
//!  └─────────┘ ─────────────┴──────────────┴─────────▶ └─────────┘
//!                     raw groups when no combiner ran
//! ```
//!
//! The host decides how many intermediate runs happen, so intermediate and
//! final inputs may mix raw groups and serialized sketches in any
//! proportion. Both stages go through the same [`MergeDispatcher`].

use sketchmerge_common::{classification_err, Result, ScalarValue, Tuple};

use crate::dispatcher::MergeDispatcher;
use crate::encoder::decode_output;
use crate::family::SketchFamily;
use crate::merge_state::RawGroupMode;

#[derive(Debug)]
pub struct AlgebraicSketch<F: SketchFamily> {
    dispatcher: MergeDispatcher<F>,
}

impl<F: SketchFamily> AlgebraicSketch<F> {
    /// Sketch raw values
    pub fn data_to_sketch(family: F) -> Self {
        Self::with_mode(family, RawGroupMode::Values)
    }

    /// Union serialized sketches
    pub fn union_sketch(family: F) -> Self {
        Self::with_mode(family, RawGroupMode::Sketches)
    }

    pub fn with_mode(family: F, mode: RawGroupMode) -> Self {
        Self {
            dispatcher: MergeDispatcher::new(family, mode),
        }
    }

    pub fn dispatcher(&self) -> &MergeDispatcher<F> {
        &self.dispatcher
    }

    /// Initial stage: forwards the input bag unchanged so the next stage
    /// sees it as a raw group
    pub fn initial(&self, input: Option<&Tuple>) -> Result<Tuple> {
        match input.and_then(|input| input.get(0)) {
            Some(bag @ ScalarValue::Bag(_)) => Ok(Tuple::single(bag.clone())),
            Some(other) if !other.is_null() => classification_err!(
                "{} input field 0 must be a bag, got {}",
                F::NAME,
                other.type_name()
            ),
            _ => Ok(Tuple::single(ScalarValue::Null)),
        }
    }

    pub fn intermediate(&self, input: Option<&Tuple>) -> Result<Tuple> {
        self.dispatcher.exec(input)
    }

    pub fn final_(&self, input: Option<&Tuple>) -> Result<Tuple> {
        self.dispatcher.exec(input)
    }

    /// Single pass evaluation, used when the host does not run the stages.
    /// The input bag holds raw records and is sketched as one raw group.
    pub fn exec(&self, input: Option<&Tuple>) -> Result<Tuple> {
        self.dispatcher.exec_raw_group(input)
    }

    /// Estimate of the sketch held by an output record
    pub fn estimate(&self, record: &Tuple) -> Result<f64> {
        let family = self.dispatcher.family();
        Ok(family.estimate(&decode_output(family.as_ref(), record)?))
    }
}

#[cfg(test)]
mod tests {
    use sketchmerge_common::{Bag, SketchError};

    use super::*;
    use crate::hll::HllFamily;
    use crate::theta::ThetaFamily;

    fn input(bag: Bag) -> Tuple {
        Tuple::single(ScalarValue::Bag(Some(bag)))
    }

    #[test]
    fn stages_agree_with_single_pass() {
        let f = AlgebraicSketch::data_to_sketch(HllFamily::default());
        let values: Bag = (0..1000i64).map(Tuple::single).collect();

        let partials = values
            .chunks(300)
            .map(|chunk| f.initial(Some(&input(chunk.to_vec()))))
            .collect::<Result<Bag>>()
            .unwrap();
        let combined = f.intermediate(Some(&input(partials[..2].to_vec()))).unwrap();
        let mut final_input = partials[2..].to_vec();
        final_input.push(combined);
        let staged = f.final_(Some(&input(final_input))).unwrap();

        let single = f.exec(Some(&input(values))).unwrap();
        assert_eq!(staged, single);
        let estimate = f.estimate(&single).unwrap();
        assert!((estimate - 1000.0).abs() / 1000.0 < 0.05, "{}", estimate);
    }

    #[test]
    fn single_pass_sketches_raw_values() {
        let f = AlgebraicSketch::data_to_sketch(ThetaFamily::default());
        let record = f
            .exec(Some(&input((0..5i64).map(Tuple::single).collect())))
            .unwrap();
        assert_eq!(f.estimate(&record).unwrap(), 5.0);

        let empty = f.dispatcher().empty_record().unwrap();
        assert_eq!(f.exec(Some(&input(vec![]))).unwrap(), empty);
        assert_eq!(f.exec(None).unwrap(), empty);
        assert!(matches!(
            f.exec(Some(&Tuple::single(1i64))),
            Err(SketchError::Classification(_))
        ));
    }

    #[test]
    fn single_pass_unions_sketch_records() {
        let data = AlgebraicSketch::data_to_sketch(ThetaFamily::default());
        let union = AlgebraicSketch::union_sketch(ThetaFamily::default());
        let left = data
            .exec(Some(&input((0..60i64).map(Tuple::single).collect())))
            .unwrap();
        let right = data
            .exec(Some(&input((40..100i64).map(Tuple::single).collect())))
            .unwrap();
        let record = union.exec(Some(&input(vec![left, right]))).unwrap();
        assert_eq!(union.estimate(&record).unwrap(), 100.0);
    }

    #[test]
    fn initial_passes_nulls_and_rejects_scalars() {
        let f = AlgebraicSketch::data_to_sketch(HllFamily::default());
        assert_eq!(f.initial(None).unwrap(), Tuple::single(ScalarValue::Null));
        assert!(matches!(
            f.initial(Some(&Tuple::single(1i64))),
            Err(SketchError::Classification(_))
        ));
    }
}
