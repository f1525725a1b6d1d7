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

//! Arrow-facing accumulator over any sketch family.
//!
//! Raw rows arrive through `update_batch`: one column per record field, so
//! the tuple family takes a key column followed by `num_values` numeric
//! columns. Partial states travel as one binary sketch per row, but
//! `merge_batch` also accepts list columns of raw groups, classifying every
//! row the way the stage dispatcher classifies batch items.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use sketchmerge_common::{internal_err, Result, ScalarValue, Tuple};

use crate::accumulator::Accumulator;
use crate::family::SketchFamily;
use crate::merge_state::{MergeState, RawGroupMode};

#[derive(Debug)]
pub struct SketchAccumulator<F: SketchFamily> {
    state: MergeState<F>,
}

impl<F: SketchFamily> SketchAccumulator<F> {
    pub fn try_new(family: Arc<F>, mode: RawGroupMode) -> Result<Self> {
        Ok(Self {
            state: MergeState::try_new(family, mode)?,
        })
    }

    /// Merged sketch of all input so far
    pub fn sketch(&self) -> Result<F::Sketch> {
        self.state.snapshot()
    }
}

impl<F: SketchFamily> Accumulator for SketchAccumulator<F> {
    fn state(&self) -> Result<Vec<ScalarValue>> {
        let sketch = self.state.snapshot()?;
        Ok(vec![ScalarValue::Binary(Some(
            self.state.family().encode(&sketch),
        ))])
    }

    fn update_batch(&mut self, values: &[ArrayRef]) -> Result<()> {
        let Some(first) = values.first() else {
            return internal_err!("{} accumulator needs at least one column", F::NAME);
        };
        let rows = first.len();
        if values.iter().any(|column| column.len() != rows) {
            return internal_err!("{} accumulator columns differ in length", F::NAME);
        }
        for row in 0..rows {
            let record = values
                .iter()
                .map(|column| ScalarValue::try_from_array(column, row))
                .collect::<Result<Vec<_>>>()?;
            self.state.push_raw(&Tuple::new(record))?;
        }
        Ok(())
    }

    fn merge_batch(&mut self, states: &[ArrayRef]) -> Result<()> {
        if states.len() != 1 {
            return internal_err!(
                "{} accumulator expects one state column, got {}",
                F::NAME,
                states.len()
            );
        }
        let array = &states[0];
        for row in 0..array.len() {
            let payload = ScalarValue::try_from_array(array, row)?;
            self.state.push_payload(&payload)?;
        }
        Ok(())
    }

    fn evaluate(&self) -> Result<ScalarValue> {
        let sketch = self.state.snapshot()?;
        Ok(ScalarValue::Float64(Some(
            self.state.family().estimate(&sketch),
        )))
    }

    fn size(&self) -> usize {
        self.state.size()
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{BinaryArray, Float64Array, Int64Array, StringArray};
    use sketchmerge_common::SketchError;

    use super::*;
    use crate::array_of_doubles::ArrayOfDoublesFamily;
    use crate::theta::ThetaFamily;

    fn state_array(acc: &dyn Accumulator) -> ArrayRef {
        let bytes = match acc.state().unwrap().pop() {
            Some(ScalarValue::Binary(Some(bytes))) => bytes,
            other => panic!("unexpected state {:?}", other),
        };
        Arc::new(BinaryArray::from(vec![bytes.as_slice()]))
    }

    #[test]
    fn partial_states_merge() {
        let family = Arc::new(ThetaFamily::default());
        let mut left = SketchAccumulator::try_new(Arc::clone(&family), RawGroupMode::Values).unwrap();
        let mut right =
            SketchAccumulator::try_new(Arc::clone(&family), RawGroupMode::Values).unwrap();
        left.update_batch(&[Arc::new(Int64Array::from_iter_values(0..600)) as ArrayRef])
            .unwrap();
        right
            .update_batch(&[Arc::new(Int64Array::from_iter_values(400..1000)) as ArrayRef])
            .unwrap();
        // state() must not consume the raw side
        assert_eq!(left.evaluate().unwrap(), ScalarValue::Float64(Some(600.0)));

        let mut total = SketchAccumulator::try_new(family, RawGroupMode::Values).unwrap();
        total.merge_batch(&[state_array(&left)]).unwrap();
        total.merge_batch(&[state_array(&right)]).unwrap();
        assert_eq!(total.evaluate().unwrap(), ScalarValue::Float64(Some(1000.0)));
        assert!(total.size() > 0);
    }

    #[test]
    fn tuple_rows_span_columns() {
        let family = Arc::new(ArrayOfDoublesFamily::try_new(64, 1.0, 1).unwrap());
        let mut acc = SketchAccumulator::try_new(family, RawGroupMode::Values).unwrap();
        acc.update_batch(&[
            Arc::new(StringArray::from(vec![Some("a"), Some("b"), None, Some("a")])) as ArrayRef,
            Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();
        let sketch = acc.sketch().unwrap();
        assert_eq!(sketch.estimate(), 2.0);
        assert_eq!(sketch.value_sums(), vec![7.0]);
    }

    #[test]
    fn unexpected_state_column_fails() {
        let mut acc =
            SketchAccumulator::try_new(Arc::new(ThetaFamily::default()), RawGroupMode::Values)
                .unwrap();
        assert!(matches!(
            acc.merge_batch(&[Arc::new(Int64Array::from(vec![1])) as ArrayRef]),
            Err(SketchError::Classification(_))
        ));
        assert!(matches!(acc.merge_batch(&[]), Err(SketchError::Internal(_))));
    }
}
