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

//! Stage dispatcher shared by the intermediate and final stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use log::{debug, info};
use sketchmerge_common::{classification_err, Result, ScalarValue, Tuple};

use crate::encoder::encode_output;
use crate::family::SketchFamily;
use crate::merge_state::{MergeState, RawGroupMode};

/// Merges a batch of raw groups and serialized sketches into one sketch.
///
/// A dispatcher is configured once and invoked many times. Each invocation
/// builds its own [`MergeState`], so invocations are independent and the
/// dispatcher can be shared between threads. The empty sketch and its
/// encoding are computed on first use and reused afterwards.
#[derive(Debug)]
pub struct MergeDispatcher<F: SketchFamily> {
    family: Arc<F>,
    mode: RawGroupMode,
    empty: OnceLock<(F::Sketch, Tuple)>,
    used: AtomicBool,
}

impl<F: SketchFamily> MergeDispatcher<F> {
    pub fn new(family: F, mode: RawGroupMode) -> Self {
        Self::with_family(Arc::new(family), mode)
    }

    pub fn with_family(family: Arc<F>, mode: RawGroupMode) -> Self {
        Self {
            family,
            mode,
            empty: OnceLock::new(),
            used: AtomicBool::new(false),
        }
    }

    pub fn family(&self) -> &Arc<F> {
        &self.family
    }

    pub fn mode(&self) -> RawGroupMode {
        self.mode
    }

    /// Merges every item of `batch`.
    ///
    /// An absent or empty batch yields the empty sketch without building a
    /// union. Otherwise items are classified by their field 0 in order:
    /// nulls and empty bags are skipped, bags are raw groups and byte
    /// sequences are serialized sketches. The first item of any other shape
    /// aborts the whole invocation with a classification error.
    pub fn merge(&self, batch: Option<&[Tuple]>) -> Result<F::Sketch> {
        self.log_first_call();
        let batch = match batch {
            Some(batch) if !batch.is_empty() => batch,
            _ => return Ok(self.empty()?.0.clone()),
        };
        let mut state = MergeState::try_new(Arc::clone(&self.family), self.mode)?;
        for item in batch {
            state.push_item(item)?;
        }
        state.finish()
    }

    /// Merges the bag held in field 0 of `input` into an output record.
    ///
    /// An absent input, an input without fields or a null field 0 yields the
    /// cached empty output record.
    pub fn exec(&self, input: Option<&Tuple>) -> Result<Tuple> {
        self.log_first_call();
        match input.and_then(|input| input.get(0)) {
            Some(ScalarValue::Bag(Some(bag))) => {
                let sketch = self.merge(Some(bag.as_slice()))?;
                Ok(encode_output(self.family.as_ref(), &sketch))
            }
            Some(other) if !other.is_null() => classification_err!(
                "{} input field 0 must be a bag, got {}",
                F::NAME,
                other.type_name()
            ),
            _ => self.empty_record(),
        }
    }

    /// Sketches the bag held in field 0 of `input` as one raw group.
    ///
    /// This is the single pass path: the bag holds raw records, not batch
    /// items. Absent and null inputs yield the cached empty output record.
    pub fn exec_raw_group(&self, input: Option<&Tuple>) -> Result<Tuple> {
        match input.and_then(|input| input.get(0)) {
            Some(group @ ScalarValue::Bag(Some(_))) => {
                let mut state = MergeState::try_new(Arc::clone(&self.family), self.mode)?;
                state.push_payload(group)?;
                Ok(encode_output(self.family.as_ref(), &state.finish()?))
            }
            Some(other) if !other.is_null() => classification_err!(
                "{} input field 0 must be a bag, got {}",
                F::NAME,
                other.type_name()
            ),
            _ => self.empty_record(),
        }
    }

    /// The sketch of no input
    pub fn empty_sketch(&self) -> Result<F::Sketch> {
        Ok(self.empty()?.0.clone())
    }

    /// Output record holding the empty sketch
    pub fn empty_record(&self) -> Result<Tuple> {
        Ok(self.empty()?.1.clone())
    }

    fn empty(&self) -> Result<&(F::Sketch, Tuple)> {
        if let Some(empty) = self.empty.get() {
            return Ok(empty);
        }
        let sketch = self.family.empty_sketch()?;
        let record = encode_output(self.family.as_ref(), &sketch);
        debug!("{} empty sketch cached: {}", F::NAME, record);
        Ok(self.empty.get_or_init(|| (sketch, record)))
    }

    fn log_first_call(&self) {
        if !self.used.swap(true, Ordering::Relaxed) {
            info!("{} algebraic merge was used", F::NAME);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use sketchmerge_common::SketchError;

    use super::*;
    use crate::hll::HllFamily;

    #[test]
    fn empty_inputs_share_one_encoding() {
        let dispatcher = MergeDispatcher::new(HllFamily::default(), RawGroupMode::Values);
        let empty = dispatcher.empty_record().unwrap();
        assert_eq!(dispatcher.exec(None).unwrap(), empty);
        assert_eq!(dispatcher.exec(Some(&Tuple::default())).unwrap(), empty);
        assert_eq!(
            dispatcher.exec(Some(&Tuple::single(ScalarValue::Bag(None)))).unwrap(),
            empty
        );
        assert_eq!(
            dispatcher.exec(Some(&Tuple::single(ScalarValue::Bag(Some(vec![]))))).unwrap(),
            empty
        );
        assert_eq!(
            encode_output(dispatcher.family().as_ref(), &dispatcher.merge(None).unwrap()),
            empty
        );
    }

    #[test]
    fn non_bag_input_fails() {
        let dispatcher = MergeDispatcher::new(HllFamily::default(), RawGroupMode::Values);
        assert!(matches!(
            dispatcher.exec(Some(&Tuple::single(vec![1u8, 2]))),
            Err(SketchError::Classification(_))
        ));
    }

    #[test]
    fn shared_between_threads() {
        let dispatcher = Arc::new(MergeDispatcher::new(
            HllFamily::default(),
            RawGroupMode::Values,
        ));
        let handles = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || dispatcher.empty_record().unwrap())
            })
            .collect::<Vec<_>>();
        let expected = dispatcher.empty_record().unwrap();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
