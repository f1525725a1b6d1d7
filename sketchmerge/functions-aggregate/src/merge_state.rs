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

//! Per-invocation merge state.

use std::mem::size_of_val;
use std::sync::Arc;

use sketchmerge_common::{classification_err, Result, ScalarValue, SketchError, Tuple};

use crate::family::{SketchFamily, SketchMerger, SketchUpdater};
use crate::input::InputItem;

/// What the records of a raw group carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawGroupMode {
    /// Raw values, sketched by the family's updater
    #[default]
    Values,
    /// Serialized sketches in field 0, unioned
    Sketches,
}

/// Side accumulator shared by every raw group of one invocation
#[derive(Debug)]
enum RawAccumulator<F: SketchFamily> {
    Values(F::Updater),
    Sketches(F::Union),
}

impl<F: SketchFamily> RawAccumulator<F> {
    fn try_new(family: &F, mode: RawGroupMode) -> Result<Self> {
        Ok(match mode {
            RawGroupMode::Values => RawAccumulator::Values(family.new_updater()?),
            RawGroupMode::Sketches => RawAccumulator::Sketches(family.new_union()?),
        })
    }

    fn push(&mut self, family: &F, record: &Tuple) -> Result<()> {
        match self {
            RawAccumulator::Values(updater) => updater.update_record(record),
            RawAccumulator::Sketches(union) => match record.get(0) {
                Some(ScalarValue::Binary(Some(bytes))) => union.fold(&family.decode(bytes)?),
                Some(v) if v.is_null() => Ok(()),
                Some(other) => classification_err!(
                    "{} sketch record field 0 is not a serialized sketch: {}",
                    F::NAME,
                    other.type_name()
                ),
                None => classification_err!("{} sketch record has no fields", F::NAME),
            },
        }
    }

    fn freeze(&self, target: F::Target) -> F::Sketch {
        match self {
            RawAccumulator::Values(updater) => updater.freeze(),
            RawAccumulator::Sketches(union) => union.result(target),
        }
    }

    fn size(&self) -> usize {
        match self {
            RawAccumulator::Values(updater) => updater.size(),
            RawAccumulator::Sketches(union) => union.size(),
        }
    }
}

/// Running state of one merge invocation.
///
/// Serialized sketches are folded into the main union as they arrive. Raw
/// groups all feed one lazily created raw accumulator, which is folded into
/// the main union exactly once when the result is produced.
#[derive(Debug)]
pub struct MergeState<F: SketchFamily> {
    family: Arc<F>,
    mode: RawGroupMode,
    union: F::Union,
    raw: Option<RawAccumulator<F>>,
}

impl<F: SketchFamily> MergeState<F> {
    pub fn try_new(family: Arc<F>, mode: RawGroupMode) -> Result<Self> {
        let union = family.new_union()?;
        Ok(Self {
            family,
            mode,
            union,
            raw: None,
        })
    }

    pub fn family(&self) -> &F {
        &self.family
    }

    /// Adds a batch item, classified by its field 0
    pub fn push_item(&mut self, item: &Tuple) -> Result<()> {
        let payload = item.get(0).ok_or_else(|| {
            SketchError::Classification(format!("{} batch item has no fields", F::NAME))
        })?;
        self.push_payload(payload)
    }

    /// Adds the field 0 payload of a batch item
    pub fn push_payload(&mut self, payload: &ScalarValue) -> Result<()> {
        match InputItem::classify(payload)? {
            None => Ok(()),
            Some(InputItem::RawGroup(group)) => {
                let family = Arc::clone(&self.family);
                let raw = self.raw_accumulator()?;
                group.iter().try_for_each(|record| raw.push(&family, record))
            }
            Some(InputItem::Serialized(bytes)) => {
                let sketch = self.family.decode(bytes)?;
                self.union.fold(&sketch)
            }
        }
    }

    /// Adds one record straight to the raw accumulator, as if it were the
    /// only member of a raw group
    pub fn push_raw(&mut self, record: &Tuple) -> Result<()> {
        let family = Arc::clone(&self.family);
        self.raw_accumulator()?.push(&family, record)
    }

    fn raw_accumulator(&mut self) -> Result<&mut RawAccumulator<F>> {
        let raw = match self.raw.take() {
            Some(raw) => raw,
            None => RawAccumulator::try_new(self.family.as_ref(), self.mode)?,
        };
        Ok(self.raw.insert(raw))
    }

    /// Merged sketch of everything pushed so far, leaving the state usable
    pub fn snapshot(&self) -> Result<F::Sketch> {
        let target = self.family.target();
        match &self.raw {
            Some(raw) => {
                let mut union = self.union.clone();
                union.fold(&raw.freeze(target))?;
                Ok(union.result(target))
            }
            None => Ok(self.union.result(target)),
        }
    }

    /// Folds the raw accumulator, if any, and produces the merged sketch
    pub fn finish(mut self) -> Result<F::Sketch> {
        let target = self.family.target();
        if let Some(raw) = self.raw.take() {
            self.union.fold(&raw.freeze(target))?;
        }
        Ok(self.union.result(target))
    }

    /// Approximate size in bytes, including `self`
    pub fn size(&self) -> usize {
        size_of_val(self)
            + self.union.size()
            + self.raw.as_ref().map(|raw| raw.size()).unwrap_or_default()
    }
}
