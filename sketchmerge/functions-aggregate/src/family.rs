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

//! The contract between the merge core and a sketch family.
//!
//! A family bundles construction parameters with the four collaborators the
//! merge core needs: an updater fed with raw records, a merger that folds
//! finished sketches, and the codec that moves sketches in and out of bytes.

use std::fmt::Debug;

use sketchmerge_common::{exec_err, Result, ScalarValue, Tuple};

/// Mutable sketch built from raw records of one raw group
pub trait SketchUpdater: Clone + Debug + Send + Sync {
    type Sketch;

    /// Present one raw record to the sketch
    fn update_record(&mut self, record: &Tuple) -> Result<()>;

    /// Immutable snapshot of everything presented so far
    fn freeze(&self) -> Self::Sketch;

    /// Approximate heap size in bytes
    fn size(&self) -> usize;
}

/// Union of finished sketches.
///
/// Folding is associative and commutative, so the merged result does not
/// depend on how a job partitions its input or how many times it combines.
pub trait SketchMerger: Clone + Debug + Send + Sync {
    type Sketch;
    type Target: Copy + Debug;

    /// Merge `sketch` into the union; fails on incompatible parameters
    fn fold(&mut self, sketch: &Self::Sketch) -> Result<()>;

    /// Sketch at representation `target`. Does not change the union.
    fn result(&self, target: Self::Target) -> Self::Sketch;

    /// Approximate heap size in bytes
    fn size(&self) -> usize;
}

/// A configured sketch family
pub trait SketchFamily: Debug + Send + Sync + 'static {
    type Sketch: Clone + Debug + Send + Sync;
    type Updater: SketchUpdater<Sketch = Self::Sketch>;
    type Union: SketchMerger<Sketch = Self::Sketch, Target = Self::Target>;
    type Target: Copy + Debug + Send + Sync;

    /// Name used in log and error messages
    const NAME: &'static str;

    /// Fresh updater for one raw group
    fn new_updater(&self) -> Result<Self::Updater>;

    /// Empty union sized by this family's parameters
    fn new_union(&self) -> Result<Self::Union>;

    /// The sketch of no input at all, at the configured target
    fn empty_sketch(&self) -> Result<Self::Sketch>;

    /// Parse serialized bytes, failing with a codec error
    fn decode(&self, bytes: &[u8]) -> Result<Self::Sketch>;

    /// Serialized form of `sketch`
    fn encode(&self, sketch: &Self::Sketch) -> Vec<u8>;

    fn estimate(&self, sketch: &Self::Sketch) -> f64;

    /// Representation merged results are produced at
    fn target(&self) -> Self::Target;
}

/// Field 0 of a raw record
pub(crate) fn raw_value<'a>(family: &str, record: &'a Tuple) -> Result<&'a ScalarValue> {
    match record.get(0) {
        Some(value) => Ok(value),
        None => exec_err!("{} raw record has no fields", family),
    }
}
