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

//! Stage-agnostic merge functions for HLL, Theta and ArrayOfDoubles tuple
//! sketches.
//!
//! Hosts that split an aggregation into initial, intermediate and final
//! stages hand the later stages batches that mix raw value groups with
//! sketches serialized by earlier runs. [`MergeDispatcher`] classifies and
//! merges such batches for any [`SketchFamily`]; [`AlgebraicSketch`] wraps it
//! as a three stage function and [`SketchAccumulator`] as an arrow
//! [`Accumulator`].

pub mod accumulator;
pub mod algebraic;
pub mod array_of_doubles;
pub mod dispatcher;
pub mod encoder;
pub mod family;
pub mod hll;
pub mod input;
pub mod merge_state;
pub mod sketch_accumulator;
pub mod theta;

pub use accumulator::Accumulator;
pub use algebraic::AlgebraicSketch;
pub use array_of_doubles::ArrayOfDoublesFamily;
pub use dispatcher::MergeDispatcher;
pub use encoder::{decode_output, encode_output, sketch_bytes, wrap_as_item};
pub use family::{SketchFamily, SketchMerger, SketchUpdater};
pub use hll::HllFamily;
pub use input::InputItem;
pub use merge_state::{MergeState, RawGroupMode};
pub use sketch_accumulator::SketchAccumulator;
pub use theta::ThetaFamily;
