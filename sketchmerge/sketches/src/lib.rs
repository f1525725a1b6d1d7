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

//! Mergeable cardinality sketches.
//!
//! Each family has a mutable update form, an immutable serialized form and a
//! union that folds serialized sketches together:
//!
//! | family | update | serialized | union |
//! |---|---|---|---|
//! | HLL | [`HllSketch`] | [`HllSketch`] | [`HllUnion`] |
//! | Theta | [`UpdateThetaSketch`] | [`CompactThetaSketch`] | [`ThetaUnion`] |
//! | ArrayOfDoubles | [`UpdateArrayOfDoublesSketch`] | [`ArrayOfDoublesSketch`] | [`ArrayOfDoublesUnion`] |

pub mod array_of_doubles;
pub mod codec;
pub mod hll;
pub mod theta;

pub use array_of_doubles::{
    ArrayOfDoublesSketch, ArrayOfDoublesUnion, UpdateArrayOfDoublesSketch,
};
pub use hll::{HllSketch, HllType, HllUnion};
pub use theta::{CompactThetaSketch, ThetaUnion, UpdateThetaSketch};
