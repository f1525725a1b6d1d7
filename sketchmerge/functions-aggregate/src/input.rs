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

//! Classification of batch items.
//!
//! A batch reaching an intermediate or final stage mixes items from every
//! earlier stage that ran: raw groups bagged straight out of an initial
//! stage, and sketches serialized by earlier intermediate runs. Field 0 of
//! each item tells them apart.

use sketchmerge_common::{classification_err, Result, ScalarValue, Tuple};

/// A non-empty batch item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputItem<'a> {
    /// Raw records that have not been sketched yet
    RawGroup(&'a [Tuple]),
    /// A sketch serialized by an earlier stage
    Serialized(&'a [u8]),
}

impl<'a> InputItem<'a> {
    /// Classifies the field 0 `payload` of a batch item.
    ///
    /// Returns `None` for items that contribute nothing: null payloads of
    /// any type and empty raw groups. Anything other than a bag or a byte
    /// sequence is a classification error.
    pub fn classify(payload: &'a ScalarValue) -> Result<Option<Self>> {
        match payload {
            ScalarValue::Bag(Some(group)) if group.is_empty() => Ok(None),
            ScalarValue::Bag(Some(group)) => Ok(Some(InputItem::RawGroup(group))),
            ScalarValue::Binary(Some(bytes)) => Ok(Some(InputItem::Serialized(bytes))),
            v if v.is_null() => Ok(None),
            other => classification_err!(
                "batch item field 0 is neither a bag nor a serialized sketch: {}",
                other.type_name()
            ),
        }
    }
}
