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

//! Records exchanged at pipeline stage boundaries

use std::fmt;

use crate::scalar::ScalarValue;

/// An unordered collection of records, the payload of a grouped field
pub type Bag = Vec<Tuple>;

/// An ordered list of fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple {
    fields: Vec<ScalarValue>,
}

impl Tuple {
    pub fn new(fields: Vec<ScalarValue>) -> Self {
        Self { fields }
    }

    /// A record with one field
    pub fn single(field: impl Into<ScalarValue>) -> Self {
        Self {
            fields: vec![field.into()],
        }
    }

    /// Field at `index`, `None` when the record is shorter
    pub fn get(&self, index: usize) -> Option<&ScalarValue> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[ScalarValue] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<ScalarValue> {
        self.fields
    }
}

impl From<Vec<ScalarValue>> for Tuple {
    fn from(fields: Vec<ScalarValue>) -> Self {
        Self::new(fields)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, ")")
    }
}
