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

//! Output records: a single binary field holding a serialized sketch.

use sketchmerge_common::{classification_err, Result, ScalarValue, Tuple};

use crate::family::SketchFamily;

/// Serializes `sketch` into an output record
pub fn encode_output<F: SketchFamily>(family: &F, sketch: &F::Sketch) -> Tuple {
    Tuple::single(family.encode(sketch))
}

/// The serialized sketch held by an output record
pub fn sketch_bytes(record: &Tuple) -> Result<&[u8]> {
    match record.fields() {
        [ScalarValue::Binary(Some(bytes))] => Ok(bytes.as_slice()),
        _ => classification_err!(
            "sketch record must hold exactly one binary field, got {}",
            record
        ),
    }
}

/// Turns an output record into a batch item for a later stage
pub fn wrap_as_item(record: &Tuple) -> Result<Tuple> {
    Ok(Tuple::single(sketch_bytes(record)?.to_vec()))
}

/// Decodes the sketch held by an output record
pub fn decode_output<F: SketchFamily>(family: &F, record: &Tuple) -> Result<F::Sketch> {
    family.decode(sketch_bytes(record)?)
}

#[cfg(test)]
mod tests {
    use sketchmerge_common::SketchError;

    use super::*;
    use crate::theta::ThetaFamily;

    #[test]
    fn output_is_one_binary_field() {
        let family = ThetaFamily::default();
        let empty = family.empty_sketch().unwrap();
        let record = encode_output(&family, &empty);
        assert_eq!(record.len(), 1);
        assert_eq!(sketch_bytes(&record).unwrap(), family.encode(&empty));
        assert_eq!(decode_output(&family, &record).unwrap(), empty);
        assert_eq!(wrap_as_item(&record).unwrap(), record);
    }

    #[test]
    fn other_records_are_rejected() {
        for record in [
            Tuple::default(),
            Tuple::single(ScalarValue::Binary(None)),
            Tuple::single("sketch"),
            Tuple::new(vec![vec![1u8].into(), vec![2u8].into()]),
        ] {
            assert!(matches!(
                sketch_bytes(&record),
                Err(SketchError::Classification(_))
            ));
        }
    }
}
