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

//! Little-endian helpers shared by the sketch serializers.
//!
//! Every serialized sketch starts with the same two bytes:
//!
//! ```text
//!  ┌───────────┬────────────┬─────────────────────────────┐
//!  │ family id │ serial ver │ family specific preamble ...│
//!  └───────────┴────────────┴─────────────────────────────┘
//! ```

use sketchmerge_common::{codec_err, Result};

/// Family id of serialized HLL sketches
pub const FAMILY_HLL: u8 = 7;
/// Family id of serialized compact theta sketches
pub const FAMILY_THETA: u8 = 3;
/// Family id of serialized array-of-doubles tuple sketches
pub const FAMILY_TUPLE: u8 = 9;

pub(crate) fn family_name(id: u8) -> &'static str {
    match id {
        FAMILY_HLL => "HLL",
        FAMILY_THETA => "Theta",
        FAMILY_TUPLE => "ArrayOfDoubles",
        _ => "unknown",
    }
}

/// Cursor over a serialized sketch that turns short reads into codec errors
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Consumes the two byte header, checking family and version
    pub(crate) fn read_header(&mut self, family: u8, serial_version: u8) -> Result<()> {
        let found = self.read_u8()?;
        if found != family {
            return codec_err!(
                "expected a {} sketch (family {}), found {} (family {})",
                family_name(family),
                family,
                family_name(found),
                found
            );
        }
        let version = self.read_u8()?;
        if version != serial_version {
            return codec_err!(
                "unsupported {} serial version {}, expected {}",
                family_name(family),
                version,
                serial_version
            );
        }
        Ok(())
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => codec_err!(
                "sketch truncated: needed {} bytes at offset {}, {} available",
                len,
                self.pos,
                self.bytes.len() - self.pos
            ),
        }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Fails unless every byte has been consumed
    pub(crate) fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return codec_err!(
                "{} trailing bytes after sketch payload",
                self.bytes.len() - self.pos
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sketchmerge_common::SketchError;

    use super::*;

    #[test]
    fn wrong_family_is_reported_by_name() {
        let err = ByteReader::new(&[FAMILY_THETA, 3])
            .read_header(FAMILY_HLL, 1)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sketch codec error: expected a HLL sketch (family 7), found Theta (family 3)"
        );
    }

    #[test]
    fn short_reads_fail() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert!(matches!(reader.read_u32(), Err(SketchError::Codec(_))));
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut reader = ByteReader::new(&[1, 0, 0, 0, 9]);
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert!(reader.finish().is_err());
    }
}
