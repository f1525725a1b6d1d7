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

//! sketchmerge error types

use std::error;
use std::fmt::{Display, Formatter};
use std::result;

use arrow::error::ArrowError;

/// Result type for operations that could result in an [SketchError]
pub type Result<T> = result::Result<T, SketchError>;

/// Error type for generic operations that could result in SketchError::External
pub type GenericError = Box<dyn error::Error + Send + Sync>;

/// sketchmerge error
#[derive(Debug)]
pub enum SketchError {
    /// Error returned by arrow.
    ArrowError(ArrowError),
    /// A batch item whose payload is neither a nested bag of raw records
    /// nor a serialized sketch. Fatal to the merge invocation that saw it.
    Classification(String),
    /// Absent or invalid sketch parameters, raised before any merge runs.
    Configuration(String),
    /// Bytes that do not decode into a sketch of the expected family, or a
    /// sketch whose parameters cannot be combined with the running union.
    Codec(String),
    /// Error returned while applying raw records to a sketch.
    /// Examples include non-numeric values for a tuple sketch.
    Execution(String),
    /// Error returned as a consequence of an error in sketchmerge.
    /// This error should not happen in normal usage.
    Internal(String),
    /// Errors originating from outside sketchmerge's codebase.
    External(GenericError),
}

impl From<ArrowError> for SketchError {
    fn from(e: ArrowError) -> Self {
        SketchError::ArrowError(e)
    }
}

impl From<SketchError> for ArrowError {
    fn from(e: SketchError) -> Self {
        match e {
            SketchError::ArrowError(e) => e,
            SketchError::External(e) => ArrowError::ExternalError(e),
            other => ArrowError::ExternalError(Box::new(other)),
        }
    }
}

impl From<GenericError> for SketchError {
    fn from(err: GenericError) -> Self {
        SketchError::External(err)
    }
}

impl Display for SketchError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            SketchError::ArrowError(ref desc) => write!(f, "Arrow error: {}", desc),
            SketchError::Classification(ref desc) => {
                write!(f, "Classification error: {}", desc)
            }
            SketchError::Configuration(ref desc) => {
                write!(f, "Invalid configuration: {}", desc)
            }
            SketchError::Codec(ref desc) => {
                write!(f, "Sketch codec error: {}", desc)
            }
            SketchError::Execution(ref desc) => {
                write!(f, "Execution error: {}", desc)
            }
            SketchError::Internal(ref desc) => {
                write!(f, "Internal error: {}. This was likely caused by a bug in sketchmerge's \
                    code and we would welcome that you file an bug report in our issue tracker", desc)
            }
            SketchError::External(ref desc) => {
                write!(f, "External error: {}", desc)
            }
        }
    }
}

impl error::Error for SketchError {}

#[macro_export]
macro_rules! classification_err {
    ($($arg:tt)*) => {
        Err($crate::error::SketchError::Classification(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! config_err {
    ($($arg:tt)*) => {
        Err($crate::error::SketchError::Configuration(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! codec_err {
    ($($arg:tt)*) => {
        Err($crate::error::SketchError::Codec(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! exec_err {
    ($($arg:tt)*) => {
        Err($crate::error::SketchError::Execution(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! internal_err {
    ($($arg:tt)*) => {
        Err($crate::error::SketchError::Internal(format!($($arg)*)))
    };
}

#[cfg(test)]
mod test {
    use crate::error::SketchError;
    use arrow::error::ArrowError;

    #[test]
    fn arrow_error_to_sketch() {
        let res = return_arrow_error().unwrap_err();
        assert_eq!(
            res.to_string(),
            "External error: Classification error: foo"
        );
    }

    #[test]
    fn sketch_error_to_arrow() {
        let res = return_sketch_error().unwrap_err();
        assert_eq!(res.to_string(), "Arrow error: Schema error: bar");
    }

    #[test]
    fn macros_build_the_matching_variant() {
        let res: crate::Result<()> = classification_err!("got {}", "Int64");
        assert!(matches!(res, Err(SketchError::Classification(ref m)) if m == "got Int64"));

        let res: crate::Result<()> = config_err!("lg_k {} out of range", 99);
        assert_eq!(
            res.unwrap_err().to_string(),
            "Invalid configuration: lg_k 99 out of range"
        );
    }

    /// Sketch code used as an arrow kernel callback must hand back an ArrowError
    #[allow(clippy::try_err)]
    fn return_arrow_error() -> arrow::error::Result<()> {
        // Expect the '?' to work
        let _foo = Err(SketchError::Classification("foo".to_string()))?;
        Ok(())
    }

    /// Arrow kernels used in sketch code: ArrowError turns into SketchError
    #[allow(clippy::try_err)]
    fn return_sketch_error() -> crate::error::Result<()> {
        // Expect the '?' to work
        let _bar = Err(ArrowError::SchemaError("bar".to_string()))?;
        Ok(())
    }
}
