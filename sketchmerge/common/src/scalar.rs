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

//! This module provides ScalarValue, a single field of a pipeline record

use std::fmt;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array,
    GenericListArray, Int32Array, Int64Array, LargeBinaryArray, LargeListArray,
    LargeStringArray, ListArray, OffsetSizeTrait, StringArray, StructArray,
    UInt64Array,
};
use arrow::datatypes::DataType;

use crate::error::{Result, SketchError};
use crate::tuple::{Bag, Tuple};

/// Represents a dynamically typed, nullable single value.
///
/// Apart from [`ScalarValue::Null`], every variant carries its own typed
/// null (`None`), so a null payload still reports the type it was declared
/// with.
#[derive(Clone, PartialEq)]
pub enum ScalarValue {
    /// untyped null
    Null,
    /// true or false value
    Boolean(Option<bool>),
    /// 32bit int
    Int32(Option<i32>),
    /// 64bit int
    Int64(Option<i64>),
    /// unsigned 64bit int
    UInt64(Option<u64>),
    /// 32bit float
    Float32(Option<f32>),
    /// 64bit float
    Float64(Option<f64>),
    /// utf-8 encoded string.
    Utf8(Option<String>),
    /// binary
    Binary(Option<Vec<u8>>),
    /// nested bag of records
    Bag(Option<Bag>),
}

macro_rules! typed_cast {
    ($array:expr, $index:expr, $ARRAYTYPE:ident, $SCALAR:ident) => {{
        let array = $array.as_any().downcast_ref::<$ARRAYTYPE>().ok_or_else(|| {
            SketchError::Internal(format!(
                "could not downcast {} to {}",
                $array.data_type(),
                stringify!($ARRAYTYPE)
            ))
        })?;
        ScalarValue::$SCALAR(if array.is_null($index) {
            None
        } else {
            Some(array.value($index).into())
        })
    }};
}

impl ScalarValue {
    /// whether this value is null or not.
    pub fn is_null(&self) -> bool {
        matches!(
            *self,
            ScalarValue::Null
                | ScalarValue::Boolean(None)
                | ScalarValue::Int32(None)
                | ScalarValue::Int64(None)
                | ScalarValue::UInt64(None)
                | ScalarValue::Float32(None)
                | ScalarValue::Float64(None)
                | ScalarValue::Utf8(None)
                | ScalarValue::Binary(None)
                | ScalarValue::Bag(None)
        )
    }

    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "Null",
            ScalarValue::Boolean(_) => "Boolean",
            ScalarValue::Int32(_) => "Int32",
            ScalarValue::Int64(_) => "Int64",
            ScalarValue::UInt64(_) => "UInt64",
            ScalarValue::Float32(_) => "Float32",
            ScalarValue::Float64(_) => "Float64",
            ScalarValue::Utf8(_) => "Utf8",
            ScalarValue::Binary(_) => "Binary",
            ScalarValue::Bag(_) => "Bag",
        }
    }

    /// Numeric value widened to `f64`, `None` for nulls and non-numeric values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int32(v) => v.map(f64::from),
            ScalarValue::Int64(v) => v.map(|v| v as f64),
            ScalarValue::UInt64(v) => v.map(|v| v as f64),
            ScalarValue::Float32(v) => v.map(f64::from),
            ScalarValue::Float64(v) => *v,
            _ => None,
        }
    }

    /// Converts a value in `array` at `index` into a ScalarValue.
    ///
    /// List cells become a [`ScalarValue::Bag`]: each element of the list is
    /// one record, and elements of a struct list spread their columns over
    /// the record's fields.
    pub fn try_from_array(array: &ArrayRef, index: usize) -> Result<Self> {
        Ok(match array.data_type() {
            DataType::Null => ScalarValue::Null,
            DataType::Boolean => typed_cast!(array, index, BooleanArray, Boolean),
            DataType::Int32 => typed_cast!(array, index, Int32Array, Int32),
            DataType::Int64 => typed_cast!(array, index, Int64Array, Int64),
            DataType::UInt64 => typed_cast!(array, index, UInt64Array, UInt64),
            DataType::Float32 => typed_cast!(array, index, Float32Array, Float32),
            DataType::Float64 => typed_cast!(array, index, Float64Array, Float64),
            DataType::Utf8 => typed_cast!(array, index, StringArray, Utf8),
            DataType::LargeUtf8 => typed_cast!(array, index, LargeStringArray, Utf8),
            DataType::Binary => typed_cast!(array, index, BinaryArray, Binary),
            DataType::LargeBinary => typed_cast!(array, index, LargeBinaryArray, Binary),
            DataType::List(_) => {
                let list = array.as_any().downcast_ref::<ListArray>().ok_or_else(|| {
                    SketchError::Internal("could not downcast List".to_string())
                })?;
                ScalarValue::Bag(bag_from_list(list, index)?)
            }
            DataType::LargeList(_) => {
                let list =
                    array.as_any().downcast_ref::<LargeListArray>().ok_or_else(|| {
                        SketchError::Internal("could not downcast LargeList".to_string())
                    })?;
                ScalarValue::Bag(bag_from_list(list, index)?)
            }
            other => {
                return Err(SketchError::Execution(format!(
                    "Can't create a scalar from array of type \"{:?}\"",
                    other
                )))
            }
        })
    }
}

fn bag_from_list<O: OffsetSizeTrait>(
    list: &GenericListArray<O>,
    index: usize,
) -> Result<Option<Bag>> {
    if list.is_null(index) {
        return Ok(None);
    }
    let values = list.value(index);
    let bag = match values.as_any().downcast_ref::<StructArray>() {
        Some(records) => (0..records.len())
            .map(|row| {
                records
                    .columns()
                    .iter()
                    .map(|column| ScalarValue::try_from_array(column, row))
                    .collect::<Result<Vec<_>>>()
                    .map(Tuple::new)
            })
            .collect::<Result<Vec<_>>>()?,
        None => (0..values.len())
            .map(|row| Ok(Tuple::new(vec![ScalarValue::try_from_array(&values, row)?])))
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(Some(bag))
}

macro_rules! impl_scalar {
    ($ty:ty, $scalar:tt) => {
        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$scalar(Some(value))
            }
        }

        impl From<Option<$ty>> for ScalarValue {
            fn from(value: Option<$ty>) -> Self {
                ScalarValue::$scalar(value)
            }
        }
    };
}

impl_scalar!(bool, Boolean);
impl_scalar!(i32, Int32);
impl_scalar!(i64, Int64);
impl_scalar!(u64, UInt64);
impl_scalar!(f32, Float32);
impl_scalar!(f64, Float64);
impl_scalar!(String, Utf8);
impl_scalar!(Vec<u8>, Binary);
impl_scalar!(Bag, Bag);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(Some(value.to_string()))
    }
}

macro_rules! format_option {
    ($F:expr, $EXPR:expr) => {{
        match $EXPR {
            Some(e) => write!($F, "{}", e),
            None => write!($F, "NULL"),
        }
    }};
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(e) => format_option!(f, e),
            ScalarValue::Int32(e) => format_option!(f, e),
            ScalarValue::Int64(e) => format_option!(f, e),
            ScalarValue::UInt64(e) => format_option!(f, e),
            ScalarValue::Float32(e) => format_option!(f, e),
            ScalarValue::Float64(e) => format_option!(f, e),
            ScalarValue::Utf8(e) => format_option!(f, e),
            ScalarValue::Binary(e) => match e {
                Some(bytes) => write!(f, "<{} bytes>", bytes.len()),
                None => write!(f, "NULL"),
            },
            ScalarValue::Bag(e) => match e {
                Some(bag) => {
                    write!(f, "{{")?;
                    for (i, record) in bag.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", record)?;
                    }
                    write!(f, "}}")
                }
                None => write!(f, "NULL"),
            },
        }
    }
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Builder, ListBuilder, StringBuilder, StructBuilder};
    use arrow::datatypes::{Field, Int64Type};

    use super::*;

    #[test]
    fn typed_nulls_are_null() {
        assert!(ScalarValue::Null.is_null());
        assert!(ScalarValue::Binary(None).is_null());
        assert!(ScalarValue::Bag(None).is_null());
        assert!(!ScalarValue::Int64(Some(0)).is_null());
        assert!(!ScalarValue::Bag(Some(vec![])).is_null());
    }

    #[test]
    fn scalar_from_primitive_arrays() -> Result<()> {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(7), None]));
        assert_eq!(ScalarValue::try_from_array(&array, 0)?, ScalarValue::Int64(Some(7)));
        assert_eq!(ScalarValue::try_from_array(&array, 1)?, ScalarValue::Int64(None));

        let array: ArrayRef = Arc::new(BinaryArray::from_opt_vec(vec![
            Some(b"abc".as_ref()),
            None,
        ]));
        assert_eq!(
            ScalarValue::try_from_array(&array, 0)?,
            ScalarValue::Binary(Some(b"abc".to_vec()))
        );
        assert!(ScalarValue::try_from_array(&array, 1)?.is_null());
        Ok(())
    }

    #[test]
    fn list_cell_becomes_bag_of_single_field_records() -> Result<()> {
        let array: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(
            vec![Some(vec![Some(1), Some(2)]), None, Some(vec![])],
        ));
        let expected = vec![
            Tuple::new(vec![ScalarValue::Int64(Some(1))]),
            Tuple::new(vec![ScalarValue::Int64(Some(2))]),
        ];
        assert_eq!(
            ScalarValue::try_from_array(&array, 0)?,
            ScalarValue::Bag(Some(expected))
        );
        assert_eq!(ScalarValue::try_from_array(&array, 1)?, ScalarValue::Bag(None));
        assert_eq!(
            ScalarValue::try_from_array(&array, 2)?,
            ScalarValue::Bag(Some(vec![]))
        );
        Ok(())
    }

    #[test]
    fn struct_list_cell_spreads_columns_over_fields() -> Result<()> {
        let fields = vec![
            Field::new("key", DataType::Utf8, true),
            Field::new("value", DataType::Float64, true),
        ];
        let mut builder = ListBuilder::new(StructBuilder::new(
            fields,
            vec![
                Box::new(StringBuilder::new()),
                Box::new(Float64Builder::new()),
            ],
        ));
        {
            let records = builder.values();
            records
                .field_builder::<StringBuilder>(0)
                .unwrap()
                .append_value("a");
            records
                .field_builder::<Float64Builder>(1)
                .unwrap()
                .append_value(1.5);
            records.append(true);
        }
        builder.append(true);
        let array: ArrayRef = Arc::new(builder.finish());

        let expected = vec![Tuple::new(vec![
            ScalarValue::from("a"),
            ScalarValue::Float64(Some(1.5)),
        ])];
        assert_eq!(
            ScalarValue::try_from_array(&array, 0)?,
            ScalarValue::Bag(Some(expected))
        );
        Ok(())
    }

    #[test]
    fn display_and_debug() {
        assert_eq!(ScalarValue::Int64(Some(3)).to_string(), "3");
        assert_eq!(ScalarValue::Utf8(None).to_string(), "NULL");
        assert_eq!(
            format!("{:?}", ScalarValue::Binary(Some(vec![1, 2]))),
            "Binary(<2 bytes>)"
        );
        let bag = ScalarValue::Bag(Some(vec![Tuple::new(vec![ScalarValue::from(1i64)])]));
        assert_eq!(bag.to_string(), "{(1)}");
    }
}
