use datafusion::arrow::array::{
    Array, ArrayRef, Float32Builder, Float64Builder, Int64Builder, ListBuilder, StringBuilder,
    UInt32Builder,
};
use datafusion::arrow::datatypes::{DataType, Field};
use datafusion::arrow::error::ArrowError;
use std::sync::Arc;

/// Returns the Arrow list type used for multi-valued fields, with a nullable `item` child.
pub fn list_of(inner: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", inner, true)))
}

/// Builder wrapper for nullable columns in Arrow record batches
///
/// Every variant accepts missing values, both at the cell level and, for list variants,
/// at the element level (e.g. `10,.,5` becomes `[10, null, 5]`).
#[derive(Debug)]
pub enum OptionalField {
    /// Builder for Int64 scalar values
    Int64Builder(Int64Builder),
    /// Builder for Int64 list values
    ArrayInt64Builder(ListBuilder<Int64Builder>),
    /// Builder for UInt32 scalar values
    UInt32Builder(UInt32Builder),
    /// Builder for UInt32 list values
    ArrayUInt32Builder(ListBuilder<UInt32Builder>),
    /// Builder for Float64 scalar values
    Float64Builder(Float64Builder),
    /// Builder for Float64 list values
    ArrayFloat64Builder(ListBuilder<Float64Builder>),
    /// Builder for Float32 scalar values
    Float32Builder(Float32Builder),
    /// Builder for Float32 list values
    ArrayFloat32Builder(ListBuilder<Float32Builder>),
    /// Builder for UTF8 string scalar values
    Utf8Builder(StringBuilder),
    /// Builder for UTF8 string list values
    ArrayUtf8Builder(ListBuilder<StringBuilder>),
}

impl OptionalField {
    /// Creates a new OptionalField builder for the specified data type
    ///
    /// # Arguments
    ///
    /// * `data_type` - Arrow data type to build
    /// * `batch_size` - Initial capacity for the builder
    ///
    /// # Errors
    ///
    /// Returns an error if the data type is not supported
    pub fn new(data_type: &DataType, batch_size: usize) -> Result<OptionalField, ArrowError> {
        match data_type {
            DataType::Int64 => Ok(OptionalField::Int64Builder(Int64Builder::with_capacity(
                batch_size,
            ))),
            DataType::UInt32 => Ok(OptionalField::UInt32Builder(UInt32Builder::with_capacity(
                batch_size,
            ))),
            DataType::Float64 => Ok(OptionalField::Float64Builder(
                Float64Builder::with_capacity(batch_size),
            )),
            DataType::Float32 => Ok(OptionalField::Float32Builder(
                Float32Builder::with_capacity(batch_size),
            )),
            DataType::Utf8 => Ok(OptionalField::Utf8Builder(StringBuilder::with_capacity(
                batch_size,
                batch_size * 10,
            ))),
            DataType::List(f) => match f.data_type() {
                DataType::Int64 => Ok(OptionalField::ArrayInt64Builder(
                    ListBuilder::with_capacity(Int64Builder::with_capacity(batch_size), batch_size),
                )),
                DataType::UInt32 => Ok(OptionalField::ArrayUInt32Builder(
                    ListBuilder::with_capacity(
                        UInt32Builder::with_capacity(batch_size),
                        batch_size,
                    ),
                )),
                DataType::Float64 => Ok(OptionalField::ArrayFloat64Builder(
                    ListBuilder::with_capacity(
                        Float64Builder::with_capacity(batch_size),
                        batch_size,
                    ),
                )),
                DataType::Float32 => Ok(OptionalField::ArrayFloat32Builder(
                    ListBuilder::with_capacity(
                        Float32Builder::with_capacity(batch_size),
                        batch_size,
                    ),
                )),
                DataType::Utf8 => Ok(OptionalField::ArrayUtf8Builder(ListBuilder::with_capacity(
                    StringBuilder::with_capacity(batch_size, batch_size * 10),
                    batch_size,
                ))),
                other => Err(ArrowError::SchemaError(format!(
                    "Unsupported list inner data type: {other}"
                ))),
            },
            other => Err(ArrowError::SchemaError(format!(
                "Unsupported data type: {other}"
            ))),
        }
    }

    /// Appends an optional Int64 value
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an Int64Builder
    pub fn append_int64(&mut self, value: Option<i64>) -> Result<(), ArrowError> {
        match self {
            OptionalField::Int64Builder(builder) => {
                builder.append_option(value);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected Int64Builder".into())),
        }
    }

    /// Appends an optional UInt32 value
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a UInt32Builder
    pub fn append_uint32(&mut self, value: Option<u32>) -> Result<(), ArrowError> {
        match self {
            OptionalField::UInt32Builder(builder) => {
                builder.append_option(value);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected UInt32Builder".into())),
        }
    }

    /// Appends an optional Float64 value
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a Float64Builder
    pub fn append_float64(&mut self, value: Option<f64>) -> Result<(), ArrowError> {
        match self {
            OptionalField::Float64Builder(builder) => {
                builder.append_option(value);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected Float64Builder".into())),
        }
    }

    /// Appends an optional Float32 value
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a Float32Builder
    pub fn append_float32(&mut self, value: Option<f32>) -> Result<(), ArrowError> {
        match self {
            OptionalField::Float32Builder(builder) => {
                builder.append_option(value);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected Float32Builder".into())),
        }
    }

    /// Appends an optional string value
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a Utf8Builder
    pub fn append_string(&mut self, value: Option<&str>) -> Result<(), ArrowError> {
        match self {
            OptionalField::Utf8Builder(builder) => {
                builder.append_option(value);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected Utf8Builder".into())),
        }
    }

    /// Appends a list of nullable Int64 values as one list cell
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an ArrayInt64Builder
    pub fn append_array_int64(&mut self, value: Vec<Option<i64>>) -> Result<(), ArrowError> {
        match self {
            OptionalField::ArrayInt64Builder(builder) => {
                builder.values().extend(value);
                builder.append(true);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected ArrayInt64Builder".into())),
        }
    }

    /// Appends a list of nullable UInt32 values as one list cell
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an ArrayUInt32Builder
    pub fn append_array_uint32(&mut self, value: Vec<Option<u32>>) -> Result<(), ArrowError> {
        match self {
            OptionalField::ArrayUInt32Builder(builder) => {
                builder.values().extend(value);
                builder.append(true);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError(
                "Expected ArrayUInt32Builder".into(),
            )),
        }
    }

    /// Appends a list of nullable Float64 values as one list cell
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an ArrayFloat64Builder
    pub fn append_array_float64(&mut self, value: Vec<Option<f64>>) -> Result<(), ArrowError> {
        match self {
            OptionalField::ArrayFloat64Builder(builder) => {
                builder.values().extend(value);
                builder.append(true);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError(
                "Expected ArrayFloat64Builder".into(),
            )),
        }
    }

    /// Appends a list of nullable Float32 values as one list cell
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an ArrayFloat32Builder
    pub fn append_array_float32(&mut self, value: Vec<Option<f32>>) -> Result<(), ArrowError> {
        match self {
            OptionalField::ArrayFloat32Builder(builder) => {
                builder.values().extend(value);
                builder.append(true);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError(
                "Expected ArrayFloat32Builder".into(),
            )),
        }
    }

    /// Appends a list of nullable strings as one list cell
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an ArrayUtf8Builder
    pub fn append_array_string(&mut self, value: Vec<Option<&str>>) -> Result<(), ArrowError> {
        match self {
            OptionalField::ArrayUtf8Builder(builder) => {
                for v in value {
                    builder.values().append_option(v);
                }
                builder.append(true);
                Ok(())
            }
            _ => Err(ArrowError::SchemaError("Expected ArrayUtf8Builder".into())),
        }
    }

    /// Appends a null cell (a null scalar, or a null list for list variants)
    ///
    /// # Errors
    ///
    /// This method does not return errors in practice
    pub fn append_null(&mut self) -> Result<(), ArrowError> {
        match self {
            OptionalField::Int64Builder(builder) => builder.append_null(),
            OptionalField::ArrayInt64Builder(builder) => builder.append_null(),
            OptionalField::UInt32Builder(builder) => builder.append_null(),
            OptionalField::ArrayUInt32Builder(builder) => builder.append_null(),
            OptionalField::Float64Builder(builder) => builder.append_null(),
            OptionalField::ArrayFloat64Builder(builder) => builder.append_null(),
            OptionalField::Float32Builder(builder) => builder.append_null(),
            OptionalField::ArrayFloat32Builder(builder) => builder.append_null(),
            OptionalField::Utf8Builder(builder) => builder.append_null(),
            OptionalField::ArrayUtf8Builder(builder) => builder.append_null(),
        }
        Ok(())
    }

    /// Finalizes the builder and returns the built Arrow array
    pub fn finish(&mut self) -> ArrayRef {
        match self {
            OptionalField::Int64Builder(builder) => Arc::new(builder.finish()),
            OptionalField::ArrayInt64Builder(builder) => Arc::new(builder.finish()),
            OptionalField::UInt32Builder(builder) => Arc::new(builder.finish()),
            OptionalField::ArrayUInt32Builder(builder) => Arc::new(builder.finish()),
            OptionalField::Float64Builder(builder) => Arc::new(builder.finish()),
            OptionalField::ArrayFloat64Builder(builder) => Arc::new(builder.finish()),
            OptionalField::Float32Builder(builder) => Arc::new(builder.finish()),
            OptionalField::ArrayFloat32Builder(builder) => Arc::new(builder.finish()),
            OptionalField::Utf8Builder(builder) => Arc::new(builder.finish()),
            OptionalField::ArrayUtf8Builder(builder) => Arc::new(builder.finish()),
        }
    }
}

/// Converts a slice of OptionalField builders to a vector of Arrow arrays
pub fn builders_to_arrays(builders: &mut [OptionalField]) -> Vec<Arc<dyn Array>> {
    builders.iter_mut().map(|f| f.finish()).collect()
}
