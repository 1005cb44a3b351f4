use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::error::ArrowError;
use datafusion::common::DataFusionError;
use thiserror::Error;

/// Errors raised while ingesting or combining variant tables.
///
/// Lenient coercions (malformed numbers, missing tokens, fields absent from a layout)
/// never surface here; they become nulls.
#[derive(Debug, Error)]
pub enum VariantError {
    /// The `#CHROM` column-header line was not found before end of stream.
    #[error("Malformed header in {0}: no #CHROM column-header line before end of stream")]
    MalformedHeader(String),

    /// The requested sample is not listed on the column-header line.
    #[error("Sample {0} not found in column header")]
    UnknownSample(String),

    /// Only local sources can be ingested.
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// A column required by an operation is absent from the table.
    #[error("Column not found: {0}")]
    MissingColumn(String),

    /// The annotation column is not a list of strings.
    #[error("Column {column} has type {found}, expected List<Utf8>")]
    InvalidAnnotationColumn {
        /// Name of the offending column
        column: String,
        /// Its actual type
        found: DataType,
    },

    /// A merge was requested with no input tables.
    #[error("No tables to merge")]
    NothingToMerge,

    /// I/O failure while reading a source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure in the query engine.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    /// Failure while assembling Arrow arrays.
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Result type of the ingestion and merge APIs.
pub type Result<T> = std::result::Result<T, VariantError>;

impl From<VariantError> for DataFusionError {
    fn from(error: VariantError) -> Self {
        match error {
            VariantError::DataFusion(e) => e,
            other => DataFusionError::External(Box::new(other)),
        }
    }
}
