//! The typed relation produced by ingestion and consumed by expansion and merging.

use crate::error::{Result, VariantError};
use crate::storage::VariantReadOptions;
use crate::table_provider::{IngestReport, VariantTableProvider};
use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::prelude::{DataFrame, SessionContext};
use std::sync::Arc;

/// Columns identifying a variant locus and allele.
pub const IDENTITY_KEY: [&str; 4] = ["chr", "position", "ref", "alt"];

/// A lazily evaluated relation that always carries the identity key columns.
///
/// Rows are not unique by key: multi-allelic splits and exploded annotations repeat it.
#[derive(Debug, Clone)]
pub struct TypedTable {
    frame: DataFrame,
}

impl TypedTable {
    /// Wraps a DataFrame, checking that every identity key column is present.
    pub fn new(frame: DataFrame) -> Result<Self> {
        for key in IDENTITY_KEY {
            if frame.schema().field_with_unqualified_name(key).is_err() {
                return Err(VariantError::MissingColumn(key.to_string()));
            }
        }
        Ok(Self { frame })
    }

    /// Builds a table over a variant provider.
    pub fn from_provider(ctx: &SessionContext, provider: VariantTableProvider) -> Result<Self> {
        Self::new(ctx.read_table(Arc::new(provider))?)
    }

    /// The underlying DataFrame.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Consumes the table, returning the underlying DataFrame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Arrow schema of the relation.
    pub fn schema(&self) -> SchemaRef {
        Arc::new(self.frame.schema().as_arrow().clone())
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Executes the plan and collects every batch.
    pub async fn collect(self) -> Result<Vec<RecordBatch>> {
        Ok(self.frame.collect().await?)
    }

    /// Executes the plan and counts rows.
    pub async fn count(self) -> Result<usize> {
        Ok(self.frame.count().await?)
    }
}

/// Ingest one variant file into a typed table.
///
/// Returns the table together with the ingestion diagnostics of the source.
pub fn read_variants(
    ctx: &SessionContext,
    file_path: &str,
    options: VariantReadOptions,
) -> Result<(TypedTable, IngestReport)> {
    let provider = VariantTableProvider::new(file_path, options)?;
    let report = provider.report();
    Ok((TypedTable::from_provider(ctx, provider)?, report))
}
