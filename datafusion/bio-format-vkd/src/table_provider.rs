use crate::error::Result;
use crate::header::VariantHeader;
use crate::layout::LayoutMap;
use crate::physical_exec::{LayoutPartition, VariantExec, partition_records};
use crate::rules::{RuleSet, compile_rules};
use crate::storage::{RawRecords, SourceData, VariantReadOptions, read_from_reader, read_source};
use async_trait::async_trait;
use datafusion::arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::catalog::{Session, TableProvider};
use datafusion::datasource::TableType;
use datafusion::logical_expr::Expr;
use datafusion::physical_plan::ExecutionPlan;
use log::debug;
use std::any::Any;
use std::io::BufRead;
use std::sync::Arc;

/// Diagnostics gathered while ingesting one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records that made it into the table
    pub records: usize,
    /// Records dropped because their layout could not be applied
    pub layout_mismatches: usize,
    /// Distinct layouts discovered
    pub layouts: usize,
    /// Header declarations ignored as malformed or duplicated
    pub dropped_declarations: usize,
}

/// A DataFusion table over one variant source.
///
/// Construction reads the source once, discovers its layouts and compiles the extraction
/// rules; scans then convert the raw records per layout partition.
#[derive(Clone, Debug)]
pub struct VariantTableProvider {
    file_path: String,
    schema: SchemaRef,
    header: VariantHeader,
    layouts: LayoutMap,
    rules: Arc<RuleSet>,
    records: Arc<RawRecords>,
    partitions: Arc<Vec<LayoutPartition>>,
    options: VariantReadOptions,
    report: IngestReport,
}

impl VariantTableProvider {
    /// Reads a local, optionally compressed, variant file.
    ///
    /// # Errors
    ///
    /// Fails if the path is not local, the file cannot be read, the header has no
    /// `#CHROM` line, or the requested sample does not exist.
    pub fn new(file_path: impl Into<String>, options: VariantReadOptions) -> Result<Self> {
        let file_path = file_path.into();
        let data = read_source(&file_path, &options)?;
        Ok(Self::from_source(file_path, data, options))
    }

    /// Reads a variant source from an in-memory or already opened reader.
    pub fn from_reader(
        name: impl Into<String>,
        reader: &mut impl BufRead,
        options: VariantReadOptions,
    ) -> Result<Self> {
        let data = read_from_reader(reader, &options)?;
        Ok(Self::from_source(name.into(), data, options))
    }

    fn from_source(file_path: String, data: SourceData, options: VariantReadOptions) -> Self {
        let SourceData {
            header,
            records,
            layout_mismatches,
        } = data;
        let layouts = LayoutMap::discover(records.layout_keys.iter().map(|k| k.as_str()));
        let rules = compile_rules(&header, &layouts);
        let (partitions, unregistered) = partition_records(&records, &rules);

        let report = IngestReport {
            records: partitions.iter().map(|p| p.rows.len()).sum(),
            layout_mismatches: layout_mismatches + unregistered,
            layouts: layouts.len(),
            dropped_declarations: header.dropped_declarations,
        };
        debug!("VariantTableProvider::new - {}: {:?}", file_path, report);

        Self {
            file_path,
            schema: rules.schema(),
            header,
            layouts,
            rules: Arc::new(rules),
            records: Arc::new(records),
            partitions: Arc::new(partitions),
            options,
            report,
        }
    }

    /// Source path or name.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Parsed header.
    pub fn header(&self) -> &VariantHeader {
        &self.header
    }

    /// Layouts discovered in the source.
    pub fn layouts(&self) -> &LayoutMap {
        &self.layouts
    }

    /// Compiled extraction rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Ingestion diagnostics.
    pub fn report(&self) -> IngestReport {
        self.report
    }
}

fn project_schema(schema: &SchemaRef, projection: Option<&Vec<usize>>) -> SchemaRef {
    match projection {
        Some(indices) => {
            let projected_fields: Vec<Field> =
                indices.iter().map(|&i| schema.field(i).clone()).collect();
            Arc::new(Schema::new(projected_fields))
        }
        None => schema.clone(),
    }
}

#[async_trait]
impl TableProvider for VariantTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        limit: Option<usize>,
    ) -> datafusion::common::Result<Arc<dyn ExecutionPlan>> {
        debug!(
            "VariantTableProvider::scan - {}: {} partitions, projection={:?}, limit={:?}",
            self.file_path,
            self.partitions.len(),
            projection,
            limit
        );
        Ok(Arc::new(VariantExec::new(
            project_schema(&self.schema, projection),
            self.schema.clone(),
            projection.cloned(),
            self.records.clone(),
            self.rules.clone(),
            self.partitions.clone(),
            self.options.batch_size,
            limit,
        )))
    }
}
