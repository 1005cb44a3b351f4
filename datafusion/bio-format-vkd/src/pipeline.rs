//! Multi-dataset merge runs.
//!
//! A run ingests, per dataset, a query call set, its labeled counterpart and any number
//! of functional annotators, merges all datasets under schema reconciliation and finally
//! attaches a sites-only clinical annotation source.

use crate::annotation::{AnnotationLayout, expand_annotations};
use crate::error::Result;
use crate::merge::{EnrichOptions, MatchPolicy, MergeReport, enrich, merge_datasets};
use crate::storage::VariantReadOptions;
use crate::table_provider::IngestReport;
use crate::typed_table::{IDENTITY_KEY, TypedTable, read_variants};
use datafusion::prelude::{SessionContext, ident};
use log::info;

/// Contig prefix missing from ClinVar contig names.
pub const CLINVAR_CHR_PREFIX: &str = "chr";

/// An annotated copy of a dataset's call set.
#[derive(Debug, Clone)]
pub struct AnnotatorInput {
    /// Path of the annotated variant file
    pub path: String,
    /// Prefix of the expanded columns
    pub prefix: String,
    /// List column holding the annotations
    pub column: String,
    /// Sub-field layout of each annotation element
    pub layout: AnnotationLayout,
}

impl AnnotatorInput {
    /// snpEff output: `info_ANN` expanded under `snpeff_*`.
    pub fn snpeff(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: "snpeff".to_string(),
            column: "info_ANN".to_string(),
            layout: AnnotationLayout::snpeff(),
        }
    }

    /// VEP output: `info_CSQ` expanded under `vep_*`.
    pub fn vep(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: "vep".to_string(),
            column: "info_CSQ".to_string(),
            layout: AnnotationLayout::vep(),
        }
    }
}

/// Inputs of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetInputs {
    /// Value of the `dataset` column for this dataset's rows
    pub name: String,
    /// Path of the query call set
    pub query: String,
    /// Path of the labeled call set, if any
    pub labeled: Option<String>,
    /// Annotated call sets
    pub annotators: Vec<AnnotatorInput>,
}

impl DatasetInputs {
    /// A dataset with only a query call set.
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            labeled: None,
            annotators: Vec::new(),
        }
    }
}

/// A full merge run.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Datasets, merged in this order
    pub datasets: Vec<DatasetInputs>,
    /// Path of a sites-only ClinVar source
    pub clinvar: Option<String>,
    /// Options used to read query, labeled and annotator sources
    pub read_options: VariantReadOptions,
    /// Columns taken from each labeled source
    pub label_columns: Vec<String>,
}

impl Default for MergePlan {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            clinvar: None,
            read_options: VariantReadOptions::default(),
            label_columns: vec!["format_bd".to_string()],
        }
    }
}

/// Result of a merge run.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Merged relation
    pub table: TypedTable,
    /// Columns dropped by schema reconciliation
    pub report: MergeReport,
    /// Ingestion diagnostics of every source read, keyed by path
    pub ingest: Vec<(String, IngestReport)>,
}

/// Run a merge plan.
///
/// The returned table is still lazy; executing or persisting it is up to the caller.
pub fn run_merge(ctx: &SessionContext, plan: &MergePlan) -> Result<MergeOutcome> {
    let mut ingest = Vec::new();
    let mut read = |path: &str, options: VariantReadOptions| -> Result<TypedTable> {
        let (table, report) = read_variants(ctx, path, options)?;
        info!("Ingested {path}: {report:?}");
        ingest.push((path.to_string(), report));
        Ok(table)
    };

    let mut tables = Vec::with_capacity(plan.datasets.len());
    for dataset in &plan.datasets {
        let mut table = read(&dataset.query, plan.read_options.clone())?;

        if let Some(labeled) = &dataset.labeled {
            let labels = read(labeled, plan.read_options.clone())?;
            let options = EnrichOptions {
                columns: Some(plan.label_columns.clone()),
                ..EnrichOptions::default()
            };
            table = enrich(table, labels, &options)?;
        }

        for annotator in &dataset.annotators {
            let annotated = read(&annotator.path, plan.read_options.clone())?;
            let mut columns: Vec<_> = IDENTITY_KEY.iter().map(|k| ident(*k)).collect();
            columns.push(ident(&annotator.column));
            let annotated = TypedTable::new(annotated.into_frame().select(columns)?)?;
            let expanded = expand_annotations(
                annotated,
                &annotator.column,
                &annotator.prefix,
                &annotator.layout,
            )?;
            let options = EnrichOptions {
                match_policy: MatchPolicy::All,
                ..EnrichOptions::default()
            };
            table = enrich(table, expanded, &options)?;
        }

        tables.push((dataset.name.clone(), table));
    }

    let (mut table, report) = merge_datasets(tables)?;

    if let Some(clinvar) = &plan.clinvar {
        let options = VariantReadOptions {
            compression_type: plan.read_options.compression_type,
            ..VariantReadOptions::sites_only()
        };
        let clinvar = read(clinvar, options)?;
        let options = EnrichOptions {
            chr_prefix: Some(CLINVAR_CHR_PREFIX.to_string()),
            collision_suffix: Some("_clinvar".to_string()),
            ..EnrichOptions::default()
        };
        table = enrich(table, clinvar, &options)?;
    }

    Ok(MergeOutcome {
        table,
        report,
        ingest,
    })
}
