//! Combining typed tables from several sources.
//!
//! [`merge_datasets`] unions tables row-wise under a reconciled schema, dropping any
//! column whose type differs between sources. [`enrich`] left-joins extra columns onto a
//! table by identity key.

use crate::error::{Result, VariantError};
use crate::typed_table::{IDENTITY_KEY, TypedTable};
use datafusion::arrow::datatypes::{DataType, Field, SchemaRef};
use datafusion::common::ScalarValue;
use datafusion::functions::expr_fn::concat;
use datafusion::logical_expr::Expr;
use datafusion::prelude::{DataFrame, JoinType, cast, ident, lit};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Name of the column tagging each merged row with its dataset.
pub const DATASET_COLUMN: &str = "dataset";

const ENRICH_KEY_PREFIX: &str = "__enrich_key_";
const ENRICH_VALUE_PREFIX: &str = "__enrich_";

/// A column whose type differs between two merged sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    /// Column name
    pub column: String,
    /// Type of the column in the first source that carried it
    pub expected: DataType,
    /// Conflicting type
    pub found: DataType,
    /// Dataset carrying the conflicting type
    pub dataset: String,
}

/// Outcome of schema reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Every conflict found, in discovery order
    pub conflicts: Vec<TypeConflict>,
}

impl MergeReport {
    /// Names of the columns dropped from the merged schema.
    pub fn dropped_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.conflicts
            .iter()
            .filter(|c| seen.insert(c.column.as_str()))
            .map(|c| c.column.clone())
            .collect()
    }
}

/// Reconcile the schemas of several named datasets.
///
/// Returns the union of all columns in order of first appearance, minus every column whose
/// type is not the same across all datasets carrying it. Union fields are nullable since
/// datasets lacking a column are null-filled.
pub fn reconcile_schemas(schemas: &[(String, SchemaRef)]) -> (Vec<Field>, MergeReport) {
    let mut order: Vec<(String, DataType)> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();
    let mut dead: HashSet<String> = HashSet::new();
    let mut report = MergeReport::default();

    for (dataset, schema) in schemas {
        for field in schema.fields() {
            match types.get(field.name()) {
                None => {
                    types.insert(field.name().clone(), field.data_type().clone());
                    order.push((field.name().clone(), field.data_type().clone()));
                }
                Some(expected) if expected != field.data_type() => {
                    report.conflicts.push(TypeConflict {
                        column: field.name().clone(),
                        expected: expected.clone(),
                        found: field.data_type().clone(),
                        dataset: dataset.clone(),
                    });
                    dead.insert(field.name().clone());
                }
                Some(_) => {}
            }
        }
    }

    let fields = order
        .into_iter()
        .filter(|(name, _)| !dead.contains(name))
        .map(|(name, data_type)| Field::new(name, data_type, true))
        .collect();
    (fields, report)
}

/// Tag each table with its dataset name and union them under a reconciled schema.
///
/// Columns missing from a dataset are filled with nulls; columns with conflicting types
/// are dropped and listed in the returned report.
///
/// # Errors
///
/// [`VariantError::NothingToMerge`] for an empty input, or a planning error.
pub fn merge_datasets(tables: Vec<(String, TypedTable)>) -> Result<(TypedTable, MergeReport)> {
    if tables.is_empty() {
        return Err(VariantError::NothingToMerge);
    }

    let mut tagged: Vec<(String, DataFrame)> = Vec::with_capacity(tables.len());
    for (name, table) in tables {
        let frame = table
            .into_frame()
            .with_column(DATASET_COLUMN, lit(name.as_str()))?;
        tagged.push((name, frame));
    }

    let schemas: Vec<(String, SchemaRef)> = tagged
        .iter()
        .map(|(name, frame)| {
            (
                name.clone(),
                SchemaRef::new(frame.schema().as_arrow().clone()),
            )
        })
        .collect();
    let (fields, report) = reconcile_schemas(&schemas);
    for conflict in &report.conflicts {
        warn!(
            "Dropping column {} from merge: {} in one dataset, {} in {}",
            conflict.column, conflict.expected, conflict.found, conflict.dataset
        );
    }

    let mut merged: Option<DataFrame> = None;
    for ((name, frame), (_, schema)) in tagged.into_iter().zip(&schemas) {
        let projection: Vec<Expr> = fields
            .iter()
            .map(|field| {
                if schema.field_with_name(field.name()).is_ok() {
                    ident(field.name())
                } else {
                    cast(lit(ScalarValue::Null), field.data_type().clone()).alias(field.name())
                }
            })
            .collect();
        debug!("Merging dataset {} with {} columns", name, projection.len());
        let frame = frame.select(projection)?;
        merged = Some(match merged {
            Some(acc) => acc.union(frame)?,
            None => frame,
        });
    }

    let merged = merged.ok_or(VariantError::NothingToMerge)?;
    Ok((TypedTable::new(merged)?, report))
}

/// How duplicate identity keys on the right side of an enrichment are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Keep one right row per key, preserving the left row count
    #[default]
    First,
    /// Keep every matching right row, as a plain left join does
    All,
}

/// Options for [`enrich`].
#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Right-side columns to bring over; all non-key columns when `None`
    pub columns: Option<Vec<String>>,
    /// Prefix prepended to the right side's `chr` values before joining
    pub chr_prefix: Option<String>,
    /// Handling of duplicate right keys
    pub match_policy: MatchPolicy,
    /// Suffix for right columns whose name already exists on the left; such columns are
    /// skipped when `None`
    pub collision_suffix: Option<String>,
}

/// Left-join columns of `right` onto `left` by identity key.
///
/// Unmatched left rows get nulls in the added columns. Keys containing nulls never match.
///
/// # Errors
///
/// [`VariantError::MissingColumn`] if a requested right column does not exist.
pub fn enrich(left: TypedTable, right: TypedTable, options: &EnrichOptions) -> Result<TypedTable> {
    let left_names: HashSet<String> = left.column_names().into_iter().collect();
    let right_schema = right.schema();

    let requested: Vec<String> = match &options.columns {
        Some(columns) => {
            for column in columns {
                if right_schema.field_with_name(column).is_err() {
                    return Err(VariantError::MissingColumn(column.clone()));
                }
            }
            columns.clone()
        }
        None => right_schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| !IDENTITY_KEY.contains(&name.as_str()))
            .collect(),
    };

    let mut values: Vec<(String, String)> = Vec::with_capacity(requested.len());
    for column in requested {
        let output = if left_names.contains(&column) {
            match &options.collision_suffix {
                Some(suffix) => format!("{column}{suffix}"),
                None => {
                    warn!("Skipping enrichment column {column}: already present");
                    continue;
                }
            }
        } else {
            column.clone()
        };
        if left_names.contains(&output) {
            warn!("Skipping enrichment column {column}: {output} already present");
            continue;
        }
        values.push((column, output));
    }

    let mut right_projection: Vec<Expr> = IDENTITY_KEY
        .iter()
        .map(|key| {
            let expr = match (*key, &options.chr_prefix) {
                ("chr", Some(prefix)) => concat(vec![lit(prefix.as_str()), ident("chr")]),
                _ => ident(*key),
            };
            expr.alias(format!("{ENRICH_KEY_PREFIX}{key}"))
        })
        .collect();
    right_projection.extend(
        values
            .iter()
            .enumerate()
            .map(|(i, (column, _))| ident(column).alias(format!("{ENRICH_VALUE_PREFIX}{i}"))),
    );
    let mut right_frame = right.into_frame().select(right_projection)?;

    let right_keys: Vec<String> = IDENTITY_KEY
        .iter()
        .map(|key| format!("{ENRICH_KEY_PREFIX}{key}"))
        .collect();
    if options.match_policy == MatchPolicy::First {
        let on: Vec<Expr> = right_keys.iter().map(ident).collect();
        let mut select = on.clone();
        select.extend((0..values.len()).map(|i| ident(format!("{ENRICH_VALUE_PREFIX}{i}"))));
        right_frame = right_frame.distinct_on(on, select, None)?;
    }

    let right_key_refs: Vec<&str> = right_keys.iter().map(|k| k.as_str()).collect();
    let left_columns = left.column_names();
    let joined = left.into_frame().join(
        right_frame,
        JoinType::Left,
        &IDENTITY_KEY,
        &right_key_refs,
        None,
    )?;

    let mut projection: Vec<Expr> = left_columns.iter().map(ident).collect();
    projection.extend(
        values
            .iter()
            .enumerate()
            .map(|(i, (_, output))| ident(format!("{ENRICH_VALUE_PREFIX}{i}")).alias(output)),
    );
    debug!(
        "Enriching with {} columns ({:?} match)",
        values.len(),
        options.match_policy
    );
    TypedTable::new(joined.select(projection)?)
}
