//! Expansion of pipe-delimited functional annotations (snpEff `ANN`, VEP `CSQ`).
//!
//! An annotation column holds one list element per affected feature, each element a fixed
//! sequence of `|`-separated sub-fields. Expansion explodes the list into one row per
//! element and splits every element into one string column per sub-field.

use crate::error::{Result, VariantError};
use crate::typed_table::TypedTable;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::UnnestOptions;
use datafusion::functions::expr_fn::{nullif, split_part};
use datafusion::logical_expr::Expr;
use datafusion::prelude::{ident, lit};
use log::debug;

/// Separator between sub-fields of one annotation element.
pub const ANNOTATION_DELIMITER: &str = "|";

/// Ordered sub-field names of an annotation format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLayout {
    names: Vec<String>,
}

impl AnnotationLayout {
    /// Layout from explicit sub-field names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The snpEff `ANN` layout.
    pub fn snpeff() -> Self {
        Self::new([
            "allele",
            "effect",
            "impact",
            "gene_name",
            "gene_id",
            "feature_type",
            "feature_id",
            "transcript_biotype",
            "rank",
            "hgvs_c",
            "hgvs_p",
            "cdna_pos",
            "cds_pos",
            "aa_pos",
            "distance",
            "errors",
        ])
    }

    /// The default VEP `CSQ` layout, with `Consequence` exposed as `effect` and `IMPACT`
    /// as `impact` so both annotators share their most used column names.
    pub fn vep() -> Self {
        Self::new([
            "allele",
            "effect",
            "impact",
            "symbol",
            "gene",
            "feature_type",
            "feature",
            "biotype",
            "exon",
            "intron",
            "hgvsc",
            "hgvsp",
            "cdna_position",
            "cds_position",
            "protein_position",
            "amino_acids",
            "codons",
            "existing_variation",
            "distance",
            "strand",
            "flags",
        ])
    }

    /// Sub-field names in element order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Explode `column` and split each element into `<prefix>_<sub-field>` columns.
///
/// Rows whose list is null or empty produce no output rows. The nested column is removed;
/// all other columns are repeated on each exploded row. Empty or missing sub-fields are
/// null.
///
/// # Errors
///
/// [`VariantError::MissingColumn`] if `column` does not exist and
/// [`VariantError::InvalidAnnotationColumn`] if it is not a list of strings.
pub fn expand_annotations(
    table: TypedTable,
    column: &str,
    prefix: &str,
    layout: &AnnotationLayout,
) -> Result<TypedTable> {
    let schema = table.schema();
    let field = schema
        .field_with_name(column)
        .map_err(|_| VariantError::MissingColumn(column.to_string()))?;
    match field.data_type() {
        DataType::List(inner) if inner.data_type() == &DataType::Utf8 => {}
        other => {
            return Err(VariantError::InvalidAnnotationColumn {
                column: column.to_string(),
                found: other.clone(),
            });
        }
    }

    // Quoted so the mixed-case INFO name is not normalised to lower case
    let quoted = format!("\"{column}\"");
    let exploded = table.into_frame().unnest_columns_with_options(
        &[quoted.as_str()],
        UnnestOptions::new().with_preserve_nulls(false),
    )?;

    let mut projection: Vec<Expr> = schema
        .fields()
        .iter()
        .filter(|f| f.name() != column)
        .map(|f| ident(f.name()))
        .collect();
    projection.extend(layout.names().iter().enumerate().map(|(i, name)| {
        nullif(
            split_part(ident(column), lit(ANNOTATION_DELIMITER), lit(i as i64 + 1)),
            lit(""),
        )
        .alias(format!("{prefix}_{name}"))
    }));

    debug!(
        "Expanding {} into {} {}_* columns",
        column,
        layout.names().len(),
        prefix
    );
    TypedTable::new(exploded.select(projection)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layouts() {
        let snpeff = AnnotationLayout::snpeff();
        assert_eq!(snpeff.names().len(), 16);
        assert_eq!(snpeff.names()[1], "effect");
        assert_eq!(snpeff.names()[2], "impact");

        let vep = AnnotationLayout::vep();
        assert_eq!(vep.names()[1], "effect");
        assert_eq!(vep.names()[2], "impact");
    }

    #[test]
    fn test_custom_layout() {
        let layout = AnnotationLayout::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(layout.names(), ["a", "b"]);
    }
}
