use datafusion::arrow::array::{Array, ListArray, StringArray};
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::DataType;
use datafusion::assert_batches_sorted_eq;
use datafusion::prelude::*;
use datafusion_bio_format_core::test_utils::{column_as, total_rows};
use datafusion_bio_format_vkd::error::VariantError;
use datafusion_bio_format_vkd::merge::{
    DATASET_COLUMN, EnrichOptions, MatchPolicy, enrich, merge_datasets,
};
use datafusion_bio_format_vkd::storage::VariantReadOptions;
use datafusion_bio_format_vkd::{TypedTable, read_variants};
use std::io::Write;
use tempfile::NamedTempFile;

const DATASET_A: &str = "##INFO=<ID=DP,Number=1,Type=Integer>
##FORMAT=<ID=GT,Number=1,Type=String>
##FORMAT=<ID=DP,Number=1,Type=Integer>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t50\tPASS\tDP=10\tGT:DP\t0/1:10
chr1\t200\t.\tC\tG\t50\tPASS\tDP=20\tGT:DP\t1/1:20
";

const DATASET_B: &str = "##INFO=<ID=DP,Number=1,Type=String>
##INFO=<ID=AF,Number=A,Type=Float>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr1\t100\t.\tA\tT\t50\tPASS\tDP=high;AF=0.5
";

const LABELS: &str = "##FORMAT=<ID=GT,Number=1,Type=String>
##FORMAT=<ID=BD,Number=1,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t50\tPASS\t.\tGT:BD\t0/1:TP
chr1\t100\t.\tA\tT\t50\tPASS\t.\tGT:BD\t0/1:TP
chr1\t300\t.\tG\tA\t50\tPASS\t.\tGT:BD\t0/1:FP
";

const CLINVAR: &str = "##INFO=<ID=CLNSIG,Number=.,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t12345\tA\tT\t.\t.\tCLNSIG=Pathogenic
1\t200\t12346\tC\tA\t.\t.\tCLNSIG=Benign
";

fn write_vcf(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".vcf").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn ingest(ctx: &SessionContext, content: &str, options: VariantReadOptions) -> TypedTable {
    let file = write_vcf(content);
    // The table keeps the parsed records, so the file may go away once read
    let (table, _) = read_variants(ctx, file.path().to_str().unwrap(), options).unwrap();
    table
}

#[tokio::test]
async fn test_conflicting_column_dropped_from_merge() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    let a = ingest(&ctx, DATASET_A, VariantReadOptions::default());
    let b = ingest(&ctx, DATASET_B, VariantReadOptions::sites_only());

    let (merged, report) = merge_datasets(vec![("a".to_string(), a), ("b".to_string(), b)])?;

    assert_eq!(report.dropped_columns(), vec!["info_DP".to_string()]);
    assert_eq!(report.conflicts[0].expected, DataType::Int64);
    assert_eq!(report.conflicts[0].found, DataType::Utf8);
    assert_eq!(report.conflicts[0].dataset, "b");

    let names = merged.column_names();
    assert!(!names.iter().any(|n| n.eq_ignore_ascii_case("info_dp")));
    assert_eq!(
        names,
        vec![
            "chr",
            "position",
            "ref",
            "alt",
            "qual",
            "filter",
            "format_gt",
            "format_dp",
            DATASET_COLUMN,
            "info_AF"
        ]
    );

    let results = merged
        .into_frame()
        .select_columns(&["dataset", "position", "format_dp"])?
        .collect()
        .await?;
    assert_batches_sorted_eq!(
        [
            "+---------+----------+-----------+",
            "| dataset | position | format_dp |",
            "+---------+----------+-----------+",
            "| a       | 100      | 10        |",
            "| a       | 200      | 20        |",
            "| b       | 100      |           |",
            "+---------+----------+-----------+",
        ],
        &results
    );
    Ok(())
}

#[tokio::test]
async fn test_merge_is_concatenation_not_distinct() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    let first = ingest(&ctx, DATASET_A, VariantReadOptions::default());
    let second = ingest(&ctx, DATASET_A, VariantReadOptions::default());

    let (merged, report) =
        merge_datasets(vec![("x".to_string(), first), ("x".to_string(), second)])?;
    assert!(report.conflicts.is_empty());
    assert_eq!(merged.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn test_enrich_first_preserves_left_rows() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    let left = ingest(&ctx, DATASET_A, VariantReadOptions::default());
    let labels = ingest(&ctx, LABELS, VariantReadOptions::default());

    let options = EnrichOptions {
        columns: Some(vec!["format_bd".to_string()]),
        ..EnrichOptions::default()
    };
    let enriched = enrich(left, labels, &options)?;
    let results = enriched
        .into_frame()
        .select_columns(&["position", "format_dp", "format_bd"])?
        .collect()
        .await?;
    assert_batches_sorted_eq!(
        [
            "+----------+-----------+-----------+",
            "| position | format_dp | format_bd |",
            "+----------+-----------+-----------+",
            "| 100      | 10        | TP        |",
            "| 200      | 20        |           |",
            "+----------+-----------+-----------+",
        ],
        &results
    );
    Ok(())
}

#[tokio::test]
async fn test_enrich_all_keeps_every_match() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    let left = ingest(&ctx, DATASET_A, VariantReadOptions::default());
    let labels = ingest(&ctx, LABELS, VariantReadOptions::default());

    let options = EnrichOptions {
        columns: Some(vec!["format_bd".to_string()]),
        match_policy: MatchPolicy::All,
        ..EnrichOptions::default()
    };
    let results = enrich(left, labels, &options)?.collect().await?;
    assert_eq!(total_rows(&results), 3);
    Ok(())
}

#[tokio::test]
async fn test_enrich_column_collisions() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();

    let skipped = enrich(
        ingest(&ctx, DATASET_A, VariantReadOptions::default()),
        ingest(&ctx, LABELS, VariantReadOptions::default()),
        &EnrichOptions::default(),
    )?;
    let names = skipped.column_names();
    assert_eq!(names.iter().filter(|n| *n == "format_gt").count(), 1);
    assert_eq!(names.last().map(|s| s.as_str()), Some("format_bd"));

    let suffixed = enrich(
        ingest(&ctx, DATASET_A, VariantReadOptions::default()),
        ingest(&ctx, LABELS, VariantReadOptions::default()),
        &EnrichOptions {
            collision_suffix: Some("_label".to_string()),
            ..EnrichOptions::default()
        },
    )?;
    let names = suffixed.column_names();
    assert!(names.contains(&"format_gt_label".to_string()));
    assert!(names.contains(&"qual_label".to_string()));
    assert_eq!(suffixed.count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_enrich_with_chr_prefix() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SessionContext::new();
    let left = ingest(&ctx, DATASET_A, VariantReadOptions::default());
    let clinvar = ingest(&ctx, CLINVAR, VariantReadOptions::sites_only());

    let options = EnrichOptions {
        columns: Some(vec!["info_CLNSIG".to_string()]),
        chr_prefix: Some("chr".to_string()),
        ..EnrichOptions::default()
    };
    let results = enrich(left, clinvar, &options)?
        .into_frame()
        .sort(vec![col("position").sort(true, true)])?
        .collect()
        .await?;
    let batch = concat_batches(&results[0].schema(), &results)?;
    let clnsig = column_as::<ListArray>(&batch, "info_CLNSIG");

    let first = clnsig.value(0);
    let first = first.as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(first.value(0), "Pathogenic");
    // 200 C>G does not match the ClinVar C>A allele
    assert!(clnsig.is_null(1));
    Ok(())
}

#[tokio::test]
async fn test_enrich_unknown_column() {
    let ctx = SessionContext::new();
    let options = EnrichOptions {
        columns: Some(vec!["format_xx".to_string()]),
        ..EnrichOptions::default()
    };
    let err = enrich(
        ingest(&ctx, DATASET_A, VariantReadOptions::default()),
        ingest(&ctx, LABELS, VariantReadOptions::default()),
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, VariantError::MissingColumn(c) if c == "format_xx"));
}
