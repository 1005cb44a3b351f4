use datafusion::assert_batches_sorted_eq;
use datafusion::prelude::*;
use datafusion_bio_format_vkd::pipeline::{AnnotatorInput, DatasetInputs, MergePlan, run_merge};
use std::io::Write;
use tempfile::NamedTempFile;

const QUERY_A: &str = "##INFO=<ID=DP,Number=1,Type=Integer>
##FORMAT=<ID=GT,Number=1,Type=String>
##FORMAT=<ID=DP,Number=1,Type=Integer>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t50\tPASS\tDP=10\tGT:DP\t0/1:10
chr1\t200\t.\tC\tG\t50\tPASS\tDP=20\tGT:DP\t1/1:20
";

const LABELED_A: &str = "##FORMAT=<ID=GT,Number=1,Type=String>
##FORMAT=<ID=BD,Number=1,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t50\tPASS\t.\tGT:BD\t0/1:TP
chr1\t200\t.\tC\tG\t50\tPASS\t.\tGT:BD\t1/1:FP
";

const SNPEFF_A: &str = "##INFO=<ID=DP,Number=1,Type=Integer>
##INFO=<ID=ANN,Number=.,Type=String>
##FORMAT=<ID=GT,Number=1,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t50\tPASS\tDP=10;ANN=T|missense_variant|MODERATE|GENE1,T|intron_variant|MODIFIER|GENE2\tGT\t0/1
chr1\t200\t.\tC\tG\t50\tPASS\tDP=20;ANN=G|synonymous_variant|LOW|GENE3\tGT\t1/1
";

const QUERY_B: &str = "##INFO=<ID=DP,Number=1,Type=String>
##FORMAT=<ID=GT,Number=1,Type=String>
##FORMAT=<ID=DP,Number=1,Type=Integer>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t40\tPASS\tDP=high\tGT:DP\t0/1:7
";

const LABELED_B: &str = "##FORMAT=<ID=BD,Number=1,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample
chr1\t100\t.\tA\tT\t40\tPASS\t.\tBD\tFN
";

const CLINVAR: &str = "##INFO=<ID=CLNSIG,Number=.,Type=String>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t12345\tA\tT\t.\t.\tCLNSIG=Pathogenic
";

fn write_vcf(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".vcf").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn path_of(file: &NamedTempFile) -> String {
    file.path().to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_run_merge() -> Result<(), Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();

    let query_a = write_vcf(QUERY_A);
    let labeled_a = write_vcf(LABELED_A);
    let snpeff_a = write_vcf(SNPEFF_A);
    let query_b = write_vcf(QUERY_B);
    let labeled_b = write_vcf(LABELED_B);
    let clinvar = write_vcf(CLINVAR);

    let mut dataset_a = DatasetInputs::new("a", path_of(&query_a));
    dataset_a.labeled = Some(path_of(&labeled_a));
    dataset_a.annotators.push(AnnotatorInput::snpeff(path_of(&snpeff_a)));

    let mut dataset_b = DatasetInputs::new("b", path_of(&query_b));
    dataset_b.labeled = Some(path_of(&labeled_b));

    let plan = MergePlan {
        datasets: vec![dataset_a, dataset_b],
        clinvar: Some(path_of(&clinvar)),
        ..MergePlan::default()
    };

    let ctx = SessionContext::new();
    let outcome = run_merge(&ctx, &plan)?;

    assert_eq!(outcome.report.dropped_columns(), vec!["info_DP".to_string()]);
    assert_eq!(outcome.ingest.len(), 6);
    assert!(outcome.ingest.iter().all(|(_, r)| r.layout_mismatches == 0));

    let names = outcome.table.column_names();
    for expected in [
        "format_bd",
        "snpeff_effect",
        "snpeff_impact",
        "dataset",
        "info_CLNSIG",
        "qual_clinvar",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {expected}");
    }
    assert!(!names.contains(&"info_DP".to_string()));

    let results = outcome
        .table
        .into_frame()
        .select(vec![
            col("dataset"),
            col("position"),
            col("format_bd"),
            col("snpeff_effect"),
            ident("info_CLNSIG").is_not_null().alias("in_clinvar"),
        ])?
        .collect()
        .await?;
    assert_batches_sorted_eq!(
        [
            "+---------+----------+-----------+--------------------+------------+",
            "| dataset | position | format_bd | snpeff_effect      | in_clinvar |",
            "+---------+----------+-----------+--------------------+------------+",
            "| a       | 100      | TP        | intron_variant     | true       |",
            "| a       | 100      | TP        | missense_variant   | true       |",
            "| a       | 200      | FP        | synonymous_variant | false      |",
            "| b       | 100      | FN        |                    | true       |",
            "+---------+----------+-----------+--------------------+------------+",
        ],
        &results
    );
    Ok(())
}

#[tokio::test]
async fn test_run_merge_query_only() -> Result<(), Box<dyn std::error::Error>> {
    let query = write_vcf(QUERY_A);
    let plan = MergePlan {
        datasets: vec![DatasetInputs::new("only", path_of(&query))],
        ..MergePlan::default()
    };
    let ctx = SessionContext::new();
    let outcome = run_merge(&ctx, &plan)?;
    assert!(outcome.report.conflicts.is_empty());
    assert_eq!(outcome.table.count().await?, 2);
    Ok(())
}
