//! Shared test utilities for execution plan analysis and result inspection

use datafusion::arrow::array::{Array, RecordBatch};
use datafusion::physical_plan::ExecutionPlan;
use std::sync::Arc;

/// Find the leaf exec node (custom format exec) by walking first children
pub fn find_leaf_exec(plan: &Arc<dyn ExecutionPlan>) -> Arc<dyn ExecutionPlan> {
    match plan.children().first() {
        Some(child) => find_leaf_exec(child),
        None => Arc::clone(plan),
    }
}

/// Assert the plan's leaf node has the expected name and projected columns
pub fn assert_plan_projection(
    plan: &Arc<dyn ExecutionPlan>,
    expected_exec_name: &str,
    expected_columns: &[&str],
) {
    let leaf = find_leaf_exec(plan);
    assert_eq!(leaf.name(), expected_exec_name);
    let schema = leaf.schema();
    let col_names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        col_names, expected_columns,
        "projection was not pushed into {expected_exec_name}"
    );
}

/// Total number of rows across batches
pub fn total_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

/// Downcast a named column of a batch to a concrete array type
///
/// # Panics
///
/// Panics if the column is absent or has a different array type
pub fn column_as<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> &'a T {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("column {name} not found"))
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("column {name} has unexpected type"))
}
