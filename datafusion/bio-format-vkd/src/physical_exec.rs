use crate::layout::SAMPLE_DELIMITER;
use crate::rules::{ExtractionRule, RuleSet, fixed_fields};
use crate::storage::RawRecords;
use datafusion::arrow::array::{
    Array, Float64Array, RecordBatch, StringArray, UInt32Array, new_null_array,
};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::error::ArrowError;
use datafusion::common::DataFusionError;
use datafusion::execution::{SendableRecordBatchStream, TaskContext};
use datafusion::physical_expr::{EquivalenceProperties, Partitioning};
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchStreamAdapter;
use datafusion::physical_plan::{DisplayAs, DisplayFormatType, ExecutionPlan, PlanProperties};
use datafusion_bio_format_core::table_utils::{OptionalField, builders_to_arrays};
use log::{debug, info, warn};
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Rows of a source that share one compiled layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPartition {
    /// Index of the layout in the rule set; `None` when no per-sample rules apply
    pub layout: Option<usize>,
    /// Record indices belonging to this partition, in source order
    pub rows: Vec<usize>,
}

/// Groups records by layout string, looking each up in the compiled rule set.
///
/// Returns the non-empty partitions and the number of records whose layout was never
/// compiled; those records are excluded. At least one partition is always returned so
/// that the plan has something to execute.
pub fn partition_records(records: &RawRecords, rules: &RuleSet) -> (Vec<LayoutPartition>, usize) {
    if records.layout_of.is_empty() {
        return (
            vec![LayoutPartition {
                layout: None,
                rows: (0..records.len()).collect(),
            }],
            0,
        );
    }

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); rules.num_layouts()];
    let mut mismatches = 0;
    for row in 0..records.len() {
        match records.layout_key(row).and_then(|key| rules.layout_index(key)) {
            Some(i) => buckets[i].push(row),
            None => mismatches += 1,
        }
    }
    if mismatches > 0 {
        warn!("Dropped {mismatches} records whose layout was not registered");
    }

    let mut partitions: Vec<LayoutPartition> = buckets
        .into_iter()
        .enumerate()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(i, rows)| LayoutPartition {
            layout: Some(i),
            rows,
        })
        .collect();
    if partitions.is_empty() {
        partitions.push(LayoutPartition {
            layout: None,
            rows: Vec::new(),
        });
    }
    debug!(
        "Partitioned {} records into {} layout partitions",
        records.len(),
        partitions.len()
    );
    (partitions, mismatches)
}

/// Builds the full-schema batch for a set of rows sharing one layout.
///
/// Only columns flagged in `wanted` (and the non-nullable `chr`) are materialised; the
/// others are all-null placeholders that the caller projects away.
pub fn build_partition_batch(
    schema: SchemaRef,
    rules: &RuleSet,
    records: &RawRecords,
    layout: Option<usize>,
    rows: &[usize],
    wanted: &[bool],
) -> Result<RecordBatch, ArrowError> {
    let n = rows.len();
    let fixed_count = fixed_fields().len();
    let info_count = rules.info_rules().len();
    let mut arrays: Vec<Arc<dyn Array>> = Vec::with_capacity(schema.fields().len());

    for (i, field) in schema.fields().iter().take(fixed_count).enumerate() {
        if !wanted[i] && field.is_nullable() {
            arrays.push(new_null_array(field.data_type(), n));
            continue;
        }
        let array: Arc<dyn Array> = match i {
            0 => Arc::new(StringArray::from_iter_values(
                rows.iter().map(|&r| records.chroms[r].as_str()),
            )),
            1 => Arc::new(UInt32Array::from_iter(rows.iter().map(|&r| records.positions[r]))),
            2 => Arc::new(StringArray::from_iter(rows.iter().map(|&r| records.refs[r].as_deref()))),
            3 => Arc::new(StringArray::from_iter(rows.iter().map(|&r| records.alts[r].as_deref()))),
            4 => Arc::new(Float64Array::from_iter(rows.iter().map(|&r| records.quals[r]))),
            _ => Arc::new(StringArray::from_iter(
                rows.iter().map(|&r| records.filters[r].as_deref()),
            )),
        };
        arrays.push(array);
    }

    let info_wanted = &wanted[fixed_count..fixed_count + info_count];
    if info_wanted.iter().any(|w| *w) {
        let mut builders = rules
            .info_rules()
            .iter()
            .map(|rule| OptionalField::new(&rule.data_type(), n))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tokens = Vec::with_capacity(info_count);
        for &row in rows {
            rules.info_tokens(records.infos[row].as_deref(), &mut tokens);
            for ((rule, builder), token) in
                rules.info_rules().iter().zip(builders.iter_mut()).zip(&tokens)
            {
                rule.append(builder, *token)?;
            }
        }
        for (array, wanted) in builders_to_arrays(&mut builders).into_iter().zip(info_wanted) {
            arrays.push(if *wanted { array } else { new_null_array(array.data_type(), n) });
        }
    } else {
        for rule in rules.info_rules() {
            arrays.push(new_null_array(&rule.data_type(), n));
        }
    }

    let format_start = fixed_count + info_count;
    let format_wanted = &wanted[format_start..];
    let format_rules: Option<&[ExtractionRule]> = layout.and_then(|i| rules.layout_rules(i));
    match format_rules {
        Some(format_rules) if format_wanted.iter().any(|w| *w) => {
            let mut builders = format_rules
                .iter()
                .map(|rule| OptionalField::new(&rule.data_type(), n))
                .collect::<Result<Vec<_>, _>>()?;
            let mut payload: Vec<&str> = Vec::new();
            for &row in rows {
                payload.clear();
                if let Some(text) = records.payloads[row].as_deref() {
                    payload.extend(text.split(SAMPLE_DELIMITER));
                }
                for (rule, builder) in format_rules.iter().zip(builders.iter_mut()) {
                    rule.append(builder, rule.sample_token(&payload))?;
                }
            }
            arrays.extend(builders_to_arrays(&mut builders));
        }
        _ => {
            for field in schema.fields().iter().skip(format_start) {
                arrays.push(new_null_array(field.data_type(), n));
            }
        }
    }

    RecordBatch::try_new(schema, arrays)
}

/// Scans one source, emitting one execution partition per layout partition.
pub struct VariantExec {
    pub(crate) schema: SchemaRef,
    pub(crate) full_schema: SchemaRef,
    pub(crate) projection: Option<Vec<usize>>,
    pub(crate) records: Arc<RawRecords>,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) partitions: Arc<Vec<LayoutPartition>>,
    pub(crate) batch_size: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) cache: PlanProperties,
}

impl VariantExec {
    /// Creates the plan node; `schema` is the projected schema.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema: SchemaRef,
        full_schema: SchemaRef,
        projection: Option<Vec<usize>>,
        records: Arc<RawRecords>,
        rules: Arc<RuleSet>,
        partitions: Arc<Vec<LayoutPartition>>,
        batch_size: Option<usize>,
        limit: Option<usize>,
    ) -> Self {
        let cache = PlanProperties::new(
            EquivalenceProperties::new(schema.clone()),
            Partitioning::UnknownPartitioning(partitions.len().max(1)),
            EmissionType::Final,
            Boundedness::Bounded,
        );
        Self {
            schema,
            full_schema,
            projection,
            records,
            rules,
            partitions,
            batch_size,
            limit,
            cache,
        }
    }

    fn projection_label(&self) -> String {
        match &self.projection {
            Some(_) => self
                .schema
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>()
                .join(", "),
            None => "*".to_string(),
        }
    }
}

impl Debug for VariantExec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantExec")
            .field("projection", &self.projection)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl DisplayAs for VariantExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "VariantExec: partitions={}, projection=[{}]",
            self.partitions.len(),
            self.projection_label()
        )
    }
}

impl ExecutionPlan for VariantExec {
    fn name(&self) -> &str {
        "VariantExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.cache
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        _children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> datafusion::common::Result<Arc<dyn ExecutionPlan>> {
        Ok(self)
    }

    fn execute(
        &self,
        partition: usize,
        context: Arc<TaskContext>,
    ) -> datafusion::common::Result<SendableRecordBatchStream> {
        info!(
            "{}: executing partition={} with projection=[{}]",
            self.name(),
            partition,
            self.projection_label()
        );
        let batch_size = self
            .batch_size
            .unwrap_or_else(|| context.session_config().batch_size())
            .max(1);
        let rows: &[usize] = match self.partitions.get(partition) {
            Some(p) => &p.rows,
            None => &[],
        };
        let rows = match self.limit {
            Some(limit) => &rows[..rows.len().min(limit)],
            None => rows,
        };
        let layout = self.partitions.get(partition).and_then(|p| p.layout);

        let mut wanted = vec![self.projection.is_none(); self.full_schema.fields().len()];
        if let Some(projection) = &self.projection {
            for &i in projection {
                wanted[i] = true;
            }
        }

        let chunks: Vec<Vec<usize>> = rows.chunks(batch_size).map(|c| c.to_vec()).collect();
        let full_schema = self.full_schema.clone();
        let projection = self.projection.clone();
        let records = self.records.clone();
        let rules = self.rules.clone();
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let batch = build_partition_batch(
                full_schema.clone(),
                &rules,
                &records,
                layout,
                &chunk,
                &wanted,
            )?;
            let batch = match &projection {
                Some(indices) => batch.project(indices)?,
                None => batch,
            };
            Ok::<_, DataFusionError>(batch)
        }));
        Ok(Box::pin(RecordBatchStreamAdapter::new(
            self.schema.clone(),
            stream,
        )))
    }
}
