//! Typed extraction rules compiled from header declarations and discovered layouts.
//!
//! Rules are built once per source before any record is converted. Info rules apply to
//! every record; per-sample rules are resolved separately for each layout so that a field
//! is always read from the position its own layout assigns to it.
//!
//! Every coercion is lenient: the missing marker, malformed numbers and positions past
//! the end of a payload all become nulls.

use crate::header::{Cardinality, FieldDeclaration, PrimitiveType, VariantHeader};
use crate::layout::LayoutMap;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::error::ArrowError;
use datafusion_bio_format_core::table_utils::{OptionalField, list_of};
use log::debug;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// The literal token for a missing value.
pub const MISSING_VALUE: &str = ".";
/// Separator between elements of a list-valued token.
pub const LIST_DELIMITER: char = ',';
/// Separator between `KEY=value` entries of the INFO column.
pub const INFO_DELIMITER: char = ';';
/// Output column prefix for info fields.
pub const INFO_PREFIX: &str = "info_";
/// Output column prefix for per-sample fields.
pub const FORMAT_PREFIX: &str = "format_";

/// Output columns taken directly from the fixed record columns, in output order.
pub fn fixed_fields() -> Vec<Field> {
    vec![
        Field::new("chr", DataType::Utf8, false),
        Field::new("position", DataType::UInt32, true),
        Field::new("ref", DataType::Utf8, true),
        Field::new("alt", DataType::Utf8, true),
        Field::new("qual", DataType::Float64, true),
        Field::new("filter", DataType::Utf8, true),
    ]
}

/// Arrow value type a rule coerces each token (or list element) into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Signed integers of info fields
    Int64,
    /// Unsigned integers of per-sample fields
    UInt32,
    /// Floats of info fields
    Float64,
    /// Floats of per-sample fields
    Float32,
    /// Strings and characters, passed through
    Utf8,
}

impl ValueKind {
    /// Value kind for an info declaration.
    pub fn for_info(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Integer => ValueKind::Int64,
            PrimitiveType::Float => ValueKind::Float64,
            PrimitiveType::String | PrimitiveType::Character => ValueKind::Utf8,
        }
    }

    /// Value kind for a per-sample declaration.
    pub fn for_sample(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Integer => ValueKind::UInt32,
            PrimitiveType::Float => ValueKind::Float32,
            PrimitiveType::String | PrimitiveType::Character => ValueKind::Utf8,
        }
    }

    /// Scalar Arrow type.
    pub fn data_type(&self) -> DataType {
        match self {
            ValueKind::Int64 => DataType::Int64,
            ValueKind::UInt32 => DataType::UInt32,
            ValueKind::Float64 => DataType::Float64,
            ValueKind::Float32 => DataType::Float32,
            ValueKind::Utf8 => DataType::Utf8,
        }
    }
}

/// Where a rule finds its raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// The value of `key` inside the INFO column
    Info {
        /// Info field id, matched exactly
        key: String,
    },
    /// A position inside the colon-separated sample payload
    Sample {
        /// Zero-based position in the layout
        position: usize,
    },
    /// The field is declared but the layout does not carry it
    Absent,
}

/// How one output column is produced from raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Output column name
    pub column: String,
    /// Where the raw token comes from
    pub source: RuleSource,
    /// Scalar or list
    pub cardinality: Cardinality,
    /// Target value type
    pub kind: ValueKind,
}

impl ExtractionRule {
    fn info(declaration: &FieldDeclaration) -> Self {
        ExtractionRule {
            column: format!("{INFO_PREFIX}{}", declaration.id),
            source: RuleSource::Info {
                key: declaration.id.clone(),
            },
            cardinality: declaration.cardinality,
            kind: ValueKind::for_info(declaration.primitive),
        }
    }

    fn sample(declaration: &FieldDeclaration, position: Option<usize>) -> Self {
        ExtractionRule {
            column: format!("{FORMAT_PREFIX}{}", declaration.id.to_lowercase()),
            source: match position {
                Some(position) => RuleSource::Sample { position },
                None => RuleSource::Absent,
            },
            cardinality: declaration.cardinality,
            kind: ValueKind::for_sample(declaration.primitive),
        }
    }

    /// Arrow type of the output column.
    pub fn data_type(&self) -> DataType {
        if self.cardinality.is_list() {
            list_of(self.kind.data_type())
        } else {
            self.kind.data_type()
        }
    }

    /// Nullable output field.
    pub fn field(&self) -> Field {
        Field::new(&self.column, self.data_type(), true)
    }

    /// Picks this rule's token out of a split sample payload.
    pub fn sample_token<'a>(&self, payload: &[&'a str]) -> Option<&'a str> {
        match self.source {
            RuleSource::Sample { position } => payload.get(position).copied(),
            RuleSource::Info { .. } | RuleSource::Absent => None,
        }
    }

    /// Coerces a raw token and appends it to `builder`.
    ///
    /// `None`, the empty string and the missing marker append a null cell. List tokens are
    /// split on commas and coerced element by element.
    pub fn append(&self, builder: &mut OptionalField, token: Option<&str>) -> Result<(), ArrowError> {
        let Some(token) = present(token) else {
            return builder.append_null();
        };

        if self.cardinality.is_list() {
            let elements = token.split(LIST_DELIMITER).map(|e| present(Some(e)));
            return match self.kind {
                ValueKind::Int64 => builder
                    .append_array_int64(elements.map(|e| e.and_then(parse_integer)).collect()),
                ValueKind::UInt32 => builder
                    .append_array_uint32(elements.map(|e| e.and_then(parse_integer)).collect()),
                ValueKind::Float64 => builder
                    .append_array_float64(elements.map(|e| e.and_then(parse_float)).collect()),
                ValueKind::Float32 => builder.append_array_float32(
                    elements
                        .map(|e| e.and_then(parse_float).map(|v| v as f32))
                        .collect(),
                ),
                ValueKind::Utf8 => builder.append_array_string(elements.collect()),
            };
        }

        match self.kind {
            ValueKind::Int64 => builder.append_int64(parse_integer(token)),
            ValueKind::UInt32 => builder.append_uint32(parse_integer(token)),
            ValueKind::Float64 => builder.append_float64(parse_float(token)),
            ValueKind::Float32 => builder.append_float32(parse_float(token).map(|v| v as f32)),
            ValueKind::Utf8 => builder.append_string(Some(token)),
        }
    }
}

fn present(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.is_empty() && *t != MISSING_VALUE)
}

/// Base-10 integer parse; malformed or out-of-range text yields `None`.
pub fn parse_integer<T: FromStr>(token: &str) -> Option<T> {
    token.parse::<T>().ok()
}

/// Decimal parse at double precision; callers narrow per-sample values to `f32`.
pub fn parse_float(token: &str) -> Option<f64> {
    token.parse::<f64>().ok()
}

/// Compiled rules for one source: info rules plus one per-sample rule vector per layout.
#[derive(Debug, Clone)]
pub struct RuleSet {
    info_rules: Vec<ExtractionRule>,
    info_index: HashMap<String, usize>,
    layout_rules: Vec<Vec<ExtractionRule>>,
    layout_index: HashMap<String, usize>,
    schema: SchemaRef,
}

/// Compile extraction rules for a parsed header and the layouts seen in its records.
///
/// Per-sample columns are only produced when at least one layout was discovered; a
/// sites-only source yields the fixed and info columns alone.
pub fn compile_rules(header: &VariantHeader, layouts: &LayoutMap) -> RuleSet {
    let info_rules: Vec<ExtractionRule> = header.infos.iter().map(ExtractionRule::info).collect();
    let info_index = header
        .infos
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.clone(), i))
        .collect();

    let mut layout_rules = Vec::with_capacity(layouts.len());
    let mut layout_index = HashMap::with_capacity(layouts.len());
    for (i, layout) in layouts.layouts().iter().enumerate() {
        let rules: Vec<ExtractionRule> = header
            .formats
            .iter()
            .map(|d| ExtractionRule::sample(d, layout.position(&d.id)))
            .collect();
        debug!(
            "Layout {:?}: {} of {} per-sample fields present",
            layout.key(),
            rules.iter().filter(|r| r.source != RuleSource::Absent).count(),
            rules.len()
        );
        layout_rules.push(rules);
        layout_index.insert(layout.key().to_string(), i);
    }

    let mut fields = fixed_fields();
    fields.extend(info_rules.iter().map(|r| r.field()));
    if !layouts.is_empty() {
        fields.extend(
            header
                .formats
                .iter()
                .map(|d| ExtractionRule::sample(d, None).field()),
        );
    }

    RuleSet {
        info_rules,
        info_index,
        layout_rules,
        layout_index,
        schema: Arc::new(Schema::new(fields)),
    }
}

impl RuleSet {
    /// Full output schema: fixed columns, then info columns, then per-sample columns.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Info rules in declaration order.
    pub fn info_rules(&self) -> &[ExtractionRule] {
        &self.info_rules
    }

    /// Per-sample rules of one layout, in declaration order.
    pub fn layout_rules(&self, layout: usize) -> Option<&[ExtractionRule]> {
        self.layout_rules.get(layout).map(|r| r.as_slice())
    }

    /// Layout index for a layout string, if that layout was compiled.
    pub fn layout_index(&self, key: &str) -> Option<usize> {
        self.layout_index.get(key).copied()
    }

    /// Number of compiled layouts.
    pub fn num_layouts(&self) -> usize {
        self.layout_rules.len()
    }

    /// Number of per-sample columns in the output schema.
    pub fn num_format_columns(&self) -> usize {
        self.schema.fields().len() - fixed_fields().len() - self.info_rules.len()
    }

    /// Splits an INFO column in one pass, returning one token slot per info rule.
    ///
    /// Keys match exactly; the first occurrence of a key wins; bare flags carry no value.
    pub fn info_tokens<'a>(&self, info: Option<&'a str>, tokens: &mut Vec<Option<&'a str>>) {
        tokens.clear();
        tokens.resize(self.info_rules.len(), None);
        let Some(info) = info.filter(|i| *i != MISSING_VALUE) else {
            return;
        };
        for entry in info.split(INFO_DELIMITER) {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            if let Some(&i) = self.info_index.get(key) {
                if tokens[i].is_none() {
                    tokens[i] = Some(value);
                }
            }
        }
    }
}
