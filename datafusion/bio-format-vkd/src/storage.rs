//! Reading variant sources into a header plus raw, still untyped, record columns.
//!
//! A source is read in one pass: the header is parsed up to the `#CHROM` line and every
//! body line is tab-split into the fixed columns, the raw INFO text, the layout string and
//! the selected sample payload. Typing happens later, once all layouts are known.

use crate::error::{Result, VariantError};
use crate::header::{LAYOUT_COLUMN_INDEX, VariantHeader, parse_header};
use crate::rules::{MISSING_VALUE, parse_float, parse_integer};
use datafusion_bio_format_core::object_storage::{
    CompressionType, StorageType, get_storage_type, open_local_text_reader,
};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::BufRead;

/// Number of fixed columns every record must carry (CHROM through INFO).
pub const FIXED_COLUMN_COUNT: usize = 8;

const INFO_COLUMN_INDEX: usize = 7;

/// Options controlling how a variant source is read.
#[derive(Debug, Clone)]
pub struct VariantReadOptions {
    /// Read the layout and sample payload columns. Disable for sites-only sources; a source
    /// without sample columns is read sites-only unless a sample is named.
    pub with_genotype: bool,
    /// Sample whose payload column is read. Defaults to the first sample.
    pub sample: Option<String>,
    /// Compression of the source. `None` detects it from the leading bytes.
    pub compression_type: Option<CompressionType>,
    /// Rows per emitted batch. `None` uses the session batch size.
    pub batch_size: Option<usize>,
}

impl Default for VariantReadOptions {
    fn default() -> Self {
        Self {
            with_genotype: true,
            sample: None,
            compression_type: None,
            batch_size: None,
        }
    }
}

impl VariantReadOptions {
    /// Options for a source without sample columns.
    pub fn sites_only() -> Self {
        Self {
            with_genotype: false,
            ..Self::default()
        }
    }
}

/// Raw record columns, one entry per accepted record.
#[derive(Debug, Clone, Default)]
pub struct RawRecords {
    /// CHROM
    pub chroms: Vec<String>,
    /// POS, `None` when not a valid unsigned integer
    pub positions: Vec<Option<u32>>,
    /// REF, `None` for the missing marker
    pub refs: Vec<Option<String>>,
    /// ALT, `None` for the missing marker
    pub alts: Vec<Option<String>>,
    /// QUAL
    pub quals: Vec<Option<f64>>,
    /// FILTER
    pub filters: Vec<Option<String>>,
    /// Raw INFO text
    pub infos: Vec<Option<String>>,
    /// Per record, an index into `layout_keys`; empty for sites-only reads
    pub layout_of: Vec<usize>,
    /// Distinct layout strings in first-appearance order
    pub layout_keys: Vec<String>,
    /// Raw sample payload of the selected sample; empty for sites-only reads
    pub payloads: Vec<Option<String>>,
}

impl RawRecords {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    /// True when no record was accepted.
    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    /// Layout string of record `row`, if layouts were read.
    pub fn layout_key(&self, row: usize) -> Option<&str> {
        self.layout_of
            .get(row)
            .and_then(|&i| self.layout_keys.get(i))
            .map(|s| s.as_str())
    }
}

/// A fully read source.
#[derive(Debug, Clone)]
pub struct SourceData {
    /// Parsed header
    pub header: VariantHeader,
    /// Accepted records
    pub records: RawRecords,
    /// Records dropped because they were too short to carry their layout
    pub layout_mismatches: usize,
}

/// Read a local, optionally compressed, variant file.
///
/// # Errors
///
/// [`VariantError::UnsupportedSource`] for non-local paths, [`VariantError::MalformedHeader`]
/// when the header has no column-header line, [`VariantError::UnknownSample`] when the
/// requested sample is not in the header, and I/O errors.
pub fn read_source(file_path: &str, options: &VariantReadOptions) -> Result<SourceData> {
    let storage_type = get_storage_type(file_path);
    if storage_type != StorageType::LOCAL {
        return Err(VariantError::UnsupportedSource(format!(
            "{file_path} ({storage_type:?})"
        )));
    }
    let mut reader = open_local_text_reader(file_path, options.compression_type)?;
    let data = read_from_reader(&mut reader, options).map_err(|e| match e {
        VariantError::MalformedHeader(_) => VariantError::MalformedHeader(file_path.to_string()),
        other => other,
    })?;
    debug!(
        "Read {}: {} records, {} layouts, {} layout mismatches",
        file_path,
        data.records.len(),
        data.records.layout_keys.len(),
        data.layout_mismatches
    );
    Ok(data)
}

/// Read a variant source from any buffered reader.
pub fn read_from_reader(
    reader: &mut impl BufRead,
    options: &VariantReadOptions,
) -> Result<SourceData> {
    let header = parse_header(reader)?;
    let payload_column = if !options.with_genotype {
        None
    } else if options.sample.is_none() && header.sample_names().is_empty() {
        debug!("Column header has no sample columns, reading sites only");
        None
    } else {
        Some(payload_column_index(&header, options.sample.as_deref())?)
    };

    let mut records = RawRecords::default();
    let mut layout_index: HashMap<String, usize> = HashMap::new();
    let mut layout_mismatches = 0;
    let mut line = String::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < FIXED_COLUMN_COUNT {
            debug!("Body line {line_number}: {} columns, record dropped", fields.len());
            layout_mismatches += 1;
            continue;
        }

        if let Some(payload_column) = payload_column {
            let (Some(layout), Some(payload)) =
                (fields.get(LAYOUT_COLUMN_INDEX), fields.get(payload_column))
            else {
                debug!("Body line {line_number}: no layout or sample payload, record dropped");
                layout_mismatches += 1;
                continue;
            };
            let next = layout_index.len();
            let index = *layout_index.entry(layout.to_string()).or_insert_with(|| {
                records.layout_keys.push(layout.to_string());
                next
            });
            records.layout_of.push(index);
            records.payloads.push(owned(payload));
        }

        records.chroms.push(fields[0].to_string());
        records.positions.push(parse_integer(fields[1]));
        records.refs.push(owned(fields[3]));
        records.alts.push(owned(fields[4]));
        records.quals.push(parse_float(fields[5]));
        records.filters.push(owned(fields[6]));
        records.infos.push(owned(fields[INFO_COLUMN_INDEX]));
    }

    if layout_mismatches > 0 {
        warn!("Dropped {layout_mismatches} records that do not carry their layout");
    }

    Ok(SourceData {
        header,
        records,
        layout_mismatches,
    })
}

fn payload_column_index(header: &VariantHeader, sample: Option<&str>) -> Result<usize> {
    let offset = match sample {
        None => 0,
        Some(name) => header
            .sample_names()
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| VariantError::UnknownSample(name.to_string()))?,
    };
    Ok(LAYOUT_COLUMN_INDEX + 1 + offset)
}

fn owned(token: &str) -> Option<String> {
    if token == MISSING_VALUE {
        None
    } else {
        Some(token.to_string())
    }
}
