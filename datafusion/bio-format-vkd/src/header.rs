//! Variant header parsing: INFO/FORMAT declarations and the column-header line.
//!
//! The header is the `#`-prefixed block before the first record:
//! - `##INFO=<ID=DP,Number=1,Type=Integer,Description="...">`: info field declaration
//! - `##FORMAT=<ID=AD,Number=R,Type=Integer,Description="...">`: per-sample field declaration
//! - `#CHROM POS ID REF ALT QUAL FILTER INFO FORMAT <samples...>`: column-header line
//!
//! Declarations that do not carry a usable `ID`, `Number` and `Type` are dropped without
//! error; real-world headers are too irregular to reject on them.

use crate::error::{Result, VariantError};
use log::{debug, warn};
use std::io::BufRead;

/// Prefix of the column-header line that terminates the header.
pub const COLUMN_HEADER_PREFIX: &str = "#CHR";

/// Index of the FORMAT (layout) column on the column-header line and in records.
pub const LAYOUT_COLUMN_INDEX: usize = 8;

/// How many values a declared field carries per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `Number=1`
    Scalar,
    /// `Number=<n>` for any other literal count
    FixedList(usize),
    /// `A`, `R`, `G`, `.` and every other symbolic arity
    VariableList,
}

impl Cardinality {
    /// Folds a `Number=` token into a cardinality.
    pub fn from_number(number: &str) -> Self {
        match number {
            "1" => Cardinality::Scalar,
            other => match other.parse::<usize>() {
                Ok(n) => Cardinality::FixedList(n),
                Err(_) => Cardinality::VariableList,
            },
        }
    }

    /// True for both list variants.
    pub fn is_list(&self) -> bool {
        !matches!(self, Cardinality::Scalar)
    }
}

/// Declared value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    /// `Type=Integer`
    Integer,
    /// `Type=Float`
    Float,
    /// `Type=String`
    String,
    /// `Type=Character`
    Character,
}

impl PrimitiveType {
    /// Parses a `Type=` token. `Flag` and unknown types are not representable.
    pub fn from_type(ty: &str) -> Option<Self> {
        match ty {
            "Integer" => Some(PrimitiveType::Integer),
            "Float" => Some(PrimitiveType::Float),
            "String" => Some(PrimitiveType::String),
            "Character" => Some(PrimitiveType::Character),
            _ => None,
        }
    }
}

/// Which header category a declaration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationCategory {
    /// Embedded in the free-text INFO column
    Info,
    /// Embedded positionally in each sample column, per layout
    Format,
}

impl DeclarationCategory {
    fn line_prefix(&self) -> &'static str {
        match self {
            DeclarationCategory::Info => "##INFO=<",
            DeclarationCategory::Format => "##FORMAT=<",
        }
    }
}

/// A field declared in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    /// Field identifier, case preserved
    pub id: String,
    /// Arity folded from `Number=`
    pub cardinality: Cardinality,
    /// Value type from `Type=`
    pub primitive: PrimitiveType,
}

/// Parsed variant header.
#[derive(Debug, Clone, Default)]
pub struct VariantHeader {
    /// INFO declarations in header order
    pub infos: Vec<FieldDeclaration>,
    /// FORMAT declarations in header order
    pub formats: Vec<FieldDeclaration>,
    /// Column names from the `#CHROM` line, without the leading `#`
    pub columns: Vec<String>,
    /// Declaration lines that were malformed or duplicated and therefore ignored
    pub dropped_declarations: usize,
}

impl VariantHeader {
    /// Sample names listed after the FORMAT column.
    pub fn sample_names(&self) -> &[String] {
        self.columns
            .get(LAYOUT_COLUMN_INDEX + 1..)
            .unwrap_or_default()
    }

    fn push(&mut self, category: DeclarationCategory, declaration: FieldDeclaration) -> bool {
        let (existing, fold_case) = match category {
            DeclarationCategory::Info => (&self.infos, false),
            DeclarationCategory::Format => (&self.formats, true),
        };
        let clash = existing.iter().any(|d| {
            if fold_case {
                d.id.eq_ignore_ascii_case(&declaration.id)
            } else {
                d.id == declaration.id
            }
        });
        if clash {
            warn!(
                "Duplicate {:?} declaration for {}; keeping the first one",
                category, declaration.id
            );
            return false;
        }
        match category {
            DeclarationCategory::Info => self.infos.push(declaration),
            DeclarationCategory::Format => self.formats.push(declaration),
        }
        true
    }
}

/// Parse the variant header from a buffered reader.
///
/// Reads lines up to and including the `#CHR…` column-header line; the reader is left
/// positioned at the first record.
///
/// # Errors
///
/// Returns [`VariantError::MalformedHeader`] if the stream ends before the column-header
/// line, and [`VariantError::Io`] on read failures.
pub fn parse_header(reader: &mut impl BufRead) -> Result<VariantHeader> {
    let mut header = VariantHeader::default();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(VariantError::MalformedHeader("input stream".to_string()));
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);

        if trimmed.starts_with(COLUMN_HEADER_PREFIX) {
            header.columns = trimmed[1..].split('\t').map(|s| s.to_string()).collect();
            break;
        }

        let Some(category) = declaration_category(trimmed) else {
            continue;
        };
        match parse_declaration(trimmed) {
            Some((_, declaration)) => {
                if !header.push(category, declaration) {
                    header.dropped_declarations += 1;
                }
            }
            None => {
                debug!("Ignoring malformed declaration: {}", trimmed);
                header.dropped_declarations += 1;
            }
        }
    }

    debug!(
        "Parsed header: {} INFO, {} FORMAT declarations, {} samples, {} dropped",
        header.infos.len(),
        header.formats.len(),
        header.sample_names().len(),
        header.dropped_declarations
    );
    Ok(header)
}

fn declaration_category(line: &str) -> Option<DeclarationCategory> {
    [DeclarationCategory::Info, DeclarationCategory::Format]
        .into_iter()
        .find(|c| line.starts_with(c.line_prefix()))
}

/// Parse one `##INFO=<…>` or `##FORMAT=<…>` line.
///
/// Returns `None` for any other line, and for declarations missing `ID`, `Number` or
/// `Type`, with an invalid identifier, or with a type outside
/// Integer/Float/String/Character.
pub fn parse_declaration(line: &str) -> Option<(DeclarationCategory, FieldDeclaration)> {
    let category = declaration_category(line)?;
    let body = &line[category.line_prefix().len()..];
    let body = &body[..body.rfind('>')?];

    let mut id = None;
    let mut number = None;
    let mut ty = None;
    for (key, value) in split_attributes(body) {
        match key {
            "ID" if id.is_none() => id = Some(value),
            "Number" if number.is_none() => number = Some(value),
            "Type" if ty.is_none() => ty = Some(value),
            _ => {}
        }
    }

    let id = id.filter(|id| is_valid_id(id, category))?;
    let number = number.filter(|n| is_valid_number(n))?;
    let primitive = PrimitiveType::from_type(ty?)?;

    Some((
        category,
        FieldDeclaration {
            id: id.to_string(),
            cardinality: Cardinality::from_number(number),
            primitive,
        },
    ))
}

/// Splits `KEY=value,KEY="quoted, value"` on commas outside double quotes.
fn split_attributes(body: &str) -> Vec<(&str, &str)> {
    let mut attributes = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '\\' => {
                escaped = !escaped;
                continue;
            }
            '"' if !escaped => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if let Some(pair) = body[start..i].split_once('=') {
                    attributes.push(pair);
                }
                start = i + 1;
            }
            _ => {}
        }
        escaped = false;
    }
    if let Some(pair) = body[start..].split_once('=') {
        attributes.push(pair);
    }
    attributes
}

fn is_valid_id(id: &str, category: DeclarationCategory) -> bool {
    if category == DeclarationCategory::Info && id == "1000G" {
        return true;
    }
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn is_valid_number(number: &str) -> bool {
    !number.is_empty()
        && number
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "\
##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth, all samples\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##INFO=<ID=1000G,Number=0,Type=String,Description=\"1000 genomes\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
##FORMAT=<ID=PL,Number=3,Type=Integer,Description=\"Phred likelihoods\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample1\tsample2
chr1\t100\t.\tA\tT\t50\tPASS\tDP=3\tGT\t0/1\t1/1
";

    #[test]
    fn test_parse_header_declarations() {
        let mut cursor = Cursor::new(HEADER);
        let header = parse_header(&mut cursor).unwrap();

        let info_ids: Vec<&str> = header.infos.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(info_ids, vec!["DP", "AF", "1000G"]);
        assert_eq!(header.infos[0].cardinality, Cardinality::Scalar);
        assert_eq!(header.infos[0].primitive, PrimitiveType::Integer);
        assert_eq!(header.infos[1].cardinality, Cardinality::VariableList);
        assert_eq!(header.infos[2].cardinality, Cardinality::FixedList(0));

        let format_ids: Vec<&str> = header.formats.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(format_ids, vec!["GT", "AD", "PL"]);
        assert_eq!(header.formats[2].cardinality, Cardinality::FixedList(3));

        // The Flag declaration is dropped
        assert_eq!(header.dropped_declarations, 1);
        assert_eq!(header.sample_names(), ["sample1", "sample2"]);
    }

    #[test]
    fn test_reader_left_at_first_record() {
        let mut cursor = Cursor::new(HEADER);
        parse_header(&mut cursor).unwrap();
        let mut next = String::new();
        cursor.read_line(&mut next).unwrap();
        assert!(next.starts_with("chr1\t100"));
    }

    #[test]
    fn test_missing_column_header_is_malformed() {
        let mut cursor = Cursor::new("##fileformat=VCFv4.2\n##INFO=<ID=DP,Number=1,Type=Integer>\n");
        let err = parse_header(&mut cursor).unwrap_err();
        assert!(matches!(err, VariantError::MalformedHeader(_)));
    }

    #[test]
    fn test_malformed_declarations_are_ignored() {
        for line in [
            "##INFO=<ID=DP,Type=Integer,Description=\"no number\">",
            "##INFO=<ID=9X,Number=1,Type=Integer>",
            "##INFO=<ID=DP,Number=1,Type=Long>",
            "##INFO=<ID=DP,Number=1,Type=Integer",
            "##FORMAT=<ID=1000G,Number=1,Type=String>",
        ] {
            assert!(parse_declaration(line).is_none(), "accepted {line}");
        }
    }

    #[test]
    fn test_attribute_order_and_quoted_commas() {
        let (category, declaration) = parse_declaration(
            "##FORMAT=<Description=\"Read depth, filtered\",Type=Float,ID=DP.raw,Number=G>",
        )
        .unwrap();
        assert_eq!(category, DeclarationCategory::Format);
        assert_eq!(declaration.id, "DP.raw");
        assert_eq!(declaration.cardinality, Cardinality::VariableList);
        assert_eq!(declaration.primitive, PrimitiveType::Float);
    }

    #[test]
    fn test_duplicate_and_case_colliding_declarations_keep_first() {
        let text = "\
##INFO=<ID=DP,Number=1,Type=Integer>
##INFO=<ID=DP,Number=.,Type=String>
##INFO=<ID=dp,Number=1,Type=Float>
##FORMAT=<ID=DP,Number=1,Type=Integer>
##FORMAT=<ID=dp,Number=1,Type=Float>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
";
        let header = parse_header(&mut Cursor::new(text)).unwrap();
        assert_eq!(header.infos.len(), 2);
        assert_eq!(header.infos[0].primitive, PrimitiveType::Integer);
        assert_eq!(header.infos[1].id, "dp");
        assert_eq!(header.formats.len(), 1);
        assert_eq!(header.dropped_declarations, 2);
        assert!(header.sample_names().is_empty());
    }

    #[test]
    fn test_cardinality_from_number() {
        assert_eq!(Cardinality::from_number("1"), Cardinality::Scalar);
        assert_eq!(Cardinality::from_number("2"), Cardinality::FixedList(2));
        for token in ["A", "R", "G", ".", "LA", "P"] {
            assert_eq!(Cardinality::from_number(token), Cardinality::VariableList);
        }
        assert!(!Cardinality::Scalar.is_list());
        assert!(Cardinality::FixedList(2).is_list());
    }
}
