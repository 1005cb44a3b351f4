use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind, Read};
use std::str::FromStr;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Compression applied to a text source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    /// Single- or multi-member GZIP stream
    GZIP,
    /// Blocked GZIP (BGZF), as produced by bgzip/tabix tooling
    BGZF,
    /// Plain text
    NONE,
    /// Detect from the leading bytes of the file
    AUTO,
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(compression_type: &str) -> Result<Self, Self::Err> {
        match compression_type.to_lowercase().as_str() {
            "gz" | "gzip" => Ok(CompressionType::GZIP),
            "bgz" | "bgzf" => Ok(CompressionType::BGZF),
            "none" => Ok(CompressionType::NONE),
            "auto" => Ok(CompressionType::AUTO),
            _ => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid compression type: {}", compression_type),
            )),
        }
    }
}

/// Where a source path points to.
#[derive(Debug, PartialEq, Eq)]
pub enum StorageType {
    /// Google Cloud Storage (`gs://`)
    GCS,
    /// Amazon S3 (`s3://`)
    S3,
    /// Azure Blob Storage (`abfs://`)
    AZBLOB,
    /// Plain HTTP(S)
    HTTP,
    /// Local filesystem, with or without a `file://` prefix
    LOCAL,
    /// Any other URI scheme
    UNKNOWN,
}

impl StorageType {
    fn from_prefix(prefix: &str) -> Self {
        match prefix.to_lowercase().as_str() {
            "gs" => StorageType::GCS,
            "s3" => StorageType::S3,
            "abfs" => StorageType::AZBLOB,
            "local" | "file" => StorageType::LOCAL,
            "http" | "https" => StorageType::HTTP,
            _ => StorageType::UNKNOWN,
        }
    }
}

/// Classifies a path by its URI scheme. Paths without a scheme are local.
pub fn get_storage_type(file_path: &str) -> StorageType {
    match file_path.split_once("://") {
        Some((prefix, _)) => StorageType::from_prefix(prefix),
        None => StorageType::LOCAL,
    }
}

/// Strips an optional `file://` scheme from a local path.
pub fn local_path(file_path: &str) -> &str {
    file_path.strip_prefix("file://").unwrap_or(file_path)
}

/// Classifies the leading bytes of a file.
///
/// BGZF is GZIP with the FEXTRA flag set and a `BC` extra sub-field of length 2.
pub fn compression_from_magic(buffer: &[u8]) -> CompressionType {
    if buffer.len() < 4 {
        return CompressionType::NONE;
    }

    // GZIP magic number: 0x1f 0x8b
    if buffer[0] != 0x1f || buffer[1] != 0x8b {
        return CompressionType::NONE;
    }

    // FLG byte is at index 3
    if buffer.len() < 12 || (buffer[3] & 0x04) == 0 {
        return CompressionType::GZIP;
    }

    // XLEN is at index 10, little-endian
    let xlen = u16::from_le_bytes([buffer[10], buffer[11]]) as usize;
    let extra_end = (12 + xlen).min(buffer.len());
    let mut i = 12;
    while i + 4 <= extra_end {
        let slen = u16::from_le_bytes([buffer[i + 2], buffer[i + 3]]) as usize;
        if buffer[i] == b'B' && buffer[i + 1] == b'C' && slen == 2 {
            return CompressionType::BGZF;
        }
        i += slen + 4;
    }
    CompressionType::GZIP
}

/// Resolves the compression of a local file.
///
/// An explicit, non-`AUTO` compression type is returned unchanged; otherwise the first
/// 18 bytes of the file are inspected.
pub fn get_compression_type(
    file_path: &str,
    compression_type: Option<CompressionType>,
) -> std::io::Result<CompressionType> {
    if let Some(explicit) = compression_type.filter(|c| *c != CompressionType::AUTO) {
        return Ok(explicit);
    }

    let mut file = File::open(local_path(file_path))?;
    let mut buffer = [0u8; 18];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let detected = compression_from_magic(&buffer[..filled]);
    debug!(
        "get_compression_type: file_path={}, detected={:?}",
        file_path, detected
    );
    Ok(detected)
}

/// Opens a local text file as a buffered line reader, decompressing transparently.
///
/// BGZF files are a series of concatenated GZIP members, so both compressed variants are
/// decoded with a multi-member GZIP decoder.
pub fn open_local_text_reader(
    file_path: &str,
    compression_type: Option<CompressionType>,
) -> std::io::Result<Box<dyn BufRead + Send>> {
    let compression = get_compression_type(file_path, compression_type)?;
    let file = File::open(local_path(file_path))?;
    match compression {
        CompressionType::GZIP | CompressionType::BGZF => {
            let decoder = MultiGzDecoder::new(BufReader::with_capacity(IO_BUFFER_SIZE, file));
            Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, decoder)))
        }
        CompressionType::NONE | CompressionType::AUTO => {
            Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, file)))
        }
    }
}
