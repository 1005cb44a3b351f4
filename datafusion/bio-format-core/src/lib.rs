//! Core utilities for DataFusion bioinformatics table providers
//!
//! This crate provides shared infrastructure for the datafusion-bio-format family:
//!
//! - **Local Storage**: Storage-type detection for file paths and buffered text readers for
//!   local files
//! - **Compression Support**: Automatic detection and handling of GZIP and BGZF compression
//! - **Table Utilities**: Nullable, type-directed Arrow column builders used when turning
//!   textual records into record batches
//!
//! ## Usage
//!
//! This crate is primarily used as a dependency by format-specific crates. Most users will
//! interact with those crates rather than using this core crate directly.
//!
//! ### Example: Compression Detection
//!
//! ```rust,no_run
//! use datafusion_bio_format_core::object_storage::{CompressionType, get_compression_type};
//!
//! # fn example() -> std::io::Result<()> {
//! let compression = get_compression_type("data/sample.vcf.gz", Some(CompressionType::AUTO))?;
//! assert_ne!(compression, CompressionType::AUTO);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`object_storage`]: Local file access and compression detection
//! - [`table_utils`]: Utilities for building Arrow columns

#![warn(missing_docs)]

/// Local file access and compression detection
pub mod object_storage;
/// Table utilities for building DataFusion record batches
pub mod table_utils;
/// Shared helpers for integration tests of format crates
pub mod test_utils;
