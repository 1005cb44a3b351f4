//! Header-driven variant-call ingestion for Apache DataFusion
//!
//! This crate turns tab-delimited variant-call files into typed relations whose columns
//! are derived from the file's own INFO and FORMAT declarations, and merges such
//! relations across sources.
//!
//! # Features
//!
//! - One typed column per declared INFO field (`info_<ID>`) and FORMAT field (`format_<id>`)
//! - Records with different FORMAT layouts in one file, each executed as its own partition
//! - Lenient coercion: missing markers, malformed numbers and absent fields become nulls
//! - Explosion of snpEff/VEP annotation lists into flat sub-field columns
//! - Multi-dataset union that drops columns whose types disagree between sources
//! - Identity-key enrichment joins for labels and clinical annotations
//! - Plain, GZIP and BGZF local files
//!
//! # Example
//!
//! ```rust,no_run
//! use datafusion::prelude::*;
//! use datafusion_bio_format_vkd::storage::VariantReadOptions;
//! use datafusion_bio_format_vkd::table_provider::VariantTableProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> datafusion::error::Result<()> {
//! let ctx = SessionContext::new();
//!
//! let table = VariantTableProvider::new("data/calls.vcf.gz", VariantReadOptions::default())?;
//! ctx.register_table("calls", Arc::new(table))?;
//!
//! let df = ctx
//!     .sql("SELECT chr, position, format_dp FROM calls WHERE format_dp > 10")
//!     .await?;
//! df.show().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Functional annotation expansion
pub mod annotation;

/// Error types
pub mod error;

/// Header declaration parsing
pub mod header;

/// FORMAT layout discovery
pub mod layout;

/// Multi-source merging and enrichment
pub mod merge;

/// Per-layout physical execution plan
pub mod physical_exec;

/// Multi-dataset merge runs
pub mod pipeline;

/// Extraction rule compilation and lenient typing
pub mod rules;

/// Reading local variant sources
pub mod storage;

/// Apache DataFusion table provider for variant sources
pub mod table_provider;

/// Typed relation wrapper
pub mod typed_table;

pub use error::{Result, VariantError};
pub use typed_table::{IDENTITY_KEY, TypedTable, read_variants};
