//! Backup archive format for Tablekeep
//!
//! A backup archive is a compressed stream holding one top-level JSON array
//! of [`Record`](tablekeep_core::Record)s:
//!
//! ```text
//! archive.json.gz
//! └── [ { "table": "Orders", "entity": { ... } }, { "table": "Empty" }, ... ]
//! ```
//!
//! ## Reading
//!
//! [`ArchiveReader`] decodes the stream lazily, one record at a time, so an
//! archive of any length is consumed in constant memory. The sequence is
//! finite and cannot be restarted. Any decompression or structural failure
//! ends it with an [`ArchiveError`].
//!
//! ## Writing
//!
//! [`ArchiveWriter`] produces the same format, record by record.
//!
//! ## Compression
//!
//! gzip and zstd are supported. [`Compression::Auto`] sniffs the magic
//! number and falls back to uncompressed JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compression;
pub mod error;
pub mod reader;
pub mod writer;

pub use compression::{decompress, Compression};
pub use error::{ArchiveError, ArchiveResult};
pub use reader::ArchiveReader;
pub use writer::{ArchiveWriter, WriteOptions};
