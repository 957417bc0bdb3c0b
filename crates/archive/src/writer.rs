//! Archive writer
//!
//! Writes records one at a time into a compressed JSON array. The opening
//! `[` is written with the first record (or by [`ArchiveWriter::finish`] for
//! an empty archive), so nothing is buffered beyond the encoder's own window.

use crate::compression::Compression;
use crate::error::ArchiveResult;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use tablekeep_core::Record;

/// Options for writing an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Output codec; `Auto` writes gzip
    pub compression: Compression,
    /// Codec level, `None` for the codec default
    pub level: Option<i32>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
            level: None,
        }
    }
}

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
            Sink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
            Sink::Zstd(w) => w.flush(),
        }
    }
}

/// Streaming writer for backup archives
pub struct ArchiveWriter<W: Write> {
    sink: Sink<W>,
    records: usize,
}

impl<W: Write> ArchiveWriter<W> {
    /// Create a writer over `inner`
    pub fn new(inner: W, options: WriteOptions) -> ArchiveResult<Self> {
        let sink = match options.compression {
            Compression::Auto | Compression::Gzip => {
                let level = options
                    .level
                    .map_or(flate2::Compression::default(), |l| {
                        flate2::Compression::new(l.clamp(0, 9) as u32)
                    });
                Sink::Gzip(GzEncoder::new(inner, level))
            }
            Compression::Zstd => Sink::Zstd(zstd::Encoder::new(
                inner,
                options.level.unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL),
            )?),
            Compression::None => Sink::Plain(inner),
        };
        Ok(Self { sink, records: 0 })
    }

    /// Append one record
    pub fn write_record(&mut self, record: &Record) -> ArchiveResult<()> {
        let separator: &[u8] = if self.records == 0 { b"[" } else { b"," };
        self.sink.write_all(separator)?;
        serde_json::to_writer(&mut self.sink, record)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Close the array, finish the codec and return the inner writer
    pub fn finish(mut self) -> ArchiveResult<W> {
        if self.records == 0 {
            self.sink.write_all(b"[")?;
        }
        self.sink.write_all(b"]")?;
        let inner = match self.sink {
            Sink::Plain(mut w) => {
                w.flush()?;
                w
            }
            Sink::Gzip(w) => w.finish()?,
            Sink::Zstd(w) => w.finish()?,
        };
        Ok(inner)
    }
}
