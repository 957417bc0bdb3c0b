//! Archive compression
//!
//! Decoders are wrapped so that their read failures are tagged as
//! [`DecodeFailure`]s; the error layer turns those into
//! `ArchiveError::Decompression` instead of plain IO errors.

use crate::error::ArchiveResult;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, Read};

/// gzip magic number
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// zstd frame magic number
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Archive compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Detect from the magic number when reading; gzip when writing
    #[default]
    Auto,
    /// gzip (RFC 1952)
    Gzip,
    /// zstd
    Zstd,
    /// Uncompressed JSON
    None,
}

impl Compression {
    /// Detect the codec from the first bytes of a stream
    pub fn detect(prefix: &[u8]) -> Compression {
        if prefix.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else if prefix.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Codec name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Compression::Auto => "auto",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
            Compression::None => "none",
        }
    }
}

/// A read failure raised inside a decoder
#[derive(Debug)]
pub struct DecodeFailure {
    /// Codec that failed
    pub codec: &'static str,
    /// Underlying error
    pub source: io::Error,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for DecodeFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

struct Decoding<R> {
    codec: &'static str,
    inner: R,
}

impl<R: Read> Read for Decoding<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|source| {
            let kind = source.kind();
            io::Error::new(
                kind,
                DecodeFailure {
                    codec: self.codec,
                    source,
                },
            )
        })
    }
}

/// Wrap a raw stream in the decoder for `compression`
///
/// With [`Compression::Auto`] the first four bytes are sniffed and replayed
/// in front of the stream.
pub fn decompress<'a, R>(
    reader: R,
    compression: Compression,
) -> ArchiveResult<Box<dyn BufRead + Send + 'a>>
where
    R: Read + Send + 'a,
{
    match compression {
        Compression::Auto => {
            let mut reader = reader;
            let mut prefix = [0u8; 4];
            let mut filled = 0;
            while filled < prefix.len() {
                match reader.read(&mut prefix[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            let detected = Compression::detect(&prefix[..filled]);
            tracing::debug!(target: "tablekeep::archive", codec = detected.name(), "Detected archive compression");
            let replay = Cursor::new(prefix[..filled].to_vec()).chain(reader);
            decoder_for(replay, detected)
        }
        codec => decoder_for(reader, codec),
    }
}

fn decoder_for<'a, R>(reader: R, codec: Compression) -> ArchiveResult<Box<dyn BufRead + Send + 'a>>
where
    R: Read + Send + 'a,
{
    match codec {
        Compression::Gzip => Ok(Box::new(BufReader::new(Decoding {
            codec: "gzip",
            inner: MultiGzDecoder::new(reader),
        }))),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(reader)?;
            Ok(Box::new(BufReader::new(Decoding {
                codec: "zstd",
                inner: decoder,
            })))
        }
        Compression::None | Compression::Auto => Ok(Box::new(BufReader::new(reader))),
    }
}
