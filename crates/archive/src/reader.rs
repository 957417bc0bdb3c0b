//! Streaming archive reader
//!
//! Walks the top-level JSON array byte by byte and hands each element to
//! serde, so only one record is ever held in memory. The reader is an
//! [`Iterator`] that yields records in archive order, ends after the closing
//! `]`, and ends for good after the first error.

use crate::compression::{decompress, Compression};
use crate::error::{ArchiveError, ArchiveResult};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, Read};
use std::path::Path;
use tablekeep_core::Record;

const UTF8_BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Elements { first: bool },
    Done,
    Failed,
}

/// Lazy, non-restartable sequence of archive records
pub struct ArchiveReader<R> {
    input: R,
    state: State,
    records: usize,
}

impl<R: BufRead> ArchiveReader<R> {
    /// Read records from an already-decompressed stream
    pub fn new(input: R) -> Self {
        Self {
            input,
            state: State::Start,
            records: 0,
        }
    }

    /// Number of records yielded so far
    pub fn records_read(&self) -> usize {
        self.records
    }

    fn advance(&mut self) -> ArchiveResult<Option<Record>> {
        loop {
            match self.state {
                State::Done | State::Failed => return Ok(None),
                State::Start => {
                    self.skip_bom()?;
                    match self.peek_token()? {
                        Some(b'[') => {
                            self.input.consume(1);
                            self.state = State::Elements { first: true };
                        }
                        Some(other) => {
                            return Err(self.malformed(format!(
                                "expected '[' at start of archive, found {:?}",
                                other as char
                            )))
                        }
                        None => return Err(self.malformed("archive is empty")),
                    }
                }
                State::Elements { first } => {
                    let mut token = self.peek_token()?;
                    if !first {
                        match token {
                            Some(b',') => {
                                self.input.consume(1);
                                token = self.peek_token()?;
                            }
                            Some(b']') => return self.close(),
                            Some(other) => {
                                return Err(self.malformed(format!(
                                    "expected ',' or ']', found {:?}",
                                    other as char
                                )))
                            }
                            None => return Err(self.malformed("unterminated array")),
                        }
                    } else if token == Some(b']') {
                        return self.close();
                    }
                    return match token {
                        Some(b'{') => {
                            let record = self.parse_record()?;
                            self.state = State::Elements { first: false };
                            Ok(Some(record))
                        }
                        Some(other) => Err(self.malformed(format!(
                            "expected a record object, found {:?}",
                            other as char
                        ))),
                        None => Err(self.malformed("unterminated array")),
                    };
                }
            }
        }
    }

    fn parse_record(&mut self) -> ArchiveResult<Record> {
        let index = self.records;
        let mut de = serde_json::Deserializer::from_reader(&mut self.input);
        let record =
            Record::deserialize(&mut de).map_err(|e| ArchiveError::from_json(index, e))?;
        if let Some(property) = record.missing_key() {
            return Err(ArchiveError::MissingKey {
                index,
                table: record.table,
                property,
            });
        }
        self.records += 1;
        Ok(record)
    }

    fn close(&mut self) -> ArchiveResult<Option<Record>> {
        self.input.consume(1);
        if let Some(trailing) = self.peek_token()? {
            return Err(self.malformed(format!(
                "unexpected {:?} after closing ']'",
                trailing as char
            )));
        }
        self.state = State::Done;
        tracing::debug!(target: "tablekeep::archive", records = self.records, "Archive fully read");
        Ok(None)
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_token(&mut self) -> ArchiveResult<Option<u8>> {
        loop {
            let (skip, token) = {
                let buf = self.input.fill_buf()?;
                if buf.is_empty() {
                    return Ok(None);
                }
                match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                    Some(pos) => (pos, Some(buf[pos])),
                    None => (buf.len(), None),
                }
            };
            self.input.consume(skip);
            if token.is_some() {
                return Ok(token);
            }
        }
    }

    fn skip_bom(&mut self) -> ArchiveResult<()> {
        let buf = self.input.fill_buf()?;
        if buf.starts_with(&UTF8_BOM) {
            self.input.consume(UTF8_BOM.len());
        }
        Ok(())
    }

    fn malformed(&self, reason: impl Into<String>) -> ArchiveError {
        ArchiveError::malformed(self.records, reason)
    }
}

impl<'a> ArchiveReader<Box<dyn BufRead + Send + 'a>> {
    /// Read records from a compressed stream
    pub fn open<S: Read + Send + 'a>(source: S, compression: Compression) -> ArchiveResult<Self> {
        Ok(Self::new(decompress(source, compression)?))
    }
}

impl ArchiveReader<Box<dyn BufRead + Send + 'static>> {
    /// Read records from an archive file
    pub fn open_file(path: &Path, compression: Compression) -> ArchiveResult<Self> {
        let file = File::open(path)?;
        Self::open(file, compression)
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = ArchiveResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Failed;
                Some(Err(e))
            }
        }
    }
}
