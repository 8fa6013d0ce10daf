//! Payload chunking with one-chunk lookahead
//!
//! Whether a chunk goes out as DAT or FIN depends on whether anything follows
//! it, so the reader always holds the next chunk before handing out the
//! current one.

use bytes::Bytes;
use std::io::{self, ErrorKind, Read};

/// One payload-sized piece of the input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub payload: Bytes,
    /// No data follows this chunk
    pub is_final: bool,
}

/// Splits a byte stream into payload-sized chunks
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    lookahead: Option<Bytes>,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        ChunkReader {
            reader,
            chunk_size,
            lookahead: None,
            finished: false,
        }
    }

    /// Read up to `chunk_size` bytes
    ///
    /// Short reads from the underlying reader are retried, so the result is
    /// shorter than `chunk_size` only at end of stream, and empty once the
    /// stream is exhausted.
    pub fn read_chunk(&mut self) -> io::Result<Bytes> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf.into())
    }

    /// Next chunk together with whether it is the last one
    ///
    /// An empty stream yields a single empty final chunk. Returns `None`
    /// after the final chunk has been handed out.
    pub fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }

        let current = match self.lookahead.take() {
            Some(chunk) => chunk,
            None => self.read_chunk()?,
        };

        let next = if current.is_empty() {
            Bytes::new()
        } else {
            self.read_chunk()?
        };

        if next.is_empty() {
            self.finished = true;
            Ok(Some(Chunk {
                payload: current,
                is_final: true,
            }))
        } else {
            self.lookahead = Some(next);
            Ok(Some(Chunk {
                payload: current,
                is_final: false,
            }))
        }
    }

    /// Whether the final chunk has been handed out
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
