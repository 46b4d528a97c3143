//! Random-access buffered reader over a forward-only byte stream.
//!
//! Magic-number matchers address bytes by offset, but most sources only
//! support sequential reads. [`ByteCursor`] keeps every byte it has fetched
//! so overlapping reads at arbitrary offsets never go back to the source.
//! The buffer only grows; cursors live for a single detection call and only
//! ever look at the head of a resource.

use std::io::{self, Read};

use crate::error::{ProbeError, ProbeResult};

/// Granularity of buffer growth, in bytes.
pub const CHUNK_SIZE: usize = 256;

/// Lazily growing random-access view of a reader.
pub struct ByteCursor<R> {
    source: R,
    buffer: Vec<u8>,
    exhausted: bool,
    position: usize,
}

impl<R: Read> ByteCursor<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            exhausted: false,
            position: 0,
        }
    }

    /// Grow the buffer so it covers `required_end` bytes, rounded up to a
    /// whole number of chunks. Returns the buffered length, which is smaller
    /// than `required_end` only when the source is exhausted. The buffer
    /// only ever holds bytes the source actually produced.
    fn fill_to(&mut self, required_end: usize) -> io::Result<usize> {
        if self.buffer.len() >= required_end || self.exhausted {
            return Ok(self.buffer.len());
        }

        let desired = required_end
            .checked_next_multiple_of(CHUNK_SIZE)
            .unwrap_or(required_end);
        let wanted = (desired - self.buffer.len()) as u64;
        let fetched = (&mut self.source)
            .take(wanted)
            .read_to_end(&mut self.buffer)?;
        if (fetched as u64) < wanted {
            self.exhausted = true;
        }
        Ok(self.buffer.len())
    }

    /// Return exactly `length` bytes starting at `offset`.
    ///
    /// Fails with [`ProbeError::TruncatedInput`] when the source ends before
    /// `offset + length`.
    pub fn read_at(&mut self, offset: usize, length: usize) -> ProbeResult<&[u8]> {
        let required_end = offset.checked_add(length).ok_or(ProbeError::TruncatedInput {
            offset: offset as u64,
            requested: length,
            available: 0,
        })?;
        let buffered = self.fill_to(required_end)?;
        if buffered < required_end {
            return Err(ProbeError::TruncatedInput {
                offset: offset as u64,
                requested: length,
                available: buffered.saturating_sub(offset),
            });
        }
        Ok(&self.buffer[offset..required_end])
    }

    pub fn read_byte_at(&mut self, offset: usize) -> ProbeResult<u8> {
        Ok(self.read_at(offset, 1)?[0])
    }

    /// Read the line starting at `offset`, without its `\n` or `\r`
    /// terminator.
    ///
    /// Returns `Ok(None)` when the stream ends before any terminator is
    /// found. Either way the position marker moves: just past the
    /// terminator, or to the end of the data.
    pub fn read_line_at(&mut self, offset: usize) -> ProbeResult<Option<Vec<u8>>> {
        let mut scan = offset;
        loop {
            if scan >= self.buffer.len() && self.fill_to(scan.saturating_add(1))? <= scan {
                self.position = self.buffer.len();
                return Ok(None);
            }
            if let Some(i) = self.buffer[scan..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            {
                let end = scan + i;
                let line = self.buffer[offset..end].to_vec();
                self.position = end + 1;
                return Ok(Some(line));
            }
            scan = self.buffer.len();
        }
    }

    /// Sequential single-byte read from the position marker.
    pub fn read_next_byte(&mut self) -> ProbeResult<Option<u8>> {
        if self.fill_to(self.position.saturating_add(1))? <= self.position {
            return Ok(None);
        }
        let byte = self.buffer[self.position];
        self.position += 1;
        Ok(Some(byte))
    }

    /// Current position of the sequential marker.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn seek_to(&mut self, position: usize) {
        self.position = position;
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Number of bytes fetched from the source so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Read up to `length` leading bytes, returning fewer on short input.
    pub fn head(&mut self, length: usize) -> ProbeResult<&[u8]> {
        let buffered = self.fill_to(length)?;
        Ok(&self.buffer[..buffered.min(length)])
    }
}

impl<R: Read> Read for ByteCursor<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let buffered = self.fill_to(self.position.saturating_add(out.len()))?;
        let available = buffered.saturating_sub(self.position).min(out.len());
        out[..available].copy_from_slice(&self.buffer[self.position..self.position + available]);
        self.position += available;
        Ok(available)
    }
}

impl<R> std::fmt::Debug for ByteCursor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCursor")
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .field("position", &self.position)
            .finish()
    }
}
