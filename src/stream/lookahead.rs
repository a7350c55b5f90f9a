// Bounded lookahead reader with mark/reset.
//
// LookaheadReader wraps any `Read` source with:
//   - An owned byte arena plus a cursor index (the logical read position)
//   - `peek(n)` that buffers up to `n` bytes without advancing
//   - `mark()` / `reset()` save-and-restore of the logical position
//   - A read limit: reading more than `read_limit` bytes past the mark
//     invalidates it, so the arena stays bounded
//
// Bytes before both the cursor and a live mark are compacted away on the
// next refill. The reader implements `Read` and `BufRead`, so decoders can
// consume from it directly without losing lookahead bytes.

use std::io::{self, BufRead, Read};

/// Default lookahead window (1 KiB).
pub const DEFAULT_WINDOW_SIZE: usize = 1024;

/// Minimum number of bytes requested from the source per refill.
const READ_CHUNK: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// LookaheadReader
// ---------------------------------------------------------------------------

/// Byte source with bounded lookahead and a single rewind mark.
pub struct LookaheadReader<R> {
    inner: R,
    /// Buffered bytes; `buf[0]` sits at absolute offset `base`.
    buf: Vec<u8>,
    /// Cursor into `buf`.
    pos: usize,
    /// Marked cursor, if still valid.
    mark: Option<usize>,
    base: u64,
    read_limit: usize,
    eof: bool,
}

impl<R: Read> LookaheadReader<R> {
    /// Wrap `inner`. A mark stays valid for `read_limit` bytes of reading.
    pub fn new(inner: R, read_limit: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
            mark: None,
            base: 0,
            read_limit,
            eof: false,
        }
    }

    /// Absolute number of bytes logically consumed so far.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    pub fn read_limit(&self) -> usize {
        self.read_limit
    }

    /// Record the current logical position.
    pub fn mark(&mut self) {
        self.mark = Some(self.pos);
    }

    /// Whether a mark is set and still within the read limit.
    pub fn has_mark(&self) -> bool {
        self.mark.is_some()
    }

    /// Restore the logical position to the last mark.
    ///
    /// Fails with `InvalidInput` if no mark was set or the mark expired.
    pub fn reset(&mut self) -> io::Result<()> {
        match self.mark {
            Some(m) => {
                self.pos = m;
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "reset without a valid mark",
            )),
        }
    }

    /// Return up to `n` bytes at the logical position without advancing.
    ///
    /// Fewer than `n` bytes means the source hit EOF.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        self.fill_to(n)?;
        let end = (self.pos + n).min(self.buf.len());
        Ok(&self.buf[self.pos..end])
    }

    /// Advance the logical position by up to `n` bytes, discarding them.
    /// Returns the number of bytes skipped (less than `n` only at EOF).
    pub fn skip(&mut self, n: usize) -> io::Result<usize> {
        let mut skipped = 0;
        while skipped < n {
            if self.available() == 0 {
                self.fill_to(1)?;
                if self.available() == 0 {
                    break;
                }
            }
            let step = self.available().min(n - skipped);
            self.advance(step);
            skipped += step;
        }
        Ok(skipped)
    }

    /// True once the source is drained and no buffered bytes remain.
    pub fn is_exhausted(&self) -> bool {
        self.eof && self.available() == 0
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the source. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    #[inline]
    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        if let Some(m) = self.mark
            && self.pos - m > self.read_limit
        {
            log::trace!(
                "mark at offset {} expired after {} bytes",
                self.base + m as u64,
                self.pos - m
            );
            self.mark = None;
        }
    }

    /// Drop bytes that neither the cursor nor the mark can reach again.
    fn compact(&mut self) {
        let keep_from = self.mark.map_or(self.pos, |m| m.min(self.pos));
        if keep_from == 0 {
            return;
        }
        self.buf.drain(..keep_from);
        self.base += keep_from as u64;
        self.pos -= keep_from;
        if let Some(m) = self.mark.as_mut() {
            *m -= keep_from;
        }
    }

    /// Read from the source until `want` bytes are buffered past the cursor
    /// or the source reports EOF.
    fn fill_to(&mut self, want: usize) -> io::Result<()> {
        if self.available() >= want || self.eof {
            return Ok(());
        }
        self.compact();
        let request = (want - self.available()).max(READ_CHUNK);
        let mut filled = self.buf.len();
        let target = self.pos + want;
        self.buf.resize(filled + request, 0);
        let result = loop {
            if filled >= target {
                break Ok(());
            }
            match self.inner.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break Ok(());
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.buf.truncate(filled);
        result
    }
}

impl<R: Read> Read for LookaheadReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let avail = self.fill_buf()?;
        let n = avail.len().min(out.len());
        out[..n].copy_from_slice(&avail[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for LookaheadReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_to(1)?;
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.available());
        self.advance(amt);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
