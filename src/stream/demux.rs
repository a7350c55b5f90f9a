// Self-delimiting stream demultiplexer.
//
// StreamDemuxer recovers frame boundaries from a stream of back-to-back
// encoded images that carry no length prefix or separator. Before every
// decode it:
//   1. marks the stream and peeks one lookahead window,
//   2. scans the window for the leftmost frame signature,
//   3. rewinds and skips to the match so the decoder starts on it.
//
// The decoder downstream is not trusted to stop exactly at the end of its
// frame; whatever it leaves behind is skipped by the next scan. A window
// with no signature is reported as end-of-stream only when the source ran
// dry inside it. A full window without a signature is a distinct outcome
// (the frame, or the tail the decoder left, is larger than the window).

use std::io::{self, Read};

use super::lookahead::LookaheadReader;
use super::signature::Signature;

// ---------------------------------------------------------------------------
// Scan outcome
// ---------------------------------------------------------------------------

/// Result of one demux iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The stream now sits on a signature at absolute `offset`.
    /// `skipped` bytes preceding it were discarded.
    FrameReady { offset: u64, skipped: usize },
    /// The source ran out inside the window without another signature.
    /// `trailing` bytes were left over (zero for a clean end).
    EndOfStream { trailing: usize },
    /// A full window was scanned without finding a signature; scanning
    /// stalled at absolute `offset`.
    WindowExhausted { offset: u64 },
}

// ---------------------------------------------------------------------------
// StreamDemuxer
// ---------------------------------------------------------------------------

/// Positions a byte stream at the start of each successive frame.
pub struct StreamDemuxer<R> {
    reader: LookaheadReader<R>,
    signature: Signature,
    window_size: usize,
    /// Offset of the frame handed out by the previous iteration.
    last_frame_start: Option<u64>,
    frames_located: u64,
}

impl<R: Read> StreamDemuxer<R> {
    /// Create a demuxer over `source`.
    ///
    /// `window_size` should be at least `signature.len()`; smaller windows
    /// can never contain a match.
    pub fn new(source: R, signature: Signature, window_size: usize) -> Self {
        Self {
            reader: LookaheadReader::new(source, window_size),
            signature,
            window_size,
            last_frame_start: None,
            frames_located: 0,
        }
    }

    /// Locate the next frame and leave the stream positioned on it.
    pub fn next_frame(&mut self) -> io::Result<ScanOutcome> {
        let position = self.reader.position();
        self.reader.mark();

        let window = self.reader.peek(self.window_size)?;
        let available = window.len();
        if available == 0 {
            return Ok(ScanOutcome::EndOfStream { trailing: 0 });
        }

        // If the decoder consumed nothing, the signature at index 0 is the
        // one already handed out.
        let from = usize::from(self.last_frame_start == Some(position));
        let found = self.signature.find_in(window, from);

        self.reader.reset()?;

        match found {
            Some(idx) => {
                let skipped = self.reader.skip(idx)?;
                debug_assert_eq!(skipped, idx);
                let offset = self.reader.position();
                if idx > from {
                    log::debug!("skipped {} bytes before frame at offset {offset}", idx);
                }
                self.last_frame_start = Some(offset);
                self.frames_located += 1;
                Ok(ScanOutcome::FrameReady {
                    offset,
                    skipped: idx,
                })
            }
            None if available < self.window_size => {
                if available > from {
                    log::warn!(
                        "ignoring {} trailing bytes at offset {position} with no frame signature",
                        available - from
                    );
                }
                Ok(ScanOutcome::EndOfStream {
                    trailing: available - from,
                })
            }
            None => {
                log::debug!(
                    "no signature within {} bytes of offset {position}",
                    self.window_size
                );
                Ok(ScanOutcome::WindowExhausted { offset: position })
            }
        }
    }

    /// The positioned stream, for handing to a frame decoder.
    pub fn stream(&mut self) -> &mut LookaheadReader<R> {
        &mut self.reader
    }

    /// Absolute stream offset of the logical read position.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Number of `FrameReady` outcomes so far.
    pub fn frames_located(&self) -> u64 {
        self.frames_located
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
