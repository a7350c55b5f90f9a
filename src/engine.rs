// Render engine: ties stream demuxing to frame decoding and animation encoding.
//
// Provides:
//   - `Driver`: the SCANNING -> DECODING -> (SCANNING | DONE | ERROR) state
//     machine that alternates demuxer scans with decoder calls
//   - `RenderOptions`: explicit, immutable run configuration
//   - `render()`: drive a whole input, then encode the assembled sequence
//
// A run ends cleanly on end-of-stream, on the decoder's end marker, or on
// cancellation. Frames assembled before any error stay available through
// `Driver::finish`.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::anim::{AnimationAssembler, AnimationConfig, AnimationSequence, DEFAULT_DELAY};
use crate::codec::decoder::{DecodeError, FrameDecoder};
use crate::codec::encoder::{AnimationEncoder, EncodeError};
use crate::stream::demux::{ScanOutcome, StreamDemuxer};
use crate::stream::lookahead::DEFAULT_WINDOW_SIZE;
use crate::stream::signature::Signature;

/// Largest accepted lookahead window (256 MiB).
pub const MAX_WINDOW_SIZE: usize = 1 << 28;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for one render run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Magic that opens every frame.
    pub signature: Signature,
    /// Lookahead window in bytes. Must cover whatever the decoder leaves
    /// unconsumed between two frames.
    pub window_size: usize,
    /// Delay applied to every frame.
    pub delay: Duration,
    /// Loop count for the output; 0 loops forever.
    pub loop_count: u16,
    /// On a decode failure, encode the frames decoded so far instead of
    /// failing the run.
    pub salvage_partial: bool,
    /// Checked before every scan; setting it ends the run cleanly.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            signature: Signature::png(),
            window_size: DEFAULT_WINDOW_SIZE,
            delay: DEFAULT_DELAY,
            loop_count: 0,
            salvage_partial: false,
            cancel: None,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < self.signature.len() {
            return Err(ConfigError::WindowTooSmall {
                window: self.window_size,
                signature: self.signature.len(),
            });
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::WindowTooLarge {
                window: self.window_size,
            });
        }
        Ok(())
    }

    pub fn animation_config(&self) -> AnimationConfig {
        AnimationConfig {
            delay: self.delay,
            loop_count: self.loop_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("window size {window} is smaller than the {signature}-byte signature")]
    WindowTooSmall { window: usize, signature: usize },
    #[error("window size {window} exceeds maximum {MAX_WINDOW_SIZE}")]
    WindowTooLarge { window: usize },
}

/// Terminal failure of a driver run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(
        "no frame signature within {window} bytes of offset {offset} \
         ({frames_decoded} frames decoded); a frame is larger than the lookahead window"
    )]
    FrameTooLarge {
        offset: u64,
        window: usize,
        frames_decoded: u64,
    },
    #[error("frame {frame_index} at offset {offset} failed to decode: {source}")]
    Decode {
        frame_index: u64,
        offset: u64,
        #[source]
        source: DecodeError,
    },
    #[error("I/O error at offset {offset} ({frames_decoded} frames decoded): {source}")]
    Io {
        offset: u64,
        frames_decoded: u64,
        #[source]
        source: io::Error,
    },
    #[error("driver already stopped on an earlier error")]
    Halted,
}

impl RunError {
    /// Frames successfully decoded before the failure.
    pub fn frames_decoded(&self) -> Option<u64> {
        match self {
            Self::FrameTooLarge { frames_decoded, .. } | Self::Io { frames_decoded, .. } => {
                Some(*frames_decoded)
            }
            Self::Decode { frame_index, .. } => Some(*frame_index),
            Self::Halted => None,
        }
    }

    /// Stream offset the failure refers to.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::FrameTooLarge { offset, .. }
            | Self::Decode { offset, .. }
            | Self::Io { offset, .. } => Some(*offset),
            Self::Halted => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Scanning,
    Decoding,
    Done,
    Error,
}

/// Why a run reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    EndOfStream,
    EndMarker,
    Cancelled,
}

/// Progress counters for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    /// Logical stream position when the run stopped.
    pub bytes_consumed: u64,
    /// Bytes discarded by scans before frame signatures.
    pub skipped_bytes: u64,
    /// Unrecognised bytes left at end of stream.
    pub trailing_bytes: u64,
    /// `None` until the run reaches `Done`.
    pub end: Option<RunEnd>,
}

/// Demux/decode/assemble loop over one input stream.
pub struct Driver<R, D> {
    demuxer: StreamDemuxer<R>,
    decoder: D,
    assembler: AnimationAssembler,
    state: State,
    /// Offset of the located frame awaiting decode.
    pending_offset: u64,
    skipped_bytes: u64,
    trailing_bytes: u64,
    end: Option<RunEnd>,
    cancelled: Arc<AtomicBool>,
}

impl<R: Read, D: FrameDecoder> Driver<R, D> {
    /// Create a driver. `window_size` should be at least `signature.len()`
    /// (see [`RenderOptions::validate`]).
    pub fn new(source: R, decoder: D, signature: Signature, window_size: usize) -> Self {
        Self {
            demuxer: StreamDemuxer::new(source, signature, window_size),
            decoder,
            assembler: AnimationAssembler::new(),
            state: State::Scanning,
            pending_offset: 0,
            skipped_bytes: 0,
            trailing_bytes: 0,
            end: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an external cancellation flag.
    pub fn with_cancel(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn frames_decoded(&self) -> u64 {
        self.assembler.len() as u64
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.frames_decoded(),
            bytes_consumed: self.demuxer.position(),
            skipped_bytes: self.skipped_bytes,
            trailing_bytes: self.trailing_bytes,
            end: self.end,
        }
    }

    /// Perform one state transition and return the new state.
    pub fn step(&mut self) -> Result<State, RunError> {
        match self.state {
            State::Scanning => self.scan()?,
            State::Decoding => self.decode()?,
            State::Done => {}
            State::Error => return Err(RunError::Halted),
        }
        Ok(self.state)
    }

    /// Step until `Done`.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        while self.step()? != State::Done {}
        let summary = self.summary();
        log::info!(
            "run finished: {} frames, {} bytes, {:?}",
            summary.frames,
            summary.bytes_consumed,
            summary.end
        );
        Ok(summary)
    }

    /// Freeze the frames assembled so far, whatever state the run is in.
    pub fn finish(self, config: AnimationConfig) -> AnimationSequence {
        self.assembler.finish(config)
    }

    fn scan(&mut self) -> Result<(), RunError> {
        if self.cancelled.load(Ordering::Relaxed) {
            log::info!(
                "cancelled at offset {} after {} frames",
                self.demuxer.position(),
                self.frames_decoded()
            );
            self.complete(RunEnd::Cancelled);
            return Ok(());
        }

        let outcome = match self.demuxer.next_frame() {
            Ok(outcome) => outcome,
            Err(source) => return Err(self.io_failure(source)),
        };

        match outcome {
            ScanOutcome::FrameReady { offset, skipped } => {
                self.skipped_bytes += skipped as u64;
                self.pending_offset = offset;
                self.state = State::Decoding;
            }
            ScanOutcome::EndOfStream { trailing } => {
                self.trailing_bytes = trailing as u64;
                self.complete(RunEnd::EndOfStream);
            }
            ScanOutcome::WindowExhausted { offset } => {
                self.state = State::Error;
                return Err(RunError::FrameTooLarge {
                    offset,
                    window: self.demuxer.window_size(),
                    frames_decoded: self.frames_decoded(),
                });
            }
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<(), RunError> {
        let offset = self.pending_offset;
        match self.decoder.decode_one(self.demuxer.stream()) {
            Ok(Some(image)) => {
                let frame = self.assembler.append(image, offset);
                log::debug!(
                    "frame {} at offset {offset}: {}x{}",
                    frame.index,
                    frame.image.width,
                    frame.image.height
                );
                self.state = State::Scanning;
            }
            Ok(None) => {
                log::debug!("{} decoder found no frame at offset {offset}", self.decoder.name());
                self.complete(RunEnd::EndMarker);
            }
            // EOF inside a frame is a truncated input; any other read
            // failure belongs to the source, not the frame.
            Err(DecodeError::Io(source)) if source.kind() != io::ErrorKind::UnexpectedEof => {
                return Err(self.io_failure(source));
            }
            Err(source) => {
                self.state = State::Error;
                return Err(RunError::Decode {
                    frame_index: self.frames_decoded(),
                    offset,
                    source,
                });
            }
        }
        Ok(())
    }

    fn complete(&mut self, end: RunEnd) {
        self.end = Some(end);
        self.state = State::Done;
    }

    fn io_failure(&mut self, source: io::Error) -> RunError {
        self.state = State::Error;
        RunError::Io {
            offset: self.demuxer.position(),
            frames_decoded: self.frames_decoded(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// High-level render
// ---------------------------------------------------------------------------

/// Statistics returned by [`render`].
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub frames: u64,
    /// Input bytes logically consumed.
    pub bytes_in: u64,
    pub skipped_bytes: u64,
    pub trailing_bytes: u64,
    /// `None` when a salvaged run stopped on a decode failure.
    pub end: Option<RunEnd>,
    /// True if a decode failure cut the run short and the partial
    /// sequence was encoded anyway.
    pub truncated: bool,
    pub canvas: (u32, u32),
    pub window_size: usize,
    pub decoder: &'static str,
    pub encoder: &'static str,
}

/// Demux and decode every frame of `input`, then encode the sequence to
/// `output` in one write pass.
///
/// Nothing is written to `output` unless the run succeeds (or is salvaged).
pub fn render<R, W, D, E>(
    input: R,
    output: &mut W,
    decoder: D,
    mut encoder: E,
    opts: &RenderOptions,
) -> Result<RenderStats, RenderError>
where
    R: Read,
    W: Write,
    D: FrameDecoder,
    E: AnimationEncoder,
{
    opts.validate()?;
    let decoder_name = decoder.name();

    let mut driver = Driver::new(input, decoder, opts.signature.clone(), opts.window_size);
    if let Some(cancel) = &opts.cancel {
        driver = driver.with_cancel(Arc::clone(cancel));
    }

    let (summary, truncated) = match driver.run() {
        Ok(summary) => (summary, false),
        Err(err @ RunError::Decode { .. }) if opts.salvage_partial => {
            log::warn!("{err}; keeping {} earlier frames", driver.frames_decoded());
            (driver.summary(), true)
        }
        Err(err) => return Err(err.into()),
    };

    let sequence = driver.finish(opts.animation_config());
    let canvas = sequence.canvas_size();
    encoder.encode(&sequence, output)?;
    output.flush().map_err(EncodeError::Io)?;

    Ok(RenderStats {
        frames: summary.frames,
        bytes_in: summary.bytes_consumed,
        skipped_bytes: summary.skipped_bytes,
        trailing_bytes: summary.trailing_bytes,
        end: summary.end,
        truncated,
        canvas,
        window_size: opts.window_size,
        decoder: decoder_name,
        encoder: encoder.name(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::Image;
    use std::io::{BufRead, Cursor};

    const SIG: &[u8] = b"FR";

    /// `FR`, one length byte, then `len` payload bytes.
    fn token(payload: &[u8]) -> Vec<u8> {
        let mut out = SIG.to_vec();
        out.push(payload.len() as u8);
        out.extend_from_slice(payload);
        out
    }

    fn image_for(payload: &[u8]) -> Image {
        let first = payload.first().copied().unwrap_or(0);
        Image::from_rgba(1, 1, vec![first, payload.len() as u8, 0, 255]).unwrap()
    }

    /// Consumes exactly one token.
    struct TokenDecoder;

    impl FrameDecoder for TokenDecoder {
        fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
            let mut head = [0u8; 3];
            if stream.read_exact(&mut head).is_err() || &head[..2] != SIG {
                return Ok(None);
            }
            let mut payload = vec![0u8; head[2] as usize];
            stream
                .read_exact(&mut payload)
                .map_err(|_| DecodeError::Truncated("payload".into()))?;
            Ok(Some(image_for(&payload)))
        }
    }

    /// Reads only the signature and length, leaving the payload behind.
    struct LazyDecoder;

    impl FrameDecoder for LazyDecoder {
        fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
            let mut head = [0u8; 3];
            stream.read_exact(&mut head)?;
            Ok(Some(image_for(&[head[2]])))
        }
    }

    /// Fails on the frame with index `fail_at`.
    struct FailingDecoder {
        seen: u64,
        fail_at: u64,
    }

    impl FrameDecoder for FailingDecoder {
        fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
            let n = self.seen;
            self.seen += 1;
            if n == self.fail_at {
                return Err(DecodeError::Malformed("bad frame".into()));
            }
            TokenDecoder.decode_one(stream)
        }
    }

    /// Reads a whole token, propagating every read error.
    struct StrictDecoder;

    impl FrameDecoder for StrictDecoder {
        fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
            let mut head = [0u8; 3];
            stream.read_exact(&mut head)?;
            let mut payload = vec![0u8; head[2] as usize];
            stream.read_exact(&mut payload)?;
            Ok(Some(image_for(&payload)))
        }
    }

    /// Serves `data` until `fail_at`, then fails every read.
    struct BrokenSource {
        data: Vec<u8>,
        pos: usize,
        fail_at: usize,
    }

    impl Read for BrokenSource {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.fail_at {
                return Err(io::Error::other("device error"));
            }
            let end = self.fail_at.min(self.data.len()).min(self.pos + out.len());
            let n = end - self.pos;
            out[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    /// Two tokens; the source breaks inside the second payload.
    fn broken_mid_frame() -> BrokenSource {
        let mut data = token(b"one");
        data.extend(token(b"twotwo"));
        BrokenSource {
            data,
            pos: 0,
            fail_at: 12,
        }
    }

    /// Records the sequence it was handed.
    #[derive(Default)]
    struct RecordingEncoder {
        frames: Vec<u64>,
        config: Option<AnimationConfig>,
    }

    impl AnimationEncoder for RecordingEncoder {
        fn encode(
            &mut self,
            sequence: &AnimationSequence,
            out: &mut dyn Write,
        ) -> Result<(), EncodeError> {
            if sequence.is_empty() {
                return Err(EncodeError::EmptySequence);
            }
            self.frames = sequence.frames().iter().map(|f| f.offset).collect();
            self.config = Some(*sequence.config());
            out.write_all(b"ANIM")?;
            Ok(())
        }
    }

    fn driver<D: FrameDecoder>(data: Vec<u8>, decoder: D, window: usize) -> Driver<Cursor<Vec<u8>>, D> {
        Driver::new(Cursor::new(data), decoder, Signature::new(SIG).unwrap(), window)
    }

    fn opts(window: usize) -> RenderOptions {
        RenderOptions {
            signature: Signature::new(SIG).unwrap(),
            window_size: window,
            ..Default::default()
        }
    }

    #[test]
    fn counts_every_frame() {
        for n in 0..6u8 {
            let data: Vec<u8> = (0..n).flat_map(|i| token(&[i; 5])).collect();
            let mut d = driver(data.clone(), TokenDecoder, 32);
            let summary = d.run().unwrap();
            assert_eq!(summary.frames, n as u64);
            assert_eq!(summary.bytes_consumed, data.len() as u64);
            assert_eq!(summary.end, Some(RunEnd::EndOfStream));
        }
    }

    #[test]
    fn empty_input_ends_immediately() {
        let mut d = driver(Vec::new(), TokenDecoder, 32);
        assert_eq!(d.step().unwrap(), State::Done);
        let summary = d.summary();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.end, Some(RunEnd::EndOfStream));
    }

    #[test]
    fn state_transitions() {
        let mut d = driver(token(b"ab"), TokenDecoder, 32);
        assert_eq!(d.state(), State::Scanning);
        assert_eq!(d.step().unwrap(), State::Decoding);
        assert_eq!(d.step().unwrap(), State::Scanning);
        assert_eq!(d.step().unwrap(), State::Done);
        assert_eq!(d.step().unwrap(), State::Done);
    }

    #[test]
    fn lazy_decoder_tail_is_rescanned() {
        let mut data = token(b"0123456789");
        data.extend(token(b"abc"));
        let mut d = driver(data, LazyDecoder, 32);
        let summary = d.run().unwrap();
        assert_eq!(summary.frames, 2);
        // The first payload (10 bytes) was skipped by the second scan.
        assert_eq!(summary.skipped_bytes, 10);
        let seq = d.finish(AnimationConfig::default());
        assert_eq!(seq.frames()[1].offset, 13);
    }

    #[test]
    fn oversized_frame_is_detected() {
        let mut data = token(&[b'x'; 100]);
        data.extend(token(b"ok"));
        let mut d = driver(data, LazyDecoder, 32);
        let err = d.run().unwrap_err();
        match err {
            RunError::FrameTooLarge {
                offset,
                window,
                frames_decoded,
            } => {
                assert_eq!(offset, 3);
                assert_eq!(window, 32);
                assert_eq!(frames_decoded, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(d.state(), State::Error);
        assert!(matches!(d.step(), Err(RunError::Halted)));
        // The frame decoded before the failure is still there.
        assert_eq!(d.finish(AnimationConfig::default()).len(), 1);
    }

    #[test]
    fn trailing_garbage_keeps_frames() {
        let mut data = token(b"one");
        data.extend(token(b"two"));
        data.extend_from_slice(b"FR\x09tru");
        let mut d = driver(data, TokenDecoder, 32);
        let err = d.run().unwrap_err();
        assert!(matches!(
            err,
            RunError::Decode {
                frame_index: 2,
                offset: 12,
                ..
            }
        ));
        let seq = d.finish(AnimationConfig::default());
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames()[0].image.rgba[0], b'o');
        assert_eq!(seq.frames()[1].image.rgba[0], b't');
    }

    #[test]
    fn short_unrecognised_tail_is_end_of_stream() {
        let mut data = token(b"one");
        data.extend_from_slice(b"junk");
        let mut d = driver(data, TokenDecoder, 32);
        let summary = d.run().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.trailing_bytes, 4);
    }

    #[test]
    fn end_marker_stops_the_run() {
        // Signature present but the length byte is missing.
        let mut data = token(b"one");
        data.extend_from_slice(b"FR");
        let mut d = driver(data, TokenDecoder, 32);
        let summary = d.run().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.end, Some(RunEnd::EndMarker));
    }

    #[test]
    fn cancellation_before_first_scan() {
        let data: Vec<u8> = (0..3).flat_map(|_| token(b"x")).collect();
        let d = driver(data, TokenDecoder, 32);
        let cancel = d.cancel_handle();
        cancel.store(true, Ordering::Relaxed);
        let mut d = d;
        let summary = d.run().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.end, Some(RunEnd::Cancelled));
    }

    #[test]
    fn cancellation_mid_run_keeps_frames() {
        let data: Vec<u8> = (0..5).flat_map(|_| token(b"x")).collect();
        let mut d = driver(data, TokenDecoder, 32);
        let cancel = d.cancel_handle();
        // Scan + decode twice.
        for _ in 0..4 {
            d.step().unwrap();
        }
        cancel.store(true, Ordering::Relaxed);
        let summary = d.run().unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.end, Some(RunEnd::Cancelled));
    }

    #[test]
    fn render_hands_sequence_to_encoder() {
        let data: Vec<u8> = [b"a".as_slice(), b"bb", b"ccc"]
            .iter()
            .flat_map(|p| token(p))
            .collect();
        let mut out = Vec::new();
        let mut encoder = RecordingEncoder::default();
        let mut o = opts(32);
        o.delay = Duration::from_millis(40);
        o.loop_count = 2;
        let stats = render(Cursor::new(data), &mut out, TokenDecoder, &mut encoder, &o).unwrap();
        assert_eq!(stats.frames, 3);
        assert!(!stats.truncated);
        assert_eq!(out, b"ANIM");
        assert_eq!(encoder.frames, vec![0, 4, 9]);
        assert_eq!(
            encoder.config,
            Some(AnimationConfig {
                delay: Duration::from_millis(40),
                loop_count: 2
            })
        );
    }

    #[test]
    fn render_surfaces_empty_sequence() {
        let mut out = Vec::new();
        let err = render(
            Cursor::new(Vec::new()),
            &mut out,
            TokenDecoder,
            RecordingEncoder::default(),
            &opts(32),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Encode(EncodeError::EmptySequence)));
        assert!(out.is_empty());
    }

    #[test]
    fn render_fails_on_decode_error_without_writing() {
        let data: Vec<u8> = (0..3).flat_map(|_| token(b"x")).collect();
        let mut out = Vec::new();
        let err = render(
            Cursor::new(data),
            &mut out,
            FailingDecoder { seen: 0, fail_at: 2 },
            RecordingEncoder::default(),
            &opts(32),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Run(RunError::Decode { frame_index: 2, .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn render_salvages_partial_sequence() {
        let data: Vec<u8> = (0..3).flat_map(|_| token(b"x")).collect();
        let mut out = Vec::new();
        let mut o = opts(32);
        o.salvage_partial = true;
        let stats = render(
            Cursor::new(data),
            &mut out,
            FailingDecoder { seen: 0, fail_at: 2 },
            RecordingEncoder::default(),
            &o,
        )
        .unwrap();
        assert_eq!(stats.frames, 2);
        assert!(stats.truncated);
        assert_eq!(stats.end, None);
        assert_eq!(out, b"ANIM");
    }

    #[test]
    fn salvage_does_not_hide_frame_too_large() {
        let mut data = token(&[b'x'; 100]);
        data.extend(token(b"ok"));
        let mut o = opts(32);
        o.salvage_partial = true;
        let err = render(
            Cursor::new(data),
            &mut Vec::new(),
            LazyDecoder,
            RecordingEncoder::default(),
            &o,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Run(RunError::FrameTooLarge { .. })));
    }

    #[test]
    fn source_failure_during_decode_is_io() {
        let mut d = Driver::new(
            broken_mid_frame(),
            StrictDecoder,
            Signature::new(SIG).unwrap(),
            4,
        );
        let err = d.run().unwrap_err();
        match err {
            RunError::Io {
                frames_decoded,
                source,
                ..
            } => {
                assert_eq!(frames_decoded, 1);
                assert_eq!(source.kind(), io::ErrorKind::Other);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(d.state(), State::Error);
    }

    #[test]
    fn eof_inside_frame_is_a_decode_error() {
        let mut data = token(b"one");
        data.extend_from_slice(b"FR\x09tru");
        let mut d = driver(data, StrictDecoder, 32);
        let err = d.run().unwrap_err();
        assert!(matches!(
            err,
            RunError::Decode {
                frame_index: 1,
                source: DecodeError::Io(_),
                ..
            }
        ));
    }

    #[test]
    fn salvage_does_not_hide_source_failure() {
        let mut o = opts(4);
        o.salvage_partial = true;
        let mut out = Vec::new();
        let err = render(
            broken_mid_frame(),
            &mut out,
            StrictDecoder,
            RecordingEncoder::default(),
            &o,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Run(RunError::Io { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn options_are_validated() {
        let mut o = RenderOptions::default();
        assert!(o.validate().is_ok());
        o.window_size = 4;
        assert_eq!(
            o.validate(),
            Err(ConfigError::WindowTooSmall {
                window: 4,
                signature: 8
            })
        );
        o.window_size = MAX_WINDOW_SIZE + 1;
        assert!(matches!(o.validate(), Err(ConfigError::WindowTooLarge { .. })));
    }
}
