// File-level helpers around the render engine.
//
// Provides `render_file()`, which streams an input file through the driver
// and writes the encoded animation only once the run has succeeded, and
// `render_file_adaptive()`, which retries with a doubled lookahead window
// when a frame outgrows it. Optionally computes a streaming SHA-256 of the
// written output (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::codec::decoder::FrameDecoder;
use crate::codec::encoder::AnimationEncoder;
use crate::engine::{self, MAX_WINDOW_SIZE, RenderError, RenderOptions, RenderStats, RunError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `render_file()`.
#[derive(Debug, Clone)]
pub struct RenderFileStats {
    /// Engine statistics for the successful attempt.
    pub render: RenderStats,
    /// Input file size in bytes.
    pub input_size: u64,
    /// Bytes written to the output file.
    pub output_size: u64,
    /// Lookahead attempts made (1 unless the window was grown).
    pub attempts: u32,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl IoError {
    /// True if the run failed because a frame outgrew the lookahead window.
    pub fn is_frame_too_large(&self) -> bool {
        matches!(
            self,
            Self::Render(RenderError::Run(RunError::FrameTooLarge { .. }))
        )
    }
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// render_file
// ---------------------------------------------------------------------------

/// Render the frames in `input_path` into an animation at `output_path`.
///
/// The input is streamed through the lookahead reader. The encoded
/// animation is held in memory until the run succeeds; only then is the
/// output file created, so a failed run leaves nothing behind.
pub fn render_file<D, E>(
    input_path: &Path,
    output_path: &Path,
    decoder: D,
    encoder: E,
    opts: &RenderOptions,
) -> Result<RenderFileStats, IoError>
where
    D: FrameDecoder,
    E: AnimationEncoder,
{
    let input = File::open(input_path)?;
    let input_size = input.metadata()?.len();

    let mut encoded = Vec::new();
    let render = engine::render(input, &mut encoded, decoder, encoder, opts)?;

    let output = File::create(output_path)?;
    let output_sha256 = write_output(BufWriter::with_capacity(BUF_SIZE, output), &encoded)?;
    log::debug!(
        "wrote {} bytes to {}",
        encoded.len(),
        output_path.display()
    );

    Ok(RenderFileStats {
        render,
        input_size,
        output_size: encoded.len() as u64,
        attempts: 1,
        output_sha256,
    })
}

/// Like [`render_file`], but on `FrameTooLarge` retries with twice the
/// window until `max_window` (capped at [`MAX_WINDOW_SIZE`]) is reached.
pub fn render_file_adaptive<D, E>(
    input_path: &Path,
    output_path: &Path,
    mut decoder: D,
    mut encoder: E,
    opts: &RenderOptions,
    max_window: usize,
) -> Result<RenderFileStats, IoError>
where
    D: FrameDecoder,
    E: AnimationEncoder,
{
    let max_window = max_window.min(MAX_WINDOW_SIZE);
    let mut opts = opts.clone();
    let mut attempts = 1;
    loop {
        match render_file(input_path, output_path, &mut decoder, &mut encoder, &opts) {
            Err(err) if err.is_frame_too_large() && opts.window_size < max_window => {
                let next = opts.window_size.saturating_mul(2).min(max_window);
                log::info!(
                    "frame exceeds {}-byte window, retrying with {next}",
                    opts.window_size
                );
                opts.window_size = next;
                attempts += 1;
            }
            Ok(mut stats) => {
                stats.attempts = attempts;
                return Ok(stats);
            }
            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write `bytes` to `out` and flush, returning the SHA-256 of what was
/// written when the `file-io` feature is enabled.
pub fn write_output<W: Write>(mut out: W, bytes: &[u8]) -> io::Result<Option<[u8; 32]>> {
    #[cfg(feature = "file-io")]
    {
        let mut hasher = sha2::Sha256::new();
        let mut writer = HashingWriter {
            inner: &mut out,
            hasher: &mut hasher,
        };
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(Some(hasher.finalize().into()))
    }

    #[cfg(not(feature = "file-io"))]
    {
        out.write_all(bytes)?;
        out.flush()?;
        Ok(None)
    }
}

/// Lowercase hex rendering of a digest.
pub fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
