// Animation encoders.
//
// Provides the `AnimationEncoder` capability trait that turns a finished
// `AnimationSequence` into an output container, plus an animated GIF
// implementation (via the `gif` crate, feature-gated `gif-encoder`).
//
// Encoders write their container in one pass at the end of a run. An empty
// sequence is rejected with its own error variant so callers can tell "no
// frames found" apart from a failing sink.

use std::io::{self, Write};

use crate::anim::AnimationSequence;

#[cfg(feature = "gif-encoder")]
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("animation has no frames")]
    EmptySequence,
    #[error("frame {index} is {width}x{height}, larger than the container allows")]
    FrameTooLarge { index: u64, width: u32, height: u32 },
    #[error("frame {index}: pixel buffer does not match its dimensions")]
    InvalidFrame { index: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "gif-encoder")]
    #[error("GIF encoding failed: {0}")]
    Gif(gif::EncodingError),
}

#[cfg(feature = "gif-encoder")]
impl From<gif::EncodingError> for EncodeError {
    fn from(e: gif::EncodingError) -> Self {
        match e {
            gif::EncodingError::Io(e) => Self::Io(e),
            other => Self::Gif(other),
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationEncoder trait
// ---------------------------------------------------------------------------

/// Serialises a finished animation.
pub trait AnimationEncoder {
    /// Short name for logs and stats.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Write `sequence` to `out` as one complete container.
    fn encode(
        &mut self,
        sequence: &AnimationSequence,
        out: &mut dyn Write,
    ) -> Result<(), EncodeError>;
}

impl<E: AnimationEncoder + ?Sized> AnimationEncoder for &mut E {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode(
        &mut self,
        sequence: &AnimationSequence,
        out: &mut dyn Write,
    ) -> Result<(), EncodeError> {
        (**self).encode(sequence, out)
    }
}

impl<E: AnimationEncoder + ?Sized> AnimationEncoder for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode(
        &mut self,
        sequence: &AnimationSequence,
        out: &mut dyn Write,
    ) -> Result<(), EncodeError> {
        (**self).encode(sequence, out)
    }
}

// ---------------------------------------------------------------------------
// GIF encoder
// ---------------------------------------------------------------------------

/// Default NeuQuant sampling speed (1 = best quality, 30 = fastest).
#[cfg(feature = "gif-encoder")]
pub const DEFAULT_GIF_SPEED: i32 = 10;

/// Animated GIF encoder.
///
/// The canvas is the largest frame extent; every frame is drawn at the
/// origin with background disposal. True-colour frames are quantised per
/// frame by the `gif` crate.
#[cfg(feature = "gif-encoder")]
#[derive(Debug, Clone, Copy)]
pub struct GifEncoder {
    speed: i32,
}

#[cfg(feature = "gif-encoder")]
impl Default for GifEncoder {
    fn default() -> Self {
        Self {
            speed: DEFAULT_GIF_SPEED,
        }
    }
}

#[cfg(feature = "gif-encoder")]
impl GifEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantisation speed, clamped to 1..=30.
    pub fn with_speed(speed: i32) -> Self {
        Self {
            speed: speed.clamp(1, 30),
        }
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }
}

#[cfg(feature = "gif-encoder")]
impl AnimationEncoder for GifEncoder {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn encode(
        &mut self,
        sequence: &AnimationSequence,
        out: &mut dyn Write,
    ) -> Result<(), EncodeError> {
        if sequence.is_empty() {
            return Err(EncodeError::EmptySequence);
        }

        // Validate every frame before writing anything.
        let mut dims = Vec::with_capacity(sequence.len());
        for frame in sequence.frames() {
            let image = &frame.image;
            let too_large = || EncodeError::FrameTooLarge {
                index: frame.index,
                width: image.width,
                height: image.height,
            };
            let w = u16::try_from(image.width).map_err(|_| too_large())?;
            let h = u16::try_from(image.height).map_err(|_| too_large())?;
            if image.rgba.len() != w as usize * h as usize * 4 {
                return Err(EncodeError::InvalidFrame { index: frame.index });
            }
            dims.push((w, h));
        }
        let (canvas_w, canvas_h) = dims
            .iter()
            .fold((0u16, 0u16), |(cw, ch), &(w, h)| (cw.max(w), ch.max(h)));

        let config = sequence.config();
        let delay = delay_centis(config.delay);
        let repeat = match config.loop_count {
            0 => gif::Repeat::Infinite,
            n => gif::Repeat::Finite(n),
        };

        let mut encoder = gif::Encoder::new(out, canvas_w, canvas_h, &[])?;
        encoder.set_repeat(repeat)?;

        for (frame, &(w, h)) in sequence.frames().iter().zip(&dims) {
            let mut pixels = frame.image.rgba.clone();
            let mut gif_frame = gif::Frame::from_rgba_speed(w, h, &mut pixels, self.speed);
            gif_frame.delay = delay;
            gif_frame.dispose = gif::DisposalMethod::Background;
            encoder.write_frame(&gif_frame)?;
            log::trace!("encoded frame {} ({w}x{h})", frame.index);
        }

        // Writes the trailer.
        encoder.into_inner()?;
        Ok(())
    }
}

/// Convert a frame delay to GIF centiseconds, rounded, in `1..=u16::MAX`.
#[cfg(feature = "gif-encoder")]
pub fn delay_centis(delay: Duration) -> u16 {
    let centis = (delay.as_millis() + 5) / 10;
    centis.clamp(1, u16::MAX as u128) as u16
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, feature = "gif-encoder"))]
mod tests {
    use super::*;
    use crate::anim::{AnimationAssembler, AnimationConfig, Image};
    use std::io::Cursor;

    fn sequence(sizes: &[(u32, u32)], config: AnimationConfig) -> AnimationSequence {
        let mut asm = AnimationAssembler::new();
        for (i, &(w, h)) in sizes.iter().enumerate() {
            let rgba = vec![(i * 40) as u8; (w * h * 4) as usize];
            asm.append(Image::from_rgba(w, h, rgba).unwrap(), i as u64 * 100);
        }
        asm.finish(config)
    }

    /// Loop count from the NETSCAPE2.0 application extension.
    fn netscape_loops(gif: &[u8]) -> Option<u16> {
        let tag = b"NETSCAPE2.0\x03\x01";
        let at = gif.windows(tag.len()).position(|w| w == tag)? + tag.len();
        Some(u16::from_le_bytes([gif[at], gif[at + 1]]))
    }

    fn encode(seq: &AnimationSequence) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        GifEncoder::new().encode(seq, &mut out)?;
        Ok(out)
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let seq = sequence(&[], AnimationConfig::default());
        assert!(matches!(encode(&seq), Err(EncodeError::EmptySequence)));
    }

    #[test]
    fn writes_all_frames_with_timing() {
        let config = AnimationConfig {
            delay: Duration::from_millis(250),
            loop_count: 3,
        };
        let seq = sequence(&[(4, 4), (6, 2), (4, 4)], config);
        let bytes = encode(&seq).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));

        let mut opts = gif::DecodeOptions::new();
        opts.set_color_output(gif::ColorOutput::RGBA);
        let mut dec = opts.read_info(Cursor::new(&bytes)).unwrap();
        assert_eq!((dec.width(), dec.height()), (6, 4));
        let mut delays = Vec::new();
        while let Some(frame) = dec.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        assert_eq!(delays, vec![25, 25, 25]);
        assert_eq!(netscape_loops(&bytes), Some(3));
    }

    #[test]
    fn infinite_loop_by_default() {
        let seq = sequence(&[(2, 2)], AnimationConfig::default());
        let bytes = encode(&seq).unwrap();
        assert_eq!(netscape_loops(&bytes), Some(0));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut asm = AnimationAssembler::new();
        asm.append(
            Image {
                width: 70_000,
                height: 1,
                rgba: Vec::new(),
            },
            0,
        );
        let seq = asm.finish(AnimationConfig::default());
        assert!(matches!(
            encode(&seq),
            Err(EncodeError::FrameTooLarge {
                index: 0,
                width: 70_000,
                ..
            })
        ));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut asm = AnimationAssembler::new();
        asm.append(
            Image {
                width: 2,
                height: 2,
                rgba: vec![0; 3],
            },
            0,
        );
        let seq = asm.finish(AnimationConfig::default());
        assert!(matches!(
            encode(&seq),
            Err(EncodeError::InvalidFrame { index: 0 })
        ));
    }

    #[test]
    fn delay_rounding_and_clamping() {
        assert_eq!(delay_centis(Duration::ZERO), 1);
        assert_eq!(delay_centis(Duration::from_millis(14)), 1);
        assert_eq!(delay_centis(Duration::from_millis(15)), 2);
        assert_eq!(delay_centis(Duration::from_millis(100)), 10);
        assert_eq!(delay_centis(Duration::from_secs(10_000)), u16::MAX);
    }

    #[test]
    fn speed_is_clamped() {
        assert_eq!(GifEncoder::with_speed(0).speed(), 1);
        assert_eq!(GifEncoder::with_speed(99).speed(), 30);
    }
}
