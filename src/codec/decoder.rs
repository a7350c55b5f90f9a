// Frame decoders.
//
// Provides the `FrameDecoder` capability trait the driver decodes through,
// plus a PNG implementation (via the `png` crate, feature-gated
// `png-decoder`).
//
// A decoder is called with the stream positioned on a frame signature. It
// must consume at least its whole frame, but is free to leave trailing
// bytes behind: the demuxer rescans from wherever it stopped.

use std::io::{self, BufRead};

use crate::anim::Image;

#[cfg(feature = "png-decoder")]
use crate::stream::signature::PNG_SIGNATURE;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("truncated frame: {0}")]
    Truncated(String),
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unsupported frame: {0}")]
    Unsupported(String),
    #[cfg(feature = "png-decoder")]
    #[error("PNG decoding failed: {0}")]
    Png(#[from] png::DecodingError),
}

// ---------------------------------------------------------------------------
// FrameDecoder trait
// ---------------------------------------------------------------------------

/// Decodes exactly one image from the current stream position.
///
/// # Implementing a custom decoder
///
/// ```no_run
/// use std::io::BufRead;
/// use pngdemux::anim::Image;
/// use pngdemux::codec::decoder::{DecodeError, FrameDecoder};
///
/// struct OnePixel;
///
/// impl FrameDecoder for OnePixel {
///     fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
///         let mut px = [0u8; 4];
///         stream.read_exact(&mut px)?;
///         Ok(Image::from_rgba(1, 1, px.to_vec()))
///     }
/// }
/// ```
pub trait FrameDecoder {
    /// Short name for logs and stats.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Decode one frame.
    ///
    /// Returns `Ok(None)` when nothing decodable starts at the current
    /// position (end marker), and `Err` for a corrupt or truncated frame.
    fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError>;
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for &mut D {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
        (**self).decode_one(stream)
    }
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
        (**self).decode_one(stream)
    }
}

// ---------------------------------------------------------------------------
// PNG decoder
// ---------------------------------------------------------------------------

/// Default cap on the encoded size of a single PNG frame (64 MiB).
#[cfg(feature = "png-decoder")]
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 << 20;

#[cfg(feature = "png-decoder")]
const MAX_CHUNK_LEN: u32 = 0x7FFF_FFFF;

#[cfg(feature = "png-decoder")]
const IEND: [u8; 4] = *b"IEND";

/// PNG frame decoder.
///
/// Walks chunk framing from the signature through `IEND`, so it consumes
/// exactly one PNG, then hands those bytes to the `png` crate. Output is
/// normalised to RGBA8.
#[cfg(feature = "png-decoder")]
#[derive(Debug, Clone, Copy)]
pub struct PngDecoder {
    max_frame_bytes: usize,
}

#[cfg(feature = "png-decoder")]
impl Default for PngDecoder {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[cfg(feature = "png-decoder")]
impl PngDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject frames whose encoded size exceeds `limit` bytes.
    pub fn with_max_frame_bytes(limit: usize) -> Self {
        Self {
            max_frame_bytes: limit,
        }
    }

    /// Read one PNG (signature through `IEND`) into memory.
    ///
    /// Returns `Ok(None)` if the stream does not start with a PNG signature.
    fn read_frame_bytes(&self, stream: &mut dyn BufRead) -> Result<Option<Vec<u8>>, DecodeError> {
        let mut sig = [0u8; 8];
        match stream.read_exact(&mut sig) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        if sig != PNG_SIGNATURE {
            return Ok(None);
        }

        let mut bytes = sig.to_vec();
        loop {
            let header_at = bytes.len();
            read_exact_into(stream, &mut bytes, 8, "chunk header")?;
            let len = u32::from_be_bytes([
                bytes[header_at],
                bytes[header_at + 1],
                bytes[header_at + 2],
                bytes[header_at + 3],
            ]);
            let kind = [
                bytes[header_at + 4],
                bytes[header_at + 5],
                bytes[header_at + 6],
                bytes[header_at + 7],
            ];
            if len > MAX_CHUNK_LEN {
                return Err(DecodeError::Malformed(format!(
                    "chunk length {len} exceeds 2^31-1"
                )));
            }
            // Data plus CRC.
            let body = len as usize + 4;
            if bytes.len() + body > self.max_frame_bytes {
                return Err(DecodeError::Malformed(format!(
                    "frame exceeds {} bytes",
                    self.max_frame_bytes
                )));
            }
            read_exact_into(stream, &mut bytes, body, "chunk body")?;
            if kind == IEND {
                return Ok(Some(bytes));
            }
        }
    }
}

#[cfg(feature = "png-decoder")]
impl FrameDecoder for PngDecoder {
    fn name(&self) -> &'static str {
        "png"
    }

    fn decode_one(&mut self, stream: &mut dyn BufRead) -> Result<Option<Image>, DecodeError> {
        let Some(bytes) = self.read_frame_bytes(stream)? else {
            return Ok(None);
        };
        decode_png(bytes).map(Some)
    }
}

/// Append exactly `n` bytes from `stream` to `out`.
#[cfg(feature = "png-decoder")]
fn read_exact_into(
    stream: &mut dyn BufRead,
    out: &mut Vec<u8>,
    n: usize,
    what: &str,
) -> Result<(), DecodeError> {
    let start = out.len();
    out.resize(start + n, 0);
    stream.read_exact(&mut out[start..]).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated(format!("EOF inside {what} at frame byte {start}"))
        } else {
            DecodeError::Io(e)
        }
    })
}

/// Decode a complete in-memory PNG to RGBA8.
#[cfg(feature = "png-decoder")]
fn decode_png(bytes: Vec<u8>) -> Result<Image, DecodeError> {
    let mut decoder = png::Decoder::new(io::Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;

    let buffer_size = reader
        .output_buffer_size()
        .ok_or_else(|| DecodeError::Unsupported("cannot determine PNG output size".into()))?;
    let mut raw = vec![0u8; buffer_size];
    let info = reader.next_frame(&mut raw)?;
    raw.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(DecodeError::Unsupported(format!(
            "output bit depth {:?}",
            info.bit_depth
        )));
    }

    let rgba = match info.color_type {
        png::ColorType::Rgba => raw,
        png::ColorType::Rgb => raw
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 0xFF])
            .collect(),
        png::ColorType::GrayscaleAlpha => raw
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Grayscale => raw.iter().flat_map(|&g| [g, g, g, 0xFF]).collect(),
        png::ColorType::Indexed => {
            return Err(DecodeError::Unsupported(
                "indexed output after palette expansion".into(),
            ));
        }
    };

    Image::from_rgba(info.width, info.height, rgba).ok_or_else(|| {
        DecodeError::Malformed(format!(
            "pixel buffer does not match {}x{}",
            info.width, info.height
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, feature = "png-decoder"))]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn encode_png(width: u32, height: u32, color: png::ColorType, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(pixels).unwrap();
        writer.finish().unwrap();
        out
    }

    #[test]
    fn decodes_rgba() {
        let pixels: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        let png = encode_png(2, 2, png::ColorType::Rgba, &pixels);
        let image = PngDecoder::new()
            .decode_one(&mut Cursor::new(png))
            .unwrap()
            .unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.rgba, pixels);
    }

    #[test]
    fn expands_rgb_and_gray() {
        let rgb = encode_png(1, 1, png::ColorType::Rgb, &[10, 20, 30]);
        let image = PngDecoder::new()
            .decode_one(&mut Cursor::new(rgb))
            .unwrap()
            .unwrap();
        assert_eq!(image.rgba, vec![10, 20, 30, 255]);

        let gray = encode_png(2, 1, png::ColorType::Grayscale, &[7, 9]);
        let image = PngDecoder::new()
            .decode_one(&mut Cursor::new(gray))
            .unwrap()
            .unwrap();
        assert_eq!(image.rgba, vec![7, 7, 7, 255, 9, 9, 9, 255]);

        let ga = encode_png(1, 1, png::ColorType::GrayscaleAlpha, &[5, 128]);
        let image = PngDecoder::new()
            .decode_one(&mut Cursor::new(ga))
            .unwrap()
            .unwrap();
        assert_eq!(image.rgba, vec![5, 5, 5, 128]);
    }

    #[test]
    fn consumes_exactly_one_frame() {
        let first = encode_png(1, 1, png::ColorType::Rgba, &[1, 2, 3, 4]);
        let mut stream = first.clone();
        stream.extend_from_slice(b"NEXT");
        let mut cursor = Cursor::new(stream);
        PngDecoder::new().decode_one(&mut cursor).unwrap().unwrap();
        assert_eq!(cursor.position(), first.len() as u64);
        let mut rest = String::new();
        cursor.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "NEXT");
    }

    #[test]
    fn end_marker_for_empty_or_foreign_bytes() {
        let mut dec = PngDecoder::new();
        assert!(dec.decode_one(&mut Cursor::new(Vec::new())).unwrap().is_none());
        assert!(dec.decode_one(&mut Cursor::new(b"GIF89a..".to_vec())).unwrap().is_none());
        assert!(dec.decode_one(&mut Cursor::new(PNG_SIGNATURE[..5].to_vec())).unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let png = encode_png(1, 1, png::ColorType::Rgba, &[1, 2, 3, 4]);
        let cut = png[..png.len() - 6].to_vec();
        let err = PngDecoder::new()
            .decode_one(&mut Cursor::new(cut))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Truncated(_)), "{err}");
    }

    #[test]
    fn frame_limit_is_enforced() {
        let png = encode_png(4, 4, png::ColorType::Rgba, &[0; 64]);
        let err = PngDecoder::with_max_frame_bytes(32)
            .decode_one(&mut Cursor::new(png))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)), "{err}");
    }

    #[test]
    fn corrupt_payload_reports_png_error() {
        let mut png = encode_png(2, 2, png::ColorType::Rgba, &[9; 16]);
        // Flip a byte inside the IHDR data so its CRC no longer matches.
        png[17] ^= 0xFF;
        let err = PngDecoder::new()
            .decode_one(&mut Cursor::new(png))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Png(_)), "{err}");
    }
}
