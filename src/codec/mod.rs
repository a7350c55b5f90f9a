// Frame codecs: per-frame image decoding and whole-animation encoding.
//
// # Modules
//
// - `decoder`: FrameDecoder trait and the PNG implementation
// - `encoder`: AnimationEncoder trait and the animated GIF implementation

pub mod decoder;
pub mod encoder;

pub use decoder::{DecodeError, FrameDecoder};
pub use encoder::{AnimationEncoder, EncodeError};

#[cfg(feature = "png-decoder")]
pub use decoder::PngDecoder;
#[cfg(feature = "gif-encoder")]
pub use encoder::GifEncoder;
