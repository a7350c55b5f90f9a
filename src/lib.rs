//! pngdemux: recover frames from a stream of back-to-back PNG images and
//! assemble them into an animation.
//!
//! The stream carries no frame count, length prefix or separator; each
//! image's own signature is the only boundary marker. The crate provides:
//! - Stream framing: signature scanning, a bounded lookahead reader and the
//!   demuxer that positions the stream on each frame (`stream`)
//! - Pluggable frame decoders and animation encoders (`codec`)
//! - Frame assembly (`anim`) and the driver state machine (`engine`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::fs::File;
//! use pngdemux::codec::{GifEncoder, PngDecoder};
//! use pngdemux::engine::{self, RenderOptions};
//!
//! let input = File::open("frames.bin").unwrap();
//! let mut output = File::create("frames.gif").unwrap();
//! let stats = engine::render(
//!     input,
//!     &mut output,
//!     PngDecoder::new(),
//!     GifEncoder::new(),
//!     &RenderOptions::default(),
//! )
//! .unwrap();
//! println!("{} frames", stats.frames);
//! ```

pub mod anim;
pub mod codec;
pub mod engine;
pub mod io;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;
