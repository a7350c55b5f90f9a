#![no_main]
use libfuzzer_sys::fuzz_target;
use pngdemux::codec::{GifEncoder, PngDecoder};
use pngdemux::engine::{self, RenderOptions};

// Arbitrary bytes must render or fail with an error, never panic.
fuzz_target!(|data: &[u8]| {
    let opts = RenderOptions {
        salvage_partial: true,
        ..Default::default()
    };
    let mut out = Vec::new();
    let _ = engine::render(
        data,
        &mut out,
        PngDecoder::with_max_frame_bytes(1 << 20),
        GifEncoder::with_speed(30),
        &opts,
    );
});
