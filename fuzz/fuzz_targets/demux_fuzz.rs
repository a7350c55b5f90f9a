#![no_main]
use libfuzzer_sys::fuzz_target;
use pngdemux::stream::{ScanOutcome, Signature, StreamDemuxer};

// First byte picks the window; the rest is the stream. Every located frame
// must sit on a signature and offsets must strictly increase.
fuzz_target!(|data: &[u8]| {
    let Some((&w, stream)) = data.split_first() else {
        return;
    };
    let window = 2 + w as usize;
    let signature = Signature::new(b"\x89P").unwrap();
    let mut demuxer = StreamDemuxer::new(stream, signature, window);
    let mut last: Option<u64> = None;
    loop {
        match demuxer.next_frame() {
            Ok(ScanOutcome::FrameReady { offset, .. }) => {
                let at = offset as usize;
                assert_eq!(&stream[at..at + 2], b"\x89P");
                assert!(last.is_none_or(|prev| offset > prev));
                last = Some(offset);
                // Consume one byte, as a decoder that gives up early would.
                let _ = demuxer.stream().skip(1);
            }
            Ok(ScanOutcome::EndOfStream { .. }) | Ok(ScanOutcome::WindowExhausted { .. }) => break,
            Err(_) => break,
        }
    }
});
