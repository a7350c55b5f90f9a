// Stream framing: recovering frame boundaries from a self-delimiting stream.
//
// # Modules
//
// - `signature`: Frame signatures and the leftmost-match scanner
// - `lookahead`: Bounded lookahead reader with mark/reset
// - `demux`:     StreamDemuxer: scan, rewind and position per frame

pub mod demux;
pub mod lookahead;
pub mod signature;

// Re-export key types for convenience.
pub use demux::{ScanOutcome, StreamDemuxer};
pub use lookahead::{DEFAULT_WINDOW_SIZE, LookaheadReader};
pub use signature::{PNG_SIGNATURE, Signature, SignatureError, find_signature};
