// Animation assembly.
//
// Decoded images are appended in arrival order and frozen into an
// `AnimationSequence` together with an immutable timing/loop configuration.
// The sequence is what an `AnimationEncoder` consumes.

use std::time::Duration;

/// Default delay between frames.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Image / Frame
// ---------------------------------------------------------------------------

/// A decoded image as tightly packed RGBA8 rows.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl Image {
    /// Wrap RGBA8 pixels. Returns `None` if the buffer length does not
    /// match the dimensions.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (rgba.len() == expected).then_some(Self {
            width,
            height,
            rgba,
        })
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// One decoded image and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based emission order.
    pub index: u64,
    /// Absolute stream offset of the frame's signature.
    pub offset: u64,
    pub image: Image,
}

// ---------------------------------------------------------------------------
// Configuration / sequence
// ---------------------------------------------------------------------------

/// Sequence-level timing and looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationConfig {
    /// Delay applied uniformly to every frame.
    pub delay: Duration,
    /// Number of loops; 0 means loop forever.
    pub loop_count: u16,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            loop_count: 0,
        }
    }
}

/// Ordered frames plus their animation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationSequence {
    frames: Vec<Frame>,
    config: AnimationConfig,
}

impl AnimationSequence {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Largest frame width and height, or `(0, 0)` when empty.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.frames.iter().fold((0, 0), |(w, h), f| {
            (w.max(f.image.width), h.max(f.image.height))
        })
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

// ---------------------------------------------------------------------------
// AnimationAssembler
// ---------------------------------------------------------------------------

/// Collects frames in arrival order.
#[derive(Debug, Default)]
pub struct AnimationAssembler {
    frames: Vec<Frame>,
}

impl AnimationAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded image found at stream `offset`, assigning it the
    /// next index.
    pub fn append(&mut self, image: Image, offset: u64) -> &Frame {
        let index = self.frames.len() as u64;
        self.frames.push(Frame {
            index,
            offset,
            image,
        });
        &self.frames[self.frames.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Freeze the frames into a sequence with `config`.
    pub fn finish(self, config: AnimationConfig) -> AnimationSequence {
        AnimationSequence {
            frames: self.frames,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
