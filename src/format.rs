use crate::error::{RechromaError, RechromaResult};

/// Absolute 0-based frame index in stream space.
///
/// All seek arithmetic and APIs are 0-based; artifact filenames display
/// `index + 1` (see [`crate::artifacts`]).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// 1-based number used in artifact filenames.
    pub fn display_number(self) -> u64 {
        self.0 + 1
    }
}

/// Immutable descriptor of a raw 4:2:0 planar stream.
///
/// A frame is laid out as a full-resolution Y plane followed by U and V planes
/// at half width and half height each (I420). Format parameters are supplied
/// out-of-band; the stream itself carries no header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoFormat {
    /// Width in pixels, even and non-zero.
    pub width: u32,
    /// Height in pixels, even and non-zero.
    pub height: u32,
}

impl VideoFormat {
    /// Create a validated format.
    ///
    /// Both dimensions must be non-zero and even (4:2:0 stores one chroma pair
    /// per 2x2 pixel block).
    pub fn new(width: u32, height: u32) -> RechromaResult<Self> {
        if width == 0 || height == 0 {
            return Err(RechromaError::format(
                "video width/height must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(RechromaError::format(format!(
                "video width/height must be even for 4:2:0 (got {width}x{height})"
            )));
        }
        Ok(Self { width, height })
    }

    /// Size of the Y plane in bytes (`width * height`).
    pub fn luma_bytes(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Combined size of the U and V planes in bytes (`luma_bytes / 2`).
    pub fn chroma_bytes(self) -> usize {
        self.luma_bytes() / 2
    }

    /// Size of one whole frame in bytes (`luma_bytes * 3 / 2`).
    ///
    /// Exact because both dimensions are even.
    pub fn frame_bytes(self) -> usize {
        self.luma_bytes() + self.chroma_bytes()
    }
}
