#![forbid(unsafe_code)]

//! Frame-accurate colorization pipeline for raw 4:2:0 planar video streams.
//!
//! A source elementary stream is split into numbered grayscale frame
//! artifacts, each artifact is colorized by an external collaborator, and the
//! colorized set is packed back into a destination stream of the original
//! format, preserving strict frame order end to end.

pub mod artifacts;
pub mod colorize;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod plane;
pub mod stream;

pub use colorize::{Colorizer, CommandColorizer, LumaExpandColorizer};
pub use error::{RechromaError, RechromaResult};
pub use format::{FrameIndex, VideoFormat};
pub use pipeline::{
    CancelToken, ColorizeOptions, ColorizeStats, FailurePolicy, Job, PipelineStats,
    colorize_frames, decompose, recompose, run_job,
};
pub use plane::{expand_luma, extract_luma, synthesize_frame};
pub use stream::{DestStream, SourceStream};
