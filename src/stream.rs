use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::{RechromaError, RechromaResult},
    format::{FrameIndex, VideoFormat},
};

/// Read-only handle over a raw elementary stream.
///
/// The file is never mutated. Its length is not required to be a whole number
/// of frames; trailing bytes that do not fill a frame are ignored.
#[derive(Debug)]
pub struct SourceStream {
    path: PathBuf,
    file: File,
    format: VideoFormat,
}

impl SourceStream {
    pub fn open(path: impl AsRef<Path>, format: VideoFormat) -> RechromaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            RechromaError::io(format!("failed to open source '{}': {e}", path.display()))
        })?;
        debug!(path = %path.display(), ?format, "opened source stream");
        Ok(Self { path, file, format })
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Whole frames available: `floor(file_len / frame_bytes)`.
    ///
    /// Queried from file metadata on each call so a stream growing behind the
    /// handle yields newly completed frames.
    pub fn frame_count(&self) -> RechromaResult<u64> {
        let meta = self.file.metadata().map_err(|e| {
            RechromaError::io(format!(
                "failed to stat source '{}': {e}",
                self.path.display()
            ))
        })?;
        Ok(meta.len() / self.format.frame_bytes() as u64)
    }

    /// Seek to `index * frame_bytes` and read exactly one frame.
    ///
    /// A short read means the index is past the end of the stream or the file
    /// was truncated mid-read; both are hard errors, never a partial frame.
    pub fn read_frame(&mut self, index: FrameIndex) -> RechromaResult<Vec<u8>> {
        let frame_bytes = self.format.frame_bytes();
        let offset = index.0 * frame_bytes as u64;

        self.file.seek(SeekFrom::Start(offset)).map_err(|e| {
            RechromaError::io(format!(
                "failed to seek to frame {} in '{}': {e}",
                index.0,
                self.path.display()
            ))
        })?;

        let mut frame = vec![0u8; frame_bytes];
        match self.file.read_exact(&mut frame) {
            Ok(()) => Ok(frame),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(RechromaError::format(format!(
                    "short read at frame {} in '{}' (stream holds {} whole frames)",
                    index.0,
                    self.path.display(),
                    self.frame_count()?
                )))
            }
            Err(e) => Err(RechromaError::io(format!(
                "failed to read frame {} from '{}': {e}",
                index.0,
                self.path.display()
            ))),
        }
    }
}

/// Append-only handle over a destination stream.
///
/// Ordering contract: `append_frame` is called in strictly increasing frame
/// index order (0, 1, 2, ...). The handle does not reorder or buffer
/// out-of-order writes.
pub struct DestStream {
    path: PathBuf,
    file: File,
    format: VideoFormat,
    frames_written: u64,
}

impl DestStream {
    /// Create or truncate the destination file.
    pub fn create(path: impl AsRef<Path>, format: VideoFormat) -> RechromaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                RechromaError::io(format!(
                    "failed to create destination '{}': {e}",
                    path.display()
                ))
            })?;
        debug!(path = %path.display(), ?format, "created destination stream");
        Ok(Self {
            path,
            file,
            format,
            frames_written: 0,
        })
    }

    /// Write one whole frame verbatim at the current end of file.
    pub fn append_frame(&mut self, frame: &[u8]) -> RechromaResult<()> {
        let expected = self.format.frame_bytes();
        if frame.len() != expected {
            return Err(RechromaError::format(format!(
                "frame size mismatch: got {} bytes, expected {expected}",
                frame.len()
            )));
        }

        self.file.write_all(frame).map_err(|e| {
            RechromaError::io(format!(
                "failed to append frame {} to '{}': {e}",
                self.frames_written,
                self.path.display()
            ))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush buffered writes to the file.
    pub fn finish(mut self) -> RechromaResult<u64> {
        self.file.flush().map_err(|e| {
            RechromaError::io(format!(
                "failed to flush destination '{}': {e}",
                self.path.display()
            ))
        })?;
        Ok(self.frames_written)
    }
}
