use std::{
    path::PathBuf,
    process::Command,
    sync::atomic::{AtomicU64, Ordering},
};

use image::{GrayImage, RgbImage};
use tracing::debug;

use crate::{
    error::{RechromaError, RechromaResult},
    plane::expand_luma,
};

/// External colorization collaborator.
///
/// One call per frame. The returned image may have any spatial size; the
/// pipeline resizes to the canonical resolution during recomposition. The
/// pipeline does not depend on whether an implementation runs in-process or
/// shells out.
pub trait Colorizer: Send + Sync {
    fn colorize(&self, luma: &GrayImage) -> RechromaResult<RgbImage>;
}

/// Identity collaborator: gray replicated into three equal channels.
///
/// Used in tests and as the source of the gray fallback policy.
#[derive(Debug, Default)]
pub struct LumaExpandColorizer;

impl Colorizer for LumaExpandColorizer {
    fn colorize(&self, luma: &GrayImage) -> RechromaResult<RgbImage> {
        Ok(expand_luma(luma))
    }
}

/// Collaborator that spawns one external command per frame.
///
/// `{input}` and `{output}` placeholders in the argument list are substituted
/// with scratch PNG paths; the command reads the grayscale input and must write
/// a color image at the output path.
pub struct CommandColorizer {
    program: String,
    args: Vec<String>,
}

impl CommandColorizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command template, program first.
    pub fn from_template(template: &str) -> RechromaResult<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            RechromaError::colorizer("colorize command template must not be empty")
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Colorizer for CommandColorizer {
    fn colorize(&self, luma: &GrayImage) -> RechromaResult<RgbImage> {
        let (in_path, out_path) = scratch_paths();
        let _in_guard = TempFileGuard(Some(in_path.clone()));
        let _out_guard = TempFileGuard(Some(out_path.clone()));

        luma.save(&in_path).map_err(|e| {
            RechromaError::io(format!(
                "failed to write colorizer input '{}': {e}",
                in_path.display()
            ))
        })?;

        let in_str = in_path.display().to_string();
        let out_str = out_path.display().to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{input}", &in_str).replace("{output}", &out_str))
            .collect();

        debug!(program = %self.program, "invoking colorizer command");
        let out = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                RechromaError::colorizer(format!("failed to run '{}': {e}", self.program))
            })?;

        if !out.status.success() {
            return Err(RechromaError::colorizer(format!(
                "'{}' exited with status {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let colored = image::open(&out_path).map_err(|e| {
            RechromaError::colorizer(format!(
                "'{}' produced no readable output at '{}': {e}",
                self.program,
                out_path.display()
            ))
        })?;
        Ok(colored.to_rgb8())
    }
}

// Scratch names must be unique across concurrent per-frame calls within one
// process, hence the sequence number on top of pid.
fn scratch_paths() -> (PathBuf, PathBuf) {
    static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    let pid = std::process::id();
    (
        base.join(format!("rechroma_in_{pid}_{seq}.png")),
        base.join(format!("rechroma_out_{pid}_{seq}.png")),
    )
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
