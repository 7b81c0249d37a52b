use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    artifacts::{artifact_name, ensure_dir, list_artifacts},
    colorize::Colorizer,
    error::{RechromaError, RechromaResult},
    format::{FrameIndex, VideoFormat},
    plane::{expand_luma, extract_luma, synthesize_frame},
    stream::{DestStream, SourceStream},
};

/// Shared cancellation flag for the colorize phase.
///
/// Cancelling stops new collaborator calls from being issued; calls already in
/// flight complete and their results are discarded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What to do when the collaborator fails on a single frame.
///
/// An index is never skipped: either the whole run aborts or a substitute frame
/// takes its place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First collaborator failure aborts the run.
    #[default]
    Abort,
    /// Substitute the original gray frame expanded to three channels.
    LumaFallback,
}

/// Controls for the colorize phase.
#[derive(Clone, Debug, Default)]
pub struct ColorizeOptions {
    /// Per-frame failure handling.
    pub policy: FailurePolicy,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
    /// Cooperative cancellation flag.
    pub cancel: CancelToken,
}

/// Counters for the colorize phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorizeStats {
    /// Frames colorized by the collaborator.
    pub frames_colorized: u64,
    /// Frames substituted under [`FailurePolicy::LumaFallback`].
    pub frames_fallback: u64,
}

/// Aggregated counters for a full pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_decomposed: u64,
    pub frames_colorized: u64,
    pub frames_fallback: u64,
    pub frames_recomposed: u64,
}

/// Phase 1: split the source stream into numbered grayscale artifacts.
///
/// Reads frames `0..min(stream frames, limit)` in order and writes one
/// `frame_{n}.png` per frame into `frames_dir`. Any read or format error aborts
/// here, before any collaborator call is issued.
pub fn decompose(
    source: &mut SourceStream,
    frames_dir: &Path,
    limit: Option<u64>,
) -> RechromaResult<u64> {
    ensure_dir(frames_dir)?;

    let available = source.frame_count()?;
    let count = limit.map_or(available, |l| l.min(available));
    info!(frames = count, dir = %frames_dir.display(), "decomposing source stream");

    for i in 0..count {
        let index = FrameIndex(i);
        let frame = source.read_frame(index)?;
        let luma = extract_luma(&frame, source.format())?;
        let path = frames_dir.join(artifact_name(index));
        luma.save(&path).map_err(|e| {
            RechromaError::io(format!(
                "failed to write luma artifact '{}': {e}",
                path.display()
            ))
        })?;
        debug!(frame = i, "wrote luma artifact");
    }

    Ok(count)
}

/// Phase 2: colorize every frame artifact through the collaborator.
///
/// Frames fan out over a bounded worker pool; there is no cross-frame
/// dependency, and output artifacts keep their input's frame number, so
/// completion order does not matter. Each output lands in `colorized_dir` under
/// the same `frame_{n}.png` name.
pub fn colorize_frames(
    frames_dir: &Path,
    colorized_dir: &Path,
    colorizer: &dyn Colorizer,
    opts: &ColorizeOptions,
) -> RechromaResult<ColorizeStats> {
    ensure_dir(colorized_dir)?;

    let artifacts = list_artifacts(frames_dir)?;
    info!(frames = artifacts.len(), "colorizing frame artifacts");

    let pool = build_worker_pool(opts.threads)?;
    let results: Vec<RechromaResult<bool>> = pool.install(|| {
        artifacts
            .par_iter()
            .map(|(number, path)| colorize_one(*number, path, colorized_dir, colorizer, opts))
            .collect()
    });

    if opts.cancel.is_cancelled() {
        return Err(RechromaError::cancelled(
            "colorize phase cancelled; completed frames discarded",
        ));
    }

    let mut stats = ColorizeStats::default();
    for fallback in results {
        if fallback? {
            stats.frames_fallback += 1;
        } else {
            stats.frames_colorized += 1;
        }
    }
    Ok(stats)
}

fn colorize_one(
    number: u64,
    path: &Path,
    colorized_dir: &Path,
    colorizer: &dyn Colorizer,
    opts: &ColorizeOptions,
) -> RechromaResult<bool> {
    if opts.cancel.is_cancelled() {
        return Err(RechromaError::cancelled(format!("frame {number} not issued")));
    }

    let luma = image::open(path)
        .map_err(|e| {
            RechromaError::io(format!("failed to read artifact '{}': {e}", path.display()))
        })?
        .to_luma8();

    let (colored, fallback) = match colorizer.colorize(&luma) {
        Ok(colored) => (colored, false),
        Err(RechromaError::Colorizer(msg)) if opts.policy == FailurePolicy::LumaFallback => {
            debug!(frame = number, error = %msg, "substituting gray fallback");
            (expand_luma(&luma), true)
        }
        Err(e) => return Err(e),
    };

    let out = colorized_dir.join(format!("frame_{number}.png"));
    colored.save(&out).map_err(|e| {
        RechromaError::io(format!(
            "failed to write colorized artifact '{}': {e}",
            out.display()
        ))
    })?;
    Ok(fallback)
}

/// Phase 3: reassemble colorized artifacts into the destination stream.
///
/// The numbered set must be total and contiguous (`1..=expected`, or `1..=len`
/// when `expected` is `None`); that is verified before the destination file is
/// created, so a gap writes zero frames. Artifacts are then packed and appended
/// in ascending numeric order.
pub fn recompose(
    colorized_dir: &Path,
    dest_path: &Path,
    format: VideoFormat,
    expected: Option<u64>,
) -> RechromaResult<u64> {
    let artifacts = list_artifacts(colorized_dir)?;
    let expected = expected.unwrap_or(artifacts.len() as u64);
    verify_contiguous(&artifacts, expected, colorized_dir)?;

    let mut dest = DestStream::create(dest_path, format)?;
    for (_, path) in artifacts.iter().take(expected as usize) {
        let colored = image::open(path)
            .map_err(|e| {
                RechromaError::io(format!(
                    "failed to read colorized artifact '{}': {e}",
                    path.display()
                ))
            })?
            .to_rgb8();
        let frame = synthesize_frame(&colored, format)?;
        dest.append_frame(&frame)?;
    }

    let written = dest.finish()?;
    info!(frames = written, path = %dest_path.display(), "recomposed destination stream");
    Ok(written)
}

fn verify_contiguous(artifacts: &[(u64, PathBuf)], expected: u64, dir: &Path) -> RechromaResult<()> {
    for (i, want) in (1..=expected).enumerate() {
        match artifacts.get(i) {
            Some((n, _)) if *n == want => {}
            _ => {
                return Err(RechromaError::consistency(format!(
                    "frame {want} missing from '{}' ({} of {expected} artifacts present)",
                    dir.display(),
                    artifacts.len()
                )));
            }
        }
    }
    Ok(())
}

/// Full pipeline description, usually deserialized from a JSON job file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Job {
    /// Raw 4:2:0 source stream.
    pub source: PathBuf,
    /// Raw 4:2:0 destination stream.
    pub output: PathBuf,
    /// Directory for grayscale frame artifacts.
    pub frames_dir: PathBuf,
    /// Directory for colorized frame artifacts.
    pub colorized_dir: PathBuf,
    /// Canonical width in pixels.
    pub width: u32,
    /// Canonical height in pixels.
    pub height: u32,
    /// Source frame rate, used with `duration_secs` to bound the frame count.
    pub fps: u32,
    /// Optional duration bound in seconds.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    /// Optional explicit frame count bound; wins over `duration_secs`.
    #[serde(default)]
    pub frame_count: Option<u64>,
    /// External colorize command template with `{input}`/`{output}` placeholders.
    #[serde(default)]
    pub colorize_cmd: Option<String>,
    /// Per-frame failure handling.
    #[serde(default)]
    pub on_error: FailurePolicy,
    /// Optional explicit worker thread count for the colorize phase.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Job {
    pub fn format(&self) -> RechromaResult<VideoFormat> {
        VideoFormat::new(self.width, self.height)
    }

    /// Frame bound: explicit count, else `fps * duration`, else the whole stream.
    pub fn frame_limit(&self) -> Option<u64> {
        self.frame_count.or_else(|| {
            self.duration_secs
                .map(|secs| (f64::from(self.fps) * secs).floor().max(0.0) as u64)
        })
    }
}

/// Run all three phases for one job.
///
/// Phases execute strictly in sequence; no phase starts before the prior one
/// has materialized its full output set. A fatal error may leave a partial
/// destination file behind but always surfaces as `Err`.
pub fn run_job(job: &Job, colorizer: &dyn Colorizer) -> RechromaResult<PipelineStats> {
    let format = job.format()?;

    let mut source = SourceStream::open(&job.source, format)?;
    let frames_decomposed = decompose(&mut source, &job.frames_dir, job.frame_limit())?;

    let opts = ColorizeOptions {
        policy: job.on_error,
        threads: job.threads,
        cancel: CancelToken::new(),
    };
    let colorize_stats = colorize_frames(&job.frames_dir, &job.colorized_dir, colorizer, &opts)?;

    let frames_recomposed = recompose(
        &job.colorized_dir,
        &job.output,
        format,
        Some(frames_decomposed),
    )?;

    Ok(PipelineStats {
        frames_decomposed,
        frames_colorized: colorize_stats.frames_colorized,
        frames_fallback: colorize_stats.frames_fallback,
        frames_recomposed,
    })
}

fn build_worker_pool(threads: Option<usize>) -> RechromaResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(RechromaError::format(
            "colorize 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| RechromaError::colorizer(format!("failed to build worker pool: {e}")))
}
