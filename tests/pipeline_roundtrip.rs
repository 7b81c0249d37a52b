use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};

use rechroma::{
    CancelToken, ColorizeOptions, Colorizer, FailurePolicy, FrameIndex, Job, LumaExpandColorizer,
    RechromaError, RechromaResult, SourceStream, VideoFormat, colorize_frames, decompose,
    expand_luma, recompose, run_job,
};

fn scratch_root(tag: &str) -> PathBuf {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let root = std::env::temp_dir().join(format!(
        "rechroma_pipeline_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&root).unwrap();
    root
}

/// One frame per luma value: Y plane filled with the value, chroma neutral.
fn gray_stream(format: VideoFormat, luma_values: &[u8]) -> Vec<u8> {
    let mut stream = Vec::with_capacity(luma_values.len() * format.frame_bytes());
    for &v in luma_values {
        stream.extend(std::iter::repeat_n(v, format.luma_bytes()));
        stream.extend(std::iter::repeat_n(128u8, format.chroma_bytes()));
    }
    stream
}

struct FailOnLuma(u8);

impl Colorizer for FailOnLuma {
    fn colorize(&self, luma: &GrayImage) -> RechromaResult<RgbImage> {
        if luma.get_pixel(0, 0).0[0] == self.0 {
            return Err(RechromaError::colorizer("synthetic per-frame failure"));
        }
        Ok(expand_luma(luma))
    }
}

fn run_phases(
    root: &Path,
    format: VideoFormat,
    luma_values: &[u8],
    colorizer: &dyn Colorizer,
    opts: &ColorizeOptions,
) -> RechromaResult<PathBuf> {
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, luma_values)).unwrap();

    let mut source = SourceStream::open(&source_path, format)?;
    let count = decompose(&mut source, &root.join("frames"), None)?;
    colorize_frames(&root.join("frames"), &root.join("colorized"), colorizer, opts)?;

    let dest_path = root.join("dest.yuv");
    recompose(&root.join("colorized"), &dest_path, format, Some(count))?;
    Ok(dest_path)
}

#[test]
fn identity_colorizer_round_trips_byte_identical() {
    let root = scratch_root("identity");
    let format = VideoFormat::new(4, 2).unwrap();
    assert_eq!(format.frame_bytes(), 12);

    let dest = run_phases(
        &root,
        format,
        &[10, 20, 30],
        &LumaExpandColorizer,
        &ColorizeOptions::default(),
    )
    .unwrap();

    let source_bytes = std::fs::read(root.join("source.yuv")).unwrap();
    let dest_bytes = std::fs::read(dest).unwrap();
    assert_eq!(source_bytes, dest_bytes);
}

#[test]
fn frame_order_survives_past_ten_frames() {
    // Twelve frames force two-digit artifact numbers; a lexicographic sort
    // would put frame_10 between frame_1 and frame_2.
    let root = scratch_root("ordering");
    let format = VideoFormat::new(4, 2).unwrap();
    let luma_values: Vec<u8> = (1..=12).map(|v| v * 20).collect();

    let dest = run_phases(
        &root,
        format,
        &luma_values,
        &LumaExpandColorizer,
        &ColorizeOptions::default(),
    )
    .unwrap();

    let mut out = SourceStream::open(&dest, format).unwrap();
    assert_eq!(out.frame_count().unwrap(), 12);
    for (i, &v) in luma_values.iter().enumerate() {
        let frame = out.read_frame(FrameIndex(i as u64)).unwrap();
        assert_eq!(frame[0], v, "frame {i} out of order");
    }
}

#[test]
fn missing_frame_halts_recompose_with_zero_output() {
    let root = scratch_root("missing");
    let format = VideoFormat::new(4, 2).unwrap();
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, &[1, 2, 3, 4, 5])).unwrap();

    let mut source = SourceStream::open(&source_path, format).unwrap();
    let count = decompose(&mut source, &root.join("frames"), None).unwrap();
    assert_eq!(count, 5);

    colorize_frames(
        &root.join("frames"),
        &root.join("colorized"),
        &LumaExpandColorizer,
        &ColorizeOptions::default(),
    )
    .unwrap();

    // Drop index 2 (artifact number 3) before reassembly.
    std::fs::remove_file(root.join("colorized").join("frame_3.png")).unwrap();

    let dest_path = root.join("dest.yuv");
    let err = recompose(&root.join("colorized"), &dest_path, format, Some(count)).unwrap_err();
    assert!(matches!(err, RechromaError::Consistency(_)));
    assert!(!dest_path.exists(), "no destination frames may be written");
}

#[test]
fn abort_policy_fails_the_run_on_one_bad_frame() {
    let root = scratch_root("abort");
    let format = VideoFormat::new(4, 2).unwrap();

    let err = run_phases(
        &root,
        format,
        &[10, 20, 30],
        &FailOnLuma(20),
        &ColorizeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RechromaError::Colorizer(_)));
}

#[test]
fn fallback_policy_substitutes_instead_of_skipping() {
    let root = scratch_root("fallback");
    let format = VideoFormat::new(4, 2).unwrap();
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, &[10, 20, 30])).unwrap();

    let mut source = SourceStream::open(&source_path, format).unwrap();
    let count = decompose(&mut source, &root.join("frames"), None).unwrap();

    let opts = ColorizeOptions {
        policy: FailurePolicy::LumaFallback,
        ..ColorizeOptions::default()
    };
    let stats = colorize_frames(
        &root.join("frames"),
        &root.join("colorized"),
        &FailOnLuma(20),
        &opts,
    )
    .unwrap();
    assert_eq!(stats.frames_colorized, 2);
    assert_eq!(stats.frames_fallback, 1);

    // The substituted frame keeps its index and its luma content.
    let dest_path = root.join("dest.yuv");
    recompose(&root.join("colorized"), &dest_path, format, Some(count)).unwrap();
    let mut out = SourceStream::open(&dest_path, format).unwrap();
    assert_eq!(out.read_frame(FrameIndex(1)).unwrap()[0], 20);
}

#[test]
fn cancelled_token_stops_the_colorize_phase() {
    let root = scratch_root("cancel");
    let format = VideoFormat::new(4, 2).unwrap();
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, &[10, 20])).unwrap();

    let mut source = SourceStream::open(&source_path, format).unwrap();
    decompose(&mut source, &root.join("frames"), None).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let opts = ColorizeOptions {
        cancel,
        ..ColorizeOptions::default()
    };
    let err = colorize_frames(
        &root.join("frames"),
        &root.join("colorized"),
        &LumaExpandColorizer,
        &opts,
    )
    .unwrap_err();
    assert!(matches!(err, RechromaError::Cancelled(_)));
}

#[test]
fn decompose_honors_an_explicit_frame_limit() {
    let root = scratch_root("limit");
    let format = VideoFormat::new(4, 2).unwrap();
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, &[1, 2, 3, 4])).unwrap();

    let mut source = SourceStream::open(&source_path, format).unwrap();
    assert_eq!(decompose(&mut source, &root.join("frames"), Some(2)).unwrap(), 2);
    assert!(root.join("frames").join("frame_2.png").exists());
    assert!(!root.join("frames").join("frame_3.png").exists());

    // A limit past the end of the stream clamps to what is actually there.
    assert_eq!(
        decompose(&mut source, &root.join("frames_all"), Some(99)).unwrap(),
        4
    );
}

#[test]
fn run_job_drives_all_three_phases() {
    let root = scratch_root("job");
    let format = VideoFormat::new(6, 4).unwrap();
    let source_path = root.join("source.yuv");
    std::fs::write(&source_path, gray_stream(format, &[5, 15, 25, 35])).unwrap();

    let job = Job {
        source: source_path.clone(),
        output: root.join("dest.yuv"),
        frames_dir: root.join("frames"),
        colorized_dir: root.join("colorized"),
        width: 6,
        height: 4,
        fps: 2,
        duration_secs: Some(1.5),
        frame_count: None,
        colorize_cmd: None,
        on_error: FailurePolicy::Abort,
        threads: Some(2),
    };

    let stats = run_job(&job, &LumaExpandColorizer).unwrap();
    assert_eq!(stats.frames_decomposed, 3);
    assert_eq!(stats.frames_colorized, 3);
    assert_eq!(stats.frames_fallback, 0);
    assert_eq!(stats.frames_recomposed, 3);

    let source_bytes = std::fs::read(&source_path).unwrap();
    let dest_bytes = std::fs::read(root.join("dest.yuv")).unwrap();
    assert_eq!(dest_bytes.len(), 3 * format.frame_bytes());
    assert_eq!(
        dest_bytes.as_slice(),
        &source_bytes[..3 * format.frame_bytes()]
    );
}
