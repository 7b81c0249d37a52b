use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use rechroma::{
    ColorizeOptions, Colorizer, CommandColorizer, FailurePolicy, Job, LumaExpandColorizer,
    SourceStream, VideoFormat,
};

#[derive(Parser, Debug)]
#[command(name = "rechroma", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a raw 4:2:0 stream into numbered grayscale frame images.
    Decompose(DecomposeArgs),
    /// Colorize extracted frame images through an external command.
    Colorize(ColorizeArgs),
    /// Reassemble colorized frame images into a raw 4:2:0 stream.
    Recompose(RecomposeArgs),
    /// Run decompose, colorize, and recompose from a JSON job file.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct DecomposeArgs {
    /// Input raw stream.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory for grayscale frame images.
    #[arg(long)]
    frames_dir: PathBuf,

    /// Stream width in pixels.
    #[arg(long)]
    width: u32,

    /// Stream height in pixels.
    #[arg(long)]
    height: u32,

    /// Only extract the first N frames.
    #[arg(long)]
    frames: Option<u64>,
}

#[derive(Parser, Debug)]
struct ColorizeArgs {
    /// Directory of grayscale frame images.
    #[arg(long)]
    frames_dir: PathBuf,

    /// Output directory for colorized frame images.
    #[arg(long)]
    colorized_dir: PathBuf,

    /// Colorize command template with {input} and {output} placeholders.
    #[arg(long)]
    cmd: String,

    /// Worker thread count.
    #[arg(long)]
    jobs: Option<usize>,

    /// Per-frame failure handling.
    #[arg(long, value_enum, default_value_t = OnError::Abort)]
    on_error: OnError,
}

#[derive(Parser, Debug)]
struct RecomposeArgs {
    /// Directory of colorized frame images.
    #[arg(long)]
    colorized_dir: PathBuf,

    /// Output raw stream.
    #[arg(long)]
    out: PathBuf,

    /// Stream width in pixels.
    #[arg(long)]
    width: u32,

    /// Stream height in pixels.
    #[arg(long)]
    height: u32,

    /// Expected frame count; derived from the directory when omitted.
    #[arg(long)]
    frames: Option<u64>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// JSON job description.
    #[arg(long)]
    job: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnError {
    Abort,
    LumaFallback,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => FailurePolicy::Abort,
            OnError::LumaFallback => FailurePolicy::LumaFallback,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Decompose(args) => cmd_decompose(args),
        Command::Colorize(args) => cmd_colorize(args),
        Command::Recompose(args) => cmd_recompose(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn cmd_decompose(args: DecomposeArgs) -> anyhow::Result<()> {
    let format = VideoFormat::new(args.width, args.height)?;
    let mut source = SourceStream::open(&args.in_path, format)?;
    let count = rechroma::decompose(&mut source, &args.frames_dir, args.frames)?;
    eprintln!("wrote {count} frames to {}", args.frames_dir.display());
    Ok(())
}

fn cmd_colorize(args: ColorizeArgs) -> anyhow::Result<()> {
    let colorizer = CommandColorizer::from_template(&args.cmd)?;
    let opts = ColorizeOptions {
        policy: args.on_error.into(),
        threads: args.jobs,
        ..ColorizeOptions::default()
    };
    let stats = rechroma::colorize_frames(&args.frames_dir, &args.colorized_dir, &colorizer, &opts)?;
    eprintln!(
        "colorized {} frames ({} fallback) to {}",
        stats.frames_colorized,
        stats.frames_fallback,
        args.colorized_dir.display()
    );
    Ok(())
}

fn cmd_recompose(args: RecomposeArgs) -> anyhow::Result<()> {
    let format = VideoFormat::new(args.width, args.height)?;
    let count = rechroma::recompose(&args.colorized_dir, &args.out, format, args.frames)?;
    eprintln!("wrote {count} frames to {}", args.out.display());
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.job)?;

    let colorizer: Box<dyn Colorizer> = match &job.colorize_cmd {
        Some(template) => Box::new(CommandColorizer::from_template(template)?),
        None => Box::new(LumaExpandColorizer),
    };

    let stats = rechroma::run_job(&job, colorizer.as_ref())?;
    eprintln!(
        "wrote {} frames to {} ({} colorized, {} fallback)",
        stats.frames_recomposed,
        job.output.display(),
        stats.frames_colorized,
        stats.frames_fallback
    );
    Ok(())
}

fn read_job_json(path: &Path) -> anyhow::Result<Job> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let r = BufReader::new(f);
    let job: Job = serde_json::from_reader(r).with_context(|| "parse job JSON")?;
    Ok(job)
}
