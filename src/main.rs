use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;

use opening_trends::{
    analyze_dir, run_pipeline, vectorize_dir, AnalyzeOptions, DensifyOptions, EmitMode,
    InputCleanup, JsonlStore, LabelKind, TrackedColor, VectorizeOptions,
};

#[derive(Parser)]
#[clap(author, version)]
#[clap(name = "opening-trends")]
#[clap(about = "Aggregates PGN archives into per-position move statistics and training time series", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay archives in a directory into per-file aggregate artifacts.
    Analyze(AnalyzeCommand),
    /// Turn aggregate artifacts into documents in the store.
    Vectorize(VectorizeCommand),
    /// Run both stages against a work directory.
    Run(RunCommand),
}

#[derive(Args)]
struct AnalyzeCommand {
    /// Directory of PGN archives named `<identity>_<color>.pgn`.
    #[clap(short, long)]
    input: PathBuf,

    /// Directory receiving one aggregate artifact per archive.
    #[clap(short, long)]
    out: PathBuf,

    #[clap(flatten)]
    analyze: AnalyzeArgs,
}

#[derive(Args)]
struct VectorizeCommand {
    /// Directory of aggregate artifacts produced by `analyze`.
    #[clap(short, long)]
    input: PathBuf,

    /// JSON-lines document store to write into.
    #[clap(short, long)]
    store: PathBuf,

    /// Worker pool size; defaults to host parallelism.
    #[clap(short, long)]
    threads: Option<usize>,

    #[clap(flatten)]
    vectorize: VectorizeArgs,
}

#[derive(Args)]
struct RunCommand {
    /// Directory of PGN archives.
    #[clap(short, long)]
    input: PathBuf,

    /// Work directory for intermediate aggregate artifacts.
    #[clap(short, long)]
    work: PathBuf,

    /// JSON-lines document store to write into.
    #[clap(short, long)]
    store: PathBuf,

    #[clap(flatten)]
    analyze: AnalyzeArgs,

    #[clap(flatten)]
    vectorize: VectorizeArgs,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Worker pool size; defaults to host parallelism.
    #[clap(short, long)]
    threads: Option<usize>,

    /// Override the tracked color instead of reading it from file names.
    #[clap(long, value_enum)]
    color: Option<ColorArg>,

    /// What to do with input files after their unit completes.
    #[clap(long, value_enum, default_value = "keep")]
    cleanup: CleanupArg,
}

#[derive(Args)]
struct VectorizeArgs {
    /// Document shape to emit.
    #[clap(long, value_enum, default_value = "full")]
    mode: ModeArg,

    /// Label used by leave-one-out documents.
    #[clap(long, value_enum, default_value = "percentage")]
    label: LabelArg,

    /// Clear the store before inserting (full rebuild).
    #[clap(long)]
    rebuild: bool,

    /// Exclude series spanning more than this many years.
    #[clap(long, default_value_t = 120)]
    max_span: i32,

    /// Exclusive upper bound on densified series (live-query mode).
    #[clap(long)]
    boundary: Option<i32>,

    /// What to do with aggregate artifacts after vectorization.
    #[clap(long, value_enum, default_value = "keep")]
    artifact_cleanup: CleanupArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorArg {
    White,
    Black,
    Both,
}

impl From<ColorArg> for TrackedColor {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::White => TrackedColor::White,
            ColorArg::Black => TrackedColor::Black,
            ColorArg::Both => TrackedColor::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CleanupArg {
    Keep,
    RemoveProcessed,
    RemoveAll,
}

impl From<CleanupArg> for InputCleanup {
    fn from(value: CleanupArg) -> Self {
        match value {
            CleanupArg::Keep => InputCleanup::Keep,
            CleanupArg::RemoveProcessed => InputCleanup::RemoveProcessed,
            CleanupArg::RemoveAll => InputCleanup::RemoveAll,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    LeaveOneOut,
}

impl From<ModeArg> for EmitMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Full => EmitMode::FullSeries,
            ModeArg::LeaveOneOut => EmitMode::LeaveOneOut,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LabelArg {
    Percentage,
    Points,
}

impl From<LabelArg> for LabelKind {
    fn from(value: LabelArg) -> Self {
        match value {
            LabelArg::Percentage => LabelKind::Percentage,
            LabelArg::Points => LabelKind::AveragePoints,
        }
    }
}

impl AnalyzeArgs {
    fn to_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            threads: self.threads,
            color: self.color.map(Into::into),
            cleanup: self.cleanup.into(),
        }
    }
}

impl VectorizeArgs {
    fn to_options(&self, threads: Option<usize>) -> VectorizeOptions {
        VectorizeOptions {
            threads,
            mode: self.mode.into(),
            label: self.label.into(),
            rebuild: self.rebuild,
            densify: DensifyOptions {
                max_span: self.max_span,
                boundary: self.boundary,
                ..DensifyOptions::default()
            },
            cleanup: self.artifact_cleanup.into(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze(cmd) => {
            let summary = analyze_dir(&cmd.input, &cmd.out, &cmd.analyze.to_options())?;
            info!(
                "done: {} processed, {} skipped, {} failed",
                summary.processed(),
                summary.skipped(),
                summary.failed()
            );
        }
        Commands::Vectorize(cmd) => {
            let store = JsonlStore::open(&cmd.store)?;
            let summary = vectorize_dir(&cmd.input, &store, &cmd.vectorize.to_options(cmd.threads))?;
            info!(
                "done: {} processed, {} failed",
                summary.processed(),
                summary.failed()
            );
        }
        Commands::Run(cmd) => {
            let store = JsonlStore::open(&cmd.store)?;
            let (analyzed, vectorized) = run_pipeline(
                &cmd.input,
                &cmd.work,
                &store,
                &cmd.analyze.to_options(),
                &cmd.vectorize.to_options(cmd.analyze.threads),
            )?;
            info!(
                "done: analyze {}/{} ok, vectorize {}/{} ok",
                analyzed.processed() + analyzed.skipped(),
                analyzed.outcomes.len(),
                vectorized.processed(),
                vectorized.outcomes.len()
            );
        }
    }

    Ok(())
}
