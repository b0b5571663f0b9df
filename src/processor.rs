//! Directory-level pipeline driver.
//!
//! Each archive in the input directory is one unit of work on a fixed-size
//! rayon pool. Workers share nothing but the document store handle; an
//! aggregate lives and dies inside its unit. A unit that fails is logged
//! and reported in the run summary without disturbing its siblings, and the
//! driver always waits for every unit before returning.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::aggregate::FileAggregate;
use crate::document::{generate, EmitMode, LabelKind};
use crate::replay::{replay_archive, TrackedColor};
use crate::series::{densify_all, normalize, DensifyOptions};
use crate::store::DocumentStore;

/// What happens to an input file once its unit completes successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputCleanup {
    /// Leave inputs in place.
    #[default]
    Keep,
    /// Delete inputs that were freshly processed this run.
    RemoveProcessed,
    /// Also delete inputs skipped because their output already existed.
    RemoveAll,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Worker pool size; `None` uses host parallelism.
    pub threads: Option<usize>,
    /// Overrides the `<identity>_<color>` filename convention when set.
    pub color: Option<TrackedColor>,
    pub cleanup: InputCleanup,
}

#[derive(Debug, Clone)]
pub struct VectorizeOptions {
    pub threads: Option<usize>,
    pub mode: EmitMode,
    pub label: LabelKind,
    /// Clear the store before inserting anything (full rebuild).
    pub rebuild: bool,
    pub densify: DensifyOptions,
    /// Applies to the aggregate artifacts consumed by this stage.
    pub cleanup: InputCleanup,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        VectorizeOptions {
            threads: None,
            mode: EmitMode::FullSeries,
            label: LabelKind::Percentage,
            rebuild: false,
            densify: DensifyOptions::default(),
            cleanup: InputCleanup::default(),
        }
    }
}

#[derive(Debug)]
pub enum FileStatus {
    Processed,
    /// Output artifact already existed; no work performed.
    Skipped,
    Failed(String),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Per-file success/failure report for one stage run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Processed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Regular files directly under `dir`, sorted for stable reporting.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn build_pool(threads: Option<usize>) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or_else(num_cpus::get))
        .build()
        .context("building worker pool")
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("input path {} has no file name", path.display()))
}

/// Deterministic artifact name for an input file.
fn artifact_path(out_dir: &Path, input: &Path) -> Result<PathBuf> {
    Ok(out_dir.join(format!("{}.json", file_stem(input)?)))
}

fn apply_cleanup(path: &Path, cleanup: InputCleanup, freshly_processed: bool) -> Result<()> {
    let remove = match cleanup {
        InputCleanup::Keep => false,
        InputCleanup::RemoveProcessed => freshly_processed,
        InputCleanup::RemoveAll => true,
    };
    if remove {
        fs::remove_file(path).with_context(|| format!("removing input {}", path.display()))?;
    }
    Ok(())
}

/// Stage one: replay and aggregate every archive in `input_dir`, writing
/// one aggregate artifact per file into `out_dir`.
pub fn analyze_dir(input_dir: &Path, out_dir: &Path, options: &AnalyzeOptions) -> Result<RunSummary> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let files = list_files(input_dir)?;
    let pool = build_pool(options.threads)?;

    let outcomes = pool.install(|| {
        files
            .par_iter()
            .map(|path| run_unit(path, |p| analyze_file(p, out_dir, options)))
            .collect()
    });

    let summary = RunSummary { outcomes };
    info!(
        "analyze {}: {} processed, {} skipped, {} failed",
        input_dir.display(),
        summary.processed(),
        summary.skipped(),
        summary.failed()
    );
    Ok(summary)
}

/// Stage two: normalize, densify and window each aggregate artifact in
/// `aggregate_dir`, emitting one document batch per file into `store`.
pub fn vectorize_dir<S: DocumentStore + ?Sized>(
    aggregate_dir: &Path,
    store: &S,
    options: &VectorizeOptions,
) -> Result<RunSummary> {
    let files: Vec<PathBuf> = list_files(aggregate_dir)?
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    let pool = build_pool(options.threads)?;

    if options.rebuild {
        store.clear().context("clearing document store for rebuild")?;
    }

    let outcomes = pool.install(|| {
        files
            .par_iter()
            .map(|path| run_unit(path, |p| vectorize_file(p, store, options)))
            .collect()
    });

    let summary = RunSummary { outcomes };
    info!(
        "vectorize {}: {} processed, {} failed",
        aggregate_dir.display(),
        summary.processed(),
        summary.failed()
    );
    Ok(summary)
}

/// Both stages against one work directory.
pub fn run_pipeline<S: DocumentStore + ?Sized>(
    input_dir: &Path,
    work_dir: &Path,
    store: &S,
    analyze_options: &AnalyzeOptions,
    vectorize_options: &VectorizeOptions,
) -> Result<(RunSummary, RunSummary)> {
    let analyzed = analyze_dir(input_dir, work_dir, analyze_options)?;
    let vectorized = vectorize_dir(work_dir, store, vectorize_options)?;
    Ok((analyzed, vectorized))
}

/// Failure isolation: whatever happens inside a unit becomes a per-file
/// outcome, never a driver error.
fn run_unit(path: &Path, unit: impl FnOnce(&Path) -> Result<FileStatus>) -> FileOutcome {
    let status = match unit(path) {
        Ok(status) => status,
        Err(err) => {
            error!("unit failed for {}: {:#}", path.display(), err);
            FileStatus::Failed(format!("{err:#}"))
        }
    };
    FileOutcome {
        path: path.to_owned(),
        status,
    }
}

fn analyze_file(path: &Path, out_dir: &Path, options: &AnalyzeOptions) -> Result<FileStatus> {
    let artifact = artifact_path(out_dir, path)?;
    if artifact.is_file() {
        // Prior run already completed this unit.
        apply_cleanup(path, options.cleanup, false)?;
        return Ok(FileStatus::Skipped);
    }

    let tracked = match options.color {
        Some(color) => color,
        None => TrackedColor::from_file_stem(&file_stem(path)?),
    };

    let file = File::open(path).with_context(|| format!("opening archive {}", path.display()))?;
    let mut aggregate = FileAggregate::new();
    let stats = replay_archive(BufReader::new(file), tracked, &mut aggregate)?;
    debug!(
        "{}: {} games ({} discarded), {} positions",
        path.display(),
        stats.games,
        stats.discarded,
        aggregate.num_positions()
    );

    // Write-then-rename so a partial artifact never satisfies the
    // existence check of a later run.
    let tmp = artifact.with_extension("json.tmp");
    let mut writer = BufWriter::new(
        File::create(&tmp).with_context(|| format!("creating artifact {}", tmp.display()))?,
    );
    aggregate.write_to(&mut writer)?;
    writer.flush()?;
    fs::rename(&tmp, &artifact)
        .with_context(|| format!("publishing artifact {}", artifact.display()))?;

    apply_cleanup(path, options.cleanup, true)?;
    Ok(FileStatus::Processed)
}

fn vectorize_file<S: DocumentStore + ?Sized>(
    path: &Path,
    store: &S,
    options: &VectorizeOptions,
) -> Result<FileStatus> {
    let file = File::open(path).with_context(|| format!("opening artifact {}", path.display()))?;
    let aggregate = FileAggregate::read_from(BufReader::new(file))
        .with_context(|| format!("decoding artifact {}", path.display()))?;

    let sparse = normalize(&aggregate);
    let dense = densify_all(&sparse, &options.densify);
    let documents = generate(&dense, options.mode, options.label);
    debug!(
        "{}: {} series, {} after windowing, {} documents",
        path.display(),
        sparse.len(),
        dense.len(),
        documents.len()
    );

    if !documents.is_empty() {
        store
            .insert_many(&documents)
            .with_context(|| format!("inserting documents from {}", path.display()))?;
    }

    apply_cleanup(path, options.cleanup, true)?;
    Ok(FileStatus::Processed)
}
