//! End-to-end run over a temporary directory: PGN archives in, aggregate
//! artifacts in a work directory, documents in a store.

use std::fs;

use assert_approx_eq::assert_approx_eq;
use opening_trends::{
    analyze_dir, vectorize_dir, AnalyzeOptions, EmitMode, FileStatus, InputCleanup, MemoryStore,
    StatDocument, VectorizeOptions,
};
use tempfile::TempDir;

const CARLSEN_WHITE: &str = "\
[Date \"2020.01.01\"]
[Result \"1-0\"]

1. e4 e5 2. Nf3 1-0

[Date \"2021.01.01\"]
[Result \"1/2-1/2\"]

1. e4 1/2-1/2
";

const SO_BLACK: &str = "\
[Date \"2019.01.01\"]
[Result \"0-1\"]

1. d4 d5 2. c4 e6 0-1
";

fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("archives");
    let work = root.path().join("aggregates");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("carlsen_white.pgn"), CARLSEN_WHITE).unwrap();
    fs::write(input.join("so_black.pgn"), SO_BLACK).unwrap();
    (root, input, work)
}

fn two_workers() -> AnalyzeOptions {
    AnalyzeOptions {
        threads: Some(2),
        ..AnalyzeOptions::default()
    }
}

#[test]
fn test_analyze_writes_one_artifact_per_archive() {
    let (_root, input, work) = setup();

    let summary = analyze_dir(&input, &work, &two_workers()).unwrap();
    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.skipped(), 0);
    assert_eq!(summary.failed(), 0);

    assert!(work.join("carlsen_white.json").is_file());
    assert!(work.join("so_black.json").is_file());
    // No stray temporaries left behind.
    assert_eq!(fs::read_dir(&work).unwrap().count(), 2);
}

#[test]
fn test_rerun_skips_completed_units_without_replaying() {
    let (_root, input, work) = setup();
    analyze_dir(&input, &work, &two_workers()).unwrap();
    let artifact = work.join("carlsen_white.json");
    let before = fs::read(&artifact).unwrap();

    // Even with changed input content, an existing artifact means the unit
    // is treated as complete.
    fs::write(input.join("carlsen_white.pgn"), SO_BLACK).unwrap();
    let summary = analyze_dir(&input, &work, &two_workers()).unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(summary.skipped(), 2);
    assert_eq!(fs::read(&artifact).unwrap(), before);
}

#[test]
fn test_full_series_documents_from_pipeline() {
    let (_root, input, work) = setup();
    analyze_dir(&input, &work, &two_workers()).unwrap();

    let store = MemoryStore::new();
    let summary = vectorize_dir(&work, &store, &VectorizeOptions::default()).unwrap();
    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.failed(), 0);

    // Only 1.e4 from the white file was seen in two distinct years; every
    // other (position, move) series has a single point and emits nothing.
    let docs = store.documents();
    assert_eq!(docs.len(), 1);
    match &docs[0] {
        StatDocument::Full {
            series,
            first_year,
            last_year,
        } => {
            assert_eq!(*first_year, 2020);
            assert_eq!(*last_year, 2022);
            assert_eq!(series.len(), 2);
            // 2020: won game; 2021: draw. Sole move both years.
            assert_approx_eq!(series[0].0, 1.0);
            assert_approx_eq!(series[0].1, 1.0);
            assert_approx_eq!(series[1].0, 0.5);
            assert_approx_eq!(series[1].1, 1.0);
        }
        other => panic!("expected full document, got {:?}", other),
    }
}

#[test]
fn test_leave_one_out_documents_from_pipeline() {
    let (_root, input, work) = setup();
    analyze_dir(&input, &work, &two_workers()).unwrap();

    let store = MemoryStore::new();
    let options = VectorizeOptions {
        mode: EmitMode::LeaveOneOut,
        ..VectorizeOptions::default()
    };
    vectorize_dir(&work, &store, &options).unwrap();

    let docs = store.documents();
    assert_eq!(docs.len(), 1);
    match &docs[0] {
        StatDocument::Supervised {
            input,
            output,
            year,
            first_year,
        } => {
            assert_eq!(*year, 2021);
            assert_eq!(*first_year, 2020);
            assert_eq!(input.len(), 1);
            assert_approx_eq!(*output, 1.0);
        }
        other => panic!("expected supervised document, got {:?}", other),
    }
}

#[test]
fn test_rebuild_clears_previous_documents() {
    let (_root, input, work) = setup();
    analyze_dir(&input, &work, &two_workers()).unwrap();

    let store = MemoryStore::new();
    vectorize_dir(&work, &store, &VectorizeOptions::default()).unwrap();
    assert_eq!(store.len(), 1);

    // Append mode duplicates, rebuild does not.
    vectorize_dir(&work, &store, &VectorizeOptions::default()).unwrap();
    assert_eq!(store.len(), 2);

    let rebuild = VectorizeOptions {
        rebuild: true,
        ..VectorizeOptions::default()
    };
    vectorize_dir(&work, &store, &rebuild).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_remove_processed_inputs_keeps_skipped() {
    let (_root, input, work) = setup();

    // First run completes one file only, by pre-seeding its artifact.
    fs::create_dir(&work).unwrap();
    fs::write(work.join("so_black.json"), "{\"positions\":{}}").unwrap();

    let options = AnalyzeOptions {
        threads: Some(2),
        cleanup: InputCleanup::RemoveProcessed,
        ..AnalyzeOptions::default()
    };
    let summary = analyze_dir(&input, &work, &options).unwrap();
    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.skipped(), 1);

    // Freshly processed input deleted; skipped input kept.
    assert!(!input.join("carlsen_white.pgn").exists());
    assert!(input.join("so_black.pgn").exists());
}

#[test]
fn test_remove_all_also_deletes_skipped_inputs() {
    let (_root, input, work) = setup();
    analyze_dir(&input, &work, &two_workers()).unwrap();

    let options = AnalyzeOptions {
        threads: Some(2),
        cleanup: InputCleanup::RemoveAll,
        ..AnalyzeOptions::default()
    };
    let summary = analyze_dir(&input, &work, &options).unwrap();
    assert_eq!(summary.skipped(), 2);
    assert_eq!(fs::read_dir(&input).unwrap().count(), 0);
}

#[test]
fn test_failed_unit_does_not_disturb_siblings() {
    let (_root, input, work) = setup();
    // An artifact path blocked by a directory makes one unit fail at the
    // rename step while the other completes.
    fs::create_dir_all(work.join("carlsen_white.json")).unwrap();

    let summary = analyze_dir(&input, &work, &two_workers()).unwrap();

    let failed: Vec<_> = summary
        .outcomes
        .iter()
        .filter(|o| matches!(o.status, FileStatus::Failed(_)))
        .collect();
    assert_eq!(summary.processed(), 1);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].path.ends_with("carlsen_white.pgn"));
    assert!(work.join("so_black.json").is_file());
}

#[test]
fn test_garbage_games_do_not_fail_the_file() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("archives");
    let work = root.path().join("aggregates");
    fs::create_dir(&input).unwrap();
    let mixed = format!(
        "[Date \"bad\"]\n[Result \"1-0\"]\n\n1. e4 1-0\n\n{}",
        CARLSEN_WHITE
    );
    fs::write(input.join("anand_white.pgn"), mixed).unwrap();

    let summary = analyze_dir(&input, &work, &two_workers()).unwrap();
    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.failed(), 0);
    assert!(work.join("anand_white.json").is_file());
}
