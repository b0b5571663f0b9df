//! Training-document generation.
//!
//! Densified series become store documents in one of two shapes: the whole
//! series as an ordered value sequence, or one supervised example per year
//! that has history before it (leave-one-year-out). The two modes are
//! selected per run, never mixed.

use serde::{Deserialize, Serialize};

use crate::series::DensifiedSeries;

/// Which document shape a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    FullSeries,
    LeaveOneOut,
}

/// Which per-year value becomes the supervised label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Percentage,
    AveragePoints,
}

/// A record handed to the document store. Write-once; the pipeline holds no
/// ownership after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatDocument {
    /// Ordered (average_points, percentage) pairs with the series' year
    /// range; years themselves are stripped.
    Full {
        series: Vec<(f64, f64)>,
        first_year: i32,
        last_year: i32,
    },
    /// Supervised pair: history strictly before `year` as
    /// (scaled year, average_points, percentage) triples, labeled with one
    /// of `year`'s values.
    Supervised {
        input: Vec<(f64, f64, f64)>,
        output: f64,
        year: i32,
        first_year: i32,
    },
}

/// Generate documents for every densified series under the selected mode.
pub fn generate(series: &[DensifiedSeries], mode: EmitMode, label: LabelKind) -> Vec<StatDocument> {
    match mode {
        EmitMode::FullSeries => full_series_documents(series),
        EmitMode::LeaveOneOut => leave_one_out_documents(series, label),
    }
}

/// One document per series; a single data point is not a series and is
/// skipped.
pub fn full_series_documents(series: &[DensifiedSeries]) -> Vec<StatDocument> {
    series
        .iter()
        .filter(|s| s.len() > 1)
        .map(|s| StatDocument::Full {
            series: s.values.clone(),
            first_year: s.first_year,
            last_year: s.last_year,
        })
        .collect()
}

/// One document per year index with at least one strictly earlier year.
///
/// The year coordinate inside input triples is scaled into (0, 1] over the
/// series span; the label year stays absolute in the metadata. A series of
/// length n yields n - 1 overlapping examples, one per point in time the
/// downstream model could have predicted from.
pub fn leave_one_out_documents(series: &[DensifiedSeries], label: LabelKind) -> Vec<StatDocument> {
    let mut documents = Vec::new();

    for s in series {
        let span = s.last_year - s.first_year;
        for i in 1..s.len() {
            let input = s.values[..i]
                .iter()
                .enumerate()
                .map(|(j, &(average_points, percentage))| {
                    let scaled_year = (j + 1) as f64 / f64::from(span);
                    (scaled_year, average_points, percentage)
                })
                .collect();
            let (average_points, percentage) = s.values[i];
            documents.push(StatDocument::Supervised {
                input,
                output: match label {
                    LabelKind::Percentage => percentage,
                    LabelKind::AveragePoints => average_points,
                },
                year: s.year_at(i),
                first_year: s.first_year,
            });
        }
    }

    documents
}
