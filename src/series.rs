//! Normalization and time-series shaping.
//!
//! Raw counters become, per (position, move), a year-ordered series of
//! (average points, play-frequency percentage). Series are then densified
//! over `[first_year, last_year)` with gap years filled by a fixed value,
//! and series spanning an implausibly long range are excluded outright.

use std::collections::HashMap;

use itertools::Itertools;

use crate::aggregate::FileAggregate;

/// Statistics for one move at one position in one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearStat {
    pub year: i32,
    pub average_points: f64,
    pub percentage: f64,
}

/// Sparse per-(position, move) series, strictly ascending by year.
#[derive(Debug, Clone)]
pub struct MoveSeries {
    pub position: String,
    pub mv: String,
    pub years: Vec<YearStat>,
}

/// Constants governing densification and span windowing.
#[derive(Debug, Clone)]
pub struct DensifyOptions {
    /// Series spanning more than this many years are dropped as
    /// data-quality artifacts (implausible date ranges).
    pub max_span: i32,
    /// Exclusive upper bound on the densified range. `None` means one past
    /// the last observed year (batch mode); live queries pass the current
    /// processing boundary instead.
    pub boundary: Option<i32>,
    /// (average_points, percentage) inserted for years with no games.
    pub gap_fill: (f64, f64),
}

impl Default for DensifyOptions {
    fn default() -> Self {
        DensifyOptions {
            max_span: 120,
            boundary: None,
            gap_fill: (0.0, 0.0),
        }
    }
}

/// Gap-free series over `[first_year, last_year)`; entry `i` belongs to
/// year `first_year + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensifiedSeries {
    pub position: String,
    pub mv: String,
    pub first_year: i32,
    /// Exclusive bound.
    pub last_year: i32,
    /// (average_points, percentage) per consecutive year.
    pub values: Vec<(f64, f64)>,
}

impl DensifiedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn year_at(&self, index: usize) -> i32 {
        self.first_year + index as i32
    }
}

/// Convert a completed aggregate into sparse per-(position, move) series.
///
/// For each position and year, `percentage` is the move's share of all
/// games at that position that year, and `average_points` is the mover's
/// mean score. Output is ordered by (position, move) and by year inside
/// each series.
pub fn normalize(aggregate: &FileAggregate) -> Vec<MoveSeries> {
    let mut grouped: HashMap<(&str, &str), Vec<YearStat>> = HashMap::new();

    for (position, years) in aggregate.by_position() {
        for (&year, moves) in years {
            let total_games: u32 = moves.values().map(|cell| cell.games).sum();
            for (mv, cell) in moves {
                let percentage = if total_games > 0 {
                    f64::from(cell.games) / f64::from(total_games)
                } else {
                    0.0
                };
                let average_points = if cell.games > 0 {
                    cell.points / f64::from(cell.games)
                } else {
                    0.0
                };
                grouped.entry((position, mv.as_str())).or_default().push(YearStat {
                    year,
                    average_points,
                    percentage,
                });
            }
        }
    }

    grouped
        .into_iter()
        .map(|((position, mv), mut years)| {
            years.sort_by_key(|stat| stat.year);
            MoveSeries {
                position: position.to_owned(),
                mv: mv.to_owned(),
                years,
            }
        })
        .sorted_by(|a, b| (&a.position, &a.mv).cmp(&(&b.position, &b.mv)))
        .collect()
}

/// Densify one sparse series, or drop it under the span window.
///
/// Returns `None` for empty input and for series whose
/// `last_year - first_year` exceeds `max_span`. A boundary earlier than the
/// last observed year is widened so observed years are never cut off.
pub fn densify(series: &MoveSeries, options: &DensifyOptions) -> Option<DensifiedSeries> {
    let first_year = series.years.first()?.year;
    let last_observed = series.years.last()?.year;
    let last_year = options
        .boundary
        .map_or(last_observed + 1, |b| b.max(last_observed + 1));

    if last_year - first_year > options.max_span {
        return None;
    }

    let mut values = Vec::with_capacity((last_year - first_year) as usize);
    let mut sparse = series.years.iter().peekable();
    for year in first_year..last_year {
        match sparse.peek() {
            Some(stat) if stat.year == year => {
                values.push((stat.average_points, stat.percentage));
                sparse.next();
            }
            _ => values.push(options.gap_fill),
        }
    }

    Some(DensifiedSeries {
        position: series.position.clone(),
        mv: series.mv.clone(),
        first_year,
        last_year,
        values,
    })
}

/// Densify every surviving series of a normalized aggregate.
pub fn densify_all(series: &[MoveSeries], options: &DensifyOptions) -> Vec<DensifiedSeries> {
    series.iter().filter_map(|s| densify(s, options)).collect()
}
