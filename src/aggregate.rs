//! Per-file counter accumulation.
//!
//! One [`FileAggregate`] is owned by the single worker processing one
//! archive, so it carries no locking. The completed aggregate is the
//! per-file intermediate artifact: serialized as JSON, it both feeds the
//! vectorization stage and lets the directory processor detect prior
//! completion.

use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Counters for one (position, year, move) cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveCell {
    pub games: u32,
    pub points: f64,
}

/// Three-level counter structure: position key -> year -> move -> cell.
///
/// Cells are created only on the write path ([`FileAggregate::observe`]);
/// lookups never materialize empty entries.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileAggregate {
    positions: HashMap<String, HashMap<i32, HashMap<String, MoveCell>>>,
}

impl FileAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation: a move played from a position in a given
    /// year, with the mover's outcome score.
    pub fn observe(&mut self, position: &str, year: i32, mv: &str, score: f64) {
        let cell = self
            .positions
            .entry(position.to_owned())
            .or_default()
            .entry(year)
            .or_default()
            .entry(mv.to_owned())
            .or_default();
        cell.games += 1;
        cell.points += score;
    }

    pub fn cell(&self, position: &str, year: i32, mv: &str) -> Option<&MoveCell> {
        self.positions.get(position)?.get(&year)?.get(mv)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of distinct positions observed.
    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    /// Iterate over (position, year, move, cell) in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32, &str, &MoveCell)> + '_ {
        self.positions.iter().flat_map(|(position, years)| {
            years.iter().flat_map(move |(&year, moves)| {
                moves
                    .iter()
                    .map(move |(mv, cell)| (position.as_str(), year, mv.as_str(), cell))
            })
        })
    }

    /// Iterate over the moves observed at one position in one year.
    pub fn moves_at(&self, position: &str, year: i32) -> Option<&HashMap<String, MoveCell>> {
        self.positions.get(position)?.get(&year)
    }

    /// Positions grouped with their per-year move tables.
    pub fn by_position(
        &self,
    ) -> impl Iterator<Item = (&str, &HashMap<i32, HashMap<String, MoveCell>>)> + '_ {
        self.positions.iter().map(|(p, years)| (p.as_str(), years))
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
