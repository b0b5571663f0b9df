//! Game replay: one pass over a PGN archive producing observations.
//!
//! [`ObservationVisitor`] walks each game's mainline from the initial
//! position. For every ply whose mover matches the tracked color it records
//! (position key before the move, year, UCI move, outcome score) into the
//! file's aggregate. Replay of a game stops at the first SAN that does not
//! resolve to a legal move; observations recorded before that point stand.

use std::io::Read;
use std::ops::ControlFlow;

use anyhow::Result;
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::{uci::UciMove, Chess, Color, Position};

use crate::aggregate::FileAggregate;
use crate::position::position_key;

/// Which side's moves generate observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedColor {
    White,
    Black,
    Both,
}

impl TrackedColor {
    /// Derive the tracked color from an input file stem of the upstream
    /// `<identity>_<color>` naming convention. An unrecognized or missing
    /// suffix tracks both sides.
    pub fn from_file_stem(stem: &str) -> TrackedColor {
        match stem.rsplit('_').next() {
            Some("white") => TrackedColor::White,
            Some("black") => TrackedColor::Black,
            _ => TrackedColor::Both,
        }
    }

    fn covers(self, side: Color) -> bool {
        match self {
            TrackedColor::White => side == Color::White,
            TrackedColor::Black => side == Color::Black,
            TrackedColor::Both => true,
        }
    }
}

/// Declared game result, from the `Result` header tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    #[default]
    Unknown,
}

impl GameResult {
    fn from_tag(value: &str) -> GameResult {
        match value {
            "1-0" => GameResult::WhiteWin,
            "0-1" => GameResult::BlackWin,
            "1/2-1/2" => GameResult::Draw,
            _ => GameResult::Unknown,
        }
    }

    /// Outcome score for the side making a move: 1 for the declared winner,
    /// 0 for the loser, 0.5 for a draw, 0 when the result is unknown.
    pub fn score_for(self, side: Color) -> f64 {
        match self {
            GameResult::WhiteWin => {
                if side == Color::White {
                    1.0
                } else {
                    0.0
                }
            }
            GameResult::BlackWin => {
                if side == Color::Black {
                    1.0
                } else {
                    0.0
                }
            }
            GameResult::Draw => 0.5,
            GameResult::Unknown => 0.0,
        }
    }
}

/// Header fields collected before movetext.
#[derive(Debug, Default)]
pub struct GameHeader {
    year: Option<i32>,
    result: GameResult,
}

/// Year is the first four characters of the `Date` tag.
fn parse_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

/// Per-game replay state.
pub struct Replay {
    pos: Chess,
    year: i32,
    result: GameResult,
    /// Cleared at the first illegal move; later sans are ignored.
    live: bool,
}

/// Counts reported back per archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayStats {
    /// Games seen in the archive.
    pub games: u64,
    /// Games discarded for an unparseable date.
    pub discarded: u64,
}

/// Visitor feeding one file's aggregate.
pub struct ObservationVisitor<'a> {
    aggregate: &'a mut FileAggregate,
    tracked: TrackedColor,
    stats: ReplayStats,
}

impl<'a> ObservationVisitor<'a> {
    pub fn new(aggregate: &'a mut FileAggregate, tracked: TrackedColor) -> Self {
        ObservationVisitor {
            aggregate,
            tracked,
            stats: ReplayStats::default(),
        }
    }
}

impl Visitor for ObservationVisitor<'_> {
    type Tags = GameHeader;
    type Movetext = Replay;
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<(), GameHeader> {
        ControlFlow::Continue(GameHeader::default())
    }

    fn tag(&mut self, tags: &mut GameHeader, key: &[u8], value: RawTag<'_>) -> ControlFlow<()> {
        match key {
            b"Date" => tags.year = parse_year(&value.decode_utf8_lossy()),
            b"Result" => tags.result = GameResult::from_tag(&value.decode_utf8_lossy()),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameHeader) -> ControlFlow<(), Replay> {
        self.stats.games += 1;
        let Some(year) = tags.year else {
            // No usable year: the whole game is discarded.
            self.stats.discarded += 1;
            return ControlFlow::Break(());
        };
        ControlFlow::Continue(Replay {
            pos: Chess::default(),
            year,
            result: tags.result,
            live: true,
        })
    }

    fn san(&mut self, replay: &mut Replay, san_plus: SanPlus) -> ControlFlow<()> {
        if !replay.live {
            return ControlFlow::Continue(());
        }
        match san_plus.san.to_move(&replay.pos) {
            Ok(m) => {
                let mover = replay.pos.turn();
                if self.tracked.covers(mover) {
                    // Key reflects the state before the move is applied.
                    let key = position_key(&replay.pos);
                    let uci = UciMove::from_standard(m).to_string();
                    self.aggregate
                        .observe(&key, replay.year, &uci, replay.result.score_for(mover));
                }
                replay.pos.play_unchecked(m);
            }
            Err(_) => {
                // Truncate at the first illegal move.
                replay.live = false;
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _replay: &mut Replay) -> ControlFlow<(), Skip> {
        ControlFlow::Continue(Skip(true)) // mainline only
    }

    fn end_game(&mut self, _replay: Replay) {}
}

/// Replay every game in a PGN stream into `aggregate`.
///
/// Per-game defects (bad date, illegal move) never fail the archive; only
/// I/O errors from the underlying reader do.
pub fn replay_archive<R: Read>(
    input: R,
    tracked: TrackedColor,
    aggregate: &mut FileAggregate,
) -> Result<ReplayStats> {
    let mut reader = Reader::new(input);
    let mut visitor = ObservationVisitor::new(aggregate, tracked);
    while reader.read_game(&mut visitor)?.is_some() {}
    Ok(visitor.stats)
}
