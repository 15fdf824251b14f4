//! Ladder draw generation and traversal.
//!
//! A ladder is `cols` vertical lanes crossed by horizontal rungs. Each rung at
//! `(row, col)` joins lane `col` to lane `col + 1`; two rungs never touch the
//! same lane in the same row, which keeps every traversal unambiguous and the
//! lane-to-lane mapping a permutation.
use rand::RngCore;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use thiserror::Error;

use crate::rng::{DrawSource, unit_draw};

/// Per-cell rung probability used when a caller does not pick one.
pub const DEFAULT_DENSITY: f64 = 0.28;
/// Row count used when a caller does not pick one.
pub const DEFAULT_ROWS: u32 = 18;
/// Lane count offered by a fresh draw.
pub const DEFAULT_LANES: usize = 4;

pub const MIN_LANES: usize = 2;
pub const MAX_LANES: usize = 10;
pub const MIN_ROWS: u32 = 6;
pub const MAX_ROWS: u32 = 60;
pub const MIN_DENSITY: f64 = 0.06;
pub const MAX_DENSITY: f64 = 0.6;

/// Terminal lane for every starting lane; eight lanes stay inline.
pub type Mapping = SmallVec<[usize; 8]>;

/// Horizontal connector between lane `col` and lane `col + 1` at `row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rung {
    pub row: u32,
    pub col: u32,
}

impl Rung {
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Generate rungs for a ladder, replaying exactly when `seed` is supplied.
#[must_use]
pub fn generate_ladder(cols: usize, rows: u32, density: f64, seed: Option<i64>) -> Vec<Rung> {
    let mut source = DrawSource::for_seed(seed);
    generate_with(cols, rows, density, &mut source)
}

/// Generate rungs from an arbitrary random source.
///
/// Rows are scanned top to bottom and gaps left to right. A gap directly to
/// the right of a rung placed in the same row is skipped without consuming a
/// draw; every other gap consumes exactly one draw and receives a rung when the
/// draw falls below `density`. Shared seeds depend on this exact draw order.
#[must_use]
pub fn generate_with<R: RngCore + ?Sized>(
    cols: usize,
    rows: u32,
    density: f64,
    rng: &mut R,
) -> Vec<Rung> {
    let mut rungs = Vec::new();
    if cols <= 1 {
        return rungs;
    }
    let gaps = u32::try_from(cols - 1).unwrap_or(u32::MAX);
    for row in 0..rows {
        let mut left_taken = false;
        for col in 0..gaps {
            if left_taken {
                left_taken = false;
                continue;
            }
            if unit_draw(rng) < density {
                rungs.push(Rung::new(row, col));
                left_taken = true;
            }
        }
    }
    rungs
}

/// Direction a traversal takes at one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    Right,
    Left,
    Down,
}

/// One row of a traversal: the lane entered the row on and the lane it left on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub row: u32,
    pub from: usize,
    pub to: usize,
    #[serde(rename = "move")]
    pub movement: Move,
}

/// Indexed view of a rung set for repeated traversal.
#[derive(Debug, Clone)]
pub struct Ladder {
    cols: usize,
    rows: u32,
    rungs: HashSet<Rung>,
}

impl Ladder {
    #[must_use]
    pub fn new(cols: usize, rows: u32, rungs: &[Rung]) -> Self {
        Self {
            cols,
            rows,
            rungs: rungs.iter().copied().collect(),
        }
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    fn has_rung(&self, row: u32, col: usize) -> bool {
        u32::try_from(col).is_ok_and(|col| self.rungs.contains(&Rung::new(row, col)))
    }

    fn step(&self, row: u32, lane: usize) -> Move {
        if self.has_rung(row, lane) {
            Move::Right
        } else if lane > 0 && self.has_rung(row, lane - 1) {
            Move::Left
        } else {
            Move::Down
        }
    }

    /// Follow the ladder from `start` and return the lane reached after the last row.
    #[must_use]
    pub fn walk(&self, start: usize) -> usize {
        (0..self.rows).fold(start, |lane, row| apply_move(lane, self.step(row, lane)))
    }

    /// Row-by-row trace from `start`, for highlighting a single traversal.
    #[must_use]
    pub fn path(&self, start: usize) -> Vec<PathStep> {
        let mut lane = start;
        let mut steps = Vec::with_capacity(self.rows as usize);
        for row in 0..self.rows {
            let movement = self.step(row, lane);
            let to = apply_move(lane, movement);
            steps.push(PathStep {
                row,
                from: lane,
                to,
                movement,
            });
            lane = to;
        }
        steps
    }

    /// Terminal lane for every starting lane.
    #[must_use]
    pub fn mapping(&self) -> Mapping {
        (0..self.cols).map(|start| self.walk(start)).collect()
    }
}

const fn apply_move(lane: usize, movement: Move) -> usize {
    match movement {
        Move::Right => lane + 1,
        Move::Left => lane - 1,
        Move::Down => lane,
    }
}

/// Trace a single lane without building a reusable index.
#[must_use]
pub fn walk_ladder(start: usize, cols: usize, rows: u32, rungs: &[Rung]) -> usize {
    Ladder::new(cols, rows, rungs).walk(start)
}

/// Trace every lane.
#[must_use]
pub fn compute_mapping(cols: usize, rows: u32, rungs: &[Rung]) -> Mapping {
    Ladder::new(cols, rows, rungs).mapping()
}

/// True when `mapping` sends lanes `0..len` onto `0..len` without collisions.
#[must_use]
pub fn is_permutation(mapping: &[usize]) -> bool {
    let mut seen = vec![false; mapping.len()];
    for &lane in mapping {
        match seen.get_mut(lane) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Structural defect in a rung set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RungViolation {
    #[error("rung at row {}, col {} lies outside the ladder", .0.row, .0.col)]
    OutOfBounds(Rung),
    #[error("rung at row {}, col {} appears more than once", .0.row, .0.col)]
    Duplicate(Rung),
    #[error("rungs at row {row} touch lane {lane} from both sides")]
    Adjacent { row: u32, lane: u32 },
}

/// Every way `rungs` breaks the ladder shape for a `cols` x `rows` grid.
#[must_use]
pub fn check_rungs(cols: usize, rows: u32, rungs: &[Rung]) -> Vec<RungViolation> {
    let mut violations = Vec::new();
    let mut placed: HashSet<Rung> = HashSet::with_capacity(rungs.len());
    for &rung in rungs {
        let in_bounds = rung.row < rows && (rung.col as usize).saturating_add(1) < cols;
        if !in_bounds {
            violations.push(RungViolation::OutOfBounds(rung));
            continue;
        }
        if !placed.insert(rung) {
            violations.push(RungViolation::Duplicate(rung));
        }
    }
    let mut sorted: Vec<Rung> = placed.into_iter().collect();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if left.row == right.row && left.col + 1 == right.col {
            violations.push(RungViolation::Adjacent {
                row: left.row,
                lane: right.col,
            });
        }
    }
    violations
}

/// Lane, row, and density choices for a fresh draw, clamped to playable bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawParams {
    pub lanes: usize,
    pub rows: u32,
    pub density: f64,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES,
            rows: DEFAULT_ROWS,
            density: DEFAULT_DENSITY,
        }
    }
}

impl DrawParams {
    #[must_use]
    pub fn new(lanes: usize, rows: u32, density: f64) -> Self {
        let density = if density.is_finite() {
            density.clamp(MIN_DENSITY, MAX_DENSITY)
        } else {
            DEFAULT_DENSITY
        };
        Self {
            lanes: lanes.clamp(MIN_LANES, MAX_LANES),
            rows: rows.clamp(MIN_ROWS, MAX_ROWS),
            density,
        }
    }
}

/// Who ends up with what once the ladder is walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub from_idx: usize,
    pub to_idx: usize,
    pub from_name: String,
    pub to_name: String,
}

fn label_or(labels: &[String], idx: usize, prefix: char) -> String {
    labels
        .get(idx)
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map_or_else(|| format!("{prefix}{}", idx + 1), str::to_string)
}

/// Pair each top label with the bottom label its lane lands on.
/// Blank names read as `P1, P2, ...` and blank results as `R1, R2, ...`.
#[must_use]
pub fn assignments(names: &[String], results: &[String], mapping: &[usize]) -> Vec<Assignment> {
    mapping
        .iter()
        .enumerate()
        .map(|(from_idx, &to_idx)| Assignment {
            from_idx,
            to_idx,
            from_name: label_or(names, from_idx, 'P'),
            to_name: label_or(results, to_idx, 'R'),
        })
        .collect()
}
