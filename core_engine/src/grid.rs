use serde::{Deserialize, Serialize};

use crate::error::GridError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// `None` means not computed, which is distinct from a low score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellProbabilities {
    pub row_probability: Option<f64>,
    pub col_probability: Option<f64>,
    pub combined_probability: Option<f64>,
}

impl CellProbabilities {
    pub const NONE: Self = Self {
        row_probability: None,
        col_probability: None,
        combined_probability: None,
    };

    pub fn is_none(&self) -> bool {
        self.row_probability.is_none()
            && self.col_probability.is_none()
            && self.combined_probability.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub word: String,
    #[serde(flatten)]
    pub probabilities: CellProbabilities,
}

impl Cell {
    pub fn empty(pos: Position) -> Self {
        Self {
            id: cell_id(pos),
            word: String::new(),
            probabilities: CellProbabilities::NONE,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.word.trim().is_empty()
    }
}

fn cell_id(pos: Position) -> String {
    format!("{}-{}", pos.row, pos.col)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self { min: 2, max: 10 }
    }
}

impl GridBounds {
    pub fn check(&self, rows: usize, cols: usize) -> Result<(), GridError> {
        for value in [rows, cols] {
            if value < self.min || value > self.max {
                return Err(GridError::DimensionOutOfRange {
                    rows,
                    cols,
                    min: self.min,
                    max: self.max,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        let cells = (0..rows)
            .map(|row| (0..cols).map(|col| Cell::empty(Position::new(row, col))).collect())
            .collect();
        Self { rows, cols, cells }
    }

    /// Ragged input is padded with empty cells to the widest row.
    pub fn from_words<S: AsRef<str>>(words: &[Vec<S>]) -> Self {
        let rows = words.len();
        let cols = words.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = Self::new(rows, cols);
        for (row, line) in words.iter().enumerate() {
            for (col, word) in line.iter().enumerate() {
                grid.cells[row][col].word = word.as_ref().to_string();
            }
        }
        grid
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(pos.row)?.get(pos.col)
    }

    pub(crate) fn cell_mut(&mut self, pos: Position) -> Result<&mut Cell, GridError> {
        let (rows, cols) = (self.rows, self.cols);
        self.cells
            .get_mut(pos.row)
            .and_then(|line| line.get_mut(pos.col))
            .ok_or(GridError::OutOfBounds { pos, rows, cols })
    }

    /// Trimmed word at `pos`, or `None` for blank and out-of-range cells.
    pub fn word_at(&self, pos: Position) -> Option<&str> {
        let word = self.cell(pos)?.word.trim();
        (!word.is_empty()).then_some(word)
    }

    pub fn row_cells(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.iter().map(Vec::as_slice)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Position::new(row, col)))
    }

    pub fn non_empty_positions(&self) -> Vec<Position> {
        self.positions()
            .filter(|pos| self.word_at(*pos).is_some())
            .collect()
    }

    pub fn resized(&self, rows: usize, cols: usize) -> Self {
        let mut next = Self::new(rows, cols);
        for row in 0..rows.min(self.rows) {
            for col in 0..cols.min(self.cols) {
                let pos = Position::new(row, col);
                let mut cell = self.cells[row][col].clone();
                cell.id = cell_id(pos);
                next.cells[row][col] = cell;
            }
        }
        next
    }

    pub fn word_snapshot(&self) -> WordSnapshot {
        WordSnapshot(
            self.cells
                .iter()
                .map(|line| line.iter().map(|cell| cell.word.clone()).collect())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSnapshot(Vec<Vec<String>>);

impl WordSnapshot {
    fn word(&self, pos: Position) -> &str {
        self.0
            .get(pos.row)
            .and_then(|line| line.get(pos.col))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn dims(&self) -> (usize, usize) {
        (self.0.len(), self.0.iter().map(Vec::len).max().unwrap_or(0))
    }

    /// Cells missing on either side compare as empty, so a filled cell dropped
    /// by a shrink is reported at its old position.
    pub fn changed_positions(&self, current: &WordSnapshot) -> Vec<Position> {
        let (old_rows, old_cols) = self.dims();
        let (new_rows, new_cols) = current.dims();
        let mut changed = Vec::new();
        for row in 0..old_rows.max(new_rows) {
            for col in 0..old_cols.max(new_cols) {
                let pos = Position::new(row, col);
                if self.word(pos) != current.word(pos) {
                    changed.push(pos);
                }
            }
        }
        changed
    }
}
