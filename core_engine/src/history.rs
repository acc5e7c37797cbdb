use std::collections::VecDeque;

use crate::error::GridError;
use crate::grid::{CellProbabilities, Grid, GridBounds, Position, WordSnapshot};

#[derive(Debug, Clone)]
pub struct GridStore {
    grid: Grid,
    bounds: GridBounds,
    past: VecDeque<Grid>,
    future: Vec<Grid>,
    history_limit: usize,
}

impl GridStore {
    pub fn new(
        rows: usize,
        cols: usize,
        bounds: GridBounds,
        history_limit: usize,
    ) -> Result<Self, GridError> {
        bounds.check(rows, cols)?;
        Ok(Self::with_grid(Grid::new(rows, cols), bounds, history_limit))
    }

    pub fn with_grid(grid: Grid, bounds: GridBounds, history_limit: usize) -> Self {
        Self {
            grid,
            bounds,
            past: VecDeque::new(),
            future: Vec::new(),
            history_limit,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn word_snapshot(&self) -> WordSnapshot {
        self.grid.word_snapshot()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// `false` when the word is unchanged; nothing is recorded then.
    pub fn set_cell(&mut self, pos: Position, word: &str) -> Result<bool, GridError> {
        let current = self.grid.cell(pos).ok_or(GridError::OutOfBounds {
            pos,
            rows: self.grid.rows(),
            cols: self.grid.cols(),
        })?;
        if current.word == word {
            return Ok(false);
        }

        self.commit();
        let cell = self.grid.cell_mut(pos)?;
        cell.word = word.to_string();
        if cell.is_blank() {
            cell.probabilities = CellProbabilities::NONE;
        }
        Ok(true)
    }

    pub fn clear_cell(&mut self, pos: Position) -> Result<bool, GridError> {
        let cell = self.grid.cell(pos).ok_or(GridError::OutOfBounds {
            pos,
            rows: self.grid.rows(),
            cols: self.grid.cols(),
        })?;
        if cell.word.is_empty() && cell.probabilities.is_none() {
            return Ok(false);
        }

        self.commit();
        let cell = self.grid.cell_mut(pos)?;
        cell.word.clear();
        cell.probabilities = CellProbabilities::NONE;
        Ok(true)
    }

    pub fn clear_grid(&mut self) -> bool {
        let blank = Grid::new(self.grid.rows(), self.grid.cols());
        if self.grid == blank {
            return false;
        }
        self.commit();
        self.grid = blank;
        true
    }

    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<bool, GridError> {
        self.bounds.check(rows, cols)?;
        if rows == self.grid.rows() && cols == self.grid.cols() {
            return Ok(false);
        }

        self.commit();
        self.grid = self.grid.resized(rows, cols);
        Ok(true)
    }

    // Engine write-back; never recorded in history.
    pub fn apply_probabilities(
        &mut self,
        pos: Position,
        probabilities: CellProbabilities,
    ) -> Result<(), GridError> {
        let cell = self.grid.cell_mut(pos)?;
        cell.probabilities = if cell.is_blank() {
            CellProbabilities::NONE
        } else {
            probabilities
        };
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.grid, previous);
        self.future.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.grid, next);
        self.push_past(current);
        true
    }

    fn commit(&mut self) {
        self.future.clear();
        self.push_past(self.grid.clone());
    }

    fn push_past(&mut self, grid: Grid) {
        if self.history_limit == 0 {
            return;
        }
        if self.past.len() == self.history_limit {
            self.past.pop_front();
        }
        self.past.push_back(grid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(rows: usize, cols: usize) -> GridStore {
        GridStore::new(rows, cols, GridBounds::default(), 100).unwrap()
    }

    fn word(store: &GridStore, row: usize, col: usize) -> &str {
        &store.grid().cell(Position::new(row, col)).unwrap().word
    }

    #[test]
    fn undo_and_redo_walk_word_edits() {
        let mut store = store(3, 3);
        let origin = Position::new(0, 0);
        store.set_cell(origin, "a").unwrap();
        store.set_cell(origin, "b").unwrap();

        assert!(store.undo());
        assert_eq!(word(&store, 0, 0), "a");
        assert!(store.undo());
        assert_eq!(word(&store, 0, 0), "");
        assert!(!store.undo());

        assert!(store.redo());
        assert_eq!(word(&store, 0, 0), "a");
    }

    #[test]
    fn new_edit_drops_redo_stack() {
        let mut store = store(2, 2);
        store.set_cell(Position::new(0, 0), "a").unwrap();
        store.undo();
        assert!(store.can_redo());
        store.set_cell(Position::new(1, 1), "z").unwrap();
        assert!(!store.can_redo());
    }

    #[test]
    fn unchanged_word_records_nothing() {
        let mut store = store(2, 2);
        assert!(store.set_cell(Position::new(0, 0), "a").unwrap());
        assert!(!store.set_cell(Position::new(0, 0), "a").unwrap());
        store.undo();
        assert!(!store.can_undo());
    }

    #[test]
    fn probabilities_are_not_undoable() {
        let mut store = store(2, 2);
        let pos = Position::new(0, 1);
        store.set_cell(pos, "moon").unwrap();
        let probs = CellProbabilities {
            row_probability: Some(0.3),
            col_probability: None,
            combined_probability: None,
        };
        store.apply_probabilities(pos, probs).unwrap();
        assert_eq!(store.grid().cell(pos).unwrap().probabilities, probs);
        assert_eq!(word(&store, 0, 1), "moon");

        store.undo();
        assert_eq!(word(&store, 0, 1), "");
        assert!(!store.can_undo());
    }

    #[test]
    fn blank_cell_refuses_probabilities() {
        let mut store = store(2, 2);
        let pos = Position::new(1, 0);
        store
            .apply_probabilities(
                pos,
                CellProbabilities {
                    row_probability: Some(0.9),
                    col_probability: Some(0.9),
                    combined_probability: Some(0.9),
                },
            )
            .unwrap();
        assert!(store.grid().cell(pos).unwrap().probabilities.is_none());
    }

    #[test]
    fn clearing_a_word_clears_probabilities() {
        let mut store = store(2, 2);
        let pos = Position::new(0, 0);
        store.set_cell(pos, "sun").unwrap();
        store
            .apply_probabilities(
                pos,
                CellProbabilities {
                    row_probability: Some(0.5),
                    col_probability: None,
                    combined_probability: None,
                },
            )
            .unwrap();
        store.set_cell(pos, "").unwrap();
        assert!(store.grid().cell(pos).unwrap().probabilities.is_none());
    }

    #[test]
    fn resize_scenario_drops_corner_and_is_undoable() {
        let mut store = store(3, 3);
        store.set_cell(Position::new(0, 0), "top").unwrap();
        store.set_cell(Position::new(2, 2), "end").unwrap();
        let before = store.grid().clone();

        assert!(store.resize(2, 2).unwrap());
        assert!(store.grid().cell(Position::new(2, 2)).is_none());
        for pos in store.grid().positions() {
            assert_eq!(store.grid().cell(pos), before.cell(pos));
        }

        store.undo();
        assert_eq!(word(&store, 2, 2), "end");
    }

    #[test]
    fn resize_enforces_bounds() {
        let mut store = store(3, 3);
        assert!(store.resize(1, 3).is_err());
        assert!(store.resize(3, 11).is_err());
        assert!(!store.resize(3, 3).unwrap());
        assert!(!store.can_undo());
    }

    #[test]
    fn history_depth_is_bounded() {
        let mut store = GridStore::new(2, 2, GridBounds::default(), 2).unwrap();
        let pos = Position::new(0, 0);
        for word in ["a", "b", "c", "d"] {
            store.set_cell(pos, word).unwrap();
        }
        assert!(store.undo());
        assert!(store.undo());
        assert!(!store.undo());
        assert_eq!(word(&store, 0, 0), "b");
    }

    #[test]
    fn out_of_range_edit_is_an_error() {
        let mut store = store(2, 2);
        assert!(matches!(
            store.set_cell(Position::new(4, 0), "x"),
            Err(GridError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn clear_grid_keeps_dimensions() {
        let mut store = store(3, 4);
        store.set_cell(Position::new(1, 1), "x").unwrap();
        assert!(store.clear_grid());
        assert_eq!((store.grid().rows(), store.grid().cols()), (3, 4));
        assert!(store.grid().non_empty_positions().is_empty());
        store.undo();
        assert_eq!(word(&store, 1, 1), "x");
    }

    #[test]
    fn clearing_an_empty_grid_records_nothing() {
        let mut store = store(3, 3);
        assert!(!store.clear_grid());
        assert!(!store.can_undo());
    }
}
