//! Phrase context around a grid position.
//!
//! A context collects the non-empty words strictly before and strictly after
//! a position along one axis. Out-of-range positions produce an empty context.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, Position};

pub const PLACEHOLDER: &str = "___";
const FINGERPRINT_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Row,
    Column,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseContext {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl PhraseContext {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn leading_prompt(&self) -> String {
        self.before.join(" ")
    }

    pub fn fingerprint(&self) -> String {
        self.before.join(FINGERPRINT_SEPARATOR)
    }
}

pub fn row_context(grid: &Grid, pos: Position) -> PhraseContext {
    if !grid.contains(pos) {
        return PhraseContext::default();
    }
    collect(
        grid,
        (0..pos.col).map(|col| Position::new(pos.row, col)),
        (pos.col + 1..grid.cols()).map(|col| Position::new(pos.row, col)),
    )
}

pub fn col_context(grid: &Grid, pos: Position) -> PhraseContext {
    if !grid.contains(pos) {
        return PhraseContext::default();
    }
    collect(
        grid,
        (0..pos.row).map(|row| Position::new(row, pos.col)),
        (pos.row + 1..grid.rows()).map(|row| Position::new(row, pos.col)),
    )
}

pub fn axis_context(grid: &Grid, pos: Position, axis: Axis) -> PhraseContext {
    match axis {
        Axis::Row => row_context(grid, pos),
        Axis::Column => col_context(grid, pos),
    }
}

fn collect(
    grid: &Grid,
    before: impl Iterator<Item = Position>,
    after: impl Iterator<Item = Position>,
) -> PhraseContext {
    PhraseContext {
        before: words_at(grid, before),
        after: words_at(grid, after),
    }
}

fn words_at(grid: &Grid, positions: impl Iterator<Item = Position>) -> Vec<String> {
    positions
        .filter_map(|pos| grid.word_at(pos))
        .map(str::to_string)
        .collect()
}

/// A `pos` outside the grid only affects the surviving part of its row or
/// column.
pub fn affected_positions(pos: Position, rows: usize, cols: usize) -> BTreeSet<Position> {
    let mut affected = BTreeSet::new();
    if pos.row < rows {
        affected.extend((0..cols).map(|col| Position::new(pos.row, col)));
    }
    if pos.col < cols {
        affected.extend((0..rows).map(|row| Position::new(row, pos.col)));
    }
    affected
}

/// Renders `before ___ after`, leaving out a side with no words.
pub fn to_prompt_phrase(context: &PhraseContext) -> String {
    let mut parts = Vec::with_capacity(3);
    if !context.before.is_empty() {
        parts.push(context.before.join(" "));
    }
    parts.push(PLACEHOLDER.to_string());
    if !context.after.is_empty() {
        parts.push(context.after.join(" "));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        Grid::from_words(&[
            vec!["sun", "", "rises"],
            vec!["", "", ""],
            vec!["sets", "", "slowly"],
        ])
    }

    fn ctx(before: &[&str], after: &[&str]) -> PhraseContext {
        PhraseContext {
            before: before.iter().map(|w| w.to_string()).collect(),
            after: after.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn row_context_skips_blanks_and_keeps_order() {
        let grid = sample();
        let target = Position::new(0, 1);
        assert_eq!(row_context(&grid, target), ctx(&["sun"], &["rises"]));
        assert_eq!(to_prompt_phrase(&row_context(&grid, target)), "sun ___ rises");
    }

    #[test]
    fn column_context_is_strictly_per_column() {
        let grid = sample();
        assert!(col_context(&grid, Position::new(0, 1)).is_empty());
        assert_eq!(col_context(&grid, Position::new(0, 0)), ctx(&[], &["sets"]));
        assert_eq!(col_context(&grid, Position::new(1, 2)), ctx(&["rises"], &["slowly"]));
    }

    #[test]
    fn words_are_trimmed() {
        let grid = Grid::from_words(&[vec!["  big ", "", " day"]]);
        assert_eq!(row_context(&grid, Position::new(0, 1)), ctx(&["big"], &["day"]));
    }

    #[test]
    fn out_of_range_is_empty_context() {
        let grid = sample();
        assert!(row_context(&grid, Position::new(9, 0)).is_empty());
        assert!(col_context(&grid, Position::new(0, 9)).is_empty());
        assert!(affected_positions(Position::new(3, 4), 3, 3).is_empty());
    }

    #[test]
    fn dropped_cell_affects_surviving_row_or_column() {
        let column = affected_positions(Position::new(2, 0), 2, 2);
        assert_eq!(
            column.into_iter().collect::<Vec<_>>(),
            vec![Position::new(0, 0), Position::new(1, 0)]
        );
        let row = affected_positions(Position::new(0, 2), 2, 2);
        assert_eq!(
            row.into_iter().collect::<Vec<_>>(),
            vec![Position::new(0, 0), Position::new(0, 1)]
        );
    }

    #[test]
    fn prompt_phrase_omits_empty_sides() {
        assert_eq!(to_prompt_phrase(&ctx(&[], &[])), "___");
        assert_eq!(to_prompt_phrase(&ctx(&["a", "b"], &[])), "a b ___");
        assert_eq!(to_prompt_phrase(&ctx(&[], &["c"])), "___ c");
    }

    #[test]
    fn affected_positions_cover_row_and_column_once() {
        let affected = affected_positions(Position::new(1, 2), 3, 4);
        assert_eq!(affected.len(), 4 + 3 - 1);
        assert!(affected.contains(&Position::new(1, 2)));
        assert!(affected.contains(&Position::new(1, 0)));
        assert!(affected.contains(&Position::new(0, 2)));
        assert!(!affected.contains(&Position::new(0, 0)));
    }

    #[test]
    fn fingerprint_joins_leading_words() {
        let context = ctx(&["the", "quick"], &["fox"]);
        assert_eq!(context.fingerprint(), "the|quick");
        assert_eq!(context.leading_prompt(), "the quick");
    }
}
