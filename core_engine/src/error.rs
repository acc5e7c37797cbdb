use thiserror::Error;

use crate::grid::Position;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("position ({}, {}) is outside the {rows}x{cols} grid", pos.row, pos.col)]
    OutOfBounds {
        pos: Position,
        rows: usize,
        cols: usize,
    },

    #[error("grid size {rows}x{cols} is outside the allowed range {min}..={max}")]
    DimensionOutOfRange {
        rows: usize,
        cols: usize,
        min: usize,
        max: usize,
    },
}
