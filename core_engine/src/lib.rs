//! Grid model, undo history, phrase context extraction and candidate scoring
//! for the word grid. Everything here is synchronous and free of I/O; the
//! daemon crate drives it with completion data.

pub mod context;
pub mod error;
pub mod grid;
pub mod history;
pub mod scoring;

pub use context::{
    affected_positions, axis_context, col_context, row_context, to_prompt_phrase, Axis,
    PhraseContext,
};
pub use error::GridError;
pub use grid::{Cell, CellProbabilities, Grid, GridBounds, Position, WordSnapshot};
pub use history::GridStore;
pub use scoring::{
    floored_geometric_mean, normalize_word, rank_candidates, HeatBand, ScoringPolicy, Suggestion,
    SuggestionMode, SuggestionSource, WordFrequency,
};
