use serde::{Deserialize, Serialize};
use wordgrid_core::{Cell, Grid, HeatBand, SuggestionMode};

use crate::cache::CacheStats;
use crate::suggestions::SuggestionState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    Ping,
    Grid,
    SetCell {
        row: usize,
        col: usize,
        word: String,
    },
    ClearCell {
        row: usize,
        col: usize,
    },
    ClearGrid,
    Resize {
        rows: usize,
        cols: usize,
    },
    Undo,
    Redo,
    Select {
        row: usize,
        col: usize,
    },
    Deselect,
    Suggest {
        row: usize,
        col: usize,
        #[serde(default)]
        mode: Option<SuggestionMode>,
    },
    Suggestions,
    SetMode {
        mode: SuggestionMode,
    },
    SetApiKey {
        api_key: String,
    },
    Preview {
        row: usize,
        col: usize,
    },
    CacheStats,
    ClearCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    Pong,
    Ack,
    Grid(GridView),
    Suggestions(SuggestionState),
    Preview(PreviewView),
    CacheStats(CacheStats),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    OutOfBounds,
    NoCredential,
    Upstream,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellView {
    pub id: String,
    pub word: String,
    pub row_probability: Option<f64>,
    pub col_probability: Option<f64>,
    pub combined_probability: Option<f64>,
    pub heat: HeatBand,
}

impl From<&Cell> for CellView {
    fn from(cell: &Cell) -> Self {
        let probabilities = cell.probabilities;
        let display = probabilities
            .combined_probability
            .or(probabilities.row_probability)
            .or(probabilities.col_probability);
        Self {
            id: cell.id.clone(),
            word: cell.word.clone(),
            row_probability: probabilities.row_probability,
            col_probability: probabilities.col_probability,
            combined_probability: probabilities.combined_probability,
            heat: HeatBand::from_probability(display),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridView {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<CellView>>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl GridView {
    pub fn new(grid: &Grid, can_undo: bool, can_redo: bool) -> Self {
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            cells: grid
                .row_cells()
                .map(|line| line.iter().map(CellView::from).collect())
                .collect(),
            can_undo,
            can_redo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewView {
    pub row_phrase: Option<String>,
    pub col_phrase: Option<String>,
}
