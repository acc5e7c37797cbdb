use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use wordgrid_core::{
    affected_positions, col_context, row_context, CellProbabilities, Grid, GridStore,
    PhraseContext, Position, WordSnapshot,
};

use crate::debounce::Debouncer;
use crate::engine::SuggestionEngine;
use crate::error::EngineError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub scored: usize,
    pub cleared: usize,
    pub stale: usize,
    pub failed: usize,
}

enum Outcome {
    Clear,
    Scored(Result<CellProbabilities, EngineError>),
}

// What a cell was scored against. A result only lands if the grid still
// shows the same word with the same row and column context.
struct Scored {
    pos: Position,
    word: String,
    row: PhraseContext,
    col: PhraseContext,
}

impl Scored {
    fn is_current(&self, grid: &Grid) -> bool {
        grid.cell(self.pos)
            .is_some_and(|cell| cell.word == self.word)
            && row_context(grid, self.pos) == self.row
            && col_context(grid, self.pos) == self.col
    }
}

pub struct RecalcScheduler {
    engine: Arc<SuggestionEngine>,
    store: Arc<RwLock<GridStore>>,
    pending: Mutex<BTreeSet<Position>>,
    previous: Mutex<Option<WordSnapshot>>,
    debouncer: Debouncer,
}

impl RecalcScheduler {
    pub fn new(
        engine: Arc<SuggestionEngine>,
        store: Arc<RwLock<GridStore>>,
        debouncer: Debouncer,
    ) -> Self {
        Self {
            engine,
            store,
            pending: Mutex::new(BTreeSet::new()),
            previous: Mutex::new(None),
            debouncer,
        }
    }

    fn pending(&self) -> MutexGuard<'_, BTreeSet<Position>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn pending_positions(&self) -> Vec<Position> {
        self.pending().iter().copied().collect()
    }

    /// The first call only establishes the baseline.
    pub fn detect_changes(
        &self,
        current: WordSnapshot,
        rows: usize,
        cols: usize,
    ) -> BTreeSet<Position> {
        let mut previous = self
            .previous
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(before) = previous.replace(current.clone()) else {
            return BTreeSet::new();
        };
        before
            .changed_positions(&current)
            .into_iter()
            .flat_map(|pos| affected_positions(pos, rows, cols))
            .collect()
    }

    pub async fn observe(self: &Arc<Self>) -> Option<JoinHandle<bool>> {
        let (snapshot, rows, cols) = {
            let store = self.store.read().await;
            (store.word_snapshot(), store.grid().rows(), store.grid().cols())
        };
        let affected = self.detect_changes(snapshot, rows, cols);
        if affected.is_empty() {
            return None;
        }
        debug!(cells = affected.len(), "grid change queued for recalculation");
        Some(self.queue(affected))
    }

    pub fn queue(
        self: &Arc<Self>,
        positions: impl IntoIterator<Item = Position>,
    ) -> JoinHandle<bool> {
        self.pending().extend(positions);
        let scheduler = self.clone();
        self.debouncer.trigger(move || async move {
            scheduler.flush().await;
        })
    }

    pub async fn recalculate_all(self: &Arc<Self>) -> Option<JoinHandle<bool>> {
        let filled = self.store.read().await.grid().non_empty_positions();
        if filled.is_empty() {
            return None;
        }
        info!(cells = filled.len(), "credential available, recalculating all cells");
        Some(self.queue(filled))
    }

    /// Without a credential, cells that need a call stay pending.
    pub async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let batch = std::mem::take(&mut *self.pending());
        if batch.is_empty() {
            return report;
        }

        let configured = self.engine.is_configured();
        let grid = self.store.read().await.grid().clone();
        let mut deferred = BTreeSet::new();
        let mut tasks = JoinSet::new();
        for pos in batch {
            let Some(cell) = grid.cell(pos) else {
                continue;
            };
            let scored = Scored {
                pos,
                word: cell.word.clone(),
                row: row_context(&grid, pos),
                col: col_context(&grid, pos),
            };
            if cell.is_blank() || (scored.row.is_empty() && scored.col.is_empty()) {
                tasks.spawn(async move { (scored, Outcome::Clear) });
                continue;
            }
            if !configured {
                deferred.insert(pos);
                continue;
            }
            let engine = self.engine.clone();
            tasks.spawn(async move {
                let result = engine
                    .score_existing_word(&scored.row, &scored.col, &scored.word)
                    .await;
                (scored, Outcome::Scored(result))
            });
        }
        if !deferred.is_empty() {
            debug!(cells = deferred.len(), "no credential, leaving recalculation pending");
            self.pending().extend(deferred);
        }

        while let Some(joined) = tasks.join_next().await {
            let (scored, outcome) = match joined {
                Ok(result) => result,
                Err(error) => {
                    warn!("recalculation task failed: {error}");
                    report.failed += 1;
                    continue;
                }
            };
            let pos = scored.pos;
            let probabilities = match outcome {
                Outcome::Clear => CellProbabilities::NONE,
                Outcome::Scored(Ok(probabilities)) => probabilities,
                Outcome::Scored(Err(error)) => {
                    warn!(row = pos.row, col = pos.col, "keeping previous probabilities: {error}");
                    report.failed += 1;
                    continue;
                }
            };

            let mut store = self.store.write().await;
            if !scored.is_current(store.grid()) {
                report.stale += 1;
                continue;
            }
            if store.apply_probabilities(pos, probabilities).is_ok() {
                if probabilities.is_none() {
                    report.cleared += 1;
                } else {
                    report.scored += 1;
                }
            }
        }

        debug!(
            scored = report.scored,
            cleared = report.cleared,
            stale = report.stale,
            failed = report.failed,
            "recalculation batch applied"
        );
        report
    }
}
