use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use wordgrid_core::{GridStore, Position, Suggestion, SuggestionMode};

use crate::debounce::Debouncer;
use crate::engine::SuggestionEngine;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Debouncing,
    Fetching,
    Resolved,
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionState {
    pub seq: u64,
    pub position: Option<Position>,
    pub mode: SuggestionMode,
    pub status: FetchStatus,
    pub suggestions: Vec<Suggestion>,
    pub error: Option<String>,
}

pub struct SuggestionTracker {
    engine: Arc<SuggestionEngine>,
    store: Arc<RwLock<GridStore>>,
    debouncer: Debouncer,
    state: Mutex<SuggestionState>,
}

impl SuggestionTracker {
    pub fn new(
        engine: Arc<SuggestionEngine>,
        store: Arc<RwLock<GridStore>>,
        debouncer: Debouncer,
        mode: SuggestionMode,
    ) -> Self {
        Self {
            engine,
            store,
            debouncer,
            state: Mutex::new(SuggestionState {
                mode,
                ..SuggestionState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SuggestionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SuggestionState {
        self.state().clone()
    }

    pub fn mode(&self) -> SuggestionMode {
        self.state().mode
    }

    pub fn select(self: &Arc<Self>, pos: Position) -> JoinHandle<bool> {
        {
            let mut state = self.state();
            state.seq += 1;
            state.position = Some(pos);
            state.status = FetchStatus::Debouncing;
        }
        self.schedule()
    }

    pub fn set_mode(self: &Arc<Self>, mode: SuggestionMode) -> Option<JoinHandle<bool>> {
        self.state().mode = mode;
        self.refresh()
    }

    pub fn refresh(self: &Arc<Self>) -> Option<JoinHandle<bool>> {
        {
            let mut state = self.state();
            state.position?;
            state.seq += 1;
            state.status = FetchStatus::Debouncing;
        }
        Some(self.schedule())
    }

    pub fn clear_selection(&self) {
        self.debouncer.cancel();
        let mut state = self.state();
        let mode = state.mode;
        *state = SuggestionState {
            seq: state.seq + 1,
            mode,
            ..SuggestionState::default()
        };
    }

    fn schedule(self: &Arc<Self>) -> JoinHandle<bool> {
        let tracker = self.clone();
        self.debouncer.trigger(move || async move {
            let target = {
                let state = tracker.state();
                state.position.map(|pos| (pos, state.mode))
            };
            if let Some((pos, mode)) = target {
                let seq = tracker.issue(pos, mode);
                tracker.complete(seq, pos, mode).await;
            }
        })
    }

    pub fn issue(&self, pos: Position, mode: SuggestionMode) -> u64 {
        let mut state = self.state();
        state.seq += 1;
        state.position = Some(pos);
        state.mode = mode;
        state.status = FetchStatus::Fetching;
        state.seq
    }

    /// Applies the result only if no newer request was issued meanwhile.
    pub async fn complete(&self, seq: u64, pos: Position, mode: SuggestionMode) -> FetchOutcome {
        let grid = self.store.read().await.grid().clone();
        let result = self.engine.suggest(&grid, pos, mode).await;

        let mut state = self.state();
        if state.seq != seq {
            debug!(seq, latest = state.seq, "discarding stale suggestions");
            return FetchOutcome::Stale;
        }
        match result {
            Ok(suggestions) => {
                state.status = FetchStatus::Resolved;
                state.suggestions = suggestions;
                state.error = None;
            }
            Err(error) => {
                state.status = match error {
                    EngineError::NoCredential => FetchStatus::Unavailable,
                    EngineError::UpstreamUnavailable(_) => FetchStatus::Failed,
                };
                state.suggestions.clear();
                state.error = Some(error.to_string());
            }
        }
        FetchOutcome::Applied
    }

    pub async fn fetch_now(&self, pos: Position, mode: SuggestionMode) -> FetchOutcome {
        let seq = self.issue(pos, mode);
        self.complete(seq, pos, mode).await
    }
}
