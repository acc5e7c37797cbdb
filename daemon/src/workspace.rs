use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{debug, info};
use wordgrid_core::{
    col_context, row_context, to_prompt_phrase, GridError, GridStore, PhraseContext, Position,
};

use crate::completion::{CompletionClient, OpenAiBackend};
use crate::config::{DaemonConfig, ModelConfig};
use crate::debounce::Debouncer;
use crate::engine::SuggestionEngine;
use crate::protocol::{ErrorCode, ErrorResponse, GridView, PreviewView, RequestBody, ResponseBody};
use crate::scheduler::RecalcScheduler;
use crate::suggestions::{FetchOutcome, FetchStatus, SuggestionTracker};

pub struct Workspace {
    store: Arc<RwLock<GridStore>>,
    engine: Arc<SuggestionEngine>,
    scheduler: Arc<RecalcScheduler>,
    tracker: Arc<SuggestionTracker>,
    model: ModelConfig,
}

impl Workspace {
    pub fn new(config: &DaemonConfig, client: CompletionClient) -> Result<Self> {
        let store = GridStore::new(
            config.grid.rows,
            config.grid.cols,
            config.grid.bounds(),
            config.grid.history_limit,
        )?;
        let baseline = store.word_snapshot();
        let (rows, cols) = (store.grid().rows(), store.grid().cols());
        let store = Arc::new(RwLock::new(store));

        let engine = Arc::new(SuggestionEngine::new(
            &config.suggest,
            &config.cache,
            client,
        ));
        let scheduler = Arc::new(RecalcScheduler::new(
            engine.clone(),
            store.clone(),
            Debouncer::new(config.schedule.debounce()),
        ));
        scheduler.detect_changes(baseline, rows, cols);
        let tracker = Arc::new(SuggestionTracker::new(
            engine.clone(),
            store.clone(),
            Debouncer::new(config.schedule.debounce()),
            config.suggest.default_mode,
        ));

        Ok(Self {
            store,
            engine,
            scheduler,
            tracker,
            model: config.model.clone(),
        })
    }

    pub async fn handle(&self, body: RequestBody) -> ResponseBody {
        match self.execute(body).await {
            Ok(response) => response,
            Err(error) => {
                debug!(code = ?error.code, message = %error.message, "command rejected");
                ResponseBody::Error(error)
            }
        }
    }

    async fn execute(&self, body: RequestBody) -> Result<ResponseBody, ErrorResponse> {
        match body {
            RequestBody::Ping => Ok(ResponseBody::Pong),
            RequestBody::Grid => Ok(self.grid_view().await),
            RequestBody::SetCell { row, col, word } => {
                let changed = self
                    .store
                    .write()
                    .await
                    .set_cell(Position::new(row, col), &word)
                    .map_err(grid_error)?;
                self.edited(changed).await
            }
            RequestBody::ClearCell { row, col } => {
                let changed = self
                    .store
                    .write()
                    .await
                    .clear_cell(Position::new(row, col))
                    .map_err(grid_error)?;
                self.edited(changed).await
            }
            RequestBody::ClearGrid => {
                let changed = self.store.write().await.clear_grid();
                self.edited(changed).await
            }
            RequestBody::Resize { rows, cols } => {
                let changed = self
                    .store
                    .write()
                    .await
                    .resize(rows, cols)
                    .map_err(grid_error)?;
                self.edited(changed).await
            }
            RequestBody::Undo => {
                let changed = self.store.write().await.undo();
                self.edited(changed).await
            }
            RequestBody::Redo => {
                let changed = self.store.write().await.redo();
                self.edited(changed).await
            }
            RequestBody::Select { row, col } => {
                let pos = self.checked_position(row, col).await?;
                self.tracker.select(pos);
                Ok(ResponseBody::Suggestions(self.tracker.snapshot()))
            }
            RequestBody::Deselect => {
                self.tracker.clear_selection();
                Ok(ResponseBody::Suggestions(self.tracker.snapshot()))
            }
            RequestBody::Suggest { row, col, mode } => {
                let pos = self.checked_position(row, col).await?;
                let mode = mode.unwrap_or_else(|| self.tracker.mode());
                let outcome = self.tracker.fetch_now(pos, mode).await;
                let state = self.tracker.snapshot();
                if outcome == FetchOutcome::Applied {
                    let message = state.error.clone().unwrap_or_default();
                    match state.status {
                        FetchStatus::Unavailable => {
                            return Err(ErrorResponse::new(ErrorCode::NoCredential, message))
                        }
                        FetchStatus::Failed => {
                            return Err(ErrorResponse::new(ErrorCode::Upstream, message))
                        }
                        _ => {}
                    }
                }
                Ok(ResponseBody::Suggestions(state))
            }
            RequestBody::Suggestions => Ok(ResponseBody::Suggestions(self.tracker.snapshot())),
            RequestBody::SetMode { mode } => {
                self.tracker.set_mode(mode);
                Ok(ResponseBody::Suggestions(self.tracker.snapshot()))
            }
            RequestBody::SetApiKey { api_key } => {
                let client = self.client_for_key(api_key.trim())?;
                self.set_client(client).await;
                Ok(ResponseBody::Ack)
            }
            RequestBody::Preview { row, col } => {
                let pos = self.checked_position(row, col).await?;
                let store = self.store.read().await;
                let phrase = |context: PhraseContext| {
                    (!context.is_empty()).then(|| to_prompt_phrase(&context))
                };
                Ok(ResponseBody::Preview(PreviewView {
                    row_phrase: phrase(row_context(store.grid(), pos)),
                    col_phrase: phrase(col_context(store.grid(), pos)),
                }))
            }
            RequestBody::CacheStats => Ok(ResponseBody::CacheStats(self.engine.cache_stats())),
            RequestBody::ClearCache => {
                self.engine.clear_cache();
                Ok(ResponseBody::Ack)
            }
        }
    }

    fn client_for_key(&self, api_key: &str) -> Result<CompletionClient, ErrorResponse> {
        if api_key.is_empty() {
            return Ok(CompletionClient::NotConfigured);
        }
        OpenAiBackend::new(&self.model, api_key.to_string())
            .map(CompletionClient::configured)
            .map_err(|error| ErrorResponse::new(ErrorCode::InvalidRequest, format!("{error:#}")))
    }

    pub async fn set_client(&self, client: CompletionClient) {
        let configured = client.is_configured();
        if self.engine.set_client(client) {
            self.scheduler.recalculate_all().await;
        }
        info!(configured, "completion credential updated");
        self.tracker.refresh();
    }

    async fn edited(&self, changed: bool) -> Result<ResponseBody, ErrorResponse> {
        if changed {
            self.scheduler.observe().await;
            let selected = self.tracker.snapshot().position;
            let still_on_grid = match selected {
                Some(pos) => self.store.read().await.grid().contains(pos),
                None => true,
            };
            if still_on_grid {
                self.tracker.refresh();
            } else {
                self.tracker.clear_selection();
            }
        }
        Ok(self.grid_view().await)
    }

    async fn checked_position(&self, row: usize, col: usize) -> Result<Position, ErrorResponse> {
        let pos = Position::new(row, col);
        let store = self.store.read().await;
        let grid = store.grid();
        if grid.contains(pos) {
            Ok(pos)
        } else {
            Err(grid_error(GridError::OutOfBounds {
                pos,
                rows: grid.rows(),
                cols: grid.cols(),
            }))
        }
    }

    async fn grid_view(&self) -> ResponseBody {
        let store = self.store.read().await;
        ResponseBody::Grid(GridView::new(
            store.grid(),
            store.can_undo(),
            store.can_redo(),
        ))
    }
}

fn grid_error(error: GridError) -> ErrorResponse {
    let code = match error {
        GridError::OutOfBounds { .. } => ErrorCode::OutOfBounds,
        GridError::DimensionOutOfRange { .. } => ErrorCode::InvalidRequest,
    };
    ErrorResponse::new(code, error.to_string())
}
