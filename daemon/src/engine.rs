use std::sync::RwLock;

use tracing::{debug, warn};
use wordgrid_core::{
    col_context, floored_geometric_mean, normalize_word, rank_candidates, row_context,
    CellProbabilities, Grid, PhraseContext, Position, ScoringPolicy, Suggestion, SuggestionMode,
    WordFrequency,
};

use crate::cache::{CacheStats, DistributionMemo, ProbabilityCache};
use crate::completion::CompletionClient;
use crate::config::{CacheConfig, SuggestConfig};
use crate::error::EngineError;

pub struct SuggestionEngine {
    client: RwLock<CompletionClient>,
    probabilities: ProbabilityCache,
    distributions: DistributionMemo,
    policy: ScoringPolicy,
    samples: u32,
    distribution_cap: usize,
}

impl SuggestionEngine {
    pub fn new(suggest: &SuggestConfig, cache: &CacheConfig, client: CompletionClient) -> Self {
        Self {
            client: RwLock::new(client),
            probabilities: ProbabilityCache::new(cache),
            distributions: DistributionMemo::new(cache.capacity, cache.ttl()),
            policy: suggest.policy(),
            samples: suggest.completions_per_request,
            distribution_cap: suggest.distribution_cap,
        }
    }

    fn client(&self) -> CompletionClient {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.client().is_configured()
    }

    /// `true` when this turns an unconfigured engine into a configured one.
    pub fn set_client(&self, client: CompletionClient) -> bool {
        let mut slot = self
            .client
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let became_available = !slot.is_configured() && client.is_configured();
        *slot = client;
        became_available
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.probabilities.stats()
    }

    pub fn clear_cache(&self) {
        self.probabilities.clear();
        self.distributions.clear();
    }

    #[cfg(test)]
    pub fn probability_cache(&self) -> &ProbabilityCache {
        &self.probabilities
    }

    pub async fn suggest(
        &self,
        grid: &Grid,
        pos: Position,
        mode: SuggestionMode,
    ) -> Result<Vec<Suggestion>, EngineError> {
        let client = self.client();
        if !client.is_configured() {
            return Err(EngineError::NoCredential);
        }

        let row = row_context(grid, pos);
        let col = col_context(grid, pos);
        if row.is_empty() && col.is_empty() {
            debug!(row = pos.row, col = pos.col, "no context, skipping suggestions");
            return Ok(Vec::new());
        }

        let (row_dist, col_dist) = tokio::join!(
            self.axis_distribution(&client, &row),
            self.axis_distribution(&client, &col)
        );
        let (row_words, col_words) = settle_axes(row_dist, col_dist)?;

        let ranked = rank_candidates(&row_words, &col_words, mode, &self.policy);
        debug!(
            row = pos.row,
            col = pos.col,
            ?mode,
            candidates = ranked.len(),
            "ranked suggestions"
        );
        Ok(ranked)
    }

    pub async fn score_existing_word(
        &self,
        row: &PhraseContext,
        col: &PhraseContext,
        word: &str,
    ) -> Result<CellProbabilities, EngineError> {
        let word = normalize_word(word);
        if word.is_empty() || (row.is_empty() && col.is_empty()) {
            return Ok(CellProbabilities::NONE);
        }
        let client = self.client();
        if !client.is_configured() {
            return Err(EngineError::NoCredential);
        }

        let (row_p, col_p) = tokio::join!(
            self.word_probability(&client, row, &word),
            self.word_probability(&client, col, &word)
        );
        let (row_p, col_p) = settle_axes(row_p, col_p)?;

        let row_probability = (!row.is_empty()).then_some(row_p);
        let col_probability = (!col.is_empty()).then_some(col_p);
        let combined_probability = match (row_probability, col_probability) {
            (Some(r), Some(c)) => Some(floored_geometric_mean(
                r,
                c,
                self.policy.existing_word_floor,
            )),
            _ => None,
        };
        Ok(CellProbabilities {
            row_probability,
            col_probability,
            combined_probability,
        })
    }

    async fn word_probability(
        &self,
        client: &CompletionClient,
        context: &PhraseContext,
        word: &str,
    ) -> Option<Result<f64, EngineError>> {
        if context.before.is_empty() {
            return None;
        }
        let fingerprint = context.fingerprint();
        if let Some(probability) = self.probabilities.get(&fingerprint, word) {
            debug!(%fingerprint, word, "probability cache hit");
            return Some(Ok(probability));
        }

        let distribution = match self.axis_distribution(client, context).await? {
            Ok(distribution) => distribution,
            Err(error) => return Some(Err(error)),
        };
        let probability = distribution
            .iter()
            .find(|entry| entry.word == word)
            .map_or(0.0, |entry| entry.probability);
        self.probabilities.put(&fingerprint, word, probability);
        Some(Ok(probability))
    }

    async fn axis_distribution(
        &self,
        client: &CompletionClient,
        context: &PhraseContext,
    ) -> Option<Result<Vec<WordFrequency>, EngineError>> {
        if context.before.is_empty() {
            return None;
        }
        let fingerprint = context.fingerprint();
        if let Some(cached) = self.distributions.get(&fingerprint) {
            debug!(%fingerprint, "distribution cache hit");
            return Some(Ok(cached));
        }

        let fetched = client
            .complete(&context.leading_prompt(), self.samples, self.distribution_cap)
            .await;
        if let Ok(distribution) = &fetched {
            for entry in distribution {
                self.probabilities
                    .put(&fingerprint, &entry.word, entry.probability);
            }
            self.distributions.put(fingerprint, distribution.clone());
        }
        Some(fetched)
    }
}

// Errors only when every attempted axis failed.
fn settle_axes<T: Default>(
    row: Option<Result<T, EngineError>>,
    col: Option<Result<T, EngineError>>,
) -> Result<(T, T), EngineError> {
    match (row, col) {
        (Some(Err(error)), Some(Err(_))) | (Some(Err(error)), None) | (None, Some(Err(error))) => {
            Err(error)
        }
        (row, col) => {
            let keep = |outcome: Option<Result<T, EngineError>>, axis: &str| match outcome {
                Some(Ok(value)) => value,
                Some(Err(error)) => {
                    warn!(axis, "axis dropped from scoring: {error}");
                    T::default()
                }
                None => T::default(),
            };
            Ok((keep(row, "row"), keep(col, "column")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wordgrid_core::SuggestionSource;

    use super::*;
    use crate::completion::testing::{Reply, ScriptedBackend};

    fn engine_with(backend: Arc<ScriptedBackend>) -> SuggestionEngine {
        SuggestionEngine::new(
            &SuggestConfig::default(),
            &CacheConfig::default(),
            CompletionClient::Configured(backend),
        )
    }

    fn ctx(before: &[&str], after: &[&str]) -> PhraseContext {
        PhraseContext {
            before: before.iter().map(|w| w.to_string()).collect(),
            after: after.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn grid() -> Grid {
        Grid::from_words(&[
            vec!["the", "", ""],
            vec!["", "", ""],
            vec!["", "", ""],
        ])
    }

    #[tokio::test]
    async fn empty_context_makes_no_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine_with(backend.clone());
        let empty = Grid::new(3, 3);
        let result = engine
            .suggest(&empty, Position::new(1, 1), SuggestionMode::Balanced)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let engine = SuggestionEngine::new(
            &SuggestConfig::default(),
            &CacheConfig::default(),
            CompletionClient::NotConfigured,
        );
        let result = engine
            .suggest(&grid(), Position::new(0, 1), SuggestionMode::Balanced)
            .await;
        assert_eq!(result, Err(EngineError::NoCredential));
    }

    #[tokio::test]
    async fn merges_row_and_column_completions() {
        // (1,1): row has "big" before, column has "the" above.
        let words = Grid::from_words(&[
            vec!["", "the", ""],
            vec!["big", "", ""],
            vec!["", "", ""],
        ]);
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("big", Reply::words(&["day", "day", "deal", "cat"]))
                .on("the", Reply::words(&["cat", "cat", "cat", "dog"])),
        );
        let engine = engine_with(backend.clone());

        let ranked = engine
            .suggest(&words, Position::new(1, 1), SuggestionMode::Balanced)
            .await
            .unwrap();
        assert_eq!(ranked[0].word, "cat");
        assert_eq!(ranked[0].source, SuggestionSource::Both);
        assert!((ranked[0].row_probability - 0.1).abs() < 1e-9);
        assert!((ranked[0].col_probability - 0.3).abs() < 1e-9);
        assert_eq!(backend.calls().len(), 2);

        let again = engine
            .suggest(&words, Position::new(1, 1), SuggestionMode::Row)
            .await
            .unwrap();
        assert_eq!(again[0].word, "day");
        assert_eq!(backend.calls().len(), 2, "second request is served from cache");
        assert_eq!(engine.probability_cache().get("big", "deal"), Some(0.1));
    }

    #[tokio::test]
    async fn one_failing_axis_degrades_to_the_other() {
        let words = Grid::from_words(&[vec!["", "the"], vec!["big", ""]]);
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("big", Reply::failure("boom"))
                .on("the", Reply::words(&["cat"])),
        );
        let engine = engine_with(backend);
        let ranked = engine
            .suggest(&words, Position::new(1, 1), SuggestionMode::Balanced)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source, SuggestionSource::Column);
    }

    #[tokio::test]
    async fn both_axes_failing_surfaces_error() {
        let words = Grid::from_words(&[vec!["", "the"], vec!["big", ""]]);
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("big", Reply::failure("boom"))
                .on("the", Reply::failure("boom")),
        );
        let engine = engine_with(backend);
        let result = engine
            .suggest(&words, Position::new(1, 1), SuggestionMode::Balanced)
            .await;
        assert!(matches!(result, Err(EngineError::UpstreamUnavailable(_))));
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn only_trailing_context_yields_nothing() {
        let words = Grid::from_words(&[vec!["", "rises"], vec!["", ""]]);
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine_with(backend.clone());
        let ranked = engine
            .suggest(&words, Position::new(0, 0), SuggestionMode::Balanced)
            .await
            .unwrap();
        assert!(ranked.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_word_without_context_is_unset() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine_with(backend.clone());
        let probabilities = engine
            .score_existing_word(&ctx(&[], &[]), &ctx(&[], &[]), "lonely")
            .await
            .unwrap();
        assert!(probabilities.is_none());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_word_scores_each_axis() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("sun", Reply::words(&["rises", "rises", "sets", "shines"]))
                .on("dark", Reply::words(&["night"])),
        );
        let engine = engine_with(backend.clone());

        let probabilities = engine
            .score_existing_word(&ctx(&["sun"], &[]), &ctx(&["dark"], &[]), "Rises")
            .await
            .unwrap();
        assert_eq!(probabilities.row_probability, Some(0.2));
        assert_eq!(probabilities.col_probability, Some(0.0));
        let expected = (0.2f64 * 0.01).sqrt();
        assert!((probabilities.combined_probability.unwrap() - expected).abs() < 1e-12);

        engine
            .score_existing_word(&ctx(&["sun"], &[]), &ctx(&["dark"], &[]), "rises")
            .await
            .unwrap();
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn existing_word_with_single_axis_has_no_combined() {
        let backend = Arc::new(ScriptedBackend::new().on("sun", Reply::words(&["rises"])));
        let engine = engine_with(backend);
        let probabilities = engine
            .score_existing_word(&ctx(&["sun"], &["slowly"]), &ctx(&[], &[]), "rises")
            .await
            .unwrap();
        assert_eq!(probabilities.row_probability, Some(0.1));
        assert_eq!(probabilities.col_probability, None);
        assert_eq!(probabilities.combined_probability, None);
    }

    #[tokio::test]
    async fn trailing_only_axis_reports_zero_not_none() {
        let backend = Arc::new(ScriptedBackend::new().on("sun", Reply::words(&["rises"])));
        let engine = engine_with(backend);
        let probabilities = engine
            .score_existing_word(&ctx(&["sun"], &[]), &ctx(&[], &["below"]), "rises")
            .await
            .unwrap();
        assert_eq!(probabilities.col_probability, Some(0.0));
        assert!(probabilities.combined_probability.is_some());
    }

    #[test]
    fn set_client_reports_first_configuration() {
        let engine = SuggestionEngine::new(
            &SuggestConfig::default(),
            &CacheConfig::default(),
            CompletionClient::NotConfigured,
        );
        assert!(!engine.is_configured());
        let backend = Arc::new(ScriptedBackend::new());
        assert!(engine.set_client(CompletionClient::Configured(backend.clone())));
        assert!(!engine.set_client(CompletionClient::Configured(backend)));
        assert!(!engine.set_client(CompletionClient::NotConfigured));
    }
}
