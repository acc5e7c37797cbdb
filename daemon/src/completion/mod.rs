mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
pub use openai::OpenAiBackend;
use tracing::warn;
use wordgrid_core::WordFrequency;

use crate::error::EngineError;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn request_completions(&self, prompt: &str, count: u32) -> Result<Vec<String>>;
}

#[derive(Clone, Default)]
pub enum CompletionClient {
    #[default]
    NotConfigured,
    Configured(Arc<dyn CompletionBackend>),
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionClient::NotConfigured => f.write_str("NotConfigured"),
            CompletionClient::Configured(_) => f.write_str("Configured"),
        }
    }
}

impl CompletionClient {
    pub fn configured(backend: impl CompletionBackend + 'static) -> Self {
        CompletionClient::Configured(Arc::new(backend))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, CompletionClient::Configured(_))
    }

    pub async fn complete(
        &self,
        prompt: &str,
        count: u32,
        cap: usize,
    ) -> Result<Vec<WordFrequency>, EngineError> {
        let CompletionClient::Configured(backend) = self else {
            return Err(EngineError::NoCredential);
        };
        let prompt = prompt.trim();
        if prompt.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let raw = backend
            .request_completions(prompt, count)
            .await
            .map_err(|error| {
                warn!(prompt, "completion request failed: {error:#}");
                EngineError::UpstreamUnavailable(format!("{error:#}"))
            })?;
        Ok(frequency_table(&raw, count, cap))
    }
}

/// First whitespace-delimited token, lowercased, keeping only `a-z`, `'`
/// and `-`.
pub fn normalize_completion(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let token = lowered.split_whitespace().next()?;
    let word: String = token
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || *ch == '\'' || *ch == '-')
        .collect();
    (!word.is_empty()).then_some(word)
}

/// Frequencies are independent estimates and need not sum to one.
pub fn frequency_table(raw: &[String], count: u32, cap: usize) -> Vec<WordFrequency> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for word in raw.iter().filter_map(|text| normalize_completion(text)) {
        let seen = counts.entry(word.clone()).or_insert(0);
        if *seen == 0 {
            order.push(word);
        }
        *seen += 1;
    }

    let total = f64::from(count.max(1));
    let mut table: Vec<WordFrequency> = order
        .into_iter()
        .map(|word| {
            let probability = (counts[&word] as f64 / total).min(1.0);
            WordFrequency { word, probability }
        })
        .collect();
    table.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    table.truncate(cap);
    table
}
