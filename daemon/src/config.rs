use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use wordgrid_core::{GridBounds, ScoringPolicy, SuggestionMode};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path();
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config file {}", config_path.display()))?;
            let parsed: DaemonConfig = toml::from_str(&raw)
                .with_context(|| format!("failed to parse TOML from {}", config_path.display()))?;
            return Ok(parsed);
        }

        Ok(DaemonConfig::default())
    }
}

fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var("WORDGRID_CONFIG") {
        return Path::new(&path).to_path_buf();
    }

    if let Some(base) = dirs::config_dir() {
        return base.join("wordgrid").join("config.toml");
    }

    Path::new("/tmp/wordgrid.toml").to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    Path::new("/tmp/wordgrid.sock").to_path_buf()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_size")]
    pub rows: usize,
    #[serde(default = "default_grid_size")]
    pub cols: usize,
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl GridConfig {
    pub fn bounds(&self) -> GridBounds {
        GridBounds {
            min: self.min_size,
            max: self.max_size,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_grid_size(),
            cols: default_grid_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_grid_size() -> usize {
    5
}

fn default_min_size() -> usize {
    2
}

fn default_max_size() -> usize {
    10
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default = "default_completions_per_request")]
    pub completions_per_request: u32,
    #[serde(default = "default_distribution_cap")]
    pub distribution_cap: usize,
    #[serde(default = "default_candidate_floor")]
    pub candidate_floor: f64,
    #[serde(default = "default_existing_word_floor")]
    pub existing_word_floor: f64,
    #[serde(default = "default_both_axes_multiplier")]
    pub both_axes_multiplier: f64,
    #[serde(default)]
    pub default_mode: SuggestionMode,
}

impl SuggestConfig {
    pub fn policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            max_suggestions: self.max_suggestions,
            candidate_floor: self.candidate_floor,
            existing_word_floor: self.existing_word_floor,
            both_axes_multiplier: self.both_axes_multiplier,
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
            completions_per_request: default_completions_per_request(),
            distribution_cap: default_distribution_cap(),
            candidate_floor: default_candidate_floor(),
            existing_word_floor: default_existing_word_floor(),
            both_axes_multiplier: default_both_axes_multiplier(),
            default_mode: SuggestionMode::default(),
        }
    }
}

fn default_max_suggestions() -> usize {
    10
}

fn default_completions_per_request() -> u32 {
    10
}

fn default_distribution_cap() -> usize {
    8
}

fn default_candidate_floor() -> f64 {
    0.05
}

fn default_existing_word_floor() -> f64 {
    0.01
}

fn default_both_axes_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl ScheduleConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

impl ModelConfig {
    /// Configured key, falling back to `api_key_env`. Blank means no credential.
    pub fn resolved_api_key(&self) -> Option<String> {
        let inline = self.api_key.trim();
        if !inline.is_empty() {
            return Some(inline.to_string());
        }
        if self.api_key_env.is_empty() {
            return None;
        }
        env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_model_timeout_ms(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    4
}

fn default_model_timeout_ms() -> u64 {
    10_000
}
