use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionMode {
    Row,
    Column,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Row,
    Column,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub word: String,
    pub row_probability: f64,
    pub col_probability: f64,
    pub combined_score: f64,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub max_suggestions: usize,
    pub candidate_floor: f64,
    pub existing_word_floor: f64,
    pub both_axes_multiplier: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            max_suggestions: 10,
            candidate_floor: 0.05,
            existing_word_floor: 0.01,
            both_axes_multiplier: 2.0,
        }
    }
}

/// Each factor is raised to at least `floor`, which keeps the mean monotonic.
pub fn floored_geometric_mean(row: f64, col: f64, floor: f64) -> f64 {
    (row.max(floor) * col.max(floor)).sqrt()
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

#[derive(Debug)]
struct Candidate {
    word: String,
    row: Option<f64>,
    col: Option<f64>,
}

/// Ties keep first-seen order, row words before column words.
pub fn rank_candidates(
    row: &[WordFrequency],
    col: &[WordFrequency],
    mode: SuggestionMode,
    policy: &ScoringPolicy,
) -> Vec<Suggestion> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for (entries, is_row) in [(row, true), (col, false)] {
        for entry in entries {
            let word = normalize_word(&entry.word);
            if word.is_empty() {
                continue;
            }
            let slot = *index.entry(word.clone()).or_insert_with(|| {
                candidates.push(Candidate {
                    word,
                    row: None,
                    col: None,
                });
                candidates.len() - 1
            });
            let target = if is_row {
                &mut candidates[slot].row
            } else {
                &mut candidates[slot].col
            };
            *target = Some(target.map_or(entry.probability, |p| p.max(entry.probability)));
        }
    }

    let mut ranked: Vec<Suggestion> = candidates
        .into_iter()
        .map(|candidate| score_candidate(candidate, mode, policy))
        .collect();
    ranked.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    ranked.truncate(policy.max_suggestions);
    ranked
}

fn score_candidate(candidate: Candidate, mode: SuggestionMode, policy: &ScoringPolicy) -> Suggestion {
    let source = match (candidate.row, candidate.col) {
        (Some(_), Some(_)) => SuggestionSource::Both,
        (Some(_), None) => SuggestionSource::Row,
        _ => SuggestionSource::Column,
    };
    let row_probability = candidate.row.unwrap_or(0.0);
    let col_probability = candidate.col.unwrap_or(0.0);

    let combined_score = match mode {
        SuggestionMode::Row => row_probability,
        SuggestionMode::Column => col_probability,
        SuggestionMode::Balanced => {
            let mean =
                floored_geometric_mean(row_probability, col_probability, policy.candidate_floor);
            if source == SuggestionSource::Both {
                mean * policy.both_axes_multiplier
            } else {
                mean
            }
        }
    };

    Suggestion {
        word: candidate.word,
        row_probability,
        col_probability,
        combined_score,
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatBand {
    Unknown,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl HeatBand {
    pub fn from_probability(probability: Option<f64>) -> Self {
        let Some(p) = probability else {
            return HeatBand::Unknown;
        };
        match p.clamp(0.0, 1.0) {
            p if p < 0.2 => HeatBand::VeryLow,
            p if p < 0.4 => HeatBand::Low,
            p if p < 0.6 => HeatBand::Medium,
            p if p < 0.8 => HeatBand::High,
            _ => HeatBand::VeryHigh,
        }
    }
}
