use clinplan_core::DatasetSchema;
use serde::Serialize;
use strsim::normalized_levenshtein;

/// Minimum similarity for correcting a secondary field.
pub const LOOSE_THRESHOLD: f64 = 0.6;
/// Minimum similarity for correcting a field that decides which test runs.
pub const STRICT_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Fuzzy,
    Unresolved,
}

/// Outcome of reconciling a claimed column name.
///
/// `resolved` is the canonical column for `Exact`/`Fuzzy` and the untouched
/// claim for `Unresolved`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub resolved: String,
    pub confidence: MatchConfidence,
    pub score: f64,
}

/// Edit similarity in `[0, 1]`, ignoring case.
pub fn similarity(left: &str, right: &str) -> f64 {
    normalized_levenshtein(&left.to_lowercase(), &right.to_lowercase())
}

/// Resolve a claimed column name against the schema.
pub fn resolve(claimed: &str, schema: &DatasetSchema, strict: bool) -> MatchResult {
    let trimmed = claimed.trim();
    let columns = schema.column_names();

    if columns.contains(&trimmed) {
        return MatchResult {
            resolved: trimmed.to_string(),
            confidence: MatchConfidence::Exact,
            score: 1.0,
        };
    }
    let lowered = trimmed.to_lowercase();
    if let Some(column) = columns.iter().find(|column| column.to_lowercase() == lowered) {
        return MatchResult {
            resolved: column.to_string(),
            confidence: MatchConfidence::Exact,
            score: 1.0,
        };
    }

    let threshold = if strict {
        STRICT_THRESHOLD
    } else {
        LOOSE_THRESHOLD
    };

    let mut best: Option<(&str, f64)> = None;
    if !trimmed.is_empty() {
        for column in &columns {
            let score = similarity(trimmed, column);
            if score >= threshold && best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((*column, score));
            }
        }
    }

    match best {
        Some((column, score)) => MatchResult {
            resolved: column.to_string(),
            confidence: MatchConfidence::Fuzzy,
            score,
        },
        None => MatchResult {
            resolved: claimed.to_string(),
            confidence: MatchConfidence::Unresolved,
            score: 0.0,
        },
    }
}
