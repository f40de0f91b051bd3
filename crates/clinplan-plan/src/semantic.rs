use clinplan_core::DatasetSchema;
use tracing::debug;

/// Clinical shorthand phrases and the category values they may stand for.
///
/// Candidates are only used when they actually occur in the column.
const SHORTHANDS: &[(&[&str], &[&str])] = &[
    (
        &["early stage", "early"],
        &[
            "Stage I", "Stage IA", "Stage IB", "Stage II", "Stage IIA", "Stage IIB", "Stage IIC",
            "I", "II",
        ],
    ),
    (
        &["late stage", "advanced stage", "advanced", "late"],
        &[
            "Stage III",
            "Stage IIIA",
            "Stage IIIB",
            "Stage IIIC",
            "Stage IV",
            "Stage IVA",
            "Stage IVB",
            "III",
            "IV",
        ],
    ),
    (
        &["metastatic", "metastasis"],
        &["Stage IV", "Stage IVA", "Stage IVB", "IV", "M1"],
    ),
    (
        &["positive", "mutated", "mutant", "mutation"],
        &["Positive", "Mutated", "Mutant", "Yes", "True", "1"],
    ),
    (
        &["negative", "wild type", "wildtype", "wt", "not mutated"],
        &["Negative", "Wild Type", "Wildtype", "WT", "No", "False", "0"],
    ),
    (
        &["dead", "deceased", "died"],
        &["Dead", "Deceased", "1"],
    ),
    (
        &["alive", "living", "censored"],
        &["Alive", "Living", "0"],
    ),
];

/// Map a literal onto the values actually observed in `column`.
///
/// Returns one value for a direct substitution, several when a shorthand
/// covers more than one observed category, and the literal itself when
/// nothing matches.
pub fn map_literal(column: &str, literal: &str, schema: &DatasetSchema) -> Vec<String> {
    let observed = schema.observed_values(column);
    if observed.is_empty() {
        return vec![literal.to_string()];
    }

    let mut phrases = vec![normalize(literal)];
    if let Some(stripped) = strip_column_prefix(column, literal) {
        phrases.push(stripped);
    }

    for phrase in &phrases {
        if let Some(value) = observed.iter().find(|value| normalize(value) == *phrase) {
            if value != literal {
                debug!(event = "literal_mapped", column, literal, value = %value);
            }
            return vec![value.clone()];
        }
        let hits = shorthand_hits(phrase, observed);
        if !hits.is_empty() {
            debug!(
                event = "literal_mapped",
                column,
                literal,
                values = %hits.join(", ")
            );
            return hits;
        }
    }

    vec![literal.to_string()]
}

fn shorthand_hits(phrase: &str, observed: &[String]) -> Vec<String> {
    let Some((_, candidates)) = SHORTHANDS
        .iter()
        .find(|(aliases, _)| aliases.iter().any(|alias| *alias == phrase))
    else {
        return Vec::new();
    };

    observed
        .iter()
        .filter(|value| {
            let value = normalize(value);
            candidates
                .iter()
                .any(|candidate| normalize(candidate) == value)
        })
        .cloned()
        .collect()
}

/// Drop leading words of the literal that repeat the column name
/// ("KRAS positive" against `KRAS_mutation`).
fn strip_column_prefix(column: &str, literal: &str) -> Option<String> {
    let column = normalize(column);
    let column_words: Vec<&str> = column.split(' ').collect();
    let normalized = normalize(literal);
    let words: Vec<&str> = normalized.split(' ').collect();

    let skip = words
        .iter()
        .take_while(|word| column_words.contains(*word))
        .count();
    if skip == 0 || skip == words.len() {
        return None;
    }
    Some(words[skip..].join(" "))
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinplan_core::{Variable, VariableKind};

    fn schema() -> DatasetSchema {
        DatasetSchema::new(
            "demo",
            [
                Variable::new("TUMOR_STAGE", VariableKind::Categorical).with_observed_values([
                    "Stage I", "Stage II", "Stage III", "Stage IV",
                ]),
                Variable::new("KRAS_mutation", VariableKind::Continuous)
                    .with_observed_values(["0", "1"]),
                Variable::new("GENDER", VariableKind::Categorical)
                    .with_observed_values(["Female", "Male"]),
                Variable::new("SAMPLE_ID", VariableKind::Categorical),
            ],
        )
    }

    #[test]
    fn case_insensitive_match_takes_canonical_casing() {
        assert_eq!(map_literal("GENDER", "male", &schema()), ["Male"]);
        assert_eq!(map_literal("TUMOR_STAGE", "stage iv", &schema()), ["Stage IV"]);
    }

    #[test]
    fn shorthand_expands_to_observed_categories() {
        assert_eq!(
            map_literal("TUMOR_STAGE", "late-stage", &schema()),
            ["Stage III", "Stage IV"]
        );
        assert_eq!(
            map_literal("TUMOR_STAGE", "early stage", &schema()),
            ["Stage I", "Stage II"]
        );
    }

    #[test]
    fn single_hit_substitutes_scalar() {
        assert_eq!(map_literal("TUMOR_STAGE", "metastatic", &schema()), ["Stage IV"]);
    }

    #[test]
    fn column_prefix_is_ignored() {
        assert_eq!(map_literal("KRAS_mutation", "KRAS positive", &schema()), ["1"]);
        assert_eq!(map_literal("KRAS_mutation", "kras wild-type", &schema()), ["0"]);
    }

    #[test]
    fn no_intersection_keeps_literal() {
        assert_eq!(map_literal("GENDER", "late stage", &schema()), ["late stage"]);
        assert_eq!(map_literal("SAMPLE_ID", "S1", &schema()), ["S1"]);
        assert_eq!(map_literal("MISSING", "x", &schema()), ["x"]);
    }
}
