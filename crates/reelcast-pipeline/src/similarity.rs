//! Token-set similarity between normalized titles.
//!
//! Both titles are lowercased and split into token sets. The shared tokens and
//! each side's leftovers are rendered as sorted strings and compared pairwise
//! with normalized Levenshtein; the best pairing wins. Word order never matters,
//! and a title whose tokens are a subset of the other's scores 1.0.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Similarity in `[0, 1]`; symmetric, and `similarity(t, t) == 1.0`.
#[must_use]
pub fn similarity(left: &str, right: &str) -> f64 {
    let left_tokens = token_set(left);
    let right_tokens = token_set(right);
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return if left_tokens == right_tokens { 1.0 } else { 0.0 };
    }

    let shared = join(left_tokens.intersection(&right_tokens));
    let left_only = join(left_tokens.difference(&right_tokens));
    let right_only = join(right_tokens.difference(&left_tokens));

    let left_combined = combine(&shared, &left_only);
    let right_combined = combine(&shared, &right_only);

    let score = [
        normalized_levenshtein(&shared, &left_combined),
        normalized_levenshtein(&shared, &right_combined),
        normalized_levenshtein(&left_combined, &right_combined),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    score.clamp(0.0, 1.0)
}

fn token_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn combine(shared: &str, rest: &str) -> String {
    match (shared.is_empty(), rest.is_empty()) {
        (_, true) => shared.to_string(),
        (true, false) => rest.to_string(),
        (false, false) => format!("{shared} {rest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_titles_score_one() {
        for title in ["Alpha", "Movie Title", "a b c", "Untitled"] {
            assert!((similarity(title, title) - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn word_order_and_case_are_ignored() {
        let score = similarity("Title Movie", "movie title");
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_is_symmetric() {
        let pairs = [
            ("Alpha", "Alpha Beta"),
            ("The Matrix", "Matrix Reloaded"),
            ("Dune", "Arrival"),
            ("Blade Runner 2049", "Blade Runner"),
        ];
        for (left, right) in pairs {
            assert!((similarity(left, right) - similarity(right, left)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn unrelated_titles_score_low() {
        assert!(similarity("Dune", "Arrival") < 0.5);
        assert!(similarity("Alpha", "Omega Station") < 0.85);
    }

    #[test]
    fn small_spelling_variation_scores_high() {
        assert!(similarity("The Office", "The Ofice") >= 0.85);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        for (left, right) in [("", ""), ("", "x"), ("a", "b"), ("x y", "y z")] {
            let score = similarity(left, right);
            assert!((0.0..=1.0).contains(&score));
        }
        assert!(similarity("", "x").abs() < f64::EPSILON);
    }
}
