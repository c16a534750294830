//! Fuzzy name matching shared by catalog search and medication suggestions.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum similarity for a candidate to be suggested.
pub const MIN_SIMILARITY: f64 = 0.6;

/// Similarity of a typed query to a candidate name (0.0 - 1.0).
///
/// A case-insensitive substring hit scores 1.0.
pub fn name_similarity(query: &str, candidate: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let candidate = candidate.to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    if candidate.contains(&query) {
        return 1.0;
    }

    // Jaro-Winkler favors shared prefixes, Levenshtein overall similarity
    let jw = jaro_winkler(&query, &candidate);
    let lev = normalized_levenshtein(&query, &candidate);
    jw * 0.6 + lev * 0.4
}

/// Rank candidates by similarity, dropping those under [`MIN_SIMILARITY`].
/// Ties keep input order.
pub fn rank_by_name<T, F>(query: &str, candidates: Vec<T>, name: F) -> Vec<(T, f64)>
where
    F: Fn(&T) -> &str,
{
    let mut scored: Vec<(T, f64)> = candidates
        .into_iter()
        .map(|c| {
            let score = name_similarity(query, name(&c));
            (c, score)
        })
        .filter(|(_, score)| *score >= MIN_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_is_exact() {
        assert_eq!(name_similarity("resina", "Resina compuesta"), 1.0);
        assert_eq!(name_similarity("  AMOX ", "amoxicilina"), 1.0);
    }

    #[test]
    fn test_typo_scores_high() {
        assert!(name_similarity("corna", "Corona") > 0.8);
    }

    #[test]
    fn test_unrelated_scores_low() {
        assert!(name_similarity("endodoncia", "limpieza") < MIN_SIMILARITY);
        assert_eq!(name_similarity("", "limpieza"), 0.0);
    }

    #[test]
    fn test_rank_orders_and_filters() {
        let names = vec!["Limpieza", "Corona metal", "Coronas"];
        let ranked = rank_by_name("corona", names, |n| n);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, "Corona metal");
        assert_eq!(ranked[1].0, "Coronas");
    }
}
