use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Similarity at which a token counts as a misspelling of a keyword.
pub const DEFAULT_THRESHOLD: f64 = 0.45;

/// Folds free text into `[a-z0-9 ]`: accents dropped, punctuation turned
/// into single spaces, emphatic repeats ("ouiiii") capped at two.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    let mut last: Option<char> = None;
    let mut run = 0usize;

    let folded = input
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase);

    for ch in folded {
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit()) {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
            last = Some(' ');
            run = 1;
        }
        if last == Some(ch) {
            run += 1;
        } else {
            last = Some(ch);
            run = 1;
        }
        if run <= 2 {
            out.push(ch);
        }
    }

    out
}

/// Three-character windows over `s` padded with two spaces on each side.
pub fn trigrams(s: &str) -> HashSet<String> {
    let padded: Vec<char> = "  ".chars().chain(s.chars()).chain("  ".chars()).collect();
    padded
        .windows(3)
        .map(|window| window.iter().collect::<String>())
        .collect()
}

/// Jaccard index of the trigram sets of `a` and `b`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

/// True when `text` mentions any of `keywords`, tolerating typos and
/// missing spaces.
pub fn fuzzy_matches(text: &str, keywords: &[&str], threshold: f64) -> bool {
    let normalized = normalize(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    keywords.iter().any(|keyword| {
        let keyword = normalize(keyword);
        if keyword.is_empty() {
            return false;
        }
        normalized.contains(&keyword)
            || tokens
                .iter()
                .any(|token| similarity(token, &keyword) >= threshold)
            || similarity(&normalized, &keyword) >= threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_triple_run(s: &str) -> bool {
        s.as_bytes()
            .windows(3)
            .any(|w| w[0] == w[1] && w[1] == w[2])
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("Café!!"), "cafe");
        assert_eq!(normalize("  Cache-Cœur, Démi–Pointes  "), "cache c ur demi pointes");
    }

    #[test]
    fn normalize_caps_emphatic_repeats() {
        let folded = normalize("ouiiii");
        assert_eq!(folded, "ouii");
        assert!(!has_triple_run(&folded));
        assert!(!has_triple_run(&normalize("Noooon!!! Trooop  biennnn")));
    }

    #[test]
    fn normalize_handles_empty_and_symbol_only_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!… 🎭"), "");
    }

    #[test]
    fn trigrams_pad_both_ends() {
        let grams = trigrams("ab");
        assert!(grams.contains("  a"));
        assert!(grams.contains(" ab"));
        assert!(grams.contains("ab "));
        assert!(grams.contains("b  "));
        assert_eq!(grams.len(), 4);
    }

    #[test]
    fn similarity_is_partial_for_near_misses() {
        let score = similarity("pointes", "pointe");
        assert!(score > 0.0 && score < 1.0, "unexpected score {score}");
        assert_eq!(similarity("tutu", "tutu"), 1.0);
        assert!(similarity("tarif", "galerie") < 0.2);
    }

    #[test]
    fn fuzzy_matches_tolerates_missing_letters() {
        assert!(fuzzy_matches("je veux des pointe", &["pointes"], 0.4));
        assert!(fuzzy_matches("des JUSTAUCORP svp", &["justaucorps"], DEFAULT_THRESHOLD));
    }

    #[test]
    fn fuzzy_matches_finds_multi_word_keywords_by_substring() {
        assert!(fuzzy_matches("C'est où le P'tit Rat ?", &["p tit rat"], DEFAULT_THRESHOLD));
        assert!(fuzzy_matches("Demi-pointes taille 34", &["demi pointes"], DEFAULT_THRESHOLD));
    }

    #[test]
    fn fuzzy_matches_rejects_unrelated_text_and_empty_keywords() {
        assert!(!fuzzy_matches("quels sont les horaires", &["chaussures"], DEFAULT_THRESHOLD));
        assert!(!fuzzy_matches("bonjour", &[""], DEFAULT_THRESHOLD));
    }
}
