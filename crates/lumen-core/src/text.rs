//! Text normalization shared by the reconciler, title synthesizer and
//! keyword indexer.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Letter runs (with inner hyphens/apostrophes) long enough to be keywords.
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\-']{3,}").expect("static keyword pattern"));

/// Words that never become searchable keywords.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "this", "that", "these", "those", "are", "was",
        "were", "has", "have", "had", "not", "but", "you", "your", "our", "its", "his", "her",
        "their", "them", "they", "into", "onto", "over", "under", "about", "than", "then",
        "there", "here", "when", "where", "which", "who", "what", "will", "would", "can",
        "could", "should", "all", "any", "some", "very", "also", "just", "only", "more", "most",
        "other", "such", "out", "off", "via", "per", "jpg", "jpeg", "img", "dsc", "image",
        "photo", "picture", "unknown", "untitled", "copy", "edit", "edited",
    ]
    .into_iter()
    .collect()
});

/// Trim and clip `s` to at most `max` characters.
pub fn clip(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(max).collect();
    clipped.trim_end().to_string()
}

/// Capitalize the first letter of every word.
///
/// A word starts after any character that is not alphanumeric, an
/// underscore or an apostrophe.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;

    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_' || c == '\'');
    }

    out
}

/// Extract lowercase keyword tokens from free text.
pub fn keywords(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }

    WORD_PATTERN
        .find_iter(s)
        .map(|m| m.as_str().to_lowercase())
        .map(|w| w.trim_matches(|c| c == '-' || c == '\'').to_string())
        .filter(|w| w.chars().count() >= 3)
        .collect()
}

/// Sort and deduplicate words, dropping anything shorter than three characters.
pub fn unique_words<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().trim().to_string())
        .filter(|w| w.chars().count() >= 3)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Unique keywords contained in `s`.
pub fn unique_keywords(s: &str) -> Vec<String> {
    unique_words(keywords(s))
}

/// Whether `word` is a stop-word that should be flagged as noise.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word.to_lowercase().as_str())
}

/// URL-safe lowercase slug used as the natural key for labels.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;

    for c in s.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_trims_and_limits() {
        assert_eq!(clip("  hello  ", 10), "hello");
        assert_eq!(clip("abcdef", 3), "abc");
        assert_eq!(clip("ab cdef", 3), "ab");
        assert_eq!(clip("   ", 10), "");
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("Grüße aus Köln", 5), "Grüße");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("golden gate bridge"), "Golden Gate Bridge");
        assert_eq!(title_case("new-york"), "New-York");
        assert_eq!(title_case("o'neil"), "O'neil");
        assert_eq!(title_case("23 birthday"), "23 Birthday");
    }

    #[test]
    fn test_keywords_lowercase_and_length() {
        let words = keywords("A Cat on the Beach, near Saint-Tropez!");
        assert_eq!(words, vec!["cat", "the", "beach", "near", "saint-tropez"]);
    }

    #[test]
    fn test_keywords_strip_edge_punctuation() {
        assert_eq!(keywords("'quoted' -dash-"), vec!["quoted", "dash"]);
        assert!(keywords("").is_empty());
        assert!(keywords("12345 ab").is_empty());
    }

    #[test]
    fn test_unique_words_sorted_and_deduplicated() {
        let words = unique_words(["beach", "cat", "beach", "ab", "cat"]);
        assert_eq!(words, vec!["beach", "cat"]);
    }

    #[test]
    fn test_unique_keywords() {
        assert_eq!(unique_keywords("Dog, dog, DOG and cat"), vec!["and", "cat", "dog"]);
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("Photo"));
        assert!(!is_stopword("beach"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Golden Retriever"), "golden-retriever");
        assert_eq!(slugify("  Café / Bar  "), "café-bar");
        assert_eq!(slugify("---"), "");
    }
}
