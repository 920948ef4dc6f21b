//! Classifier output as consumed by the engine.

use serde::{Deserialize, Serialize};

use crate::defaults::{TITLE_LABEL_MAX_UNCERTAINTY, TITLE_LABEL_MIN_PRIORITY, UNCERTAINTY_INVALID};
use crate::provenance::Source;
use crate::text;

/// A ranked classification label.
///
/// `priority` is higher for more specific labels; `uncertainty` runs from
/// 0 (certain) to 100 (invalid).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierLabel {
    pub name: String,
    pub priority: i32,
    pub uncertainty: i32,
    pub source: Source,
}

impl ClassifierLabel {
    pub fn new(name: impl Into<String>, priority: i32, uncertainty: i32, source: Source) -> Self {
        Self {
            name: name.into(),
            priority,
            uncertainty,
            source,
        }
    }

    /// Display form of the label name.
    pub fn title(&self) -> String {
        text::title_case(self.name.trim())
    }

    /// Whether this label is confident and specific enough to name a record.
    pub fn usable_for_title(&self) -> bool {
        self.usable_for_title_with(TITLE_LABEL_MIN_PRIORITY, TITLE_LABEL_MAX_UNCERTAINTY)
    }

    pub fn usable_for_title_with(&self, min_priority: i32, max_uncertainty: i32) -> bool {
        !self.name.trim().is_empty()
            && self.priority >= min_priority
            && self.uncertainty <= max_uncertainty
    }

    /// Keywords contributed by this label; invalid labels contribute none.
    pub fn keywords(&self) -> Vec<String> {
        if self.uncertainty >= UNCERTAINTY_INVALID {
            return Vec::new();
        }
        text::keywords(&self.name)
    }
}

/// Order labels best-first: lowest uncertainty, then highest priority.
pub fn rank_labels(labels: &mut [ClassifierLabel]) {
    labels.sort_by(|a, b| {
        a.uncertainty
            .cmp(&b.uncertainty)
            .then_with(|| b.priority.cmp(&a.priority))
    });
}

/// Keywords of all valid labels.
pub fn label_keywords(labels: &[ClassifierLabel]) -> Vec<String> {
    labels.iter().flat_map(|l| l.keywords()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, priority: i32, uncertainty: i32) -> ClassifierLabel {
        ClassifierLabel::new(name, priority, uncertainty, Source::Image)
    }

    #[test]
    fn test_rank_prefers_confident_then_specific() {
        let mut labels = vec![
            label("animal", 0, 40),
            label("dog", 2, 20),
            label("beagle", 5, 20),
        ];
        rank_labels(&mut labels);
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["beagle", "dog", "animal"]);
    }

    #[test]
    fn test_usable_for_title_bounds() {
        assert!(label("cat", -1, 85).usable_for_title());
        assert!(!label("cat", -2, 10).usable_for_title());
        assert!(!label("cat", 0, 86).usable_for_title());
        assert!(!label("  ", 3, 10).usable_for_title());
    }

    #[test]
    fn test_invalid_labels_contribute_no_keywords() {
        let labels = vec![label("sea lion", 0, 30), label("ghost", 0, 100)];
        assert_eq!(label_keywords(&labels), vec!["sea", "lion"]);
    }

    #[test]
    fn test_title_case_name() {
        assert_eq!(label("golden retriever", 1, 10).title(), "Golden Retriever");
    }
}
