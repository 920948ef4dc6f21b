//! Title synthesis from a resolved location and ranked classifier labels.
//!
//! The synthesizer always produces a candidate and submits it with
//! [`Source::Auto`]; a manually edited title is protected up front and the
//! reconciler would reject the candidate anyway.

use tracing::{debug, info};

use crate::classify::ClassifierLabel;
use crate::config::ReconcileConfig;
use crate::location::ResolvedLocation;
use crate::models::MediaRecord;
use crate::provenance::Source;
use crate::reconcile::TextRule;

/// Result of a title synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
    /// The title was set by a non-automatic source and left alone.
    Protected,
    /// Synthesis produced the title already stored.
    Unchanged,
    /// The title was replaced.
    Changed(String),
}

impl TitleOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, TitleOutcome::Changed(_))
    }
}

/// Heuristic title composer.
#[derive(Debug, Clone)]
pub struct TitleSynthesizer {
    config: ReconcileConfig,
}

impl TitleSynthesizer {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    fn usable<'a>(&self, labels: &'a [ClassifierLabel]) -> Option<&'a ClassifierLabel> {
        labels.first().filter(|l| {
            l.usable_for_title_with(
                self.config.title_label_min_priority,
                self.config.title_label_max_uncertainty,
            )
        })
    }

    /// Title composed from the location, if the location allows one.
    pub fn from_location(
        &self,
        record: &MediaRecord,
        loc: &ResolvedLocation,
        labels: &[ClassifierLabel],
    ) -> Option<String> {
        let cfg = &self.config;
        let year = record.captured_at.value().at.format("%Y");
        let (name, city, country) = (loc.name(), loc.city(), loc.country());

        if let Some(label) = self.usable(labels) {
            let label_title = label.title();
            let place = if city.is_empty()
                || loc.long_city_over(cfg.title_label_long_city)
                || loc.city_contains(&label_title)
            {
                country
            } else {
                city
            };
            if !place.is_empty() {
                debug!(
                    subsystem = "engine",
                    component = "title",
                    label = %label_title,
                    "Using label to create title"
                );
                return Some(format!("{} / {} / {}", label_title, place, year));
            }
        }

        if !name.is_empty() && !city.is_empty() {
            let name_len = name.chars().count();
            if name_len > cfg.title_long_place_name
                || name_len > cfg.title_place_name_redundant
                || loc.long_city_over(cfg.title_place_city_redundant)
                || name.contains(city)
            {
                return Some(format!("{} / {}", name, year));
            }
            return Some(format!("{} / {} / {}", name, city, year));
        }

        if !city.is_empty() && !country.is_empty() {
            if loc.long_city_over(cfg.title_long_city) {
                return Some(format!("{} / {}", city, year));
            }
            return Some(format!("{} / {} / {}", city, country, year));
        }

        None
    }

    /// Title composed without location: top label or the untitled sentinel.
    pub fn fallback(&self, record: &MediaRecord, labels: &[ClassifierLabel]) -> String {
        let captured = record.captured_at.value();
        let known_time = record.captured_at.source() != Source::Auto;

        if let Some(label) = self.usable(labels) {
            if known_time {
                return format!("{} / {}", label.title(), captured.at.format("%Y"));
            }
            return label.title();
        }

        if known_time && captured.local_known() {
            return format!("{} / {}", self.config.title_unknown, captured.local.format("%Y"));
        }

        self.config.title_unknown.clone()
    }

    /// The candidate title for `record`.
    pub fn synthesize(
        &self,
        record: &MediaRecord,
        location: Option<&ResolvedLocation>,
        labels: &[ClassifierLabel],
    ) -> String {
        location
            .and_then(|loc| self.from_location(record, loc, labels))
            .unwrap_or_else(|| self.fallback(record, labels))
    }

    /// Synthesize and store a title unless it was set by hand.
    ///
    /// `labels` must be ranked best-first.
    pub fn update_title(
        &self,
        record: &mut MediaRecord,
        location: Option<&ResolvedLocation>,
        labels: &[ClassifierLabel],
    ) -> TitleOutcome {
        if record.title.source() != Source::Auto && record.has_title() {
            debug!(
                subsystem = "engine",
                component = "title",
                source = %record.title.source(),
                "Won't update title, was modified"
            );
            return TitleOutcome::Protected;
        }

        let candidate = self.synthesize(record, location, labels);
        let previous = record.title.value().clone();
        let rule = TextRule::title(self.config.clip_title);

        if !record.title.reconcile(&rule, candidate, Source::Auto) {
            return TitleOutcome::Unchanged;
        }

        if *record.title.value() == previous {
            return TitleOutcome::Unchanged;
        }

        info!(
            subsystem = "engine",
            component = "title",
            record_id = ?record.id,
            title = %record.title.value(),
            "Changed title"
        );
        TitleOutcome::Changed(record.title.value().clone())
    }
}
