//! Reconciliation cycles.
//!
//! A cycle takes exclusive ownership of one record and one store handle,
//! applies candidate updates through the field reconciler, merges labels,
//! re-derives year/month and title, reindexes keywords, scores quality and
//! persists. Callers wrap a cycle in a transaction (see `lumen-db`) so a
//! failure at any step leaves the stored state untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::classify::{label_keywords, ClassifierLabel};
use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::events::{EventBus, ServerEvent};
use crate::keywords::{self, IndexReport};
use crate::labels::{LabelAssociator, MergeReport};
use crate::location::ResolvedLocation;
use crate::models::{Coordinates, MediaRecord};
use crate::provenance::Source;
use crate::reconcile::{CaptureCandidate, CoordinateRule, TextRule};
use crate::title::{TitleOutcome, TitleSynthesizer};
use crate::traits::{MediaStore, QualityScorer};

/// A value offered by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
}

/// Replacement free-text detail fields; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsUpdate {
    pub keywords: Option<String>,
    pub subject: Option<String>,
    pub artist: Option<String>,
}

/// Candidate values from a form or an automatic pipeline.
#[derive(Debug, Clone, Default)]
pub struct CandidateUpdate {
    pub title: Option<Sourced<String>>,
    pub description: Option<Sourced<String>>,
    pub captured_at: Option<Sourced<CaptureCandidate>>,
    pub coordinates: Option<Sourced<Coordinates>>,
    pub details: DetailsUpdate,
}

impl CandidateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, value: impl Into<String>, source: Source) -> Self {
        self.title = Some(Sourced {
            value: value.into(),
            source,
        });
        self
    }

    pub fn description(mut self, value: impl Into<String>, source: Source) -> Self {
        self.description = Some(Sourced {
            value: value.into(),
            source,
        });
        self
    }

    pub fn captured_at(mut self, value: CaptureCandidate, source: Source) -> Self {
        self.captured_at = Some(Sourced { value, source });
        self
    }

    pub fn coordinates(mut self, value: Coordinates, source: Source) -> Self {
        self.coordinates = Some(Sourced { value, source });
        self
    }

    pub fn detail_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.details.keywords = Some(keywords.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.details.subject = Some(subject.into());
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.details.artist = Some(artist.into());
        self
    }
}

/// Which offered candidates were accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptedFields {
    pub title: bool,
    pub description: bool,
    pub captured_at: bool,
    pub coordinates: bool,
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub accepted: AcceptedFields,
    pub title: TitleOutcome,
    pub keywords: IndexReport,
    pub labels: MergeReport,
    pub quality: i32,
}

impl CycleReport {
    pub fn title_changed(&self) -> bool {
        self.title.changed()
    }
}

/// Runs reconciliation cycles.
#[derive(Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    titles: TitleSynthesizer,
    labels: LabelAssociator,
    events: EventBus,
    scorer: Arc<dyn QualityScorer>,
}

impl Reconciler {
    /// A reconciler that keeps the stored quality score.
    pub fn new(config: ReconcileConfig, events: EventBus) -> Self {
        Self {
            titles: TitleSynthesizer::new(config.clone()),
            labels: LabelAssociator::new(events.clone()),
            config,
            events,
            scorer: Arc::new(|record: &MediaRecord| record.quality),
        }
    }

    pub fn with_scorer(mut self, scorer: impl QualityScorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Offer every candidate of `update` to the field reconciler.
    pub fn apply(&self, record: &mut MediaRecord, update: &CandidateUpdate) -> AcceptedFields {
        let mut accepted = AcceptedFields::default();

        if let Some(c) = &update.title {
            accepted.title = record.title.reconcile(
                &TextRule::title(self.config.clip_title),
                c.value.clone(),
                c.source,
            );
        }

        if let Some(c) = &update.description {
            accepted.description = record.description.reconcile(
                &TextRule::description(self.config.clip_description),
                c.value.clone(),
                c.source,
            );
        }

        if let Some(c) = &update.captured_at {
            accepted.captured_at = record.set_captured_at(c.value.clone(), c.source);
        }

        if let Some(c) = &update.coordinates {
            accepted.coordinates = record
                .coordinates
                .reconcile(&CoordinateRule, c.value, c.source);
        }

        let clip = self.config.clip_details;
        let details = &mut record.details;
        if let Some(keywords) = &update.details.keywords {
            details.keywords = crate::text::clip(keywords, clip);
        }
        if let Some(subject) = &update.details.subject {
            details.subject = crate::text::clip(subject, clip);
        }
        if let Some(artist) = &update.details.artist {
            details.artist = crate::text::clip(artist, clip);
        }

        debug!(
            subsystem = "engine",
            component = "reconciler",
            record_id = ?record.id,
            title = accepted.title,
            description = accepted.description,
            captured_at = accepted.captured_at,
            coordinates = accepted.coordinates,
            "Candidates applied"
        );

        accepted
    }

    /// Automatic cycle for ingestion pipelines.
    ///
    /// Records without an identity are inserted first.
    pub async fn save<S>(
        &self,
        store: &mut S,
        record: &mut MediaRecord,
        update: &CandidateUpdate,
        labels: &[ClassifierLabel],
        location: Option<&ResolvedLocation>,
    ) -> Result<CycleReport>
    where
        S: MediaStore + ?Sized,
    {
        let start = Instant::now();

        if !record.has_id() {
            let id = store.insert_record(record).await?;
            record.id = Some(id);
            record.details.record_id = Some(id);
        }

        let accepted = self.apply(record, update);
        let merged = self.labels.merge_labels(store, record, labels).await?;
        record.update_year_month();

        let ranked = record.classify_labels();
        let title = self.titles.update_title(record, location, &ranked);
        record.details.merge_keywords(label_keywords(&ranked));

        let indexed = keywords::reindex(store, record).await?;
        record.updated_at = Utc::now();

        self.finish(store, record, accepted, title, indexed, merged, start, "save")
            .await
    }

    /// Manual cycle for a submitted edit form.
    pub async fn save_form<S>(
        &self,
        store: &mut S,
        record: &mut MediaRecord,
        form: &CandidateUpdate,
        location: Option<&ResolvedLocation>,
    ) -> Result<CycleReport>
    where
        S: MediaStore + ?Sized,
    {
        let start = Instant::now();
        record.require_id("save form")?;

        let before = *record.coordinates.value();
        let accepted = self.apply(record, form);
        record.update_year_month();
        record.details.normalize_keywords();

        let moved = !record.coordinates.value().same_position(&before);
        if let Some(loc) = location {
            if moved && record.coordinates.source() == Source::Manual {
                record.details.merge_keywords(loc.keywords());
            }
        }

        let ranked = record.classify_labels();
        let title = self.titles.update_title(record, location, &ranked);

        let indexed = keywords::reindex(store, record).await?;
        let now = Utc::now();
        record.edited_at = Some(now);
        record.updated_at = now;

        self.finish(
            store,
            record,
            accepted,
            title,
            indexed,
            MergeReport::default(),
            start,
            "save_form",
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish<S>(
        &self,
        store: &mut S,
        record: &mut MediaRecord,
        accepted: AcceptedFields,
        title: TitleOutcome,
        keywords: IndexReport,
        labels: MergeReport,
        start: Instant,
        op: &'static str,
    ) -> Result<CycleReport>
    where
        S: MediaStore + ?Sized,
    {
        record.quality = self.scorer.score(record);
        store.save_record(record).await?;

        let record_id = record.require_id("save record")?;
        self.events.emit(ServerEvent::RecordUpdated {
            record_id,
            title: title.changed().then(|| record.title.value().clone()),
            keyword_count: record.keywords.len(),
            label_count: record.labels.len(),
        });

        info!(
            subsystem = "engine",
            component = "reconciler",
            op,
            record_id = %record_id,
            keyword_count = keywords.linked,
            pruned_count = keywords.pruned,
            label_count = record.labels.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciliation cycle complete"
        );

        Ok(CycleReport {
            accepted,
            title,
            keywords,
            labels,
            quality: record.quality,
        })
    }
}
