//! Merge classifier output into a record's persisted label associations.

use tracing::{debug, warn};

use crate::classify::ClassifierLabel;
use crate::defaults::UNCERTAINTY_INVALID;
use crate::error::Result;
use crate::events::{EventBus, ServerEvent};
use crate::models::MediaRecord;
use crate::traits::LabelStore;

/// Outcome of one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Label entities created by this pass.
    pub created: usize,
    /// Existing associations whose uncertainty improved.
    pub improved: usize,
    /// Incoming labels ignored because their name was empty.
    pub ignored: usize,
}

/// Applies incoming classifier labels to records.
#[derive(Clone, Default)]
pub struct LabelAssociator {
    events: Option<EventBus>,
}

impl LabelAssociator {
    pub fn new(events: EventBus) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// An associator that emits no events.
    pub fn silent() -> Self {
        Self { events: None }
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Merge `incoming` into the label associations of `record`.
    ///
    /// Stored uncertainty only ever decreases through this path. The
    /// record's label list is reloaded from the store afterwards.
    pub async fn merge_labels<S>(
        &self,
        store: &mut S,
        record: &mut MediaRecord,
        incoming: &[ClassifierLabel],
    ) -> Result<MergeReport>
    where
        S: LabelStore + ?Sized,
    {
        let record_id = record.require_id("merge labels")?;
        let mut report = MergeReport::default();

        for candidate in incoming {
            let title = candidate.title();

            if title.is_empty() {
                warn!(
                    subsystem = "engine",
                    component = "labels",
                    record_id = %record_id,
                    "Ignoring classifier label without a name"
                );
                report.ignored += 1;
                continue;
            }

            let (label, created) = store
                .find_or_create_label(&title, candidate.priority)
                .await?;

            if created {
                report.created += 1;
                self.emit(ServerEvent::LabelCreated {
                    label_id: label.id,
                    slug: label.slug.clone(),
                    name: label.name.clone(),
                    priority: label.priority,
                });

                if candidate.priority >= 0 {
                    self.emit(ServerEvent::LabelCountChanged { delta: 1 });
                }
            }

            let mut assoc = store
                .find_or_create_record_label(
                    record_id,
                    label.id,
                    candidate.uncertainty,
                    candidate.source,
                )
                .await?;

            if assoc.uncertainty > candidate.uncertainty && assoc.uncertainty < UNCERTAINTY_INVALID
            {
                debug!(
                    subsystem = "engine",
                    component = "labels",
                    record_id = %record_id,
                    label = %label.slug,
                    from = assoc.uncertainty,
                    to = candidate.uncertainty,
                    "Label uncertainty improved"
                );
                assoc.uncertainty = candidate.uncertainty;
                assoc.source = candidate.source;
                store.update_record_label(&assoc).await?;
                report.improved += 1;
            }
        }

        record.labels = store.labels_for_record(record_id).await?;

        debug!(
            subsystem = "engine",
            component = "labels",
            op = "merge_labels",
            record_id = %record_id,
            label_count = record.labels.len(),
            created = report.created,
            "Labels merged"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::provenance::Source;
    use uuid::Uuid;

    fn label(name: &str, priority: i32, uncertainty: i32) -> ClassifierLabel {
        ClassifierLabel::new(name, priority, uncertainty, Source::Image)
    }

    #[tokio::test]
    async fn test_merge_creates_labels_and_emits_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let associator = LabelAssociator::new(bus);
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        let report = associator
            .merge_labels(&mut store, &mut record, &[label("cat", 0, 30), label("blurry", -2, 5)])
            .await
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(record.labels.len(), 2);

        let mut types = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            types.push(envelope.event_type);
        }
        assert_eq!(
            types,
            vec!["label.created", "count.labels", "label.created"],
            "negative priority labels are not counted"
        );
    }

    #[tokio::test]
    async fn test_uncertainty_only_improves() {
        let associator = LabelAssociator::silent();
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        for uncertainty in [60, 80, 20, 40] {
            associator
                .merge_labels(&mut store, &mut record, &[label("dog", 1, uncertainty)])
                .await
                .unwrap();
        }

        assert_eq!(record.labels.len(), 1);
        assert_eq!(record.labels[0].uncertainty, 20);
    }

    #[tokio::test]
    async fn test_invalid_uncertainty_is_never_improved() {
        let associator = LabelAssociator::silent();
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        associator
            .merge_labels(&mut store, &mut record, &[label("dog", 1, UNCERTAINTY_INVALID)])
            .await
            .unwrap();
        let report = associator
            .merge_labels(&mut store, &mut record, &[label("dog", 1, 10)])
            .await
            .unwrap();

        assert_eq!(report.improved, 0);
        assert_eq!(record.labels.len(), 1);
        assert_eq!(record.labels[0].uncertainty, UNCERTAINTY_INVALID);
    }

    #[tokio::test]
    async fn test_improvement_takes_incoming_source() {
        let associator = LabelAssociator::silent();
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        associator
            .merge_labels(&mut store, &mut record, &[label("dog", 1, 50)])
            .await
            .unwrap();
        let manual = ClassifierLabel::new("dog", 1, 0, Source::Manual);
        let report = associator
            .merge_labels(&mut store, &mut record, &[manual])
            .await
            .unwrap();

        assert_eq!(report.improved, 1);
        assert_eq!(record.labels[0].source, Source::Manual);
        assert_eq!(record.labels[0].uncertainty, 0);
    }

    #[tokio::test]
    async fn test_same_name_different_priority_is_distinct() {
        let associator = LabelAssociator::silent();
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        let report = associator
            .merge_labels(&mut store, &mut record, &[label("tree", 0, 10), label("tree", 2, 10)])
            .await
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(record.labels.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_names_are_ignored() {
        let associator = LabelAssociator::silent();
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::with_id(Uuid::new_v4());

        let report = associator
            .merge_labels(&mut store, &mut record, &[label("  ", 0, 10)])
            .await
            .unwrap();

        assert_eq!(report.ignored, 1);
        assert!(record.labels.is_empty());
    }

    #[tokio::test]
    async fn test_merge_requires_identity() {
        let mut store = InMemoryStore::new();
        let mut record = MediaRecord::new();
        let err = LabelAssociator::silent()
            .merge_labels(&mut store, &mut record, &[label("cat", 0, 10)])
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }
}
