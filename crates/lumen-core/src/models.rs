//! Media record and the persisted entities reconciled around it.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::ClassifierLabel;
use crate::defaults::{CLIP_DETAILS, MIN_PLAUSIBLE_YEAR};
use crate::provenance::Source;
use crate::text;

// =============================================================================
// PROVENANCE-TRACKED VALUES
// =============================================================================

/// A field value paired with the source that set it.
///
/// The pair can only be replaced as a whole, through the field reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    value: T,
    source: Source,
}

impl<T> Tracked<T> {
    /// Wrap a value loaded from storage together with its stored source.
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub(crate) fn replace(&mut self, value: T, source: Source) {
        self.value = value;
        self.source = source;
    }

    pub(crate) fn take(&mut self) -> T
    where
        T: Default,
    {
        std::mem::take(&mut self.value)
    }
}

impl<T: Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default(), Source::Auto)
    }
}

/// When a record was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTime {
    /// UTC capture time, second precision.
    pub at: DateTime<Utc>,
    /// Wall-clock time at the capture location.
    pub local: NaiveDateTime,
    /// IANA zone name, empty when unknown.
    pub zone: String,
}

impl CaptureTime {
    /// Capture time for a record created right now.
    pub fn now() -> Self {
        let at = Utc::now().round_subsecs(0);
        Self {
            at,
            local: at.naive_utc(),
            zone: String::new(),
        }
    }

    /// Whether the local time carries a real calendar date.
    pub fn local_known(&self) -> bool {
        self.local.year() >= MIN_PLAUSIBLE_YEAR
    }
}

impl Default for CaptureTime {
    fn default() -> Self {
        Self::now()
    }
}

/// Geographic position; `(0, 0)` means "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, altitude: i32) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Both latitude and longitude are set.
    pub fn has_lat_lng(&self) -> bool {
        self.latitude != 0.0 && self.longitude != 0.0
    }

    pub fn same_position(&self, other: &Coordinates) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

// =============================================================================
// DETAILS
// =============================================================================

/// Free-text detail fields stored alongside a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    /// Record these details were loaded for; `None` means not loaded.
    pub record_id: Option<Uuid>,
    /// Comma separated free-text keywords.
    pub keywords: String,
    pub subject: String,
    pub artist: String,
}

impl Details {
    pub fn loaded_for(record_id: Uuid) -> Self {
        Self {
            record_id: Some(record_id),
            ..Default::default()
        }
    }

    /// Rewrite `keywords` as a sorted, deduplicated, comma separated list.
    pub fn normalize_keywords(&mut self) {
        self.set_keywords(text::unique_keywords(&self.keywords));
    }

    /// Merge additional keywords into the free-text keyword list.
    pub fn merge_keywords<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = text::unique_keywords(&self.keywords);
        words.extend(extra.into_iter().map(|w| w.as_ref().to_lowercase()));
        self.set_keywords(text::unique_words(words));
    }

    fn set_keywords(&mut self, words: Vec<String>) {
        self.keywords = text::clip(&words.join(", "), CLIP_DETAILS);
    }
}

// =============================================================================
// KEYWORDS & LABELS
// =============================================================================

/// Persisted keyword entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: Uuid,
    pub keyword: String,
    /// Noise keywords are never associated with records.
    pub skip: bool,
}

/// Persisted label entity, keyed by `(slug, priority)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub priority: i32,
}

/// Association between a record and a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLabel {
    pub record_id: Uuid,
    pub label_id: Uuid,
    pub uncertainty: i32,
    pub source: Source,
    /// Joined label entity; `None` when the reference is dangling.
    pub label: Option<Label>,
}

impl RecordLabel {
    /// Classifier view of this association, if the label is present.
    pub fn classifier_label(&self) -> Option<ClassifierLabel> {
        self.label.as_ref().map(|l| ClassifierLabel {
            name: l.name.clone(),
            priority: l.priority,
            uncertainty: self.uncertainty,
            source: self.source,
        })
    }
}

// =============================================================================
// MEDIA RECORD
// =============================================================================

/// The reconciled metadata entity for one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Assigned on first insert; `None` for records never persisted.
    pub id: Option<Uuid>,
    pub title: Tracked<String>,
    pub description: Tracked<String>,
    pub captured_at: Tracked<CaptureTime>,
    pub coordinates: Tracked<Coordinates>,
    /// Calendar year of the local capture time; `None` while the capture
    /// time is automatic.
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub quality: i32,
    pub details: Details,
    pub keywords: BTreeSet<String>,
    pub labels: Vec<RecordLabel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaRecord {
    /// A fresh record with every field automatic.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: Tracked::default(),
            description: Tracked::default(),
            captured_at: Tracked::default(),
            coordinates: Tracked::default(),
            year: None,
            month: None,
            quality: 0,
            details: Details::default(),
            keywords: BTreeSet::new(),
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
            edited_at: None,
            deleted_at: None,
        }
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            details: Details::loaded_for(id),
            ..Self::new()
        }
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn has_title(&self) -> bool {
        !self.title.value().is_empty()
    }

    pub fn has_description(&self) -> bool {
        !self.description.value().is_empty()
    }

    pub fn has_lat_lng(&self) -> bool {
        self.coordinates.value().has_lat_lng()
    }

    pub fn details_loaded(&self) -> bool {
        self.id.is_some() && self.details.record_id == self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Re-derive year and month from the capture time.
    pub fn update_year_month(&mut self) {
        let captured = self.captured_at.value();

        if self.captured_at.source() == Source::Auto || !captured.local_known() {
            self.year = None;
            self.month = None;
        } else {
            self.year = Some(captured.local.year());
            self.month = Some(captured.local.month());
        }
    }

    /// Classifier view of the associated labels, best first.
    ///
    /// Associations whose label entity is missing are logged and skipped.
    pub fn classify_labels(&self) -> Vec<ClassifierLabel> {
        let mut result = Vec::with_capacity(self.labels.len());

        for assoc in &self.labels {
            match assoc.classifier_label() {
                Some(label) => result.push(label),
                None => tracing::warn!(
                    subsystem = "engine",
                    component = "labels",
                    record_id = %assoc.record_id,
                    label_id = %assoc.label_id,
                    "Empty label reference while building classifier view"
                ),
            }
        }

        crate::classify::rank_labels(&mut result);
        result
    }

    /// Identity or a [`crate::Error::MissingIdentity`] naming `action`.
    pub fn require_id(&self, action: &str) -> crate::Result<Uuid> {
        self.id
            .ok_or_else(|| crate::Error::MissingIdentity(format!("can't {}, id is empty", action)))
    }
}

impl Default for MediaRecord {
    fn default() -> Self {
        Self::new()
    }
}
