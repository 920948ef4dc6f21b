//! Collaborator interfaces for the reconciliation engine.
//!
//! Store methods take `&mut self`: one store handle represents one
//! exclusive reconciliation cycle (typically a database transaction with
//! the record row locked). Find-or-create methods must be idempotent and
//! safe to race across different records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Keyword, Label, MediaRecord, RecordLabel};
use crate::provenance::Source;

// =============================================================================
// KEYWORD STORE
// =============================================================================

#[async_trait]
pub trait KeywordStore: Send {
    /// Find a keyword by its text or create it, flagging stop-words as `skip`.
    async fn find_or_create_keyword(&mut self, word: &str) -> Result<Keyword>;

    /// Associate a keyword with a record; no-op if already associated.
    async fn link_keyword(&mut self, record_id: Uuid, keyword_id: Uuid) -> Result<()>;

    /// Delete every association of `record_id` whose keyword is not in `keep`.
    ///
    /// Returns the number of associations removed.
    async fn prune_keywords(&mut self, record_id: Uuid, keep: &[Uuid]) -> Result<u64>;

    /// Keywords currently associated with a record.
    async fn keywords_for_record(&mut self, record_id: Uuid) -> Result<Vec<Keyword>>;
}

// =============================================================================
// LABEL STORE
// =============================================================================

#[async_trait]
pub trait LabelStore: Send {
    /// Find a label by `(slug, priority)` or create it.
    ///
    /// The returned flag is `true` when the label was created by this call.
    async fn find_or_create_label(&mut self, name: &str, priority: i32) -> Result<(Label, bool)>;

    /// Find the association or create it with the given uncertainty and source.
    ///
    /// An existing association is returned unchanged.
    async fn find_or_create_record_label(
        &mut self,
        record_id: Uuid,
        label_id: Uuid,
        uncertainty: i32,
        source: Source,
    ) -> Result<RecordLabel>;

    /// Persist uncertainty and source of an existing association.
    async fn update_record_label(&mut self, assoc: &RecordLabel) -> Result<()>;

    /// All associations of a record with their label entities joined.
    async fn labels_for_record(&mut self, record_id: Uuid) -> Result<Vec<RecordLabel>>;
}

// =============================================================================
// RECORD STORE
// =============================================================================

#[async_trait]
pub trait RecordStore: Send {
    /// Insert a new record, returning its id.
    async fn insert_record(&mut self, record: &MediaRecord) -> Result<Uuid>;

    /// Persist a record row together with its details.
    async fn save_record(&mut self, record: &MediaRecord) -> Result<()>;

    /// Load a record with details, keywords and labels.
    async fn load_record(&mut self, id: Uuid) -> Result<MediaRecord>;
}

/// Everything one reconciliation cycle touches.
pub trait MediaStore: KeywordStore + LabelStore + RecordStore {}

impl<T: KeywordStore + LabelStore + RecordStore + ?Sized> MediaStore for T {}

// =============================================================================
// QUALITY SCORE
// =============================================================================

/// External quality-score computation.
pub trait QualityScorer: Send + Sync {
    fn score(&self, record: &MediaRecord) -> i32;
}

impl<F> QualityScorer for F
where
    F: Fn(&MediaRecord) -> i32 + Send + Sync,
{
    fn score(&self, record: &MediaRecord) -> i32 {
        self(record)
    }
}
