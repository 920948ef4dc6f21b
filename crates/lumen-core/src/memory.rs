//! In-memory [`MediaStore`](crate::traits::MediaStore) for tests and tools.
//!
//! `begin`/`commit`/`rollback` snapshot the whole state so cycle atomicity
//! can be exercised without a database. `fail_on` makes a named operation
//! return an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Details, Keyword, Label, MediaRecord, RecordLabel};
use crate::provenance::Source;
use crate::text;
use crate::traits::{KeywordStore, LabelStore, RecordStore};
use crate::uuid_utils::new_v7;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    records: HashMap<Uuid, MediaRecord>,
    keywords: BTreeMap<String, Keyword>,
    record_keywords: BTreeSet<(Uuid, Uuid)>,
    labels: BTreeMap<(String, i32), Label>,
    record_labels: BTreeMap<(Uuid, Uuid), (i32, Source)>,
}

impl MemoryState {
    fn label_by_id(&self, id: Uuid) -> Option<&Label> {
        self.labels.values().find(|l| l.id == id)
    }

    fn join(&self, record_id: Uuid, label_id: Uuid, uncertainty: i32, source: Source) -> RecordLabel {
        RecordLabel {
            record_id,
            label_id,
            uncertainty,
            source,
            label: self.label_by_id(label_id).cloned(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: MemoryState,
    snapshot: Option<MemoryState>,
    fail_on: Option<&'static str>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cycle; a later `rollback` restores the state as of now.
    pub fn begin(&mut self) {
        self.snapshot = Some(self.state.clone());
    }

    pub fn commit(&mut self) {
        self.snapshot = None;
    }

    pub fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
    }

    /// Make every call of the named trait method fail.
    pub fn fail_on(&mut self, op: &'static str) {
        self.fail_on = Some(op);
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    /// Remove a label entity, leaving its associations dangling.
    pub fn remove_label(&mut self, label_id: Uuid) {
        self.state.labels.retain(|_, l| l.id != label_id);
    }

    pub fn keyword_count(&self) -> usize {
        self.state.keywords.len()
    }

    pub fn label_count(&self) -> usize {
        self.state.labels.len()
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(Error::Internal(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl KeywordStore for InMemoryStore {
    async fn find_or_create_keyword(&mut self, word: &str) -> Result<Keyword> {
        self.check("find_or_create_keyword")?;

        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(Error::InvalidInput("keyword cannot be empty".to_string()));
        }

        let keyword = self
            .state
            .keywords
            .entry(word.clone())
            .or_insert_with(|| Keyword {
                id: new_v7(),
                skip: text::is_stopword(&word),
                keyword: word,
            });

        Ok(keyword.clone())
    }

    async fn link_keyword(&mut self, record_id: Uuid, keyword_id: Uuid) -> Result<()> {
        self.check("link_keyword")?;
        self.state.record_keywords.insert((record_id, keyword_id));
        Ok(())
    }

    async fn prune_keywords(&mut self, record_id: Uuid, keep: &[Uuid]) -> Result<u64> {
        self.check("prune_keywords")?;

        let before = self.state.record_keywords.len();
        self.state
            .record_keywords
            .retain(|(r, k)| *r != record_id || keep.contains(k));

        Ok((before - self.state.record_keywords.len()) as u64)
    }

    async fn keywords_for_record(&mut self, record_id: Uuid) -> Result<Vec<Keyword>> {
        self.check("keywords_for_record")?;

        let ids: BTreeSet<Uuid> = self
            .state
            .record_keywords
            .iter()
            .filter(|(r, _)| *r == record_id)
            .map(|(_, k)| *k)
            .collect();

        Ok(self
            .state
            .keywords
            .values()
            .filter(|k| ids.contains(&k.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LabelStore for InMemoryStore {
    async fn find_or_create_label(&mut self, name: &str, priority: i32) -> Result<(Label, bool)> {
        self.check("find_or_create_label")?;

        let slug = text::slugify(name);
        if slug.is_empty() {
            return Err(Error::InvalidInput(format!("invalid label name: {:?}", name)));
        }

        let key = (slug.clone(), priority);
        if let Some(label) = self.state.labels.get(&key) {
            return Ok((label.clone(), false));
        }

        let label = Label {
            id: new_v7(),
            slug,
            name: name.trim().to_string(),
            priority,
        };
        self.state.labels.insert(key, label.clone());

        Ok((label, true))
    }

    async fn find_or_create_record_label(
        &mut self,
        record_id: Uuid,
        label_id: Uuid,
        uncertainty: i32,
        source: Source,
    ) -> Result<RecordLabel> {
        self.check("find_or_create_record_label")?;

        let (uncertainty, source) = *self
            .state
            .record_labels
            .entry((record_id, label_id))
            .or_insert((uncertainty, source));

        Ok(self.state.join(record_id, label_id, uncertainty, source))
    }

    async fn update_record_label(&mut self, assoc: &RecordLabel) -> Result<()> {
        self.check("update_record_label")?;

        match self
            .state
            .record_labels
            .get_mut(&(assoc.record_id, assoc.label_id))
        {
            Some(stored) => {
                *stored = (assoc.uncertainty, assoc.source);
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "label {} on record {}",
                assoc.label_id, assoc.record_id
            ))),
        }
    }

    async fn labels_for_record(&mut self, record_id: Uuid) -> Result<Vec<RecordLabel>> {
        self.check("labels_for_record")?;

        Ok(self
            .state
            .record_labels
            .iter()
            .filter(|((r, _), _)| *r == record_id)
            .map(|((r, l), (u, s))| self.state.join(*r, *l, *u, *s))
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_record(&mut self, record: &MediaRecord) -> Result<Uuid> {
        self.check("insert_record")?;

        let id = record.id.unwrap_or_else(new_v7);
        let mut stored = record.clone();
        stored.id = Some(id);
        stored.details.record_id = Some(id);
        self.state.records.insert(id, stored);

        Ok(id)
    }

    async fn save_record(&mut self, record: &MediaRecord) -> Result<()> {
        self.check("save_record")?;

        let id = record.require_id("save record")?;
        match self.state.records.get_mut(&id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => Err(Error::RecordNotFound(id)),
        }
    }

    async fn load_record(&mut self, id: Uuid) -> Result<MediaRecord> {
        self.check("load_record")?;

        let mut record = self
            .state
            .records
            .get(&id)
            .cloned()
            .ok_or(Error::RecordNotFound(id))?;

        if record.details.record_id.is_none() {
            record.details = Details::loaded_for(id);
        }
        record.keywords = self
            .keywords_for_record(id)
            .await?
            .into_iter()
            .map(|k| k.keyword)
            .collect();
        record.labels = self.labels_for_record(id).await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyword_find_or_create_is_idempotent() {
        let mut store = InMemoryStore::new();
        let first = store.find_or_create_keyword("Beach").await.unwrap();
        let second = store.find_or_create_keyword("beach").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.keyword_count(), 1);
        assert!(store.find_or_create_keyword("the").await.unwrap().skip);
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let mut store = InMemoryStore::new();
        store.find_or_create_keyword("kept").await.unwrap();

        store.begin();
        store.find_or_create_keyword("discarded").await.unwrap();
        store.find_or_create_label("Cat", 0).await.unwrap();
        store.rollback();

        assert_eq!(store.keyword_count(), 1);
        assert_eq!(store.label_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut store = InMemoryStore::new();
        store.fail_on("link_keyword");
        let err = store.link_keyword(Uuid::nil(), Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        store.clear_failure();
        assert!(store.link_keyword(Uuid::nil(), Uuid::nil()).await.is_ok());
    }

    #[tokio::test]
    async fn test_dangling_label_reference() {
        let mut store = InMemoryStore::new();
        let record_id = Uuid::new_v4();
        let (label, _) = store.find_or_create_label("Cat", 0).await.unwrap();
        store
            .find_or_create_record_label(record_id, label.id, 10, Source::Image)
            .await
            .unwrap();

        store.remove_label(label.id);

        let labels = store.labels_for_record(record_id).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert!(labels[0].label.is_none());
    }

    #[tokio::test]
    async fn test_save_unknown_record_fails() {
        let mut store = InMemoryStore::new();
        let record = MediaRecord::with_id(Uuid::new_v4());
        assert!(matches!(
            store.save_record(&record).await,
            Err(Error::RecordNotFound(_))
        ));
    }
}
