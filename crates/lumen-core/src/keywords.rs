//! Keyword index: tokenize a record's text fields and converge the
//! persisted keyword associations onto exactly that token set.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::MediaRecord;
use crate::text;
use crate::traits::KeywordStore;

/// Outcome of one reindex pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Keywords associated with the record after the pass.
    pub linked: usize,
    /// Tokens dropped because their keyword is flagged as noise.
    pub skipped: usize,
    /// Stale associations removed.
    pub pruned: u64,
}

/// Tokens the record should be indexed under: title, description and the
/// free-text detail fields, deduplicated and sorted.
pub fn collect_keywords(record: &MediaRecord) -> Vec<String> {
    let sources = [
        record.title.value().as_str(),
        record.description.value().as_str(),
        record.details.keywords.as_str(),
        record.details.subject.as_str(),
        record.details.artist.as_str(),
    ];

    text::unique_words(sources.into_iter().flat_map(text::keywords))
}

/// Rebuild the keyword associations of `record`.
///
/// Requires an identity and loaded details. Re-running with unchanged text
/// is a no-op; after a text change only the tokens of the new text remain.
pub async fn reindex<S>(store: &mut S, record: &mut MediaRecord) -> Result<IndexReport>
where
    S: KeywordStore + ?Sized,
{
    let record_id = record.require_id("index keywords")?;

    if !record.details_loaded() {
        return Err(Error::DetailsNotLoaded(format!(
            "can't index keywords for {}",
            record_id
        )));
    }

    let words = collect_keywords(record);
    let mut keep: Vec<Uuid> = Vec::with_capacity(words.len());
    let mut report = IndexReport::default();

    record.keywords.clear();

    for word in words {
        let keyword = store.find_or_create_keyword(&word).await?;

        if keyword.skip {
            trace!(
                subsystem = "engine",
                component = "keywords",
                keyword = %keyword.keyword,
                "Skipping noise keyword"
            );
            report.skipped += 1;
            continue;
        }

        store.link_keyword(record_id, keyword.id).await?;
        keep.push(keyword.id);
        record.keywords.insert(keyword.keyword);
    }

    report.linked = keep.len();
    report.pruned = store.prune_keywords(record_id, &keep).await?;

    debug!(
        subsystem = "engine",
        component = "keywords",
        op = "reindex",
        record_id = %record_id,
        keyword_count = report.linked,
        pruned_count = report.pruned,
        "Keywords indexed"
    );

    Ok(report)
}
