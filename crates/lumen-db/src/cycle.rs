//! Transaction-scoped store used for one reconciliation cycle.
//!
//! A [`PgCycle`] owns a database transaction. Every store call of the
//! engine runs inside it, so a failing cycle leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, trace};
use uuid::Uuid;

use lumen_core::defaults::DATE_PART_UNKNOWN;
use lumen_core::text::{is_stopword, slugify};
use lumen_core::{
    new_v7, CaptureTime, Coordinates, Details, Error, Keyword, KeywordStore, Label, LabelStore,
    MediaRecord, RecordLabel, RecordStore, Result, Source, Tracked,
};

const RECORD_COLUMNS: &str = r#"
    r.id, r.title, r.title_source, r.description, r.description_source,
    r.captured_at, r.captured_at_local, r.time_zone, r.captured_at_source,
    r.latitude, r.longitude, r.altitude, r.coordinate_source,
    r.year, r.month, r.quality, r.created_at, r.updated_at, r.edited_at, r.deleted_at,
    d.record_id AS details_record_id, d.keywords AS details_keywords,
    d.subject AS details_subject, d.artist AS details_artist
"#;

fn parse_source(raw: &str) -> Result<Source> {
    raw.parse().map_err(Error::Serialization)
}

fn date_part(value: Option<i32>) -> i32 {
    value.unwrap_or(DATE_PART_UNKNOWN)
}

fn record_from_row(row: &PgRow) -> Result<MediaRecord> {
    let year: i32 = row.get("year");
    let month: i32 = row.get("month");

    let captured_at = CaptureTime {
        at: row.get::<DateTime<Utc>, _>("captured_at"),
        local: row.get::<NaiveDateTime, _>("captured_at_local"),
        zone: row.get("time_zone"),
    };

    let coordinates = Coordinates::new(
        row.get("latitude"),
        row.get("longitude"),
        row.get("altitude"),
    );

    let details_record_id: Option<Uuid> = row.get("details_record_id");
    let details = Details {
        record_id: details_record_id,
        keywords: row
            .get::<Option<String>, _>("details_keywords")
            .unwrap_or_default(),
        subject: row
            .get::<Option<String>, _>("details_subject")
            .unwrap_or_default(),
        artist: row
            .get::<Option<String>, _>("details_artist")
            .unwrap_or_default(),
    };

    Ok(MediaRecord {
        id: Some(row.get("id")),
        title: Tracked::new(
            row.get("title"),
            parse_source(row.get("title_source"))?,
        ),
        description: Tracked::new(
            row.get("description"),
            parse_source(row.get("description_source"))?,
        ),
        captured_at: Tracked::new(captured_at, parse_source(row.get("captured_at_source"))?),
        coordinates: Tracked::new(coordinates, parse_source(row.get("coordinate_source"))?),
        year: (year != DATE_PART_UNKNOWN).then_some(year),
        month: u32::try_from(month).ok(),
        quality: row.get("quality"),
        details,
        keywords: Default::default(),
        labels: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        edited_at: row.get("edited_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn record_label_from_row(row: &PgRow) -> Result<RecordLabel> {
    let joined_id: Option<Uuid> = row.get("joined_label_id");
    let label = match joined_id {
        Some(id) => Some(Label {
            id,
            slug: row.get("slug"),
            name: row.get("name"),
            priority: row.get("priority"),
        }),
        None => None,
    };

    Ok(RecordLabel {
        record_id: row.get("record_id"),
        label_id: row.get("label_id"),
        uncertainty: row.get("uncertainty"),
        source: parse_source(row.get("source"))?,
        label,
    })
}

/// One reconciliation cycle inside a PostgreSQL transaction.
pub struct PgCycle<'c> {
    tx: Transaction<'c, Postgres>,
}

impl<'c> PgCycle<'c> {
    pub fn new(tx: Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }

    /// Lock the record row until the cycle ends.
    ///
    /// Concurrent cycles for the same record wait here.
    pub async fn lock_record(&mut self, id: Uuid) -> Result<()> {
        sqlx::query("SELECT id FROM media_record WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::RecordNotFound(id))?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(Error::Database)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(Error::Database)
    }

    /// Access the underlying transaction for statements outside the store traits.
    pub fn transaction(&mut self) -> &mut Transaction<'c, Postgres> {
        &mut self.tx
    }

    async fn upsert_details(&mut self, id: Uuid, details: &Details) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO media_details (record_id, keywords, subject, artist)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (record_id) DO UPDATE
               SET keywords = EXCLUDED.keywords,
                   subject = EXCLUDED.subject,
                   artist = EXCLUDED.artist"#,
        )
        .bind(id)
        .bind(&details.keywords)
        .bind(&details.subject)
        .bind(&details.artist)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl KeywordStore for PgCycle<'_> {
    async fn find_or_create_keyword(&mut self, word: &str) -> Result<Keyword> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(Error::InvalidInput("keyword cannot be empty".to_string()));
        }

        sqlx::query(
            "INSERT INTO keyword (id, keyword, skip) VALUES ($1, $2, $3)
             ON CONFLICT (keyword) DO NOTHING",
        )
        .bind(new_v7())
        .bind(&word)
        .bind(is_stopword(&word))
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query("SELECT id, keyword, skip FROM keyword WHERE keyword = $1")
            .bind(&word)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        trace!(
            subsystem = "database",
            component = "keywords",
            keyword = %word,
            "Keyword resolved"
        );

        Ok(Keyword {
            id: row.get("id"),
            keyword: row.get("keyword"),
            skip: row.get("skip"),
        })
    }

    async fn link_keyword(&mut self, record_id: Uuid, keyword_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO media_keyword (record_id, keyword_id) VALUES ($1, $2)
             ON CONFLICT (record_id, keyword_id) DO NOTHING",
        )
        .bind(record_id)
        .bind(keyword_id)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn prune_keywords(&mut self, record_id: Uuid, keep: &[Uuid]) -> Result<u64> {
        // An empty `keep` removes every association.
        let result = sqlx::query(
            "DELETE FROM media_keyword WHERE record_id = $1 AND NOT (keyword_id = ANY($2))",
        )
        .bind(record_id)
        .bind(keep)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn keywords_for_record(&mut self, record_id: Uuid) -> Result<Vec<Keyword>> {
        let rows = sqlx::query(
            r#"SELECT k.id, k.keyword, k.skip
               FROM keyword k
               JOIN media_keyword mk ON mk.keyword_id = k.id
               WHERE mk.record_id = $1
               ORDER BY k.keyword"#,
        )
        .bind(record_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Keyword {
                id: row.get("id"),
                keyword: row.get("keyword"),
                skip: row.get("skip"),
            })
            .collect())
    }
}

#[async_trait]
impl LabelStore for PgCycle<'_> {
    async fn find_or_create_label(&mut self, name: &str, priority: i32) -> Result<(Label, bool)> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(Error::InvalidInput(format!("invalid label name: {:?}", name)));
        }

        let inserted = sqlx::query(
            r#"INSERT INTO label (id, slug, name, priority, created_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (slug, priority) DO NOTHING
               RETURNING id"#,
        )
        .bind(new_v7())
        .bind(&slug)
        .bind(name.trim())
        .bind(priority)
        .bind(Utc::now())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query(
            "SELECT id, slug, name, priority FROM label WHERE slug = $1 AND priority = $2",
        )
        .bind(&slug)
        .bind(priority)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        let label = Label {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            priority: row.get("priority"),
        };

        if inserted.is_some() {
            debug!(
                subsystem = "database",
                component = "labels",
                label_id = %label.id,
                slug = %label.slug,
                priority,
                "Label created"
            );
        }

        Ok((label, inserted.is_some()))
    }

    async fn find_or_create_record_label(
        &mut self,
        record_id: Uuid,
        label_id: Uuid,
        uncertainty: i32,
        source: Source,
    ) -> Result<RecordLabel> {
        sqlx::query(
            r#"INSERT INTO media_label (record_id, label_id, uncertainty, source)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (record_id, label_id) DO NOTHING"#,
        )
        .bind(record_id)
        .bind(label_id)
        .bind(uncertainty)
        .bind(source.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query(
            r#"SELECT ml.record_id, ml.label_id, ml.uncertainty, ml.source,
                      l.id AS joined_label_id, l.slug, l.name, l.priority
               FROM media_label ml
               LEFT JOIN label l ON l.id = ml.label_id
               WHERE ml.record_id = $1 AND ml.label_id = $2"#,
        )
        .bind(record_id)
        .bind(label_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        record_label_from_row(&row)
    }

    async fn update_record_label(&mut self, assoc: &RecordLabel) -> Result<()> {
        let result = sqlx::query(
            "UPDATE media_label SET uncertainty = $1, source = $2
             WHERE record_id = $3 AND label_id = $4",
        )
        .bind(assoc.uncertainty)
        .bind(assoc.source.as_str())
        .bind(assoc.record_id)
        .bind(assoc.label_id)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "label {} on record {}",
                assoc.label_id, assoc.record_id
            )));
        }
        Ok(())
    }

    async fn labels_for_record(&mut self, record_id: Uuid) -> Result<Vec<RecordLabel>> {
        let rows = sqlx::query(
            r#"SELECT ml.record_id, ml.label_id, ml.uncertainty, ml.source,
                      l.id AS joined_label_id, l.slug, l.name, l.priority
               FROM media_label ml
               LEFT JOIN label l ON l.id = ml.label_id
               WHERE ml.record_id = $1
               ORDER BY ml.uncertainty, l.priority DESC NULLS LAST"#,
        )
        .bind(record_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(record_label_from_row).collect()
    }
}

#[async_trait]
impl RecordStore for PgCycle<'_> {
    async fn insert_record(&mut self, record: &MediaRecord) -> Result<Uuid> {
        let id = record.id.unwrap_or_else(new_v7);
        let captured = record.captured_at.value();
        let coordinates = record.coordinates.value();

        sqlx::query(
            r#"INSERT INTO media_record (
                   id, title, title_source, description, description_source,
                   captured_at, captured_at_local, time_zone, captured_at_source,
                   latitude, longitude, altitude, coordinate_source,
                   year, month, quality, created_at, updated_at, edited_at, deleted_at
               ) VALUES (
                   $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                   $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
               )"#,
        )
        .bind(id)
        .bind(record.title.value())
        .bind(record.title.source().as_str())
        .bind(record.description.value())
        .bind(record.description.source().as_str())
        .bind(captured.at)
        .bind(captured.local)
        .bind(&captured.zone)
        .bind(record.captured_at.source().as_str())
        .bind(coordinates.latitude)
        .bind(coordinates.longitude)
        .bind(coordinates.altitude)
        .bind(record.coordinates.source().as_str())
        .bind(date_part(record.year))
        .bind(date_part(record.month.map(|m| m as i32)))
        .bind(record.quality)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.edited_at)
        .bind(record.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        self.upsert_details(id, &record.details).await?;

        debug!(
            subsystem = "database",
            component = "records",
            op = "insert",
            record_id = %id,
            "Media record inserted"
        );

        Ok(id)
    }

    async fn save_record(&mut self, record: &MediaRecord) -> Result<()> {
        let id = record.require_id("save record")?;
        let captured = record.captured_at.value();
        let coordinates = record.coordinates.value();

        let result = sqlx::query(
            r#"UPDATE media_record SET
                   title = $2, title_source = $3,
                   description = $4, description_source = $5,
                   captured_at = $6, captured_at_local = $7, time_zone = $8,
                   captured_at_source = $9,
                   latitude = $10, longitude = $11, altitude = $12, coordinate_source = $13,
                   year = $14, month = $15, quality = $16,
                   updated_at = $17, edited_at = $18
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(record.title.value())
        .bind(record.title.source().as_str())
        .bind(record.description.value())
        .bind(record.description.source().as_str())
        .bind(captured.at)
        .bind(captured.local)
        .bind(&captured.zone)
        .bind(record.captured_at.source().as_str())
        .bind(coordinates.latitude)
        .bind(coordinates.longitude)
        .bind(coordinates.altitude)
        .bind(record.coordinates.source().as_str())
        .bind(date_part(record.year))
        .bind(date_part(record.month.map(|m| m as i32)))
        .bind(record.quality)
        .bind(record.updated_at)
        .bind(record.edited_at)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }

        self.upsert_details(id, &record.details).await
    }

    async fn load_record(&mut self, id: Uuid) -> Result<MediaRecord> {
        let sql = format!(
            "SELECT {} FROM media_record r
             LEFT JOIN media_details d ON d.record_id = r.id
             WHERE r.id = $1",
            RECORD_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::RecordNotFound(id))?;

        let mut record = record_from_row(&row)?;
        if record.details.record_id.is_none() {
            record.details.record_id = Some(id);
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
