//! Work item, participant and transcription queries, and the completion
//! transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use super::Db;
use crate::error::{Error, Result};
use crate::model::*;
use crate::store::{CompletionOutcome, Eligibility, Store};

const WORK_ITEM_COLUMNS: &str = "id, storage_link, completion_counts, created_at";

impl Db {
    /// Insert a work item. Normally done by the ingestion pipeline.
    pub async fn create_work_item(&self, new: NewWorkItem) -> Result<WorkItem> {
        let row: WorkItemRow = sqlx::query_as(
            "INSERT INTO work_items (id, storage_link, completion_counts, created_at)
             VALUES ($1, $2, $3, now())
             RETURNING id, storage_link, completion_counts, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.storage_link)
        .bind(Json(&new.completion_counts))
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    /// Register a participant with an empty history.
    pub async fn create_participant(&self) -> Result<Participant> {
        let row: ParticipantRow = sqlx::query_as(
            "INSERT INTO participants (id, transcribed, created_at)
             VALUES ($1, '{}', now())
             RETURNING id, transcribed, created_at",
        )
        .bind(Uuid::new_v4())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }
}

impl Store for Db {
    async fn get_work_item(&self, id: WorkItemId) -> Result<WorkItem> {
        let row: Option<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(WorkItem::from)
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Participant> {
        let row: Option<ParticipantRow> =
            sqlx::query_as("SELECT id, transcribed, created_at FROM participants WHERE id = $1")
                .bind(id.0)
                .fetch_optional(self.pool())
                .await?;

        row.map(Participant::from)
            .ok_or_else(|| Error::NotFound(format!("participant {id}")))
    }

    async fn get_transcription(&self, id: TranscriptionId) -> Result<Transcription> {
        let row: Option<TranscriptionRow> = sqlx::query_as(
            "SELECT id, participant_id, work_item_id, language, text, status, created_at
             FROM transcriptions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("transcription {id}")))?
            .try_into_transcription()
    }

    fn exclusion_limit(&self) -> Option<usize> {
        self.exclusion_limit
    }

    async fn eligible_page(
        &self,
        query: &Eligibility,
        after: Option<WorkItemId>,
        limit: usize,
    ) -> Result<Vec<WorkItem>> {
        if let Some(max) = self.exclusion_limit {
            if query.exclude.len() > max {
                return Err(Error::InvalidInput(format!(
                    "exclusion list of {} ids exceeds limit of {max}",
                    query.exclude.len()
                )));
            }
        }

        let exclude: Vec<Uuid> = query.exclude.iter().map(|id| id.0).collect();
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items
             WHERE id <> ALL($1)
             AND COALESCE((completion_counts ->> $2)::int, 0) < $3
             AND ($4::uuid IS NULL OR id > $4)
             ORDER BY id
             LIMIT $5"
        ))
        .bind(&exclude)
        .bind(query.language.as_str())
        .bind(i64::from(query.quota))
        .bind(after.map(|id| id.0))
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(WorkItem::from).collect())
    }

    async fn complete(&self, new: NewTranscription, quota: u32) -> Result<CompletionOutcome> {
        let mut tx = self.pool().begin().await?;

        // Row lock serializes completions of the same work item.
        let count: Option<(i64,)> = sqlx::query_as(
            "SELECT COALESCE((completion_counts ->> $2)::bigint, 0)
             FROM work_items WHERE id = $1
             FOR UPDATE",
        )
        .bind(new.work_item_id.0)
        .bind(new.language.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((count,)) = count else {
            tx.rollback().await?;
            return Ok(CompletionOutcome::NotFound(format!(
                "work item {}",
                new.work_item_id
            )));
        };

        // Serializes completions by the same participant.
        let participant: Option<ParticipantRow> = sqlx::query_as(
            "SELECT id, transcribed, created_at FROM participants WHERE id = $1 FOR UPDATE",
        )
        .bind(new.participant_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(participant) = participant else {
            tx.rollback().await?;
            return Ok(CompletionOutcome::NotFound(format!(
                "participant {}",
                new.participant_id
            )));
        };

        let existing: Option<TranscriptionRow> = sqlx::query_as(
            "SELECT id, participant_id, work_item_id, language, text, status, created_at
             FROM transcriptions
             WHERE participant_id = $1 AND work_item_id = $2",
        )
        .bind(new.participant_id.0)
        .bind(new.work_item_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            tx.rollback().await?;
            debug!(
                work_item = %new.work_item_id,
                participant = %new.participant_id,
                "completion already recorded, nothing written"
            );
            return Ok(CompletionOutcome::AlreadyRecorded(Recorded {
                transcription: existing.try_into_transcription()?,
                participant: participant.into(),
            }));
        }

        if count >= i64::from(quota) {
            tx.rollback().await?;
            debug!(work_item = %new.work_item_id, count, quota, "quota reached, nothing written");
            return Ok(CompletionOutcome::QuotaExceeded {
                count: u32::try_from(count).unwrap_or(u32::MAX),
            });
        }

        let participant: ParticipantRow = sqlx::query_as(
            "UPDATE participants
             SET transcribed = CASE WHEN $2 = ANY(transcribed) THEN transcribed
                                    ELSE array_append(transcribed, $2) END
             WHERE id = $1
             RETURNING id, transcribed, created_at",
        )
        .bind(new.participant_id.0)
        .bind(new.work_item_id.0)
        .fetch_one(&mut *tx)
        .await?;

        let row: TranscriptionRow = sqlx::query_as(
            "INSERT INTO transcriptions (id, participant_id, work_item_id, language, text, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             RETURNING id, participant_id, work_item_id, language, text, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.participant_id.0)
        .bind(new.work_item_id.0)
        .bind(new.language.as_str())
        .bind(&new.text)
        .bind(TranscriptionStatus::New.to_string())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE work_items
             SET completion_counts = jsonb_set(completion_counts, ARRAY[$2], to_jsonb($3::bigint), true)
             WHERE id = $1",
        )
        .bind(new.work_item_id.0)
        .bind(new.language.as_str())
        .bind(count + 1)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CompletionOutcome::Recorded(Recorded {
            transcription: row.try_into_transcription()?,
            participant: participant.into(),
        }))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    storage_link: String,
    completion_counts: Json<BTreeMap<String, u32>>,
    created_at: DateTime<Utc>,
}

impl From<WorkItemRow> for WorkItem {
    fn from(row: WorkItemRow) -> Self {
        Self {
            id: WorkItemId(row.id),
            storage_link: row.storage_link,
            completion_counts: row.completion_counts.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    transcribed: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: ParticipantId(row.id),
            transcribed: row.transcribed.into_iter().map(WorkItemId).collect(),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TranscriptionRow {
    id: Uuid,
    participant_id: Uuid,
    work_item_id: Uuid,
    language: String,
    text: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TranscriptionRow {
    fn try_into_transcription(self) -> Result<Transcription> {
        Ok(Transcription {
            id: TranscriptionId(self.id),
            created_at: self.created_at,
            participant_id: ParticipantId(self.participant_id),
            work_item_id: WorkItemId(self.work_item_id),
            language: Language::new(self.language)?,
            text: self.text,
            status: self.status.parse()?,
        })
    }
}
