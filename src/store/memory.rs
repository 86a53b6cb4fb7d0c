//! In-process store.
//!
//! All state sits behind one async mutex, which serializes completions.
//! A completion runs every check before its first write, so a rejected
//! or failed completion leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;

use super::{CompletionOutcome, Eligibility, Store};
use crate::error::{Error, Result};
use crate::model::*;

#[derive(Debug, Default)]
struct State {
    work_items: BTreeMap<WorkItemId, WorkItem>,
    participants: HashMap<ParticipantId, Participant>,
    transcriptions: HashMap<TranscriptionId, Transcription>,
    /// Record of each (participant, work item) completion.
    recorded: HashMap<(ParticipantId, WorkItemId), TranscriptionId>,
}

/// In-memory [`Store`] with the same transactional guarantees as Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    exclusion_limit: Option<usize>,
    /// Number of upcoming completions that fail at commit time.
    pending_faults: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject exclusion lists longer than `limit`, like document stores
    /// with a capped `not-in` predicate.
    pub fn with_exclusion_limit(mut self, limit: usize) -> Self {
        self.exclusion_limit = Some(limit);
        self
    }

    /// Make the next `n` completions fail with [`Error::Transient`] after
    /// their checks pass but before anything is written.
    pub fn fail_next_completions(&self, n: u32) {
        self.pending_faults.store(n, Ordering::SeqCst);
    }

    pub async fn create_work_item(&self, new: NewWorkItem) -> WorkItem {
        let item = WorkItem {
            id: WorkItemId::new(),
            storage_link: new.storage_link,
            completion_counts: new.completion_counts,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .work_items
            .insert(item.id, item.clone());
        item
    }

    pub async fn create_participant(&self) -> Participant {
        let participant = Participant::new(ParticipantId::new());
        self.state
            .lock()
            .await
            .participants
            .insert(participant.id, participant.clone());
        participant
    }

    /// All transcriptions of one work item, for inspection.
    pub async fn transcriptions_for(&self, work_item: WorkItemId) -> Vec<Transcription> {
        self.state
            .lock()
            .await
            .transcriptions
            .values()
            .filter(|t| t.work_item_id == work_item)
            .cloned()
            .collect()
    }

    fn take_fault(&self) -> bool {
        self.pending_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Store for MemoryStore {
    async fn get_work_item(&self, id: WorkItemId) -> Result<WorkItem> {
        self.state
            .lock()
            .await
            .work_items
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Participant> {
        self.state
            .lock()
            .await
            .participants
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("participant {id}")))
    }

    async fn get_transcription(&self, id: TranscriptionId) -> Result<Transcription> {
        self.state
            .lock()
            .await
            .transcriptions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("transcription {id}")))
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
        match self.exclusion_limit {
            Some(max) if query.exclude.len() > max => {
                return Err(Error::InvalidInput(format!(
                    "exclusion list of {} ids exceeds store limit of {max}",
                    query.exclude.len()
                )));
            }
            _ => {}
        }

        // Yield so concurrent callers interleave the way remote round trips do.
        tokio::task::yield_now().await;

        let state = self.state.lock().await;
        let start = match after {
            Some(id) => std::ops::Bound::Excluded(id),
            None => std::ops::Bound::Unbounded,
        };
        Ok(state
            .work_items
            .range((start, std::ops::Bound::Unbounded))
            .map(|(_, item)| item)
            .filter(|item| {
                !query.exclude.contains(&item.id)
                    && item.completion_count(&query.language) < query.quota
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn complete(&self, new: NewTranscription, quota: u32) -> Result<CompletionOutcome> {
        tokio::task::yield_now().await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(item) = state.work_items.get_mut(&new.work_item_id) else {
            return Ok(CompletionOutcome::NotFound(format!(
                "work item {}",
                new.work_item_id
            )));
        };
        let Some(participant) = state.participants.get_mut(&new.participant_id) else {
            return Ok(CompletionOutcome::NotFound(format!(
                "participant {}",
                new.participant_id
            )));
        };
        let key = (new.participant_id, new.work_item_id);
        if let Some(existing) = state
            .recorded
            .get(&key)
            .and_then(|id| state.transcriptions.get(id))
        {
            return Ok(CompletionOutcome::AlreadyRecorded(Recorded {
                transcription: existing.clone(),
                participant: participant.clone(),
            }));
        }
        let count = item.completion_count(&new.language);
        if count >= quota {
            return Ok(CompletionOutcome::QuotaExceeded { count });
        }
        if self.take_fault() {
            return Err(Error::Transient("injected commit failure".to_string()));
        }

        let transcription = Transcription {
            id: TranscriptionId::new(),
            created_at: Utc::now(),
            participant_id: new.participant_id,
            work_item_id: new.work_item_id,
            language: new.language,
            text: new.text,
            status: TranscriptionStatus::New,
        };
        item.completion_counts
            .insert(transcription.language.as_str().to_string(), count + 1);
        participant.transcribed.insert(new.work_item_id);
        state.recorded.insert(key, transcription.id);
        state
            .transcriptions
            .insert(transcription.id, transcription.clone());

        Ok(CompletionOutcome::Recorded(Recorded {
            transcription,
            participant: participant.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> Language {
        Language::new("en").unwrap()
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_effect() {
        let store = MemoryStore::new();
        let item = store.create_work_item(NewWorkItem::new("a.ogg")).await;
        let p = store.create_participant().await;
        store.fail_next_completions(1);

        let result = store
            .complete(
                NewTranscription {
                    participant_id: p.id,
                    work_item_id: item.id,
                    language: en(),
                    text: "hello".to_string(),
                },
                2,
            )
            .await;

        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(store.get_work_item(item.id).await.unwrap().completion_count(&en()), 0);
        assert!(store.get_participant(p.id).await.unwrap().transcribed.is_empty());
        assert!(store.transcriptions_for(item.id).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_participant_writes_nothing() {
        let store = MemoryStore::new();
        let item = store.create_work_item(NewWorkItem::new("a.ogg")).await;

        let outcome = store
            .complete(
                NewTranscription {
                    participant_id: ParticipantId::new(),
                    work_item_id: item.id,
                    language: en(),
                    text: "hello".to_string(),
                },
                2,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, CompletionOutcome::NotFound(_)));
        assert_eq!(store.get_work_item(item.id).await.unwrap().completion_count(&en()), 0);
    }

    #[tokio::test]
    async fn repeat_completion_returns_existing_record_even_at_quota() {
        let store = MemoryStore::new();
        let item = store.create_work_item(NewWorkItem::new("a.ogg")).await;
        let p = store.create_participant().await;
        let new = NewTranscription {
            participant_id: p.id,
            work_item_id: item.id,
            language: en(),
            text: "hello".to_string(),
        };

        let first = match store.complete(new.clone(), 1).await.unwrap() {
            CompletionOutcome::Recorded(r) => r,
            other => panic!("expected Recorded, got {other:?}"),
        };
        // The item is now at quota; the repeat must still be acknowledged.
        let again = match store.complete(new, 1).await.unwrap() {
            CompletionOutcome::AlreadyRecorded(r) => r,
            other => panic!("expected AlreadyRecorded, got {other:?}"),
        };

        assert_eq!(again.transcription, first.transcription);
        assert_eq!(again.participant, first.participant);
        assert_eq!(store.get_work_item(item.id).await.unwrap().completion_count(&en()), 1);
        assert_eq!(store.transcriptions_for(item.id).await.len(), 1);
    }

    #[tokio::test]
    async fn eligible_page_rejects_oversized_exclusions() {
        let store = MemoryStore::new().with_exclusion_limit(1);
        let query = Eligibility {
            language: en(),
            quota: 1,
            exclude: vec![WorkItemId::new(), WorkItemId::new()],
        };
        assert!(matches!(
            store.eligible_page(&query, None, 10).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn eligible_page_pages_by_id() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .create_work_item(NewWorkItem::new(format!("{i}.ogg")))
                .await;
        }
        let query = Eligibility {
            language: en(),
            quota: 1,
            exclude: Vec::new(),
        };

        let first = store.eligible_page(&query, None, 3).await.unwrap();
        let rest = store
            .eligible_page(&query, first.last().map(|w| w.id), 3)
            .await
            .unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(rest.len(), 2);
        assert!(first.iter().all(|a| rest.iter().all(|b| a.id < b.id)));
    }
}
