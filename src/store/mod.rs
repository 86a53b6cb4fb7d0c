//! Document store contract.
//!
//! The allocator only reads; the recorder only writes through
//! [`Store::complete`], which must be a single transaction. Two backends
//! ship with the crate: Postgres ([`crate::db::Db`]) and an in-process
//! store ([`memory::MemoryStore`]).

pub mod memory;

use std::future::Future;

use crate::error::Result;
use crate::model::{
    Language, NewTranscription, Participant, ParticipantId, Recorded, Transcription,
    TranscriptionId, WorkItem, WorkItemId,
};

/// Filter for the eligible-set query.
#[derive(Debug, Clone)]
pub struct Eligibility {
    pub language: Language,
    pub quota: u32,
    /// Work item ids to leave out. Must not exceed [`Store::exclusion_limit`].
    pub exclude: Vec<WorkItemId>,
}

/// What the completion transaction decided.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// Record created, counter incremented, history appended.
    Recorded(Recorded),
    /// The participant had already recorded this work item. Carries the
    /// existing record; nothing was written.
    AlreadyRecorded(Recorded),
    /// The counter was already at quota. Nothing was written.
    QuotaExceeded { count: u32 },
    /// The work item or participant does not exist. Nothing was written.
    NotFound(String),
}

/// Transactional document store holding work items, participants and
/// transcriptions.
pub trait Store: Send + Sync {
    fn get_work_item(&self, id: WorkItemId) -> impl Future<Output = Result<WorkItem>> + Send;

    fn get_participant(
        &self,
        id: ParticipantId,
    ) -> impl Future<Output = Result<Participant>> + Send;

    fn get_transcription(
        &self,
        id: TranscriptionId,
    ) -> impl Future<Output = Result<Transcription>> + Send;

    /// Largest exclusion list [`Store::eligible_page`] accepts. `None` means unbounded.
    fn exclusion_limit(&self) -> Option<usize>;

    /// Eligible work items ordered by id, strictly after `after`, at most `limit`.
    fn eligible_page(
        &self,
        query: &Eligibility,
        after: Option<WorkItemId>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<WorkItem>>> + Send;

    /// Atomically check the quota, create the transcription, bump the
    /// per-language counter and append to the participant's history.
    ///
    /// A participant holds at most one record per work item. Repeating a
    /// completion returns [`CompletionOutcome::AlreadyRecorded`] even when
    /// the item has since reached quota, so retrying after a lost commit
    /// acknowledgement is safe.
    fn complete(
        &self,
        new: NewTranscription,
        quota: u32,
    ) -> impl Future<Output = Result<CompletionOutcome>> + Send;
}
