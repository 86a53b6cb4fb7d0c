//! Participants and their transcription history.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ParticipantId, WorkItemId};

/// A registered transcriber.
///
/// `transcribed` is the exclusion set for allocation. Only the recorder
/// changes it, inside the same transaction that creates the transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default)]
    pub transcribed: BTreeSet<WorkItemId>,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            transcribed: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_transcribed(&self, work_item: WorkItemId) -> bool {
        self.transcribed.contains(&work_item)
    }

    /// One-based position of the next prompt, for progress display.
    pub fn position(&self) -> usize {
        self.transcribed.len() + 1
    }
}
