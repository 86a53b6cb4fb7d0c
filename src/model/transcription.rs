//! Transcription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Language, Participant, ParticipantId, TranscriptionId, WorkItemId};
use crate::error::Error;

/// A completed transcription of one work item by one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: TranscriptionId,
    pub created_at: DateTime<Utc>,
    pub participant_id: ParticipantId,
    pub work_item_id: WorkItemId,
    pub language: Language,
    pub text: String,
    pub status: TranscriptionStatus,
}

/// Review status. Only the initial state is managed here; review
/// workflows downstream add their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    New,
}

impl std::fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TranscriptionStatus::New => "new",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TranscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TranscriptionStatus::New),
            other => Err(Error::Other(format!("unknown transcription status: {other}"))),
        }
    }
}

/// Input to [`crate::store::Store::complete`].
#[derive(Debug, Clone)]
pub struct NewTranscription {
    pub participant_id: ParticipantId,
    pub work_item_id: WorkItemId,
    pub language: Language,
    pub text: String,
}

/// A committed completion: the new record plus the participant as stored
/// after the same transaction.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub transcription: Transcription,
    pub participant: Participant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        let s = TranscriptionStatus::New;
        assert_eq!(s.to_string(), "new");
        assert_eq!("new".parse::<TranscriptionStatus>().unwrap(), s);
        assert!("approved".parse::<TranscriptionStatus>().is_err());
    }
}
