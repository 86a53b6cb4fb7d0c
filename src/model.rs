//! Core data model.
//!
//! A work item is an audio response waiting for transcriptions. Each one
//! accepts at most `quota` completed transcriptions per language. A
//! participant transcribes any given work item at most once.

pub mod participant;
pub mod transcription;
pub mod work;

pub use participant::Participant;
pub use transcription::{NewTranscription, Recorded, Transcription, TranscriptionStatus};
pub use work::{Allocation, NewWorkItem, Prompt, PromptKind, WorkItem};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Short display: first 8 chars of UUID
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| Error::InvalidInput(format!("bad {} '{s}': {e}", stringify!($name))))
            }
        }
    };
}

id_newtype!(
    /// Identifier of a work item (an audio response).
    WorkItemId
);
id_newtype!(
    /// Identifier of a registered participant.
    ParticipantId
);
id_newtype!(TranscriptionId);

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Target language of a transcription, e.g. `"en"` or `"sw"`.
///
/// Used as the key into [`WorkItem::completion_counts`], so it must match
/// the taxonomy the ingestion side writes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("language must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Language {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.0
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_rejects_blank_and_trims() {
        assert!(Language::new("").is_err());
        assert!(Language::new("   ").is_err());
        assert_eq!(Language::new(" en ").unwrap().as_str(), "en");
    }

    #[test]
    fn ids_display_short_and_parse_full() {
        let id = WorkItemId::new();
        assert_eq!(id.to_string().len(), 8);
        let parsed: WorkItemId = id.0.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ParticipantId>().is_err());
    }

    #[test]
    fn language_deserialize_validates() {
        let ok: Language = serde_json::from_str("\"yo\"").unwrap();
        assert_eq!(ok.as_str(), "yo");
        assert!(serde_json::from_str::<Language>("\"\"").is_err());
    }
}
