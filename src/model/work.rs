//! Work items (audio responses) and the prompts handed out for them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Language, WorkItemId};

/// A unit of work subject to a per-language transcription quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,

    /// Opaque reference to the audio payload. Never interpreted here.
    pub storage_link: String,

    /// Completed transcriptions per language code. A missing key means zero.
    #[serde(default)]
    pub completion_counts: BTreeMap<String, u32>,

    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn completion_count(&self, language: &Language) -> u32 {
        self.completion_counts
            .get(language.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Unseen by the participant and still under quota for `language`.
    pub fn is_eligible_for(
        &self,
        language: &Language,
        quota: u32,
        history: &BTreeSet<WorkItemId>,
    ) -> bool {
        !history.contains(&self.id) && self.completion_count(language) < quota
    }
}

/// Builder for ingesting a new work item.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub(crate) storage_link: String,
    pub(crate) completion_counts: BTreeMap<String, u32>,
}

impl NewWorkItem {
    pub fn new(storage_link: impl Into<String>) -> Self {
        Self {
            storage_link: storage_link.into(),
            completion_counts: BTreeMap::new(),
        }
    }

    /// Seed a starting count, e.g. when importing already-transcribed audio.
    pub fn completion_count(mut self, language: &Language, count: u32) -> Self {
        self.completion_counts
            .insert(language.as_str().to_string(), count);
        self
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Kind of payload a prompt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Audio,
}

/// What a participant is asked to transcribe next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(rename = "type")]
    pub kind: PromptKind,
    /// The work item's storage link.
    pub content: String,
    pub work_item_id: WorkItemId,
    /// Progress indicator only: how many items this participant has done, plus one.
    pub position: usize,
}

/// Result of asking for the next prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    Assigned(Prompt),
    /// Nothing unseen and under quota exists right now. Not a failure.
    Exhausted,
}

impl Allocation {
    pub const EXHAUSTED_MESSAGE: &'static str = "no work available right now";

    pub fn prompt(&self) -> Option<&Prompt> {
        match self {
            Allocation::Assigned(prompt) => Some(prompt),
            Allocation::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Allocation::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(counts: &[(&str, u32)]) -> WorkItem {
        WorkItem {
            id: WorkItemId::new(),
            storage_link: "gs://bucket/a.ogg".to_string(),
            completion_counts: counts.iter().map(|(l, c)| (l.to_string(), *c)).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_language_counts_as_zero() {
        let en = Language::new("en").unwrap();
        let sw = Language::new("sw").unwrap();
        let w = item(&[("sw", 3)]);
        assert_eq!(w.completion_count(&en), 0);
        assert_eq!(w.completion_count(&sw), 3);
    }

    #[test]
    fn eligibility_checks_history_and_quota() {
        let en = Language::new("en").unwrap();
        let w = item(&[("en", 1)]);
        let mut history = BTreeSet::new();

        assert!(w.is_eligible_for(&en, 2, &history));
        assert!(!w.is_eligible_for(&en, 1, &history));

        history.insert(w.id);
        assert!(!w.is_eligible_for(&en, 2, &history));
    }

    #[test]
    fn prompt_serializes_with_type_tag() {
        let prompt = Prompt {
            kind: PromptKind::Audio,
            content: "gs://bucket/a.ogg".to_string(),
            work_item_id: WorkItemId::new(),
            position: 1,
        };
        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["position"], 1);
    }
}
