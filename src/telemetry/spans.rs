//! Span helpers for allocation and completion.

use tracing::Span;

use crate::model::{Language, ParticipantId, WorkItemId};

/// Span around one `next_prompt` call. `outcome` is filled by
/// [`record_outcome`].
pub fn start_allocation_span(language: &Language, participant: ParticipantId) -> Span {
    tracing::info_span!(
        "prompt.allocate",
        "transcription.language" = %language,
        "participant.id" = %participant,
        "outcome" = tracing::field::Empty,
    )
}

/// Span around one `record_transcription` call, retries included.
pub fn start_record_span(language: &Language, work_item: WorkItemId) -> Span {
    tracing::info_span!(
        "transcription.record",
        "transcription.language" = %language,
        "work_item.id" = %work_item,
        "transcription.attempts" = tracing::field::Empty,
        "outcome" = tracing::field::Empty,
    )
}

pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("outcome", outcome);
}

pub fn record_attempts(span: &Span, attempts: u32) {
    span.record("transcription.attempts", attempts);
}
