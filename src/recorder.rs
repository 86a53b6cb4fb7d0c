//! Recording completed transcriptions.
//!
//! The quota check, the record insert, the counter increment and the
//! history append all happen in one store transaction. Transient store
//! failures are retried with backoff; quota and lookup failures are not.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{Instrument, info, warn};

use crate::config::AllocatorSettings;
use crate::error::{Error, Result};
use crate::model::*;
use crate::retry::RetryPolicy;
use crate::store::{CompletionOutcome, Store};
use crate::telemetry::metrics;
use crate::telemetry::spans::{record_attempts, record_outcome, start_record_span};

pub struct Recorder<S> {
    store: Arc<S>,
    settings: AllocatorSettings,
    retry: RetryPolicy,
}

impl<S> Clone for Recorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: Store> Recorder<S> {
    pub fn new(store: Arc<S>, settings: AllocatorSettings) -> Self {
        Self {
            store,
            settings,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record `text` as `participant`'s transcription of `work_item`.
    ///
    /// On success the returned [`Recorded::participant`] is the history as
    /// committed; callers holding a cached participant should replace it.
    /// Recording the same work item again returns the participant's
    /// existing transcription and writes nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::QuotaExceeded`] if the item is already at quota for
    ///   `language`. Nothing was written; allocate a new prompt.
    /// - [`Error::NotFound`] if the work item or participant does not exist.
    /// - [`Error::RetriesExhausted`] if the store kept failing transiently.
    pub async fn record_transcription(
        &self,
        participant: ParticipantId,
        work_item: WorkItemId,
        language: &Language,
        text: &str,
    ) -> Result<Recorded> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "transcription text must not be empty".to_string(),
            ));
        }

        let span = start_record_span(language, work_item);
        let started = Instant::now();
        let new = NewTranscription {
            participant_id: participant,
            work_item_id: work_item,
            language: language.clone(),
            text: text.to_string(),
        };

        let result = self.complete_with_retry(new, &span).instrument(span.clone()).await;

        let outcome = match &result {
            Ok(recorded) => {
                info!(
                    parent: &span,
                    transcription = %recorded.transcription.id,
                    participant = %participant,
                    "transcription recorded"
                );
                "ok"
            }
            Err(Error::QuotaExceeded { .. }) => {
                info!(parent: &span, participant = %participant, "work item reached quota first");
                "quota_exceeded"
            }
            Err(Error::NotFound(what)) => {
                warn!(parent: &span, %what, "completion target missing");
                "not_found"
            }
            Err(e) => {
                warn!(parent: &span, error = %e, "failed to record transcription");
                "error"
            }
        };
        record_outcome(&span, outcome);
        metrics::transcriptions_recorded().add(
            1,
            &[
                KeyValue::new("language", language.to_string()),
                KeyValue::new("result", outcome),
            ],
        );
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "transcription.record")],
        );

        result
    }

    /// Same as [`Recorder::record_transcription`] in the configured default language.
    pub async fn record_for_default_language(
        &self,
        participant: ParticipantId,
        work_item: WorkItemId,
        text: &str,
    ) -> Result<Recorded> {
        let language = self.settings.default_language.clone();
        self.record_transcription(participant, work_item, &language, text)
            .await
    }

    async fn complete_with_retry(
        &self,
        new: NewTranscription,
        span: &tracing::Span,
    ) -> Result<Recorded> {
        let quota = self.settings.quota_per_response;
        let max_attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            record_attempts(span, attempt);

            let err = match self.store.complete(new.clone(), quota).await {
                Ok(CompletionOutcome::Recorded(recorded)) => return Ok(recorded),
                Ok(CompletionOutcome::AlreadyRecorded(recorded)) => {
                    info!(
                        attempt,
                        transcription = %recorded.transcription.id,
                        "completion was already recorded"
                    );
                    return Ok(recorded);
                }
                Ok(CompletionOutcome::QuotaExceeded { .. }) => {
                    return Err(Error::QuotaExceeded {
                        work_item: new.work_item_id.to_string(),
                        language: new.language.to_string(),
                        quota,
                    });
                }
                Ok(CompletionOutcome::NotFound(what)) => return Err(Error::NotFound(what)),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max_attempts {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying completion"
            );
            metrics::store_retries().add(1, &[]);
            tokio::time::sleep(delay).await;
        }
    }
}
