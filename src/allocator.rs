//! Prompt allocation: pick an unseen, under-quota work item at random.
//!
//! The result is only a hint. Another participant may use up the item's
//! last slot before this one submits; the recorder re-checks the quota
//! inside its transaction.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use rand::Rng;
use tracing::{Instrument, debug, info, warn};

use crate::config::AllocatorSettings;
use crate::error::Result;
use crate::model::*;
use crate::store::{Eligibility, Store};
use crate::telemetry::metrics;
use crate::telemetry::spans::{record_outcome, start_allocation_span};

/// Hands out prompts. Cheap to clone; clones share the store.
pub struct Allocator<S> {
    store: Arc<S>,
    settings: AllocatorSettings,
}

impl<S> Clone for Allocator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S: Store> Allocator<S> {
    pub fn new(store: Arc<S>, settings: AllocatorSettings) -> Self {
        Self { store, settings }
    }

    /// Choose the next prompt for `participant` in `language`.
    ///
    /// Every work item the participant has not transcribed and whose
    /// count for `language` is under quota is equally likely.
    pub async fn next_prompt(
        &self,
        participant: &Participant,
        language: &Language,
    ) -> Result<Allocation> {
        let span = start_allocation_span(language, participant.id);
        let started = Instant::now();

        let result = self
            .select(&participant.transcribed, language)
            .instrument(span.clone())
            .await
            .map(|chosen| match chosen {
                Some(item) => Allocation::Assigned(Prompt {
                    kind: PromptKind::Audio,
                    content: item.storage_link,
                    work_item_id: item.id,
                    position: participant.position(),
                }),
                None => Allocation::Exhausted,
            });

        let outcome = match &result {
            Ok(Allocation::Assigned(prompt)) => {
                info!(
                    parent: &span,
                    work_item = %prompt.work_item_id,
                    position = prompt.position,
                    "prompt assigned"
                );
                "assigned"
            }
            Ok(Allocation::Exhausted) => {
                info!(parent: &span, seen = participant.transcribed.len(), "no eligible prompts");
                "exhausted"
            }
            Err(e) => {
                warn!(parent: &span, error = %e, "prompt allocation failed");
                "error"
            }
        };
        record_outcome(&span, outcome);
        metrics::prompts_allocated().add(
            1,
            &[
                KeyValue::new("language", language.to_string()),
                KeyValue::new("result", outcome),
            ],
        );
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "prompt.allocate")],
        );

        result
    }

    /// Same as [`Allocator::next_prompt`] in the configured default language.
    pub async fn next_prompt_default(&self, participant: &Participant) -> Result<Allocation> {
        let language = self.settings.default_language.clone();
        self.next_prompt(participant, &language).await
    }

    /// Load the participant from the store first, so the exclusion set is
    /// the committed one rather than a cached copy.
    pub async fn next_prompt_for(
        &self,
        participant: ParticipantId,
        language: &Language,
    ) -> Result<Allocation> {
        let participant = self.store.get_participant(participant).await?;
        self.next_prompt(&participant, language).await
    }

    /// Scan the eligible set page by page, sampling one item uniformly.
    async fn select(
        &self,
        history: &BTreeSet<WorkItemId>,
        language: &Language,
    ) -> Result<Option<WorkItem>> {
        let quota = self.settings.quota_per_response;
        let page_size = self.settings.page_size.max(1);

        let push_down = self
            .store
            .exclusion_limit()
            .is_none_or(|max| history.len() <= max);
        if !push_down {
            debug!(
                history = history.len(),
                "exclusion list exceeds store limit, filtering client side"
            );
        }

        let query = Eligibility {
            language: language.clone(),
            quota,
            exclude: if push_down {
                history.iter().copied().collect()
            } else {
                Vec::new()
            },
        };

        let mut sampler = Reservoir::default();
        let mut after = None;
        loop {
            let page = self.store.eligible_page(&query, after, page_size).await?;
            let last_page = page.len() < page_size;
            after = page.last().map(|item| item.id);
            sampler.offer(
                page.into_iter()
                    .filter(|item| item.is_eligible_for(language, quota, history)),
            );
            if last_page {
                break;
            }
        }

        debug!(eligible = sampler.seen, "eligible set scanned");
        Ok(sampler.chosen)
    }
}

/// Single-slot reservoir sample over a stream of unknown length.
#[derive(Default)]
struct Reservoir {
    seen: usize,
    chosen: Option<WorkItem>,
}

impl Reservoir {
    fn offer(&mut self, items: impl IntoIterator<Item = WorkItem>) {
        let mut rng = rand::thread_rng();
        for item in items {
            self.seen += 1;
            if rng.gen_range(0..self.seen) == 0 {
                self.chosen = Some(item);
            }
        }
    }
}
