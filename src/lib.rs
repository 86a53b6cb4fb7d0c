//! # transcribeq
//!
//! Assigns audio responses to crowd transcribers and records their work,
//! never letting a response collect more than the configured number of
//! transcriptions per language.
//!
//! The [`allocator::Allocator`] picks a random unseen, under-quota response.
//! The [`recorder::Recorder`] records a finished transcription in a single
//! store transaction that re-checks the quota. Postgres ([`db::Db`]) and an
//! in-process store ([`store::memory::MemoryStore`]) are provided.

pub mod allocator;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod recorder;
pub mod retry;
pub mod store;
pub mod telemetry;
