//! # lumen-core
//!
//! Core types, traits, and the metadata reconciliation engine for lumen.
//!
//! Media records collect metadata from several partially trusted sources
//! (embedded file metadata, geocoding, image classification, user edits).
//! This crate decides which values win, derives titles, year/month, keyword
//! and label associations, and defines the store traits that persistence
//! crates implement.
//!
//! ## Logging
//!
//! Events carry `subsystem` (`"engine"`, `"database"`, `"events"`),
//! `component` (`"reconciler"`, `"title"`, `"keywords"`, `"labels"`,
//! `"records"`, `"pool"`) and, where relevant, `op`, `record_id`,
//! `keyword_count`, `label_count` and `duration_ms`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | WARN  | Soft inconsistency skipped, failed cycle rolled back |
//! | INFO  | Cycle completion, title changes, permanent deletes |
//! | DEBUG | Rejected candidates, decision points |
//! | TRACE | Per-keyword iteration |

pub mod classify;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod events;
pub mod folder;
pub mod keywords;
pub mod labels;
pub mod location;
pub mod memory;
pub mod models;
pub mod provenance;
pub mod reconcile;
pub mod text;
pub mod title;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use classify::{rank_labels, ClassifierLabel};
pub use config::ReconcileConfig;
pub use engine::{AcceptedFields, CandidateUpdate, CycleReport, DetailsUpdate, Reconciler, Sourced};
pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, ServerEvent};
pub use folder::{Folder, Root};
pub use keywords::IndexReport;
pub use labels::{LabelAssociator, MergeReport};
pub use location::ResolvedLocation;
pub use memory::InMemoryStore;
pub use models::*;
pub use provenance::Source;
pub use reconcile::{try_update, CaptureCandidate, FieldRule, Reconciled};
pub use title::{TitleOutcome, TitleSynthesizer};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
