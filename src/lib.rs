// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod sentiment;
pub mod window;
pub mod policy;
pub mod antiflutter;

// Collaborator seams and their adapters
pub mod analyze;
pub mod ingest;
pub mod notify;
pub mod storage;

pub mod config;
pub mod monitor;
pub mod status;
pub mod metrics;
pub mod api;
pub mod bootstrap;
pub mod cli;

// ---- Re-exports for stable public API ----
pub use crate::antiflutter::{AlertEvent, AlertGate, GateState, GateVerdict};
pub use crate::api::router;
pub use crate::ingest::{match_topics, normalize_text};
pub use crate::monitor::{CycleReport, Monitor};
pub use crate::notify::{Delivery, Notification, NotifierMux};
pub use crate::policy::{AggregationPolicy, AggregationResult};
pub use crate::sentiment::{SentimentLabel, SentimentObservation};
pub use crate::window::{IngestOutcome, Ratio, SentimentStore};
