//! status.rs — snapshots published by the monitor after each cycle, read by
//! the HTTP status surface. The monitor keeps exclusive ownership of the live
//! state; readers only ever see copies.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::antiflutter::GateState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStatus {
    pub topic: String,
    pub ratio: f64,
    pub positive_count: usize,
    pub sample_size: usize,
    pub should_consider_alert: bool,
    pub state: GateState,
    pub last_alert_ratio: Option<f64>,
    pub last_alert_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub last_cycle: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub topics: Vec<TopicStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snap: StatusSnapshot) {
        match self.inner.write() {
            Ok(mut g) => *g = snap,
            Err(e) => tracing::warn!("status board lock poisoned: {e}"),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}
