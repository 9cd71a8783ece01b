// src/dedup.rs
//! Deduplication store: remembers which news-item ids were already surfaced.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

/// Membership store keyed by opaque ids. Cannot fail.
pub trait DedupStore: Send + Sync {
    fn has_seen(&self, id: &str) -> bool;
    fn mark_seen(&mut self, id: &str);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// When the pipeline records an article id as seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeenPolicy {
    /// Mark right after fetch. A failing sentiment call loses those articles
    /// for good (at-most-once).
    OnFetch,
    /// Mark only once the sentiment call accepted the batch. A failing call
    /// leaves the ids unmarked so the next cycle retries them (at-least-once).
    #[default]
    OnAnalysis,
}

impl FromStr for SeenPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_fetch" | "fetch" => Ok(SeenPolicy::OnFetch),
            "on_analysis" | "analysis" => Ok(SeenPolicy::OnAnalysis),
            other => anyhow::bail!("unknown seen policy: {other}"),
        }
    }
}

/// Unbounded set; grows for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    seen: HashSet<String>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupStore for MemoryDedupStore {
    fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_string());
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Keeps at most `cap` ids; the oldest insertion is evicted first.
///
/// Feeds only ever serve a recent window, so an id old enough to be evicted
/// has long dropped off the feed.
#[derive(Debug)]
pub struct BoundedDedupStore {
    seen: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
}

impl BoundedDedupStore {
    /// `cap == 0` is treated as 1.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            seen: HashSet::with_capacity(cap.min(10_000)),
            order: VecDeque::with_capacity(cap.min(10_000)),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

impl DedupStore for BoundedDedupStore {
    fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn mark_seen(&mut self, id: &str) {
        if self.seen.contains(id) {
            return;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.cap {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Builds the store for a configured capacity (0 = unbounded).
pub fn store_for_capacity(cap: usize) -> Box<dyn DedupStore> {
    if cap == 0 {
        Box::new(MemoryDedupStore::new())
    } else {
        Box::new(BoundedDedupStore::with_capacity(cap))
    }
}
