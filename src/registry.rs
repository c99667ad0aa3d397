use crate::gh::PrRequest;
use crate::timer::TimerHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One scheduled pull-request request awaiting its fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPr {
    pub id: u64,
    /// Origin repository, "org/repo".
    pub repo: String,
    /// Source branch reference, "forkOwner:branch".
    pub head: String,
    /// Target branch on the origin repository.
    pub base: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub local_path: PathBuf,
    pub scheduled_at: DateTime<Utc>,
    /// Live timer token. Never persisted; re-armed on load.
    #[serde(skip)]
    pub timer: Option<TimerHandle>,
}

impl PendingPr {
    pub fn request(&self) -> PrRequest {
        PrRequest {
            local_path: self.local_path.clone(),
            repo: self.repo.clone(),
            head: self.head.clone(),
            base: self.base.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }

    /// A record is missed when its time has passed without a live timer,
    /// which only happens for entries loaded after a restart.
    pub fn is_missed(&self, now: DateTime<Utc>) -> bool {
        self.timer.is_none() && self.scheduled_at <= now
    }
}

fn first_id() -> u64 {
    1
}

/// In-memory map of id -> pending record plus the monotonic id counter.
///
/// Ids are never reused, even after deletion, so ascending-id iteration
/// is also insertion order. Only ever touched from the event-loop
/// thread; no locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pending: BTreeMap<u64, PendingPr>,
    #[serde(default = "first_id")]
    next_id: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: first_id(),
        }
    }
}

impl Registry {
    /// Issues a fresh identifier, strictly greater than all previous ones.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, record: PendingPr) {
        self.pending.insert(record.id, record);
    }

    pub fn remove(&mut self, id: u64) -> Option<PendingPr> {
        self.pending.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&PendingPr> {
        self.pending.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingPr> {
        self.pending.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PendingPr> {
        self.pending.values_mut()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> PendingPr {
        PendingPr {
            id,
            repo: "org/repo".to_string(),
            head: "me:feature".to_string(),
            base: "main".to_string(),
            title: format!("PR {id}"),
            body: String::new(),
            local_path: PathBuf::from("/tmp/repo"),
            scheduled_at: Utc::now(),
            timer: None,
        }
    }

    #[test]
    fn ids_are_unique_and_strictly_increasing() {
        let mut registry = Registry::default();
        let ids: Vec<u64> = (0..5).map(|_| registry.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = Registry::default();
        let id = registry.next_id();
        registry.insert(record(id));
        registry.remove(id);
        assert_eq!(registry.next_id(), id + 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut registry = Registry::default();
        for _ in 0..3 {
            let id = registry.next_id();
            registry.insert(record(id));
        }
        let order: Vec<u64> = registry.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn remove_returns_the_record_once() {
        let mut registry = Registry::default();
        let id = registry.next_id();
        registry.insert(record(id));
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }
}
