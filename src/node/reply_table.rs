// src/node/reply_table.rs

use std::collections::HashMap;
use std::fmt;

use crate::error::ReplyError;
use crate::utils::current_unix_ts;

/// Outcome handed to a reply callback: `Ok(Some(plaintext))`, `Ok(None)` for a
/// NIL reply, or the error.
pub type ReplyResult = Result<Option<String>, ReplyError>;

pub type ReplyCallback = Box<dyn FnOnce(ReplyResult) + Send + 'static>;

/// A request waiting for its reply. Consumed by `fire`, so the callback runs at most once.
pub struct PendingReply {
    callback: ReplyCallback,
    timeout_secs: u64,
    created_at: u64,
}

impl PendingReply {
    pub fn new<F>(timeout_secs: u64, callback: F) -> Self
    where
        F: FnOnce(ReplyResult) + Send + 'static,
    {
        Self::created_at(timeout_secs, current_unix_ts(), callback)
    }

    pub fn created_at<F>(timeout_secs: u64, created_at: u64, callback: F) -> Self
    where
        F: FnOnce(ReplyResult) + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
            timeout_secs,
            created_at,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) >= self.timeout_secs
    }

    pub fn fire(self, result: ReplyResult) {
        (self.callback)(result)
    }
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("timeout_secs", &self.timeout_secs)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Pending replies keyed by envelope id. Owned by a single event loop; no locking.
#[derive(Debug, Default)]
pub struct ReplyTable {
    records: HashMap<String, PendingReply>,
}

impl ReplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pending` under `id`. An id already present keeps its first record
    /// and the new one is returned to the caller.
    pub fn insert(&mut self, id: String, pending: PendingReply) -> Option<PendingReply> {
        if self.records.contains_key(&id) {
            return Some(pending);
        }
        self.records.insert(id, pending);
        None
    }

    /// Take the record for `id`, if still pending.
    pub fn resolve(&mut self, id: &str) -> Option<PendingReply> {
        self.records.remove(id)
    }

    /// Remove and return every record whose deadline has passed at `now`.
    pub fn expire(&mut self, now: u64) -> Vec<(String, PendingReply)> {
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|(_, p)| p.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.records.remove(&id).map(|p| (id, p)))
            .collect()
    }

    /// Remove everything; used when the owning node stops.
    pub fn drain(&mut self) -> Vec<(String, PendingReply)> {
        self.records.drain().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<ReplyResult>>>, impl Fn() -> ReplyCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let make = move || {
            let s = s.clone();
            Box::new(move |r: ReplyResult| s.lock().push(r)) as ReplyCallback
        };
        (seen, make)
    }

    #[test]
    fn resolve_removes_the_record() {
        let (seen, cb) = recorder();
        let mut table = ReplyTable::new();
        table.insert("a:1".into(), PendingReply::created_at(5, 100, cb()));
        let pending = table.resolve("a:1").unwrap();
        pending.fire(Ok(Some("hi".into())));
        assert!(table.resolve("a:1").is_none());
        assert!(table.is_empty());
        assert_eq!(*seen.lock(), vec![Ok(Some("hi".to_string()))]);
    }

    #[test]
    fn expiry_uses_greater_or_equal() {
        let (_seen, cb) = recorder();
        let mut table = ReplyTable::new();
        table.insert("a:1".into(), PendingReply::created_at(2, 100, cb()));
        table.insert("a:2".into(), PendingReply::created_at(5, 100, cb()));
        assert!(table.expire(101).is_empty());
        let expired = table.expire(102);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, "a:1");
        assert!(table.contains("a:2"));
    }

    #[test]
    fn zero_timeout_expires_on_next_sweep() {
        let (_seen, cb) = recorder();
        let mut table = ReplyTable::new();
        table.insert("z".into(), PendingReply::created_at(0, 50, cb()));
        assert_eq!(table.expire(50).len(), 1);
    }

    #[test]
    fn clock_going_backwards_does_not_expire() {
        let (_seen, cb) = recorder();
        let mut table = ReplyTable::new();
        table.insert("b".into(), PendingReply::created_at(3, 100, cb()));
        assert!(table.expire(90).is_empty());
    }

    #[test]
    fn duplicate_id_keeps_the_first_record() {
        let (seen, cb) = recorder();
        let mut table = ReplyTable::new();
        assert!(table
            .insert("dup".into(), PendingReply::created_at(5, 0, cb()))
            .is_none());
        let rejected = table.insert("dup".into(), PendingReply::created_at(9, 0, cb()));
        assert!(rejected.is_some());
        assert_eq!(table.len(), 1);
        table.resolve("dup").unwrap().fire(Err(ReplyError::Timeout));
        assert_eq!(*seen.lock(), vec![Err(ReplyError::Timeout)]);
    }
}
