//! Generic in-process append-only log (§3 `Event`, §5 ordering guarantees).
//!
//! Engine crates wrap this in their own `EventLog` trait implementation
//! parameterized on their own event type; this just provides the
//! total-ordering-by-persist-time storage and since-cursor query shared by
//! both the workflow run's event feed and (if needed) a builder audit feed.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

pub struct AppendLog<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for AppendLog<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone + Timestamped> AppendLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append is synchronous and totally ordered: the caller holds the
    /// write lock for the duration, so two concurrent appends are
    /// serialized in call order, matching §5's "events ... written before
    /// they are broadcast" guarantee.
    pub fn append(&self, item: T) {
        self.items.write().expect("append_log poisoned").push(item);
    }

    pub fn all(&self) -> Vec<T> {
        self.items.read().expect("append_log poisoned").clone()
    }

    pub fn since(&self, since: Option<DateTime<Utc>>) -> Vec<T> {
        let items = self.items.read().expect("append_log poisoned");
        match since {
            Some(cutoff) => items
                .iter()
                .filter(|i| i.timestamp() > cutoff)
                .cloned()
                .collect(),
            None => items.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Tick(DateTime<Utc>);
    impl Timestamped for Tick {
        fn timestamp(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn since_filters_strictly_after_cutoff() {
        let log: AppendLog<Tick> = AppendLog::new();
        let t0 = Utc::now();
        log.append(Tick(t0));
        let t1 = t0 + chrono::Duration::seconds(1);
        log.append(Tick(t1));
        let since = log.since(Some(t0));
        assert_eq!(since.len(), 1);
    }

    #[test]
    fn since_none_returns_all() {
        let log: AppendLog<Tick> = AppendLog::new();
        log.append(Tick(Utc::now()));
        log.append(Tick(Utc::now()));
        assert_eq!(log.since(None).len(), 2);
    }
}
