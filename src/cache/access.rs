//! Access Log Module
//!
//! Per-key read bookkeeping, kept apart from the entries so that it also
//! covers keys that missed. Records idle longer than a cutoff are pruned.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub reads: u64,
    pub last_seen: u64,
}

#[derive(Debug, Default)]
pub struct AccessLog {
    records: HashMap<String, AccessRecord>,
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, now: u64) {
        match self.records.get_mut(key) {
            Some(record) => {
                record.reads += 1;
                record.last_seen = now;
            }
            None => {
                self.records.insert(
                    key.to_string(),
                    AccessRecord {
                        reads: 1,
                        last_seen: now,
                    },
                );
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&AccessRecord> {
        self.records.get(key)
    }

    /// Drops records not seen since `cutoff`. Returns how many were dropped.
    pub fn prune_older_than(&mut self, cutoff: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.last_seen >= cutoff);
        before - self.records.len()
    }

    /// Up to `limit` keys with the most reads, most read first.
    pub fn hottest(&self, limit: usize) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .records
            .iter()
            .map(|(key, record)| (key.clone(), record.reads))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_reads() {
        let mut log = AccessLog::new();
        log.record("a", 1);
        log.record("a", 5);

        let record = log.get("a").unwrap();
        assert_eq!(record.reads, 2);
        assert_eq!(record.last_seen, 5);
    }

    #[test]
    fn test_prune_older_than() {
        let mut log = AccessLog::new();
        log.record("stale", 10);
        log.record("fresh", 100);

        assert_eq!(log.prune_older_than(50), 1);
        assert!(log.get("stale").is_none());
        assert!(log.get("fresh").is_some());
    }

    #[test]
    fn test_hottest() {
        let mut log = AccessLog::new();
        for _ in 0..3 {
            log.record("b", 1);
        }
        log.record("a", 1);
        log.record("c", 1);

        assert_eq!(
            log.hottest(2),
            vec![("b".to_string(), 3), ("a".to_string(), 1)]
        );
    }
}
