//! Rolling window over a user's records: keep only the most recent N.

use crate::records::LogRecord;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordWindow {
    max_records: Option<NonZeroUsize>,
}

impl RecordWindow {
    pub fn new(max_records: Option<NonZeroUsize>) -> Self {
        Self { max_records }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keep the `max_records` most recent records by `logged_at`. Records without a
    /// timestamp rank as oldest; ties go to the later retrieval position. The kept
    /// records stay in retrieval order, so "first record" semantics are unchanged
    /// among them.
    pub fn apply(&self, records: Vec<LogRecord>) -> Vec<LogRecord> {
        let Some(max) = self.max_records else {
            return records;
        };
        let max = max.get();
        if records.len() <= max {
            return records;
        }

        let mut ranked: Vec<usize> = (0..records.len()).collect();
        ranked.sort_by(|&a, &b| {
            records[b]
                .logged_at
                .cmp(&records[a].logged_at)
                .then(b.cmp(&a))
        });
        let mut keep = vec![false; records.len()];
        for &i in ranked.iter().take(max) {
            keep[i] = true;
        }
        records
            .into_iter()
            .zip(keep)
            .filter_map(|(r, k)| k.then_some(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(day: u32, v: i64) -> LogRecord {
        LogRecord::new()
            .with("v", v)
            .logged_at(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap())
    }

    fn values(records: &[LogRecord]) -> Vec<i64> {
        records.iter().map(|r| r.get("v").and_then(|v| v.as_i64()).unwrap()).collect()
    }

    #[test]
    fn unbounded_keeps_everything() {
        let records = vec![at(1, 1), at(2, 2)];
        assert_eq!(RecordWindow::unbounded().apply(records.clone()), records);
    }

    #[test]
    fn keeps_most_recent_in_retrieval_order() {
        let records = vec![at(5, 5), at(1, 1), at(9, 9), at(3, 3)];
        let w = RecordWindow::new(NonZeroUsize::new(2));
        assert_eq!(values(&w.apply(records)), vec![5, 9]);
    }

    #[test]
    fn untimestamped_records_rank_oldest() {
        let records = vec![
            LogRecord::new().with("v", 0),
            at(2, 2),
            LogRecord::new().with("v", 7),
        ];
        let w = RecordWindow::new(NonZeroUsize::new(2));
        assert_eq!(values(&w.apply(records)), vec![2, 7]);
    }
}
