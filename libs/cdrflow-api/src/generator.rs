use chrono::{TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::CallRecord;

/// Lazy, finite source of synthetic call records.
///
/// Yields exactly `total` records with call ids `UUID-0 .. UUID-{total-1}`.
/// Only identity fields are populated. The sequence cannot be restarted.
pub struct RecordGenerator {
    next: u64,
    total: u64,
    rng: StdRng,
}

impl RecordGenerator {
    pub fn new(total: u64) -> Self {
        Self {
            next: 0,
            total,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Same as [`RecordGenerator::new`] but with reproducible phone numbers and times
    /// (relative to the moment each record is produced).
    pub fn with_seed(total: u64, seed: u64) -> Self {
        Self {
            next: 0,
            total,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn produced(&self) -> u64 {
        self.next
    }
}

impl Iterator for RecordGenerator {
    type Item = CallRecord;

    fn next(&mut self) -> Option<CallRecord> {
        if self.next >= self.total {
            return None;
        }
        let record = generate_record(self.next, &mut self.rng);
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RecordGenerator {}

/// Build one record: UK mobile caller, German mobile receiver, start within the
/// last hour, duration 1..=600 seconds.
pub fn generate_record<R: Rng + ?Sized>(index: u64, rng: &mut R) -> CallRecord {
    let minutes_ago = rng.random_range(0..60);
    let start_time = Utc::now() - TimeDelta::minutes(minutes_ago);
    let call_secs = rng.random_range(1..=600);
    let end_time = start_time + TimeDelta::seconds(call_secs);

    CallRecord::new(
        format!("UUID-{index}"),
        format!("447{:09}", rng.random_range(0..999_999_999u32)),
        format!("491{:09}", rng.random_range(0..999_999_999u32)),
        start_time,
        end_time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_exact_count() {
        let generator = RecordGenerator::new(25);
        assert_eq!(generator.len(), 25);
        assert_eq!(generator.count(), 25);
    }

    #[test]
    fn test_empty_run() {
        let mut generator = RecordGenerator::new(0);
        assert!(generator.next().is_none());
    }

    #[test]
    fn test_sequential_ids() {
        let ids: Vec<String> = RecordGenerator::new(3).map(|r| r.call_id).collect();
        assert_eq!(ids, vec!["UUID-0", "UUID-1", "UUID-2"]);
    }

    #[test]
    fn test_identity_fields_are_well_formed() {
        for record in RecordGenerator::new(200) {
            let secs = (record.end_time - record.start_time).num_seconds();
            assert!((1..=600).contains(&secs), "duration {secs}");
            assert!(record.start_time <= Utc::now());
            assert!(Utc::now() - record.start_time < TimeDelta::minutes(61));
            assert!(record.caller_number.starts_with("447"));
            assert!(record.receiver_number.starts_with("491"));
            assert_eq!(record.caller_number.len(), 12);
            assert_eq!(record.receiver_number.len(), 12);
            assert!(!record.is_enriched());
        }
    }

    #[test]
    fn test_seeded_numbers_repeat() {
        let a: Vec<String> = RecordGenerator::with_seed(10, 7).map(|r| r.caller_number).collect();
        let b: Vec<String> = RecordGenerator::with_seed(10, 7).map(|r| r.caller_number).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_restartable() {
        let mut generator = RecordGenerator::new(2);
        assert!(generator.next().is_some());
        assert!(generator.next().is_some());
        assert!(generator.next().is_none());
        assert!(generator.next().is_none());
        assert_eq!(generator.produced(), 2);
    }
}
