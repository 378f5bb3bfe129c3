use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use cdrflow_api::{CallRecord, Identity};

use crate::error::BenchError;

#[derive(Default)]
struct Ledger {
    pending: HashMap<String, Identity>,
    seen: HashSet<String>,
}

/// Tracks every injected record and checks each drained one against it.
///
/// A drained record must have been injected, must not have been drained
/// before, must carry the identity it was injected with, and must have all
/// six derived fields set.
#[derive(Default)]
pub struct RecordValidator {
    ledger: Mutex<Ledger>,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a record before it is handed to the topology.
    pub fn register(&self, record: &CallRecord) {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.pending.insert(record.call_id.clone(), record.identity());
    }

    pub fn check(&self, record: &CallRecord) -> Result<(), BenchError> {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        let Some(expected) = ledger.pending.remove(&record.call_id) else {
            return Err(if ledger.seen.contains(&record.call_id) {
                BenchError::Duplicate { call_id: record.call_id.clone() }
            } else {
                BenchError::Unknown { call_id: record.call_id.clone() }
            });
        };
        ledger.seen.insert(record.call_id.clone());

        if expected != record.identity() {
            return Err(BenchError::IdentityMismatch { call_id: record.call_id.clone() });
        }

        let missing = record.missing_fields();
        if !missing.is_empty() {
            return Err(BenchError::Incomplete { call_id: record.call_id.clone(), missing });
        }
        Ok(())
    }

    /// Records injected but not yet drained.
    pub fn outstanding(&self) -> usize {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }
}
