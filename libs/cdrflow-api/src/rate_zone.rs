use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::CallRecord;

pub const RATE_ZONE_KEYS: usize = 100_000;
pub const ZONE_VALUE: &str = "EU-Zone-1";
pub const FALLBACK_ZONE: &str = "GLOBAL-DEFAULT";

/// Where the rate-zone stage takes its lookup key from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateZoneKey {
    /// Uniform random index into the table. Always a hit.
    #[default]
    Random,
    /// Index taken from the receiver number digits after the country code.
    Receiver,
}

/// Prefix → zone map. Built once per run, read-only afterwards.
#[derive(Debug)]
pub struct RateZoneTable {
    zones: HashMap<String, String>,
}

impl RateZoneTable {
    pub fn build(keys: usize) -> Self {
        let mut zones = HashMap::with_capacity(keys);
        for i in 0..keys {
            zones.insert(Self::key_for(i), ZONE_VALUE.to_string());
        }
        Self { zones }
    }

    pub fn standard() -> Self {
        Self::build(RATE_ZONE_KEYS)
    }

    pub fn key_for(index: usize) -> String {
        format!("PREFIX-{index}")
    }

    /// Zone for `key`, or [`FALLBACK_ZONE`] on a miss.
    pub fn lookup(&self, key: &str) -> &str {
        self.zones.get(key).map(String::as_str).unwrap_or(FALLBACK_ZONE)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Key derived from the record: five digits after the 3-digit country/mobile prefix.
pub fn receiver_key(record: &CallRecord) -> String {
    let digits = record.receiver_number.get(3..8).unwrap_or("");
    match digits.parse::<usize>() {
        Ok(index) => RateZoneTable::key_for(index),
        Err(_) => format!("PREFIX-{}", record.receiver_number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_standard_table_size() {
        let table = RateZoneTable::standard();
        assert_eq!(table.len(), RATE_ZONE_KEYS);
        assert_eq!(table.lookup("PREFIX-0"), ZONE_VALUE);
        assert_eq!(table.lookup("PREFIX-99999"), ZONE_VALUE);
    }

    #[test]
    fn test_miss_falls_back() {
        let table = RateZoneTable::build(10);
        assert_eq!(table.lookup("PREFIX-10"), FALLBACK_ZONE);
        assert_eq!(table.lookup("nope"), FALLBACK_ZONE);
    }

    #[test]
    fn test_receiver_key() {
        let now = Utc::now();
        let mut record = CallRecord::new("UUID-1".into(), "44".into(), "491004560000".into(), now, now);
        assert_eq!(receiver_key(&record), "PREFIX-456");

        record.receiver_number = "49abcdef".into();
        let table = RateZoneTable::standard();
        assert_eq!(table.lookup(&receiver_key(&record)), FALLBACK_ZONE);
    }
}
