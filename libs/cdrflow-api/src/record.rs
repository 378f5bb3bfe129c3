use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Direction
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    /// Callers whose number starts with `domestic_prefix` are outgoing.
    pub fn classify(caller_number: &str, domestic_prefix: &str) -> Self {
        if caller_number.starts_with(domestic_prefix) {
            Direction::Outgoing
        } else {
            Direction::Incoming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "OUTGOING",
            Direction::Incoming => "INCOMING",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
//  CallRecord
// ═══════════════════════════════════════════════════════════════

/// A call-detail record flowing through a topology.
///
/// Identity fields are populated by the generator and never written again.
/// Every derived field starts as `None` and is written by exactly one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub caller_number: String,
    pub receiver_number: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    pub duration_sec: Option<f64>,
    pub direction: Option<Direction>,
    pub rate_zone: Option<String>,
    pub anonymized_id: Option<String>,
    pub home_operator: Option<String>,
    pub risk_score: Option<u8>,
}

impl CallRecord {
    pub fn new(
        call_id: String,
        caller_number: String,
        receiver_number: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id,
            caller_number,
            receiver_number,
            start_time,
            end_time,
            duration_sec: None,
            direction: None,
            rate_zone: None,
            anonymized_id: None,
            home_operator: None,
            risk_score: None,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            call_id: self.call_id.clone(),
            caller_number: self.caller_number.clone(),
            receiver_number: self.receiver_number.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Names of derived fields that are still unset.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.duration_sec.is_none() {
            missing.push("duration_sec");
        }
        if self.direction.is_none() {
            missing.push("direction");
        }
        if self.rate_zone.is_none() {
            missing.push("rate_zone");
        }
        if self.anonymized_id.is_none() {
            missing.push("anonymized_id");
        }
        if self.home_operator.is_none() {
            missing.push("home_operator");
        }
        if self.risk_score.is_none() {
            missing.push("risk_score");
        }
        missing
    }

    pub fn is_enriched(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Snapshot of the immutable identity fields of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub call_id: String,
    pub caller_number: String,
    pub receiver_number: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CallRecord {
        let start = Utc::now();
        CallRecord::new(
            "UUID-7".into(),
            "447000000001".into(),
            "491000000002".into(),
            start,
            start + chrono::TimeDelta::seconds(30),
        )
    }

    #[test]
    fn test_new_record_has_no_derived_fields() {
        let record = sample();
        assert_eq!(record.missing_fields().len(), 6);
        assert!(!record.is_enriched());
    }

    #[test]
    fn test_identity_ignores_derived_fields() {
        let mut record = sample();
        let before = record.identity();
        record.risk_score = Some(42);
        record.direction = Some(Direction::Outgoing);
        assert_eq!(before, record.identity());
    }

    #[test]
    fn test_classify_direction() {
        assert_eq!(Direction::classify("447123", "44"), Direction::Outgoing);
        assert_eq!(Direction::classify("491123", "44"), Direction::Incoming);
        assert_eq!(Direction::classify("", "44"), Direction::Incoming);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Incoming.to_string(), "INCOMING");
        assert_eq!(Direction::Outgoing.to_string(), "OUTGOING");
    }
}
