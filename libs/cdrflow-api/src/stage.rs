use std::future::Future;
use std::hint::black_box;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StageError;
use crate::rate_zone::{RateZoneKey, RateZoneTable, RATE_ZONE_KEYS, receiver_key};
use crate::record::{CallRecord, Direction};

/// Number of stages in every [`StageSet`].
pub const STAGE_COUNT: usize = 6;

/// Stage names in hash-first order. Per-stage settings such as pipeline
/// widths are indexed by this list, whatever the configured [`StageOrder`].
pub const STAGE_NAMES: [&str; STAGE_COUNT] =
    ["duration", "direction", "rate-zone", "anonymized-id", "home-operator", "risk-score"];

/// Slot of `name` in [`STAGE_NAMES`].
pub fn stage_slot(name: &str) -> Option<usize> {
    STAGE_NAMES.iter().position(|n| *n == name)
}

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Declared cost profile of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostClass {
    Cpu,
    BlockingIo,
    MemoryScan,
}

/// Одна стадия обогащения.
///
/// Implementations write only their own derived field and may be invoked
/// concurrently on different records. Any latency is a bounded sleep.
pub trait Enricher: Send + Sync {
    fn name(&self) -> &'static str;

    fn cost(&self) -> CostClass;

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a>;
}

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

/// Relative order of the anonymized-id and home-operator stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageOrder {
    #[default]
    HashFirst,
    OperatorFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub order: StageOrder,
    pub direction_latency_ms: u64,
    pub home_operator_latency_ms: u64,
    pub risk_min_ms: u64,
    pub risk_max_ms: u64,
    pub domestic_prefix: String,
    pub home_operator: String,
    pub rate_zone_key: RateZoneKey,
    pub rate_zone_keys: usize,
    pub rate_zone_scratch_bytes: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            order: StageOrder::HashFirst,
            direction_latency_ms: 40,
            home_operator_latency_ms: 200,
            risk_min_ms: 20,
            risk_max_ms: 119,
            domestic_prefix: "44".to_string(),
            home_operator: "Vodafone-UK".to_string(),
            rate_zone_key: RateZoneKey::Random,
            rate_zone_keys: RATE_ZONE_KEYS,
            rate_zone_scratch_bytes: 50 * 1024,
        }
    }
}

impl StageConfig {
    /// All simulated latencies set to zero.
    pub fn instant() -> Self {
        Self {
            direction_latency_ms: 0,
            home_operator_latency_ms: 0,
            risk_min_ms: 0,
            risk_max_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StageError> {
        if self.risk_min_ms > self.risk_max_ms {
            return Err(StageError::invalid(
                "risk_min_ms",
                format!("{} is greater than risk_max_ms {}", self.risk_min_ms, self.risk_max_ms),
            ));
        }
        if self.rate_zone_keys == 0 {
            return Err(StageError::invalid("rate_zone_keys", "must be at least 1"));
        }
        if self.domestic_prefix.is_empty() {
            return Err(StageError::invalid("domestic_prefix", "must not be empty"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Stages
// ═══════════════════════════════════════════════════════════════

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

pub struct CalculateDuration;

impl Enricher for CalculateDuration {
    fn name(&self) -> &'static str {
        "duration"
    }

    fn cost(&self) -> CostClass {
        CostClass::Cpu
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let delta = record.end_time - record.start_time;
            record.duration_sec = Some(delta.num_milliseconds() as f64 / 1000.0);
        })
    }
}

pub struct SetCallDirection {
    pub latency: Duration,
    pub domestic_prefix: String,
}

impl Enricher for SetCallDirection {
    fn name(&self) -> &'static str {
        "direction"
    }

    fn cost(&self) -> CostClass {
        CostClass::BlockingIo
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        Box::pin(async move {
            simulate_latency(self.latency).await;
            record.direction = Some(Direction::classify(&record.caller_number, &self.domestic_prefix));
        })
    }
}

pub struct LookupRateZone {
    pub table: Arc<RateZoneTable>,
    pub key: RateZoneKey,
    pub scratch_bytes: usize,
}

impl LookupRateZone {
    fn touch_scratch(&self) {
        if self.scratch_bytes == 0 {
            return;
        }
        let mut payload = vec![0u8; self.scratch_bytes];
        for k in (0..payload.len()).step_by(1024) {
            payload[k] = 1;
        }
        black_box(&payload);
    }
}

impl Enricher for LookupRateZone {
    fn name(&self) -> &'static str {
        "rate-zone"
    }

    fn cost(&self) -> CostClass {
        CostClass::MemoryScan
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        let key = match self.key {
            RateZoneKey::Random => {
                let upper = self.table.len().max(1);
                RateZoneTable::key_for(rand::rng().random_range(0..upper))
            }
            RateZoneKey::Receiver => receiver_key(record),
        };
        Box::pin(async move {
            self.touch_scratch();
            record.rate_zone = Some(self.table.lookup(&key).to_string());
        })
    }
}

pub struct HashAnonymizedId;

impl HashAnonymizedId {
    /// Hex SHA-256 over caller ‖ receiver ‖ call id.
    pub fn digest(caller_number: &str, receiver_number: &str, call_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(caller_number.as_bytes());
        hasher.update(receiver_number.as_bytes());
        hasher.update(call_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Enricher for HashAnonymizedId {
    fn name(&self) -> &'static str {
        "anonymized-id"
    }

    fn cost(&self) -> CostClass {
        CostClass::Cpu
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let digest = Self::digest(&record.caller_number, &record.receiver_number, &record.call_id);
            record.anonymized_id = Some(digest);
        })
    }
}

pub struct FetchHomeOperator {
    pub latency: Duration,
    pub operator: String,
}

impl Enricher for FetchHomeOperator {
    fn name(&self) -> &'static str {
        "home-operator"
    }

    fn cost(&self) -> CostClass {
        CostClass::BlockingIo
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        Box::pin(async move {
            simulate_latency(self.latency).await;
            record.home_operator = Some(self.operator.clone());
        })
    }
}

pub struct CheckRiskScore {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl Enricher for CheckRiskScore {
    fn name(&self) -> &'static str {
        "risk-score"
    }

    fn cost(&self) -> CostClass {
        CostClass::BlockingIo
    }

    fn apply<'a>(&'a self, record: &'a mut CallRecord) -> StageFuture<'a> {
        let (latency_ms, score) = {
            let mut rng = rand::rng();
            (
                rng.random_range(self.min_latency_ms..=self.max_latency_ms),
                rng.random_range(0..100u8),
            )
        };
        Box::pin(async move {
            simulate_latency(Duration::from_millis(latency_ms)).await;
            record.risk_score = Some(score);
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  StageSet
// ═══════════════════════════════════════════════════════════════

/// The six enrichment stages in application order.
#[derive(Clone)]
pub struct StageSet {
    stages: Vec<Arc<dyn Enricher>>,
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl StageSet {
    pub fn build(config: &StageConfig, table: Arc<RateZoneTable>) -> Result<Self, StageError> {
        config.validate()?;

        let hash: Arc<dyn Enricher> = Arc::new(HashAnonymizedId);
        let operator: Arc<dyn Enricher> = Arc::new(FetchHomeOperator {
            latency: Duration::from_millis(config.home_operator_latency_ms),
            operator: config.home_operator.clone(),
        });
        let (fourth, fifth) = match config.order {
            StageOrder::HashFirst => (hash, operator),
            StageOrder::OperatorFirst => (operator, hash),
        };

        let stages: Vec<Arc<dyn Enricher>> = vec![
            Arc::new(CalculateDuration),
            Arc::new(SetCallDirection {
                latency: Duration::from_millis(config.direction_latency_ms),
                domestic_prefix: config.domestic_prefix.clone(),
            }),
            Arc::new(LookupRateZone {
                table,
                key: config.rate_zone_key,
                scratch_bytes: config.rate_zone_scratch_bytes,
            }),
            fourth,
            fifth,
            Arc::new(CheckRiskScore {
                min_latency_ms: config.risk_min_ms,
                max_latency_ms: config.risk_max_ms,
            }),
        ];

        tracing::debug!(stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(), "built stage set");
        Ok(Self { stages })
    }

    /// A stage set from arbitrary enrichers, applied in the given order.
    pub fn from_stages(stages: Vec<Arc<dyn Enricher>>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Arc<dyn Enricher>] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Apply every stage to `record`, one after another.
    pub async fn apply_all(&self, record: &mut CallRecord) {
        for stage in &self.stages {
            stage.apply(record).await;
        }
    }
}
