//! Record model and enrichment stages shared by every cdrflow topology.
//!
//! The types in this crate are the collaborators a topology consumes: a lazy
//! [`RecordGenerator`], a read-only [`RateZoneTable`] and an ordered
//! [`StageSet`] of [`Enricher`] implementations.

pub mod error;
pub mod generator;
pub mod rate_zone;
pub mod record;
pub mod stage;

pub use error::StageError;
pub use generator::RecordGenerator;
pub use rate_zone::{RateZoneKey, RateZoneTable};
pub use record::{CallRecord, Direction, Identity};
pub use stage::{
    CostClass, Enricher, STAGE_COUNT, STAGE_NAMES, StageConfig, StageFuture, StageOrder, StageSet, stage_slot,
};
