//! Core module - statistics engine, specification store and their inputs

pub mod config;
pub mod limits;
pub mod measurement;
pub mod metric;
pub mod pipeline;
pub mod schedule;
pub mod stats;
pub mod store;

pub use config::{Config, ConfigError};
pub use limits::{LimitRow, LimitsError};
pub use measurement::{MeasurementError, MeasurementRow, MeasurementTable, Reading};
pub use metric::{Metric, StatMap};
pub use pipeline::{run_pipeline, PipelineError, PipelineReport};
pub use schedule::{ScheduleError, WeeklySchedule};
pub use stats::{CapabilitySummary, ControlLimits, SpecLimits, StatsError};
pub use store::{SpecRecord, SpecStore, StoreError, SyncFailure, SyncReport};
