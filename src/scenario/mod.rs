//! Scenario-scoped state passed into activity operations.
//!
//! A scenario is the planning workspace that owns jobs, operations and their
//! activities. The host holds its exclusive lock while calling into this
//! crate, so everything here assumes a single writer.
//!
//! # Usage
//!
//! ```
//! use u_activity::models::{OperationContext, OperationRef, Timestamp};
//! use u_activity::scenario::{ActivityContext, ScenarioOptions};
//!
//! let op = OperationContext::new(OperationRef::new(1, 10));
//! let options = ScenarioOptions::default();
//! let ctx = ActivityContext::new(&op, &options, Timestamp::from_ticks(1_000));
//! assert_eq!(ctx.job_id(), op.job_id);
//! ```

mod changes;
mod effects;
mod options;

pub use changes::{ChangeCategory, DataChanges};
pub use effects::{ActivityEffect, ActivityEffects, HistoryKind, HistoryNote, UnscheduleReason};
pub use options::{ManualUpdateOverride, ScenarioOptions};

use crate::models::{JobId, OperationContext, Timestamp};

/// Read-only scenario state for one call.
#[derive(Debug, Clone, Copy)]
pub struct ActivityContext<'a> {
    /// The owning operation.
    pub operation: &'a OperationContext,
    /// Scenario options.
    pub options: &'a ScenarioOptions,
    /// Scenario clock ("now").
    pub clock: Timestamp,
    /// Cache epoch; bumped on simulation reinitialization and need-date changes.
    pub cache_epoch: u64,
}

impl<'a> ActivityContext<'a> {
    /// Creates a context at `clock` with epoch 0.
    pub fn new(
        operation: &'a OperationContext,
        options: &'a ScenarioOptions,
        clock: Timestamp,
    ) -> Self {
        Self {
            operation,
            options,
            clock,
            cache_epoch: 0,
        }
    }

    /// Sets the cache epoch.
    pub fn with_cache_epoch(mut self, epoch: u64) -> Self {
        self.cache_epoch = epoch;
        self
    }

    /// Owning job.
    pub fn job_id(&self) -> JobId {
        self.operation.job_id
    }
}
