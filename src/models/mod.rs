//! Activity-level domain models.
//!
//! An activity is the schedulable unit of production: one operation's share
//! of a job, with its own quantities, status, progress and buffer dates.
//! These types carry no scheduling algorithm. They hold the state the
//! scheduler reads and the reconciliation engine writes.
//!
//! # Domain Mappings
//!
//! | u-activity | Manufacturing | Healthcare | Logistics |
//! |------------|--------------|------------|-----------|
//! | Job | Work Order | Patient Case | Shipment |
//! | Operation | Routing Step | Procedure | Transport Leg |
//! | Activity | Production Run | Session | Load |
//! | Batch | Machine Slot | OR Slot | Truck Trip |
//! | Resource | Machine/Worker | Room/Doctor | Truck/Driver |
//!
//! # Time
//!
//! Dates are [`Timestamp`] tick counts (100 ns since 0001-01-01). The
//! minimum value means "unset".

mod activity;
mod batch;
mod buffer;
mod cache;
mod flags;
mod internal_activity;
mod operation;
mod production_info;
mod production_status;
mod resource;
mod resource_locks;
mod time;

pub use activity::{round_qty, ActivityCost, ActivityId, BaseActivity, TimingStatus};
pub use batch::{Batch, BatchId, ScheduleScope};
pub use buffer::{BufferInfo, EarliestBuffer, ResourceBufferInfo};
pub use cache::CacheCell;
pub use flags::{ActivityFlag, ActivityFlags, Flag, FlagSet};
pub use internal_activity::{
    InternalActivity, PeopleUsage, ProductGroup, ProductionStatusHook, ReportedProgress,
    StatusOrigin,
};
pub use operation::{
    JobId, LatestConstraint, OmitStatus, OperationContext, OperationId, OperationRef,
};
pub use production_info::{
    clamp_percent, InfoValue, Overridable, ProductionInfo, ProductionInfoField,
    ProductionInfoOverride,
};
pub use production_status::{ProductionStatus, Stage, StageUsage, StatusCategory};
pub use resource::{Resource, ResourceKey, ResourceType};
pub use resource_locks::ResourceLocks;
pub use time::{
    TimeSpan, Timestamp, TICKS_PER_DAY, TICKS_PER_HOUR, TICKS_PER_MILLISECOND, TICKS_PER_MINUTE,
    TICKS_PER_SECOND,
};
