//! Activity with full production tracking.
//!
//! [`InternalActivity`] adds to [`BaseActivity`] the production-status state
//! machine, reported stage progress, the resource lock table, production info
//! overrides, the DBR/JIT buffer model and the scheduler's batch linkage.
//!
//! # Status transitions
//!
//! Status normally only advances. Moving backwards is allowed but has side
//! effects:
//! - Leaving `Finished` reopens the job: it is unscheduled entirely.
//! - Leaving `Running` or `PostProcessing` for an earlier stage needs
//!   capacity the scheduler already dropped, so the job is unscheduled and
//!   re-placed.
//! - Stage end dates the new status has not reached are cleared.
//!
//! A status whose category is post-production releases the resource; a
//! still-scheduled activity is unscheduled when it gets there.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use super::{
    ActivityCost, ActivityFlag, ActivityId, BaseActivity, Batch, BufferInfo, CacheCell, JobId,
    OperationContext, OperationRef, ProductionInfo, ProductionInfoOverride, ProductionStatus,
    Resource, ResourceBufferInfo, ResourceKey, ResourceLocks, ScheduleScope, Stage,
    StatusCategory, TimeSpan, TimingStatus, Timestamp,
};
use crate::scenario::{ActivityContext, ActivityEffect, ActivityEffects, UnscheduleReason};
use crate::validation::ValidationError;

/// Progress reported against each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedProgress {
    /// Setup time spent.
    pub setup_span: TimeSpan,
    /// Run time spent.
    pub run_span: TimeSpan,
    /// Post-processing time spent.
    pub post_processing_span: TimeSpan,
    /// Storage time spent.
    pub storage_span: TimeSpan,
    /// Clean-out time spent.
    pub clean_span: TimeSpan,
    /// Grade of the clean-out performed.
    pub clean_out_grade: i32,
    /// End of setup / start of processing.
    pub processing_start_date: Timestamp,
    /// End of run.
    pub end_of_run_date: Timestamp,
    /// End of post-processing.
    pub end_of_post_processing_date: Timestamp,
    /// End of storage.
    pub end_of_storage_date: Timestamp,
}

impl ReportedProgress {
    /// Reported time for `stage`.
    pub fn span(&self, stage: Stage) -> TimeSpan {
        match stage {
            Stage::Setup => self.setup_span,
            Stage::Run => self.run_span,
            Stage::PostProcessing => self.post_processing_span,
            Stage::Storage => self.storage_span,
            Stage::Clean => self.clean_span,
        }
    }

    /// Sets the reported time for `stage`. Returns `true` if it changed.
    pub fn set_span(&mut self, stage: Stage, span: TimeSpan) -> bool {
        let slot = match stage {
            Stage::Setup => &mut self.setup_span,
            Stage::Run => &mut self.run_span,
            Stage::PostProcessing => &mut self.post_processing_span,
            Stage::Storage => &mut self.storage_span,
            Stage::Clean => &mut self.clean_span,
        };
        if *slot == span {
            return false;
        }
        *slot = span;
        true
    }

    /// Whether any stage has reported time.
    pub fn any_span_reported(&self) -> bool {
        Stage::ALL.iter().any(|s| self.span(*s).is_positive())
    }
}

/// How many people the activity uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeopleUsage {
    /// Everyone available on the resource.
    #[default]
    UseAllAvailable,
    /// Exactly the specified number.
    UseSpecifiedNumber,
    /// Any multiple of the specified number.
    UseMultipleOfSpecifiedNumber,
}

impl PeopleUsage {
    /// Persisted code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::UseAllAvailable),
            1 => Some(Self::UseSpecifiedNumber),
            2 => Some(Self::UseMultipleOfSpecifiedNumber),
            _ => None,
        }
    }
}

/// Who is changing the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOrigin {
    /// A user or internal process; missing dates default to "now".
    Internal,
    /// A transmission; dates are taken as reported.
    External,
}

/// Optional extension that overrides the read-path production status.
pub trait ProductionStatusHook: Send + Sync + fmt::Debug {
    /// Status to report instead of the stored one, if any.
    fn production_status(&self, activity: &InternalActivity) -> Option<ProductionStatus>;
}

/// Key grouping activities that may be batched together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductGroup {
    /// Primary product.
    pub product: Option<String>,
    /// Effective cycle span.
    pub cycle_span: TimeSpan,
    /// Effective quantity per cycle.
    pub qty_per_cycle: Decimal,
}

/// An activity with full production tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalActivity {
    /// Shared base fields.
    pub base: BaseActivity,
    pub(crate) production_status: ProductionStatus,
    /// Reported stage progress.
    pub reported: ReportedProgress,
    pub(crate) batch: Option<Batch>,
    pub(crate) resource_locks: ResourceLocks,
    /// Production info overrides that apply only on a given resource.
    pub resource_production_info: BTreeMap<ResourceKey, ProductionInfoOverride>,
    /// Production info overrides for this activity.
    pub production_info: ProductionInfoOverride,
    pub(crate) buffer: BufferInfo,
    /// Lot codes generated per product.
    pub generated_lots: BTreeMap<String, String>,
    /// Shared by activities created from the same split.
    pub split_id: Option<u64>,
    pub(crate) people_usage: PeopleUsage,
    pub(crate) nbr_of_people: Decimal,
    /// Free-text comments.
    pub comments: String,
    /// Amount processed per batch.
    pub batch_amount: Decimal,
    pub(crate) actual_resources_used: Vec<ResourceKey>,
    #[serde(skip)]
    product_group_cache: CacheCell<ProductGroup>,
}

impl InternalActivity {
    /// Creates an activity in `Waiting` for `operation`.
    pub fn new(id: ActivityId, operation: OperationRef, required_qty: Decimal) -> Self {
        Self {
            base: BaseActivity::new(id, operation, required_qty),
            production_status: ProductionStatus::Waiting,
            reported: ReportedProgress::default(),
            batch: None,
            resource_locks: ResourceLocks::new(),
            resource_production_info: BTreeMap::new(),
            production_info: ProductionInfoOverride::new(),
            buffer: BufferInfo::new(),
            generated_lots: BTreeMap::new(),
            split_id: None,
            people_usage: PeopleUsage::UseAllAvailable,
            nbr_of_people: Decimal::ONE,
            comments: String::new(),
            batch_amount: Decimal::ZERO,
            actual_resources_used: Vec::new(),
            product_group_cache: CacheCell::new(),
        }
    }

    /// Sets the external identifier.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.base.external_id = external_id.into();
        self
    }

    /// Identifier.
    pub fn id(&self) -> ActivityId {
        self.base.id
    }

    /// Owning job.
    pub fn job_id(&self) -> JobId {
        self.base.operation.job_id
    }

    // ================================
    // Production status
    // ================================

    /// The stored status, without read-path synthesis.
    pub fn stored_production_status(&self) -> ProductionStatus {
        self.production_status
    }

    /// The status as presented to users and the scheduler.
    ///
    /// A hook override wins. Otherwise stored statuses from `SettingUp` up
    /// are returned as-is; below that the status is derived: `Started` if
    /// any progress was reported, else `Waiting` while the operation is
    /// blocked upstream, else `Ready`. The derived value is never stored.
    pub fn production_status(
        &self,
        operation: &OperationContext,
        hook: Option<&dyn ProductionStatusHook>,
    ) -> ProductionStatus {
        if let Some(status) = hook.and_then(|h| h.production_status(self)) {
            return status;
        }
        if self.production_status >= ProductionStatus::SettingUp {
            return self.production_status;
        }
        if self.production_status == ProductionStatus::Started || self.has_reported_progress() {
            ProductionStatus::Started
        } else if operation.latest_constraint.is_blocking() {
            ProductionStatus::Waiting
        } else {
            ProductionStatus::Ready
        }
    }

    /// Category of the stored status.
    pub fn status_category(&self, operation: &OperationContext) -> StatusCategory {
        self.production_status.category(operation.stage_usage)
    }

    /// Whether the stored status is `Finished`.
    pub fn is_finished(&self) -> bool {
        self.production_status == ProductionStatus::Finished
    }

    /// Whether any start, quantity or stage time has been reported.
    pub fn has_reported_progress(&self) -> bool {
        self.base.reported_start_date.is_set()
            || self.base.reported_good_qty > Decimal::ZERO
            || self.base.reported_scrap_qty > Decimal::ZERO
            || self.reported.any_span_reported()
    }

    /// Changes the status on behalf of a user or internal process.
    ///
    /// Returns `true` if the status changed.
    pub fn set_production_status(
        &mut self,
        status: ProductionStatus,
        ctx: &ActivityContext<'_>,
        effects: &mut ActivityEffects,
    ) -> bool {
        self.transition(status, ctx, StatusOrigin::Internal, effects, false)
    }

    /// Applies a status change and its side effects.
    ///
    /// `job_reopened` is set when the caller already unscheduled the job
    /// for an unfinish, so leaving `Finished` does not unschedule twice.
    pub(crate) fn transition(
        &mut self,
        new: ProductionStatus,
        ctx: &ActivityContext<'_>,
        origin: StatusOrigin,
        effects: &mut ActivityEffects,
        job_reopened: bool,
    ) -> bool {
        let current = self.production_status;
        if new == current {
            return false;
        }

        if new > current {
            if origin == StatusOrigin::Internal && !self.base.reported_start_date.is_set() {
                self.base.reported_start_date = ctx.clock;
            }
            if new == ProductionStatus::Finished {
                if !self.base.reported_finish_date.is_set() {
                    self.base.reported_finish_date = self.default_finish_date(ctx);
                }
                if ctx.options.track_actual_resource_usage {
                    self.snapshot_actual_resources();
                }
            }
        } else if current == ProductionStatus::Finished {
            if !job_reopened {
                self.unschedule(ctx.job_id(), UnscheduleReason::Unfinished, effects);
            }
        } else if self.is_scheduled() && drops_released_capacity(current, new) {
            self.unschedule(ctx.job_id(), UnscheduleReason::StageCapacityRequired, effects);
        }

        self.production_status = new;
        info!(
            activity = %self.id(),
            job = %ctx.job_id(),
            from = %current,
            to = %new,
            "production status changed"
        );

        if new.category(ctx.operation.stage_usage) == StatusCategory::PostProduction
            && self.is_scheduled()
        {
            self.unschedule(ctx.job_id(), UnscheduleReason::PostProduction, effects);
        }
        if new == ProductionStatus::Finished {
            effects.push(ActivityEffect::ActivityFinished {
                job_id: ctx.job_id(),
                activity_id: self.id(),
            });
        }
        self.clear_unreached_stage_dates();
        self.base.invalidate_timing();
        true
    }

    /// Finish date used when none was reported: the batch end while
    /// scheduled, else the scenario clock.
    pub fn default_finish_date(&self, ctx: &ActivityContext<'_>) -> Timestamp {
        match &self.batch {
            Some(batch) if self.is_scheduled() => batch.end,
            _ => ctx.clock,
        }
    }

    fn clear_unreached_stage_dates(&mut self) {
        let status = self.production_status;
        if status < ProductionStatus::Finished {
            self.base.reported_finish_date = Timestamp::UNSET;
        }
        if status < ProductionStatus::Cleaning {
            self.reported.end_of_storage_date = Timestamp::UNSET;
        }
        if status < ProductionStatus::Storing {
            self.reported.end_of_post_processing_date = Timestamp::UNSET;
        }
        if status < ProductionStatus::PostProcessing {
            self.reported.end_of_run_date = Timestamp::UNSET;
        }
    }

    // ================================
    // Scheduler linkage
    // ================================

    /// Whether a batch currently holds the activity.
    pub fn is_scheduled(&self) -> bool {
        self.base.flag(ActivityFlag::Scheduled)
    }

    /// The batch holding the activity.
    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    /// Called by the scheduler after placing the activity.
    pub fn set_batch(&mut self, batch: Batch, scope: ScheduleScope) {
        self.batch = Some(batch);
        self.base.set_flag(ActivityFlag::Scheduled, true);
        self.base.set_flag(
            ActivityFlag::ScheduledOnlyForPostProcessingTime,
            scope == ScheduleScope::PostProcessingOnly,
        );
        self.base.set_flag(
            ActivityFlag::ScheduledOnlyForCleanTime,
            scope == ScheduleScope::CleanOnly,
        );
        self.base.invalidate_timing();
    }

    /// Called by the scheduler when removing the placement.
    pub fn clear_batch(&mut self) {
        self.batch = None;
        self.base.set_flag(ActivityFlag::Scheduled, false);
        self.base
            .set_flag(ActivityFlag::ScheduledOnlyForPostProcessingTime, false);
        self.base.set_flag(ActivityFlag::ScheduledOnlyForCleanTime, false);
        self.base.invalidate_timing();
    }

    /// Clears the placement and asks the scheduler to unschedule the job.
    pub(crate) fn unschedule(
        &mut self,
        job_id: JobId,
        reason: UnscheduleReason,
        effects: &mut ActivityEffects,
    ) {
        debug!(activity = %self.id(), job = %job_id, ?reason, "unscheduling job");
        self.clear_batch();
        effects.push(ActivityEffect::UnscheduleJob {
            job_id,
            activity_id: self.id(),
            reason,
        });
    }

    /// Scheduled length of `stage`; zero when not scheduled.
    pub fn scheduled_span(&self, stage: Stage) -> TimeSpan {
        self.batch
            .as_ref()
            .map(|b| b.scheduled_span(stage))
            .unwrap_or(TimeSpan::ZERO)
    }

    /// DBR/JIT buffer model.
    pub fn buffer(&self) -> &BufferInfo {
        &self.buffer
    }

    /// Stores the buffer record for `resource`. The earliest record is
    /// only re-picked by [`finalize_jit_calculations`](Self::finalize_jit_calculations).
    pub fn update_resource_buffer(&mut self, resource: ResourceKey, info: ResourceBufferInfo) {
        self.buffer.update_resource_info(resource, info);
        self.base.invalidate_timing();
    }

    /// Picks the most constraining buffer record.
    pub fn finalize_jit_calculations(&mut self) {
        self.buffer.finalize_jit_calculations();
        self.base.invalidate_timing();
    }

    /// Drops every buffer record.
    pub fn reset_buffer(&mut self) {
        self.buffer.reset();
        self.base.invalidate_timing();
    }

    /// Timing of the current placement.
    pub fn timing_status(&self, ctx: &ActivityContext<'_>) -> TimingStatus {
        self.base.timing_status(
            self.batch.as_ref(),
            &self.buffer,
            ctx.operation.need_date,
            self.is_finished(),
            ctx.cache_epoch,
        )
    }

    /// Resources recorded as having actually processed the activity.
    pub fn actual_resources_used(&self) -> &[ResourceKey] {
        &self.actual_resources_used
    }

    /// Records the batch's resources as actually used.
    ///
    /// Returns `true` if the recorded set changed.
    pub fn snapshot_actual_resources(&mut self) -> bool {
        let Some(batch) = &self.batch else {
            return false;
        };
        if self.actual_resources_used == batch.resources {
            return false;
        }
        self.actual_resources_used = batch.resources.clone();
        true
    }

    // ================================
    // Resource locks
    // ================================

    /// Pins requirement `index` to `resource`.
    ///
    /// Fails when `index` is outside the operation's requirement list.
    pub fn lock_resource(
        &mut self,
        index: usize,
        resource: ResourceKey,
        operation: &OperationContext,
    ) -> Result<Option<ResourceKey>, ValidationError> {
        if index >= operation.resource_requirement_count {
            return Err(ValidationError::lock_index_out_of_range(
                self.id(),
                index,
                operation.resource_requirement_count,
            ));
        }
        Ok(self.resource_locks.lock(index, resource))
    }

    /// Removes the pin on requirement `index`.
    pub fn unlock_resource(&mut self, index: usize) -> Option<ResourceKey> {
        self.resource_locks.unlock(index)
    }

    /// The resource pinned to requirement `index`.
    pub fn locked_resource(&self, index: usize) -> Option<ResourceKey> {
        self.resource_locks.locked(index)
    }

    /// The lock table.
    pub fn resource_locks(&self) -> &ResourceLocks {
        &self.resource_locks
    }

    /// Rebuilds the lock table after the operation's requirement count
    /// changed. Stale indices are dropped.
    pub fn sync_resource_requirements(&mut self, requirement_count: usize) -> Vec<usize> {
        let dropped = self.resource_locks.truncate(requirement_count);
        if !dropped.is_empty() {
            debug!(activity = %self.id(), ?dropped, "dropped stale resource locks");
        }
        dropped
    }

    /// Purges every reference to a deleted resource.
    ///
    /// Returns `true` if anything referenced it.
    pub fn resource_deleted(&mut self, resource: ResourceKey) -> bool {
        let locks = self.resource_locks.remove_resource(resource) > 0;
        let info = self.resource_production_info.remove(&resource).is_some();
        let buffer = self.buffer.remove_resource(resource);
        if buffer {
            self.base.invalidate_timing();
        }
        let before = self.actual_resources_used.len();
        self.actual_resources_used.retain(|r| *r != resource);
        let used = before != self.actual_resources_used.len();
        locks || info || buffer || used
    }

    // ================================
    // People
    // ================================

    /// How many people the activity uses.
    pub fn people_usage(&self) -> PeopleUsage {
        self.people_usage
    }

    /// Number of people for the specified-number usages.
    pub fn nbr_of_people(&self) -> Decimal {
        self.nbr_of_people
    }

    /// Sets the people usage. Returns `true` if it changed.
    pub fn set_people_usage(&mut self, usage: PeopleUsage) -> bool {
        let changed = self.people_usage != usage;
        self.people_usage = usage;
        changed
    }

    /// Sets the number of people; must be positive.
    pub fn set_nbr_of_people(&mut self, count: Decimal) -> Result<bool, ValidationError> {
        if count <= Decimal::ZERO {
            return Err(ValidationError::non_positive_people_count(self.id(), count));
        }
        let changed = self.nbr_of_people != count;
        self.nbr_of_people = count;
        Ok(changed)
    }

    // ================================
    // Production info
    // ================================

    /// Effective production info, optionally specialised for `resource`.
    ///
    /// Per-resource overrides sit on top of activity overrides, which sit on
    /// top of the operation's standard values.
    pub fn effective_production_info(
        &self,
        standard: &ProductionInfo,
        resource: Option<ResourceKey>,
    ) -> ProductionInfo {
        let info = self.production_info.effective(standard);
        match resource.and_then(|r| self.resource_production_info.get(&r)) {
            Some(per_resource) => per_resource.effective(&info),
            None => info,
        }
    }

    /// Product/run-time group, cached per cache epoch.
    pub fn product_group(&self, ctx: &ActivityContext<'_>) -> ProductGroup {
        self.product_group_cache.get_or_compute(ctx.cache_epoch, || {
            let info = self.effective_production_info(&ctx.operation.standard, None);
            ProductGroup {
                product: ctx.operation.primary_product.clone(),
                cycle_span: info.cycle_span,
                qty_per_cycle: info.qty_per_cycle,
            }
        })
    }

    /// Drops every cached value.
    pub fn invalidate_caches(&self) {
        self.base.invalidate_timing();
        self.product_group_cache.invalidate();
    }

    // ================================
    // Cost
    // ================================

    /// Cost of the scheduled placement.
    pub fn scheduled_cost(&self, resources: &[Resource]) -> ActivityCost {
        let occupied = self
            .batch
            .as_ref()
            .map(|b| b.resources.as_slice())
            .unwrap_or(&[]);
        self.base
            .cost(&|s| self.scheduled_span(s), occupied, resources)
    }

    /// Cost of the reported progress on the resources actually used.
    pub fn reported_cost(&self, resources: &[Resource]) -> ActivityCost {
        self.base.cost(
            &|s| self.reported.span(s),
            &self.actual_resources_used,
            resources,
        )
    }
}

/// Whether regressing from `current` to `new` needs stage capacity the
/// scheduler dropped when `current` was entered.
fn drops_released_capacity(current: ProductionStatus, new: ProductionStatus) -> bool {
    matches!(
        current,
        ProductionStatus::SettingUp | ProductionStatus::Running | ProductionStatus::PostProcessing
    ) && first_required_stage(new) < first_required_stage(current)
}

/// First stage the scheduler must allocate for an activity in `status`.
fn first_required_stage(status: ProductionStatus) -> Stage {
    status.stage().unwrap_or(if status == ProductionStatus::Finished {
        Stage::Clean
    } else {
        Stage::Setup
    })
}
