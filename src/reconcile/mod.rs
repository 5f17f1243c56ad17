//! Update reconciliation.
//!
//! Merges an incoming [`ActivityUpdate`] into a live [`InternalActivity`].
//! Three callers feed this engine:
//!
//! - [`update_internal`]: interactive edits. Every field the candidate sets is
//!   authoritative; production info overrides are copied wholesale,
//!   ignoring their manual-update-only guards.
//! - [`update_external`]: automated transmissions to an existing activity.
//!   Production info fields respect their guards. If the activity is flagged
//!   manual-update-only, [`ManualUpdateOverride`](crate::scenario::ManualUpdateOverride)
//!   decides whether reported progress applies.
//! - [`update_new`]: first materialization from a transmission. Everything
//!   applies, the incremental flag is ignored (so re-applying is idempotent)
//!   and an eligibility check is always flagged.
//!
//! All three run the same merge, driven by the table in [`table`]. Side
//! effects go to an [`ActivityEffects`] buffer in the order they happen;
//! change categories are flagged on a [`DataChanges`] tracker.
//!
//! The return value is `true` if anything changed *or* the tracker still has
//! pending changes. A `false` result never means the tracker is empty.

mod merge;
pub mod table;
mod update;

pub use table::{Field, MergeRule, MERGE_TABLE};
pub use update::ActivityUpdate;

use crate::models::{InternalActivity, StatusOrigin};
use crate::scenario::{ActivityContext, ActivityEffects, DataChanges};
use crate::validation::ValidationError;

/// Who sent an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateSource {
    /// Interactive edit.
    Internal,
    /// Automated transmission to an existing activity.
    External,
    /// Transmission that just created the activity.
    New,
}

impl UpdateSource {
    /// Origin used for status transitions.
    pub fn origin(self) -> StatusOrigin {
        match self {
            Self::Internal => StatusOrigin::Internal,
            Self::External | Self::New => StatusOrigin::External,
        }
    }
}

/// Applies an interactive edit.
pub fn update_internal(
    live: &mut InternalActivity,
    candidate: &ActivityUpdate,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    merge::reconcile(live, candidate, UpdateSource::Internal, ctx, effects, changes)
}

/// Applies an automated transmission to an existing activity.
pub fn update_external(
    live: &mut InternalActivity,
    candidate: &ActivityUpdate,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    merge::reconcile(live, candidate, UpdateSource::External, ctx, effects, changes)
}

/// Applies the first transmission to a newly created activity.
pub fn update_new(
    live: &mut InternalActivity,
    candidate: &ActivityUpdate,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    merge::reconcile(live, candidate, UpdateSource::New, ctx, effects, changes)
}

/// Applies `candidate` from `source`.
pub fn reconcile(
    live: &mut InternalActivity,
    candidate: &ActivityUpdate,
    source: UpdateSource,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    merge::reconcile(live, candidate, source, ctx, effects, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActivityFlag, ActivityId, Batch, JobId, OmitStatus, OperationContext, OperationRef,
        ProductionInfo, ProductionInfoField, ProductionInfoOverride, ProductionStatus,
        ScheduleScope, Stage, TimeSpan, Timestamp,
    };
    use crate::scenario::{
        ActivityEffect, ChangeCategory, HistoryKind, ManualUpdateOverride, ScenarioOptions,
        UnscheduleReason,
    };
    use crate::validation::ValidationErrorKind;
    use rust_decimal::Decimal;

    fn ts(t: i64) -> Timestamp {
        Timestamp::from_ticks(t)
    }

    fn op() -> OperationContext {
        OperationContext::new(OperationRef::new(7, 70))
    }

    fn activity() -> InternalActivity {
        InternalActivity::new(ActivityId(1), OperationRef::new(7, 70), Decimal::from(100))
    }

    struct Harness {
        effects: ActivityEffects,
        changes: DataChanges,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                effects: ActivityEffects::new(),
                changes: DataChanges::new(),
            }
        }
    }

    #[test]
    fn test_finish_new_activity_unscheduled() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(42_000));
        let mut h = Harness::new();
        let mut a = activity();

        let update = ActivityUpdate::new()
            .with_status(ProductionStatus::Finished)
            .with_good_qty(Decimal::from(100));
        let updated = update_new(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert!(updated);
        assert_eq!(a.base.remaining_qty(false), Decimal::ZERO);
        assert_eq!(a.stored_production_status(), ProductionStatus::Finished);
        assert_eq!(a.base.reported_finish_date(), ts(42_000));
        assert!(h.changes.is_flagged(ChangeCategory::Eligibility, JobId(7)));
    }

    #[test]
    fn test_finish_scheduled_activity_uses_batch_end() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(42_000));
        let mut h = Harness::new();
        let mut a = activity();
        a.set_batch(Batch::new(1, ts(10_000), ts(30_000)), ScheduleScope::Full);

        let update = ActivityUpdate::new()
            .with_status(ProductionStatus::Finished)
            .with_good_qty(Decimal::from(100));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a.base.reported_finish_date(), ts(30_000));
        assert!(a.is_finished());
        assert!(!a.is_scheduled());
        assert!(h
            .effects
            .iter()
            .any(|e| matches!(e, ActivityEffect::ActivityFinished { .. })));
    }

    #[test]
    fn test_manual_only_never_keeps_live_qty() {
        let op = op();
        let options =
            ScenarioOptions::default().with_manual_update_override(ManualUpdateOverride::Never);
        let ctx = ActivityContext::new(&op, &options, ts(1_000));
        let mut h = Harness::new();
        let mut a = activity();
        a.set_production_status(ProductionStatus::Running, &ctx, &mut h.effects);
        a.base.reported_good_qty = Decimal::from(40);
        a.base.set_flag(ActivityFlag::ManualUpdateOnly, true);

        let update = ActivityUpdate::new().with_good_qty(Decimal::from(25));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a.base.reported_good_qty, Decimal::from(40));
        assert_eq!(a.stored_production_status(), ProductionStatus::Running);
    }

    #[test]
    fn test_manual_only_if_greater_is_all_or_nothing() {
        let op = op();
        let options = ScenarioOptions::default()
            .with_manual_update_override(ManualUpdateOverride::IfValuesAreGreater);
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.base.reported_good_qty = Decimal::from(40);
        a.reported.run_span = TimeSpan::from_hours(2);
        a.base.set_flag(ActivityFlag::ManualUpdateOnly, true);

        // Run span regresses, so the larger quantity is ignored too.
        let regress = ActivityUpdate::new()
            .with_good_qty(Decimal::from(60))
            .with_span(Stage::Run, TimeSpan::from_hours(1));
        update_external(&mut a, &regress, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.base.reported_good_qty, Decimal::from(40));

        let advance = ActivityUpdate::new()
            .with_good_qty(Decimal::from(60))
            .with_span(Stage::Run, TimeSpan::from_hours(3));
        update_external(&mut a, &advance, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.base.reported_good_qty, Decimal::from(60));
        assert_eq!(a.reported.run_span, TimeSpan::from_hours(3));
    }

    #[test]
    fn test_manual_only_always_applies() {
        let op = op();
        let options =
            ScenarioOptions::default().with_manual_update_override(ManualUpdateOverride::Always);
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.base.reported_good_qty = Decimal::from(40);
        a.base.set_flag(ActivityFlag::ManualUpdateOnly, true);

        let update = ActivityUpdate::new().with_good_qty(Decimal::from(10));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.base.reported_good_qty, Decimal::from(10));
    }

    #[test]
    fn test_incremental_adds_and_absolute_replaces() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.reported.setup_span = TimeSpan::from_minutes(30);

        let delta = ActivityUpdate::new()
            .with_span(Stage::Setup, TimeSpan::from_minutes(15))
            .incremental();
        update_external(&mut a, &delta, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.reported.setup_span, TimeSpan::from_minutes(45));

        let absolute = ActivityUpdate::new().with_span(Stage::Setup, TimeSpan::from_minutes(5));
        update_external(&mut a, &absolute, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.reported.setup_span, TimeSpan::from_minutes(5));
    }

    #[test]
    fn test_new_activity_update_is_idempotent() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();

        let update = ActivityUpdate::new()
            .with_good_qty(Decimal::from(5))
            .with_span(Stage::Run, TimeSpan::from_hours(1))
            .incremental();
        update_new(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();
        let first = a.clone();
        update_new(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a, first);
        assert_eq!(a.base.reported_good_qty, Decimal::from(5));
    }

    #[test]
    fn test_unfinish_from_transmission() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(500));
        let mut h = Harness::new();
        let mut a = activity();
        a.set_production_status(ProductionStatus::Finished, &ctx, &mut h.effects);
        a.set_batch(Batch::new(3, ts(600), ts(900)), ScheduleScope::Full);
        h.effects.drain();

        let update = ActivityUpdate::new().with_status(ProductionStatus::Running);
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a.stored_production_status(), ProductionStatus::Running);
        assert!(!a.is_scheduled());
        assert!(!a.base.reported_finish_date().is_set());
        assert!(h.effects.unschedules(JobId(7)));
        assert!(h
            .effects
            .history_notes()
            .any(|n| matches!(n.kind, HistoryKind::Unfinished { .. })));
        assert!(h
            .effects
            .iter()
            .any(|e| matches!(e, ActivityEffect::AlternatePathsRestored { .. })));
        assert!(h.changes.is_flagged(ChangeCategory::Eligibility, JobId(7)));
        // One unschedule request, not one per step.
        let unschedules = h
            .effects
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ActivityEffect::UnscheduleJob {
                        reason: UnscheduleReason::Unfinished,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(unschedules, 1);
    }

    #[test]
    fn test_finished_absorbs_only_increases() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(500));
        let mut h = Harness::new();
        let mut a = activity();
        a.base.reported_good_qty = Decimal::from(90);
        a.reported.run_span = TimeSpan::from_hours(4);
        a.set_production_status(ProductionStatus::Finished, &ctx, &mut h.effects);

        let update = ActivityUpdate::new()
            .with_status(ProductionStatus::Finished)
            .with_good_qty(Decimal::from(95))
            .with_span(Stage::Run, TimeSpan::from_hours(3));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a.base.reported_good_qty, Decimal::from(95));
        assert_eq!(a.reported.run_span, TimeSpan::from_hours(4));
        assert!(a.is_finished());
    }

    #[test]
    fn test_omitted_operation_rejects_running() {
        let op = op().with_omitted(OmitStatus::OmittedByUser);
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.set_production_status(ProductionStatus::Started, &ctx, &mut h.effects);

        let update = ActivityUpdate::new().with_status(ProductionStatus::Running);
        let err = update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes)
            .unwrap_err();

        assert_eq!(err.kind, ValidationErrorKind::OmittedOperationStatus);
        assert_eq!(a.stored_production_status(), ProductionStatus::Ready);
    }

    #[test]
    fn test_slow_stage_and_excessive_scrap_notes() {
        let op = op().with_standard(
            ProductionInfo::default().with_planning_scrap_percent(Decimal::from(5)),
        );
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.set_batch(
            Batch::from_stages(
                1,
                ts(0),
                [
                    TimeSpan::ZERO,
                    TimeSpan::from_hours(2),
                    TimeSpan::ZERO,
                    TimeSpan::ZERO,
                    TimeSpan::ZERO,
                ],
            ),
            ScheduleScope::Full,
        );

        let update = ActivityUpdate::new()
            .with_span(Stage::Run, TimeSpan::from_hours(3))
            .with_scrap_qty(Decimal::from(8));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        let kinds: Vec<_> = h.effects.history_notes().map(|n| &n.kind).collect();
        assert!(kinds
            .iter()
            .any(|k| matches!(k, HistoryKind::SlowStage { stage: Stage::Run, .. })));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, HistoryKind::ExcessiveScrap { .. })));
        // Progress on an unstarted activity starts it.
        assert_eq!(a.stored_production_status(), ProductionStatus::Started);
    }

    #[test]
    fn test_internal_good_qty_drives_inventory() {
        let op = op().with_primary_product("WIDGET");
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.base.reported_good_qty = Decimal::from(10);

        let update = ActivityUpdate::new().with_good_qty(Decimal::from(25));
        update_internal(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert!(h.effects.iter().any(|e| matches!(
            e,
            ActivityEffect::InventoryProduced { qty, product: Some(p), .. }
                if *qty == Decimal::from(15) && p == "WIDGET"
        )));
        assert!(h
            .effects
            .iter()
            .any(|e| matches!(e, ActivityEffect::MaterialsConsumed { .. })));

        // Transmissions do not drive inventory.
        let mut h2 = Harness::new();
        let update = ActivityUpdate::new().with_good_qty(Decimal::from(30));
        update_external(&mut a, &update, &ctx, &mut h2.effects, &mut h2.changes).unwrap();
        assert!(!h2
            .effects
            .iter()
            .any(|e| matches!(e, ActivityEffect::InventoryProduced { .. })));
    }

    #[test]
    fn test_guarded_production_info() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        a.production_info = ProductionInfoOverride::new()
            .with_cycle_span(TimeSpan::from_minutes(3))
            .with_manual_only(ProductionInfoField::CycleSpan);

        let incoming = ProductionInfoOverride::new()
            .with_cycle_span(TimeSpan::from_minutes(9))
            .with_setup_span(TimeSpan::from_minutes(20));
        let update = ActivityUpdate::new().with_production_info(incoming.clone());

        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.production_info.cycle_span.value, Some(TimeSpan::from_minutes(3)));
        assert_eq!(a.production_info.setup_span.value, Some(TimeSpan::from_minutes(20)));

        update_internal(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.production_info.cycle_span.value, Some(TimeSpan::from_minutes(9)));
    }

    #[test]
    fn test_validation_rejects_before_mutating() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();

        let update = ActivityUpdate::new()
            .with_good_qty(Decimal::from(3))
            .with_people(crate::models::PeopleUsage::UseSpecifiedNumber, Decimal::ZERO);
        let err =
            update_internal(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap_err();

        assert_eq!(err.kind, ValidationErrorKind::NonPositivePeopleCount);
        assert_eq!(a.base.reported_good_qty, Decimal::ZERO);
    }

    #[test]
    fn test_incremental_qty_overflow_is_rejected() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(1_000));
        let mut h = Harness::new();
        let mut a = activity();
        a.base.reported_good_qty = Decimal::ONE;
        let before = a.clone();

        let update = ActivityUpdate::new().with_good_qty(Decimal::MAX).incremental();
        let err =
            update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap_err();

        assert_eq!(err.kind, ValidationErrorKind::QuantityOverflow);
        assert_eq!(err.code, 2010);
        assert_eq!(a, before);
        assert_eq!(h.effects.len(), 0);
    }

    #[test]
    fn test_negative_span_is_rejected() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(1_000));
        let mut h = Harness::new();
        let mut a = activity();
        a.reported.setup_span = TimeSpan::from_minutes(30);

        let absolute = ActivityUpdate::new().with_span(Stage::Run, TimeSpan::from_ticks(-1));
        let err = update_internal(&mut a, &absolute, &ctx, &mut h.effects, &mut h.changes)
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NegativeSpan);
        assert_eq!(a.reported.run_span, TimeSpan::ZERO);

        // A delta that takes the live span below zero is rejected too.
        let delta = ActivityUpdate::new()
            .with_span(Stage::Setup, TimeSpan::from_minutes(-45))
            .incremental();
        let err =
            update_external(&mut a, &delta, &ctx, &mut h.effects, &mut h.changes).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NegativeSpan);
        assert_eq!(a.reported.setup_span, TimeSpan::from_minutes(30));

        let correction = ActivityUpdate::new()
            .with_span(Stage::Setup, TimeSpan::from_minutes(-10))
            .incremental();
        update_external(&mut a, &correction, &ctx, &mut h.effects, &mut h.changes).unwrap();
        assert_eq!(a.reported.setup_span, TimeSpan::from_minutes(20));
    }

    #[test]
    fn test_clean_span_is_stage_progress() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, ts(1_000));
        let mut h = Harness::new();
        let mut a = activity();
        a.set_batch(
            Batch::from_stages(
                1,
                ts(0),
                [
                    TimeSpan::ZERO,
                    TimeSpan::from_hours(1),
                    TimeSpan::ZERO,
                    TimeSpan::ZERO,
                    TimeSpan::from_minutes(10),
                ],
            ),
            ScheduleScope::Full,
        );

        let update = ActivityUpdate::new().with_span(Stage::Clean, TimeSpan::from_minutes(30));
        update_external(&mut a, &update, &ctx, &mut h.effects, &mut h.changes).unwrap();

        assert_eq!(a.reported.clean_span, TimeSpan::from_minutes(30));
        assert!(h
            .effects
            .history_notes()
            .any(|n| matches!(n.kind, HistoryKind::SlowStage { stage: Stage::Clean, .. })));
        assert!(h.changes.is_flagged(ChangeCategory::Eligibility, JobId(7)));
        assert_eq!(a.stored_production_status(), ProductionStatus::Started);
    }

    #[test]
    fn test_updated_reports_pending_changes() {
        let op = op();
        let options = ScenarioOptions::default();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut h = Harness::new();
        let mut a = activity();
        h.changes.flag_constraint_changes(JobId(99));

        let updated =
            update_internal(&mut a, &ActivityUpdate::new(), &ctx, &mut h.effects, &mut h.changes)
                .unwrap();
        assert!(updated);

        h.changes.clear();
        let updated =
            update_internal(&mut a, &ActivityUpdate::new(), &ctx, &mut h.effects, &mut h.changes)
                .unwrap();
        assert!(!updated);
    }
}
