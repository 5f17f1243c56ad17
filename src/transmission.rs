//! Inbound directives routed to the reconciliation engine.
//!
//! Three shapes arrive:
//!
//! | Directive | Source | Target | Incremental |
//! |-----------|--------|--------|-------------|
//! | [`FinishDirective`] | ERP | existing activity by external ID | no |
//! | [`StatusUpdate`] | ERP | by external ID; created if missing | per update |
//! | [`EditDirective`] | UI | by activity ID | never |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ActivityError, Result};
use crate::manager::ActivityManager;
use crate::models::{ActivityId, InternalActivity, ProductionStatus, Timestamp};
use crate::reconcile::{self, ActivityUpdate, UpdateSource};
use crate::scenario::{ActivityContext, ActivityEffects, DataChanges};

/// Marks an activity finished, optionally with final quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishDirective {
    /// External ID of the activity.
    pub external_id: String,
    /// Final good quantity.
    pub good_qty: Option<Decimal>,
    /// Final scrap quantity.
    pub scrap_qty: Option<Decimal>,
    /// Finish date; defaults to the batch end or the scenario clock.
    pub finish_date: Option<Timestamp>,
}

impl FinishDirective {
    /// Finish `external_id` with no other values.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            good_qty: None,
            scrap_qty: None,
            finish_date: None,
        }
    }

    /// Sets the final good quantity.
    pub fn with_good_qty(mut self, qty: Decimal) -> Self {
        self.good_qty = Some(qty);
        self
    }

    /// Sets the finish date.
    pub fn with_finish_date(mut self, date: Timestamp) -> Self {
        self.finish_date = Some(date);
        self
    }

    fn to_update(&self) -> ActivityUpdate {
        ActivityUpdate {
            status: Some(ProductionStatus::Finished),
            reported_good_qty: self.good_qty,
            reported_scrap_qty: self.scrap_qty,
            reported_finish_date: self.finish_date,
            ..ActivityUpdate::default()
        }
    }
}

/// Field-level progress report from an automated system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// External ID of the activity.
    pub external_id: String,
    /// Required quantity for an activity created by this update.
    pub required_qty: Decimal,
    /// Values set by the sender.
    pub update: ActivityUpdate,
}

impl StatusUpdate {
    /// Creates a status update.
    pub fn new(external_id: impl Into<String>, required_qty: Decimal, update: ActivityUpdate) -> Self {
        Self {
            external_id: external_id.into(),
            required_qty,
            update,
        }
    }
}

/// Interactive edit of one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDirective {
    /// Edited activity.
    pub activity_id: ActivityId,
    /// Edited values.
    pub update: ActivityUpdate,
}

/// Any inbound directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transmission {
    /// See [`FinishDirective`].
    Finish(FinishDirective),
    /// See [`StatusUpdate`].
    Status(StatusUpdate),
    /// See [`EditDirective`].
    Edit(EditDirective),
}

/// Result of applying a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionOutcome {
    /// Activity the directive landed on.
    pub activity_id: ActivityId,
    /// The activity was created by this directive.
    pub created: bool,
    /// Something changed, or notifications are pending.
    pub updated: bool,
}

/// Routes a directive to the matching reconciliation path.
///
/// # Errors
/// - [`ActivityError::ExternalIdNotFound`] when a finish names an unknown activity
/// - [`ActivityError::NotFound`] when an edit names an unknown activity
/// - [`ActivityError::Validation`] when the merge rejects the values
pub fn apply_transmission(
    activities: &mut ActivityManager,
    transmission: &Transmission,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<TransmissionOutcome> {
    match transmission {
        Transmission::Finish(finish) => {
            let id = activities
                .id_by_external_id(&finish.external_id)
                .ok_or_else(|| ActivityError::ExternalIdNotFound(finish.external_id.clone()))?;
            let live = activities.require_mut(id)?;
            let updated =
                reconcile::update_external(live, &finish.to_update(), ctx, effects, changes)?;
            Ok(TransmissionOutcome {
                activity_id: id,
                created: false,
                updated,
            })
        }
        Transmission::Status(status) => {
            if let Some(id) = activities.id_by_external_id(&status.external_id) {
                let live = activities.require_mut(id)?;
                let updated = reconcile::reconcile(
                    live,
                    &status.update,
                    UpdateSource::External,
                    ctx,
                    effects,
                    changes,
                )?;
                return Ok(TransmissionOutcome {
                    activity_id: id,
                    created: false,
                    updated,
                });
            }

            // A rejected first update leaves neither the activity nor its effects behind.
            let id = activities.next_id();
            let mut live = InternalActivity::new(id, ctx.operation.operation_ref(), Decimal::ZERO);
            live.base.external_id = status.external_id.clone();
            live.base
                .set_required_finish_qty(status.required_qty, ctx.options.decimal_precision);
            let mut new_effects = ActivityEffects::new();
            let mut new_changes = DataChanges::new();
            let updated = reconcile::reconcile(
                &mut live,
                &status.update,
                UpdateSource::New,
                ctx,
                &mut new_effects,
                &mut new_changes,
            )?;
            activities.add(live)?;
            effects.append(&mut new_effects);
            changes.merge(&new_changes);
            info!(activity = %id, external_id = %status.external_id, "activity materialized");
            Ok(TransmissionOutcome {
                activity_id: id,
                created: true,
                updated: updated || changes.has_pending_changes(),
            })
        }
        Transmission::Edit(edit) => {
            let update = ActivityUpdate {
                incremental: false,
                ..edit.update.clone()
            };
            let live = activities.require_mut(edit.activity_id)?;
            let updated = reconcile::update_internal(live, &update, ctx, effects, changes)?;
            Ok(TransmissionOutcome {
                activity_id: edit.activity_id,
                created: false,
                updated,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationContext, OperationRef, Stage, TimeSpan};
    use crate::scenario::{ChangeCategory, ScenarioOptions};

    fn setup() -> (OperationContext, ScenarioOptions) {
        (
            OperationContext::new(OperationRef::new(4, 40)),
            ScenarioOptions::default(),
        )
    }

    #[test]
    fn test_status_update_materializes_activity() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut m = ActivityManager::new();
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Status(StatusUpdate::new(
            "WO-1/10",
            Decimal::from(50),
            ActivityUpdate::new().with_good_qty(Decimal::from(10)),
        ));
        let out = apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap();

        assert!(out.created);
        assert!(out.updated);
        let a = m.get(out.activity_id).unwrap();
        assert_eq!(a.base.external_id, "WO-1/10");
        assert_eq!(a.base.required_finish_qty(), Decimal::from(50));
        assert_eq!(a.base.reported_good_qty, Decimal::from(10));
        assert!(changes.is_flagged(ChangeCategory::Eligibility, op.job_id));

        // Second update for the same activity is external, not new.
        let again = apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap();
        assert!(!again.created);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_rejected_status_update_creates_nothing() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::from_ticks(1_000));
        let mut m = ActivityManager::new();
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Status(StatusUpdate::new(
            "WO-X",
            Decimal::from(5),
            ActivityUpdate::new().with_good_qty(Decimal::from(-1)),
        ));
        let err = apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(m.len(), 0);
        assert!(m.id_by_external_id("WO-X").is_none());
        assert!(fx.is_empty());
        assert!(!changes.has_pending_changes());

        // The next accepted update creates the activity with the first free ID.
        let ok = Transmission::Status(StatusUpdate::new(
            "WO-X",
            Decimal::from(5),
            ActivityUpdate::new().with_good_qty(Decimal::from(1)),
        ));
        let out = apply_transmission(&mut m, &ok, &ctx, &mut fx, &mut changes).unwrap();
        assert!(out.created);
        assert_eq!(out.activity_id, ActivityId(1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_incremental_status_update() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut m = ActivityManager::new();
        let id = m.create(op.operation_ref(), Decimal::from(10));
        m.get_mut(id).unwrap().base.external_id = "X".into();
        m.get_mut(id).unwrap().reported.run_span = TimeSpan::from_hours(2);
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Status(StatusUpdate::new(
            "X",
            Decimal::from(10),
            ActivityUpdate::new()
                .with_span(Stage::Run, TimeSpan::from_hours(1))
                .incremental(),
        ));
        apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap();
        assert_eq!(m.get(id).unwrap().reported.run_span, TimeSpan::from_hours(3));
    }

    #[test]
    fn test_edit_ignores_incremental_flag() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut m = ActivityManager::new();
        let id = m.create(op.operation_ref(), Decimal::from(10));
        m.get_mut(id).unwrap().base.reported_good_qty = Decimal::from(4);
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Edit(EditDirective {
            activity_id: id,
            update: ActivityUpdate::new().with_good_qty(Decimal::from(6)).incremental(),
        });
        apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap();
        assert_eq!(m.get(id).unwrap().base.reported_good_qty, Decimal::from(6));
    }

    #[test]
    fn test_finish_directive() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::from_ticks(9_000));
        let mut m = ActivityManager::new();
        let id = m.create(op.operation_ref(), Decimal::from(100));
        m.get_mut(id).unwrap().base.external_id = "F".into();
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Finish(FinishDirective::new("F").with_good_qty(Decimal::from(100)));
        apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap();

        let a = m.get(id).unwrap();
        assert!(a.is_finished());
        assert_eq!(a.base.remaining_qty(false), Decimal::ZERO);
        assert_eq!(a.base.reported_finish_date(), Timestamp::from_ticks(9_000));

        let missing = Transmission::Finish(FinishDirective::new("nope"));
        let err = apply_transmission(&mut m, &missing, &ctx, &mut fx, &mut changes).unwrap_err();
        assert!(matches!(err, ActivityError::ExternalIdNotFound(_)));
    }

    #[test]
    fn test_edit_unknown_activity() {
        let (op, options) = setup();
        let ctx = ActivityContext::new(&op, &options, Timestamp::UNSET);
        let mut m = ActivityManager::new();
        let mut fx = ActivityEffects::new();
        let mut changes = DataChanges::new();

        let t = Transmission::Edit(EditDirective {
            activity_id: ActivityId(77),
            update: ActivityUpdate::new(),
        });
        let err = apply_transmission(&mut m, &t, &ctx, &mut fx, &mut changes).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
