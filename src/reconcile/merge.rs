//! Per-source preprocessing and the shared merge helper.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::table::{guarded_fields, incremental_fields, rule_for, Field};
use super::{ActivityUpdate, UpdateSource};
use crate::models::{
    ActivityFlag, ActivityId, InternalActivity, JobId, ProductionStatus, Stage, Timestamp,
};
use crate::scenario::{
    ActivityContext, ActivityEffect, ActivityEffects, DataChanges, HistoryKind,
    ManualUpdateOverride, UnscheduleReason,
};
use crate::validation::ValidationError;

/// Runs one reconciliation: preprocessing for `source`, then the shared
/// merge. Returns `true` if anything changed or `changes` holds pending
/// notifications.
pub(crate) fn reconcile(
    live: &mut InternalActivity,
    candidate: &ActivityUpdate,
    source: UpdateSource,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    let job = ctx.job_id();

    let mut update = match source {
        UpdateSource::New => ActivityUpdate {
            incremental: false,
            ..candidate.clone()
        },
        UpdateSource::Internal | UpdateSource::External => resolve_incremental(live, candidate)?,
    };
    validate_values(live, &update)?;

    if source == UpdateSource::External && live.base.flag(ActivityFlag::ManualUpdateOnly) {
        apply_manual_only_policy(live, &mut update, ctx.options.manual_update_override);
    }

    let mut updated = false;
    if let Some(info) = &update.production_info {
        let changed = match source {
            UpdateSource::External => !live.production_info.merge_external(info).is_empty(),
            UpdateSource::Internal | UpdateSource::New => live.production_info.copy_all_from(info),
        };
        if changed {
            live.invalidate_caches();
            note(changes, Field::ProductionInfo, live, job);
            updated = true;
        }
    }

    if source == UpdateSource::New {
        changes.flag_eligibility_changes(job);
    }

    updated |= merge(live, &update, source, ctx, effects, changes)?;
    Ok(updated || changes.has_pending_changes())
}

/// Turns the incremental fields of `candidate` into absolute values.
fn resolve_incremental(
    live: &InternalActivity,
    candidate: &ActivityUpdate,
) -> Result<ActivityUpdate, ValidationError> {
    let mut update = candidate.clone();
    if !update.incremental {
        return Ok(update);
    }
    let id = live.id();
    for rule in incremental_fields() {
        if let Some(stage) = rule.field.stage() {
            let slot = update.span_mut(stage);
            if let Some(delta) = *slot {
                *slot = Some(live.reported.span(stage) + delta);
            }
            continue;
        }
        match rule.field {
            Field::GoodQty => {
                update.reported_good_qty = add_qty(
                    id,
                    "reported good qty",
                    live.base.reported_good_qty,
                    update.reported_good_qty,
                )?;
            }
            Field::ScrapQty => {
                update.reported_scrap_qty = add_qty(
                    id,
                    "reported scrap qty",
                    live.base.reported_scrap_qty,
                    update.reported_scrap_qty,
                )?;
            }
            _ => {}
        }
    }
    update.incremental = false;
    Ok(update)
}

fn add_qty(
    id: ActivityId,
    field: &str,
    current: Decimal,
    delta: Option<Decimal>,
) -> Result<Option<Decimal>, ValidationError> {
    delta
        .map(|d| {
            current
                .checked_add(d)
                .ok_or_else(|| ValidationError::quantity_overflow(id, field, current, d))
        })
        .transpose()
}

fn validate_values(live: &InternalActivity, update: &ActivityUpdate) -> Result<(), ValidationError> {
    let id = live.id();
    if let Some(count) = update.nbr_of_people {
        if count <= Decimal::ZERO {
            return Err(ValidationError::non_positive_people_count(id, count));
        }
    }
    for (field, qty) in [
        ("reported good qty", update.reported_good_qty),
        ("reported scrap qty", update.reported_scrap_qty),
        ("required finish qty", update.required_finish_qty),
        ("batch amount", update.batch_amount),
    ] {
        if let Some(qty) = qty.filter(|q| *q < Decimal::ZERO) {
            return Err(ValidationError::negative_quantity(id, field, qty));
        }
    }
    for stage in Stage::ALL {
        if let Some(span) = update.span(stage).filter(|s| s.is_negative()) {
            return Err(ValidationError::negative_span(id, stage, span));
        }
    }
    Ok(())
}

/// Decides whether an automated update may touch a manual-update-only
/// activity's reported progress.
fn apply_manual_only_policy(
    live: &InternalActivity,
    update: &mut ActivityUpdate,
    policy: ManualUpdateOverride,
) {
    let blocked = match policy {
        ManualUpdateOverride::Always => false,
        ManualUpdateOverride::Never => true,
        ManualUpdateOverride::IfValuesAreGreater => {
            guarded_fields().any(|r| regresses(live, update, r.field))
        }
    };
    if blocked {
        warn!(
            activity = %live.id(),
            ?policy,
            "manual-update-only activity: automated progress ignored"
        );
        for r in guarded_fields() {
            clear_field(update, r.field);
        }
    }
}

/// Whether `update` moves `field` backwards.
fn regresses(live: &InternalActivity, update: &ActivityUpdate, field: Field) -> bool {
    fn date_back(live: Timestamp, new: Option<Timestamp>) -> bool {
        new.is_some_and(|d| d.is_set() && live.is_set() && d < live)
    }
    let r = &live.reported;
    match field {
        Field::Status => update
            .status
            .is_some_and(|s| s < live.stored_production_status()),
        Field::StartDate => date_back(live.base.reported_start_date, update.reported_start_date),
        Field::ProcessingStartDate => {
            date_back(r.processing_start_date, update.processing_start_date)
        }
        Field::EndOfRunDate => date_back(r.end_of_run_date, update.end_of_run_date),
        Field::EndOfPostProcessingDate => date_back(
            r.end_of_post_processing_date,
            update.end_of_post_processing_date,
        ),
        Field::EndOfStorageDate => date_back(r.end_of_storage_date, update.end_of_storage_date),
        Field::FinishDate => date_back(
            live.base.reported_finish_date(),
            update.reported_finish_date,
        ),
        Field::SetupSpan => update.setup_span.is_some_and(|s| s < r.setup_span),
        Field::RunSpan => update.run_span.is_some_and(|s| s < r.run_span),
        Field::PostProcessingSpan => update
            .post_processing_span
            .is_some_and(|s| s < r.post_processing_span),
        Field::StorageSpan => update.storage_span.is_some_and(|s| s < r.storage_span),
        Field::CleanSpan => update.clean_span.is_some_and(|s| s < r.clean_span),
        Field::GoodQty => update
            .reported_good_qty
            .is_some_and(|q| q < live.base.reported_good_qty),
        Field::ScrapQty => update
            .reported_scrap_qty
            .is_some_and(|q| q < live.base.reported_scrap_qty),
        _ => false,
    }
}

fn clear_field(update: &mut ActivityUpdate, field: Field) {
    match field {
        Field::Status => update.status = None,
        Field::StartDate => update.reported_start_date = None,
        Field::ProcessingStartDate => update.processing_start_date = None,
        Field::EndOfRunDate => update.end_of_run_date = None,
        Field::EndOfPostProcessingDate => update.end_of_post_processing_date = None,
        Field::EndOfStorageDate => update.end_of_storage_date = None,
        Field::FinishDate => update.reported_finish_date = None,
        Field::SetupSpan => update.setup_span = None,
        Field::RunSpan => update.run_span = None,
        Field::PostProcessingSpan => update.post_processing_span = None,
        Field::StorageSpan => update.storage_span = None,
        Field::CleanSpan => update.clean_span = None,
        Field::CleanOutGrade => update.clean_out_grade = None,
        Field::GoodQty => update.reported_good_qty = None,
        Field::ScrapQty => update.reported_scrap_qty = None,
        Field::RequiredQty => update.required_finish_qty = None,
        Field::Paused => update.paused = None,
        Field::PeopleUsage => update.people_usage = None,
        Field::NbrOfPeople => update.nbr_of_people = None,
        Field::Comments => update.comments = None,
        Field::BatchAmount => update.batch_amount = None,
        Field::ProductionInfo => update.production_info = None,
    }
}

/// Flags the field's change category.
fn note(
    changes: &mut DataChanges,
    field: Field,
    live: &InternalActivity,
    job: JobId,
) {
    debug!(activity = %live.id(), ?field, "field updated");
    if let Some(category) = rule_for(field).category {
        changes.flag(category, job);
    }
}

/// Sets `slot` from a non-sentinel value. Returns `true` if it changed.
fn set_date(slot: &mut Timestamp, value: Option<Timestamp>) -> bool {
    match value {
        Some(date) if date.is_set() && date != *slot => {
            *slot = date;
            true
        }
        _ => false,
    }
}

/// Statuses an omitted operation may not report.
fn conflicts_with_omission(status: ProductionStatus) -> bool {
    status >= ProductionStatus::Started && status < ProductionStatus::Finished
}

/// The shared merge. Steps run strictly in order; later steps read what
/// earlier ones applied.
fn merge(
    live: &mut InternalActivity,
    u: &ActivityUpdate,
    source: UpdateSource,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
    changes: &mut DataChanges,
) -> Result<bool, ValidationError> {
    let job = ctx.job_id();
    let id = live.id();
    let origin = source.origin();
    let current = live.stored_production_status();
    let mut target = u.status.unwrap_or(current);
    let mut updated = false;
    let mut progress = false;

    // 1. Finish date for a transition into (or correction within) Finished.
    if target == ProductionStatus::Finished {
        let finish = match u.reported_finish_date.filter(|d| d.is_set()) {
            Some(date) => date,
            None if live.base.reported_finish_date().is_set() => live.base.reported_finish_date(),
            None => live.default_finish_date(ctx),
        };
        if set_date(&mut live.base.reported_finish_date, Some(finish)) {
            note(changes, Field::FinishDate, live, job);
            updated = true;
        }
    }

    // 2. Omitted operations never run.
    if let Some(status) = u.status {
        if ctx.operation.omitted.is_omitted() && conflicts_with_omission(status) {
            live.transition(ProductionStatus::Ready, ctx, origin, effects, false);
            effects.history(job, id, HistoryKind::OmittedStatusRejected { status });
            changes.flag_constraint_changes(job);
            warn!(activity = %id, %status, "status rejected: operation is omitted");
            return Err(ValidationError::omitted_operation_status(id, status));
        }
    }

    // 3. Stage timestamps.
    let dates = [
        (Field::StartDate, u.reported_start_date),
        (Field::ProcessingStartDate, u.processing_start_date),
        (Field::EndOfRunDate, u.end_of_run_date),
        (Field::EndOfStorageDate, u.end_of_storage_date),
        (Field::EndOfPostProcessingDate, u.end_of_post_processing_date),
    ];
    for (field, value) in dates {
        let slot = match field {
            Field::StartDate => &mut live.base.reported_start_date,
            Field::ProcessingStartDate => &mut live.reported.processing_start_date,
            Field::EndOfRunDate => &mut live.reported.end_of_run_date,
            Field::EndOfStorageDate => &mut live.reported.end_of_storage_date,
            _ => &mut live.reported.end_of_post_processing_date,
        };
        if set_date(slot, value) {
            note(changes, field, live, job);
            updated = true;
        }
    }

    // A finished activity that stays finished only absorbs increases.
    let absorb_only =
        current == ProductionStatus::Finished && target == ProductionStatus::Finished;

    // 4. Clean-out grade, pause, people, comments, amounts.
    if let Some(grade) = u.clean_out_grade.filter(|g| *g != live.reported.clean_out_grade) {
        live.reported.clean_out_grade = grade;
        note(changes, Field::CleanOutGrade, live, job);
        updated = true;
    }
    if let Some(paused) = u.paused {
        if live.base.set_flag(ActivityFlag::Paused, paused) {
            note(changes, Field::Paused, live, job);
            updated = true;
        }
    }
    if let Some(usage) = u.people_usage {
        if live.set_people_usage(usage) {
            note(changes, Field::PeopleUsage, live, job);
            updated = true;
        }
    }
    if let Some(count) = u.nbr_of_people {
        if live.set_nbr_of_people(count)? {
            note(changes, Field::NbrOfPeople, live, job);
            updated = true;
        }
    }
    if let Some(comments) = u.comments.as_ref().filter(|c| **c != live.comments) {
        live.comments = comments.clone();
        note(changes, Field::Comments, live, job);
        updated = true;
    }
    if let Some(amount) = u.batch_amount.filter(|a| *a != live.batch_amount) {
        live.batch_amount = amount;
        note(changes, Field::BatchAmount, live, job);
        updated = true;
    }
    if let Some(qty) = u.required_finish_qty {
        if live
            .base
            .set_required_finish_qty(qty, ctx.options.decimal_precision)
        {
            note(changes, Field::RequiredQty, live, job);
            updated = true;
        }
    }

    // 5. Reopen a finished activity.
    let reopened = current == ProductionStatus::Finished && target < ProductionStatus::Finished;
    if reopened {
        info!(activity = %id, job = %job, to = %target, "reopening finished activity");
        effects.history(job, id, HistoryKind::Unfinished { status: target });
        live.unschedule(job, UnscheduleReason::Unfinished, effects);
        effects.push(ActivityEffect::AlternatePathsRestored { job_id: job });
        changes.flag_eligibility_changes(job);
        updated = true;
    }

    // 6. Stage spans, noting stages that ran longer than scheduled.
    for stage in Stage::ALL {
        let Some(new) = u.span(stage) else {
            continue;
        };
        let old = live.reported.span(stage);
        if absorb_only && new <= old {
            continue;
        }
        let increment = new - old;
        if live.is_scheduled() && increment.is_positive() {
            let scheduled = live.scheduled_span(stage);
            if increment > scheduled {
                effects.history(
                    job,
                    id,
                    HistoryKind::SlowStage {
                        stage,
                        reported: increment,
                        scheduled,
                    },
                );
            }
        }
        if live.reported.set_span(stage, new) {
            note(changes, Field::for_stage(stage), live, job);
            updated = true;
            progress = true;
        }
    }

    // 7. Quantities.
    if let Some(good) = u.reported_good_qty {
        let old = live.base.reported_good_qty;
        if good != old && (!absorb_only || good > old) {
            live.base.reported_good_qty = good;
            note(changes, Field::GoodQty, live, job);
            updated = true;
            progress = true;
            if source == UpdateSource::Internal {
                emit_production_effects(live, good - old, ctx, effects);
            }
        }
    }
    if let Some(scrap) = u.reported_scrap_qty {
        let old = live.base.reported_scrap_qty;
        if scrap != old && (!absorb_only || scrap > old) {
            live.base.reported_scrap_qty = scrap;
            note(changes, Field::ScrapQty, live, job);
            updated = true;
            progress = true;
            let expected = live
                .effective_production_info(&ctx.operation.standard, None)
                .expected_scrap(live.base.required_finish_qty());
            if scrap > old && scrap > expected {
                effects.history(job, id, HistoryKind::ExcessiveScrap { scrap, expected });
            }
        }
    }

    // 8. Final status. Progress on an unstarted activity starts it.
    if u.status.is_none() && progress && current < ProductionStatus::Started {
        target = ProductionStatus::Started;
    }
    if live.transition(target, ctx, origin, effects, reopened) {
        note(changes, Field::Status, live, job);
        updated = true;
    }

    // 9. Resources actually used.
    if ctx.options.track_actual_resource_usage && live.snapshot_actual_resources() {
        updated = true;
    }

    Ok(updated)
}

fn emit_production_effects(
    live: &InternalActivity,
    delta: Decimal,
    ctx: &ActivityContext<'_>,
    effects: &mut ActivityEffects,
) {
    if ctx.options.produce_inventory_on_report {
        effects.push(ActivityEffect::InventoryProduced {
            activity_id: live.id(),
            product: ctx.operation.primary_product.clone(),
            qty: delta,
        });
    }
    if ctx.options.auto_consume_materials {
        effects.push(ActivityEffect::MaterialsConsumed {
            activity_id: live.id(),
            produced_qty: delta,
        });
    }
}
