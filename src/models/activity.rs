//! Activity identity and base record.
//!
//! An activity is the smallest schedulable unit of work: one operation, or a
//! split fraction of it. [`BaseActivity`] holds what every activity variant
//! shares: identity, quantities, anchoring, the reported start and finish,
//! packed flags, and the scheduling-derived timing status.
//!
//! # Quantities
//! Quantities are arbitrary-precision decimals. The required quantity is
//! rounded to the scenario precision and floored at zero whenever it is set.
//! Remaining quantity is `max(0, required - good [- scrap])`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    ActivityFlag, ActivityFlags, Batch, BufferInfo, CacheCell, OperationRef, Resource,
    ResourceKey, Stage, TimeSpan, Timestamp,
};

/// Activity identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// How the current placement relates to the activity's need date and JIT start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingStatus {
    /// No batch holds the activity.
    NotScheduled,
    /// Ends by the need date and starts no later than the DBR-JIT start.
    OnTime,
    /// Ends in time but starts after the DBR-JIT start, eating into the buffer.
    CapacityBottleneck,
    /// Ends after the need date.
    Late,
    /// Already finished.
    Finished,
}

/// Cost of an activity by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCost {
    /// Setup cost.
    pub setup: Decimal,
    /// Run cost.
    pub run: Decimal,
    /// Post-processing cost.
    pub post_processing: Decimal,
}

impl ActivityCost {
    /// Cost of occupying `occupied` resources for the given setup, run and
    /// post-processing spans. Unknown resource keys cost nothing.
    pub fn compute(
        setup: TimeSpan,
        run: TimeSpan,
        post_processing: TimeSpan,
        occupied: &[ResourceKey],
        resources: &[Resource],
    ) -> Self {
        let mut cost = Self::default();
        for key in occupied {
            let Some(r) = resources.iter().find(|r| r.key == *key) else {
                continue;
            };
            cost.setup += setup.hours() * (r.hourly_cost + r.setup_hourly_cost);
            cost.run += run.hours() * r.hourly_cost;
            cost.post_processing += post_processing.hours() * r.hourly_cost;
        }
        cost
    }

    /// Sum of all stages.
    pub fn total(&self) -> Decimal {
        self.setup + self.run + self.post_processing
    }
}

/// Fields shared by every activity variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseActivity {
    /// Unique identifier.
    pub id: ActivityId,
    /// Identifier in the foreign (ERP/MES) system.
    pub external_id: String,
    /// Owning operation.
    pub operation: OperationRef,
    required_finish_qty: Decimal,
    /// Good quantity reported so far.
    pub reported_good_qty: Decimal,
    /// Scrap quantity reported so far.
    pub reported_scrap_qty: Decimal,
    /// Date the start is pinned to while anchored.
    pub anchor_date: Timestamp,
    /// Date work was first reported.
    pub reported_start_date: Timestamp,
    pub(crate) reported_finish_date: Timestamp,
    /// Packed flags.
    pub flags: ActivityFlags,
    #[serde(skip)]
    timing_cache: CacheCell<TimingStatus>,
}

impl BaseActivity {
    /// Creates an activity for `operation` requiring `required_qty`.
    ///
    /// Negative quantities are floored at zero.
    pub fn new(id: ActivityId, operation: OperationRef, required_qty: Decimal) -> Self {
        Self {
            id,
            external_id: String::new(),
            operation,
            required_finish_qty: required_qty.max(Decimal::ZERO),
            reported_good_qty: Decimal::ZERO,
            reported_scrap_qty: Decimal::ZERO,
            anchor_date: Timestamp::UNSET,
            reported_start_date: Timestamp::UNSET,
            reported_finish_date: Timestamp::UNSET,
            flags: ActivityFlags::new(),
            timing_cache: CacheCell::new(),
        }
    }

    /// Sets the external identifier.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    /// Quantity that must be finished.
    pub fn required_finish_qty(&self) -> Decimal {
        self.required_finish_qty
    }

    /// Sets the required quantity, rounded to `precision` places and floored
    /// at zero. Returns `true` if the stored value changed.
    pub fn set_required_finish_qty(&mut self, qty: Decimal, precision: u32) -> bool {
        let qty = round_qty(qty, precision);
        if qty == self.required_finish_qty {
            return false;
        }
        self.required_finish_qty = qty;
        true
    }

    /// Date the activity was reported finished. Unset unless finished.
    pub fn reported_finish_date(&self) -> Timestamp {
        self.reported_finish_date
    }

    /// Quantity counted toward completion.
    pub fn completed_qty(&self, deduct_scrap: bool) -> Decimal {
        if deduct_scrap {
            self.reported_good_qty + self.reported_scrap_qty
        } else {
            self.reported_good_qty
        }
    }

    /// Quantity still to produce; never negative.
    pub fn remaining_qty(&self, deduct_scrap: bool) -> Decimal {
        (self.required_finish_qty - self.completed_qty(deduct_scrap)).max(Decimal::ZERO)
    }

    /// Completion percentage in 0..=100. A zero requirement counts as done.
    pub fn percent_finished(&self, deduct_scrap: bool) -> Decimal {
        if self.required_finish_qty.is_zero() {
            return Decimal::ONE_HUNDRED;
        }
        let pct = self.completed_qty(deduct_scrap) * Decimal::ONE_HUNDRED / self.required_finish_qty;
        pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }

    /// Whether `flag` is set.
    pub fn flag(&self, flag: ActivityFlag) -> bool {
        self.flags.contains(flag)
    }

    /// Sets or clears `flag`. Returns `true` if it changed.
    pub fn set_flag(&mut self, flag: ActivityFlag, value: bool) -> bool {
        self.flags.set(flag, value)
    }

    /// Pins the start to `date`.
    pub fn anchor(&mut self, date: Timestamp) -> bool {
        let moved = self.anchor_date != date;
        self.anchor_date = date;
        let flagged = self.flags.set(ActivityFlag::Anchored, date.is_set());
        moved || flagged
    }

    /// Releases the anchor.
    pub fn unanchor(&mut self) -> bool {
        let changed = self.flags.set(ActivityFlag::Anchored, false);
        self.anchor_date = Timestamp::UNSET;
        changed
    }

    /// Whether the start is pinned.
    pub fn is_anchored(&self) -> bool {
        self.flags.contains(ActivityFlag::Anchored)
    }

    /// Timing of the current placement, cached per cache epoch.
    ///
    /// The need date is the buffer need of the most constraining resource
    /// when the buffer model is calculated, else `operation_need_date`.
    pub fn timing_status(
        &self,
        batch: Option<&Batch>,
        buffer: &BufferInfo,
        operation_need_date: Timestamp,
        finished: bool,
        cache_epoch: u64,
    ) -> TimingStatus {
        self.timing_cache.get_or_compute(cache_epoch, || {
            compute_timing(batch, buffer, operation_need_date, finished)
        })
    }

    /// Drops the cached timing status.
    pub fn invalidate_timing(&self) {
        self.timing_cache.invalidate();
    }

    /// Cost of occupying the given resources for the stage spans.
    pub fn cost(
        &self,
        spans: &dyn Fn(Stage) -> TimeSpan,
        occupied: &[ResourceKey],
        resources: &[Resource],
    ) -> ActivityCost {
        ActivityCost::compute(
            spans(Stage::Setup),
            spans(Stage::Run),
            spans(Stage::PostProcessing),
            occupied,
            resources,
        )
    }
}

/// Rounds to `precision` places and floors at zero.
pub fn round_qty(qty: Decimal, precision: u32) -> Decimal {
    qty.round_dp(precision).max(Decimal::ZERO)
}

fn compute_timing(
    batch: Option<&Batch>,
    buffer: &BufferInfo,
    operation_need_date: Timestamp,
    finished: bool,
) -> TimingStatus {
    if finished {
        return TimingStatus::Finished;
    }
    let Some(batch) = batch else {
        return TimingStatus::NotScheduled;
    };
    let need = buffer.buffer_need().or(operation_need_date);
    if need.is_set() && batch.end > need {
        return TimingStatus::Late;
    }
    let dbr = buffer.dbr_jit_start();
    if dbr.is_set() && batch.start > dbr {
        return TimingStatus::CapacityBottleneck;
    }
    TimingStatus::OnTime
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceBufferInfo;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn base(required: i64) -> BaseActivity {
        BaseActivity::new(ActivityId(1), OperationRef::new(1, 10), Decimal::from(required))
    }

    fn ts(t: i64) -> Timestamp {
        Timestamp::from_ticks(t)
    }

    #[test]
    fn test_base_builder() {
        let a = base(100).with_external_id("WO-1/10");
        assert_eq!(a.id, ActivityId(1));
        assert_eq!(a.external_id, "WO-1/10");
        assert_eq!(a.required_finish_qty(), Decimal::from(100));
        assert!(!a.reported_finish_date().is_set());
        assert_eq!(a.id.to_string(), "A1");
    }

    #[test]
    fn test_required_qty_rounding_and_floor() {
        let mut a = base(0);
        assert!(a.set_required_finish_qty(Decimal::new(123_456, 4), 2));
        assert_eq!(a.required_finish_qty(), Decimal::new(1235, 2));
        assert!(!a.set_required_finish_qty(Decimal::new(12_349, 3), 2));

        assert!(a.set_required_finish_qty(Decimal::from(-5), 2));
        assert_eq!(a.required_finish_qty(), Decimal::ZERO);
        assert_eq!(
            BaseActivity::new(ActivityId(2), OperationRef::default(), Decimal::from(-1))
                .required_finish_qty(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_remaining_qty() {
        let mut a = base(100);
        a.reported_good_qty = Decimal::from(60);
        a.reported_scrap_qty = Decimal::from(10);
        assert_eq!(a.remaining_qty(false), Decimal::from(40));
        assert_eq!(a.remaining_qty(true), Decimal::from(30));

        a.reported_good_qty = Decimal::from(120);
        assert_eq!(a.remaining_qty(false), Decimal::ZERO);
        assert_eq!(a.percent_finished(false), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_remaining_qty_never_negative_randomized() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let mut a = base(rng.random_range(0..1_000));
            a.reported_good_qty = Decimal::from(rng.random_range(0..1_500));
            a.reported_scrap_qty = Decimal::from(rng.random_range(0..200));
            for deduct in [false, true] {
                let expected = (a.required_finish_qty() - a.completed_qty(deduct)).max(Decimal::ZERO);
                assert_eq!(a.remaining_qty(deduct), expected);
                assert!(a.remaining_qty(deduct) >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_percent_finished() {
        let mut a = base(200);
        a.reported_good_qty = Decimal::from(50);
        assert_eq!(a.percent_finished(false), Decimal::from(25));
        assert_eq!(base(0).percent_finished(false), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_anchor() {
        let mut a = base(1);
        assert!(a.anchor(ts(5_000)));
        assert!(a.is_anchored());
        assert!(!a.anchor(ts(5_000)));
        assert!(a.unanchor());
        assert!(!a.is_anchored());
        assert!(!a.anchor_date.is_set());
    }

    #[test]
    fn test_timing_status() {
        let a = base(1);
        let buffer = BufferInfo::new();
        assert_eq!(
            a.timing_status(None, &buffer, ts(1_000), false, 1),
            TimingStatus::NotScheduled
        );

        let batch = Batch::new(1, ts(100), ts(900));
        // Cached under epoch 1 until the epoch moves.
        assert_eq!(
            a.timing_status(Some(&batch), &buffer, ts(1_000), false, 1),
            TimingStatus::NotScheduled
        );
        assert_eq!(
            a.timing_status(Some(&batch), &buffer, ts(1_000), false, 2),
            TimingStatus::OnTime
        );
        assert_eq!(
            a.timing_status(Some(&batch), &buffer, ts(800), false, 3),
            TimingStatus::Late
        );
        assert_eq!(
            a.timing_status(Some(&batch), &buffer, ts(800), true, 4),
            TimingStatus::Finished
        );
    }

    #[test]
    fn test_timing_uses_buffer_need_and_dbr() {
        let a = base(1);
        let mut buffer = BufferInfo::new();
        buffer.update_resource_info(
            ResourceKey(1),
            ResourceBufferInfo::new()
                .with_buffer(ts(2_000), ts(2_000))
                .with_dbr_jit_start(ts(50)),
        );
        buffer.finalize_jit_calculations();

        let batch = Batch::new(1, ts(100), ts(900));
        // Operation need date would make it late; buffer need takes precedence.
        assert_eq!(
            a.timing_status(Some(&batch), &buffer, ts(500), false, 1),
            TimingStatus::CapacityBottleneck
        );
        a.invalidate_timing();
        let early = Batch::new(2, ts(40), ts(900));
        assert_eq!(
            a.timing_status(Some(&early), &buffer, ts(500), false, 1),
            TimingStatus::OnTime
        );
    }

    #[test]
    fn test_cost() {
        let resources = vec![
            Resource::primary(1)
                .with_hourly_cost(Decimal::from(60))
                .with_setup_hourly_cost(Decimal::from(20)),
            Resource::human(2).with_hourly_cost(Decimal::from(30)),
        ];
        let a = base(1);
        let spans = |s: Stage| match s {
            Stage::Setup => TimeSpan::from_minutes(30),
            Stage::Run => TimeSpan::from_hours(2),
            _ => TimeSpan::ZERO,
        };
        let cost = a.cost(&spans, &[ResourceKey(1), ResourceKey(2), ResourceKey(9)], &resources);
        // setup: 0.5h * 80 + 0.5h * 30; run: 2h * 60 + 2h * 30
        assert_eq!(cost.setup, Decimal::from(55));
        assert_eq!(cost.run, Decimal::from(180));
        assert_eq!(cost.total(), Decimal::from(235));
    }
}
