//! Production info: cycle, stage spans and quantity parameters.
//!
//! The owning operation supplies standard values ([`ProductionInfo`]). An
//! activity may override any field individually through
//! [`ProductionInfoOverride`]. Each override carries its own
//! "manual updates only" guard: when set, automated transmissions may not
//! replace that field, while interactive edits still can.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TimeSpan;

/// Standard production parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfo {
    /// Run time per cycle.
    pub cycle_span: TimeSpan,
    /// Setup time.
    pub setup_span: TimeSpan,
    /// Post-processing time.
    pub post_processing_span: TimeSpan,
    /// Clean-out time.
    pub clean_span: TimeSpan,
    /// Storage time.
    pub storage_span: TimeSpan,
    /// Units produced per cycle.
    pub qty_per_cycle: Decimal,
    /// Expected scrap as a percentage of the required quantity (0..=100).
    pub planning_scrap_percent: Decimal,
    /// Quantity that must complete before successors may start.
    pub transfer_qty: Decimal,
}

impl Default for ProductionInfo {
    fn default() -> Self {
        Self {
            cycle_span: TimeSpan::ZERO,
            setup_span: TimeSpan::ZERO,
            post_processing_span: TimeSpan::ZERO,
            clean_span: TimeSpan::ZERO,
            storage_span: TimeSpan::ZERO,
            qty_per_cycle: Decimal::ONE,
            planning_scrap_percent: Decimal::ZERO,
            transfer_qty: Decimal::ZERO,
        }
    }
}

impl ProductionInfo {
    /// Sets the cycle span.
    pub fn with_cycle_span(mut self, span: TimeSpan) -> Self {
        self.cycle_span = span;
        self
    }

    /// Sets the setup span.
    pub fn with_setup_span(mut self, span: TimeSpan) -> Self {
        self.setup_span = span;
        self
    }

    /// Sets the post-processing span.
    pub fn with_post_processing_span(mut self, span: TimeSpan) -> Self {
        self.post_processing_span = span;
        self
    }

    /// Sets the clean span.
    pub fn with_clean_span(mut self, span: TimeSpan) -> Self {
        self.clean_span = span;
        self
    }

    /// Sets the storage span.
    pub fn with_storage_span(mut self, span: TimeSpan) -> Self {
        self.storage_span = span;
        self
    }

    /// Sets quantity per cycle.
    pub fn with_qty_per_cycle(mut self, qty: Decimal) -> Self {
        self.qty_per_cycle = qty;
        self
    }

    /// Sets the planning scrap percentage, clamped to 0..=100.
    pub fn with_planning_scrap_percent(mut self, percent: Decimal) -> Self {
        self.planning_scrap_percent = clamp_percent(percent);
        self
    }

    /// Sets the transfer quantity.
    pub fn with_transfer_qty(mut self, qty: Decimal) -> Self {
        self.transfer_qty = qty;
        self
    }

    /// Scrap expected when producing `required_qty`.
    pub fn expected_scrap(&self, required_qty: Decimal) -> Decimal {
        required_qty * self.planning_scrap_percent / Decimal::ONE_HUNDRED
    }

    /// Run time needed for `qty` units (whole cycles).
    pub fn run_span_for(&self, qty: Decimal) -> TimeSpan {
        if self.qty_per_cycle <= Decimal::ZERO || qty <= Decimal::ZERO {
            return TimeSpan::ZERO;
        }
        let cycles = (qty / self.qty_per_cycle).ceil();
        let cycles = i64::try_from(cycles).unwrap_or(i64::MAX);
        TimeSpan::from_ticks(self.cycle_span.ticks().saturating_mul(cycles))
    }
}

/// Clamps a percentage to 0..=100.
pub fn clamp_percent(percent: Decimal) -> Decimal {
    percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

// ================================
// Overrides
// ================================

/// One overridable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overridable<T> {
    /// Override value; `None` falls back to the standard value.
    pub value: Option<T>,
    /// Only interactive edits may change this field.
    pub manual_updates_only: bool,
}

impl<T> Default for Overridable<T> {
    fn default() -> Self {
        Self {
            value: None,
            manual_updates_only: false,
        }
    }
}

impl<T: Copy> Overridable<T> {
    /// The override, or `standard` when not overridden.
    pub fn resolve(&self, standard: T) -> T {
        self.value.unwrap_or(standard)
    }
}

/// Identifies one field of [`ProductionInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductionInfoField {
    /// [`ProductionInfo::cycle_span`].
    CycleSpan,
    /// [`ProductionInfo::setup_span`].
    SetupSpan,
    /// [`ProductionInfo::post_processing_span`].
    PostProcessingSpan,
    /// [`ProductionInfo::clean_span`].
    CleanSpan,
    /// [`ProductionInfo::storage_span`].
    StorageSpan,
    /// [`ProductionInfo::qty_per_cycle`].
    QtyPerCycle,
    /// [`ProductionInfo::planning_scrap_percent`].
    PlanningScrapPercent,
    /// [`ProductionInfo::transfer_qty`].
    TransferQty,
}

impl ProductionInfoField {
    /// Every field, in persisted order.
    pub const ALL: [ProductionInfoField; 8] = [
        Self::CycleSpan,
        Self::SetupSpan,
        Self::PostProcessingSpan,
        Self::CleanSpan,
        Self::StorageSpan,
        Self::QtyPerCycle,
        Self::PlanningScrapPercent,
        Self::TransferQty,
    ];
}

/// Per-field overrides of [`ProductionInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfoOverride {
    /// Cycle span override.
    pub cycle_span: Overridable<TimeSpan>,
    /// Setup span override.
    pub setup_span: Overridable<TimeSpan>,
    /// Post-processing span override.
    pub post_processing_span: Overridable<TimeSpan>,
    /// Clean span override.
    pub clean_span: Overridable<TimeSpan>,
    /// Storage span override.
    pub storage_span: Overridable<TimeSpan>,
    /// Quantity-per-cycle override.
    pub qty_per_cycle: Overridable<Decimal>,
    /// Planning scrap percent override.
    pub planning_scrap_percent: Overridable<Decimal>,
    /// Transfer quantity override.
    pub transfer_qty: Overridable<Decimal>,
}

/// Either kind of override value, for field-generic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoValue {
    /// A span field.
    Span(TimeSpan),
    /// A quantity or percentage field.
    Qty(Decimal),
}

impl ProductionInfoOverride {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cycle span.
    pub fn with_cycle_span(mut self, span: TimeSpan) -> Self {
        self.cycle_span.value = Some(span);
        self
    }

    /// Overrides the setup span.
    pub fn with_setup_span(mut self, span: TimeSpan) -> Self {
        self.setup_span.value = Some(span);
        self
    }

    /// Overrides quantity per cycle.
    pub fn with_qty_per_cycle(mut self, qty: Decimal) -> Self {
        self.qty_per_cycle.value = Some(qty);
        self
    }

    /// Overrides the planning scrap percent, clamped to 0..=100.
    pub fn with_planning_scrap_percent(mut self, percent: Decimal) -> Self {
        self.planning_scrap_percent.value = Some(clamp_percent(percent));
        self
    }

    /// Sets the manual-updates-only guard of `field`.
    pub fn with_manual_only(mut self, field: ProductionInfoField) -> Self {
        self.set_manual_only(field, true);
        self
    }

    /// Reads one field's override value.
    pub fn get(&self, field: ProductionInfoField) -> Option<InfoValue> {
        use ProductionInfoField as F;
        match field {
            F::CycleSpan => self.cycle_span.value.map(InfoValue::Span),
            F::SetupSpan => self.setup_span.value.map(InfoValue::Span),
            F::PostProcessingSpan => self.post_processing_span.value.map(InfoValue::Span),
            F::CleanSpan => self.clean_span.value.map(InfoValue::Span),
            F::StorageSpan => self.storage_span.value.map(InfoValue::Span),
            F::QtyPerCycle => self.qty_per_cycle.value.map(InfoValue::Qty),
            F::PlanningScrapPercent => self.planning_scrap_percent.value.map(InfoValue::Qty),
            F::TransferQty => self.transfer_qty.value.map(InfoValue::Qty),
        }
    }

    /// Writes one field's override value. Returns `true` if it changed.
    ///
    /// A value of the wrong kind for `field` is ignored.
    pub fn set(&mut self, field: ProductionInfoField, value: Option<InfoValue>) -> bool {
        use ProductionInfoField as F;
        fn put<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
            if *slot == value {
                return false;
            }
            *slot = value;
            true
        }
        let span = |v: Option<InfoValue>| match v {
            Some(InfoValue::Span(s)) => Ok(Some(s)),
            None => Ok(None),
            Some(InfoValue::Qty(_)) => Err(()),
        };
        let qty = |v: Option<InfoValue>| match v {
            Some(InfoValue::Qty(q)) => Ok(Some(q)),
            None => Ok(None),
            Some(InfoValue::Span(_)) => Err(()),
        };
        match field {
            F::CycleSpan => span(value).is_ok_and(|v| put(&mut self.cycle_span.value, v)),
            F::SetupSpan => span(value).is_ok_and(|v| put(&mut self.setup_span.value, v)),
            F::PostProcessingSpan => {
                span(value).is_ok_and(|v| put(&mut self.post_processing_span.value, v))
            }
            F::CleanSpan => span(value).is_ok_and(|v| put(&mut self.clean_span.value, v)),
            F::StorageSpan => span(value).is_ok_and(|v| put(&mut self.storage_span.value, v)),
            F::QtyPerCycle => qty(value).is_ok_and(|v| put(&mut self.qty_per_cycle.value, v)),
            F::PlanningScrapPercent => qty(value).is_ok_and(|v| {
                put(&mut self.planning_scrap_percent.value, v.map(clamp_percent))
            }),
            F::TransferQty => qty(value).is_ok_and(|v| put(&mut self.transfer_qty.value, v)),
        }
    }

    /// Whether `field` only accepts interactive edits.
    pub fn is_manual_only(&self, field: ProductionInfoField) -> bool {
        use ProductionInfoField as F;
        match field {
            F::CycleSpan => self.cycle_span.manual_updates_only,
            F::SetupSpan => self.setup_span.manual_updates_only,
            F::PostProcessingSpan => self.post_processing_span.manual_updates_only,
            F::CleanSpan => self.clean_span.manual_updates_only,
            F::StorageSpan => self.storage_span.manual_updates_only,
            F::QtyPerCycle => self.qty_per_cycle.manual_updates_only,
            F::PlanningScrapPercent => self.planning_scrap_percent.manual_updates_only,
            F::TransferQty => self.transfer_qty.manual_updates_only,
        }
    }

    /// Sets the manual-updates-only guard of `field`.
    pub fn set_manual_only(&mut self, field: ProductionInfoField, manual_only: bool) {
        use ProductionInfoField as F;
        let slot = match field {
            F::CycleSpan => &mut self.cycle_span.manual_updates_only,
            F::SetupSpan => &mut self.setup_span.manual_updates_only,
            F::PostProcessingSpan => &mut self.post_processing_span.manual_updates_only,
            F::CleanSpan => &mut self.clean_span.manual_updates_only,
            F::StorageSpan => &mut self.storage_span.manual_updates_only,
            F::QtyPerCycle => &mut self.qty_per_cycle.manual_updates_only,
            F::PlanningScrapPercent => &mut self.planning_scrap_percent.manual_updates_only,
            F::TransferQty => &mut self.transfer_qty.manual_updates_only,
        };
        *slot = manual_only;
    }

    /// Whether any field is overridden.
    pub fn is_overridden(&self) -> bool {
        ProductionInfoField::ALL
            .iter()
            .any(|f| self.get(*f).is_some())
    }

    /// Effective values: overrides on top of `standard`.
    pub fn effective(&self, standard: &ProductionInfo) -> ProductionInfo {
        ProductionInfo {
            cycle_span: self.cycle_span.resolve(standard.cycle_span),
            setup_span: self.setup_span.resolve(standard.setup_span),
            post_processing_span: self
                .post_processing_span
                .resolve(standard.post_processing_span),
            clean_span: self.clean_span.resolve(standard.clean_span),
            storage_span: self.storage_span.resolve(standard.storage_span),
            qty_per_cycle: self.qty_per_cycle.resolve(standard.qty_per_cycle),
            planning_scrap_percent: self
                .planning_scrap_percent
                .resolve(standard.planning_scrap_percent),
            transfer_qty: self.transfer_qty.resolve(standard.transfer_qty),
        }
    }

    /// Interactive edit: copies every value and guard from `source`.
    ///
    /// Guards do not apply here; the user is editing the record directly.
    /// Returns `true` if anything changed.
    pub fn copy_all_from(&mut self, source: &ProductionInfoOverride) -> bool {
        if self == source {
            return false;
        }
        *self = source.clone();
        true
    }

    /// Automated update: applies each value `source` carries unless this
    /// record guards that field. Absent values leave the field untouched.
    ///
    /// Returns the fields that changed.
    pub fn merge_external(&mut self, source: &ProductionInfoOverride) -> Vec<ProductionInfoField> {
        let mut changed = Vec::new();
        for field in ProductionInfoField::ALL {
            let Some(value) = source.get(field) else {
                continue;
            };
            if self.is_manual_only(field) {
                continue;
            }
            if self.set(field, Some(value)) {
                changed.push(field);
            }
        }
        changed
    }
}
