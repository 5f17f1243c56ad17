//! Drum-buffer-rope / just-in-time timing model.
//!
//! Each eligible resource gets its own [`ResourceBufferInfo`]: when the
//! buffer ends, when material is needed, and when work must be released so
//! the constraint resource (the drum) is never starved. After every
//! per-resource record has been computed, [`BufferInfo::finalize_jit_calculations`]
//! picks the most constraining one: the record whose DBR-JIT start is earliest.
//!
//! # Tie-break
//! Records are keyed by [`ResourceKey`] in a `BTreeMap`. The scan keeps the
//! first record with a strictly smaller DBR-JIT start, so equal dates resolve
//! to the lowest resource key.
//!
//! # Reference
//! Goldratt & Cox (1984), "The Goal"; Schragenheim & Dettmer (2000),
//! "Manufacturing at Warp Speed" (buffer management)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ResourceKey, TimeSpan, Timestamp};
use crate::validation::ValidationError;

/// Buffer and JIT dates for one eligible resource.
///
/// Unset dates use [`Timestamp::UNSET`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBufferInfo {
    /// End of the time buffer protecting the need date.
    pub buffer_end: Timestamp,
    /// Date the output is needed downstream.
    pub buffer_need: Timestamp,
    /// Latest start that still protects the drum.
    pub dbr_jit_start: Timestamp,
    /// End of the head-start window in which sequencing may pull work early.
    pub sequence_head_start_window_end: Timestamp,
    /// Date the work is released to the floor.
    pub release_date: Timestamp,
    /// Dynamic buffer length; `None` when it could not be computed.
    dynamic_buffer: Option<TimeSpan>,
    /// Plain JIT start (ignoring the drum).
    pub jit_start: Timestamp,
    /// JIT start including transfer time from predecessors.
    pub jit_transfer_start: Timestamp,
}

impl ResourceBufferInfo {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer end and need dates.
    pub fn with_buffer(mut self, buffer_end: Timestamp, buffer_need: Timestamp) -> Self {
        self.buffer_end = buffer_end;
        self.buffer_need = buffer_need;
        self
    }

    /// Sets the DBR-JIT start.
    pub fn with_dbr_jit_start(mut self, start: Timestamp) -> Self {
        self.dbr_jit_start = start;
        self
    }

    /// Sets the plain and transfer JIT starts.
    pub fn with_jit_start(mut self, jit_start: Timestamp, jit_transfer_start: Timestamp) -> Self {
        self.jit_start = jit_start;
        self.jit_transfer_start = jit_transfer_start;
        self
    }

    /// Sets the release date.
    pub fn with_release_date(mut self, release: Timestamp) -> Self {
        self.release_date = release;
        self
    }

    /// Sets the head-start window end.
    pub fn with_head_start_window_end(mut self, end: Timestamp) -> Self {
        self.sequence_head_start_window_end = end;
        self
    }

    /// Sets the dynamic buffer. Negative lengths are invalid.
    pub fn with_dynamic_buffer(mut self, buffer: TimeSpan) -> Result<Self, ValidationError> {
        self.set_dynamic_buffer(buffer)?;
        Ok(self)
    }

    /// Sets the dynamic buffer. Negative lengths are invalid and leave the
    /// previous value in place.
    pub fn set_dynamic_buffer(&mut self, buffer: TimeSpan) -> Result<(), ValidationError> {
        if buffer.is_negative() {
            return Err(ValidationError::invalid_dynamic_buffer(buffer));
        }
        self.dynamic_buffer = Some(buffer);
        Ok(())
    }

    /// Marks the dynamic buffer as not computed.
    pub fn clear_dynamic_buffer(&mut self) {
        self.dynamic_buffer = None;
    }

    /// Dynamic buffer length, if computed.
    pub fn dynamic_buffer(&self) -> Option<TimeSpan> {
        self.dynamic_buffer
    }

    /// Whether the DBR-JIT start has been computed.
    pub fn is_dbr_jit_calculated(&self) -> bool {
        self.dbr_jit_start.is_set()
    }

    /// Share of the dynamic buffer already consumed at `now`, in 0..=100.
    ///
    /// The buffer starts at `buffer_need - dynamic_buffer`. Before that the
    /// penetration is 0; at or past the need date it is 100.
    pub fn buffer_penetration_percent(&self, now: Timestamp) -> Option<rust_decimal::Decimal> {
        use rust_decimal::Decimal;
        let buffer = self.dynamic_buffer?;
        if !self.buffer_need.is_set() {
            return None;
        }
        if !buffer.is_positive() {
            let pct = if now >= self.buffer_need {
                Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };
            return Some(pct);
        }
        let buffer_start = self.buffer_need - buffer;
        let consumed = now - buffer_start;
        let pct = Decimal::from(consumed.ticks()) * Decimal::ONE_HUNDRED
            / Decimal::from(buffer.ticks());
        Some(pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }
}

/// The earliest (most constraining) record after finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarliestBuffer {
    /// Resource the record belongs to.
    pub resource: ResourceKey,
    /// The selected record.
    pub info: ResourceBufferInfo,
}

/// Per-resource buffer records plus the aggregate "earliest" selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    per_resource: BTreeMap<ResourceKey, ResourceBufferInfo>,
    earliest: Option<EarliestBuffer>,
}

impl BufferInfo {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `resource`.
    pub fn update_resource_info(&mut self, resource: ResourceKey, info: ResourceBufferInfo) {
        self.per_resource.insert(resource, info);
    }

    /// Record for `resource`.
    pub fn resource_info(&self, resource: ResourceKey) -> Option<&ResourceBufferInfo> {
        self.per_resource.get(&resource)
    }

    /// Iterates records in resource-key order.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceKey, &ResourceBufferInfo)> + '_ {
        self.per_resource.iter().map(|(k, v)| (*k, v))
    }

    /// Number of per-resource records.
    pub fn resource_count(&self) -> usize {
        self.per_resource.len()
    }

    /// Drops the record for a deleted resource. The aggregate is cleared when
    /// it pointed at that resource.
    pub fn remove_resource(&mut self, resource: ResourceKey) -> bool {
        let removed = self.per_resource.remove(&resource).is_some();
        if self.earliest.is_some_and(|e| e.resource == resource) {
            self.earliest = None;
        }
        removed
    }

    /// Selects the record with the smallest computed DBR-JIT start.
    ///
    /// Records without a computed DBR-JIT start are skipped. When none
    /// qualifies the aggregate stays "not calculated".
    pub fn finalize_jit_calculations(&mut self) {
        let mut best: Option<EarliestBuffer> = None;
        for (resource, info) in &self.per_resource {
            if !info.is_dbr_jit_calculated() {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => info.dbr_jit_start < b.info.dbr_jit_start,
            };
            if better {
                best = Some(EarliestBuffer {
                    resource: *resource,
                    info: *info,
                });
            }
        }
        self.earliest = best;
    }

    /// Clears all per-resource state and the aggregate.
    pub fn reset(&mut self) {
        self.per_resource.clear();
        self.earliest = None;
    }

    /// The aggregate selection; `None` means "not calculated".
    pub fn earliest(&self) -> Option<&EarliestBuffer> {
        self.earliest.as_ref()
    }

    /// Whether the aggregate has been calculated.
    pub fn is_calculated(&self) -> bool {
        self.earliest.is_some()
    }

    /// DBR-JIT start of the most constraining resource.
    pub fn dbr_jit_start(&self) -> Timestamp {
        self.earliest
            .map(|e| e.info.dbr_jit_start)
            .unwrap_or(Timestamp::UNSET)
    }

    /// Date the work must be released.
    pub fn release_date(&self) -> Timestamp {
        self.earliest
            .map(|e| e.info.release_date)
            .unwrap_or(Timestamp::UNSET)
    }

    /// Need date of the most constraining resource.
    pub fn buffer_need(&self) -> Timestamp {
        self.earliest
            .map(|e| e.info.buffer_need)
            .unwrap_or(Timestamp::UNSET)
    }

    /// Whether the release point has already passed at `now`.
    pub fn is_release_overdue(&self, now: Timestamp) -> bool {
        let start = self.dbr_jit_start();
        start.is_set() && start < now
    }

    pub(crate) fn restore(
        per_resource: BTreeMap<ResourceKey, ResourceBufferInfo>,
        earliest: Option<EarliestBuffer>,
    ) -> Self {
        Self {
            per_resource,
            earliest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal::Decimal;

    fn ts(t: i64) -> Timestamp {
        Timestamp::from_ticks(t)
    }

    fn info(dbr: i64) -> ResourceBufferInfo {
        ResourceBufferInfo::new().with_dbr_jit_start(ts(dbr))
    }

    #[test]
    fn test_finalize_selects_minimum() {
        let mut b = BufferInfo::new();
        b.update_resource_info(ResourceKey(1), info(500));
        b.update_resource_info(ResourceKey(2), info(200));
        b.update_resource_info(ResourceKey(3), info(900));
        b.finalize_jit_calculations();

        let e = b.earliest().unwrap();
        assert_eq!(e.resource, ResourceKey(2));
        assert_eq!(b.dbr_jit_start(), ts(200));
    }

    #[test]
    fn test_finalize_skips_uncalculated() {
        let mut b = BufferInfo::new();
        b.update_resource_info(ResourceKey(1), ResourceBufferInfo::new());
        b.update_resource_info(ResourceKey(2), info(700));
        b.finalize_jit_calculations();
        assert_eq!(b.earliest().unwrap().resource, ResourceKey(2));
    }

    #[test]
    fn test_finalize_none_calculated() {
        let mut b = BufferInfo::new();
        b.update_resource_info(ResourceKey(1), ResourceBufferInfo::new());
        b.finalize_jit_calculations();
        assert!(!b.is_calculated());
        assert!(!b.dbr_jit_start().is_set());

        let mut empty = BufferInfo::new();
        empty.finalize_jit_calculations();
        assert!(empty.earliest().is_none());
    }

    #[test]
    fn test_tie_keeps_lowest_resource_key() {
        let mut b = BufferInfo::new();
        b.update_resource_info(ResourceKey(9), info(300));
        b.update_resource_info(ResourceKey(4), info(300));
        b.update_resource_info(ResourceKey(6), info(300));
        b.finalize_jit_calculations();
        assert_eq!(b.earliest().unwrap().resource, ResourceKey(4));
    }

    #[test]
    fn test_finalize_matches_minimum_randomized() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut b = BufferInfo::new();
            let n = rng.random_range(0..12);
            let mut expected: Option<i64> = None;
            for r in 0..n {
                let calculated = rng.random_bool(0.7);
                let date = rng.random_range(1..10_000i64);
                let rec = if calculated {
                    expected = Some(expected.map_or(date, |m| m.min(date)));
                    info(date)
                } else {
                    ResourceBufferInfo::new()
                };
                b.update_resource_info(ResourceKey(r), rec);
            }
            b.finalize_jit_calculations();
            assert_eq!(b.earliest().map(|e| e.info.dbr_jit_start.ticks()), expected);
        }
    }

    #[test]
    fn test_reset_and_remove() {
        let mut b = BufferInfo::new();
        b.update_resource_info(ResourceKey(1), info(100));
        b.update_resource_info(ResourceKey(2), info(200));
        b.finalize_jit_calculations();

        assert!(b.remove_resource(ResourceKey(1)));
        assert!(!b.is_calculated());
        assert_eq!(b.resource_count(), 1);

        b.reset();
        assert_eq!(b.resource_count(), 0);
        assert!(b.earliest().is_none());
    }

    #[test]
    fn test_dynamic_buffer_rejects_negative() {
        let mut rec = ResourceBufferInfo::new();
        assert!(rec.set_dynamic_buffer(TimeSpan::from_hours(-1)).is_err());
        assert_eq!(rec.dynamic_buffer(), None);
        rec.set_dynamic_buffer(TimeSpan::from_hours(4)).unwrap();
        assert_eq!(rec.dynamic_buffer(), Some(TimeSpan::from_hours(4)));
    }

    #[test]
    fn test_buffer_penetration() {
        let need = ts(TimeSpan::from_days(10).ticks());
        let rec = ResourceBufferInfo::new()
            .with_buffer(need, need)
            .with_dynamic_buffer(TimeSpan::from_hours(10))
            .unwrap();

        let half = need - TimeSpan::from_hours(5);
        assert_eq!(rec.buffer_penetration_percent(half), Some(Decimal::from(50)));
        let before = need - TimeSpan::from_hours(20);
        assert_eq!(rec.buffer_penetration_percent(before), Some(Decimal::ZERO));
        let after = need + TimeSpan::from_hours(3);
        assert_eq!(
            rec.buffer_penetration_percent(after),
            Some(Decimal::ONE_HUNDRED)
        );
        assert_eq!(ResourceBufferInfo::new().buffer_penetration_percent(half), None);
    }

    #[test]
    fn test_release_overdue() {
        let mut b = BufferInfo::new();
        assert!(!b.is_release_overdue(ts(1000)));
        b.update_resource_info(ResourceKey(1), info(500).with_release_date(ts(450)));
        b.finalize_jit_calculations();
        assert!(b.is_release_overdue(ts(1000)));
        assert!(!b.is_release_overdue(ts(400)));
        assert_eq!(b.release_date(), ts(450));
    }
}
