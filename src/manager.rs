//! Ordered activity set.
//!
//! [`ActivityManager`] owns the activities of one operation. Lookup by ID is
//! `O(1)`; enumeration is always in ascending ID order. It also owns the
//! split lifecycle: splitting carves part of an activity's required
//! quantity into a new sibling, un-splitting folds a sibling back.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::error::{ActivityError, Result};
use crate::models::{
    ActivityId, InternalActivity, OperationContext, OperationRef, ResourceKey, Stage,
    StatusCategory,
};
use crate::validation::ValidationError;

/// Activities grouped by production phase.
#[derive(Debug, Default)]
pub struct PhasePartition<'a> {
    /// Waiting, Ready, Started.
    pub pre_production: Vec<&'a InternalActivity>,
    /// Occupying a resource.
    pub production: Vec<&'a InternalActivity>,
    /// Finished, or in a stage that no longer occupies the resource.
    pub post_production: Vec<&'a InternalActivity>,
}

/// Ordered collection of activities keyed by ID.
#[derive(Debug, Clone, Default)]
pub struct ActivityManager {
    activities: HashMap<ActivityId, InternalActivity>,
    order: Vec<ActivityId>,
    next_id: u64,
    next_split_id: u64,
}

impl ActivityManager {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_split_id: 1,
            ..Self::default()
        }
    }

    /// Adds an activity.
    ///
    /// # Errors
    /// Fails if an activity with the same ID exists.
    pub fn add(&mut self, activity: InternalActivity) -> Result<()> {
        let id = activity.id();
        let Err(pos) = self.order.binary_search(&id) else {
            return Err(ValidationError::duplicate_id(id).into());
        };
        self.order.insert(pos, id);
        self.next_id = self.next_id.max(id.0 + 1);
        if let Some(split) = activity.split_id {
            self.next_split_id = self.next_split_id.max(split + 1);
        }
        self.activities.insert(id, activity);
        Ok(())
    }

    /// Creates an activity with the next free ID.
    pub fn create(&mut self, operation: OperationRef, required_qty: Decimal) -> ActivityId {
        let id = self.next_id();
        let activity = InternalActivity::new(id, operation, required_qty);
        self.order.push(id);
        self.activities.insert(id, activity);
        self.next_id = id.0 + 1;
        id
    }

    /// The ID [`create`](Self::create) will assign next.
    pub fn next_id(&self) -> ActivityId {
        ActivityId(self.next_id.max(1))
    }

    /// Removes an activity.
    pub fn remove(&mut self, id: ActivityId) -> Option<InternalActivity> {
        let activity = self.activities.remove(&id)?;
        if let Ok(pos) = self.order.binary_search(&id) {
            self.order.remove(pos);
        }
        Some(activity)
    }

    /// Looks up by ID.
    pub fn get(&self, id: ActivityId) -> Option<&InternalActivity> {
        self.activities.get(&id)
    }

    /// Looks up by ID, mutably.
    pub fn get_mut(&mut self, id: ActivityId) -> Option<&mut InternalActivity> {
        self.activities.get_mut(&id)
    }

    /// Looks up by ID or fails with [`ActivityError::NotFound`].
    pub fn require_mut(&mut self, id: ActivityId) -> Result<&mut InternalActivity> {
        self.activities
            .get_mut(&id)
            .ok_or(ActivityError::NotFound(id))
    }

    /// Whether `id` is present.
    pub fn contains(&self, id: ActivityId) -> bool {
        self.activities.contains_key(&id)
    }

    /// Linear search by external ID.
    pub fn find_by_external_id(&self, external_id: &str) -> Option<&InternalActivity> {
        self.iter().find(|a| a.base.external_id == external_id)
    }

    /// ID of the activity with `external_id`.
    pub fn id_by_external_id(&self, external_id: &str) -> Option<ActivityId> {
        self.find_by_external_id(external_id).map(|a| a.id())
    }

    /// Number of activities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Activities in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &InternalActivity> + '_ {
        self.order.iter().filter_map(|id| self.activities.get(id))
    }

    /// IDs in ascending order.
    pub fn ids(&self) -> &[ActivityId] {
        &self.order
    }

    /// Applies `f` to every activity in ID order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut InternalActivity)) {
        for id in &self.order {
            if let Some(a) = self.activities.get_mut(id) {
                f(a);
            }
        }
    }

    /// Groups activities by production phase in one pass.
    pub fn partition_by_phase(&self, operation: &OperationContext) -> PhasePartition<'_> {
        let mut phases = PhasePartition::default();
        for a in self.iter() {
            match a.status_category(operation) {
                StatusCategory::PreProduction => phases.pre_production.push(a),
                StatusCategory::Production => phases.production.push(a),
                StatusCategory::PostProduction => phases.post_production.push(a),
            }
        }
        phases
    }

    // ================================
    // Roll-ups
    // ================================

    /// Sum of reported good quantities.
    pub fn total_reported_finish_qty(&self) -> Decimal {
        self.iter().map(|a| a.base.reported_good_qty).sum()
    }

    /// Sum of required quantities.
    pub fn total_required_finish_qty(&self) -> Decimal {
        self.iter().map(|a| a.base.required_finish_qty()).sum()
    }

    /// Sum of per-activity remaining quantities.
    ///
    /// Each member is clamped at zero first, so an over-reported activity
    /// does not offset an under-reported one.
    pub fn remaining_production_qty(&self, deduct_scrap: bool) -> Decimal {
        self.iter().map(|a| a.base.remaining_qty(deduct_scrap)).sum()
    }

    // ================================
    // Resources
    // ================================

    /// Purges a deleted resource from every activity.
    ///
    /// Returns how many activities referenced it.
    pub fn resource_deleted(&mut self, resource: ResourceKey) -> usize {
        let mut touched = 0;
        self.for_each_mut(|a| {
            if a.resource_deleted(resource) {
                touched += 1;
            }
        });
        touched
    }

    /// Drops lock indices at or past `requirement_count` in every activity.
    ///
    /// Returns the total number of locks dropped.
    pub fn sync_resource_requirements(&mut self, requirement_count: usize) -> usize {
        let mut dropped = 0;
        self.for_each_mut(|a| dropped += a.sync_resource_requirements(requirement_count).len());
        dropped
    }

    /// Drops every cached value.
    pub fn invalidate_caches(&self) {
        for a in self.iter() {
            a.invalidate_caches();
        }
    }

    // ================================
    // Split lifecycle
    // ================================

    /// Moves `qty` of `source`'s required quantity into a new sibling.
    ///
    /// The sibling copies the source's production settings, starts in
    /// `Waiting` and shares the source's split group.
    ///
    /// # Errors
    /// Fails if `source` is missing or `qty` is not strictly between zero
    /// and the source's required quantity.
    pub fn split(&mut self, source: ActivityId, qty: Decimal, precision: u32) -> Result<ActivityId> {
        let new_id = self.next_id();
        let group = self.next_split_id;
        let src = self.require_mut(source)?;
        let required = src.base.required_finish_qty();
        if qty <= Decimal::ZERO || qty >= required {
            return Err(ValidationError::split_quantity_out_of_range(source, qty, required).into());
        }

        let split_id = *src.split_id.get_or_insert(group);
        src.base.set_required_finish_qty(required - qty, precision);
        src.invalidate_caches();

        let mut sibling = InternalActivity::new(new_id, src.base.operation, Decimal::ZERO);
        sibling.base.set_required_finish_qty(qty, precision);
        sibling.production_info = src.production_info.clone();
        sibling.resource_production_info = src.resource_production_info.clone();
        sibling.people_usage = src.people_usage;
        sibling.nbr_of_people = src.nbr_of_people;
        sibling.split_id = Some(split_id);

        if split_id == group {
            self.next_split_id += 1;
        }
        info!(source = %source, sibling = %new_id, %qty, split_id, "activity split");
        self.add(sibling)?;
        Ok(new_id)
    }

    /// Folds a split sibling back into its group's source (lowest ID).
    ///
    /// Required and reported quantities and reported stage time are added
    /// to the source; the sibling is removed. Returns the source's ID.
    ///
    /// # Errors
    /// Fails if `id` is missing, has no split group, or is the group source.
    pub fn unsplit(&mut self, id: ActivityId, precision: u32) -> Result<ActivityId> {
        let sibling = self.get(id).ok_or(ActivityError::NotFound(id))?;
        let group = sibling.split_id.ok_or(ValidationError::not_a_split(id))?;
        let source = self
            .iter()
            .find(|a| a.split_id == Some(group))
            .map(|a| a.id())
            .filter(|s| *s != id)
            .ok_or(ValidationError::not_a_split(id))?;

        let sibling = self.remove(id).ok_or(ActivityError::NotFound(id))?;
        let src = self.require_mut(source)?;
        let required = src.base.required_finish_qty() + sibling.base.required_finish_qty();
        src.base.set_required_finish_qty(required, precision);
        src.base.reported_good_qty += sibling.base.reported_good_qty;
        src.base.reported_scrap_qty += sibling.base.reported_scrap_qty;
        for stage in Stage::ALL {
            let span = src.reported.span(stage) + sibling.reported.span(stage);
            src.reported.set_span(stage, span);
        }
        src.invalidate_caches();

        let remaining = self.iter().filter(|a| a.split_id == Some(group)).count();
        if remaining == 1 {
            if let Some(src) = self.get_mut(source) {
                src.split_id = None;
            }
        }
        info!(source = %source, sibling = %id, "activity unsplit");
        Ok(source)
    }
}
