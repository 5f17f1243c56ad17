//! Change tracking for downstream notification.
//!
//! Reconciliation flags which jobs had constraint, production or eligibility
//! relevant fields change. The host drains these sets after a batch of
//! updates and re-evaluates successors, material requirements and resource
//! eligibility. The core does not know what those re-evaluations are.

use std::collections::BTreeSet;

use crate::models::JobId;

/// Category of a field change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    /// Affects when successors may start.
    Constraint,
    /// Affects reported production.
    Production,
    /// Affects which resources may run the activity.
    Eligibility,
}

/// Jobs flagged for re-evaluation, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataChanges {
    constraint: BTreeSet<JobId>,
    production: BTreeSet<JobId>,
    eligibility: BTreeSet<JobId>,
}

impl DataChanges {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags a constraint-relevant change.
    pub fn flag_constraint_changes(&mut self, job: JobId) {
        self.constraint.insert(job);
    }

    /// Flags a production-relevant change.
    pub fn flag_production_changes(&mut self, job: JobId) {
        self.production.insert(job);
    }

    /// Flags an eligibility-relevant change.
    pub fn flag_eligibility_changes(&mut self, job: JobId) {
        self.eligibility.insert(job);
    }

    /// Flags `job` under `category`.
    pub fn flag(&mut self, category: ChangeCategory, job: JobId) {
        match category {
            ChangeCategory::Constraint => self.flag_constraint_changes(job),
            ChangeCategory::Production => self.flag_production_changes(job),
            ChangeCategory::Eligibility => self.flag_eligibility_changes(job),
        }
    }

    /// Whether `job` is flagged under `category`.
    pub fn is_flagged(&self, category: ChangeCategory, job: JobId) -> bool {
        match category {
            ChangeCategory::Constraint => self.constraint.contains(&job),
            ChangeCategory::Production => self.production.contains(&job),
            ChangeCategory::Eligibility => self.eligibility.contains(&job),
        }
    }

    /// Jobs flagged for constraint changes.
    pub fn constraint_changes(&self) -> &BTreeSet<JobId> {
        &self.constraint
    }

    /// Jobs flagged for production changes.
    pub fn production_changes(&self) -> &BTreeSet<JobId> {
        &self.production
    }

    /// Jobs flagged for eligibility changes.
    pub fn eligibility_changes(&self) -> &BTreeSet<JobId> {
        &self.eligibility
    }

    /// Whether anything is flagged and not yet drained.
    pub fn has_pending_changes(&self) -> bool {
        !(self.constraint.is_empty() && self.production.is_empty() && self.eligibility.is_empty())
    }

    /// Adds every flag of `other`.
    pub fn merge(&mut self, other: &DataChanges) {
        self.constraint.extend(other.constraint.iter().copied());
        self.production.extend(other.production.iter().copied());
        self.eligibility.extend(other.eligibility.iter().copied());
    }

    /// Clears every flag.
    pub fn clear(&mut self) {
        self.constraint.clear();
        self.production.clear();
        self.eligibility.clear();
    }
}
