//! Owning-operation model.
//!
//! An activity belongs to one operation, which belongs to one job. The
//! activity only keeps a back-reference ([`OperationRef`]); everything it
//! needs to know about its operation is passed in per call as an
//! [`OperationContext`] snapshot built by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ProductionInfo, StageUsage, Timestamp};

/// Job identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0)
    }
}

/// Operation identifier, unique within its job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OperationId(pub u64);

/// Back-reference from an activity to its operation.
///
/// Relation only; the activity owns nothing through it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct OperationRef {
    /// Owning job.
    pub job_id: JobId,
    /// Owning operation.
    pub operation_id: OperationId,
}

impl OperationRef {
    /// Creates a back-reference.
    pub fn new(job_id: u64, operation_id: u64) -> Self {
        Self {
            job_id: JobId(job_id),
            operation_id: OperationId(operation_id),
        }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/O{}", self.job_id, self.operation_id.0)
    }
}

/// Whether an operation is skipped in its routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OmitStatus {
    /// Part of the routing.
    #[default]
    NotOmitted,
    /// Skipped by a planner.
    OmittedByUser,
    /// Skipped by an alternate-path or routing rule.
    OmittedAutomatically,
}

impl OmitStatus {
    /// Whether the operation is skipped.
    pub fn is_omitted(self) -> bool {
        self != Self::NotOmitted
    }
}

/// What last constrained the operation's earliest start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatestConstraint {
    /// Nothing constrains it.
    #[default]
    None,
    /// The scenario clock.
    Clock,
    /// The job or operation release date.
    ReleaseDate,
    /// An anchor date.
    Anchor,
    /// An unfinished predecessor operation.
    Predecessor,
    /// A material requirement not yet available.
    Material,
    /// Transfer time from a predecessor.
    Transfer,
}

impl LatestConstraint {
    /// Whether the operation is still waiting on upstream work or material.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Predecessor | Self::Material | Self::Transfer)
    }
}

/// Snapshot of the owning operation supplied with each call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Owning job.
    pub job_id: JobId,
    /// Operation identifier.
    pub operation_id: OperationId,
    /// Human-readable name.
    pub name: String,
    /// Whether the operation is skipped.
    pub omitted: OmitStatus,
    /// What last constrained the start.
    pub latest_constraint: LatestConstraint,
    /// Number of resource requirements.
    pub resource_requirement_count: usize,
    /// Which trailing stages occupy the primary resource.
    pub stage_usage: StageUsage,
    /// Standard production parameters.
    pub standard: ProductionInfo,
    /// Date the operation's output is needed.
    pub need_date: Timestamp,
    /// Primary product made by the operation.
    pub primary_product: Option<String>,
}

impl OperationContext {
    /// Creates a context for `op` with defaults.
    pub fn new(op: OperationRef) -> Self {
        Self {
            job_id: op.job_id,
            operation_id: op.operation_id,
            name: String::new(),
            omitted: OmitStatus::NotOmitted,
            latest_constraint: LatestConstraint::None,
            resource_requirement_count: 1,
            stage_usage: StageUsage::default(),
            standard: ProductionInfo::default(),
            need_date: Timestamp::UNSET,
            primary_product: None,
        }
    }

    /// Back-reference to this operation.
    pub fn operation_ref(&self) -> OperationRef {
        OperationRef {
            job_id: self.job_id,
            operation_id: self.operation_id,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the omit status.
    pub fn with_omitted(mut self, omitted: OmitStatus) -> Self {
        self.omitted = omitted;
        self
    }

    /// Sets the latest constraint.
    pub fn with_latest_constraint(mut self, constraint: LatestConstraint) -> Self {
        self.latest_constraint = constraint;
        self
    }

    /// Sets the resource requirement count.
    pub fn with_requirement_count(mut self, count: usize) -> Self {
        self.resource_requirement_count = count;
        self
    }

    /// Sets the stage resource usage.
    pub fn with_stage_usage(mut self, usage: StageUsage) -> Self {
        self.stage_usage = usage;
        self
    }

    /// Sets the standard production info.
    pub fn with_standard(mut self, standard: ProductionInfo) -> Self {
        self.standard = standard;
        self
    }

    /// Sets the need date.
    pub fn with_need_date(mut self, need_date: Timestamp) -> Self {
        self.need_date = need_date;
        self
    }

    /// Sets the primary product.
    pub fn with_primary_product(mut self, product: impl Into<String>) -> Self {
        self.primary_product = Some(product.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_context_builder() {
        let op = OperationContext::new(OperationRef::new(7, 20))
            .with_name("Mill")
            .with_requirement_count(3)
            .with_latest_constraint(LatestConstraint::Material)
            .with_omitted(OmitStatus::OmittedByUser)
            .with_primary_product("WIDGET");

        assert_eq!(op.operation_ref(), OperationRef::new(7, 20));
        assert_eq!(op.resource_requirement_count, 3);
        assert!(op.latest_constraint.is_blocking());
        assert!(op.omitted.is_omitted());
        assert_eq!(op.primary_product.as_deref(), Some("WIDGET"));
    }

    #[test]
    fn test_blocking_constraints() {
        assert!(LatestConstraint::Predecessor.is_blocking());
        assert!(LatestConstraint::Transfer.is_blocking());
        assert!(!LatestConstraint::Clock.is_blocking());
        assert!(!LatestConstraint::None.is_blocking());
    }

    #[test]
    fn test_display() {
        assert_eq!(OperationRef::new(3, 10).to_string(), "J3/O10");
    }
}
