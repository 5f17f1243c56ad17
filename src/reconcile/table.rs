//! The merge table.
//!
//! One row per mergeable field: whether the manual-update-only policy guards
//! it, whether it honours incremental updates, and which change category a
//! change flags. The merge code reads this table instead of branching on
//! the caller.

use crate::models::Stage;
use crate::scenario::ChangeCategory;
use crate::scenario::ChangeCategory::{Constraint, Eligibility, Production};

/// A mergeable field of [`ActivityUpdate`](super::ActivityUpdate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Production status.
    Status,
    /// Reported start.
    StartDate,
    /// Processing start.
    ProcessingStartDate,
    /// End of run.
    EndOfRunDate,
    /// End of post-processing.
    EndOfPostProcessingDate,
    /// End of storage.
    EndOfStorageDate,
    /// Reported finish.
    FinishDate,
    /// Setup time.
    SetupSpan,
    /// Run time.
    RunSpan,
    /// Post-processing time.
    PostProcessingSpan,
    /// Storage time.
    StorageSpan,
    /// Clean-out time.
    CleanSpan,
    /// Clean-out grade.
    CleanOutGrade,
    /// Good quantity.
    GoodQty,
    /// Scrap quantity.
    ScrapQty,
    /// Required quantity.
    RequiredQty,
    /// Pause flag.
    Paused,
    /// People usage.
    PeopleUsage,
    /// People count.
    NbrOfPeople,
    /// Comments.
    Comments,
    /// Batch amount.
    BatchAmount,
    /// Production info overrides.
    ProductionInfo,
}

impl Field {
    /// The span field reporting `stage`.
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Setup => Self::SetupSpan,
            Stage::Run => Self::RunSpan,
            Stage::PostProcessing => Self::PostProcessingSpan,
            Stage::Storage => Self::StorageSpan,
            Stage::Clean => Self::CleanSpan,
        }
    }

    /// The stage a span field reports, if it is one.
    pub fn stage(self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| Self::for_stage(*s) == self)
    }
}

/// How one field merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// The field.
    pub field: Field,
    /// Reported progress: subject to the manual-update-only policy.
    pub guarded: bool,
    /// Honours incremental updates.
    pub incremental: bool,
    /// Category flagged when the field changes.
    pub category: Option<ChangeCategory>,
}

const fn rule(
    field: Field,
    guarded: bool,
    incremental: bool,
    category: Option<ChangeCategory>,
) -> MergeRule {
    MergeRule {
        field,
        guarded,
        incremental,
        category,
    }
}

/// Every mergeable field.
pub static MERGE_TABLE: [MergeRule; 22] = [
    rule(Field::Status, true, false, Some(Constraint)),
    rule(Field::StartDate, true, false, Some(Constraint)),
    rule(Field::ProcessingStartDate, true, false, Some(Constraint)),
    rule(Field::EndOfRunDate, true, false, Some(Constraint)),
    rule(Field::EndOfPostProcessingDate, true, false, Some(Constraint)),
    rule(Field::EndOfStorageDate, true, false, Some(Constraint)),
    rule(Field::FinishDate, true, false, Some(Constraint)),
    rule(Field::SetupSpan, true, true, Some(Production)),
    rule(Field::RunSpan, true, true, Some(Production)),
    rule(Field::PostProcessingSpan, true, true, Some(Production)),
    rule(Field::StorageSpan, true, true, Some(Production)),
    rule(Field::CleanSpan, true, true, Some(Eligibility)),
    rule(Field::CleanOutGrade, true, false, Some(Eligibility)),
    rule(Field::GoodQty, true, true, Some(Production)),
    rule(Field::ScrapQty, true, true, Some(Production)),
    rule(Field::RequiredQty, false, false, Some(Production)),
    rule(Field::Paused, false, false, Some(Eligibility)),
    rule(Field::PeopleUsage, false, false, Some(Eligibility)),
    rule(Field::NbrOfPeople, false, false, Some(Eligibility)),
    rule(Field::Comments, false, false, None),
    rule(Field::BatchAmount, false, false, Some(Production)),
    rule(Field::ProductionInfo, false, false, Some(Production)),
];

/// The rule for `field`.
pub fn rule_for(field: Field) -> &'static MergeRule {
    // Every field has exactly one row; the fallback is unreachable.
    MERGE_TABLE
        .iter()
        .find(|r| r.field == field)
        .unwrap_or(&MERGE_TABLE[0])
}

/// Rules for guarded fields.
pub fn guarded_fields() -> impl Iterator<Item = &'static MergeRule> {
    MERGE_TABLE.iter().filter(|r| r.guarded)
}

/// Rules for fields that honour incremental updates.
pub fn incremental_fields() -> impl Iterator<Item = &'static MergeRule> {
    MERGE_TABLE.iter().filter(|r| r.incremental)
}
