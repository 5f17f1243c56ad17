//! Candidate snapshot merged into a live activity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    PeopleUsage, ProductionInfoOverride, ProductionStatus, Stage, TimeSpan, Timestamp,
};

/// Incoming values for one activity.
///
/// `None` means "not set by the sender"; the live value is kept. When
/// `incremental` is set, reported spans and quantities are deltas to add to
/// the live values rather than replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityUpdate {
    /// Production status.
    pub status: Option<ProductionStatus>,
    /// Reported start.
    pub reported_start_date: Option<Timestamp>,
    /// End of setup / start of processing.
    pub processing_start_date: Option<Timestamp>,
    /// End of run.
    pub end_of_run_date: Option<Timestamp>,
    /// End of post-processing.
    pub end_of_post_processing_date: Option<Timestamp>,
    /// End of storage.
    pub end_of_storage_date: Option<Timestamp>,
    /// Reported finish.
    pub reported_finish_date: Option<Timestamp>,
    /// Setup time.
    pub setup_span: Option<TimeSpan>,
    /// Run time.
    pub run_span: Option<TimeSpan>,
    /// Post-processing time.
    pub post_processing_span: Option<TimeSpan>,
    /// Storage time.
    pub storage_span: Option<TimeSpan>,
    /// Clean-out time.
    pub clean_span: Option<TimeSpan>,
    /// Clean-out grade.
    pub clean_out_grade: Option<i32>,
    /// Good quantity.
    pub reported_good_qty: Option<Decimal>,
    /// Scrap quantity.
    pub reported_scrap_qty: Option<Decimal>,
    /// Required quantity.
    pub required_finish_qty: Option<Decimal>,
    /// Paused on the floor.
    pub paused: Option<bool>,
    /// People usage.
    pub people_usage: Option<PeopleUsage>,
    /// People count.
    pub nbr_of_people: Option<Decimal>,
    /// Comments.
    pub comments: Option<String>,
    /// Batch amount.
    pub batch_amount: Option<Decimal>,
    /// Production info overrides.
    pub production_info: Option<ProductionInfoOverride>,
    /// Spans and quantities are deltas.
    pub incremental: bool,
}

impl ActivityUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks spans and quantities as deltas.
    pub fn incremental(mut self) -> Self {
        self.incremental = true;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ProductionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the good quantity.
    pub fn with_good_qty(mut self, qty: Decimal) -> Self {
        self.reported_good_qty = Some(qty);
        self
    }

    /// Sets the scrap quantity.
    pub fn with_scrap_qty(mut self, qty: Decimal) -> Self {
        self.reported_scrap_qty = Some(qty);
        self
    }

    /// Sets the required quantity.
    pub fn with_required_qty(mut self, qty: Decimal) -> Self {
        self.required_finish_qty = Some(qty);
        self
    }

    /// Sets the reported time for `stage`.
    pub fn with_span(mut self, stage: Stage, span: TimeSpan) -> Self {
        *self.span_mut(stage) = Some(span);
        self
    }

    /// Sets the reported start.
    pub fn with_start_date(mut self, date: Timestamp) -> Self {
        self.reported_start_date = Some(date);
        self
    }

    /// Sets the reported finish.
    pub fn with_finish_date(mut self, date: Timestamp) -> Self {
        self.reported_finish_date = Some(date);
        self
    }

    /// Sets the clean-out grade.
    pub fn with_clean_out_grade(mut self, grade: i32) -> Self {
        self.clean_out_grade = Some(grade);
        self
    }

    /// Sets the pause flag.
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = Some(paused);
        self
    }

    /// Sets people usage and count.
    pub fn with_people(mut self, usage: PeopleUsage, count: Decimal) -> Self {
        self.people_usage = Some(usage);
        self.nbr_of_people = Some(count);
        self
    }

    /// Sets comments.
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Sets the batch amount.
    pub fn with_batch_amount(mut self, amount: Decimal) -> Self {
        self.batch_amount = Some(amount);
        self
    }

    /// Sets production info overrides.
    pub fn with_production_info(mut self, info: ProductionInfoOverride) -> Self {
        self.production_info = Some(info);
        self
    }

    /// Reported time for `stage`, if set.
    pub fn span(&self, stage: Stage) -> Option<TimeSpan> {
        match stage {
            Stage::Setup => self.setup_span,
            Stage::Run => self.run_span,
            Stage::PostProcessing => self.post_processing_span,
            Stage::Storage => self.storage_span,
            Stage::Clean => self.clean_span,
        }
    }

    pub(crate) fn span_mut(&mut self, stage: Stage) -> &mut Option<TimeSpan> {
        match stage {
            Stage::Setup => &mut self.setup_span,
            Stage::Run => &mut self.run_span,
            Stage::PostProcessing => &mut self.post_processing_span,
            Stage::Storage => &mut self.storage_span,
            Stage::Clean => &mut self.clean_span,
        }
    }
}
