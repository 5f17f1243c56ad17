//! Requests to collaborators outside the core.
//!
//! Unscheduling, inventory, history and job bookkeeping belong to other
//! subsystems. Activity operations append [`ActivityEffect`]s to an
//! [`ActivityEffects`] buffer in the order they occur; the host drains it and
//! dispatches each request.

use rust_decimal::Decimal;
use std::fmt;

use crate::models::{ActivityId, JobId, ProductionStatus, Stage, TimeSpan};

/// Why the core asked for a job to be unscheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscheduleReason {
    /// A finished activity was reopened.
    Unfinished,
    /// A stage whose capacity was already released is required again.
    StageCapacityRequired,
    /// The activity no longer occupies its resource.
    PostProduction,
}

/// Kind of history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryKind {
    /// A stage took longer than scheduled.
    SlowStage {
        /// The stage.
        stage: Stage,
        /// Newly reported time for the stage.
        reported: TimeSpan,
        /// Scheduled time for the stage.
        scheduled: TimeSpan,
    },
    /// Reported scrap exceeds the planned scrap.
    ExcessiveScrap {
        /// Reported scrap.
        scrap: Decimal,
        /// Scrap expected for the required quantity.
        expected: Decimal,
    },
    /// A finished activity was reopened.
    Unfinished {
        /// Status it was reopened to.
        status: ProductionStatus,
    },
    /// A status was rejected because the operation is omitted.
    OmittedStatusRejected {
        /// The rejected status.
        status: ProductionStatus,
    },
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryNote {
    /// Job the entry belongs to.
    pub job_id: JobId,
    /// Activity the entry is about.
    pub activity_id: ActivityId,
    /// What happened.
    pub kind: HistoryKind,
}

impl fmt::Display for HistoryNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HistoryKind::SlowStage {
                stage,
                reported,
                scheduled,
            } => write!(
                f,
                "activity {} reported {} of {} against {} scheduled",
                self.activity_id, reported, stage, scheduled
            ),
            HistoryKind::ExcessiveScrap { scrap, expected } => write!(
                f,
                "activity {} reported scrap {} exceeding expected {}",
                self.activity_id, scrap, expected
            ),
            HistoryKind::Unfinished { status } => write!(
                f,
                "activity {} of job {} reopened as {}",
                self.activity_id, self.job_id, status
            ),
            HistoryKind::OmittedStatusRejected { status } => write!(
                f,
                "activity {} status {} rejected: operation is omitted",
                self.activity_id, status
            ),
        }
    }
}

/// A request to an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEffect {
    /// Remove the job's placements so the scheduler re-places it.
    UnscheduleJob {
        /// Job to unschedule.
        job_id: JobId,
        /// Activity that triggered it.
        activity_id: ActivityId,
        /// Why.
        reason: UnscheduleReason,
    },
    /// An activity of the job finished.
    ActivityFinished {
        /// Owning job.
        job_id: JobId,
        /// Finished activity.
        activity_id: ActivityId,
    },
    /// Record a history entry.
    History(HistoryNote),
    /// Produce (or, when negative, un-produce) inventory of the primary product.
    InventoryProduced {
        /// Producing activity.
        activity_id: ActivityId,
        /// Product, when the operation has one.
        product: Option<String>,
        /// Quantity change.
        qty: Decimal,
    },
    /// Consume materials for a change in good quantity.
    MaterialsConsumed {
        /// Consuming activity.
        activity_id: ActivityId,
        /// Change in good quantity the consumption is proportional to.
        produced_qty: Decimal,
    },
    /// The job has valid (unfinished) activities again; alternate paths
    /// must be re-evaluated.
    AlternatePathsRestored {
        /// Owning job.
        job_id: JobId,
    },
}

/// Ordered buffer of effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityEffects {
    effects: Vec<ActivityEffect>,
}

impl ActivityEffects {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an effect.
    pub fn push(&mut self, effect: ActivityEffect) {
        tracing::trace!(?effect, "activity effect queued");
        self.effects.push(effect);
    }

    /// Appends a history note.
    pub fn history(&mut self, job_id: JobId, activity_id: ActivityId, kind: HistoryKind) {
        self.push(ActivityEffect::History(HistoryNote {
            job_id,
            activity_id,
            kind,
        }));
    }

    /// Effects in order.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityEffect> + '_ {
        self.effects.iter()
    }

    /// Number of effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Takes every queued effect.
    pub fn drain(&mut self) -> Vec<ActivityEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Moves every effect of `other` to the end of this buffer.
    pub fn append(&mut self, other: &mut ActivityEffects) {
        self.effects.append(&mut other.effects);
    }

    /// History entries in order.
    pub fn history_notes(&self) -> impl Iterator<Item = &HistoryNote> + '_ {
        self.effects.iter().filter_map(|e| match e {
            ActivityEffect::History(note) => Some(note),
            _ => None,
        })
    }

    /// Whether an unschedule request for `job` is queued.
    pub fn unschedules(&self, job: JobId) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, ActivityEffect::UnscheduleJob { job_id, .. } if *job_id == job))
    }
}
