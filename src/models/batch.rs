//! Scheduler-owned batch placement.
//!
//! A batch groups one or more activities placed together on a resource
//! timeline. The scheduler creates it; an activity only stores a copy of the
//! placement while it is scheduled and reads stage boundaries from it.

use serde::{Deserialize, Serialize};

use super::{ResourceKey, Stage, TimeSpan, Timestamp};

/// Batch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

/// Which part of an activity the scheduler allocated capacity for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleScope {
    /// Every remaining stage.
    #[default]
    Full,
    /// Only the post-processing stage remains.
    PostProcessingOnly,
    /// Only the clean-out stage remains.
    CleanOnly,
}

/// A placed batch.
///
/// Stage boundaries are consecutive: setup runs `[start, setup_end)`, run
/// `[setup_end, run_end)`, and so on through clean `[storage_end, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier.
    pub id: BatchId,
    /// Start of setup.
    pub start: Timestamp,
    /// End of setup / start of run.
    pub setup_end: Timestamp,
    /// End of run.
    pub run_end: Timestamp,
    /// End of post-processing.
    pub post_processing_end: Timestamp,
    /// End of storage.
    pub storage_end: Timestamp,
    /// End of clean-out; end of the batch.
    pub end: Timestamp,
    /// Resources the batch occupies.
    pub resources: Vec<ResourceKey>,
}

impl Batch {
    /// Creates a batch whose stages all collapse onto a single run interval.
    pub fn new(id: u64, start: Timestamp, end: Timestamp) -> Self {
        Self {
            id: BatchId(id),
            start,
            setup_end: start,
            run_end: end,
            post_processing_end: end,
            storage_end: end,
            end,
            resources: Vec::new(),
        }
    }

    /// Builds a batch from consecutive stage lengths starting at `start`.
    pub fn from_stages(id: u64, start: Timestamp, spans: [TimeSpan; 5]) -> Self {
        let setup_end = start + spans[0];
        let run_end = setup_end + spans[1];
        let post_processing_end = run_end + spans[2];
        let storage_end = post_processing_end + spans[3];
        let end = storage_end + spans[4];
        Self {
            id: BatchId(id),
            start,
            setup_end,
            run_end,
            post_processing_end,
            storage_end,
            end,
            resources: Vec::new(),
        }
    }

    /// Adds an occupied resource.
    pub fn with_resource(mut self, resource: ResourceKey) -> Self {
        self.resources.push(resource);
        self
    }

    /// Scheduled length of `stage`.
    pub fn scheduled_span(&self, stage: Stage) -> TimeSpan {
        let (from, to) = match stage {
            Stage::Setup => (self.start, self.setup_end),
            Stage::Run => (self.setup_end, self.run_end),
            Stage::PostProcessing => (self.run_end, self.post_processing_end),
            Stage::Storage => (self.post_processing_end, self.storage_end),
            Stage::Clean => (self.storage_end, self.end),
        };
        to - from
    }

    /// Whole batch length.
    pub fn duration(&self) -> TimeSpan {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stages() {
        let start = Timestamp::from_ticks(TimeSpan::from_days(1).ticks());
        let b = Batch::from_stages(
            1,
            start,
            [
                TimeSpan::from_minutes(30),
                TimeSpan::from_hours(2),
                TimeSpan::from_minutes(15),
                TimeSpan::ZERO,
                TimeSpan::from_minutes(10),
            ],
        )
        .with_resource(ResourceKey(4));

        assert_eq!(b.scheduled_span(Stage::Setup), TimeSpan::from_minutes(30));
        assert_eq!(b.scheduled_span(Stage::Run), TimeSpan::from_hours(2));
        assert_eq!(b.scheduled_span(Stage::Storage), TimeSpan::ZERO);
        assert_eq!(b.duration(), TimeSpan::from_minutes(175));
        assert_eq!(b.resources, vec![ResourceKey(4)]);
    }

    #[test]
    fn test_simple_batch_is_all_run() {
        let b = Batch::new(2, Timestamp::from_ticks(100), Timestamp::from_ticks(600));
        assert_eq!(b.scheduled_span(Stage::Setup), TimeSpan::ZERO);
        assert_eq!(b.scheduled_span(Stage::Run), TimeSpan::from_ticks(500));
        assert_eq!(b.scheduled_span(Stage::Clean), TimeSpan::ZERO);
    }
}
