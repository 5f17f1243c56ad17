//! Production status and its derived categories.
//!
//! Statuses are totally ordered; advancing means moving to a larger value.
//!
//! | Status | Category |
//! |--------|----------|
//! | Waiting, Ready, Started | Pre-production |
//! | SettingUp, Running | Production |
//! | PostProcessing, Storing, Cleaning | Production if the stage occupies the resource, else post-production |
//! | Finished | Post-production |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an activity's processing lifecycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ProductionStatus {
    /// Constrained by a predecessor, material or other upstream event.
    #[default]
    Waiting,
    /// All constraints satisfied; may start.
    Ready,
    /// Work reported but no specific stage entered.
    Started,
    /// Setup in progress.
    SettingUp,
    /// Run (processing) in progress.
    Running,
    /// Post-processing in progress.
    PostProcessing,
    /// Material held in storage after post-processing.
    Storing,
    /// Resource clean-out in progress.
    Cleaning,
    /// Done.
    Finished,
}

impl ProductionStatus {
    /// Every status, in order.
    pub const ALL: [ProductionStatus; 9] = [
        Self::Waiting,
        Self::Ready,
        Self::Started,
        Self::SettingUp,
        Self::Running,
        Self::PostProcessing,
        Self::Storing,
        Self::Cleaning,
        Self::Finished,
    ];

    /// Persisted code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Whether the resource stages (setup through cleaning) are underway.
    pub fn is_in_process(self) -> bool {
        matches!(
            self,
            Self::SettingUp | Self::Running | Self::PostProcessing | Self::Storing | Self::Cleaning
        )
    }

    /// The stage this status is working on, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::SettingUp => Some(Stage::Setup),
            Self::Running => Some(Stage::Run),
            Self::PostProcessing => Some(Stage::PostProcessing),
            Self::Storing => Some(Stage::Storage),
            Self::Cleaning => Some(Stage::Clean),
            _ => None,
        }
    }

    /// Category of this status given which trailing stages occupy the resource.
    pub fn category(self, usage: StageUsage) -> StatusCategory {
        match self {
            Self::Waiting | Self::Ready | Self::Started => StatusCategory::PreProduction,
            Self::SettingUp | Self::Running => StatusCategory::Production,
            Self::PostProcessing | Self::Storing | Self::Cleaning => {
                let occupies = self.stage().is_some_and(|s| usage.uses_resource(s));
                if occupies {
                    StatusCategory::Production
                } else {
                    StatusCategory::PostProduction
                }
            }
            Self::Finished => StatusCategory::PostProduction,
        }
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Grouping of statuses by relation to production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCategory {
    /// Nothing has consumed the resource yet.
    PreProduction,
    /// The resource is occupied.
    Production,
    /// The resource is released.
    PostProduction,
}

/// A resource-consuming stage of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Setup.
    Setup,
    /// Run.
    Run,
    /// Post-processing.
    PostProcessing,
    /// Storage.
    Storage,
    /// Clean-out.
    Clean,
}

impl Stage {
    /// Every stage, in processing order.
    pub const ALL: [Stage; 5] = [
        Self::Setup,
        Self::Run,
        Self::PostProcessing,
        Self::Storage,
        Self::Clean,
    ];

    /// Status reported while this stage is in progress.
    pub fn status(self) -> ProductionStatus {
        match self {
            Self::Setup => ProductionStatus::SettingUp,
            Self::Run => ProductionStatus::Running,
            Self::PostProcessing => ProductionStatus::PostProcessing,
            Self::Storage => ProductionStatus::Storing,
            Self::Clean => ProductionStatus::Cleaning,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Run => "run",
            Self::PostProcessing => "post-processing",
            Self::Storage => "storage",
            Self::Clean => "clean",
        };
        f.write_str(name)
    }
}

/// Which trailing stages keep the primary resource occupied.
///
/// Setup and run always occupy it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUsage {
    /// Post-processing keeps the resource.
    pub post_processing: bool,
    /// Storage keeps the resource.
    pub storage: bool,
    /// Clean-out keeps the resource.
    pub clean: bool,
}

impl StageUsage {
    /// Every stage occupies the resource.
    pub fn all() -> Self {
        Self {
            post_processing: true,
            storage: true,
            clean: true,
        }
    }

    /// Whether `stage` occupies the resource.
    pub fn uses_resource(self, stage: Stage) -> bool {
        match stage {
            Stage::Setup | Stage::Run => true,
            Stage::PostProcessing => self.post_processing,
            Stage::Storage => self.storage,
            Stage::Clean => self.clean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        for pair in ProductionStatus::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(ProductionStatus::default(), ProductionStatus::Waiting);
    }

    #[test]
    fn test_code_round_trip() {
        for s in ProductionStatus::ALL {
            assert_eq!(ProductionStatus::from_code(s.code()), Some(s));
        }
        assert_eq!(ProductionStatus::from_code(9), None);
    }

    #[test]
    fn test_category_without_resource_usage() {
        let usage = StageUsage::default();
        assert_eq!(
            ProductionStatus::Started.category(usage),
            StatusCategory::PreProduction
        );
        assert_eq!(
            ProductionStatus::Running.category(usage),
            StatusCategory::Production
        );
        assert_eq!(
            ProductionStatus::PostProcessing.category(usage),
            StatusCategory::PostProduction
        );
        assert_eq!(
            ProductionStatus::Finished.category(usage),
            StatusCategory::PostProduction
        );
    }

    #[test]
    fn test_category_with_resource_usage() {
        let usage = StageUsage {
            post_processing: true,
            storage: false,
            clean: true,
        };
        assert_eq!(
            ProductionStatus::PostProcessing.category(usage),
            StatusCategory::Production
        );
        assert_eq!(
            ProductionStatus::Storing.category(usage),
            StatusCategory::PostProduction
        );
        assert_eq!(
            ProductionStatus::Cleaning.category(usage),
            StatusCategory::Production
        );
        assert_eq!(
            ProductionStatus::Cleaning.category(StageUsage::all()),
            StatusCategory::Production
        );
    }

    #[test]
    fn test_stage_status_mapping() {
        for stage in Stage::ALL {
            assert_eq!(stage.status().stage(), Some(stage));
        }
        assert!(ProductionStatus::Ready.stage().is_none());
        assert!(ProductionStatus::Cleaning.is_in_process());
        assert!(!ProductionStatus::Finished.is_in_process());
    }
}
