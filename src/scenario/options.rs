//! Scenario-level configuration.
//!
//! Loaded by the host from its own settings store (any serde format). Every
//! field has a default so partial documents deserialize.

use serde::{Deserialize, Serialize};

/// How automated transmissions treat activities flagged manual-update-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualUpdateOverride {
    /// Ignore the transmitted progress.
    #[default]
    Never,
    /// Accept it only if no reported quantity, span, date or status regresses.
    IfValuesAreGreater,
    /// Always accept it.
    Always,
}

/// Options shared by every activity in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOptions {
    /// Decimal places kept on required quantities.
    pub decimal_precision: u32,
    /// Scrap counts toward completing the required quantity.
    pub deduct_scrap_from_required: bool,
    /// Record which resources actually processed each activity.
    pub track_actual_resource_usage: bool,
    /// Policy for transmissions hitting manual-update-only activities.
    pub manual_update_override: ManualUpdateOverride,
    /// Internally reported good quantity produces inventory.
    pub produce_inventory_on_report: bool,
    /// Internally reported good quantity consumes materials.
    pub auto_consume_materials: bool,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            decimal_precision: 4,
            deduct_scrap_from_required: false,
            track_actual_resource_usage: false,
            manual_update_override: ManualUpdateOverride::Never,
            produce_inventory_on_report: true,
            auto_consume_materials: true,
        }
    }
}

impl ScenarioOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quantity precision.
    pub fn with_decimal_precision(mut self, places: u32) -> Self {
        self.decimal_precision = places;
        self
    }

    /// Counts scrap toward the required quantity.
    pub fn with_deduct_scrap(mut self, deduct: bool) -> Self {
        self.deduct_scrap_from_required = deduct;
        self
    }

    /// Enables actual resource usage tracking.
    pub fn with_resource_tracking(mut self, track: bool) -> Self {
        self.track_actual_resource_usage = track;
        self
    }

    /// Sets the manual-update-only override policy.
    pub fn with_manual_update_override(mut self, policy: ManualUpdateOverride) -> Self {
        self.manual_update_override = policy;
        self
    }

    /// Enables or disables inventory production and material consumption
    /// side effects for internally reported quantities.
    pub fn with_inventory_effects(mut self, enabled: bool) -> Self {
        self.produce_inventory_on_report = enabled;
        self.auto_consume_materials = enabled;
        self
    }
}
