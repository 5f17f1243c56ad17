//! Resource model.
//!
//! Resources (machines, workers, tools) are owned by the plant model outside
//! this crate. Activities refer to them by [`ResourceKey`] only: in lock
//! tables, per-resource production info, buffer records and actual-usage
//! snapshots. The [`Resource`] struct is the narrow view needed for costing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceKey(pub u64);

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A resource that can be assigned to activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource key.
    pub key: ResourceKey,
    /// Identifier in the foreign (ERP/MES) system.
    pub external_id: String,
    /// Human-readable name.
    pub name: String,
    /// Resource classification.
    pub resource_type: ResourceType,
    /// Cost per hour while the resource is occupied.
    pub hourly_cost: Decimal,
    /// Additional cost per hour while the resource is setting up.
    pub setup_hourly_cost: Decimal,
}

/// Resource type classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    /// Main processing resource (e.g., machine, oven).
    Primary,
    /// Support resource (e.g., tool, fixture, jig).
    Secondary,
    /// Human resource (e.g., operator, inspector).
    Human,
    /// Domain-specific type.
    Custom(String),
}

impl Resource {
    /// Creates a new resource of the given type.
    pub fn new(key: ResourceKey, resource_type: ResourceType) -> Self {
        Self {
            key,
            external_id: String::new(),
            name: String::new(),
            resource_type,
            hourly_cost: Decimal::ZERO,
            setup_hourly_cost: Decimal::ZERO,
        }
    }

    /// Creates a primary resource.
    pub fn primary(key: u64) -> Self {
        Self::new(ResourceKey(key), ResourceType::Primary)
    }

    /// Creates a human resource.
    pub fn human(key: u64) -> Self {
        Self::new(ResourceKey(key), ResourceType::Human)
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the external identifier.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    /// Sets the hourly cost. Negative values are floored at zero.
    pub fn with_hourly_cost(mut self, cost: Decimal) -> Self {
        self.hourly_cost = cost.max(Decimal::ZERO);
        self
    }

    /// Sets the additional setup cost per hour. Negative values are floored at zero.
    pub fn with_setup_hourly_cost(mut self, cost: Decimal) -> Self {
        self.setup_hourly_cost = cost.max(Decimal::ZERO);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_builder() {
        let r = Resource::primary(7)
            .with_name("CNC Machine 1")
            .with_external_id("WC-100")
            .with_hourly_cost(Decimal::new(5000, 2))
            .with_setup_hourly_cost(Decimal::new(1000, 2));

        assert_eq!(r.key, ResourceKey(7));
        assert_eq!(r.name, "CNC Machine 1");
        assert_eq!(r.external_id, "WC-100");
        assert_eq!(r.resource_type, ResourceType::Primary);
        assert_eq!(r.hourly_cost, Decimal::new(50, 0));
        assert_eq!(r.setup_hourly_cost, Decimal::new(10, 0));
    }

    #[test]
    fn test_negative_cost_floored() {
        let r = Resource::human(1).with_hourly_cost(Decimal::new(-5, 0));
        assert_eq!(r.resource_type, ResourceType::Human);
        assert_eq!(r.hourly_cost, Decimal::ZERO);
    }

    #[test]
    fn test_key_display_and_order() {
        assert_eq!(ResourceKey(3).to_string(), "R3");
        assert!(ResourceKey(2) < ResourceKey(10));
    }
}
