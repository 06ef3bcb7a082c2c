use std::collections::HashMap;

use crate::constants::*;

/// How one raw column is converted to a typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    Boolean,
    Float,
    Categorical,
    /// Day-first timestamp; unparseable rows are dropped.
    Timestamp,
    /// Percentage text such as `"80%"`, stored as a fraction.
    Percentage,
    /// `"<lat>,<lon>"` exploded into two derived float columns.
    Coordinates { latitude: String, longitude: String },
}

static FALLBACK: ColumnRule = ColumnRule::Categorical;

/// Column-name keyed conversion rules
pub struct TypeRuleRegistry {
    rules: HashMap<String, ColumnRule>,
}

impl TypeRuleRegistry {
    /// Empty registry; every column falls back to categorical.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Rules for the Powerbox device export
    pub fn powerbox() -> Self {
        let mut registry = Self::empty();

        registry.register(TIMESTAMP, ColumnRule::Timestamp);
        for name in [SYSTEM_ON, SYSTEM_FAULT_ALERTS, BATTERY_LOW_FLAG, BATTERY_FULL_FLAG] {
            registry.register(name, ColumnRule::Boolean);
        }
        for name in [
            TEMPERATURE,
            SOLAR_OUTPUT,
            POWER_CONSUMPTION,
            ENERGY_STORED,
            INVERTER_EFFICIENCY,
            SYSTEM_LOAD,
            VOLTAGE,
            CURRENT,
            POWER_FACTOR,
            DUST_ACCUMULATION,
            BATTERY_CAPACITY,
            INVERTER_CAPACITY,
        ] {
            registry.register(name, ColumnRule::Float);
        }
        for name in [CUSTOMER_PROFILE, SOLAR_PANELS_TYPE, SOLAR_PANELS_CONFIGURATION, BATTERY_TECHNOLOGY] {
            registry.register(name, ColumnRule::Categorical);
        }
        registry.register(DEPTH_OF_DISCHARGE, ColumnRule::Percentage);
        registry.register(
            USER_COORDINATES,
            ColumnRule::Coordinates {
                latitude: LATITUDE.to_string(),
                longitude: LONGITUDE.to_string(),
            },
        );

        registry
    }

    /// Register or replace the rule for a column
    pub fn register(&mut self, column: impl Into<String>, rule: ColumnRule) {
        self.rules.insert(column.into(), rule);
    }

    /// Rule for `column`, categorical when none is registered.
    pub fn rule_for(&self, column: &str) -> &ColumnRule {
        self.rules.get(column).unwrap_or(&FALLBACK)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for TypeRuleRegistry {
    fn default() -> Self {
        Self::powerbox()
    }
}
