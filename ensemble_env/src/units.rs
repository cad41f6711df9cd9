//! Unit-tagged numbers.
//!
//! The engine never converts between units. It only needs to know whether a
//! number carries a unit and what its bare magnitude is, so a [`Quantity`]
//! is a magnitude plus an opaque [`UnitTag`].

use serde::{Deserialize, Serialize};

/// Opaque physical unit descriptor (e.g. `"d"`, `"kg/m^3"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitTag(pub String);

impl UnitTag {
    /// Creates a unit tag from its symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Returns the unit symbol.
    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numeric value tagged with a physical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// Bare numeric magnitude
    pub magnitude: f64,

    /// Attached unit (`None` for dimensionless)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitTag>,
}

impl Quantity {
    /// Creates a quantity with the given unit symbol.
    pub fn new(magnitude: f64, unit: &str) -> Self {
        Self {
            magnitude,
            unit: Some(UnitTag::new(unit)),
        }
    }

    /// Drops the unit and returns the bare magnitude.
    pub fn strip(&self) -> f64 {
        self.magnitude
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} {}", self.magnitude, unit),
            None => write!(f, "{}", self.magnitude),
        }
    }
}

/// The two questions the engine asks of any number-like value.
pub trait UnitAware {
    /// Returns true if the value carries a unit tag.
    fn is_quantity(&self) -> bool;

    /// Returns the bare magnitude, or `None` if the value is not a number.
    fn magnitude(&self) -> Option<f64>;
}

impl UnitAware for Quantity {
    fn is_quantity(&self) -> bool {
        self.unit.is_some()
    }

    fn magnitude(&self) -> Option<f64> {
        Some(self.strip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_drops_unit() {
        let q = Quantity::new(3.5, "d");

        assert!(q.is_quantity());
        assert_eq!(q.strip(), 3.5);
        assert_eq!(q.magnitude(), Some(3.5));
    }

    #[test]
    fn test_untagged_quantity() {
        let q: Quantity = serde_json::from_str(r#"{"magnitude": 2.0}"#).unwrap();

        assert!(!q.is_quantity());
        assert_eq!(q.magnitude(), Some(2.0));
        assert_eq!(q.to_string(), "2");
    }

    #[test]
    fn test_display_with_unit() {
        assert_eq!(Quantity::new(1.5, "kg").to_string(), "1.5 kg");
    }
}
