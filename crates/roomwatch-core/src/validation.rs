//! Range checks for device telemetry writes.
//!
//! A write that fails any check is rejected as a whole; nothing is stored.
//! Absent optional fields are never a violation.
//!
//! # Example
//!
//! ```
//! use roomwatch_core::TelemetryValidator;
//! use roomwatch_types::TelemetryUpdate;
//!
//! let validator = TelemetryValidator::default();
//!
//! let update = TelemetryUpdate {
//!     temperature: Some(21.0),
//!     humidity: Some(140),
//!     ..Default::default()
//! };
//!
//! let violations = validator.check(&update);
//! assert_eq!(violations.len(), 1);
//! assert!(validator.validate(&update).is_err());
//! ```

use serde::Serialize;

use roomwatch_types::TelemetryUpdate;

use crate::error::{Error, Result};

/// A single out-of-range field in a telemetry write.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new checks
/// without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub enum TelemetryViolation {
    /// Temperature outside the accepted range.
    TemperatureOutOfRange { value: f64, min: f64, max: f64 },
    /// Humidity outside 0-100%.
    HumidityOutOfRange { value: i32 },
    /// Negative pressure.
    NegativePressure { value: f64 },
    /// A reading was NaN or infinite.
    NotFinite { field: &'static str },
}

impl std::fmt::Display for TelemetryViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryViolation::TemperatureOutOfRange { value, min, max } => {
                write!(
                    f,
                    "temperature {}°C is outside {}°C to {}°C",
                    value, min, max
                )
            }
            TelemetryViolation::HumidityOutOfRange { value } => {
                write!(f, "humidity {}% is out of valid range (0-100)", value)
            }
            TelemetryViolation::NegativePressure { value } => {
                write!(f, "pressure {} hPa is negative", value)
            }
            TelemetryViolation::NotFinite { field } => {
                write!(f, "{} is not a finite number", field)
            }
        }
    }
}

/// Accepted ranges for device telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryValidator {
    pub temperature_min: f64,
    pub temperature_max: f64,
}

impl Default for TelemetryValidator {
    fn default() -> Self {
        Self {
            temperature_min: -50.0,
            temperature_max: 100.0,
        }
    }
}

impl TelemetryValidator {
    /// Set the accepted temperature range.
    #[must_use]
    pub fn temperature_range(mut self, min: f64, max: f64) -> Self {
        self.temperature_min = min;
        self.temperature_max = max;
        self
    }

    /// Every violation in `update`, in field order.
    pub fn check(&self, update: &TelemetryUpdate) -> Vec<TelemetryViolation> {
        let mut violations = Vec::new();

        if let Some(value) = update.temperature {
            if !value.is_finite() {
                violations.push(TelemetryViolation::NotFinite {
                    field: "temperature",
                });
            } else if value < self.temperature_min || value > self.temperature_max {
                violations.push(TelemetryViolation::TemperatureOutOfRange {
                    value,
                    min: self.temperature_min,
                    max: self.temperature_max,
                });
            }
        }

        if let Some(value) = update.humidity
            && !(0..=100).contains(&value)
        {
            violations.push(TelemetryViolation::HumidityOutOfRange { value });
        }

        if let Some(value) = update.pressure {
            if !value.is_finite() {
                violations.push(TelemetryViolation::NotFinite { field: "pressure" });
            } else if value < 0.0 {
                violations.push(TelemetryViolation::NegativePressure { value });
            }
        }

        let gases = &update.gases;
        for (field, value) in [
            ("oxygen", gases.oxygen),
            ("nitrous_oxide", gases.nitrous_oxide),
            ("air", gases.air),
            ("instrument", gases.instrument),
            ("carbon", gases.carbon),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                violations.push(TelemetryViolation::NotFinite { field });
            }
        }

        violations
    }

    /// Reject `update` if it has any violation.
    pub fn validate(&self, update: &TelemetryUpdate) -> Result<()> {
        let violations = self.check(update);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidTelemetry(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomwatch_types::GasReadings;

    #[test]
    fn test_empty_update_is_valid() {
        let validator = TelemetryValidator::default();
        assert!(validator.check(&TelemetryUpdate::default()).is_empty());
    }

    #[test]
    fn test_temperature_bounds_inclusive() {
        let validator = TelemetryValidator::default();
        for value in [-50.0, 100.0] {
            let update = TelemetryUpdate {
                temperature: Some(value),
                ..Default::default()
            };
            assert!(validator.validate(&update).is_ok());
        }

        let update = TelemetryUpdate {
            temperature: Some(100.5),
            ..Default::default()
        };
        assert_eq!(
            validator.check(&update),
            vec![TelemetryViolation::TemperatureOutOfRange {
                value: 100.5,
                min: -50.0,
                max: 100.0
            }]
        );
    }

    #[test]
    fn test_humidity_and_pressure() {
        let validator = TelemetryValidator::default();
        let update = TelemetryUpdate {
            humidity: Some(-1),
            pressure: Some(-0.1),
            ..Default::default()
        };
        assert_eq!(
            validator.check(&update),
            vec![
                TelemetryViolation::HumidityOutOfRange { value: -1 },
                TelemetryViolation::NegativePressure { value: -0.1 },
            ]
        );
    }

    #[test]
    fn test_non_finite_gas_rejected() {
        let validator = TelemetryValidator::default();
        let update = TelemetryUpdate {
            gases: GasReadings {
                air: Some(f64::NAN),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = validator.validate(&update).unwrap_err();
        assert!(matches!(err, Error::InvalidTelemetry(ref v) if v.len() == 1));
        assert_eq!(
            err.to_string(),
            "Invalid telemetry: air is not a finite number"
        );
    }

    #[test]
    fn test_custom_temperature_range() {
        let validator = TelemetryValidator::default().temperature_range(10.0, 30.0);
        let update = TelemetryUpdate {
            temperature: Some(5.0),
            ..Default::default()
        };
        assert!(validator.validate(&update).is_err());
    }
}
