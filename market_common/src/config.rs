//! Simulation parameters.
//!
//! `SimulationConfig` is read once when the simulator starts and never changes for the
//! lifetime of the engine. It is deserialized from JSON with camelCase keys; the key names
//! used by the earlier stock-trader service (`updateIntervalSeconds`, `minPrice`,
//! `isEnabled`, ...) are accepted as aliases so existing settings files keep working.
//! Missing keys fall back to [`SimulationConfig::default`].
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MarketError};

/// Default seconds between two update cycles.
pub const DEFAULT_INTERVAL_SECONDS: f64 = 3.0;
/// Default upper bound of a single-cycle change, in percent.
pub const DEFAULT_MAX_CHANGE_PERCENT: f64 = 5.0;
/// Default lower bound of a single-cycle change, in percent.
pub const DEFAULT_MIN_CHANGE_PERCENT: f64 = -5.0;
/// Shortest tick period a schedule can run.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
/// Longest tick period a schedule can run.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parameters of the bounded random walk and of the scheduler driving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Seconds between ticks. Fractions are allowed.
    #[serde(alias = "updateIntervalSeconds")]
    pub interval_seconds: f64,
    /// Largest change a single cycle may apply, in percent.
    #[serde(alias = "maxPriceChangePercent")]
    pub max_change_percent: f64,
    /// Smallest (most negative) change a single cycle may apply, in percent.
    #[serde(alias = "minPriceChangePercent")]
    pub min_change_percent: f64,
    /// No instrument is ever priced below this value.
    #[serde(alias = "minPrice")]
    pub floor_price: Decimal,
    /// When false, `start()` has no effect.
    #[serde(alias = "isEnabled")]
    pub enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            max_change_percent: DEFAULT_MAX_CHANGE_PERCENT,
            min_change_percent: DEFAULT_MIN_CHANGE_PERCENT,
            floor_price: Decimal::new(1, 2),
            enabled: true,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a configuration from any JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MarketError> {
        let config: SimulationConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, MarketError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = Duration::try_from_secs_f64(self.interval_seconds)
            .is_ok_and(|interval| (MIN_INTERVAL..=MAX_INTERVAL).contains(&interval));
        if !in_range {
            return Err(ConfigError::InvalidInterval(self.interval_seconds));
        }
        if !self.max_change_percent.is_finite() {
            return Err(ConfigError::NonFinitePercent {
                field: "maxChangePercent",
                value: self.max_change_percent,
            });
        }
        if !self.min_change_percent.is_finite() {
            return Err(ConfigError::NonFinitePercent {
                field: "minChangePercent",
                value: self.min_change_percent,
            });
        }
        if self.min_change_percent > self.max_change_percent {
            return Err(ConfigError::InvertedBounds {
                min: self.min_change_percent,
                max: self.max_change_percent,
            });
        }
        if self.floor_price.is_sign_negative() && !self.floor_price.is_zero() {
            return Err(ConfigError::NegativeFloor(self.floor_price));
        }
        Ok(())
    }

    /// Tick period. Only meaningful on a validated config.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_INTERVAL_SECONDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_the_stock_trader_settings() {
        let config = SimulationConfig::default();
        assert_eq!(config.interval_seconds, 3.0);
        assert_eq!(config.max_change_percent, 5.0);
        assert_eq!(config.min_change_percent, -5.0);
        assert_eq!(config.floor_price, dec!(0.01));
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn legacy_key_names_are_accepted() {
        let json = r#"{
            "updateIntervalSeconds": 10,
            "maxPriceChangePercent": 2.5,
            "minPriceChangePercent": -1.5,
            "minPrice": 0.5,
            "isEnabled": false
        }"#;
        let config = SimulationConfig::from_reader(json.as_bytes()).unwrap();

        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.max_change_percent, 2.5);
        assert_eq!(config.min_change_percent, -1.5);
        assert_eq!(config.floor_price, dec!(0.5));
        assert!(!config.enabled);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = SimulationConfig::from_reader(r#"{"intervalSeconds": 0.25}"#.as_bytes()).unwrap();
        assert_eq!(config.interval(), Duration::from_millis(250));
        assert_eq!(config.floor_price, dec!(0.01));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SimulationConfig {
            interval_seconds: 0.0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval(0.0)));
    }

    #[test]
    fn intervals_outside_the_schedulable_range_are_rejected() {
        for seconds in [1e-12, 0.0009, 86_400.5, 1e19, f64::NAN, f64::INFINITY] {
            let config = SimulationConfig {
                interval_seconds: seconds,
                ..SimulationConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidInterval(_))),
                "{seconds} should be rejected"
            );
        }
    }

    #[test]
    fn interval_range_bounds_are_inclusive() {
        for seconds in [0.001, 86_400.0] {
            let config = SimulationConfig {
                interval_seconds: seconds,
                ..SimulationConfig::default()
            };
            assert!(config.validate().is_ok(), "{seconds} should be accepted");
        }
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = SimulationConfig {
            min_change_percent: 3.0,
            max_change_percent: 1.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn negative_floor_is_rejected() {
        let config = SimulationConfig {
            floor_price: dec!(-0.01),
            ..SimulationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NegativeFloor(dec!(-0.01)))
        );
    }

    #[test]
    fn invalid_file_contents_surface_as_market_error() {
        let err = SimulationConfig::from_reader(r#"{"intervalSeconds": -1}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, MarketError::Config(ConfigError::InvalidInterval(_))));
    }
}
