use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_UPDATE_MIN_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_UPDATE_MIN_DISPLACEMENT_M: f64 = 20.0;
pub const DEFAULT_REDRAW_THROTTLE_MS: u64 = 10_000;
pub const DEFAULT_REDRAW_MIN_DISPLACEMENT_M: f64 = 30.0;
pub const DEFAULT_FIRST_ROUTE_DELAY_MS: u64 = 1_500;
pub const DEFAULT_SUBSEQUENT_ROUTE_DELAY_MS: u64 = 500;
pub const DEFAULT_INITIAL_FETCH_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Validation(String),

    #[error("malformed config: {0}")]
    Parse(String),
}

/// Routing profile forwarded to the renderer with every draw-route command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteProfile {
    #[default]
    Driving,
    Cycling,
    Walking,
}

impl RouteProfile {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Cycling => "cycling",
            Self::Walking => "walking",
        }
    }
}

impl std::fmt::Display for RouteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and delays for the tracking controller.
///
/// Every field has a default, so a partial JSON document only needs to
/// name the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub update_min_interval_ms: u64,
    pub update_min_displacement_m: f64,
    pub redraw_throttle_ms: u64,
    pub redraw_min_displacement_m: f64,
    pub first_route_delay_ms: u64,
    pub subsequent_route_delay_ms: u64,
    pub initial_fetch_delay_ms: u64,
    pub route_profile: RouteProfile,
    /// Samples reporting a worse accuracy radius are dropped. `None` disables the filter.
    pub max_accuracy_m: Option<f64>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            update_min_interval_ms: DEFAULT_UPDATE_MIN_INTERVAL_MS,
            update_min_displacement_m: DEFAULT_UPDATE_MIN_DISPLACEMENT_M,
            redraw_throttle_ms: DEFAULT_REDRAW_THROTTLE_MS,
            redraw_min_displacement_m: DEFAULT_REDRAW_MIN_DISPLACEMENT_M,
            first_route_delay_ms: DEFAULT_FIRST_ROUTE_DELAY_MS,
            subsequent_route_delay_ms: DEFAULT_SUBSEQUENT_ROUTE_DELAY_MS,
            initial_fetch_delay_ms: DEFAULT_INITIAL_FETCH_DELAY_MS,
            route_profile: RouteProfile::default(),
            max_accuracy_m: None,
        }
    }
}

impl TrackingConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_min_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "update_min_interval_ms must be > 0".into(),
            ));
        }
        if self.redraw_throttle_ms == 0 {
            return Err(ConfigError::Validation("redraw_throttle_ms must be > 0".into()));
        }
        Self::check_distance("update_min_displacement_m", self.update_min_displacement_m)?;
        Self::check_distance("redraw_min_displacement_m", self.redraw_min_displacement_m)?;
        if let Some(max_accuracy) = self.max_accuracy_m {
            if !max_accuracy.is_finite() || max_accuracy <= 0.0 {
                return Err(ConfigError::Validation(
                    "max_accuracy_m must be a positive number".into(),
                ));
            }
        }
        Ok(())
    }

    fn check_distance(name: &str, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{name} must be a finite, non-negative number of meters"
            )));
        }
        Ok(())
    }

    /// Delay before a scheduled route draw fires.
    #[must_use]
    pub fn route_delay(&self, first_draw: bool) -> Duration {
        if first_draw {
            Duration::from_millis(self.first_route_delay_ms)
        } else {
            Duration::from_millis(self.subsequent_route_delay_ms)
        }
    }

    #[must_use]
    pub fn initial_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.initial_fetch_delay_ms)
    }
}
