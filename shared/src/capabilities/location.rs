use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::LocationSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    /// Only approximate location was granted. Treated the same as `Granted`.
    GrantedCoarse,
    Denied,
    Restricted,
}

impl PermissionStatus {
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Granted | Self::GrantedCoarse)
    }

    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("location request timed out")]
    Timeout,

    #[error("platform error: {0}")]
    Platform(String),
}

/// Device location provider.
///
/// Push-style updates do not go through this trait; the renderer delivers
/// them to `TrackingController::on_location_pushed`.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus, LocationError>;

    async fn current_location(&self) -> Result<LocationSample, LocationError>;
}
