use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::capabilities::{LocationError, RendererError};
use crate::config::ConfigError;
use crate::geo::CoordinateError;

/// Lowercased fragments the native map layer uses when a view has been
/// unmounted underneath an in-flight command.
const BENIGN_RENDERER_FRAGMENTS: &[&str] = &[
    "could not find view",
    "view not found",
    "no view found",
    "unable to find view",
    "unmounted",
    "stale",
    "already destroyed",
    "invalid view handle",
    "view has been detached",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Reported to the user, operation continues without auto-location.
    Permission,
    /// Handle invalidated under an in-flight command. Debug log only.
    TransientRenderer,
    /// Location source failed. Logged, no retry.
    Fetch,
    /// Anything unexpected. Logged with full detail.
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("location error: {0}")]
    Location(#[from] LocationError),

    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("coordinate error: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("no async runtime: {0}")]
    NoRuntime(String),
}

impl TrackingError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Location(LocationError::PermissionDenied) => ErrorClass::Permission,
            Self::Location(_) => ErrorClass::Fetch,
            Self::Renderer(RendererError::StaleHandle(_)) => ErrorClass::TransientRenderer,
            Self::Renderer(RendererError::Dispatch(message))
                if is_benign_renderer_message(message) =>
            {
                ErrorClass::TransientRenderer
            }
            Self::Renderer(_) | Self::Config(_) | Self::Coordinate(_) | Self::NoRuntime(_) => {
                ErrorClass::Diagnostic
            }
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            Self::Location(LocationError::PermissionDenied) => {
                "Location access is required to track your pickup. Please enable location permissions in Settings."
                    .into()
            }
            Self::Location(_) => {
                "Unable to determine your location. Please check your GPS settings.".into()
            }
            _ => "Something went wrong with the map. Please try again.".into(),
        }
    }

    /// Logs at the level that matches the error's class.
    pub fn report(&self, operation: &'static str) {
        match self.class() {
            ErrorClass::Permission => info!(operation, error = %self, "location permission unavailable"),
            ErrorClass::TransientRenderer => {
                debug!(operation, error = %self, "ignoring renderer lifecycle race");
            }
            ErrorClass::Fetch => warn!(operation, error = %self, "location fetch failed"),
            ErrorClass::Diagnostic => error!(operation, error = ?self, "unexpected tracking error"),
        }
    }
}

/// True when a renderer error message describes a view that went away,
/// which is an expected teardown race rather than a bug.
#[must_use]
pub fn is_benign_renderer_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    BENIGN_RENDERER_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}
