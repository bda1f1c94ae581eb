//! Location and route update controller for the pickup tracking map.
//!
//! The controller sits between the device location source and the native
//! map view. It throttles the location stream, schedules route redraws and
//! guards every renderer command against teardown races.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod geo;
pub mod metrics;
pub mod timers;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use capabilities::{
    Capabilities, Clock, LocationError, LocationSource, MonotonicClock, NoopUi,
    PermissionStatus, RendererCommand, RendererError, RendererSink, UiCollaborator, ViewHandle,
};
pub use config::{ConfigError, RouteProfile, TrackingConfig};
pub use controller::{ControllerSnapshot, LifecycleState, TrackingController};
pub use error::{is_benign_renderer_message, ErrorClass, TrackingError};
pub use gate::{RedrawGate, RouteBookkeeping, UpdateGate};
pub use geo::{
    distance_meters, CoordinateError, Destination, LatLon, LocationSample, UnixTimeMs,
    EARTH_RADIUS_M,
};
pub use metrics::{ControllerMetrics, MetricsSnapshot};

pub type TrackingResult<T> = Result<T, TrackingError>;

// Handlers never leave guarded state half-written, so a poisoned lock is still usable.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
