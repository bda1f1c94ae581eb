//! Throttling decisions for location updates and route redraws.
//!
//! Both gates are pure: they read thresholds from [`TrackingConfig`] and
//! compare a candidate against previously recorded bookkeeping. The
//! controller owns the bookkeeping and the clock.

use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::geo::{distance_meters, LatLon, LocationSample, UnixTimeMs};

/// Decides whether an incoming sample is a significant update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateGate {
    min_interval_ms: u64,
    min_displacement_m: f64,
}

impl UpdateGate {
    #[must_use]
    pub const fn new(min_interval_ms: u64, min_displacement_m: f64) -> Self {
        Self {
            min_interval_ms,
            min_displacement_m,
        }
    }

    #[must_use]
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.update_min_interval_ms, config.update_min_displacement_m)
    }

    /// With a prior accepted sample, both the interval and the displacement
    /// thresholds must be met. Without one, the candidate is always accepted.
    #[must_use]
    pub fn should_accept(
        &self,
        candidate: &LocationSample,
        last_accepted: Option<&LocationSample>,
        last_accepted_at: Option<UnixTimeMs>,
        now: UnixTimeMs,
    ) -> bool {
        let (Some(previous), Some(accepted_at)) = (last_accepted, last_accepted_at) else {
            return true;
        };

        let elapsed = now.elapsed_since(accepted_at);
        if elapsed < self.min_interval_ms {
            return false;
        }

        distance_meters(candidate.position(), previous.position()) >= self.min_displacement_m
    }
}

/// Route-draw bookkeeping. The three fields only ever change together
/// through [`RouteBookkeeping::record_draw`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteBookkeeping {
    last_route_origin: Option<LatLon>,
    last_route_drawn_at: Option<UnixTimeMs>,
    route_ever_drawn: bool,
}

impl RouteBookkeeping {
    #[must_use]
    pub const fn last_route_origin(&self) -> Option<LatLon> {
        self.last_route_origin
    }

    #[must_use]
    pub const fn last_route_drawn_at(&self) -> Option<UnixTimeMs> {
        self.last_route_drawn_at
    }

    #[must_use]
    pub const fn route_ever_drawn(&self) -> bool {
        self.route_ever_drawn
    }

    pub fn record_draw(&mut self, origin: LatLon, drawn_at: UnixTimeMs) {
        *self = Self {
            last_route_origin: Some(origin),
            last_route_drawn_at: Some(drawn_at),
            route_ever_drawn: true,
        };
    }
}

/// Decides whether a route should be (re)requested from the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedrawGate {
    throttle_ms: u64,
    min_displacement_m: f64,
}

impl RedrawGate {
    #[must_use]
    pub const fn new(throttle_ms: u64, min_displacement_m: f64) -> Self {
        Self {
            throttle_ms,
            min_displacement_m,
        }
    }

    #[must_use]
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.redraw_throttle_ms, config.redraw_min_displacement_m)
    }

    /// Any one of: never drawn, no recorded origin, throttle elapsed, or
    /// moved far enough from the last origin.
    #[must_use]
    pub fn should_redraw(
        &self,
        state: &RouteBookkeeping,
        current_location: LatLon,
        now: UnixTimeMs,
    ) -> bool {
        if !state.route_ever_drawn {
            return true;
        }
        let Some(origin) = state.last_route_origin else {
            return true;
        };

        let throttle_elapsed = state
            .last_route_drawn_at
            .map_or(true, |drawn_at| now.elapsed_since(drawn_at) >= self.throttle_ms);
        if throttle_elapsed {
            return true;
        }

        distance_meters(current_location, origin) >= self.min_displacement_m
    }
}
