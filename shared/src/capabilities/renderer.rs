use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::RouteProfile;
use crate::geo::LatLon;

pub const RECENTER_COMMAND_ID: u32 = 1;
pub const DRAW_ROUTE_COMMAND_ID: u32 = 2;

/// Opaque native view reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle(pub i64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RendererCommand {
    Recenter {
        at: LatLon,
    },
    DrawRoute {
        from: LatLon,
        to: LatLon,
        profile: RouteProfile,
        is_update: bool,
    },
}

impl RendererCommand {
    #[must_use]
    pub const fn id(&self) -> u32 {
        match self {
            Self::Recenter { .. } => RECENTER_COMMAND_ID,
            Self::DrawRoute { .. } => DRAW_ROUTE_COMMAND_ID,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Recenter { .. } => "recenter",
            Self::DrawRoute { .. } => "draw_route",
        }
    }

    /// Positional arguments in the order the native view manager expects.
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Recenter { at } => vec![json!(at.lat), json!(at.lon)],
            Self::DrawRoute {
                from,
                to,
                profile,
                is_update,
            } => vec![
                json!(from.lat),
                json!(from.lon),
                json!(to.lat),
                json!(to.lon),
                json!(profile.as_str()),
                json!(is_update),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    #[error("view handle {0:?} is no longer mounted")]
    StaleHandle(ViewHandle),

    #[error("command dispatch failed: {0}")]
    Dispatch(String),
}

/// Native map view command channel.
///
/// `is_handle_valid` runs under the controller's state lock and must not
/// call back into the controller. `dispatch` runs unlocked, so a view may
/// report location events from inside it.
pub trait RendererSink: Send + Sync {
    fn is_handle_valid(&self, handle: ViewHandle) -> bool;

    fn dispatch(&self, handle: ViewHandle, command: &RendererCommand) -> Result<(), RendererError>;
}
