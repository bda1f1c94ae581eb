mod clock;
mod location;
mod renderer;
mod ui;

use std::sync::Arc;

pub use self::clock::{Clock, MonotonicClock};
pub use self::location::{LocationError, LocationSource, PermissionStatus};
pub use self::renderer::{
    RendererCommand, RendererError, RendererSink, ViewHandle, DRAW_ROUTE_COMMAND_ID,
    RECENTER_COMMAND_ID,
};
pub use self::ui::{NoopUi, UiCollaborator};

/// Platform collaborators injected into the controller.
#[derive(Clone)]
pub struct Capabilities {
    pub location: Arc<dyn LocationSource>,
    pub renderer: Arc<dyn RendererSink>,
    pub ui: Arc<dyn UiCollaborator>,
    pub clock: Arc<dyn Clock>,
}

impl Capabilities {
    pub fn new(
        location: Arc<dyn LocationSource>,
        renderer: Arc<dyn RendererSink>,
        ui: Arc<dyn UiCollaborator>,
    ) -> Self {
        Self {
            location,
            renderer,
            ui,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
