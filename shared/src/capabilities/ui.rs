use crate::geo::LocationSample;

/// Screen-side listener. Presenting alerts is its job, not the controller's.
pub trait UiCollaborator: Send + Sync {
    fn on_location_update(&self, sample: &LocationSample);

    fn on_map_ready(&self);

    fn show_permission_notice(&self, message: &str);
}

/// Listener for hosts that do not care about notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

impl UiCollaborator for NoopUi {
    fn on_location_update(&self, _sample: &LocationSample) {}

    fn on_map_ready(&self) {}

    fn show_permission_notice(&self, _message: &str) {}
}
