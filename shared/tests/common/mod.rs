#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pickup_core::{
    Capabilities, Clock, LocationError, LocationSample, LocationSource, MonotonicClock,
    PermissionStatus, RendererCommand, RendererError, RendererSink, TrackingConfig,
    TrackingController, UiCollaborator, UnixTimeMs, ViewHandle, EARTH_RADIUS_M,
};
use tokio::sync::Notify;

pub const T0: UnixTimeMs = UnixTimeMs(1_700_000_000_000);
pub const VIEW: ViewHandle = ViewHandle(42);

const METERS_PER_DEG_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

pub fn sample_at(lat: f64, lon: f64) -> LocationSample {
    LocationSample::new(lat, lon, 5.0, T0)
}

/// A sample `meters` due north of `base`.
pub fn north_of(base: &LocationSample, meters: f64) -> LocationSample {
    LocationSample::new(
        base.latitude + meters / METERS_PER_DEG_LAT,
        base.longitude,
        base.accuracy,
        base.captured_at,
    )
}

pub struct FakeLocationSource {
    permission: Mutex<Result<PermissionStatus, LocationError>>,
    fetch_results: Mutex<VecDeque<Result<LocationSample, LocationError>>>,
    hold_permission: AtomicBool,
    hold_fetch: AtomicBool,
    permission_release: Notify,
    fetch_release: Notify,
    pub permission_requests: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeLocationSource {
    pub fn granting() -> Self {
        Self::with_permission(Ok(PermissionStatus::Granted))
    }

    pub fn with_permission(permission: Result<PermissionStatus, LocationError>) -> Self {
        Self {
            permission: Mutex::new(permission),
            fetch_results: Mutex::new(VecDeque::new()),
            hold_permission: AtomicBool::new(false),
            hold_fetch: AtomicBool::new(false),
            permission_release: Notify::new(),
            fetch_release: Notify::new(),
            permission_requests: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Queues fetch results; an empty queue answers `Unavailable`.
    pub fn push_fetch(&self, result: Result<LocationSample, LocationError>) {
        self.fetch_results.lock().unwrap().push_back(result);
    }

    pub fn hold_permission(&self) {
        self.hold_permission.store(true, Ordering::SeqCst);
    }

    pub fn release_permission(&self) {
        self.permission_release.notify_one();
    }

    pub fn hold_fetch(&self) {
        self.hold_fetch.store(true, Ordering::SeqCst);
    }

    pub fn release_fetch(&self) {
        self.fetch_release.notify_one();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationSource for FakeLocationSource {
    async fn request_permission(&self) -> Result<PermissionStatus, LocationError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        if self.hold_permission.load(Ordering::SeqCst) {
            self.permission_release.notified().await;
        }
        self.permission.lock().unwrap().clone()
    }

    async fn current_location(&self) -> Result<LocationSample, LocationError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_fetch.load(Ordering::SeqCst) {
            self.fetch_release.notified().await;
        }
        self.fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LocationError::Unavailable("no fix".into())))
    }
}

type DispatchHook = Box<dyn FnOnce(&RendererCommand) + Send>;

#[derive(Default)]
pub struct RecordingRenderer {
    stale: AtomicBool,
    fail_with: Mutex<Option<RendererError>>,
    commands: Mutex<Vec<(ViewHandle, RendererCommand)>>,
    on_dispatch: Mutex<Option<(u32, DispatchHook)>>,
}

impl RecordingRenderer {
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn fail_with(&self, error: RendererError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// Runs `hook` from inside the next dispatch of command `id`, the way a
    /// native view reports events while handling a command.
    pub fn call_back_once<F>(&self, id: u32, hook: F)
    where
        F: FnOnce(&RendererCommand) + Send + 'static,
    {
        *self.on_dispatch.lock().unwrap() = Some((id, Box::new(hook)));
    }

    pub fn commands(&self) -> Vec<RendererCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn commands_with_id(&self, id: u32) -> Vec<RendererCommand> {
        self.commands()
            .into_iter()
            .filter(|command| command.id() == id)
            .collect()
    }
}

impl RendererSink for RecordingRenderer {
    fn is_handle_valid(&self, _handle: ViewHandle) -> bool {
        !self.stale.load(Ordering::SeqCst)
    }

    fn dispatch(&self, handle: ViewHandle, command: &RendererCommand) -> Result<(), RendererError> {
        if let Some(error) = self.fail_with.lock().unwrap().clone() {
            return Err(error);
        }
        self.commands.lock().unwrap().push((handle, command.clone()));

        let hook = {
            let mut on_dispatch = self.on_dispatch.lock().unwrap();
            match on_dispatch.take() {
                Some((id, hook)) if id == command.id() => Some(hook),
                other => {
                    *on_dispatch = other;
                    None
                }
            }
        };
        if let Some(hook) = hook {
            hook(command);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub updates: Mutex<Vec<LocationSample>>,
    pub map_ready: AtomicUsize,
    pub notices: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

impl UiCollaborator for RecordingUi {
    fn on_location_update(&self, sample: &LocationSample) {
        self.updates.lock().unwrap().push(*sample);
    }

    fn on_map_ready(&self) {
        self.map_ready.fetch_add(1, Ordering::SeqCst);
    }

    fn show_permission_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub controller: TrackingController,
    pub location: Arc<FakeLocationSource>,
    pub renderer: Arc<RecordingRenderer>,
    pub ui: Arc<RecordingUi>,
}

impl Harness {
    /// Must be called inside a tokio runtime; the clock follows tokio time.
    pub fn new(location: FakeLocationSource) -> Self {
        Self::with_config(location, TrackingConfig::default())
    }

    pub fn with_config(location: FakeLocationSource, config: TrackingConfig) -> Self {
        let location = Arc::new(location);
        let renderer = Arc::new(RecordingRenderer::default());
        let ui = Arc::new(RecordingUi::default());
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::anchored_at(T0));
        let caps = Capabilities::new(location.clone(), renderer.clone(), ui.clone())
            .with_clock(clock);
        let controller = TrackingController::new(config, caps).expect("controller");
        Self {
            controller,
            location,
            renderer,
            ui,
        }
    }
}
