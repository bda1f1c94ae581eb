//! Location & route update controller.
//!
//! Purely reactive: every entry point runs to completion or suspends only on
//! the location source. State changes re-check liveness under the state lock,
//! and teardown flips the liveness flag under that same lock. Renderer
//! commands are resolved under the lock but sent after releasing it, with a
//! second liveness check, so the view may call back in from `dispatch`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::capabilities::{
    Capabilities, LocationError, PermissionStatus, RendererCommand, ViewHandle,
};
use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::gate::{RedrawGate, RouteBookkeeping, UpdateGate};
use crate::geo::{Destination, LatLon, LocationSample, UnixTimeMs};
use crate::lock_unpoisoned;
use crate::metrics::{ControllerMetrics, MetricsSnapshot};
use crate::timers::{TimerId, TimerSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Initializing,
    PermissionPending,
    Active,
    TornDown,
}

impl LifecycleState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::TornDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleOrigin {
    Pushed,
    Fetched,
}

impl SampleOrigin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pushed => "pushed",
            Self::Fetched => "fetched",
        }
    }
}

/// A scheduled draw. Its deadline is fixed at scheduling; origin and
/// destination follow the newest inputs until it fires.
#[derive(Debug, Clone, Copy)]
struct PendingRoute {
    timer: TimerId,
    generation: u64,
    origin: LatLon,
    destination: Destination,
}

#[derive(Debug, Default)]
struct ControllerState {
    lifecycle: LifecycleState,
    permission: Option<PermissionStatus>,
    view: Option<ViewHandle>,
    last_accepted_location: Option<LocationSample>,
    last_accepted_at: Option<UnixTimeMs>,
    route: RouteBookkeeping,
    destination: Option<Destination>,
    pending_route: Option<PendingRoute>,
    route_generation: u64,
    recorded_generation: u64,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub controller_id: Uuid,
    pub lifecycle: LifecycleState,
    pub is_active: bool,
    pub permission: Option<PermissionStatus>,
    pub view: Option<ViewHandle>,
    pub last_accepted_location: Option<LocationSample>,
    pub last_accepted_at: Option<UnixTimeMs>,
    pub route: RouteBookkeeping,
    pub destination: Option<Destination>,
    pub route_draw_pending: bool,
}

struct Inner {
    id: Uuid,
    config: TrackingConfig,
    update_gate: UpdateGate,
    redraw_gate: RedrawGate,
    caps: Capabilities,
    timers: TimerSet,
    active: AtomicBool,
    state: Mutex<ControllerState>,
    metrics: ControllerMetrics,
}

/// Cheap to clone; all clones drive the same controller.
#[derive(Clone)]
pub struct TrackingController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TrackingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingController")
            .field("id", &self.inner.id)
            .field("active", &self.inner.is_active())
            .finish_non_exhaustive()
    }
}

impl TrackingController {
    /// Builds a controller on the current tokio runtime.
    pub fn new(config: TrackingConfig, caps: Capabilities) -> Result<Self, TrackingError> {
        let runtime =
            Handle::try_current().map_err(|e| TrackingError::NoRuntime(e.to_string()))?;
        Self::with_runtime(config, caps, runtime)
    }

    pub fn with_runtime(
        config: TrackingConfig,
        caps: Capabilities,
        runtime: Handle,
    ) -> Result<Self, TrackingError> {
        config.validate()?;

        let inner = Inner {
            id: Uuid::new_v4(),
            update_gate: UpdateGate::from_config(&config),
            redraw_gate: RedrawGate::from_config(&config),
            config,
            caps,
            timers: TimerSet::new(runtime),
            active: AtomicBool::new(true),
            state: Mutex::new(ControllerState::default()),
            metrics: ControllerMetrics::new(),
        };
        info!(controller_id = %inner.id, "tracking controller created");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.lock_state().lifecycle
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.inner.lock_state();
        ControllerSnapshot {
            controller_id: self.inner.id,
            lifecycle: state.lifecycle,
            is_active: self.inner.is_active(),
            permission: state.permission,
            view: state.view,
            last_accepted_location: state.last_accepted_location,
            last_accepted_at: state.last_accepted_at,
            route: state.route,
            destination: state.destination,
            route_draw_pending: state.pending_route.is_some(),
        }
    }

    /// `Initializing -> PermissionPending -> Active`. Denial is reported to
    /// the UI and leaves the controller active without automatic fetches.
    pub async fn mount(&self) -> LifecycleState {
        self.inner.mount().await
    }

    /// Renderer-emitted location event. Returns whether the sample was accepted.
    pub fn on_location_pushed(&self, sample: LocationSample) -> bool {
        self.inner.ingest(sample, SampleOrigin::Pushed)
    }

    /// One imperative fetch. Returns the sample only if it was applied; a
    /// failed fetch or one that resolved after teardown yields `None`.
    pub async fn fetch_once(&self) -> Option<LocationSample> {
        self.inner.fetch_once().await
    }

    pub async fn on_renderer_ready(&self, handle: ViewHandle) {
        self.inner.on_renderer_ready(handle).await;
    }

    /// Re-evaluates the route. Returns whether a route draw is now pending
    /// toward these inputs, either newly scheduled or retargeted.
    pub fn on_destination_or_location_changed(
        &self,
        destination: Option<Destination>,
        current_location: Option<LatLon>,
    ) -> bool {
        self.inner
            .on_destination_or_location_changed(destination, current_location)
    }

    /// Records the destination and re-evaluates against the last accepted location.
    pub fn set_destination(&self, destination: Option<Destination>) -> bool {
        self.inner.set_destination(destination)
    }

    pub fn on_permission_changed(&self, status: PermissionStatus) {
        self.inner.on_permission_changed(status);
    }

    pub fn attach_view(&self, handle: ViewHandle) {
        self.inner.attach_view(handle);
    }

    pub fn detach_view(&self) {
        self.inner.detach_view();
    }

    /// Idempotent. Cancels every pending timer; late async results become no-ops.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        lock_unpoisoned(&self.state)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The single liveness check: controller active and view handle still valid.
    fn live_view(&self, state: &ControllerState) -> Option<ViewHandle> {
        if !self.is_active() {
            return None;
        }
        let view = state.view?;
        self.caps.renderer.is_handle_valid(view).then_some(view)
    }

    /// Sends `command` to a view resolved by [`Self::live_view`]. Must be
    /// called without the state lock so the sink can call back in.
    fn dispatch(&self, view: Option<ViewHandle>, command: &RendererCommand) -> bool {
        let Some(view) = view.filter(|_| self.is_active()) else {
            ControllerMetrics::incr(&self.metrics.commands_suppressed);
            debug!(
                controller_id = %self.id,
                command = command.name(),
                "renderer not live, command skipped"
            );
            return false;
        };

        match self.caps.renderer.dispatch(view, command) {
            Ok(()) => true,
            Err(e) => {
                ControllerMetrics::incr(&self.metrics.commands_suppressed);
                TrackingError::from(e).report(command.name());
                false
            }
        }
    }

    #[instrument(skip(self), fields(controller_id = %self.id))]
    async fn mount(self: &Arc<Self>) -> LifecycleState {
        {
            let mut state = self.lock_state();
            match state.lifecycle {
                LifecycleState::Initializing => {}
                LifecycleState::TornDown => return LifecycleState::TornDown,
                other => {
                    warn!(lifecycle = ?other, "mount called more than once");
                    return other;
                }
            }
            state.lifecycle = LifecycleState::PermissionPending;
        }

        let result = self.caps.location.request_permission().await;

        let status = {
            let mut state = self.lock_state();
            if !self.is_active() {
                debug!("permission resolved after teardown, discarded");
                return state.lifecycle;
            }
            let status = result.unwrap_or_else(|e| {
                TrackingError::from(e).report("request_permission");
                PermissionStatus::Denied
            });
            state.permission = Some(status);
            state.lifecycle = LifecycleState::Active;
            status
        };

        if status.is_usable() {
            info!(?status, "location permission granted");
            self.schedule_fetch();
        } else {
            info!(?status, "location permission denied, continuing without auto-location");
            self.notify_permission_denied();
        }
        self.lock_state().lifecycle
    }

    fn permission_denied(&self) -> bool {
        self.lock_state()
            .permission
            .is_some_and(PermissionStatus::is_denied)
    }

    fn notify_permission_denied(&self) {
        let message = TrackingError::from(LocationError::PermissionDenied).user_facing_message();
        self.caps.ui.show_permission_notice(&message);
    }

    fn schedule_fetch(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let scheduled = self
            .timers
            .schedule(self.config.initial_fetch_delay(), async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.permission_denied() {
                    debug!(controller_id = %inner.id, "permission revoked, scheduled fetch dropped");
                    return;
                }
                inner.fetch_once().await;
            });
        if scheduled.is_none() {
            debug!(controller_id = %self.id, "timers closed, fetch not scheduled");
        }
    }

    #[instrument(skip(self), fields(controller_id = %self.id))]
    async fn fetch_once(self: &Arc<Self>) -> Option<LocationSample> {
        if self.live_view(&self.lock_state()).is_none() {
            debug!("renderer not live, fetch skipped");
            return None;
        }

        let result = self.caps.location.current_location().await;

        let sample = match result {
            Ok(sample) => sample,
            Err(e) => {
                ControllerMetrics::incr(&self.metrics.fetches_failed);
                TrackingError::from(e).report("fetch_once");
                return None;
            }
        };

        if self.live_view(&self.lock_state()).is_none() {
            ControllerMetrics::incr(&self.metrics.fetches_discarded);
            debug!("location fetch resolved after teardown, discarded");
            return None;
        }

        ControllerMetrics::incr(&self.metrics.fetches_completed);
        self.ingest(sample, SampleOrigin::Fetched).then_some(sample)
    }

    fn ingest(self: &Arc<Self>, sample: LocationSample, origin: SampleOrigin) -> bool {
        ControllerMetrics::incr(&self.metrics.samples_received);

        if let Err(e) = sample.position().validate() {
            ControllerMetrics::incr(&self.metrics.samples_invalid);
            warn!(controller_id = %self.id, origin = origin.as_str(), error = %e, "dropping invalid location sample");
            return false;
        }

        if let Some(max_accuracy) = self.config.max_accuracy_m {
            if sample.accuracy.is_nan() || sample.accuracy > max_accuracy {
                ControllerMetrics::incr(&self.metrics.samples_rejected);
                debug!(
                    controller_id = %self.id,
                    accuracy = sample.accuracy,
                    max_accuracy,
                    "sample accuracy too coarse"
                );
                return false;
            }
        }

        let now = self.caps.clock.now();
        {
            let mut state = self.lock_state();
            if !self.is_active() {
                return false;
            }
            if origin == SampleOrigin::Pushed
                && !self.update_gate.should_accept(
                    &sample,
                    state.last_accepted_location.as_ref(),
                    state.last_accepted_at,
                    now,
                )
            {
                ControllerMetrics::incr(&self.metrics.samples_rejected);
                return false;
            }
            state.last_accepted_location = Some(sample);
            state.last_accepted_at = Some(now);
        }

        ControllerMetrics::incr(&self.metrics.samples_accepted);
        debug!(
            controller_id = %self.id,
            origin = origin.as_str(),
            lat = sample.latitude,
            lon = sample.longitude,
            "location accepted"
        );

        if self.is_active() {
            self.caps.ui.on_location_update(&sample);
        }

        let view = self.live_view(&self.lock_state());
        let recenter = RendererCommand::Recenter {
            at: sample.position(),
        };
        if self.dispatch(view, &recenter) {
            ControllerMetrics::incr(&self.metrics.recenters_dispatched);
        }

        // The sink may have pushed a newer sample during dispatch.
        let mut state = self.lock_state();
        let destination = state.destination;
        let current = state.last_accepted_location.map(|s| s.position());
        self.evaluate_route_locked(&mut state, destination, current, now);
        true
    }

    #[instrument(skip(self), fields(controller_id = %self.id))]
    async fn on_renderer_ready(self: &Arc<Self>, handle: ViewHandle) {
        {
            let mut state = self.lock_state();
            if !self.is_active() {
                return;
            }
            state.view = Some(handle);
        }

        self.caps.ui.on_map_ready();

        let known = self.lock_state().last_accepted_location;
        let permission_denied = self.permission_denied();

        match known {
            Some(sample) => {
                let view = self.live_view(&self.lock_state());
                let recenter = RendererCommand::Recenter {
                    at: sample.position(),
                };
                if self.dispatch(view, &recenter) {
                    ControllerMetrics::incr(&self.metrics.recenters_dispatched);
                }
            }
            None if permission_denied => {
                debug!("no known location and permission denied, not fetching");
            }
            None => {
                self.fetch_once().await;
            }
        }
    }

    fn on_destination_or_location_changed(
        self: &Arc<Self>,
        destination: Option<Destination>,
        current_location: Option<LatLon>,
    ) -> bool {
        let now = self.caps.clock.now();
        let mut state = self.lock_state();
        if !self.is_active() {
            return false;
        }
        state.destination = destination;
        self.evaluate_route_locked(&mut state, destination, current_location, now)
    }

    fn set_destination(self: &Arc<Self>, destination: Option<Destination>) -> bool {
        let now = self.caps.clock.now();
        let mut state = self.lock_state();
        if !self.is_active() {
            return false;
        }
        state.destination = destination;
        let current = state.last_accepted_location.map(|s| s.position());
        self.evaluate_route_locked(&mut state, destination, current, now)
    }

    /// Schedules a route draw when both inputs are known and the redraw gate
    /// allows it. A draw already pending keeps its deadline and is retargeted
    /// to the newest inputs, so a steady stream of changes cannot postpone it.
    fn evaluate_route_locked(
        self: &Arc<Self>,
        state: &mut ControllerState,
        destination: Option<Destination>,
        current_location: Option<LatLon>,
        now: UnixTimeMs,
    ) -> bool {
        if !self.is_active() {
            return false;
        }

        let Some(destination) = destination else {
            if let Some(pending) = state.pending_route.take() {
                self.timers.cancel(pending.timer);
                debug!(controller_id = %self.id, "destination cleared, pending route draw cancelled");
            }
            return false;
        };
        let Some(origin) = current_location else {
            return false;
        };

        if let Some(pending) = state.pending_route.as_mut() {
            pending.origin = origin;
            pending.destination = destination;
            ControllerMetrics::incr(&self.metrics.route_draws_retargeted);
            return true;
        }

        if !self.redraw_gate.should_redraw(&state.route, origin, now) {
            return false;
        }

        let first_draw = !state.route.route_ever_drawn();
        let delay = self.config.route_delay(first_draw);
        state.route_generation += 1;
        let generation = state.route_generation;

        let weak = Arc::downgrade(self);
        let Some(timer) = self.timers.schedule(delay, async move {
            if let Some(inner) = weak.upgrade() {
                inner.fire_route_draw(generation);
            }
        }) else {
            return false;
        };

        state.pending_route = Some(PendingRoute {
            timer,
            generation,
            origin,
            destination,
        });
        ControllerMetrics::incr(&self.metrics.route_draws_scheduled);
        debug!(
            controller_id = %self.id,
            first_draw,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "route draw scheduled"
        );
        true
    }

    fn fire_route_draw(&self, generation: u64) {
        let (view, pending, is_update) = {
            let mut state = self.lock_state();
            if !self.is_active() {
                return;
            }
            let pending = match state.pending_route {
                Some(pending) if pending.generation == generation => pending,
                _ => {
                    debug!(controller_id = %self.id, generation, "superseded route draw skipped");
                    return;
                }
            };
            state.pending_route = None;
            (self.live_view(&state), pending, state.route.route_ever_drawn())
        };

        let command = RendererCommand::DrawRoute {
            from: pending.origin,
            to: pending.destination.position(),
            profile: self.config.route_profile,
            is_update,
        };
        if !self.dispatch(view, &command) {
            return;
        }
        ControllerMetrics::incr(&self.metrics.route_draws_dispatched);

        let mut state = self.lock_state();
        if !self.is_active() || generation <= state.recorded_generation {
            return;
        }
        state.recorded_generation = generation;
        state.route.record_draw(pending.origin, self.caps.clock.now());
        info!(
            controller_id = %self.id,
            is_update,
            profile = %self.config.route_profile,
            "route draw dispatched"
        );
    }

    fn on_permission_changed(self: &Arc<Self>, status: PermissionStatus) {
        let previous = {
            let mut state = self.lock_state();
            if !self.is_active() {
                return;
            }
            state.permission.replace(status)
        };

        let was_usable = previous.is_some_and(PermissionStatus::is_usable);
        let was_denied = previous.is_some_and(PermissionStatus::is_denied);
        if status.is_usable() && !was_usable {
            info!(controller_id = %self.id, ?status, "location permission obtained");
            self.schedule_fetch();
        } else if status.is_denied() && !was_denied {
            info!(controller_id = %self.id, ?status, "location permission revoked");
            self.notify_permission_denied();
        }
    }

    fn attach_view(&self, handle: ViewHandle) {
        let mut state = self.lock_state();
        if self.is_active() {
            state.view = Some(handle);
        }
    }

    fn detach_view(&self) {
        let mut state = self.lock_state();
        if self.is_active() {
            state.view = None;
        }
    }

    fn teardown(&self) {
        {
            let mut state = self.lock_state();
            if state.lifecycle.is_terminal() {
                return;
            }
            self.active.store(false, Ordering::Release);
            state.lifecycle = LifecycleState::TornDown;
            state.pending_route = None;
        }
        let cancelled = self.timers.close();
        info!(controller_id = %self.id, cancelled, "tracking controller torn down");
    }
}
