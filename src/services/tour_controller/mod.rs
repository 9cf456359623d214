//! Tour scene controller - room navigation state machine
//!
//! The controller is the only writer of the scene surfaces. A switch runs:
//! - reject rooms without a photo (state untouched)
//! - `Loading(room)` with a fresh request sequence number
//! - probe the photo, then apply it as sky texture (panoramic) or on the
//!   flat plane, unless a later switch has started meanwhile
//! - record the room as current, settle, then `Ready(room)`
//!
//! Switches may overlap. The last requested room wins: every result is
//! compared against the latest sequence number before it touches the scene
//! or the published state. In-flight probes are not cancelled.

#[cfg(test)]
mod tests;

use crate::domain::property::{Property, RoomCatalog, RoomKind};
use crate::domain::tour::{SwitchOutcome, TourPhase, TourState};
use crate::domain::types::{ImageId, PropertyId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::api::ApiEndpoints;
use crate::io::image_probe::ImageProbe;
use crate::io::scene::{PlaneLayout, SceneHost};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Message published when a room image cannot be applied
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load room image";

/// Timing and layout knobs for the controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Delay between applying an image and reporting the room ready
    pub settle_delay: Duration,
    /// Upper bound on waiting for the scene to report ready at mount
    pub readiness_timeout: Duration,
    pub plane: PlaneLayout,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            readiness_timeout: config.readiness_timeout(),
            plane: PlaneLayout {
                position: config.plane_position(),
                width: config.plane_width(),
                height: config.plane_height(),
                double_sided: true,
            },
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Surface contents as last committed by a successful switch
#[derive(Debug, Clone, Default, PartialEq)]
struct Surfaces {
    sky: Option<String>,
    plane_image: Option<String>,
    plane_visible: bool,
}

impl Surfaces {
    fn showing(&self, url: &str, panoramic: bool) -> Self {
        if panoramic {
            Self { sky: Some(url.to_string()), plane_image: self.plane_image.clone(), plane_visible: false }
        } else {
            Self { sky: None, plane_image: Some(url.to_string()), plane_visible: true }
        }
    }
}

/// Scene surfaces plus the room whose image they currently show. `displayed`
/// only names rooms of the current listing.
struct SceneSlot {
    host: Box<dyn SceneHost>,
    surfaces: Surfaces,
    displayed: Option<RoomKind>,
}

pub struct TourController {
    property_id: RwLock<PropertyId>,
    catalog: RwLock<RoomCatalog>,
    probe: Arc<dyn ImageProbe>,
    api: ApiEndpoints,
    /// Never held across an await
    scene: Mutex<SceneSlot>,
    /// Sequence number of the latest switch request
    seq: AtomicU64,
    state: watch::Sender<TourState>,
    settings: ControllerSettings,
    metrics: Arc<Metrics>,
}

impl TourController {
    pub fn new(
        property: &Property,
        probe: Arc<dyn ImageProbe>,
        scene: Box<dyn SceneHost>,
        api: ApiEndpoints,
        settings: ControllerSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        let catalog = RoomCatalog::from_property(property);
        let (state, _) = watch::channel(TourState::new(catalog.initial_room()));
        Self {
            property_id: RwLock::new(property.id.clone()),
            catalog: RwLock::new(catalog),
            probe,
            api,
            scene: Mutex::new(SceneSlot { host: scene, surfaces: Surfaces::default(), displayed: None }),
            seq: AtomicU64::new(0),
            state,
            settings,
            metrics,
        }
    }

    /// Watch the published tour state
    pub fn subscribe(&self) -> watch::Receiver<TourState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TourState {
        self.state.borrow().clone()
    }

    pub fn catalog(&self) -> RoomCatalog {
        self.catalog.read().clone()
    }

    pub fn property_id(&self) -> PropertyId {
        self.property_id.read().clone()
    }

    pub fn current_room(&self) -> RoomKind {
        self.state.borrow().current_room
    }

    /// Spoken description of the room recorded as current
    pub fn describe_current(&self) -> &'static str {
        self.current_room().description()
    }

    #[inline]
    fn is_latest(&self, seq: u64) -> bool {
        self.seq.load(Ordering::Acquire) == seq
    }

    /// Wait for the scene to report ready, then show the initial room.
    /// A scene that never reports ready is tried anyway after the timeout.
    pub async fn mount(&self, mut scene_ready: watch::Receiver<bool>) -> SwitchOutcome {
        let wait = async { scene_ready.wait_for(|ready| *ready).await.map(|_| ()) };
        match tokio::time::timeout(self.settings.readiness_timeout, wait).await {
            Ok(Ok(())) => debug!("tour_scene_ready"),
            Ok(Err(_)) => warn!("tour_scene_readiness_closed"),
            Err(_) => warn!(
                timeout_ms = self.settings.readiness_timeout.as_millis() as u64,
                "tour_scene_readiness_timeout"
            ),
        }

        let initial = self.catalog.read().initial_room();
        info!(room = %initial, "tour_mounted");
        self.switch_to(initial).await
    }

    /// Replace the listing being toured. In-flight switches are invalidated
    /// and the tour returns to `Idle` on the new initial room; the scene keeps
    /// its last image until the next switch, but no room of the new listing
    /// counts as displayed.
    pub fn set_property(&self, property: &Property) {
        let catalog = RoomCatalog::from_property(property);
        let initial = catalog.initial_room();
        let available = catalog.available().count();

        *self.catalog.write() = catalog;
        *self.property_id.write() = property.id.clone();
        self.scene.lock().displayed = None;
        self.state.send_modify(|state| {
            self.seq.fetch_add(1, Ordering::AcqRel);
            *state = TourState::new(initial);
        });

        info!(
            property = %property.id,
            initial_room = %initial,
            available_rooms = available,
            "tour_property_changed"
        );
    }

    /// Switch by room id string as sent by buttons or voice targets
    pub async fn switch_to_id(&self, room_id: &str) -> SwitchOutcome {
        match room_id.parse::<RoomKind>() {
            Ok(room) => self.switch_to(room).await,
            Err(e) => {
                self.metrics.record_switch_requested();
                self.metrics.record_switch_rejected();
                warn!(room_id = %room_id, error = %e, "tour_switch_rejected");
                SwitchOutcome::Rejected
            }
        }
    }

    pub async fn switch_to(&self, room: RoomKind) -> SwitchOutcome {
        self.metrics.record_switch_requested();

        let Some(image_id) = self.switchable_image(room) else {
            self.metrics.record_switch_rejected();
            warn!(room = %room, "tour_switch_rejected");
            return SwitchOutcome::Rejected;
        };

        // Taking the sequence number and publishing Loading together keeps the
        // published target equal to the latest request
        let mut seq = 0;
        self.state.send_modify(|state| {
            seq = self.seq.fetch_add(1, Ordering::AcqRel) + 1;
            state.phase = TourPhase::Loading { target: room };
        });
        info!(room = %room, image_id = %image_id, seq = seq, "tour_room_loading");

        let probed = self.probe.probe(&image_id).await;
        if !self.is_latest(seq) {
            return self.superseded(room, seq);
        }

        let url = self.api.image_url(&image_id);
        {
            let mut scene = self.scene.lock();
            if !self.is_latest(seq) {
                drop(scene);
                return self.superseded(room, seq);
            }

            if let Err(e) = apply_image(scene.host.as_mut(), &url, probed.is_panoramic, &self.settings.plane)
            {
                let slot = &mut *scene;
                restore_surfaces(slot.host.as_mut(), &slot.surfaces);
                let last_good = scene.displayed;
                drop(scene);
                return self.failed(room, seq, last_good, e);
            }

            scene.surfaces = scene.surfaces.showing(&url, probed.is_panoramic);
            scene.displayed = Some(room);
            self.state.send_modify(|state| state.current_room = room);
        }

        self.metrics.record_switch_applied(probed.is_panoramic);
        info!(
            room = %room,
            seq = seq,
            panoramic = probed.is_panoramic,
            width = probed.width,
            height = probed.height,
            "tour_room_applied"
        );

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let settled = self.state.send_if_modified(|state| {
            if !self.is_latest(seq) {
                return false;
            }
            state.phase = TourPhase::Ready { room };
            true
        });
        if !settled {
            return self.superseded(room, seq);
        }

        info!(room = %room, seq = seq, "tour_room_ready");
        SwitchOutcome::Applied { room, panoramic: probed.is_panoramic }
    }

    /// Photo of a room that may be switched to
    fn switchable_image(&self, room: RoomKind) -> Option<ImageId> {
        let catalog = self.catalog.read();
        let descriptor = catalog.get(room);
        if !descriptor.available {
            return None;
        }
        descriptor.image_id.clone()
    }

    fn superseded(&self, room: RoomKind, seq: u64) -> SwitchOutcome {
        self.metrics.record_switch_superseded();
        debug!(room = %room, seq = seq, "tour_switch_superseded");
        SwitchOutcome::Superseded
    }

    fn failed(
        &self,
        room: RoomKind,
        seq: u64,
        last_good: Option<RoomKind>,
        e: anyhow::Error,
    ) -> SwitchOutcome {
        let reason = format!("{e:#}");
        self.metrics.record_switch_failed();
        error!(room = %room, seq = seq, error = %reason, "tour_room_load_failed");

        self.state.send_if_modified(|state| {
            if !self.is_latest(seq) {
                return false;
            }
            state.phase = TourPhase::Error { message: LOAD_FAILED_MESSAGE.to_string(), last_good };
            true
        });
        SwitchOutcome::Failed(reason)
    }
}

/// Put an image on screen. Panoramas become the sky and hide the plane; flat
/// images go on the plane (built on first use) and clear the sky. Stops at the
/// first failing call; the caller restores the previous surfaces.
fn apply_image(
    host: &mut dyn SceneHost,
    url: &str,
    panoramic: bool,
    layout: &PlaneLayout,
) -> anyhow::Result<()> {
    if panoramic {
        host.set_sky_texture(url)?;
        if host.plane_visible() {
            host.set_plane_visible(false)?;
        }
    } else {
        if !host.has_plane() {
            host.create_plane(layout)?;
        }
        host.set_plane_image(url)?;
        host.set_plane_visible(true)?;
        host.clear_sky_texture()?;
    }
    Ok(())
}

/// Put back the last committed surfaces after a partial update. Every step is
/// attempted; failures are logged since the switch has already failed.
fn restore_surfaces(host: &mut dyn SceneHost, surfaces: &Surfaces) {
    let sky = match &surfaces.sky {
        Some(url) => host.set_sky_texture(url),
        None => host.clear_sky_texture(),
    };
    if let Err(e) = sky {
        warn!(error = %format!("{e:#}"), "tour_scene_restore_failed");
    }

    if !host.has_plane() {
        return;
    }
    if let Some(url) = &surfaces.plane_image {
        if let Err(e) = host.set_plane_image(url) {
            warn!(error = %format!("{e:#}"), "tour_scene_restore_failed");
        }
    }
    if host.plane_visible() != surfaces.plane_visible {
        if let Err(e) = host.set_plane_visible(surfaces.plane_visible) {
            warn!(error = %format!("{e:#}"), "tour_scene_restore_failed");
        }
    }
}
