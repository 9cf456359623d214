//! Tests for the TourController module

use super::*;
use crate::domain::types::ImageTypeResult;
use crate::io::scene::HeadlessScene;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::atomic::AtomicBool;

const BASE: &str = "http://images.test";

/// Probe answering from a fixed table after a per-image delay
#[derive(Default)]
struct ScriptedProbe {
    answers: FxHashMap<ImageId, (Duration, ImageTypeResult)>,
}

impl ScriptedProbe {
    fn with(mut self, id: &str, delay_ms: u64, width: u32, height: u32) -> Self {
        self.answers.insert(
            ImageId::new(id),
            (Duration::from_millis(delay_ms), ImageTypeResult::from_dimensions(width, height)),
        );
        self
    }
}

#[async_trait]
impl ImageProbe for ScriptedProbe {
    async fn probe(&self, id: &ImageId) -> ImageTypeResult {
        match self.answers.get(id) {
            Some((delay, result)) => {
                tokio::time::sleep(*delay).await;
                *result
            }
            None => ImageTypeResult::unloaded(),
        }
    }
}

/// Headless scene whose image writes fail while `fail` is set. Sky clearing
/// and plane visibility can be failed on their own.
#[derive(Clone, Default)]
struct FlakyScene {
    inner: HeadlessScene,
    fail: Arc<AtomicBool>,
    fail_clear_sky: Arc<AtomicBool>,
    fail_visibility: Arc<AtomicBool>,
}

impl FlakyScene {
    fn check(&self) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("render target unavailable");
        }
        Ok(())
    }
}

impl SceneHost for FlakyScene {
    fn set_sky_texture(&mut self, url: &str) -> anyhow::Result<()> {
        self.check()?;
        self.inner.set_sky_texture(url)
    }

    fn clear_sky_texture(&mut self) -> anyhow::Result<()> {
        if self.fail_clear_sky.load(Ordering::SeqCst) {
            anyhow::bail!("sky detach failed");
        }
        self.inner.clear_sky_texture()
    }

    fn has_plane(&self) -> bool {
        self.inner.has_plane()
    }

    fn create_plane(&mut self, layout: &PlaneLayout) -> anyhow::Result<()> {
        self.inner.create_plane(layout)
    }

    fn set_plane_image(&mut self, url: &str) -> anyhow::Result<()> {
        self.check()?;
        self.inner.set_plane_image(url)
    }

    fn set_plane_visible(&mut self, visible: bool) -> anyhow::Result<()> {
        if self.fail_visibility.load(Ordering::SeqCst) {
            anyhow::bail!("plane visibility failed");
        }
        self.inner.set_plane_visible(visible)
    }

    fn plane_visible(&self) -> bool {
        self.inner.plane_visible()
    }
}

struct Harness {
    controller: Arc<TourController>,
    scene: FlakyScene,
    metrics: Arc<Metrics>,
}

fn settings(settle_ms: u64) -> ControllerSettings {
    ControllerSettings {
        settle_delay: Duration::from_millis(settle_ms),
        readiness_timeout: Duration::from_millis(200),
        plane: PlaneLayout::default(),
    }
}

fn harness(property: &Property, probe: ScriptedProbe, settings: ControllerSettings) -> Harness {
    let scene = FlakyScene::default();
    let metrics = Arc::new(Metrics::new());
    let controller = TourController::new(
        property,
        Arc::new(probe),
        Box::new(scene.clone()),
        ApiEndpoints::new(BASE),
        settings,
        metrics.clone(),
    );
    Harness { controller: Arc::new(controller), scene, metrics }
}

fn url(id: &str) -> String {
    format!("{BASE}/api/images/{id}")
}

fn full_property() -> Property {
    Property::new("1", "Modern Downtown Apartment", "Downtown District")
        .with_image(RoomKind::Kitchen, "kitchen-pano")
        .with_image(RoomKind::LivingRoom, "living-flat")
        .with_image(RoomKind::Bedroom, "bedroom-flat")
        .with_image(RoomKind::Bathroom, "bathroom-pano")
}

fn full_probe() -> ScriptedProbe {
    ScriptedProbe::default()
        .with("kitchen-pano", 0, 4000, 2000)
        .with("living-flat", 0, 1920, 1080)
        .with("bedroom-flat", 0, 1200, 900)
        .with("bathroom-pano", 0, 3600, 1800)
}

// ============================================================================
// Applying images
// ============================================================================

#[tokio::test]
async fn test_panoramic_room_becomes_sky() {
    let h = harness(&full_property(), full_probe(), settings(0));

    let outcome = h.controller.switch_to(RoomKind::Kitchen).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Kitchen, panoramic: true });

    let state = h.controller.state();
    assert_eq!(state.current_room, RoomKind::Kitchen);
    assert_eq!(state.phase, TourPhase::Ready { room: RoomKind::Kitchen });
    assert!(!state.is_loading());

    let snapshot = h.scene.inner.snapshot();
    assert_eq!(snapshot.sky_texture, Some(url("kitchen-pano")));
    assert!(snapshot.plane.is_none());
}

#[tokio::test]
async fn test_flat_rooms_share_one_lazily_created_plane() {
    let h = harness(&full_property(), full_probe(), settings(0));

    h.controller.switch_to(RoomKind::LivingRoom).await;
    let outcome = h.controller.switch_to(RoomKind::Bedroom).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Bedroom, panoramic: false });

    let snapshot = h.scene.inner.snapshot();
    assert_eq!(snapshot.planes_created, 1);
    assert_eq!(snapshot.sky_texture, None);
    let plane = snapshot.plane.as_ref().unwrap();
    assert!(plane.visible);
    assert_eq!(plane.image, Some(url("bedroom-flat")));
    assert_eq!(plane.layout.position, [0.0, 2.0, -5.0]);
    assert_eq!(snapshot.displayed_image(), Some(url("bedroom-flat").as_str()));
}

#[tokio::test]
async fn test_panorama_after_flat_hides_plane() {
    let h = harness(&full_property(), full_probe(), settings(0));

    h.controller.switch_to(RoomKind::LivingRoom).await;
    h.controller.switch_to(RoomKind::Bathroom).await;

    let snapshot = h.scene.inner.snapshot();
    assert_eq!(snapshot.sky_texture, Some(url("bathroom-pano")));
    assert!(!snapshot.plane.as_ref().unwrap().visible);
    assert_eq!(snapshot.displayed_image(), Some(url("bathroom-pano").as_str()));
}

#[tokio::test]
async fn test_unloaded_probe_renders_flat() {
    let property = Property::new("p", "P", "A").with_image(RoomKind::Kitchen, "unknown");
    let h = harness(&property, ScriptedProbe::default(), settings(0));

    let outcome = h.controller.switch_to(RoomKind::Kitchen).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Kitchen, panoramic: false });
    assert_eq!(h.scene.inner.snapshot().displayed_image(), Some(url("unknown").as_str()));
}

// ============================================================================
// Rejection
// ============================================================================

#[tokio::test]
async fn test_unavailable_room_leaves_state_unchanged() {
    let property = Property::new("p", "P", "A").with_image(RoomKind::Kitchen, "kitchen-pano");
    let h = harness(&property, full_probe(), settings(0));
    h.controller.switch_to(RoomKind::Kitchen).await;

    let before = h.controller.state();
    let scene_before = h.scene.inner.snapshot();

    assert_eq!(h.controller.switch_to(RoomKind::Bathroom).await, SwitchOutcome::Rejected);
    assert_eq!(h.controller.switch_to_id("garage").await, SwitchOutcome::Rejected);

    assert_eq!(h.controller.state(), before);
    assert_eq!(h.scene.inner.snapshot(), scene_before);
    assert_eq!(h.metrics.switch_rejected(), 2);
}

#[tokio::test]
async fn test_switch_by_id() {
    let h = harness(&full_property(), full_probe(), settings(0));
    let outcome = h.controller.switch_to_id("living-room").await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::LivingRoom, panoramic: false });
}

// ============================================================================
// Overlapping switches
// ============================================================================

#[tokio::test]
async fn test_later_switch_wins_over_slower_probe() {
    let probe = ScriptedProbe::default()
        .with("kitchen-pano", 100, 4000, 2000)
        .with("bathroom-pano", 10, 3600, 1800);
    let h = harness(&full_property(), probe, settings(0));

    let (first, second) = tokio::join!(
        h.controller.switch_to(RoomKind::Kitchen),
        h.controller.switch_to(RoomKind::Bathroom)
    );

    assert_eq!(first, SwitchOutcome::Superseded);
    assert_eq!(second, SwitchOutcome::Applied { room: RoomKind::Bathroom, panoramic: true });

    let state = h.controller.state();
    assert_eq!(state.phase, TourPhase::Ready { room: RoomKind::Bathroom });
    assert_eq!(state.current_room, RoomKind::Bathroom);
    assert_eq!(h.scene.inner.snapshot().sky_texture, Some(url("bathroom-pano")));
    assert_eq!(h.metrics.switch_superseded(), 1);
}

#[tokio::test]
async fn test_settle_delay_keeps_loading_until_ready() {
    let h = harness(&full_property(), full_probe(), settings(200));
    let mut rx = h.controller.subscribe();

    let controller = h.controller.clone();
    let handle = tokio::spawn(async move { controller.switch_to(RoomKind::Bathroom).await });

    let applied = rx.wait_for(|s| s.current_room == RoomKind::Bathroom).await.unwrap().clone();
    assert!(applied.is_loading());
    assert_eq!(h.scene.inner.snapshot().sky_texture, Some(url("bathroom-pano")));

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Bathroom, panoramic: true });
    assert_eq!(h.controller.state().ready_room(), Some(RoomKind::Bathroom));
}

#[tokio::test]
async fn test_switch_during_settle_supersedes_ready() {
    let h = harness(&full_property(), full_probe(), settings(150));

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.switch_to(RoomKind::Kitchen).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h.controller.switch_to(RoomKind::LivingRoom).await;

    assert_eq!(first.await.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(second, SwitchOutcome::Applied { room: RoomKind::LivingRoom, panoramic: false });
    assert_eq!(h.controller.state().phase, TourPhase::Ready { room: RoomKind::LivingRoom });
}

// ============================================================================
// Failure
// ============================================================================

#[tokio::test]
async fn test_scene_failure_keeps_last_good_room() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::Kitchen).await;

    h.scene.fail.store(true, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::Bathroom).await;
    assert!(matches!(outcome, SwitchOutcome::Failed(ref reason) if reason.contains("render target")));

    let state = h.controller.state();
    assert_eq!(state.current_room, RoomKind::Kitchen);
    assert_eq!(
        state.phase,
        TourPhase::Error {
            message: LOAD_FAILED_MESSAGE.to_string(),
            last_good: Some(RoomKind::Kitchen)
        }
    );
    assert_eq!(state.error(), Some(LOAD_FAILED_MESSAGE));
    // Fail-stale: the kitchen panorama is still on screen
    assert_eq!(h.scene.inner.snapshot().displayed_image(), Some(url("kitchen-pano").as_str()));

    // Retrying once the scene recovers clears the error
    h.scene.fail.store(false, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::Bathroom).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Bathroom, panoramic: true });
    assert_eq!(h.controller.state().error(), None);
}

#[tokio::test]
async fn test_failure_before_any_render_has_no_last_good() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.scene.fail.store(true, Ordering::SeqCst);

    h.controller.switch_to(RoomKind::LivingRoom).await;
    let state = h.controller.state();
    assert!(matches!(state.phase, TourPhase::Error { last_good: None, .. }));
    assert!(h.scene.inner.snapshot().displayed_image().is_none());
}

fn assert_failed_on(h: &Harness, room: RoomKind, image: &str) {
    let state = h.controller.state();
    assert_eq!(state.current_room, room);
    assert_eq!(
        state.phase,
        TourPhase::Error { message: LOAD_FAILED_MESSAGE.to_string(), last_good: Some(room) }
    );
    assert_eq!(h.scene.inner.snapshot().displayed_image(), Some(url(image).as_str()));
}

#[tokio::test]
async fn test_failed_sky_clear_restores_panorama() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::Kitchen).await;

    // Plane image and visibility go through before the sky clear fails
    h.scene.fail_clear_sky.store(true, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::LivingRoom).await;
    assert!(matches!(outcome, SwitchOutcome::Failed(ref reason) if reason.contains("sky detach")));

    assert_failed_on(&h, RoomKind::Kitchen, "kitchen-pano");
    let snapshot = h.scene.inner.snapshot();
    assert_eq!(snapshot.sky_texture, Some(url("kitchen-pano")));
    assert!(!snapshot.plane.unwrap().visible);

    h.scene.fail_clear_sky.store(false, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::LivingRoom).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::LivingRoom, panoramic: false });
    assert_eq!(h.scene.inner.snapshot().displayed_image(), Some(url("living-flat").as_str()));
}

#[tokio::test]
async fn test_failed_plane_show_keeps_panorama() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::Kitchen).await;

    h.scene.fail_visibility.store(true, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::Bedroom).await;
    assert!(matches!(outcome, SwitchOutcome::Failed(_)));

    assert_failed_on(&h, RoomKind::Kitchen, "kitchen-pano");
}

#[tokio::test]
async fn test_failed_plane_hide_restores_flat_room() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::LivingRoom).await;

    // The panorama reaches the sky, then hiding the plane fails
    h.scene.fail_visibility.store(true, Ordering::SeqCst);
    let outcome = h.controller.switch_to(RoomKind::Kitchen).await;
    assert!(matches!(outcome, SwitchOutcome::Failed(ref reason) if reason.contains("plane visibility")));

    assert_failed_on(&h, RoomKind::LivingRoom, "living-flat");
    assert_eq!(h.scene.inner.snapshot().sky_texture, None);
}

// ============================================================================
// Mount and property changes
// ============================================================================

#[tokio::test]
async fn test_mount_waits_for_scene_ready() {
    let h = harness(&full_property(), full_probe(), settings(0));
    let (ready_tx, ready_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = ready_tx.send(true);
    });

    let outcome = h.controller.mount(ready_rx).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Kitchen, panoramic: true });
}

#[tokio::test]
async fn test_mount_proceeds_after_readiness_timeout() {
    let property = Property::new("2", "Suburban Family Home", "Maple Heights")
        .with_image(RoomKind::Bedroom, "bedroom-flat");
    let h = harness(&property, full_probe(), settings(0));
    let (_ready_tx, ready_rx) = watch::channel(false);

    let outcome = h.controller.mount(ready_rx).await;
    assert_eq!(outcome, SwitchOutcome::Applied { room: RoomKind::Bedroom, panoramic: false });
}

#[tokio::test]
async fn test_mount_without_rooms_stays_idle_on_bedroom() {
    let h = harness(&Property::new("3", "Empty Lot", "Nowhere"), full_probe(), settings(0));
    let (_ready_tx, ready_rx) = watch::channel(true);

    assert_eq!(h.controller.mount(ready_rx).await, SwitchOutcome::Rejected);

    let state = h.controller.state();
    assert_eq!(state.phase, TourPhase::Idle);
    assert_eq!(state.current_room, RoomKind::Bedroom);
    assert!(!h.controller.catalog().has_available_rooms());
}

#[tokio::test]
async fn test_set_property_invalidates_in_flight_switch() {
    let probe = ScriptedProbe::default().with("kitchen-pano", 100, 4000, 2000);
    let h = harness(&full_property(), probe, settings(0));

    let controller = h.controller.clone();
    let in_flight = tokio::spawn(async move { controller.switch_to(RoomKind::Kitchen).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let next = Property::new("2", "Suburban Family Home", "Maple Heights")
        .with_image(RoomKind::Bathroom, "bathroom-pano");
    h.controller.set_property(&next);

    assert_eq!(in_flight.await.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(h.controller.state(), TourState::new(RoomKind::Bathroom));
    assert_eq!(h.controller.property_id().0, "2");
    assert!(h.scene.inner.snapshot().sky_texture.is_none());
}

#[tokio::test]
async fn test_set_property_forgets_displayed_room() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::Kitchen).await;

    let next = Property::new("2", "Suburban Family Home", "Maple Heights")
        .with_image(RoomKind::Kitchen, "kitchen-pano")
        .with_image(RoomKind::Bedroom, "bedroom-flat");
    h.controller.set_property(&next);

    h.scene.fail.store(true, Ordering::SeqCst);
    h.controller.switch_to(RoomKind::Bedroom).await;
    assert!(matches!(h.controller.state().phase, TourPhase::Error { last_good: None, .. }));
    // The previous listing's panorama is still what the scene shows
    assert_eq!(h.scene.inner.snapshot().displayed_image(), Some(url("kitchen-pano").as_str()));
}

#[tokio::test]
async fn test_describe_current() {
    let h = harness(&full_property(), full_probe(), settings(0));
    h.controller.switch_to(RoomKind::LivingRoom).await;
    assert_eq!(h.controller.describe_current(), RoomKind::LivingRoom.description());
}

#[test]
fn test_settings_from_config() {
    let config = Config::default().with_settle_delay_ms(10);
    let settings = ControllerSettings::from_config(&config);
    assert_eq!(settings.settle_delay, Duration::from_millis(10));
    assert_eq!(settings.plane.width, 8.0);
    assert!(settings.plane.double_sided);
}
