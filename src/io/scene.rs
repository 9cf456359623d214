//! 3D scene surfaces the tour renders into
//!
//! The tour controller is the only writer. A room is shown either as the sky
//! texture (360° panoramas) or on a flat plane in front of the camera.
//! `HeadlessScene` keeps the surfaces in memory and logs every mutation; it
//! backs the CLI and the tests.

use std::sync::Arc;
use tracing::debug;

/// Placement of the flat image plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneLayout {
    pub position: [f32; 3],
    pub width: f32,
    pub height: f32,
    pub double_sided: bool,
}

impl Default for PlaneLayout {
    fn default() -> Self {
        Self { position: [0.0, 2.0, -5.0], width: 8.0, height: 6.0, double_sided: true }
    }
}

/// Scene mutation surface owned by the tour controller
pub trait SceneHost: Send {
    /// Wrap the image around the viewer as the sky
    fn set_sky_texture(&mut self, url: &str) -> anyhow::Result<()>;

    fn clear_sky_texture(&mut self) -> anyhow::Result<()>;

    /// Whether the flat plane has been created
    fn has_plane(&self) -> bool;

    fn create_plane(&mut self, layout: &PlaneLayout) -> anyhow::Result<()>;

    fn set_plane_image(&mut self, url: &str) -> anyhow::Result<()>;

    fn set_plane_visible(&mut self, visible: bool) -> anyhow::Result<()>;

    fn plane_visible(&self) -> bool;
}

/// Flat plane as currently rendered
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSnapshot {
    pub layout: PlaneLayout,
    pub image: Option<String>,
    pub visible: bool,
}

/// In-memory view of the scene surfaces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    pub sky_texture: Option<String>,
    pub plane: Option<PlaneSnapshot>,
    /// Number of plane creations; the plane is built at most once
    pub planes_created: u32,
}

impl SceneSnapshot {
    /// Image currently on screen, whichever surface shows it
    pub fn displayed_image(&self) -> Option<&str> {
        match &self.plane {
            Some(plane) if plane.visible => plane.image.as_deref(),
            _ => self.sky_texture.as_deref(),
        }
    }
}

/// Scene host without a renderer
#[derive(Debug, Clone, Default)]
pub struct HeadlessScene {
    state: Arc<parking_lot::Mutex<SceneSnapshot>>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current surfaces; the handle stays valid after the scene is moved into
    /// a controller
    pub fn snapshot(&self) -> SceneSnapshot {
        self.state.lock().clone()
    }
}

impl SceneHost for HeadlessScene {
    fn set_sky_texture(&mut self, url: &str) -> anyhow::Result<()> {
        debug!(url = %url, "scene_sky_set");
        self.state.lock().sky_texture = Some(url.to_string());
        Ok(())
    }

    fn clear_sky_texture(&mut self) -> anyhow::Result<()> {
        debug!("scene_sky_cleared");
        self.state.lock().sky_texture = None;
        Ok(())
    }

    fn has_plane(&self) -> bool {
        self.state.lock().plane.is_some()
    }

    fn create_plane(&mut self, layout: &PlaneLayout) -> anyhow::Result<()> {
        debug!(
            x = layout.position[0],
            y = layout.position[1],
            z = layout.position[2],
            width = layout.width,
            height = layout.height,
            "scene_plane_created"
        );
        let mut state = self.state.lock();
        state.plane = Some(PlaneSnapshot { layout: *layout, image: None, visible: false });
        state.planes_created += 1;
        Ok(())
    }

    fn set_plane_image(&mut self, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let Some(plane) = state.plane.as_mut() else {
            anyhow::bail!("flat plane not created");
        };
        debug!(url = %url, "scene_plane_image_set");
        plane.image = Some(url.to_string());
        Ok(())
    }

    fn set_plane_visible(&mut self, visible: bool) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let Some(plane) = state.plane.as_mut() else {
            anyhow::bail!("flat plane not created");
        };
        debug!(visible = visible, "scene_plane_visibility");
        plane.visible = visible;
        Ok(())
    }

    fn plane_visible(&self) -> bool {
        self.state.lock().plane.as_ref().is_some_and(|p| p.visible)
    }
}
