use std::fmt::Write as _;

use skillcity_assets::ResourceError;
use skillcity_common::Camera;

use crate::drawlist::DrawList;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("render surface unavailable: {0}")]
    Surface(String),
}

/// Renderer/host collaborator. All renderers implement this trait.
///
/// A renderer reads a draw list and a camera and produces output. It never
/// mutates the city.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render_frame(&mut self, scene: &DrawList, camera: &Camera) -> Result<Self::Output, RenderError>;

    /// The host surface changed size.
    fn on_resize(&mut self, width: u32, height: u32);
}

/// Produces a human-readable summary of each frame. Used by the CLI and in
/// tests of the render interface.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    width: u32,
    height: u32,
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render_frame(&mut self, scene: &DrawList, camera: &Camera) -> Result<String, RenderError> {
        self.frames += 1;
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "=== Frame {} ({}x{}) ===",
            self.frames, self.width, self.height
        );
        let (eye, target) = (camera.position, camera.target);
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            eye.x,
            eye.y,
            eye.z,
            target.x,
            target.y,
            target.z,
            camera.fov_y.to_degrees()
        );
        let _ = writeln!(
            out,
            "Entities: {}  Batches: {}  Instances: {}  Lights: {}",
            scene.entities().len(),
            scene.batches().len(),
            scene.instance_count(),
            scene.lights().len()
        );
        for batch in scene.batches() {
            let _ = writeln!(
                out,
                "  {:<8} g{:<3} m{:<3} x{}{}",
                batch.shape,
                batch.geometry.slot(),
                batch.material.slot(),
                batch.instances.len(),
                if batch.cast_shadow { " shadow" } else { "" }
            );
        }
        Ok(out)
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillcity_assets::ResourceCache;
    use skillcity_kernel::{CityBuilder, CityConfig};

    #[test]
    fn debug_renderer_empty_scene() {
        let mut renderer = DebugTextRenderer::new();
        let output = renderer.render_frame(&DrawList::new(), &Camera::default()).unwrap();
        assert!(output.contains("Frame 1"));
        assert!(output.contains("Entities: 0"));
    }

    #[test]
    fn debug_renderer_with_city() {
        let mut config = CityConfig::default();
        config.residential.count = 10;
        let city = CityBuilder::new(config).build(ResourceCache::new()).unwrap();
        let list = DrawList::from_city(&city);

        let mut renderer = DebugTextRenderer::new();
        renderer.on_resize(1280, 720);
        let output = renderer.render_frame(&list, &Camera::default()).unwrap();
        assert!(output.contains("1280x720"));
        assert!(output.contains(&format!("Entities: {}", city.entity_count())));
        assert!(output.contains("box"));
        assert_eq!(renderer.frames(), 1);
    }
}
