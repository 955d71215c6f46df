//! Camera frustum marker.

use glam::{Vec3, Vec4};
use slamview_core::{GraphicsBackend, Pose, Primitive, RenderableItem, Result, Vertex};

use crate::item_core::{colored, impl_item_common, Appearance, ColorSource, ItemCore};

/// Frustum width, height and depth at scale 1.
const FRAME_SIZE: Vec3 = Vec3::new(3.0, 2.0, 2.0);

fn frustum_points(scale: f32) -> [Vec3; 20] {
    let Vec3 { x: w, y: h, z: d } = FRAME_SIZE * scale;
    let cp = Vec3::ZERO;
    let lu = Vec3::new(-w / 2.0, h / 2.0, d);
    let ld = Vec3::new(-w / 2.0, -h / 2.0, d);
    let ru = Vec3::new(w / 2.0, h / 2.0, d);
    let rd = Vec3::new(w / 2.0, -h / 2.0, d);
    [
        cp, lu, cp, ld, cp, ru, cp, rd, // apex to corners
        lu, ru, ru, rd, rd, ld, ld, lu, // image plane
        ld, ru, lu, rd, // diagonals
    ]
}

fn frame_vertices(pose: &Pose, scale: f32, color: Vec4) -> Vec<Vertex> {
    colored(frustum_points(scale).map(|p| pose.transform_point(p)), color)
}

/// A pyramid marking a camera pose, looking along local +z.
pub struct CameraFrame {
    core: ItemCore<f32>,
}

impl CameraFrame {
    /// Creates a frustum at `pose`.
    pub fn new(name: impl Into<String>, pose: Pose, color: Vec3, line_width: f32) -> Self {
        Self::with_scale(name, pose, color, line_width, 1.0)
    }

    /// Creates a frustum scaled by `scale`.
    pub fn with_scale(
        name: impl Into<String>,
        pose: Pose,
        color: Vec3,
        line_width: f32,
        scale: f32,
    ) -> Self {
        let appearance = Appearance::new(color, line_width, 1.0);
        let vertices = frame_vertices(&pose, scale, appearance.color);
        Self {
            core: ItemCore::new(
                name,
                appearance,
                pose,
                scale,
                vertices,
                &[Primitive::Lines],
                ColorSource::Uniform,
            ),
        }
    }

    /// Size multiplier.
    pub fn scale(&self) -> f32 {
        self.core.with_staged(|staged| staged.state)
    }
}

impl_item_common!(CameraFrame);

impl RenderableItem for CameraFrame {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_pose(&self, pose: Pose) {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.pose = pose;
            (frame_vertices(&pose, staged.state, color), ())
        });
    }

    fn update_for_render(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        self.core.update_for_render(gfx)
    }

    fn render(&self, gfx: &mut dyn GraphicsBackend) {
        self.core.render(gfx);
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn clear(&self) {
        self.core.clear(|_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frustum_layout() {
        let frame = CameraFrame::new("cam", Pose::IDENTITY, Vec3::ONE, 2.0);
        let vertices = frame.world_vertices();
        assert_eq!(vertices.len(), 20);
        // four rays start at the apex
        for ray in vertices[..8].chunks(2) {
            assert_eq!(ray[0], Vec3::ZERO);
            assert_eq!(ray[1].z, 2.0);
        }
        assert_eq!(vertices[1], Vec3::new(-1.5, 1.0, 2.0));
    }

    #[test]
    fn test_scale_and_pose() {
        let frame = CameraFrame::with_scale("cam", Pose::IDENTITY, Vec3::ONE, 2.0, 0.5);
        frame.set_pose(Pose::from_translation(Vec3::new(0.0, 0.0, 10.0)));
        let vertices = frame.world_vertices();
        assert_eq!(vertices[0], Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(vertices[1], Vec3::new(-0.75, 0.5, 11.0));
        assert_eq!(frame.scale(), 0.5);
    }
}
