//! Wireframe cuboid.

use glam::{Vec3, Vec4};
use slamview_core::{GraphicsBackend, Pose, Primitive, RenderableItem, Result, Vertex};

use crate::item_core::{colored, impl_item_common, Appearance, ColorSource, ItemCore};

/// Corner pairs of the twelve edges.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn corners(size: Vec3) -> [Vec3; 8] {
    let h = size * 0.5;
    [
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
    ]
}

fn edge_vertices(pose: &Pose, size: Vec3, color: Vec4) -> Vec<Vertex> {
    let world = corners(size).map(|c| pose.transform_point(c));
    colored(EDGES.iter().flat_map(|&(a, b)| [world[a], world[b]]), color)
}

/// A cuboid outline centered on its pose.
pub struct BoxOutline {
    core: ItemCore<Vec3>,
}

impl BoxOutline {
    /// Creates a green box of `size` (x, y, z extents) at `pose`.
    pub fn new(name: impl Into<String>, pose: Pose, size: Vec3) -> Self {
        let appearance = Appearance::new(Vec3::Y, 3.0, 1.0);
        let vertices = edge_vertices(&pose, size, appearance.color);
        Self {
            core: ItemCore::new(
                name,
                appearance,
                pose,
                size,
                vertices,
                &[Primitive::Lines],
                ColorSource::Uniform,
            ),
        }
    }

    /// Extents along x, y and z.
    pub fn size(&self) -> Vec3 {
        self.core.with_staged(|staged| staged.state)
    }

    /// Changes the extents and republishes.
    pub fn set_size(&self, size: Vec3) {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.state = size;
            (edge_vertices(&staged.pose, size, color), ())
        });
    }
}

impl_item_common!(BoxOutline);

impl RenderableItem for BoxOutline {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_pose(&self, pose: Pose) {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.pose = pose;
            (edge_vertices(&pose, staged.state, color), ())
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
    use glam::Quat;
    use slamview_core::PoseSource;

    #[test]
    fn test_translation_shifts_every_vertex() {
        let outline = BoxOutline::new("box", Pose::IDENTITY, Vec3::new(5.0, 2.0, 1.5));
        let before = outline.world_vertices();
        outline.set_pose(Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let after = outline.world_vertices();

        assert_eq!(before.len(), 24);
        assert_eq!(after.len(), before.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(*a - *b, Vec3::new(1.0, 0.0, 0.0));
        }
    }

    #[test]
    fn test_edges_have_box_lengths() {
        let outline = BoxOutline::new("box", Pose::IDENTITY, Vec3::new(5.0, 2.0, 1.5));
        let vertices = outline.world_vertices();
        let lengths: Vec<f32> = vertices.chunks(2).map(|e| (e[1] - e[0]).length()).collect();
        assert_eq!(lengths.len(), 12);
        assert_eq!(lengths.iter().filter(|&&l| (l - 5.0).abs() < 1e-6).count(), 4);
        assert_eq!(lengths.iter().filter(|&&l| (l - 2.0).abs() < 1e-6).count(), 4);
        assert_eq!(lengths.iter().filter(|&&l| (l - 1.5).abs() < 1e-6).count(), 4);
    }

    #[test]
    fn test_geometry_is_pose_times_corners() {
        let outline = BoxOutline::new("box", Pose::IDENTITY, Vec3::ONE);
        let pose = Pose::new(Quat::from_rotation_x(0.7), Vec3::new(3.0, -1.0, 2.0));
        outline.set_pose(outline.pose());
        outline.set_pose(pose);
        let vertices = outline.world_vertices();
        let expected = pose.transform_point(Vec3::splat(0.5));
        assert!((vertices[0] - expected).length() < 1e-5);
    }

    #[test]
    fn test_default_appearance() {
        let outline = BoxOutline::new("box", Pose::IDENTITY, Vec3::ONE);
        assert_eq!(outline.appearance().color, Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(outline.appearance().line_width, 3.0);
    }
}
