//! Axis arrow.

use glam::{Vec3, Vec4};
use slamview_core::{GraphicsBackend, Pose, Primitive, RenderableItem, Result};

use crate::item_core::{colored, impl_item_common, Appearance, ColorSource, ItemCore};

/// Half-angle of the arrow head.
const HEAD_HALF_ANGLE_DEG: f32 = 15.0;

/// How long the head of an arrow is relative to its shaft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadPolicy {
    /// Fixed absolute head length.
    Fixed(f32),
    /// `ratio * length`, but never longer than `max`.
    Capped { ratio: f32, max: f32 },
    /// Fixed fraction of the shaft length.
    Ratio(f32),
}

impl Default for HeadPolicy {
    fn default() -> Self {
        Self::Fixed(0.5)
    }
}

impl HeadPolicy {
    /// `Capped` with its usual parameters.
    pub const CAPPED: Self = Self::Capped { ratio: 0.2, max: 2.0 };
    /// `Ratio` with its usual parameter.
    pub const RATIO: Self = Self::Ratio(0.2);

    /// Head length for a shaft of `length`; never exceeds the shaft.
    pub fn head_length(self, length: f32) -> f32 {
        let head = match self {
            Self::Fixed(h) => h,
            Self::Capped { ratio, max } => (ratio * length).min(max),
            Self::Ratio(ratio) => ratio * length,
        };
        head.clamp(0.0, length.max(0.0))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ArrowShape {
    pub length: f32,
    pub head: HeadPolicy,
}

impl ArrowShape {
    /// Shaft plus two head strokes in the arrow's local frame, as a line list.
    pub fn local_points(self) -> [Vec3; 6] {
        let h = self.head.head_length(self.length);
        let spread = HEAD_HALF_ANGLE_DEG.to_radians().tan() * h;
        let end = Vec3::new(self.length, 0.0, 0.0);
        let up = Vec3::new(self.length - h, spread, 0.0);
        let down = Vec3::new(self.length - h, -spread, 0.0);
        [Vec3::ZERO, end, up, end, down, end]
    }
}

fn world_vertices(pose: &Pose, shape: ArrowShape, color: Vec4) -> Vec<slamview_core::Vertex> {
    colored(shape.local_points().map(|p| pose.transform_point(p)), color)
}

/// A single arrow along the local x axis.
pub struct Arrow {
    core: ItemCore<ArrowShape>,
}

impl Arrow {
    /// Creates an arrow of `length` at `pose`.
    pub fn new(name: impl Into<String>, pose: Pose, length: f32) -> Self {
        Self::build(name, pose, length, HeadPolicy::default(), Vec3::ONE, 8.0)
    }

    pub(crate) fn build(
        name: impl Into<String>,
        pose: Pose,
        length: f32,
        head: HeadPolicy,
        color: Vec3,
        line_width: f32,
    ) -> Self {
        let appearance = Appearance::new(color, line_width, 2.0);
        let shape = ArrowShape { length, head };
        let vertices = world_vertices(&pose, shape, appearance.color);
        Self {
            core: ItemCore::new(
                name,
                appearance,
                pose,
                shape,
                vertices,
                &[Primitive::Lines],
                ColorSource::Uniform,
            ),
        }
    }

    /// Sets the color.
    #[must_use]
    pub fn with_color(self, color: Vec3) -> Self {
        self.set_color(color.extend(1.0));
        self
    }

    /// Sets the line width.
    #[must_use]
    pub fn with_line_width(self, width: f32) -> Self {
        self.set_line_width(width);
        self
    }

    /// Changes the head policy and republishes.
    #[must_use]
    pub fn with_head(self, head: HeadPolicy) -> Self {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.state.head = head;
            (world_vertices(&staged.pose, staged.state, color), ())
        });
        self
    }

    /// Shaft length.
    pub fn length(&self) -> f32 {
        self.core.with_staged(|staged| staged.state.length)
    }

    /// Head length under the current policy.
    pub fn head_length(&self) -> f32 {
        self.core
            .with_staged(|staged| staged.state.head.head_length(staged.state.length))
    }

    /// Changes the shaft length and republishes.
    pub fn set_length(&self, length: f32) {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.state.length = length;
            (world_vertices(&staged.pose, staged.state, color), ())
        });
    }
}

impl_item_common!(Arrow);

impl RenderableItem for Arrow {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_pose(&self, pose: Pose) {
        let color = self.appearance().color;
        self.core.modify(|staged| {
            staged.pose = pose;
            (world_vertices(&pose, staged.state, color), ())
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

    #[test]
    fn test_head_policies() {
        assert_eq!(HeadPolicy::Fixed(0.5).head_length(2.0), 0.5);
        assert_eq!(HeadPolicy::Fixed(0.5).head_length(0.3), 0.3);
        assert!((HeadPolicy::CAPPED.head_length(5.0) - 1.0).abs() < 1e-6);
        assert_eq!(HeadPolicy::CAPPED.head_length(50.0), 2.0);
        assert!((HeadPolicy::RATIO.head_length(3.0) - 0.6).abs() < 1e-6);
        assert_eq!(HeadPolicy::Ratio(2.0).head_length(1.0), 1.0);
    }

    #[test]
    fn test_local_geometry() {
        let shape = ArrowShape {
            length: 2.0,
            head: HeadPolicy::Fixed(0.5),
        };
        let points = shape.local_points();
        assert_eq!(points[0], Vec3::ZERO);
        assert_eq!(points[1], Vec3::new(2.0, 0.0, 0.0));
        let spread = 15f32.to_radians().tan() * 0.5;
        assert!((points[2] - Vec3::new(1.5, spread, 0.0)).length() < 1e-6);
        assert!((points[4] - Vec3::new(1.5, -spread, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_pose_and_length_change_geometry() {
        let arrow = Arrow::new("a", Pose::IDENTITY, 1.0);
        let rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        arrow.set_pose(Pose::new(rotation, Vec3::new(0.0, 0.0, 1.0)));
        let tip = arrow.world_vertices()[1];
        assert!((tip - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5);

        arrow.set_length(3.0);
        let tip = arrow.world_vertices()[1];
        assert!((tip - Vec3::new(0.0, 3.0, 1.0)).length() < 1e-5);
        assert_eq!(arrow.length(), 3.0);
    }

    #[test]
    fn test_defaults() {
        let arrow = Arrow::new("a", Pose::IDENTITY, 1.0);
        assert_eq!(arrow.appearance().line_width, 8.0);
        assert_eq!(arrow.appearance().point_size, 2.0);
        assert_eq!(arrow.head_length(), 0.5);
        assert_eq!(arrow.world_vertices().len(), 6);
    }
}
