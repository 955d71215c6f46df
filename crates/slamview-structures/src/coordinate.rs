//! Coordinate triad built from three arrows.

use std::f32::consts::FRAC_PI_2;
use std::sync::Mutex;

use glam::{Quat, Vec3, Vec4};
use slamview_core::{GraphicsBackend, Pose, PoseSource, RenderableItem, Result};

use crate::arrow::{Arrow, HeadPolicy};
use crate::item_core::lock;

/// Local offsets of the y and z arrows relative to the x arrow.
fn axis_offsets() -> [Pose; 3] {
    [
        Pose::IDENTITY,
        Pose::from_rotation(Quat::from_rotation_z(FRAC_PI_2)),
        Pose::from_rotation(Quat::from_rotation_y(FRAC_PI_2)).inverse(),
    ]
}

/// Red, green and blue arrows along the x, y and z axes of a frame.
///
/// The triad lock is held across all three arrows whenever they are moved,
/// resized, uploaded or cleared, so a frame never draws axes from two poses.
pub struct CoordinateTriad {
    name: String,
    pose: Mutex<Pose>,
    axes: [Arrow; 3],
}

impl CoordinateTriad {
    /// Creates a triad with axes of `length` at `pose`.
    pub fn new(name: impl Into<String>, pose: Pose, length: f32) -> Self {
        let name = name.into();
        let colors = [Vec3::X, Vec3::Y, Vec3::Z];
        let labels = ["x", "y", "z"];
        let offsets = axis_offsets();
        let axes = std::array::from_fn(|i| {
            Arrow::build(
                format!("{name}/{}", labels[i]),
                pose * offsets[i],
                length,
                HeadPolicy::RATIO,
                colors[i],
                5.0,
            )
        });
        Self {
            name,
            pose: Mutex::new(pose),
            axes,
        }
    }

    /// Effective world poses of the x, y and z arrows.
    pub fn axis_poses(&self) -> [Pose; 3] {
        std::array::from_fn(|i| self.axes[i].pose())
    }

    /// The x, y and z arrows.
    pub fn axes(&self) -> &[Arrow; 3] {
        &self.axes
    }

    /// Changes the length of all three axes.
    pub fn set_length(&self, length: f32) {
        let _guard = lock(&self.pose);
        for axis in &self.axes {
            axis.set_length(length);
        }
    }

    /// Sets the line width of all three axes.
    pub fn set_line_width(&self, width: f32) {
        for axis in &self.axes {
            axis.set_line_width(width);
        }
    }

    /// Paints all three axes one color.
    pub fn set_color(&self, color: Vec4) {
        for axis in &self.axes {
            axis.set_color(color);
        }
    }
}

impl PoseSource for CoordinateTriad {
    fn pose(&self) -> Pose {
        *lock(&self.pose)
    }
}

impl RenderableItem for CoordinateTriad {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_pose(&self, pose: Pose) {
        let mut current = lock(&self.pose);
        for (axis, offset) in self.axes.iter().zip(axis_offsets()) {
            axis.set_pose(pose * offset);
        }
        *current = pose;
    }

    fn update_for_render(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        let _guard = lock(&self.pose);
        for axis in &self.axes {
            axis.update_for_render(gfx)?;
        }
        Ok(())
    }

    fn render(&self, gfx: &mut dyn GraphicsBackend) {
        for axis in &self.axes {
            axis.render(gfx);
        }
    }

    fn is_ready(&self) -> bool {
        self.axes.iter().all(RenderableItem::is_ready)
    }

    fn clear(&self) {
        let _guard = lock(&self.pose);
        for axis in &self.axes {
            axis.clear();
        }
    }
}
