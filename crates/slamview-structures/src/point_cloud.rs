//! Colorized point cloud.
//!
//! Input points are given in the sensor frame together with the sensor's
//! world pose. World positions are computed in parallel, then handed to a
//! [`ColorFactory`] which picks one color per point.

use glam::Vec3;
use rayon::prelude::*;
use slamview_core::{GraphicsBackend, Pose, Primitive, RenderableItem, Result, Vertex, ViewerError};
use slamview_render::{CloudPoint, ColorFactory};

use crate::item_core::{impl_item_common, Appearance, ColorSource, ItemCore};

/// A set of points drawn with per-point colors.
pub struct PointCloud {
    core: ItemCore<()>,
}

/// Moves points from their local frame into the world.
pub fn to_world<P: CloudPoint>(points: &[P], pose: &Pose) -> Vec<P> {
    points
        .par_iter()
        .map(|p| p.with_position(pose.transform_point(p.position())))
        .collect()
}

impl PointCloud {
    /// Creates an empty gray cloud with one-pixel points.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ItemCore::new(
                name,
                Appearance::new(Vec3::splat(0.5), 1.0, 1.0),
                Pose::IDENTITY,
                (),
                Vec::new(),
                &[Primitive::Points],
                ColorSource::PerVertex,
            ),
        }
    }

    /// Replaces the cloud with `points` observed from `pose`.
    ///
    /// Returns [`ViewerError::SizeMismatch`] if the factory does not return
    /// exactly one color per point; the previous cloud stays published.
    pub fn set_cloud<P: CloudPoint>(
        &self,
        points: &[P],
        pose: Pose,
        factory: &dyn ColorFactory<P>,
    ) -> Result<()> {
        let world = to_world(points, &pose);
        let colors = factory.create_colors(&world);
        if colors.len() != world.len() {
            return Err(ViewerError::SizeMismatch {
                expected: world.len(),
                actual: colors.len(),
            });
        }
        let vertices: Vec<Vertex> = world
            .par_iter()
            .zip(colors.par_iter())
            .map(|(p, &c)| Vertex::new(p.position(), c))
            .collect();
        log::debug!("'{}' staged {} points", self.core.name(), vertices.len());
        self.core.modify(|staged| {
            staged.pose = pose;
            (vertices, ())
        });
        Ok(())
    }

    /// Number of points in the published cloud.
    pub fn len(&self) -> usize {
        self.core.snapshot().vertices.len()
    }

    /// Whether the published cloud is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-point colors of the published cloud.
    pub fn colors(&self) -> Vec<glam::Vec4> {
        self.core.snapshot().vertices.iter().map(Vertex::color).collect()
    }
}

impl_item_common!(PointCloud);

impl RenderableItem for PointCloud {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_pose(&self, pose: Pose) {
        self.core.modify(|staged| {
            let current = self.core.published();
            let delta = Pose::relative(&staged.pose, &pose);
            staged.pose = pose;
            let moved = current
                .vertices
                .par_iter()
                .map(|v| Vertex::new(delta.transform_point(v.position()), v.color()))
                .collect();
            (moved, ())
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
        self.core.clear(|()| {});
    }
}
