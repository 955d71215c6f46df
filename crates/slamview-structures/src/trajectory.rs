//! Polyline of past positions.

use glam::{Vec3, Vec4};
use slamview_core::{GraphicsBackend, Pose, Primitive, RenderableItem, Result, Vertex};

use crate::item_core::{colored, impl_item_common, Appearance, ColorSource, ItemCore, Staged};

/// Default maximum number of retained points.
pub const DEFAULT_CAPACITY: usize = 100_000_000;

/// Fraction of the capacity dropped at once when the buffer overflows.
const EVICTION_FRACTION: f64 = 0.2;

pub(crate) struct Track {
    points: Vec<Vec3>,
    capacity: usize,
}

impl Track {
    fn eviction_block(&self) -> usize {
        ((self.capacity as f64 * EVICTION_FRACTION).ceil() as usize).max(1)
    }

    fn push(&mut self, point: Vec3) {
        self.points.push(point);
        if self.points.len() > self.capacity {
            let block = self.eviction_block().min(self.points.len() - 1);
            self.points.drain(..block);
        }
    }
}

/// A growing line strip, for example the path of a vehicle.
///
/// Appends are staged and only turned into vertices when a frame reads the
/// trajectory, so each append is amortized constant time.
///
/// Points are stored in world coordinates. Moving the trajectory with
/// [`set_pose`](RenderableItem::set_pose) carries every stored point by the
/// relative transform between the old and the new pose.
pub struct Trajectory {
    core: ItemCore<Track>,
}

impl Trajectory {
    /// Creates an empty red trajectory.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    /// Creates an empty trajectory that keeps at most `capacity` points.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let track = Track {
            points: Vec::new(),
            capacity: capacity.max(1),
        };
        Self {
            core: ItemCore::new(
                name,
                Appearance::new(Vec3::X, 3.0, 5.0),
                Pose::IDENTITY,
                track,
                Vec::new(),
                &[Primitive::LineStrip, Primitive::Points],
                ColorSource::Uniform,
            )
            .lazy(Self::materialize),
        }
    }

    // drawn with the uniform appearance color, vertex colors are unused
    fn vertices(points: &[Vec3]) -> Vec<Vertex> {
        colored(points.iter().copied(), Vec4::ONE)
    }

    fn materialize(staged: &Staged<Track>) -> Vec<Vertex> {
        Self::vertices(&staged.state.points)
    }

    /// Appends a world-space point.
    pub fn add_point(&self, point: Vec3) {
        self.core.stage(|staged| staged.state.push(point));
    }

    /// Appends the position of a world pose.
    pub fn add_pose(&self, pose: &Pose) {
        self.add_point(pose.translation);
    }

    /// Appends several points under one publish.
    pub fn extend(&self, points: impl IntoIterator<Item = Vec3>) {
        self.core.stage(|staged| {
            for point in points {
                staged.state.push(point);
            }
        });
    }

    /// Retained points, oldest first.
    pub fn points(&self) -> Vec<Vec3> {
        self.core.with_staged(|staged| staged.state.points.clone())
    }

    /// Number of retained points.
    pub fn len(&self) -> usize {
        self.core.with_staged(|staged| staged.state.points.len())
    }

    /// Whether no point is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained points.
    pub fn capacity(&self) -> usize {
        self.core.with_staged(|staged| staged.state.capacity)
    }
}

impl_item_common!(Trajectory);

impl RenderableItem for Trajectory {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_pose(&self, pose: Pose) {
        self.core.modify(|staged| {
            Pose::carry(&mut staged.state.points, &staged.pose, &pose);
            staged.pose = pose;
            (Self::vertices(&staged.state.points), ())
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
        self.core.clear(|track| track.points.clear());
    }
}
