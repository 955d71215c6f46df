//! The renderable item contract.

use crate::backend::GraphicsBackend;
use crate::{Pose, Result};

/// Anything with a world pose that a camera can follow.
pub trait PoseSource: Send + Sync {
    /// The most recently published world pose.
    fn pose(&self) -> Pose;
}

/// A piece of geometry that producer threads update and the render thread draws.
///
/// Producers call [`set_pose`](Self::set_pose) (and variant-specific setters)
/// from any thread. Each call stages the new geometry under the item's writer
/// lock and publishes it as one complete snapshot. The render thread calls
/// [`update_for_render`](Self::update_for_render) followed by
/// [`render`](Self::render) once per frame.
pub trait RenderableItem: PoseSource {
    /// Item name, used for logging.
    fn name(&self) -> &str;

    /// Moves the item to a new world pose, carrying its geometry rigidly.
    fn set_pose(&self, pose: Pose);

    /// Uploads the latest published snapshot if it changed since the last upload.
    fn update_for_render(&self, gfx: &mut dyn GraphicsBackend) -> Result<()>;

    /// Draws the uploaded geometry. Does nothing before the first upload.
    fn render(&self, gfx: &mut dyn GraphicsBackend);

    /// Whether a GPU buffer is currently available to draw.
    fn is_ready(&self) -> bool;

    /// Releases the GPU buffer and all staged geometry.
    fn clear(&self);
}
