//! The graphics backend contract.
//!
//! The window driver owns exactly one [`GraphicsBackend`] and only ever calls it
//! from the render thread. Items and views reach the backend through
//! `&mut dyn GraphicsBackend` handed down by the driver each frame, so nothing
//! outside the frame loop can touch the graphics context.

use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::RgbaImage;

use crate::{Result, ViewerError};

/// A vertex as laid out in GPU storage buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position, `w` is always 1.
    pub position: [f32; 4],
    /// RGBA color.
    pub color: [f32; 4],
}

impl Vertex {
    /// Creates a vertex from a position and color.
    #[must_use]
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.extend(1.0).to_array(),
            color: color.to_array(),
        }
    }

    /// Returns the position as a [`Vec3`].
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    /// Returns the color as a [`Vec4`].
    #[must_use]
    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }
}

/// How a vertex buffer is assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// One screen-aligned square per vertex.
    Points,
    /// Consecutive vertex pairs form independent segments.
    Lines,
    /// Each vertex connects to the next.
    LineStrip,
}

impl Primitive {
    /// Number of instanced elements drawn for `len` vertices.
    #[must_use]
    pub fn element_count(self, len: usize) -> usize {
        match self {
            Primitive::Points => len,
            Primitive::Lines => len / 2,
            Primitive::LineStrip => len.saturating_sub(1),
        }
    }
}

/// Appearance parameters for a single draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStyle {
    /// Uniform color overriding per-vertex colors, if set.
    pub color: Option<Vec4>,
    /// Line width in pixels.
    pub line_width: f32,
    /// Point size in pixels.
    pub point_size: f32,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: None,
            line_width: 1.0,
            point_size: 1.0,
        }
    }
}

/// Fractional screen bounds, measured from the bottom-left corner of the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub bottom: f32,
    pub top: f32,
    pub left: f32,
    pub right: f32,
}

impl Bounds {
    /// The whole window.
    pub const FULL: Self = Self {
        bottom: 0.0,
        top: 1.0,
        left: 0.0,
        right: 1.0,
    };

    /// Creates bounds from fractions of the window size.
    #[must_use]
    pub fn new(bottom: f32, top: f32, left: f32, right: f32) -> Self {
        Self {
            bottom,
            top,
            left,
            right,
        }
    }

    /// Checks that all fractions lie in `[0, 1]` and are not inverted.
    pub fn validate(&self, name: &str) -> Result<()> {
        let fractions = [self.bottom, self.top, self.left, self.right];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(ViewerError::InvalidBounds {
                name: name.to_string(),
                reason: format!("fractions must lie in [0, 1], got {self:?}"),
            });
        }
        if self.bottom > self.top || self.left > self.right {
            return Err(ViewerError::InvalidBounds {
                name: name.to_string(),
                reason: format!("bounds are inverted: {self:?}"),
            });
        }
        Ok(())
    }

    /// Resolves the bounds against a window size. Returns `None` for a zero-area region.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn to_viewport(&self, width: u32, height: u32) -> Option<Viewport> {
        let x0 = (self.left * width as f32).round() as u32;
        let x1 = (self.right * width as f32).round() as u32;
        // window coordinates grow downwards
        let y0 = ((1.0 - self.top) * height as f32).round() as u32;
        let y1 = ((1.0 - self.bottom) * height as f32).round() as u32;
        let viewport = Viewport {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        };
        (viewport.width > 0 && viewport.height > 0).then_some(viewport)
    }
}

/// A pixel rectangle in window coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Returns true when the window-space position falls inside this viewport.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= self.x as f32
            && position.y >= self.y as f32
            && position.x < (self.x + self.width) as f32
            && position.y < (self.y + self.height) as f32
    }

    /// Pixel size as a tuple.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Mouse buttons relevant to navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Window input, already translated out of the windowing library.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// The user asked to close the window.
    CloseRequested,
    /// The drawable surface changed size.
    Resized { width: u32, height: u32 },
    /// A printable key was pressed.
    KeyPressed(char),
    /// A mouse button went down.
    Click { button: MouseButton, position: Vec2 },
    /// The cursor moved while a button was held.
    Drag {
        button: MouseButton,
        delta: Vec2,
        position: Vec2,
    },
    /// Scroll wheel motion, in lines.
    Scroll { delta: f32, position: Vec2 },
}

/// Identifier of a GPU buffer allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Queue of buffer ids released by dropped handles, drained by the backend.
pub type RetireQueue = Arc<Mutex<Vec<BufferId>>>;

/// Owning handle to a GPU buffer allocated by a backend.
///
/// Dropping the handle on any thread queues the allocation for release; the
/// backend frees it on the render thread at the start of the next frame.
#[derive(Debug)]
pub struct GpuBuffer {
    id: BufferId,
    len: usize,
    retired: RetireQueue,
}

impl GpuBuffer {
    /// Wraps a backend allocation.
    #[must_use]
    pub fn new(id: BufferId, len: usize, retired: RetireQueue) -> Self {
        Self { id, len, retired }
    }

    /// The backend allocation id.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of vertices in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        match self.retired.lock() {
            Ok(mut queue) => queue.push(self.id),
            Err(poisoned) => poisoned.into_inner().push(self.id),
        }
    }
}

/// Drains a retire queue, tolerating poisoning.
#[must_use]
pub fn drain_retired(queue: &RetireQueue) -> Vec<BufferId> {
    match queue.lock() {
        Ok(mut ids) => std::mem::take(&mut *ids),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

/// Everything the frame loop needs from a windowing and rendering library.
///
/// All methods are called from the render thread only.
pub trait GraphicsBackend {
    /// Creates the window and binds the rendering context to the calling thread.
    fn bind_context(&mut self) -> Result<()>;

    /// Creates (or re-bounds) a named display region.
    fn create_region(&mut self, name: &str, bounds: Bounds) -> Result<()>;

    /// Shows or hides a region.
    fn set_region_visible(&mut self, name: &str, visible: bool) -> Result<()>;

    /// Current pixel viewport of a region, or `None` if hidden, zero-sized or unknown.
    fn region_viewport(&self, name: &str) -> Option<Viewport>;

    /// Processes pending window-system events.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// Whether the window system asked the application to quit.
    fn should_quit(&self) -> bool;

    /// Starts a frame cleared to `clear_color`.
    fn begin_frame(&mut self, clear_color: Vec4) -> Result<()>;

    /// Selects the viewport and camera matrices used by subsequent draws.
    fn activate(&mut self, viewport: Viewport, view: Mat4, projection: Mat4);

    /// Uploads vertices into a new GPU buffer.
    fn upload(&mut self, vertices: &[Vertex]) -> Result<GpuBuffer>;

    /// Draws a previously uploaded buffer with the active viewport and camera.
    fn draw(&mut self, buffer: &GpuBuffer, primitive: Primitive, style: &DrawStyle);

    /// Draws an image scaled to fit the given viewport, keeping its aspect ratio.
    fn draw_image(&mut self, viewport: Viewport, image: &RgbaImage) -> Result<()>;

    /// Finishes the frame and presents it.
    fn end_frame(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_to_viewport() {
        let bounds = Bounds::new(0.0, 0.5, 0.25, 1.0);
        let viewport = bounds.to_viewport(800, 600).expect("non-empty");
        assert_eq!(
            viewport,
            Viewport {
                x: 200,
                y: 300,
                width: 600,
                height: 300
            }
        );
    }

    #[test]
    fn test_zero_area_bounds() {
        assert!(Bounds::new(0.0, 0.0, 0.0, 0.0).to_viewport(800, 600).is_none());
        assert!(Bounds::FULL.to_viewport(0, 600).is_none());
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::FULL.validate("full").is_ok());
        assert!(Bounds::new(0.5, 0.2, 0.0, 1.0).validate("inverted").is_err());
        assert!(Bounds::new(0.0, 1.5, 0.0, 1.0).validate("outside").is_err());
    }

    #[test]
    fn test_element_count() {
        assert_eq!(Primitive::Points.element_count(5), 5);
        assert_eq!(Primitive::Lines.element_count(5), 2);
        assert_eq!(Primitive::LineStrip.element_count(5), 4);
        assert_eq!(Primitive::LineStrip.element_count(0), 0);
    }

    #[test]
    fn test_dropped_buffer_is_retired() {
        let queue = RetireQueue::default();
        let buffer = GpuBuffer::new(BufferId(7), 3, queue.clone());
        assert_eq!(buffer.len(), 3);
        drop(buffer);
        assert_eq!(drain_retired(&queue), vec![BufferId(7)]);
        assert!(drain_retired(&queue).is_empty());
    }

    #[test]
    fn test_viewport_contains() {
        let viewport = Viewport {
            x: 10,
            y: 10,
            width: 20,
            height: 20,
        };
        assert!(viewport.contains(Vec2::new(15.0, 29.0)));
        assert!(!viewport.contains(Vec2::new(30.0, 15.0)));
    }
}
