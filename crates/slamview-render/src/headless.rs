//! A recording backend that needs no window or GPU.
//!
//! [`HeadlessBackend`] implements the full [`GraphicsBackend`] contract in
//! memory. Uploads are kept as vertex arrays and every draw call is recorded
//! together with the camera state that was active, which makes it suitable for
//! tests and for running the frame loop in environments without a display.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::{Mat4, Vec4};
use image::RgbaImage;
use slamview_core::backend::drain_retired;
use slamview_core::{
    Bounds, BufferId, DrawStyle, GpuBuffer, GraphicsBackend, InputEvent, Primitive, Result, RetireQueue,
    Vertex, ViewerError, Viewport,
};

/// Frames kept in the shared log before the oldest are dropped.
const MAX_LOGGED_FRAMES: usize = 256;

/// One recorded draw call.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub viewport: Viewport,
    pub view: Mat4,
    pub projection: Mat4,
    pub buffer: BufferId,
    pub primitive: Primitive,
    pub style: DrawStyle,
    pub vertices: Arc<Vec<Vertex>>,
}

/// One recorded image draw.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
}

/// Everything drawn between `begin_frame` and `end_frame`.
#[derive(Debug, Clone, Default)]
pub struct RecordedFrame {
    pub index: u64,
    pub clear_color: Vec4,
    pub draws: Vec<DrawRecord>,
    pub images: Vec<ImageRecord>,
}

/// Shared, thread-safe view of the frames a [`HeadlessBackend`] has finished.
#[derive(Debug, Clone, Default)]
pub struct FrameLog(Arc<Mutex<VecDeque<RecordedFrame>>>);

impl FrameLog {
    fn lock(&self) -> MutexGuard<'_, VecDeque<RecordedFrame>> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn push(&self, frame: RecordedFrame) {
        let mut frames = self.lock();
        if frames.len() == MAX_LOGGED_FRAMES {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// The most recently finished frame.
    pub fn last(&self) -> Option<RecordedFrame> {
        self.lock().back().cloned()
    }

    /// All retained frames, oldest first.
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained frames.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no frame has finished yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[derive(Debug, Clone)]
struct Region {
    name: String,
    bounds: Bounds,
    visible: bool,
}

/// An in-memory [`GraphicsBackend`].
#[derive(Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    bound: bool,
    regions: Vec<Region>,
    region_log: Vec<String>,
    buffers: HashMap<BufferId, Arc<Vec<Vertex>>>,
    retired: RetireQueue,
    next_buffer_id: u64,
    upload_count: u64,
    pending_events: VecDeque<InputEvent>,
    quit_after_frames: Option<u64>,
    quit: bool,
    frames_finished: u64,
    active: Option<(Viewport, Mat4, Mat4)>,
    current: Option<RecordedFrame>,
    log: FrameLog,
}

impl HeadlessBackend {
    /// Creates a backend simulating a window of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bound: false,
            regions: Vec::new(),
            region_log: Vec::new(),
            buffers: HashMap::new(),
            retired: RetireQueue::default(),
            next_buffer_id: 0,
            upload_count: 0,
            pending_events: VecDeque::new(),
            quit_after_frames: None,
            quit: false,
            frames_finished: 0,
            active: None,
            current: None,
            log: FrameLog::default(),
        }
    }

    /// Makes the backend report a quit request once `frames` frames have finished.
    #[must_use]
    pub fn quit_after_frames(mut self, frames: u64) -> Self {
        self.quit_after_frames = Some(frames);
        self
    }

    /// Queues an input event for the next `poll_events`.
    pub fn push_event(&mut self, event: InputEvent) {
        self.pending_events.push_back(event);
    }

    /// Simulates a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pending_events.push_back(InputEvent::Resized { width, height });
    }

    /// Handle to the finished-frame log, usable from other threads.
    pub fn frame_log(&self) -> FrameLog {
        self.log.clone()
    }

    /// Names of regions in creation order.
    pub fn region_log(&self) -> &[String] {
        &self.region_log
    }

    /// Whether `bind_context` has been called.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Number of buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Total number of uploads performed.
    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    /// Number of finished frames.
    pub fn frames_finished(&self) -> u64 {
        self.frames_finished
    }

    fn region_mut(&mut self, name: &str) -> Result<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| ViewerError::RegionNotFound(name.to_string()))
    }

    fn require_bound(&self) -> Result<()> {
        if self.bound {
            Ok(())
        } else {
            Err(ViewerError::ContextNotBound)
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn bind_context(&mut self) -> Result<()> {
        self.bound = true;
        log::debug!("headless context bound ({}x{})", self.width, self.height);
        Ok(())
    }

    fn create_region(&mut self, name: &str, bounds: Bounds) -> Result<()> {
        self.require_bound()?;
        bounds.validate(name)?;
        if let Ok(region) = self.region_mut(name) {
            region.bounds = bounds;
            return Ok(());
        }
        self.regions.push(Region {
            name: name.to_string(),
            bounds,
            visible: true,
        });
        self.region_log.push(name.to_string());
        Ok(())
    }

    fn set_region_visible(&mut self, name: &str, visible: bool) -> Result<()> {
        self.region_mut(name)?.visible = visible;
        Ok(())
    }

    fn region_viewport(&self, name: &str) -> Option<Viewport> {
        self.regions
            .iter()
            .find(|r| r.name == name && r.visible)
            .and_then(|r| r.bounds.to_viewport(self.width, self.height))
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        self.pending_events.drain(..).collect()
    }

    fn should_quit(&self) -> bool {
        self.quit
    }

    fn begin_frame(&mut self, clear_color: Vec4) -> Result<()> {
        self.require_bound()?;
        for id in drain_retired(&self.retired) {
            self.buffers.remove(&id);
        }
        self.active = None;
        self.current = Some(RecordedFrame {
            index: self.frames_finished,
            clear_color,
            ..RecordedFrame::default()
        });
        Ok(())
    }

    fn activate(&mut self, viewport: Viewport, view: Mat4, projection: Mat4) {
        self.active = Some((viewport, view, projection));
    }

    fn upload(&mut self, vertices: &[Vertex]) -> Result<GpuBuffer> {
        self.require_bound()?;
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        self.upload_count += 1;
        self.buffers.insert(id, Arc::new(vertices.to_vec()));
        Ok(GpuBuffer::new(id, vertices.len(), self.retired.clone()))
    }

    fn draw(&mut self, buffer: &GpuBuffer, primitive: Primitive, style: &DrawStyle) {
        let Some(vertices) = self.buffers.get(&buffer.id()).cloned() else {
            log::warn!("draw of unknown buffer {:?}", buffer.id());
            return;
        };
        let (viewport, view, projection) = self.active.unwrap_or((
            Viewport {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            },
            Mat4::IDENTITY,
            Mat4::IDENTITY,
        ));
        if let Some(frame) = self.current.as_mut() {
            frame.draws.push(DrawRecord {
                viewport,
                view,
                projection,
                buffer: buffer.id(),
                primitive,
                style: *style,
                vertices,
            });
        }
    }

    fn draw_image(&mut self, viewport: Viewport, image: &RgbaImage) -> Result<()> {
        if let Some(frame) = self.current.as_mut() {
            frame.images.push(ImageRecord {
                viewport,
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(frame) = self.current.take() {
            self.log.push(frame);
        }
        self.frames_finished += 1;
        if self.quit_after_frames.is_some_and(|n| self.frames_finished >= n) {
            self.quit = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_upload_requires_bound_context() {
        let mut gfx = HeadlessBackend::new(100, 100);
        assert!(matches!(gfx.upload(&[]), Err(ViewerError::ContextNotBound)));
        gfx.bind_context().unwrap();
        assert!(gfx.upload(&[]).is_ok());
    }

    #[test]
    fn test_dropped_buffers_freed_next_frame() {
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        let buffer = gfx.upload(&[Vertex::new(Vec3::ZERO, Vec4::ONE)]).unwrap();
        assert_eq!(gfx.live_buffers(), 1);
        drop(buffer);
        assert_eq!(gfx.live_buffers(), 1);
        gfx.begin_frame(Vec4::ONE).unwrap();
        assert_eq!(gfx.live_buffers(), 0);
    }

    #[test]
    fn test_records_draws_with_active_camera() {
        let mut gfx = HeadlessBackend::new(200, 100);
        gfx.bind_context().unwrap();
        gfx.create_region("main", Bounds::FULL).unwrap();
        let viewport = gfx.region_viewport("main").unwrap();
        let buffer = gfx
            .upload(&[Vertex::new(Vec3::ZERO, Vec4::ONE), Vertex::new(Vec3::X, Vec4::ONE)])
            .unwrap();

        gfx.begin_frame(Vec4::ONE).unwrap();
        let view = Mat4::from_translation(Vec3::Z);
        gfx.activate(viewport, view, Mat4::IDENTITY);
        gfx.draw(&buffer, Primitive::Lines, &DrawStyle::default());
        gfx.end_frame().unwrap();

        let frame = gfx.frame_log().last().unwrap();
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(frame.draws[0].view, view);
        assert_eq!(frame.draws[0].vertices.len(), 2);
    }

    #[test]
    fn test_hidden_region_has_no_viewport() {
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        gfx.create_region("side", Bounds::new(0.0, 1.0, 0.0, 0.5)).unwrap();
        assert!(gfx.region_viewport("side").is_some());
        gfx.set_region_visible("side", false).unwrap();
        assert!(gfx.region_viewport("side").is_none());
        assert!(gfx.region_viewport("missing").is_none());
    }

    #[test]
    fn test_quit_after_frames() {
        let mut gfx = HeadlessBackend::new(10, 10).quit_after_frames(2);
        gfx.bind_context().unwrap();
        for _ in 0..2 {
            assert!(!gfx.should_quit());
            gfx.begin_frame(Vec4::ONE).unwrap();
            gfx.end_frame().unwrap();
        }
        assert!(gfx.should_quit());
    }
}
