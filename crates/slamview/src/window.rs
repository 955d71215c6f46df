//! The window driver and its frame loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use slamview_core::{Bounds, GraphicsBackend, InputEvent, Result, WindowOptions};
use slamview_render::WgpuBackend;

use crate::init::init_logging;
use crate::view::{LayoutQueue, View};

/// Cooperative stop signal for a running [`WindowDriver`].
///
/// Cloning is cheap; any clone can stop the loop from any thread. The loop
/// notices the request at its next iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Asks the frame loop to exit.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct ViewSlot {
    view: Arc<dyn View>,
    shown: bool,
}

/// Owns the graphics backend, the views and the frame loop.
///
/// Views are registered before [`run`](Self::run). Registration only queues
/// the creation of each view's display region; the queue is drained once,
/// in registration order, right after the backend is bound.
pub struct WindowDriver<B: GraphicsBackend> {
    backend: B,
    options: WindowOptions,
    views: Vec<ViewSlot>,
    layout: LayoutQueue,
    stop: StopHandle,
    frames: u64,
}

impl WindowDriver<WgpuBackend> {
    /// A driver rendering into a native window.
    ///
    /// The window is opened by [`run`](Self::run) on the calling thread.
    pub fn windowed(options: WindowOptions) -> Self {
        Self::new(WgpuBackend::new(options.clone()), options)
    }
}

impl<B: GraphicsBackend> WindowDriver<B> {
    /// Creates a driver around an unbound backend.
    pub fn new(backend: B, options: WindowOptions) -> Self {
        Self {
            backend,
            options,
            views: Vec::new(),
            layout: LayoutQueue::default(),
            stop: StopHandle::default(),
            frames: 0,
        }
    }

    /// Registers a view occupying `bounds` of the window.
    pub fn add_view(&mut self, view: Arc<dyn View>, bounds: Bounds) {
        let task_view = Arc::clone(&view);
        self.layout.push(move |gfx| {
            let name = task_view.name().to_string();
            log::debug!("creating region '{name}' at {bounds:?}");
            gfx.create_region(&name, bounds)?;
            task_view.create_layout(gfx)
        });
        self.views.push(ViewSlot { view, shown: true });
    }

    /// Handle that stops the loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Number of frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Binds the backend, builds the layout and runs frames until the window
    /// closes or a stop is requested.
    pub fn run(&mut self) -> Result<()> {
        init_logging();
        self.backend.bind_context()?;
        self.layout.drain(&mut self.backend)?;
        log::info!(
            "window '{}' running {} views every {} ms",
            self.options.title,
            self.views.len(),
            self.options.frame_interval_ms
        );

        let interval = self.options.frame_interval();
        while !self.backend.should_quit() && !self.stop.is_stopped() {
            let started = Instant::now();
            self.tick()?;
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        log::info!("window '{}' stopped after {} frames", self.options.title, self.frames);
        Ok(())
    }

    /// Routes input and draws one frame. Render thread only.
    pub fn tick(&mut self) -> Result<()> {
        let events = self.backend.poll_events();
        for event in &events {
            self.route(event);
        }

        self.backend.begin_frame(self.options.background_color)?;
        for slot in &mut self.views {
            let visible = slot.view.is_visible();
            if visible != slot.shown {
                self.backend.set_region_visible(slot.view.name(), visible)?;
                slot.shown = visible;
            }
            let Some(viewport) = self.backend.region_viewport(slot.view.name()) else {
                continue;
            };
            slot.view.render(&mut self.backend, viewport)?;
        }
        self.backend.end_frame()?;
        self.frames += 1;
        Ok(())
    }

    fn route(&self, event: &InputEvent) {
        if matches!(event, InputEvent::CloseRequested | InputEvent::Resized { .. }) {
            return;
        }
        for slot in &self.views {
            if let Some(viewport) = self.backend.region_viewport(slot.view.name()) {
                slot.view.handle_input(event, viewport);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_handle_shared() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_stopped());
        clone.stop();
        assert!(handle.is_stopped());
    }
}
