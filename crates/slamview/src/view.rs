//! Screen regions and their deferred layout.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use slamview_core::{GraphicsBackend, InputEvent, Result, Viewport};

/// A unit of layout work that needs the bound graphics context.
pub type LayoutTask = Box<dyn FnOnce(&mut dyn GraphicsBackend) -> Result<()> + Send>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO of layout tasks, filled from any thread and drained on the render thread.
#[derive(Default)]
pub struct LayoutQueue {
    tasks: Mutex<VecDeque<LayoutTask>>,
}

impl LayoutQueue {
    /// Appends a task.
    pub fn push(&self, task: impl FnOnce(&mut dyn GraphicsBackend) -> Result<()> + Send + 'static) {
        lock(&self.tasks).push_back(Box::new(task));
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every queued task in order. Stops at the first error.
    pub fn drain(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        loop {
            // the guard must be gone before the task runs, tasks may enqueue more work
            let next = lock(&self.tasks).pop_front();
            let Some(task) = next else {
                return Ok(());
            };
            task(gfx)?;
        }
    }
}

impl std::fmt::Debug for LayoutQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutQueue").field("len", &self.len()).finish()
    }
}

/// A named screen region with its own content.
///
/// Views never touch the graphics context outside of
/// [`create_layout`](Self::create_layout) and [`render`](Self::render), both of
/// which run on the render thread.
pub trait View: Send + Sync {
    /// Region name, unique within a window.
    fn name(&self) -> &str;

    /// Whether the view should be drawn this frame.
    fn is_visible(&self) -> bool {
        true
    }

    /// Runs the view's queued layout work. Called once, after its region exists.
    fn create_layout(&self, gfx: &mut dyn GraphicsBackend) -> Result<()>;

    /// Draws the view into its viewport.
    fn render(&self, gfx: &mut dyn GraphicsBackend, viewport: Viewport) -> Result<()>;

    /// Reacts to input. Only called for events aimed at this view.
    fn handle_input(&self, _event: &InputEvent, _viewport: Viewport) {}
}

/// State shared by every view kind.
#[derive(Debug)]
pub struct ViewBase {
    name: String,
    visible: AtomicBool,
    layout: LayoutQueue,
}

impl ViewBase {
    /// Creates a visible view base.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: AtomicBool::new(true),
            layout: LayoutQueue::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Shows or hides the view from any thread. Applied on the next frame.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Queues work for [`View::create_layout`].
    pub fn defer(&self, task: impl FnOnce(&mut dyn GraphicsBackend) -> Result<()> + Send + 'static) {
        self.layout.push(task);
    }

    /// Runs the queued layout work.
    pub fn run_layout(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        log::debug!("creating layout of view '{}'", self.name);
        self.layout.drain(gfx)
    }
}

/// Returns the window position of an event, if it has one.
pub(crate) fn event_position(event: &InputEvent) -> Option<glam::Vec2> {
    match event {
        InputEvent::Drag { position, .. }
        | InputEvent::Scroll { position, .. }
        | InputEvent::Click { position, .. } => Some(*position),
        _ => None,
    }
}
