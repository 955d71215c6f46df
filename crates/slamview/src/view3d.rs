//! 3D scene view.

use std::sync::{Arc, Mutex};

use slamview_core::{GraphicsBackend, InputEvent, RenderableItem, Result, Viewport};
use slamview_render::Camera;

use crate::view::{event_position, lock, View, ViewBase};

/// A view that draws renderable items through a camera.
///
/// Items can be added from any thread at any time; the list is snapshotted
/// at the start of each frame and drawn in insertion order.
pub struct View3D {
    base: ViewBase,
    camera: Arc<Camera>,
    items: Mutex<Vec<Arc<dyn RenderableItem>>>,
}

impl View3D {
    /// Creates an empty scene watched by `camera`.
    pub fn new(name: impl Into<String>, camera: Arc<Camera>) -> Self {
        Self {
            base: ViewBase::new(name),
            camera,
            items: Mutex::new(Vec::new()),
        }
    }

    /// The camera bound to this view.
    pub fn camera(&self) -> &Arc<Camera> {
        &self.camera
    }

    /// Appends an item to the scene.
    pub fn add_item(&self, item: Arc<dyn RenderableItem>) {
        log::debug!("view '{}' adds item '{}'", self.base.name(), item.name());
        lock(&self.items).push(item);
    }

    /// Removes the first item called `name` and returns it.
    pub fn remove_item(&self, name: &str) -> Option<Arc<dyn RenderableItem>> {
        let mut items = lock(&self.items);
        let index = items.iter().position(|item| item.name() == name)?;
        Some(items.remove(index))
    }

    /// Snapshot of the current items in draw order.
    pub fn items(&self) -> Vec<Arc<dyn RenderableItem>> {
        lock(&self.items).clone()
    }

    /// Shows or hides the view.
    pub fn set_visible(&self, visible: bool) {
        self.base.set_visible(visible);
    }
}

impl View for View3D {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn is_visible(&self) -> bool {
        self.base.is_visible()
    }

    fn create_layout(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        self.base.run_layout(gfx)
    }

    fn render(&self, gfx: &mut dyn GraphicsBackend, viewport: Viewport) -> Result<()> {
        let matrices = self.camera.update(viewport);
        gfx.activate(viewport, matrices.view, matrices.projection);
        for item in self.items() {
            // a failed upload stays dirty and is retried next frame
            if let Err(err) = item.update_for_render(gfx) {
                log::warn!("skipping '{}' this frame: {err}", item.name());
                continue;
            }
            item.render(gfx);
        }
        Ok(())
    }

    fn handle_input(&self, event: &InputEvent, viewport: Viewport) {
        if !event_position(event).is_some_and(|p| viewport.contains(p)) {
            return;
        }
        match event {
            InputEvent::Drag { button, delta, .. } => self.camera.handle_drag(*button, *delta),
            InputEvent::Scroll { delta, .. } => self.camera.handle_scroll(*delta),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use slamview_core::{Bounds, CameraOptions, MouseButton, Pose};
    use slamview_render::HeadlessBackend;
    use slamview_structures::{BoxOutline, Trajectory};

    fn bound_backend() -> (HeadlessBackend, Viewport) {
        let mut gfx = HeadlessBackend::new(400, 300);
        gfx.bind_context().unwrap();
        gfx.create_region("scene", Bounds::FULL).unwrap();
        let viewport = gfx.region_viewport("scene").unwrap();
        (gfx, viewport)
    }

    #[test]
    fn test_items_drawn_in_order() {
        let view = View3D::new("scene", Arc::new(Camera::new("cam", CameraOptions::default())));
        let outline = Arc::new(BoxOutline::new("box", Pose::IDENTITY, Vec3::ONE));
        let trajectory = Arc::new(Trajectory::new("path"));
        trajectory.add_point(Vec3::ZERO);
        trajectory.add_point(Vec3::X);
        view.add_item(outline);
        view.add_item(trajectory);

        let (mut gfx, viewport) = bound_backend();
        gfx.begin_frame(glam::Vec4::ONE).unwrap();
        view.render(&mut gfx, viewport).unwrap();
        gfx.end_frame().unwrap();

        let frame = gfx.frame_log().last().unwrap();
        // box lines, then trajectory strip and points
        assert_eq!(frame.draws.len(), 3);
        assert_eq!(frame.draws[0].vertices.len(), 24);
        assert_eq!(frame.draws[1].primitive, slamview_core::Primitive::LineStrip);
        assert_eq!(frame.draws[0].view, view.camera().view_matrix());
    }

    struct Unloadable;

    impl slamview_core::PoseSource for Unloadable {
        fn pose(&self) -> Pose {
            Pose::IDENTITY
        }
    }

    impl RenderableItem for Unloadable {
        fn name(&self) -> &str {
            "unloadable"
        }

        fn set_pose(&self, _pose: Pose) {}

        fn update_for_render(&self, _gfx: &mut dyn GraphicsBackend) -> Result<()> {
            Err(slamview_core::ViewerError::Render("out of memory".to_string()))
        }

        fn render(&self, _gfx: &mut dyn GraphicsBackend) {
            panic!("drawn after a failed upload");
        }

        fn is_ready(&self) -> bool {
            false
        }

        fn clear(&self) {}
    }

    #[test]
    fn test_failed_item_does_not_hide_the_others() {
        let view = View3D::new("scene", Arc::new(Camera::new("cam", CameraOptions::default())));
        view.add_item(Arc::new(Unloadable));
        view.add_item(Arc::new(BoxOutline::new("box", Pose::IDENTITY, Vec3::ONE)));

        let (mut gfx, viewport) = bound_backend();
        gfx.begin_frame(glam::Vec4::ONE).unwrap();
        view.render(&mut gfx, viewport).unwrap();
        gfx.end_frame().unwrap();

        let frame = gfx.frame_log().last().unwrap();
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(frame.draws[0].vertices.len(), 24);
    }

    #[test]
    fn test_remove_item() {
        let view = View3D::new("scene", Arc::new(Camera::new("cam", CameraOptions::default())));
        view.add_item(Arc::new(Trajectory::new("a")));
        view.add_item(Arc::new(Trajectory::new("b")));
        assert!(view.remove_item("a").is_some());
        assert!(view.remove_item("a").is_none());
        assert_eq!(view.items().len(), 1);
    }

    #[test]
    fn test_input_outside_viewport_ignored() {
        let camera = Arc::new(Camera::new("cam", CameraOptions::default()));
        let view = View3D::new("scene", Arc::clone(&camera));
        let viewport = Viewport {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        let before = camera.navigation();
        view.handle_input(
            &InputEvent::Scroll {
                delta: 3.0,
                position: Vec2::new(150.0, 50.0),
            },
            viewport,
        );
        assert_eq!(camera.navigation(), before);
        view.handle_input(
            &InputEvent::Drag {
                button: MouseButton::Left,
                delta: Vec2::new(10.0, 0.0),
                position: Vec2::new(50.0, 50.0),
            },
            viewport,
        );
        assert_ne!(camera.navigation(), before);
    }
}
