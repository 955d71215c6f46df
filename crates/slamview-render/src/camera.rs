//! Camera state machine and interactive navigation.
//!
//! A [`Camera`] is shared between producer threads, which switch its mode, and
//! the render thread, which calls [`Camera::update`] once per frame. The view
//! matrix is the product of an interactive look-at ([`Navigation`]) and the
//! inverse of an anchor pose. In `Follow` mode the anchor is the followed item's
//! latest pose, in `Fixed` mode it is the stored pose, and in `Free` mode it is
//! left where it was so only the navigation moves the view.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use glam::{Mat4, Quat, Vec2, Vec3};
use slamview_core::{CameraOptions, MouseButton, Pose, PoseSource, Result, ViewerError, Viewport};

/// Radians of orbit per pixel of drag.
const ORBIT_SPEED: f32 = 0.005;

/// Fractional distance change per scroll line.
const ZOOM_SPEED: f32 = 0.1;

/// Where the camera's anchor pose comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// Only user interaction moves the view.
    #[default]
    Free,
    /// The anchor tracks a renderable item.
    Follow,
    /// The anchor is an explicitly stored pose.
    Fixed,
}

/// Interactive look-at state: eye position, target, and up direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Navigation {
    /// Eye position in the anchor frame.
    pub position: Vec3,
    /// Point the eye looks at, in the anchor frame.
    pub target: Vec3,
    /// Up vector, kept orthogonal to the viewing direction.
    pub up: Vec3,
}

impl Navigation {
    /// Creates a look-at navigation state.
    #[must_use]
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let mut nav = Self {
            position,
            target,
            up,
        };
        nav.orthonormalize_up();
        nav
    }

    /// Returns the look-at matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the viewing direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Returns the right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// Distance between eye and target.
    #[must_use]
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Orbits the eye around the target: `delta_x` about the up axis, `delta_y` about the right axis.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let right = self.right();
        if right == Vec3::ZERO {
            return;
        }
        let rotation = Quat::from_axis_angle(self.up, -delta_x) * Quat::from_axis_angle(right, -delta_y);
        self.position = self.target + rotation * (self.position - self.target);
        self.up = (rotation * self.up).normalize();
        self.orthonormalize_up();
    }

    /// Translates eye and target together in the view plane.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Moves the eye toward (positive) or away from (negative) the target.
    pub fn zoom(&mut self, delta: f32) {
        let direction = self.forward();
        let factor = (1.0 - delta * ZOOM_SPEED).clamp(0.1, 10.0);
        let new_distance = (self.distance() * factor).max(0.1);
        self.position = self.target - direction * new_distance;
    }

    fn orthonormalize_up(&mut self) {
        let forward = self.forward();
        let up = self.up - forward * self.up.dot(forward);
        if up.length_squared() > 1e-12 {
            self.up = up.normalize();
        }
    }
}

/// Projection for pinhole intrinsics with the principal point at the viewport center.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn intrinsic_projection(width: u32, height: u32, fx: f32, fy: f32, near: f32, far: f32) -> Mat4 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    let fov_y = 2.0 * (0.5 * height / fy).atan();
    let aspect = (width / height) * (fy / fx);
    Mat4::perspective_rh(fov_y, aspect, near, far)
}

/// View and projection matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

struct Control {
    mode: CameraMode,
    fixed_pose: Pose,
    follow: Option<Weak<dyn PoseSource>>,
    pending_anchor: Option<Pose>,
    pending_look_at: Option<Navigation>,
}

struct RenderState {
    navigation: Navigation,
    anchor: Pose,
    projection: Mat4,
    last_size: (u32, u32),
    view: Mat4,
}

/// A camera that can be free, fixed to a pose, or slaved to a moving item.
pub struct Camera {
    name: String,
    options: CameraOptions,
    control: Mutex<Control>,
    render: Mutex<RenderState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Camera {
    /// Creates a free camera anchored at the identity.
    pub fn new(name: impl Into<String>, options: CameraOptions) -> Self {
        let navigation = Navigation::look_at(options.eye, options.target, options.up);
        let projection = intrinsic_projection(
            options.render_width,
            options.render_height,
            options.fx,
            options.fy,
            options.near,
            options.far,
        );
        Self {
            name: name.into(),
            control: Mutex::new(Control {
                mode: CameraMode::Free,
                fixed_pose: Pose::IDENTITY,
                follow: None,
                pending_anchor: None,
                pending_look_at: None,
            }),
            render: Mutex::new(RenderState {
                navigation,
                anchor: Pose::IDENTITY,
                projection,
                last_size: (options.render_width, options.render_height),
                view: navigation.view_matrix(),
            }),
            options,
        }
    }

    /// Creates a camera anchored at `pose`, either fixed there or free to move from it.
    pub fn with_pose(name: impl Into<String>, options: CameraOptions, pose: Pose, fixed: bool) -> Self {
        let camera = Self::new(name, options);
        if fixed {
            camera.set_fixed_pose(pose);
        } else {
            lock(&camera.control).pending_anchor = Some(pose);
        }
        camera
    }

    /// Creates a camera following `target`.
    pub fn following<T: PoseSource + 'static>(
        name: impl Into<String>,
        options: CameraOptions,
        target: &Arc<T>,
    ) -> Self {
        let camera = Self::new(name, options);
        camera.set_follow(target);
        camera
    }

    /// Camera name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intrinsics and initial placement.
    pub fn options(&self) -> &CameraOptions {
        &self.options
    }

    /// Current mode.
    pub fn mode(&self) -> CameraMode {
        lock(&self.control).mode
    }

    /// Starts following `target`. The camera keeps only a weak reference.
    pub fn set_follow<T: PoseSource + 'static>(&self, target: &Arc<T>) {
        let target: Arc<dyn PoseSource> = target.clone();
        let pose = target.pose();
        let mut control = lock(&self.control);
        control.mode = CameraMode::Follow;
        control.follow = Some(Arc::downgrade(&target));
        control.pending_anchor = Some(pose);
    }

    /// Resumes following the most recent follow target.
    pub fn refollow(&self) -> Result<()> {
        let mut control = lock(&self.control);
        let target = control
            .follow
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ViewerError::NoFollowTarget(self.name.clone()))?;
        control.mode = CameraMode::Follow;
        control.pending_anchor = Some(target.pose());
        Ok(())
    }

    /// Pins the anchor to `pose`.
    pub fn set_fixed_pose(&self, pose: Pose) {
        let mut control = lock(&self.control);
        control.mode = CameraMode::Fixed;
        control.fixed_pose = pose;
        control.pending_anchor = Some(pose);
    }

    /// Leaves the anchor where it is and hands the view to user interaction.
    pub fn set_free(&self) {
        lock(&self.control).mode = CameraMode::Free;
    }

    /// Replaces the interactive look-at, expressed in the anchor frame.
    pub fn set_look_at(&self, eye: Vec3, target: Vec3, up: Vec3) {
        lock(&self.control).pending_look_at = Some(Navigation::look_at(eye, target, up));
    }

    /// Recomputes view and projection for this frame. Render thread only.
    pub fn update(&self, viewport: Viewport) -> CameraMatrices {
        let (mode, fixed_pose, follow, pending_anchor, pending_look_at) = {
            let mut control = lock(&self.control);
            (
                control.mode,
                control.fixed_pose,
                control.follow.clone(),
                control.pending_anchor.take(),
                control.pending_look_at.take(),
            )
        };

        let anchor = match mode {
            CameraMode::Follow => match follow.as_ref().and_then(Weak::upgrade) {
                Some(target) => Some(target.pose()),
                None => {
                    log::warn!("camera '{}' lost its follow target, switching to free", self.name);
                    let mut control = lock(&self.control);
                    if control.mode == CameraMode::Follow {
                        control.mode = CameraMode::Free;
                    }
                    pending_anchor
                }
            },
            CameraMode::Fixed => Some(fixed_pose),
            CameraMode::Free => pending_anchor,
        };

        let mut render = lock(&self.render);
        if let Some(navigation) = pending_look_at {
            render.navigation = navigation;
        }
        if let Some(anchor) = anchor {
            render.anchor = anchor;
        }
        let size = viewport.size();
        if size != render.last_size {
            log::debug!("camera '{}' viewport resized to {}x{}", self.name, size.0, size.1);
            render.last_size = size;
            render.projection = intrinsic_projection(
                size.0,
                size.1,
                self.options.fx,
                self.options.fy,
                self.options.near,
                self.options.far,
            );
        }
        render.view = render.navigation.view_matrix() * render.anchor.inverse().to_mat4();
        CameraMatrices {
            view: render.view,
            projection: render.projection,
        }
    }

    /// The view matrix computed by the last [`update`](Self::update).
    pub fn view_matrix(&self) -> Mat4 {
        lock(&self.render).view
    }

    /// The current projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        lock(&self.render).projection
    }

    /// The anchor pose applied by the last update.
    pub fn anchor(&self) -> Pose {
        lock(&self.render).anchor
    }

    /// The current interactive look-at.
    pub fn navigation(&self) -> Navigation {
        lock(&self.render).navigation
    }

    /// Applies a mouse drag in pixels: left orbits, right and middle pan.
    pub fn handle_drag(&self, button: MouseButton, delta: Vec2) {
        let mut render = lock(&self.render);
        match button {
            MouseButton::Left => render.navigation.orbit(delta.x * ORBIT_SPEED, delta.y * ORBIT_SPEED),
            MouseButton::Right | MouseButton::Middle => {
                let distance = render.navigation.distance();
                let dx = -delta.x * distance / self.options.fx;
                let dy = delta.y * distance / self.options.fy;
                render.navigation.pan(dx, dy);
            }
        }
    }

    /// Applies scroll wheel motion in lines.
    pub fn handle_scroll(&self, delta: f32) {
        lock(&self.render).navigation.zoom(delta);
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}
