//! slamview: real-time 3D visualization for robotics and SLAM.
//!
//! Producer threads build scene items (point clouds, trajectories, coordinate
//! triads, camera frames, boxes) and keep modifying them while a single render
//! thread draws the latest published state of each item at a fixed cadence.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use slamview::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let body = Arc::new(CoordinateTriad::new("body", Pose::IDENTITY, 1.0));
//!     let camera = Arc::new(Camera::following("cam", CameraOptions::default(), &body));
//!     let scene = Arc::new(View3D::new("scene", camera));
//!     scene.add_item(body.clone());
//!
//!     let mut window = WindowDriver::windowed(WindowOptions::with_title("demo"));
//!     window.add_view(scene, Bounds::FULL);
//!
//!     std::thread::spawn(move || loop {
//!         let pose = body.pose();
//!         body.set_pose(Pose::from_translation(Vec3::X * 0.01) * pose);
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     });
//!     window.run()
//! }
//! ```
//!
//! # Architecture
//!
//! - Items stage changes under a writer lock and publish an immutable snapshot;
//!   the render thread only ever reads published snapshots.
//! - A [`View`] owns a screen region. Region and widget creation is queued and
//!   runs once the graphics context is bound.
//! - The [`WindowDriver`] owns the backend and runs the frame loop.

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod dataset;
mod init;
pub mod panels;
pub mod view;
pub mod view3d;
pub mod window;

pub use init::init_logging;

// Re-export core types
pub use slamview_core::{
    Bounds, CameraOptions, DrawStyle, GraphicsBackend, InputEvent, Mat4, MouseButton, Pose,
    PoseSource, Primitive, Quat, RenderableItem, Result, Vec2, Vec3, Vec4, Vertex, ViewerError,
    Viewport, WindowOptions,
};

// Re-export render types
pub use slamview_render::{
    Camera, CameraMode, CloudPoint, ColorFactory, GrayColor, HasIntensity, HasRgb, HasRing,
    HeadlessBackend, HeightColor, IntensityColor, IntensityGrayColor, PointXyz, PointXyzI,
    PointXyzR, PointXyzRgb, PointXyzRt, RingColor, SelfColor, WgpuBackend,
};

// Re-export items
pub use slamview_structures::{
    Appearance, Arrow, BoxOutline, CameraFrame, CoordinateTriad, HeadPolicy, PointCloud,
    Trajectory,
};

pub use dataset::{DatasetLoader, KittiLoader, KittiOptions, Record};
pub use panels::{ImagePanel, MenuPanel, MenuValue, PlotPanel, PlotRange};
pub use view::{LayoutQueue, LayoutTask, View, ViewBase};
pub use view3d::View3D;
pub use window::{StopHandle, WindowDriver};
