//! Rendering for slamview.
//!
//! This crate provides:
//! - [`WgpuBackend`], the windowed [`GraphicsBackend`](slamview_core::GraphicsBackend)
//! - [`HeadlessBackend`], an in-memory backend for tests and offscreen runs
//! - [`Camera`], the free / fixed / follow camera state machine
//! - [`ColorFactory`] policies for point-cloud colorization

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod camera;
pub mod color;
pub mod engine;
pub mod error;
pub mod headless;

pub use camera::{Camera, CameraMatrices, CameraMode, Navigation};
pub use color::{
    CloudPoint, ColorFactory, GrayColor, HasIntensity, HasRgb, HasRing, HeightColor, IntensityColor,
    IntensityGrayColor, PointXyz, PointXyzI, PointXyzR, PointXyzRgb, PointXyzRt, RingColor, SelfColor,
};
pub use engine::WgpuBackend;
pub use error::{RenderError, RenderResult};
pub use headless::{DrawRecord, FrameLog, HeadlessBackend, ImageRecord, RecordedFrame};
