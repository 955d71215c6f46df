//! Core abstractions for slamview.
//!
//! This crate provides the types shared by every other slamview crate:
//! - [`Pose`] rigid transforms
//! - [`RenderableItem`] and [`PoseSource`] traits for drawable geometry
//! - [`GraphicsBackend`] contract implemented by the render crate
//! - Window and camera configuration options

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod error;
pub mod item;
pub mod options;
pub mod pose;

pub use backend::{
    Bounds, BufferId, DrawStyle, GpuBuffer, GraphicsBackend, InputEvent, MouseButton, Primitive,
    RetireQueue, Vertex, Viewport,
};
pub use error::{Result, ViewerError};
pub use item::{PoseSource, RenderableItem};
pub use options::{CameraOptions, WindowOptions};
pub use pose::Pose;

// Re-export glam types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
