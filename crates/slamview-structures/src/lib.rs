//! Renderable items for slamview.
//!
//! This crate provides the concrete [`RenderableItem`](slamview_core::RenderableItem) kinds:
//! - Arrows and coordinate triads
//! - Box outlines
//! - Camera frustum markers
//! - Trajectories
//! - Colorized point clouds

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod arrow;
pub mod box_outline;
pub mod camera_frame;
pub mod coordinate;
mod item_core;
pub mod point_cloud;
pub mod trajectory;

pub use arrow::{Arrow, HeadPolicy};
pub use box_outline::BoxOutline;
pub use camera_frame::CameraFrame;
pub use coordinate::CoordinateTriad;
pub use item_core::{Appearance, Snapshot};
pub use point_cloud::PointCloud;
pub use trajectory::Trajectory;
