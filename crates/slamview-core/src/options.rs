//! Configuration options for windows and cameras.

use std::path::Path;
use std::time::Duration;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Window and frame-loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOptions {
    /// Window title.
    pub title: String,

    /// Initial window width in pixels.
    pub width: u32,

    /// Initial window height in pixels.
    pub height: u32,

    /// Target time between frames, in milliseconds.
    pub frame_interval_ms: u64,

    /// Color the frame is cleared to.
    pub background_color: Vec4,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "slamview".to_string(),
            width: 1920,
            height: 1080,
            frame_interval_ms: 30,
            background_color: Vec4::ONE,
        }
    }
}

impl WindowOptions {
    /// Options with the given title and default everything else.
    #[must_use]
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// The frame cadence as a [`Duration`].
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Parses options from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading window options from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Camera intrinsics and initial look-at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Nominal render width used before the first viewport is known.
    pub render_width: u32,

    /// Nominal render height used before the first viewport is known.
    pub render_height: u32,

    /// Horizontal focal length in pixels.
    pub fx: f32,

    /// Vertical focal length in pixels.
    pub fy: f32,

    /// Near clipping plane.
    pub near: f32,

    /// Far clipping plane.
    pub far: f32,

    /// Initial eye position.
    pub eye: Vec3,

    /// Initial look-at target.
    pub target: Vec3,

    /// Initial up direction.
    pub up: Vec3,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            render_width: 1280,
            render_height: 720,
            fx: 500.0,
            fy: 500.0,
            near: 0.1,
            far: 1000.0,
            eye: Vec3::new(0.0, 0.0, 1000.0),
            target: Vec3::ZERO,
            up: Vec3::X,
        }
    }
}

impl CameraOptions {
    /// Parses options from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading camera options from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let options = WindowOptions::default();
        assert_eq!(options.frame_interval(), Duration::from_millis(30));
        assert_eq!(options.background_color, Vec4::ONE);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = WindowOptions::from_json_str(r#"{ "title": "kitti", "frame_interval_ms": 15 }"#)
            .expect("valid json");
        assert_eq!(options.title, "kitti");
        assert_eq!(options.frame_interval_ms, 15);
        assert_eq!(options.width, 1920);
    }

    #[test]
    fn test_camera_json() {
        let options = CameraOptions::from_json_str(r#"{ "fx": 720.0, "far": 50.0 }"#).expect("valid json");
        assert_eq!(options.fx, 720.0);
        assert_eq!(options.fy, 500.0);
        assert_eq!(options.far, 50.0);
        assert_eq!(options.up, Vec3::X);
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(WindowOptions::from_json_str("{ not json").is_err());
    }
}
