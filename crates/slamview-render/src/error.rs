//! Rendering error types.

use slamview_core::ViewerError;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create the windowing event loop.
    #[error("failed to create event loop: {0}")]
    EventLoopCreationFailed(#[from] winit::error::EventLoopError),

    /// The window system never delivered a window.
    #[error("failed to create window: {0}")]
    WindowCreationFailed(String),

    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// The surface reported no usable formats.
    #[error("surface configuration failed")]
    SurfaceConfigurationFailed,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for ViewerError {
    fn from(err: RenderError) -> Self {
        ViewerError::Render(err.to_string())
    }
}
