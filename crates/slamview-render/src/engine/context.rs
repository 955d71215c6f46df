//! wgpu device, surface, and frame resources.

use std::sync::Arc;

use winit::window::Window;

use super::pipelines::{self, ImagePipeline, PrimitivePipeline, DEPTH_FORMAT, DRAW_UNIFORMS_SIZE};
use crate::buffer::{align_to, create_uniform_buffer};
use crate::error::{RenderError, RenderResult};

/// Draws the uniform ring can hold before it has to grow.
const INITIAL_UNIFORM_SLOTS: u64 = 256;

/// GPU state owned by the render thread.
pub(crate) struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub depth_view: wgpu::TextureView,
    pub primitives: PrimitivePipeline,
    pub images: ImagePipeline,
    pub uniform_stride: u64,
    pub uniform_slots: u64,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
}

impl GpuContext {
    /// Creates the device and surface for a window.
    pub async fn new(window: Arc<Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;
        log::info!("using graphics adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("slamview device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = Self::create_depth_view(&device, width, height);
        let primitives = pipelines::create_primitive_pipeline(&device, surface_format);
        let images = pipelines::create_image_pipeline(&device, surface_format);

        let uniform_stride = align_to(
            DRAW_UNIFORMS_SIZE,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let (uniform_buffer, uniform_bind_group) =
            Self::create_uniform_ring(&device, &primitives, uniform_stride, INITIAL_UNIFORM_SLOTS);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_view,
            primitives,
            images,
            uniform_stride,
            uniform_slots: INITIAL_UNIFORM_SLOTS,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_ring(
        device: &wgpu::Device,
        primitives: &PrimitivePipeline,
        stride: u64,
        slots: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = create_uniform_buffer(device, stride * slots, Some("draw uniforms"));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw uniforms bind group"),
            layout: &primitives.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(DRAW_UNIFORMS_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Makes sure the uniform ring can hold `draws` entries.
    pub fn reserve_uniform_slots(&mut self, draws: u64) {
        if draws <= self.uniform_slots {
            return;
        }
        let slots = draws.next_power_of_two();
        log::debug!("growing draw uniform ring to {slots} slots");
        let (buffer, bind_group) =
            Self::create_uniform_ring(&self.device, &self.primitives, self.uniform_stride, slots);
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_slots = slots;
    }

    /// Resizes the surface and depth buffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = Self::create_depth_view(&self.device, width, height);
    }

    /// Re-applies the current surface configuration after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }
}
