//! The windowed rendering backend, built on wgpu and winit.

mod context;
mod pipelines;
mod window;

use std::collections::HashMap;
use std::time::Duration;

use glam::{Mat4, Vec4};
use image::RgbaImage;
use slamview_core::backend::drain_retired;
use slamview_core::{
    Bounds, BufferId, DrawStyle, GpuBuffer, GraphicsBackend, InputEvent, Primitive, Result, RetireQueue,
    Vertex, ViewerError, Viewport, WindowOptions,
};
use winit::event_loop::EventLoop;

use self::context::GpuContext;
use self::pipelines::DrawUniforms;
use self::window::{build_event_loop, WindowHandler};
use crate::buffer::create_storage_buffer;

/// A vertex buffer on the GPU with its storage bind group.
struct VertexBuffer {
    // kept alive for the bind group
    _buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone)]
struct Region {
    name: String,
    bounds: Bounds,
    visible: bool,
}

enum Command {
    Primitive {
        viewport: Viewport,
        uniform_index: u32,
        buffer: BufferId,
        instances: u32,
    },
    Image {
        viewport: Viewport,
        bind_group: wgpu::BindGroup,
    },
}

#[derive(Default)]
struct FrameRecording {
    clear_color: Vec4,
    viewport: Option<Viewport>,
    view_proj: Mat4,
    uniforms: Vec<DrawUniforms>,
    commands: Vec<Command>,
}

/// [`GraphicsBackend`] that renders into a native window.
///
/// The window and device are created by [`bind_context`](GraphicsBackend::bind_context)
/// on the thread that will run the frame loop. Draw calls are recorded during the
/// frame and encoded into a single render pass in
/// [`end_frame`](GraphicsBackend::end_frame).
pub struct WgpuBackend {
    options: WindowOptions,
    event_loop: Option<EventLoop<()>>,
    handler: WindowHandler,
    gpu: Option<GpuContext>,
    regions: Vec<Region>,
    buffers: HashMap<BufferId, Option<VertexBuffer>>,
    retired: RetireQueue,
    next_buffer_id: u64,
    frame: FrameRecording,
}

impl WgpuBackend {
    /// Creates an unbound backend. No window exists until `bind_context`.
    pub fn new(options: WindowOptions) -> Self {
        Self {
            handler: WindowHandler::new(options.clone()),
            options,
            event_loop: None,
            gpu: None,
            regions: Vec::new(),
            buffers: HashMap::new(),
            retired: RetireQueue::default(),
            next_buffer_id: 0,
            frame: FrameRecording::default(),
        }
    }

    /// Window configuration.
    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    fn gpu(&self) -> Result<&GpuContext> {
        self.gpu.as_ref().ok_or(ViewerError::ContextNotBound)
    }

    fn surface_size(&self) -> (u32, u32) {
        self.gpu.as_ref().map_or((0, 0), GpuContext::size)
    }

    fn region_mut(&mut self, name: &str) -> Result<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| ViewerError::RegionNotFound(name.to_string()))
    }

    /// Shrinks `viewport` to the largest rectangle with the image's aspect ratio, centered.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn fit_viewport(viewport: Viewport, width: u32, height: u32) -> Viewport {
        let scale = (viewport.width as f32 / width as f32).min(viewport.height as f32 / height as f32);
        let fitted_w = ((width as f32 * scale) as u32).clamp(1, viewport.width);
        let fitted_h = ((height as f32 * scale) as u32).clamp(1, viewport.height);
        Viewport {
            x: viewport.x + (viewport.width - fitted_w) / 2,
            y: viewport.y + (viewport.height - fitted_h) / 2,
            width: fitted_w,
            height: fitted_h,
        }
    }

    /// Clamps a viewport to the surface so scissor rects stay valid.
    fn clamp_viewport(viewport: Viewport, (width, height): (u32, u32)) -> Option<Viewport> {
        let x = viewport.x.min(width);
        let y = viewport.y.min(height);
        let clamped = Viewport {
            x,
            y,
            width: viewport.width.min(width - x),
            height: viewport.height.min(height - y),
        };
        (clamped.width > 0 && clamped.height > 0).then_some(clamped)
    }

    #[allow(clippy::cast_possible_truncation, clippy::too_many_lines)]
    fn submit(&mut self) -> Result<()> {
        let frame = std::mem::take(&mut self.frame);
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(ViewerError::ContextNotBound);
        };

        gpu.reserve_uniform_slots(frame.uniforms.len() as u64);
        for (i, uniforms) in frame.uniforms.iter().enumerate() {
            gpu.queue.write_buffer(
                &gpu.uniform_buffer,
                i as u64 * gpu.uniform_stride,
                bytemuck::bytes_of(uniforms),
            );
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(crate::RenderError::OutOfMemory.into());
            }
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let clear = frame.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(clear.x),
                            g: f64::from(clear.y),
                            b: f64::from(clear.z),
                            a: f64::from(clear.w),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            let size = gpu.size();
            for command in &frame.commands {
                match command {
                    Command::Primitive {
                        viewport,
                        uniform_index,
                        buffer,
                        instances,
                    } => {
                        let Some(Some(vertices)) = self.buffers.get(buffer) else {
                            continue;
                        };
                        let Some(viewport) = Self::clamp_viewport(*viewport, size) else {
                            continue;
                        };
                        set_viewport(&mut render_pass, viewport);
                        render_pass.set_pipeline(&gpu.primitives.pipeline);
                        let offset = u64::from(*uniform_index) * gpu.uniform_stride;
                        render_pass.set_bind_group(0, &gpu.uniform_bind_group, &[offset as u32]);
                        render_pass.set_bind_group(1, &vertices.bind_group, &[]);
                        render_pass.draw(0..6, 0..*instances);
                    }
                    Command::Image {
                        viewport,
                        bind_group,
                    } => {
                        let Some(viewport) = Self::clamp_viewport(*viewport, size) else {
                            continue;
                        };
                        set_viewport(&mut render_pass, viewport);
                        render_pass.set_pipeline(&gpu.images.pipeline);
                        render_pass.set_bind_group(0, bind_group, &[]);
                        render_pass.draw(0..6, 0..1);
                    }
                }
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn set_viewport(render_pass: &mut wgpu::RenderPass<'_>, viewport: Viewport) {
    render_pass.set_viewport(
        viewport.x as f32,
        viewport.y as f32,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
    render_pass.set_scissor_rect(viewport.x, viewport.y, viewport.width, viewport.height);
}

impl GraphicsBackend for WgpuBackend {
    fn bind_context(&mut self) -> Result<()> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let mut event_loop = build_event_loop()?;
        let window = self.handler.wait_for_window(&mut event_loop)?;
        let gpu = pollster::block_on(GpuContext::new(window))?;
        log::info!("graphics context bound ({}x{})", gpu.size().0, gpu.size().1);
        self.event_loop = Some(event_loop);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn create_region(&mut self, name: &str, bounds: Bounds) -> Result<()> {
        self.gpu()?;
        bounds.validate(name)?;
        if let Ok(region) = self.region_mut(name) {
            region.bounds = bounds;
            return Ok(());
        }
        log::debug!("created region '{name}' at {bounds:?}");
        self.regions.push(Region {
            name: name.to_string(),
            bounds,
            visible: true,
        });
        Ok(())
    }

    fn set_region_visible(&mut self, name: &str, visible: bool) -> Result<()> {
        self.region_mut(name)?.visible = visible;
        Ok(())
    }

    fn region_viewport(&self, name: &str) -> Option<Viewport> {
        let (width, height) = self.surface_size();
        self.regions
            .iter()
            .find(|r| r.name == name && r.visible)
            .and_then(|r| r.bounds.to_viewport(width, height))
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        if let Some(event_loop) = self.event_loop.as_mut() {
            self.handler.pump(event_loop, Duration::ZERO);
        }
        let events = self.handler.take_events();
        for event in &events {
            if let (InputEvent::Resized { width, height }, Some(gpu)) = (event, self.gpu.as_mut()) {
                gpu.resize(*width, *height);
            }
        }
        events
    }

    fn should_quit(&self) -> bool {
        self.handler.close_requested()
    }

    fn begin_frame(&mut self, clear_color: Vec4) -> Result<()> {
        self.gpu()?;
        for id in drain_retired(&self.retired) {
            self.buffers.remove(&id);
        }
        self.frame = FrameRecording {
            clear_color,
            ..FrameRecording::default()
        };
        Ok(())
    }

    fn activate(&mut self, viewport: Viewport, view: Mat4, projection: Mat4) {
        self.frame.viewport = Some(viewport);
        self.frame.view_proj = projection * view;
    }

    fn upload(&mut self, vertices: &[Vertex]) -> Result<GpuBuffer> {
        let gpu = self.gpu()?;
        let id = BufferId(self.next_buffer_id);
        // zero-sized storage bindings are invalid, so empty uploads get no allocation
        let entry = (!vertices.is_empty()).then(|| {
            let buffer = create_storage_buffer(&gpu.device, vertices, Some("item vertices"));
            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("item vertices bind group"),
                layout: &gpu.primitives.vertex_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            VertexBuffer {
                _buffer: buffer,
                bind_group,
            }
        });
        self.next_buffer_id += 1;
        self.buffers.insert(id, entry);
        Ok(GpuBuffer::new(id, vertices.len(), self.retired.clone()))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw(&mut self, buffer: &GpuBuffer, primitive: Primitive, style: &DrawStyle) {
        let instances = primitive.element_count(buffer.len());
        if instances == 0 {
            return;
        }
        let (width, height) = self.surface_size();
        let viewport = self.frame.viewport.unwrap_or(Viewport {
            x: 0,
            y: 0,
            width,
            height,
        });
        let mode = match primitive {
            Primitive::Points => 0.0,
            Primitive::Lines => 1.0,
            Primitive::LineStrip => 2.0,
        };
        let uniform_index = self.frame.uniforms.len() as u32;
        self.frame.uniforms.push(DrawUniforms {
            view_proj: self.frame.view_proj.to_cols_array_2d(),
            color: style.color.unwrap_or(Vec4::ONE).to_array(),
            viewport: [viewport.width.max(1) as f32, viewport.height.max(1) as f32, 0.0, 0.0],
            params: [
                style.line_width,
                style.point_size,
                mode,
                if style.color.is_some() { 1.0 } else { 0.0 },
            ],
        });
        self.frame.commands.push(Command::Primitive {
            viewport,
            uniform_index,
            buffer: buffer.id(),
            instances: instances as u32,
        });
    }

    fn draw_image(&mut self, viewport: Viewport, image: &RgbaImage) -> Result<()> {
        let gpu = self.gpu()?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || viewport.width == 0 || viewport.height == 0 {
            return Ok(());
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("panel image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("panel image bind group"),
            layout: &gpu.images.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&gpu.images.sampler),
                },
            ],
        });
        self.frame.commands.push(Command::Image {
            viewport: Self::fit_viewport(viewport, width, height),
            bind_group,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.submit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_viewport_keeps_aspect() {
        let viewport = Viewport {
            x: 0,
            y: 0,
            width: 400,
            height: 400,
        };
        let fitted = WgpuBackend::fit_viewport(viewport, 200, 100);
        assert_eq!(
            fitted,
            Viewport {
                x: 0,
                y: 100,
                width: 400,
                height: 200
            }
        );
    }

    #[test]
    fn test_clamp_viewport() {
        let viewport = Viewport {
            x: 90,
            y: 0,
            width: 50,
            height: 10,
        };
        let clamped = WgpuBackend::clamp_viewport(viewport, (100, 100)).unwrap();
        assert_eq!(clamped.width, 10);
        assert!(WgpuBackend::clamp_viewport(viewport, (90, 100)).is_none());
    }

    #[test]
    #[ignore = "requires a display and GPU"]
    fn test_bind_context_opens_window() {
        let mut gfx = WgpuBackend::new(WindowOptions::with_title("slamview test"));
        gfx.bind_context().expect("window and device");
        gfx.create_region("main", Bounds::FULL).unwrap();
        gfx.begin_frame(Vec4::ONE).unwrap();
        gfx.end_frame().unwrap();
    }
}
