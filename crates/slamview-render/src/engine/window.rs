//! winit integration: window creation and input translation.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use slamview_core::{InputEvent, MouseButton, WindowOptions};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::error::{RenderError, RenderResult};

/// Pixels of trackpad scroll per wheel line.
const PIXELS_PER_LINE: f32 = 50.0;

/// Builds an event loop that may live on any thread.
pub(crate) fn build_event_loop() -> RenderResult<EventLoop<()>> {
    let mut builder = EventLoop::builder();
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android"), not(target_os = "ios")))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        builder.with_any_thread(true);
    }
    Ok(builder.build()?)
}

/// Collects window events between pumps.
pub(crate) struct WindowHandler {
    options: WindowOptions,
    pub(crate) window: Option<Arc<Window>>,
    pub(crate) create_error: Option<String>,
    events: Vec<InputEvent>,
    close_requested: bool,
    cursor: Vec2,
    pressed: Option<MouseButton>,
}

impl WindowHandler {
    pub(crate) fn new(options: WindowOptions) -> Self {
        Self {
            options,
            window: None,
            create_error: None,
            events: Vec::new(),
            close_requested: false,
            cursor: Vec2::ZERO,
            pressed: None,
        }
    }

    pub(crate) fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub(crate) fn take_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Pumps the event loop once without blocking.
    pub(crate) fn pump(&mut self, event_loop: &mut EventLoop<()>, timeout: Duration) {
        if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(timeout), self) {
            log::info!("event loop exited with code {code}");
            self.close_requested = true;
        }
    }

    /// Pumps until the window exists.
    pub(crate) fn wait_for_window(&mut self, event_loop: &mut EventLoop<()>) -> RenderResult<Arc<Window>> {
        for _ in 0..200 {
            self.pump(event_loop, Duration::from_millis(10));
            if let Some(window) = &self.window {
                return Ok(window.clone());
            }
            if let Some(err) = self.create_error.take() {
                return Err(RenderError::WindowCreationFailed(err));
            }
            if self.close_requested {
                break;
            }
        }
        Err(RenderError::WindowCreationFailed(
            "window system did not resume".to_string(),
        ))
    }
}

fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(PhysicalSize::new(self.options.width, self.options.height));
        match event_loop.create_window(attributes) {
            Ok(window) => {
                log::info!("created window '{}'", self.options.title);
                self.window = Some(Arc::new(window));
            }
            Err(err) => self.create_error = Some(err.to_string()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                self.events.push(InputEvent::CloseRequested);
            }
            WindowEvent::Resized(size) => {
                self.events.push(InputEvent::Resized {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(button) = self.pressed {
                    self.events.push(InputEvent::Drag {
                        button,
                        delta: position - self.cursor,
                        position,
                    });
                }
                self.cursor = position;
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.pressed = map_button(button);
                    if let Some(button) = self.pressed {
                        self.events.push(InputEvent::Click {
                            button,
                            position: self.cursor,
                        });
                    }
                }
                ElementState::Released => self.pressed = None,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.events.push(InputEvent::Scroll {
                    delta,
                    position: self.cursor,
                });
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => {
                        self.close_requested = true;
                        self.events.push(InputEvent::CloseRequested);
                    }
                    Key::Character(text) => {
                        if let Some(c) = text.chars().next() {
                            self.events.push(InputEvent::KeyPressed(c));
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}
