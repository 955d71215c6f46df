//! A column of buttons, checkboxes and sliders with callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use glam::Vec2;
use image::{Rgba, RgbaImage};
use slamview_core::{GraphicsBackend, InputEvent, MouseButton, Result, Viewport};

use crate::view::{lock, View, ViewBase};

/// Height of one menu row in pixels.
pub const ROW_HEIGHT: u32 = 24;

const PANEL: Rgba<u8> = Rgba([235, 235, 240, 255]);
const WIDGET: Rgba<u8> = Rgba([200, 200, 210, 255]);
const ACTIVE: Rgba<u8> = Rgba([70, 130, 180, 255]);
const MARGIN: u32 = 3;

/// Current value of a menu entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuValue {
    /// Whether the button was pushed since the last frame.
    Button(bool),
    Checkbox(bool),
    Int(i32),
    Float(f32),
}

#[derive(Debug, Clone, Copy)]
enum Widget {
    Button { pushed: bool },
    Checkbox { checked: bool },
    Int { value: i32, min: i32, max: i32 },
    Float { value: f32, min: f32, max: f32 },
}

impl Widget {
    fn value(self) -> MenuValue {
        match self {
            Widget::Button { pushed } => MenuValue::Button(pushed),
            Widget::Checkbox { checked } => MenuValue::Checkbox(checked),
            Widget::Int { value, .. } => MenuValue::Int(value),
            Widget::Float { value, .. } => MenuValue::Float(value),
        }
    }

    /// Slider position in `[0, 1]`.
    fn fraction(self) -> Option<f32> {
        match self {
            Widget::Int { value, min, max } if max > min => {
                Some((value - min) as f32 / (max - min) as f32)
            }
            Widget::Float { value, min, max } if max > min => Some((value - min) / (max - min)),
            Widget::Int { .. } | Widget::Float { .. } => Some(0.0),
            _ => None,
        }
    }

    fn set_fraction(&mut self, t: f32) {
        let t = t.clamp(0.0, 1.0);
        match self {
            Widget::Int { value, min, max } => {
                *value = *min + (t * (*max - *min) as f32).round() as i32;
            }
            Widget::Float { value, min, max } => *value = *min + t * (*max - *min),
            _ => {}
        }
    }

    /// Reaction to a click or a bound key.
    fn activate(&mut self) {
        match self {
            Widget::Button { pushed } => *pushed = true,
            Widget::Checkbox { checked } => *checked = !*checked,
            _ => {}
        }
    }
}

enum Callback {
    Button(Box<dyn FnMut(bool) + Send>),
    Checkbox(Box<dyn FnMut(bool) + Send>),
    Int(Box<dyn FnMut(i32) + Send>),
    Float(Box<dyn FnMut(f32) + Send>),
}

impl Callback {
    fn call(&mut self, value: MenuValue) {
        match (self, value) {
            (Callback::Button(f), MenuValue::Button(v)) | (Callback::Checkbox(f), MenuValue::Checkbox(v)) => f(v),
            (Callback::Int(f), MenuValue::Int(v)) => f(v),
            (Callback::Float(f), MenuValue::Float(v)) => f(v),
            _ => {}
        }
    }
}

struct Entry {
    label: String,
    widget: Widget,
}

#[derive(Default)]
struct MenuState {
    entries: Vec<Entry>,
    keys: Vec<(char, String)>,
}

impl MenuState {
    fn entry_mut(&mut self, label: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.label == label)
    }
}

/// A vertical menu of widgets.
///
/// Entries are added from any thread before the window runs and appear once
/// the layout is built. Every frame the menu hands each entry's current value
/// to its callback, in entry order; a pushed button reports `true` exactly once.
pub struct MenuPanel {
    base: ViewBase,
    state: Arc<Mutex<MenuState>>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    dirty: Arc<AtomicBool>,
    canvas: Mutex<Option<RgbaImage>>,
}

impl MenuPanel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ViewBase::new(name),
            state: Arc::new(Mutex::new(MenuState::default())),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            dirty: Arc::new(AtomicBool::new(true)),
            canvas: Mutex::new(None),
        }
    }

    pub fn add_button(&self, label: impl Into<String>, callback: impl FnMut(bool) + Send + 'static) {
        self.add_entry(label.into(), Widget::Button { pushed: false }, Callback::Button(Box::new(callback)));
    }

    pub fn add_checkbox(
        &self,
        label: impl Into<String>,
        checked: bool,
        callback: impl FnMut(bool) + Send + 'static,
    ) {
        self.add_entry(label.into(), Widget::Checkbox { checked }, Callback::Checkbox(Box::new(callback)));
    }

    /// Integer slider over `[min, max]`.
    pub fn add_int_slider(
        &self,
        label: impl Into<String>,
        value: i32,
        min: i32,
        max: i32,
        callback: impl FnMut(i32) + Send + 'static,
    ) {
        let widget = Widget::Int {
            value: value.clamp(min, max.max(min)),
            min,
            max: max.max(min),
        };
        self.add_entry(label.into(), widget, Callback::Int(Box::new(callback)));
    }

    /// Float slider over `[min, max]`.
    pub fn add_float_slider(
        &self,
        label: impl Into<String>,
        value: f32,
        min: f32,
        max: f32,
        callback: impl FnMut(f32) + Send + 'static,
    ) {
        let widget = Widget::Float {
            value: value.clamp(min, max.max(min)),
            min,
            max: max.max(min),
        };
        self.add_entry(label.into(), widget, Callback::Float(Box::new(callback)));
    }

    fn add_entry(&self, label: String, widget: Widget, callback: Callback) {
        let state = Arc::clone(&self.state);
        let callbacks = Arc::clone(&self.callbacks);
        let dirty = Arc::clone(&self.dirty);
        self.base.defer(move |_| {
            let mut state = lock(&state);
            if state.entries.iter().any(|e| e.label == label) {
                log::warn!("menu entry '{label}' added twice");
                return Ok(());
            }
            state.entries.push(Entry { label, widget });
            lock(&callbacks).push(callback);
            dirty.store(true, Ordering::Release);
            Ok(())
        });
    }

    /// Makes `key` push the button or toggle the checkbox called `label`.
    pub fn bind_key(&self, label: impl Into<String>, key: char) {
        lock(&self.state).keys.push((key, label.into()));
    }

    /// Pushes a button, or toggles a checkbox, as if clicked.
    pub fn press(&self, label: &str) {
        self.update(label, Widget::activate);
    }

    pub fn set_checked(&self, label: &str, checked: bool) {
        self.update(label, |w| {
            if let Widget::Checkbox { checked: c } = w {
                *c = checked;
            }
        });
    }

    /// Sets an integer slider, clamped to its range.
    pub fn set_int(&self, label: &str, value: i32) {
        self.update(label, |w| {
            if let Widget::Int { value: v, min, max } = w {
                *v = value.clamp(*min, *max);
            }
        });
    }

    /// Sets a float slider, clamped to its range.
    pub fn set_float(&self, label: &str, value: f32) {
        self.update(label, |w| {
            if let Widget::Float { value: v, min, max } = w {
                *v = value.clamp(*min, *max);
            }
        });
    }

    /// Current value of an entry.
    pub fn value(&self, label: &str) -> Option<MenuValue> {
        lock(&self.state)
            .entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.widget.value())
    }

    /// Entry labels in display order.
    pub fn labels(&self) -> Vec<String> {
        lock(&self.state).entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn set_visible(&self, visible: bool) {
        self.base.set_visible(visible);
    }

    fn update(&self, label: &str, f: impl FnOnce(&mut Widget)) {
        if let Some(entry) = lock(&self.state).entry_mut(label) {
            f(&mut entry.widget);
            self.dirty.store(true, Ordering::Release);
        }
    }

    fn row_at(viewport: Viewport, position: Vec2) -> usize {
        ((position.y - viewport.y as f32) / ROW_HEIGHT as f32) as usize
    }

    fn slider_fraction(viewport: Viewport, position: Vec2) -> f32 {
        let inner = viewport.width.saturating_sub(2 * MARGIN).max(1) as f32;
        (position.x - (viewport.x + MARGIN) as f32) / inner
    }

    fn redraw(&self, viewport: Viewport, widgets: &[Widget]) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(viewport.width, viewport.height, PANEL);
        let inner = viewport.width.saturating_sub(2 * MARGIN);
        for (row, widget) in widgets.iter().enumerate() {
            let y = row as u32 * ROW_HEIGHT + MARGIN;
            let h = ROW_HEIGHT - 2 * MARGIN;
            match *widget {
                Widget::Button { pushed } => {
                    let color = if pushed { ACTIVE } else { WIDGET };
                    fill(&mut canvas, MARGIN, y, inner, h, color);
                }
                Widget::Checkbox { checked } => {
                    fill(&mut canvas, MARGIN, y, h, h, WIDGET);
                    if checked {
                        fill(&mut canvas, MARGIN + 3, y + 3, h.saturating_sub(6), h.saturating_sub(6), ACTIVE);
                    }
                }
                Widget::Int { .. } | Widget::Float { .. } => {
                    fill(&mut canvas, MARGIN, y, inner, h, WIDGET);
                    let t = widget.fraction().unwrap_or(0.0);
                    fill(&mut canvas, MARGIN, y, (t * inner as f32) as u32, h, ACTIVE);
                }
            }
        }
        log::trace!("menu '{}' redrawn", self.base.name());
        canvas
    }
}

/// Fills a rectangle, clipped to the image.
fn fill(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x1 = (x + width).min(image.width());
    let y1 = (y + height).min(image.height());
    for py in y.min(y1)..y1 {
        for px in x.min(x1)..x1 {
            image.put_pixel(px, py, color);
        }
    }
}

impl View for MenuPanel {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn is_visible(&self) -> bool {
        self.base.is_visible()
    }

    fn create_layout(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        self.base.run_layout(gfx)
    }

    fn render(&self, gfx: &mut dyn GraphicsBackend, viewport: Viewport) -> Result<()> {
        let (values, widgets) = {
            let mut state = lock(&self.state);
            let values: Vec<MenuValue> = state.entries.iter().map(|e| e.widget.value()).collect();
            for entry in &mut state.entries {
                if let Widget::Button { pushed } = &mut entry.widget {
                    if *pushed {
                        *pushed = false;
                        self.dirty.store(true, Ordering::Release);
                    }
                }
            }
            let widgets: Vec<Widget> = state.entries.iter().map(|e| e.widget).collect();
            (values, widgets)
        };

        // callbacks may call back into the menu, so the state lock is released first
        {
            let mut callbacks = lock(&self.callbacks);
            for (callback, value) in callbacks.iter_mut().zip(values) {
                callback.call(value);
            }
        }

        let mut canvas = lock(&self.canvas);
        let stale = canvas.as_ref().map_or(true, |c| c.dimensions() != viewport.size());
        if stale || self.dirty.swap(false, Ordering::AcqRel) {
            *canvas = Some(self.redraw(viewport, &widgets));
        }
        match canvas.as_ref() {
            Some(image) => gfx.draw_image(viewport, image),
            None => Ok(()),
        }
    }

    fn handle_input(&self, event: &InputEvent, viewport: Viewport) {
        let mut state = lock(&self.state);
        match event {
            InputEvent::KeyPressed(key) => {
                let Some(label) = state.keys.iter().find(|(k, _)| k == key).map(|(_, l)| l.clone()) else {
                    return;
                };
                if let Some(entry) = state.entry_mut(&label) {
                    entry.widget.activate();
                }
            }
            InputEvent::Click {
                button: MouseButton::Left,
                position,
            } if viewport.contains(*position) => {
                let row = Self::row_at(viewport, *position);
                let Some(entry) = state.entries.get_mut(row) else {
                    return;
                };
                entry.widget.activate();
                entry.widget.set_fraction(Self::slider_fraction(viewport, *position));
            }
            InputEvent::Drag {
                button: MouseButton::Left,
                position,
                ..
            } if viewport.contains(*position) => {
                let row = Self::row_at(viewport, *position);
                if let Some(entry) = state.entries.get_mut(row) {
                    entry.widget.set_fraction(Self::slider_fraction(viewport, *position));
                }
            }
            _ => return,
        }
        self.dirty.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slamview_core::Bounds;
    use slamview_render::HeadlessBackend;

    fn laid_out(menu: &MenuPanel) -> (HeadlessBackend, Viewport) {
        let mut gfx = HeadlessBackend::new(200, 240);
        gfx.bind_context().unwrap();
        gfx.create_region(menu.name(), Bounds::FULL).unwrap();
        menu.create_layout(&mut gfx).unwrap();
        let viewport = gfx.region_viewport(menu.name()).unwrap();
        (gfx, viewport)
    }

    fn frame(menu: &MenuPanel, gfx: &mut HeadlessBackend, viewport: Viewport) {
        gfx.begin_frame(glam::Vec4::ONE).unwrap();
        menu.render(gfx, viewport).unwrap();
        gfx.end_frame().unwrap();
    }

    #[test]
    fn test_entries_appear_after_layout() {
        let menu = MenuPanel::new("menu");
        menu.add_checkbox("Follow", true, |_| {});
        menu.add_button("Reset", |_| {});
        assert!(menu.labels().is_empty());
        let _ = laid_out(&menu);
        assert_eq!(menu.labels(), vec!["Follow".to_string(), "Reset".to_string()]);
        assert_eq!(menu.value("Follow"), Some(MenuValue::Checkbox(true)));
    }

    #[test]
    fn test_button_reports_push_once() {
        let menu = MenuPanel::new("menu");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        menu.add_button("Reset", move |pushed| sink.lock().unwrap().push(pushed));
        let (mut gfx, viewport) = laid_out(&menu);

        frame(&menu, &mut gfx, viewport);
        menu.press("Reset");
        frame(&menu, &mut gfx, viewport);
        frame(&menu, &mut gfx, viewport);
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn test_key_binding_toggles_checkbox() {
        let menu = MenuPanel::new("menu");
        menu.add_checkbox("Follow", true, |_| {});
        menu.bind_key("Follow", 'f');
        let (_, viewport) = laid_out(&menu);
        menu.handle_input(&InputEvent::KeyPressed('f'), viewport);
        assert_eq!(menu.value("Follow"), Some(MenuValue::Checkbox(false)));
        menu.handle_input(&InputEvent::KeyPressed('g'), viewport);
        assert_eq!(menu.value("Follow"), Some(MenuValue::Checkbox(false)));
    }

    #[test]
    fn test_click_rows() {
        let menu = MenuPanel::new("menu");
        menu.add_checkbox("Follow", false, |_| {});
        menu.add_int_slider("Step", 0, 0, 10, |_| {});
        let (_, viewport) = laid_out(&menu);

        let click = |x: f32, y: f32| InputEvent::Click {
            button: MouseButton::Left,
            position: Vec2::new(x, y),
        };
        menu.handle_input(&click(10.0, 5.0), viewport);
        assert_eq!(menu.value("Follow"), Some(MenuValue::Checkbox(true)));

        // second row, right edge of the track
        menu.handle_input(&click(197.0, ROW_HEIGHT as f32 + 5.0), viewport);
        assert_eq!(menu.value("Step"), Some(MenuValue::Int(10)));

        // below the last row
        menu.handle_input(&click(10.0, 200.0), viewport);
        assert_eq!(menu.value("Follow"), Some(MenuValue::Checkbox(true)));
    }

    #[test]
    fn test_sliders_clamp() {
        let menu = MenuPanel::new("menu");
        menu.add_float_slider("Scale", 1.0, 0.5, 2.0, |_| {});
        menu.add_int_slider("Skip", 3, 1, 5, |_| {});
        let _ = laid_out(&menu);
        menu.set_float("Scale", 9.0);
        menu.set_int("Skip", -4);
        assert_eq!(menu.value("Scale"), Some(MenuValue::Float(2.0)));
        assert_eq!(menu.value("Skip"), Some(MenuValue::Int(1)));
    }

    #[test]
    fn test_callback_may_reenter_menu() {
        let menu = Arc::new(MenuPanel::new("menu"));
        let inner = Arc::clone(&menu);
        menu.add_checkbox("Follow", true, move |_| {
            let _ = inner.value("Follow");
        });
        let (mut gfx, viewport) = laid_out(&menu);
        frame(&menu, &mut gfx, viewport);
        assert_eq!(gfx.frame_log().last().unwrap().images.len(), 1);
    }
}
