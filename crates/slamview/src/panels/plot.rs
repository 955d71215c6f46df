//! Scrolling line plots.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3, Vec4};
use image::{Rgba, RgbaImage};
use slamview_core::{DrawStyle, GpuBuffer, GraphicsBackend, Primitive, Result, Vertex, Viewport};
use slamview_render::color::palette_color;

use crate::view::{lock, View, ViewBase};

const BACKGROUND: Rgba<u8> = Rgba([248, 248, 255, 255]);
const GRID_COLOR: Vec4 = Vec4::new(0.85, 0.85, 0.88, 1.0);
const AXIS_COLOR: Vec4 = Vec4::new(0.3, 0.3, 0.3, 1.0);

/// More grid lines than this along one axis are not drawn.
const MAX_GRID_LINES: usize = 256;

/// Visible window and tick spacing of one plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRange {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub x_tick: f32,
    pub y_tick: f32,
}

impl Default for PlotRange {
    fn default() -> Self {
        Self {
            x_min: -10.0,
            x_max: 600.0,
            y_min: -10.0,
            y_max: 10.0,
            x_tick: 75.0,
            y_tick: 2.0,
        }
    }
}

impl PlotRange {
    /// Default x window with a custom y range and tick.
    pub fn with_y(y_min: f32, y_max: f32, y_tick: f32) -> Self {
        Self {
            y_min,
            y_max,
            y_tick,
            ..Self::default()
        }
    }
}

struct Series {
    name: String,
    labels: Vec<String>,
    range: PlotRange,
    next_index: u64,
    samples: VecDeque<(u64, Vec<f32>)>,
    dirty: bool,
    gpu: Option<GpuBuffer>,
}

impl Series {
    /// Visible x interval; scrolls once the newest sample passes `x_max`.
    fn x_window(&self) -> (f32, f32) {
        let Some(newest) = self.next_index.checked_sub(1) else {
            return (self.range.x_min, self.range.x_max);
        };
        let newest = newest as f32;
        if newest > self.range.x_max {
            let shift = newest - self.range.x_max;
            (self.range.x_min + shift, newest)
        } else {
            (self.range.x_min, self.range.x_max)
        }
    }

    fn push(&mut self, values: &[f32]) {
        self.samples.push_back((self.next_index, values.to_vec()));
        self.next_index += 1;
        let (x0, _) = self.x_window();
        // keep one sample left of the window so the first segment reaches the edge
        while self.samples.len() > 2 && self.samples[1].0 as f32 <= x0 {
            self.samples.pop_front();
        }
        self.dirty = true;
    }

    fn vertices(&self) -> Vec<Vertex> {
        let (x0, x1) = self.x_window();
        let r = self.range;
        let mut out = Vec::new();
        let mut line = |a: Vec3, b: Vec3, color: Vec4| {
            out.push(Vertex::new(a, color));
            out.push(Vertex::new(b, color));
        };

        for x in ticks(x0, x1, r.x_tick) {
            line(Vec3::new(x, r.y_min, 0.0), Vec3::new(x, r.y_max, 0.0), GRID_COLOR);
        }
        for y in ticks(r.y_min, r.y_max, r.y_tick) {
            line(Vec3::new(x0, y, 0.0), Vec3::new(x1, y, 0.0), GRID_COLOR);
        }
        if (r.y_min..=r.y_max).contains(&0.0) {
            line(Vec3::new(x0, 0.0, 0.0), Vec3::new(x1, 0.0, 0.0), AXIS_COLOR);
        }
        if (x0..=x1).contains(&0.0) {
            line(Vec3::new(0.0, r.y_min, 0.0), Vec3::new(0.0, r.y_max, 0.0), AXIS_COLOR);
        }

        for label in 0..self.labels.len() {
            let color = palette_color(label as u32).truncate().extend(1.0);
            for ((i0, v0), (i1, v1)) in self.samples.iter().zip(self.samples.iter().skip(1)) {
                line(
                    Vec3::new(*i0 as f32, v0[label], 0.0),
                    Vec3::new(*i1 as f32, v1[label], 0.0),
                    color,
                );
            }
        }
        out
    }
}

/// Multiples of `step` inside `[from, to]`.
fn ticks(from: f32, to: f32, step: f32) -> Vec<f32> {
    if step <= 0.0 || to < from {
        return Vec::new();
    }
    let first = (from / step).ceil() as i64;
    let last = (to / step).floor() as i64;
    if last < first || (last - first) as usize >= MAX_GRID_LINES {
        return Vec::new();
    }
    (first..=last).map(|k| k as f32 * step).collect()
}

/// A panel of scrolling plots, one column per registered series.
///
/// Series are registered with [`add_series`](Self::add_series) before the
/// window runs. Producers then push one sample vector at a time with
/// [`update_series`](Self::update_series); the x axis is the sample index.
pub struct PlotPanel {
    base: ViewBase,
    series: Arc<Mutex<Vec<Series>>>,
    background: Mutex<Option<RgbaImage>>,
}

impl PlotPanel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ViewBase::new(name),
            series: Arc::new(Mutex::new(Vec::new())),
            background: Mutex::new(None),
        }
    }

    /// Queues a plot with one line per label.
    pub fn add_series(&self, name: impl Into<String>, labels: &[&str], range: PlotRange) {
        let name = name.into();
        let labels: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let series = Arc::clone(&self.series);
        self.base.defer(move |_| {
            let mut series = lock(&series);
            if series.iter().any(|s| s.name == name) {
                log::warn!("plot series '{name}' registered twice");
                return Ok(());
            }
            series.push(Series {
                name,
                labels,
                range,
                next_index: 0,
                samples: VecDeque::new(),
                dirty: true,
                gpu: None,
            });
            Ok(())
        });
    }

    /// Appends one sample per label. Unknown series and wrong arity are ignored.
    pub fn update_series(&self, name: &str, values: &[f32]) {
        let mut series = lock(&self.series);
        let Some(series) = series.iter_mut().find(|s| s.name == name) else {
            return;
        };
        if values.len() != series.labels.len() {
            log::trace!(
                "plot '{name}' expects {} values, got {}",
                series.labels.len(),
                values.len()
            );
            return;
        }
        series.push(values);
    }

    /// Names of the registered series in column order.
    pub fn series_names(&self) -> Vec<String> {
        lock(&self.series).iter().map(|s| s.name.clone()).collect()
    }

    /// Number of samples pushed to `name` so far.
    pub fn sample_count(&self, name: &str) -> Option<u64> {
        lock(&self.series)
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.next_index)
    }

    /// Visible x interval of `name`.
    pub fn x_window(&self, name: &str) -> Option<(f32, f32)> {
        lock(&self.series)
            .iter()
            .find(|s| s.name == name)
            .map(Series::x_window)
    }

    pub fn set_visible(&self, visible: bool) {
        self.base.set_visible(visible);
    }

    fn draw_background(&self, gfx: &mut dyn GraphicsBackend, viewport: Viewport) -> Result<()> {
        let mut background = lock(&self.background);
        if background.as_ref().is_some_and(|image| image.dimensions() != viewport.size()) {
            *background = None;
        }
        let image = background
            .get_or_insert_with(|| RgbaImage::from_pixel(viewport.width, viewport.height, BACKGROUND));
        gfx.draw_image(viewport, image)
    }
}

impl View for PlotPanel {
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
        let mut series = lock(&self.series);
        if series.is_empty() {
            return Ok(());
        }
        let column_width = viewport.width / series.len() as u32;
        if column_width == 0 {
            return Ok(());
        }
        for (i, series) in series.iter_mut().enumerate() {
            let column = Viewport {
                x: viewport.x + i as u32 * column_width,
                y: viewport.y,
                width: column_width,
                height: viewport.height,
            };
            self.draw_background(gfx, column)?;

            let (x0, x1) = series.x_window();
            let projection =
                Mat4::orthographic_rh(x0, x1, series.range.y_min, series.range.y_max, -1.0, 1.0);
            gfx.activate(column, Mat4::IDENTITY, projection);

            if series.dirty {
                series.gpu = Some(gfx.upload(&series.vertices())?);
                series.dirty = false;
            }
            if let Some(buffer) = &series.gpu {
                let style = DrawStyle {
                    color: None,
                    line_width: 1.5,
                    point_size: 1.0,
                };
                gfx.draw(buffer, Primitive::Lines, &style);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slamview_core::Bounds;
    use slamview_render::HeadlessBackend;

    fn laid_out(panel: &PlotPanel) -> (HeadlessBackend, Viewport) {
        let mut gfx = HeadlessBackend::new(600, 300);
        gfx.bind_context().unwrap();
        gfx.create_region(panel.name(), Bounds::FULL).unwrap();
        panel.create_layout(&mut gfx).unwrap();
        let viewport = gfx.region_viewport(panel.name()).unwrap();
        (gfx, viewport)
    }

    #[test]
    fn test_default_range() {
        let range = PlotRange::default();
        assert_eq!((range.x_min, range.x_max), (-10.0, 600.0));
        assert_eq!((range.y_min, range.y_max), (-10.0, 10.0));
        assert_eq!((range.x_tick, range.y_tick), (75.0, 2.0));
    }

    #[test]
    fn test_series_registered_at_layout() {
        let panel = PlotPanel::new("plots");
        panel.add_series("position", &["x", "y", "z"], PlotRange::default());
        assert!(panel.series_names().is_empty());
        let _ = laid_out(&panel);
        assert_eq!(panel.series_names(), vec!["position".to_string()]);
    }

    #[test]
    fn test_unknown_or_mismatched_updates_ignored() {
        let panel = PlotPanel::new("plots");
        panel.add_series("position", &["x", "y", "z"], PlotRange::default());
        panel.update_series("position", &[1.0, 2.0, 3.0]);
        let _ = laid_out(&panel);
        panel.update_series("missing", &[1.0]);
        panel.update_series("position", &[1.0, 2.0]);
        assert_eq!(panel.sample_count("position"), Some(0));
        panel.update_series("position", &[1.0, 2.0, 3.0]);
        assert_eq!(panel.sample_count("position"), Some(1));
    }

    #[test]
    fn test_window_tracks_sample_index() {
        let panel = PlotPanel::new("plots");
        panel.add_series("s", &["v"], PlotRange::default());
        let _ = laid_out(&panel);
        for i in 0..700 {
            panel.update_series("s", &[i as f32]);
        }
        assert_eq!(panel.x_window("s"), Some((89.0, 699.0)));
    }

    #[test]
    fn test_columns_split_viewport() {
        let panel = PlotPanel::new("plots");
        panel.add_series("a", &["v"], PlotRange::default());
        panel.add_series("b", &["v", "w"], PlotRange::with_y(-1.0, 1.0, 0.2));
        let (mut gfx, viewport) = laid_out(&panel);
        panel.update_series("a", &[1.0]);
        panel.update_series("a", &[2.0]);

        gfx.begin_frame(Vec4::ONE).unwrap();
        panel.render(&mut gfx, viewport).unwrap();
        gfx.end_frame().unwrap();

        let frame = gfx.frame_log().last().unwrap();
        assert_eq!(frame.images.len(), 2);
        assert_eq!(frame.draws.len(), 2);
        assert_eq!(frame.draws[0].viewport.width, 300);
        assert_eq!(frame.draws[1].viewport.x, 300);
    }

    #[test]
    fn test_ticks() {
        assert_eq!(ticks(-10.0, 600.0, 75.0).len(), 9);
        assert_eq!(ticks(-1.0, 1.0, 0.5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(ticks(0.0, 1.0, 0.0).is_empty());
    }
}
