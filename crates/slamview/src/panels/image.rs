//! A grid of live camera images.

use std::sync::{Arc, Mutex};

use image::{imageops, DynamicImage, Rgba, RgbaImage};
use slamview_core::{GraphicsBackend, Result, ViewerError, Viewport};

use crate::view::{lock, View, ViewBase};

const CANVAS_GRAY: Rgba<u8> = Rgba([127, 127, 127, 255]);

struct Cell {
    name: String,
    rows: u32,
    cols: u32,
    row: u32,
    col: u32,
    caption: String,
    pending: Option<RgbaImage>,
}

#[derive(Default)]
struct Mosaic {
    cells: Vec<Cell>,
    max_rows: u32,
    max_cols: u32,
    canvas: Option<RgbaImage>,
}

/// Shows named images in a fixed `rows` x `cols` grid.
///
/// Images are registered with their pixel size before the window runs and
/// assigned grid cells in row-major order. Each cell is as large as the
/// largest registered image, separated by the configured offsets.
pub struct ImagePanel {
    base: ViewBase,
    grid_rows: u32,
    grid_cols: u32,
    row_offset: u32,
    col_offset: u32,
    mosaic: Arc<Mutex<Mosaic>>,
}

impl ImagePanel {
    pub fn new(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self::with_offsets(name, rows, cols, 20, 20)
    }

    /// Like [`new`](Self::new) with explicit gaps between cells, in pixels.
    pub fn with_offsets(
        name: impl Into<String>,
        rows: u32,
        cols: u32,
        row_offset: u32,
        col_offset: u32,
    ) -> Self {
        Self {
            base: ViewBase::new(name),
            grid_rows: rows,
            grid_cols: cols,
            row_offset,
            col_offset,
            mosaic: Arc::new(Mutex::new(Mosaic::default())),
        }
    }

    /// Registers an image of `rows` x `cols` pixels in the next free cell.
    ///
    /// Duplicate names and registrations past the grid capacity are ignored.
    pub fn add_image(&self, name: impl Into<String>, rows: u32, cols: u32) {
        let name = name.into();
        let mut mosaic = lock(&self.mosaic);
        if mosaic.cells.iter().any(|c| c.name == name) {
            log::warn!("image '{name}' registered twice");
            return;
        }
        let index = mosaic.cells.len() as u32;
        if index >= self.grid_rows * self.grid_cols {
            log::warn!(
                "image panel '{}' is full ({}x{}), dropping '{name}'",
                self.base.name(),
                self.grid_rows,
                self.grid_cols
            );
            return;
        }
        mosaic.max_rows = mosaic.max_rows.max(rows);
        mosaic.max_cols = mosaic.max_cols.max(cols);
        mosaic.cells.push(Cell {
            name,
            rows,
            cols,
            row: index / self.grid_cols,
            col: index % self.grid_cols,
            caption: String::new(),
            pending: None,
        });
    }

    /// Replaces the content of a registered image.
    ///
    /// Unknown names are ignored. The image must have three channels and the
    /// size it was registered with.
    pub fn update_image(&self, name: &str, caption: impl Into<String>, image: &DynamicImage) -> Result<()> {
        let mut mosaic = lock(&self.mosaic);
        let Some(cell) = mosaic.cells.iter_mut().find(|c| c.name == name) else {
            return Ok(());
        };
        let channels = usize::from(image.color().channel_count());
        if channels != 3 {
            return Err(ViewerError::ChannelMismatch {
                name: name.to_string(),
                expected: 3,
                actual: channels,
            });
        }
        if image.height() != cell.rows || image.width() != cell.cols {
            return Err(ViewerError::ImageSizeChanged {
                name: name.to_string(),
                expected_rows: cell.rows,
                expected_cols: cell.cols,
                rows: image.height(),
                cols: image.width(),
            });
        }
        cell.caption = caption.into();
        cell.pending = Some(image.to_rgba8());
        Ok(())
    }

    /// The caption last set for `name`.
    pub fn caption(&self, name: &str) -> Option<String> {
        lock(&self.mosaic)
            .cells
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.caption.clone())
    }

    /// Pixel size of the composed canvas, once laid out.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        lock(&self.mosaic).canvas.as_ref().map(RgbaImage::dimensions)
    }

    pub fn set_visible(&self, visible: bool) {
        self.base.set_visible(visible);
    }

    fn cell_origin(&self, mosaic: &Mosaic, cell: &Cell) -> (u32, u32) {
        let x = self.col_offset + cell.col * (mosaic.max_cols + self.col_offset);
        let y = self.row_offset + cell.row * (mosaic.max_rows + self.row_offset);
        // centered within the cell
        (x + (mosaic.max_cols - cell.cols) / 2, y + (mosaic.max_rows - cell.rows) / 2)
    }
}

impl View for ImagePanel {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn is_visible(&self) -> bool {
        self.base.is_visible()
    }

    fn create_layout(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        self.base.run_layout(gfx)?;
        let mut mosaic = lock(&self.mosaic);
        let width = (mosaic.max_cols + self.col_offset) * self.grid_cols + self.col_offset;
        let height = (mosaic.max_rows + self.row_offset) * self.grid_rows + self.row_offset;
        log::debug!("image panel '{}' canvas {width}x{height}", self.base.name());
        mosaic.canvas = Some(RgbaImage::from_pixel(width, height, CANVAS_GRAY));
        Ok(())
    }

    fn render(&self, gfx: &mut dyn GraphicsBackend, viewport: Viewport) -> Result<()> {
        let mut guard = lock(&self.mosaic);
        let mosaic = &mut *guard;
        let Some(mut canvas) = mosaic.canvas.take() else {
            return Ok(());
        };
        for i in 0..mosaic.cells.len() {
            let Some(pending) = mosaic.cells[i].pending.take() else {
                continue;
            };
            let (x, y) = self.cell_origin(mosaic, &mosaic.cells[i]);
            imageops::replace(&mut canvas, &pending, i64::from(x), i64::from(y));
        }
        let drawn = gfx.draw_image(viewport, &canvas);
        mosaic.canvas = Some(canvas);
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};
    use slamview_core::Bounds;
    use slamview_render::HeadlessBackend;

    fn laid_out(panel: &ImagePanel) -> (HeadlessBackend, Viewport) {
        let mut gfx = HeadlessBackend::new(800, 600);
        gfx.bind_context().unwrap();
        gfx.create_region(panel.name(), Bounds::FULL).unwrap();
        panel.create_layout(&mut gfx).unwrap();
        let viewport = gfx.region_viewport(panel.name()).unwrap();
        (gfx, viewport)
    }

    #[test]
    fn test_canvas_size() {
        let panel = ImagePanel::with_offsets("images", 2, 1, 30, 10);
        panel.add_image("left", 376, 1241);
        panel.add_image("right", 376, 1241);
        let _ = laid_out(&panel);
        assert_eq!(panel.canvas_size(), Some((1241 + 20, 2 * (376 + 30) + 30)));
    }

    #[test]
    fn test_grid_capacity() {
        let panel = ImagePanel::new("images", 1, 1);
        panel.add_image("a", 4, 4);
        panel.add_image("b", 4, 4);
        panel.add_image("a", 8, 8);
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        panel.update_image("b", "ignored", &image).unwrap();
        assert_eq!(panel.caption("b"), None);
        assert_eq!(panel.caption("a"), Some(String::new()));
    }

    #[test]
    fn test_update_validates_image() {
        let panel = ImagePanel::new("images", 1, 2);
        panel.add_image("cam", 4, 6);

        let gray = DynamicImage::ImageLuma8(GrayImage::new(6, 4));
        assert!(matches!(
            panel.update_image("cam", "", &gray),
            Err(ViewerError::ChannelMismatch { actual: 1, .. })
        ));

        let wrong = DynamicImage::ImageRgb8(RgbImage::new(4, 6));
        assert!(matches!(
            panel.update_image("cam", "", &wrong),
            Err(ViewerError::ImageSizeChanged { rows: 6, cols: 4, .. })
        ));

        let good = DynamicImage::ImageRgb8(RgbImage::new(6, 4));
        panel.update_image("cam", "t = 0.1", &good).unwrap();
        assert_eq!(panel.caption("cam").as_deref(), Some("t = 0.1"));
        assert!(panel.update_image("unknown", "", &gray).is_ok());
    }

    #[test]
    fn test_render_blits_pending_image() {
        let panel = ImagePanel::with_offsets("images", 1, 2, 2, 2);
        panel.add_image("a", 2, 2);
        panel.add_image("b", 2, 2);
        let (mut gfx, viewport) = laid_out(&panel);

        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0])));
        panel.update_image("b", "", &red).unwrap();
        gfx.begin_frame(glam::Vec4::ONE).unwrap();
        panel.render(&mut gfx, viewport).unwrap();
        gfx.end_frame().unwrap();

        let frame = gfx.frame_log().last().unwrap();
        assert_eq!(frame.images.len(), 1);
        assert_eq!((frame.images[0].width, frame.images[0].height), (10, 6));

        let canvas = lock(&panel.mosaic).canvas.clone().unwrap();
        // second column starts at 2 + 2 + 2
        assert_eq!(canvas.get_pixel(6, 2), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &CANVAS_GRAY);
    }
}
