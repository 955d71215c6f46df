//! 2D views: plots, image grids and menus.

pub mod image;
pub mod menu;
pub mod plot;

pub use self::image::ImagePanel;
pub use menu::{MenuPanel, MenuValue, ROW_HEIGHT};
pub use plot::{PlotPanel, PlotRange};
