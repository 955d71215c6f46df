//! Sequential dataset playback.

pub mod kitti;

use image::GrayImage;
use slamview_core::{Pose, Result};
use slamview_render::PointXyzRt;

pub use kitti::{KittiLoader, KittiOptions, RING_COUNT};

/// One synchronized frame of a driving sequence.
#[derive(Debug, Clone)]
pub struct Record {
    /// Zero-based frame index.
    pub index: usize,
    /// Seconds since the start of the sequence.
    pub timestamp: f64,
    /// Ground-truth lidar motion relative to the first lidar frame.
    pub lidar_pose: Pose,
    /// Ground-truth camera motion relative to the first camera frame.
    pub camera_pose: Pose,
    /// Points grouped by laser ring, in scan order within each ring.
    pub rings: Vec<Vec<PointXyzRt>>,
    pub left_image: Option<GrayImage>,
    pub right_image: Option<GrayImage>,
}

impl Record {
    /// All points, ring by ring.
    pub fn cloud(&self) -> Vec<PointXyzRt> {
        self.rings.iter().flatten().copied().collect()
    }

    /// Total number of points.
    pub fn point_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

/// A source of records, read in order.
pub trait DatasetLoader: Send {
    /// The next record, or `None` at the end of the sequence.
    fn next_record(&mut self) -> Result<Option<Record>>;
}
