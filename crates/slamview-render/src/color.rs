//! Point types and point-cloud colorization.
//!
//! A [`ColorFactory`] maps a slice of points to one RGBA color per point.
//! Which factories apply to which point type is decided by the attribute
//! traits ([`HasIntensity`], [`HasRing`], [`HasRgb`]) the point implements.

use std::sync::OnceLock;

use glam::{Vec3, Vec4};
use rayon::prelude::*;

/// Number of entries in the gradient table: six ramps of 256 steps.
pub const GRADIENT_TABLE_LEN: usize = 6 * 256;

/// Alpha used by table and palette colors.
const PALETTE_ALPHA: f32 = 0.5;

/// Discrete palette used for ring/channel coloring.
const CONTRAST_PALETTE: [[u8; 3]; 10] = [
    [0, 18, 25],
    [0, 95, 115],
    [10, 147, 150],
    [148, 210, 189],
    [233, 216, 166],
    [238, 155, 0],
    [202, 103, 2],
    [187, 62, 3],
    [173, 32, 18],
    [155, 34, 38],
];

static GRADIENT_TABLE: OnceLock<Vec<Vec4>> = OnceLock::new();

fn rgb8(rgb: [u8; 3], alpha: f32) -> Vec4 {
    Vec4::new(
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
        alpha,
    )
}

#[allow(clippy::cast_possible_truncation)]
fn build_gradient_table() -> Vec<Vec4> {
    log::debug!("building {GRADIENT_TABLE_LEN}-entry gradient table");
    let mut table = Vec::with_capacity(GRADIENT_TABLE_LEN);
    let ramps: [fn(u8) -> [u8; 3]; 6] = [
        |i| [255, i, 0],
        |i| [255 - i, 0, 255],
        |i| [0, 255, i],
        |i| [255, 255 - i, 0],
        |i| [i, 0, 255],
        |i| [0, 255, 255 - i],
    ];
    for ramp in ramps {
        for i in 0..=255u8 {
            table.push(rgb8(ramp(i), PALETTE_ALPHA));
        }
    }
    table
}

/// The process-wide gradient table, built on first use.
pub fn gradient_table() -> &'static [Vec4] {
    GRADIENT_TABLE.get_or_init(build_gradient_table)
}

/// Table index for a scalar value. Values wrap around the table.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn gradient_index(value: f32) -> usize {
    let scaled = (value * 6.0).floor() as i64;
    // rem_euclid keeps negative values in range
    scaled.rem_euclid(GRADIENT_TABLE_LEN as i64) as usize
}

/// Looks up the gradient color for a scalar value.
#[must_use]
pub fn gradient_color(value: f32) -> Vec4 {
    gradient_table()[gradient_index(value)]
}

/// Palette color for an integer channel, wrapping modulo the palette size.
#[must_use]
pub fn palette_color(channel: u32) -> Vec4 {
    rgb8(CONTRAST_PALETTE[channel as usize % CONTRAST_PALETTE.len()], PALETTE_ALPHA)
}

/// A point with a position that can be moved between frames.
pub trait CloudPoint: Copy + Send + Sync {
    /// Position in the point's current frame.
    fn position(&self) -> Vec3;

    /// Returns a copy of the point at a new position.
    #[must_use]
    fn with_position(self, position: Vec3) -> Self;
}

/// Points carrying a scalar intensity.
pub trait HasIntensity {
    fn intensity(&self) -> f32;
}

/// Points carrying a laser ring (channel) index.
pub trait HasRing {
    fn ring(&self) -> u32;
}

/// Points carrying their own color.
pub trait HasRgb {
    fn rgb(&self) -> [u8; 3];
}

/// A bare position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyz {
    pub position: Vec3,
}

/// Position plus intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyzI {
    pub position: Vec3,
    pub intensity: f32,
}

/// Position plus color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyzRgb {
    pub position: Vec3,
    pub rgb: [u8; 3],
}

/// Position plus ring index.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyzR {
    pub position: Vec3,
    pub ring: u32,
}

/// Position plus ring index and time offset within the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyzRt {
    pub position: Vec3,
    pub ring: u32,
    pub time: f32,
}

macro_rules! impl_cloud_point {
    ($($ty:ty),*) => {
        $(
            impl CloudPoint for $ty {
                fn position(&self) -> Vec3 {
                    self.position
                }

                fn with_position(self, position: Vec3) -> Self {
                    Self { position, ..self }
                }
            }
        )*
    };
}

impl_cloud_point!(PointXyz, PointXyzI, PointXyzRgb, PointXyzR, PointXyzRt);

impl From<Vec3> for PointXyz {
    fn from(position: Vec3) -> Self {
        Self { position }
    }
}

impl HasIntensity for PointXyzI {
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl HasRgb for PointXyzRgb {
    fn rgb(&self) -> [u8; 3] {
        self.rgb
    }
}

impl HasRing for PointXyzR {
    fn ring(&self) -> u32 {
        self.ring
    }
}

impl HasRing for PointXyzRt {
    fn ring(&self) -> u32 {
        self.ring
    }
}

/// Maps points to per-point RGBA colors.
pub trait ColorFactory<P>: Send + Sync {
    /// Returns exactly one color per input point.
    fn create_colors(&self, points: &[P]) -> Vec<Vec4>;
}

/// Constant translucent gray.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayColor;

impl<P: CloudPoint> ColorFactory<P> for GrayColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        vec![Vec4::new(0.5, 0.5, 0.5, 0.5); points.len()]
    }
}

/// Gradient table lookup by intensity.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityColor;

impl<P: CloudPoint + HasIntensity> ColorFactory<P> for IntensityColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        points.par_iter().map(|p| gradient_color(p.intensity())).collect()
    }
}

/// Gray level proportional to intensity.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityGrayColor;

impl<P: CloudPoint + HasIntensity> ColorFactory<P> for IntensityGrayColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        points
            .par_iter()
            .map(|p| {
                let gray = p.intensity() / 255.0 * 3.0;
                Vec4::new(gray, gray, gray, 0.2)
            })
            .collect()
    }
}

/// Gradient table lookup by height.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeightColor;

impl<P: CloudPoint> ColorFactory<P> for HeightColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        points.par_iter().map(|p| gradient_color(p.position().z * 10.0)).collect()
    }
}

/// Discrete palette indexed by ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingColor;

impl<P: CloudPoint + HasRing> ColorFactory<P> for RingColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        points.par_iter().map(|p| palette_color(p.ring())).collect()
    }
}

/// The point's own color.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfColor;

impl<P: CloudPoint + HasRgb> ColorFactory<P> for SelfColor {
    fn create_colors(&self, points: &[P]) -> Vec<Vec4> {
        points.par_iter().map(|p| rgb8(p.rgb(), PALETTE_ALPHA)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gradient_table_layout() {
        let table = gradient_table();
        assert_eq!(table.len(), GRADIENT_TABLE_LEN);
        assert_eq!(table[0], Vec4::new(1.0, 0.0, 0.0, 0.5));
        assert_eq!(table[255], Vec4::new(1.0, 1.0, 0.0, 0.5));
        assert_eq!(table[256], Vec4::new(1.0, 0.0, 1.0, 0.5));
        assert_eq!(table[GRADIENT_TABLE_LEN - 1], Vec4::new(0.0, 1.0, 0.0, 0.5));
    }

    #[test]
    fn test_gradient_wraps_at_boundary() {
        assert_eq!(gradient_index(0.0), 0);
        assert_eq!(gradient_index(256.0), 0);
        assert_eq!(gradient_index(255.9), GRADIENT_TABLE_LEN - 1);
        assert_eq!(gradient_index(-1.0 / 6.0), GRADIENT_TABLE_LEN - 1);
        assert_eq!(gradient_color(256.0), gradient_color(0.0));
    }

    #[test]
    fn test_gradient_is_deterministic() {
        for value in [0.0f32, 1.5, 42.0, 200.25, 1e6, -3.0] {
            assert_eq!(gradient_color(value), gradient_color(value));
        }
    }

    #[test]
    fn test_gradient_table_built_once_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| gradient_table().as_ptr() as usize))
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_ring_palette_wraps() {
        let points: Vec<PointXyzR> = (0..1000)
            .map(|i| PointXyzR {
                position: Vec3::new(i as f32, 0.0, 0.0),
                ring: i % 64,
            })
            .collect();
        let colors = RingColor.create_colors(&points);
        assert_eq!(colors.len(), points.len());
        assert_eq!(colors[23], colors[3]);
        assert_eq!(palette_color(23), palette_color(3));
        assert_ne!(palette_color(4), palette_color(3));
    }

    #[test]
    fn test_gray_and_self_colors() {
        let points = [PointXyzRgb {
            position: Vec3::ZERO,
            rgb: [255, 0, 51],
        }];
        assert_eq!(GrayColor.create_colors(&points), vec![Vec4::new(0.5, 0.5, 0.5, 0.5)]);
        assert_eq!(SelfColor.create_colors(&points), vec![Vec4::new(1.0, 0.0, 0.2, 0.5)]);
    }

    #[test]
    fn test_intensity_colors() {
        let points = [PointXyzI {
            position: Vec3::ZERO,
            intensity: 85.0,
        }];
        let gray = IntensityGrayColor.create_colors(&points)[0];
        assert!((gray.x - 1.0).abs() < 1e-6);
        assert_eq!(gray.w, 0.2);
        assert_eq!(IntensityColor.create_colors(&points)[0], gradient_table()[510]);
    }

    #[test]
    fn test_height_color_uses_z() {
        let points = [PointXyz::from(Vec3::new(3.0, 4.0, 0.5))];
        assert_eq!(HeightColor.create_colors(&points)[0], gradient_table()[30]);
    }

    #[test]
    fn test_with_position_keeps_attributes() {
        let p = PointXyzRt {
            position: Vec3::ZERO,
            ring: 7,
            time: 0.05,
        };
        let moved = p.with_position(Vec3::ONE);
        assert_eq!(moved.ring, 7);
        assert_eq!(moved.time, 0.05);
        assert_eq!(moved.position(), Vec3::ONE);
    }

    proptest! {
        #[test]
        fn test_gradient_index_in_range(value in -1.0e6f32..1.0e6) {
            prop_assert!(gradient_index(value) < GRADIENT_TABLE_LEN);
        }

        #[test]
        fn test_gradient_period_for_whole_values(n in -100_000i32..100_000) {
            let expected = (i64::from(n) * 6).rem_euclid(GRADIENT_TABLE_LEN as i64) as usize;
            prop_assert_eq!(gradient_index(n as f32), expected);
            prop_assert_eq!(gradient_color(n as f32), gradient_color((n + 256) as f32));
        }
    }
}
