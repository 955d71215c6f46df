//! KITTI odometry sequences with Velodyne HDL-64E scans.
//!
//! Expected layout under the dataset root:
//!
//! ```text
//! velodyne/sequences/<seq>/velodyne/<frame>.bin
//! sequences/<seq>/image_0/<frame>.png
//! sequences/<seq>/image_1/<frame>.png
//! sequences/<seq>/times.txt
//! results/<seq>.txt
//! ```

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use glam::Vec3;
use image::GrayImage;
use rayon::prelude::*;
use slamview_core::{Pose, Result, ViewerError};
use slamview_render::PointXyzRt;

use super::{DatasetLoader, Record};

/// Number of laser rings a scan is split into.
pub const RING_COUNT: usize = 51;

/// Duration of one sweep in seconds.
const SWEEP_PERIOD: f32 = 0.1;

/// Elevation, in degrees, where the upper and lower laser blocks meet.
const BLOCK_SPLIT: f32 = -8.83;
const MAX_ELEVATION: f32 = 2.0;
const MIN_ELEVATION: f32 = -24.33;

#[derive(Debug, Clone)]
pub struct KittiOptions {
    /// Dataset root directory.
    pub root: PathBuf,
    /// Sequence name, e.g. `"00"`.
    pub sequence: String,
    /// Camera pose in the lidar frame.
    pub camera_in_lidar: Pose,
}

/// Reads a KITTI sequence frame by frame.
pub struct KittiLoader {
    options: KittiOptions,
    times: Lines<BufReader<File>>,
    poses: Lines<BufReader<File>>,
    next_index: usize,
}

impl KittiLoader {
    /// Opens the timestamp and ground-truth files of a sequence.
    pub fn open(options: KittiOptions) -> Result<Self> {
        let sequence_dir = options.root.join("sequences").join(&options.sequence);
        let times = open_lines(&sequence_dir.join("times.txt"))?;
        let poses = open_lines(
            &options
                .root
                .join("results")
                .join(format!("{}.txt", options.sequence)),
        )?;
        log::info!(
            "opened KITTI sequence {} at {}",
            options.sequence,
            options.root.display()
        );
        Ok(Self {
            options,
            times,
            poses,
            next_index: 0,
        })
    }

    pub fn options(&self) -> &KittiOptions {
        &self.options
    }

    fn scan_path(&self, frame: &str) -> PathBuf {
        self.options
            .root
            .join("velodyne/sequences")
            .join(&self.options.sequence)
            .join("velodyne")
            .join(format!("{frame}.bin"))
    }

    fn image_path(&self, camera: &str, frame: &str) -> PathBuf {
        self.options
            .root
            .join("sequences")
            .join(&self.options.sequence)
            .join(camera)
            .join(format!("{frame}.png"))
    }

    /// Lidar motion from camera motion: `Tlc * Tcc * Tlc^-1`.
    fn lidar_motion(&self, camera_pose: Pose) -> Pose {
        let tlc = self.options.camera_in_lidar;
        tlc * camera_pose * tlc.inverse()
    }
}

impl DatasetLoader for KittiLoader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let (Some(time_line), Some(pose_line)) = (self.times.next(), self.poses.next()) else {
            log::info!("KITTI sequence {} ended after {} frames", self.options.sequence, self.next_index);
            return Ok(None);
        };
        let (time_line, pose_line) = (time_line?, pose_line?);

        let index = self.next_index;
        self.next_index += 1;
        let frame = format!("{index:06}");

        let timestamp = time_line
            .trim()
            .parse::<f64>()
            .map_err(|e| ViewerError::Dataset(format!("bad timestamp at frame {index}: {e}")))?;
        let camera_pose = parse_pose(&pose_line)?;
        let rings = read_scan(&self.scan_path(&frame))?;
        let left_image = read_gray(&self.image_path("image_0", &frame))?;
        let right_image = read_gray(&self.image_path("image_1", &frame))?;

        log::debug!("KITTI frame {frame}: t = {timestamp:.3}s");
        Ok(Some(Record {
            index,
            timestamp,
            lidar_pose: self.lidar_motion(camera_pose),
            camera_pose,
            rings,
            left_image,
            right_image,
        }))
    }
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).map_err(|e| ViewerError::Dataset(format!("{}: {e}", path.display())))?;
    Ok(BufReader::new(file).lines())
}

/// Parses a row-major `3x4` ground-truth line.
pub fn parse_pose(line: &str) -> Result<Pose> {
    let values: Vec<f32> = line
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ViewerError::Dataset(format!("bad pose line '{line}': {e}")))?;
    let matrix: [f32; 12] = values.try_into().map_err(|v: Vec<f32>| ViewerError::SizeMismatch {
        expected: 12,
        actual: v.len(),
    })?;
    Ok(Pose::from_row_major_3x4(&matrix))
}

/// Laser ring for a point, or `None` outside the sensor's vertical field of view.
pub fn ring_of(position: Vec3) -> Option<u32> {
    let elevation = position.z.atan2(position.truncate().length()).to_degrees();
    if !(MIN_ELEVATION..=MAX_ELEVATION).contains(&elevation) {
        return None;
    }
    let ring = if elevation >= BLOCK_SPLIT {
        ((MAX_ELEVATION - elevation) * 3.0 + 0.5) as u32
    } else {
        32 + ((BLOCK_SPLIT - elevation) * 2.0 + 0.5) as u32
    };
    ((ring as usize) < RING_COUNT).then_some(ring)
}

/// Assigns each point its time offset within the sweep.
///
/// Offsets are measured from the azimuth of the ring's first point. Once the
/// sweep has passed into positive azimuths, negative ones are taken to be a
/// full turn later.
pub fn stamp_ring(ring: &mut [PointXyzRt]) {
    let Some(first) = ring.first() else {
        return;
    };
    let start = first.position.y.atan2(first.position.x);
    let mut passed_positive = false;
    for point in ring {
        let azimuth = point.position.y.atan2(point.position.x);
        passed_positive |= azimuth > 0.0;
        point.time = if passed_positive && azimuth < 0.0 {
            (TAU - (start - azimuth)) / TAU * SWEEP_PERIOD
        } else {
            (azimuth - start) / TAU * SWEEP_PERIOD
        };
    }
}

/// Splits raw `[x, y, z, intensity]` records into time-stamped rings.
pub fn split_scan(raw: &[f32]) -> Vec<Vec<PointXyzRt>> {
    let mut rings = vec![Vec::new(); RING_COUNT];
    for record in raw.chunks_exact(4) {
        if record.iter().any(|v| v.is_nan()) {
            continue;
        }
        let position = Vec3::new(record[0], record[1], record[2]);
        if let Some(ring) = ring_of(position) {
            rings[ring as usize].push(PointXyzRt {
                position,
                ring,
                time: 0.0,
            });
        }
    }
    rings.par_iter_mut().for_each(|ring| stamp_ring(ring));
    rings
}

fn read_scan(path: &Path) -> Result<Vec<Vec<PointXyzRt>>> {
    let bytes = std::fs::read(path).map_err(|e| ViewerError::Dataset(format!("{}: {e}", path.display())))?;
    if bytes.len() % 16 != 0 {
        log::warn!("{} has a truncated trailing record", path.display());
    }
    let raw: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(split_scan(&raw))
}

/// Missing images are not an error; some sequences ship without them.
fn read_gray(path: &Path) -> Result<Option<GrayImage>> {
    if !path.exists() {
        log::trace!("no image at {}", path.display());
        return Ok(None);
    }
    Ok(Some(image::open(path)?.to_luma8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use std::io::Write;

    fn write_scan(path: &Path, points: &[[f32; 4]]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(path).unwrap();
        for point in points {
            for value in point {
                file.write_all(&value.to_le_bytes()).unwrap();
            }
        }
    }

    fn sequence(root: &Path, frames: usize) {
        let seq = root.join("sequences/00");
        fs::create_dir_all(seq.join("image_0")).unwrap();
        fs::create_dir_all(root.join("results")).unwrap();
        let times: String = (0..frames).map(|i| format!("{:e}\n", i as f64 * 0.1)).collect();
        fs::write(seq.join("times.txt"), times).unwrap();
        let poses: String = (0..frames)
            .map(|i| format!("1 0 0 0 0 1 0 0 0 0 1 {}\n", i as f32))
            .collect();
        fs::write(root.join("results/00.txt"), poses).unwrap();
        for i in 0..frames {
            write_scan(
                &root.join(format!("velodyne/sequences/00/velodyne/{i:06}.bin")),
                &[[10.0, 0.0, 0.0, 0.5], [f32::NAN, 0.0, 0.0, 0.0], [0.0, 10.0, -1.0, 0.2]],
            );
        }
        GrayImage::new(8, 4).save(seq.join("image_0/000000.png")).unwrap();
    }

    fn options(root: &Path) -> KittiOptions {
        KittiOptions {
            root: root.to_path_buf(),
            sequence: "00".to_string(),
            camera_in_lidar: Pose::IDENTITY,
        }
    }

    #[test]
    fn test_reads_sequence_in_order() {
        let dir = tempfile::tempdir().unwrap();
        sequence(dir.path(), 2);
        let mut loader = KittiLoader::open(options(dir.path())).unwrap();

        let first = loader.next_record().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.point_count(), 2);
        assert_eq!(first.left_image.as_ref().map(GrayImage::dimensions), Some((8, 4)));
        assert!(first.right_image.is_none());

        let second = loader.next_record().unwrap().unwrap();
        assert!((second.timestamp - 0.1).abs() < 1e-9);
        assert_eq!(second.camera_pose.translation, Vec3::new(0.0, 0.0, 1.0));
        assert!(second.left_image.is_none());

        assert!(loader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_lidar_motion_is_conjugated() {
        let dir = tempfile::tempdir().unwrap();
        sequence(dir.path(), 2);
        let mut opts = options(dir.path());
        // camera z axis is the lidar x axis
        opts.camera_in_lidar = Pose::from_rotation_matrix(
            glam::Mat3::from_cols(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 0.0, -1.0), Vec3::X),
            Vec3::ZERO,
        );
        let mut loader = KittiLoader::open(opts).unwrap();
        loader.next_record().unwrap();
        let second = loader.next_record().unwrap().unwrap();
        assert!(second.lidar_pose.translation.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            KittiLoader::open(options(dir.path())),
            Err(ViewerError::Dataset(_))
        ));
    }

    #[test]
    fn test_ring_assignment() {
        assert_eq!(ring_of(Vec3::new(10.0, 0.0, 0.0)), Some(6));
        let top = Vec3::new(1.0, 0.0, 1.9f32.to_radians().tan());
        assert_eq!(ring_of(top), Some(0));
        assert_eq!(ring_of(Vec3::new(1.0, 0.0, 1.0)), None);
        assert_eq!(ring_of(Vec3::new(1.0, 0.0, -1.0)), None);
        let low = Vec3::new(1.0, 0.0, (-15f32).to_radians().tan());
        assert_eq!(ring_of(low), Some(44));
        // below the last ring of the lower block
        let floor = Vec3::new(1.0, 0.0, (-20f32).to_radians().tan());
        assert_eq!(ring_of(floor), None);
    }

    #[test]
    fn test_ring_times_follow_azimuth() {
        let mut ring: Vec<PointXyzRt> = [0.0f32, 90.0, 180.0, -90.0]
            .iter()
            .map(|deg| PointXyzRt {
                position: Vec3::new(deg.to_radians().cos(), deg.to_radians().sin(), 0.0),
                ring: 6,
                time: 0.0,
            })
            .collect();
        stamp_ring(&mut ring);
        let times: Vec<f32> = ring.iter().map(|p| p.time).collect();
        assert!(times[0].abs() < 1e-6);
        assert!((times[1] - 0.025).abs() < 1e-5);
        assert!((times[2] - 0.05).abs() < 1e-5);
        assert!((times[3] - 0.075).abs() < 1e-5);
    }

    #[test]
    fn test_parse_pose() {
        let pose = parse_pose("1 0 0 1.5 0 1 0 -2 0 0 1 3").unwrap();
        assert_eq!(pose.translation, Vec3::new(1.5, -2.0, 3.0));
        assert!(matches!(
            parse_pose("1 0 0"),
            Err(ViewerError::SizeMismatch { expected: 12, actual: 3 })
        ));
        assert!(parse_pose("1 0 x").is_err());
    }

    proptest! {
        #[test]
        fn test_ring_of_stays_in_range(
            x in -100.0f32..100.0,
            y in -100.0f32..100.0,
            z in -50.0f32..50.0,
        ) {
            if let Some(ring) = ring_of(Vec3::new(x, y, z)) {
                prop_assert!((ring as usize) < RING_COUNT);
            }
        }

        #[test]
        fn test_stamped_times_are_bounded(angles in proptest::collection::vec(-3.1f32..3.1, 1..64)) {
            let mut ring: Vec<PointXyzRt> = angles
                .iter()
                .map(|a| PointXyzRt { position: Vec3::new(a.cos(), a.sin(), 0.0), ring: 0, time: 0.0 })
                .collect();
            stamp_ring(&mut ring);
            prop_assert_eq!(ring[0].time, 0.0);
            for point in &ring {
                prop_assert!(point.time > -SWEEP_PERIOD && point.time < 2.0 * SWEEP_PERIOD);
            }
        }
    }
}
