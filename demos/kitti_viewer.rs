//! Replays a KITTI odometry sequence: lidar scans, camera frames, ground-truth
//! trajectory, pose plots and both grayscale cameras.
//!
//! Usage: `cargo run --example kitti_viewer -- <dataset_root> <sequence>`

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glam::{IVec3, Mat3};
use image::DynamicImage;
use slamview::*;

const VOXEL_SIZE: f32 = 0.5;

/// Keeps the first point that falls into each voxel.
fn voxel_downsample(points: Vec<PointXyzRt>) -> Vec<PointXyzRt> {
    let mut voxels: HashMap<IVec3, PointXyzRt> = HashMap::with_capacity(points.len() / 4);
    for point in points {
        let key = (point.position / VOXEL_SIZE).floor().as_ivec3();
        voxels.entry(key).or_insert(point);
    }
    voxels.into_values().collect()
}

fn configure_menu(menu: &MenuPanel, camera: &Arc<Camera>) {
    // the menu reports the checkbox every frame, act on changes only
    let cam = camera.clone();
    let mut last = None;
    menu.add_checkbox("Follow", true, move |follow| {
        if last.replace(follow) == Some(follow) {
            return;
        }
        if !follow {
            cam.set_free();
        } else if let Err(e) = cam.refollow() {
            log::warn!("{e}");
        }
    });

    let cam = camera.clone();
    menu.add_button("God View", move |pushed| {
        if pushed {
            cam.set_fixed_pose(Pose::IDENTITY);
            cam.set_look_at(Vec3::new(0.0, 0.0, 300.0), Vec3::ZERO, Vec3::X);
            cam.set_free();
        }
    });

    let cam = camera.clone();
    menu.add_button("Front View", move |pushed| {
        if pushed {
            if let Err(e) = cam.refollow() {
                log::warn!("{e}");
            }
            cam.set_look_at(Vec3::new(-50.0, 0.0, 10.0), Vec3::ZERO, Vec3::Z);
            cam.set_free();
        }
    });
    menu.bind_key("Follow", 'f');
    menu.bind_key("God View", 'g');
}

fn quat_values(q: Quat) -> [f32; 4] {
    [q.x, q.y, q.z, q.w]
}

fn main() -> Result<()> {
    init_logging();
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: kitti_viewer <dataset_root> <sequence>");
        std::process::exit(2);
    }

    // camera pose in the lidar frame
    let rlc = Mat3::from_cols(
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, 0.0),
    );
    let tlc = Pose::from_rotation_matrix(rlc, Vec3::new(1.5, 0.0, -0.5));
    let twl0 = Pose::from_translation(Vec3::new(0.0, 0.0, 1.5));
    let twc0 = twl0 * tlc;

    let mut loader = KittiLoader::open(KittiOptions {
        root: args[1].clone().into(),
        sequence: args[2].clone(),
        camera_in_lidar: tlc,
    })?;

    let world = Arc::new(CoordinateTriad::new("world", Pose::IDENTITY, 5.0));
    let lidar = Arc::new(CoordinateTriad::new("lidar", twl0, 0.2));
    let camera_triad = Arc::new(CoordinateTriad::new("camera", twc0, 0.2));
    let trajectory = Arc::new(Trajectory::new("lidar_trajectory"));
    trajectory.set_color(Vec4::new(1.0, 0.1, 0.1, 1.0));
    trajectory.set_line_width(3.0);

    let camera = Arc::new(Camera::following("camera", CameraOptions::default(), &lidar));
    let scene = Arc::new(View3D::new("view_3d", camera.clone()));
    scene.add_item(world);
    scene.add_item(lidar.clone());
    scene.add_item(camera_triad.clone());
    scene.add_item(trajectory.clone());

    let menu = Arc::new(MenuPanel::new("menu"));
    configure_menu(&menu, &camera);

    let plots = Arc::new(PlotPanel::new("plotter"));
    let position_range = PlotRange {
        y_min: -100.0,
        y_max: 100.0,
        x_tick: 74.0,
        y_tick: 10.0,
        ..PlotRange::default()
    };
    let quat_range = PlotRange::with_y(-1.0, 1.0, 0.2);
    plots.add_series("lidar_position", &["lx", "ly", "lz"], position_range);
    plots.add_series("camera_position", &["cx", "cy", "cz"], position_range);
    plots.add_series("lidar_quat", &["lqx", "lqy", "lqz", "lqw"], quat_range);
    plots.add_series("camera_quat", &["cqx", "cqy", "cqz", "cqw"], quat_range);

    let images = Arc::new(ImagePanel::with_offsets("image", 2, 1, 30, 10));
    images.add_image("left_image", 376, 1241);
    images.add_image("right_image", 376, 1241);

    let mut window = WindowDriver::windowed(WindowOptions::with_title("KITTI Viewer"));
    window.add_view(menu, Bounds::new(0.0, 1.0, 0.0, 0.1));
    window.add_view(scene.clone(), Bounds::new(0.35, 1.0, 0.1, 0.8));
    window.add_view(images.clone(), Bounds::new(0.0, 0.35, 0.1, 0.8));
    window.add_view(plots.clone(), Bounds::new(0.0, 1.0, 0.8, 1.0));

    thread::spawn(move || loop {
        let record = match loader.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                log::error!("stopping playback: {e}");
                break;
            }
        };
        let twl = twl0 * record.lidar_pose;
        let twc = twc0 * record.camera_pose;

        let cloud = Arc::new(PointCloud::new(format!("cloud_{:06}", record.index)));
        if let Err(e) = cloud.set_cloud(&voxel_downsample(record.cloud()), twl, &GrayColor) {
            log::warn!("frame {}: {e}", record.index);
        }
        let frame = Arc::new(CameraFrame::new(
            format!("frame_{:06}", record.index),
            twc,
            Vec3::new(0.0, 1.0, 0.0),
            3.0,
        ));
        camera_triad.set_pose(twc);
        lidar.set_pose(twl);
        trajectory.add_pose(&twl);
        scene.add_item(frame);
        scene.add_item(cloud);

        let caption = format!("timestamp offset {:.6}", record.timestamp);
        for (name, gray) in [("left_image", record.left_image), ("right_image", record.right_image)] {
            let Some(gray) = gray else { continue };
            let rgb = DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8());
            if let Err(e) = images.update_image(name, caption.clone(), &rgb) {
                log::warn!("{e}");
            }
        }

        plots.update_series("lidar_position", &twl.translation.to_array());
        plots.update_series("camera_position", &twc.translation.to_array());
        plots.update_series("lidar_quat", &quat_values(twl.rotation));
        plots.update_series("camera_quat", &quat_values(twc.rotation));

        thread::sleep(Duration::from_millis(10));
    });

    window.run()
}
