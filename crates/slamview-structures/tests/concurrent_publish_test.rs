//! Producers publishing poses while the render thread draws.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use glam::{Vec3, Vec4};
use slamview_core::{Bounds, GraphicsBackend, Pose, PoseSource, RenderableItem, Viewport};
use slamview_render::{GrayColor, HeadlessBackend, PointXyz};
use slamview_structures::{BoxOutline, CoordinateTriad, PointCloud, Trajectory};

const SIZE: Vec3 = Vec3::new(5.0, 2.0, 1.5);

fn offset_for(step: u32) -> Vec3 {
    let k = step as f32;
    Vec3::new(k, 2.0 * k, -k)
}

fn bound_backend() -> (HeadlessBackend, Viewport) {
    let mut gfx = HeadlessBackend::new(320, 240);
    gfx.bind_context().unwrap();
    gfx.create_region("main", Bounds::FULL).unwrap();
    let viewport = gfx.region_viewport("main").unwrap();
    (gfx, viewport)
}

fn draw_frame(gfx: &mut HeadlessBackend, viewport: Viewport, item: &dyn RenderableItem) {
    gfx.begin_frame(Vec4::ONE).unwrap();
    gfx.activate(viewport, glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);
    item.update_for_render(gfx).unwrap();
    item.render(gfx);
    gfx.end_frame().unwrap();
}

#[test]
fn render_never_sees_a_mixed_box() {
    let outline = Arc::new(BoxOutline::new("box", Pose::IDENTITY, SIZE));
    let reference = BoxOutline::new("reference", Pose::IDENTITY, SIZE).world_vertices();
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let outline = Arc::clone(&outline);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for step in 1..=2_000 {
                outline.set_pose(Pose::from_translation(offset_for(step)));
            }
            done.store(true, Ordering::Release);
        })
    };

    let (mut gfx, viewport) = bound_backend();
    let log = gfx.frame_log();

    let mut frames = 0;
    loop {
        let finished = done.load(Ordering::Acquire);
        draw_frame(&mut gfx, viewport, outline.as_ref());
        frames += 1;

        let frame = log.last().unwrap();
        assert_eq!(frame.draws.len(), 1);
        let vertices = &frame.draws[0].vertices;
        assert_eq!(vertices.len(), reference.len());
        let shift = vertices[0].position() - reference[0];
        for (vertex, local) in vertices.iter().zip(&reference) {
            assert_eq!(vertex.position() - *local, shift, "frame {frames} mixes two poses");
        }
        assert_eq!(shift.y, 2.0 * shift.x);

        if finished {
            break;
        }
    }
    producer.join().unwrap();
    assert!(outline.world_vertices()[0].abs_diff_eq(reference[0] + offset_for(2_000), 1e-3));
}

#[test]
fn concurrent_appends_keep_order_per_producer() {
    let trajectory = Arc::new(Trajectory::with_capacity("path", 500));
    let producers: Vec<_> = (0..4)
        .map(|id| {
            let trajectory = Arc::clone(&trajectory);
            thread::spawn(move || {
                for i in 0..300 {
                    trajectory.add_point(Vec3::new(id as f32, i as f32, 0.0));
                }
            })
        })
        .collect();

    let mut gfx = HeadlessBackend::new(64, 64);
    gfx.bind_context().unwrap();
    for _ in 0..50 {
        gfx.begin_frame(Vec4::ONE).unwrap();
        trajectory.update_for_render(&mut gfx).unwrap();
        trajectory.render(&mut gfx);
        gfx.end_frame().unwrap();
    }
    for producer in producers {
        producer.join().unwrap();
    }

    let points = trajectory.points();
    assert!(!points.is_empty());
    assert!(points.len() <= 500);
    for id in 0..4 {
        let ys: Vec<f32> = points.iter().filter(|p| p.x == id as f32).map(|p| p.y).collect();
        assert!(ys.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn triad_axes_are_drawn_from_one_pose() {
    let triad = Arc::new(CoordinateTriad::new("frame", Pose::IDENTITY, 1.0));
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let triad = Arc::clone(&triad);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for step in 1..=20_000 {
                triad.set_pose(Pose::from_translation(Vec3::new(step as f32, 0.0, 0.0)));
            }
            done.store(true, Ordering::Release);
        })
    };

    let (mut gfx, viewport) = bound_backend();
    let log = gfx.frame_log();
    let mut frames = 0;
    loop {
        let finished = done.load(Ordering::Acquire);
        draw_frame(&mut gfx, viewport, triad.as_ref());
        frames += 1;

        let frame = log.last().unwrap();
        assert_eq!(frame.draws.len(), 3);
        // every arrow starts at the frame origin
        let origins: Vec<Vec3> = frame.draws.iter().map(|d| d.vertices[0].position()).collect();
        assert_eq!(origins[0], origins[1], "frame {frames} draws axes from two poses");
        assert_eq!(origins[0], origins[2], "frame {frames} draws axes from two poses");

        if finished {
            break;
        }
    }
    producer.join().unwrap();
    assert_eq!(triad.pose().translation, Vec3::new(20_000.0, 0.0, 0.0));
}

#[test]
fn moving_cloud_is_never_drawn_half_moved() {
    let local: Vec<PointXyz> = (0..512)
        .map(|i| PointXyz::from(Vec3::new((i % 8) as f32, (i / 8 % 8) as f32, (i / 64) as f32)))
        .collect();
    let cloud = Arc::new(PointCloud::new("scan"));
    cloud.set_cloud(&local, Pose::IDENTITY, &GrayColor).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let cloud = Arc::clone(&cloud);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for step in 1..=2_000 {
                cloud.set_pose(Pose::from_translation(offset_for(step)));
            }
            done.store(true, Ordering::Release);
        })
    };

    let (mut gfx, viewport) = bound_backend();
    let log = gfx.frame_log();
    let mut frames = 0;
    loop {
        let finished = done.load(Ordering::Acquire);
        draw_frame(&mut gfx, viewport, cloud.as_ref());
        frames += 1;

        let frame = log.last().unwrap();
        assert_eq!(frame.draws.len(), 1);
        let vertices = &frame.draws[0].vertices;
        assert_eq!(vertices.len(), local.len());
        let shift = vertices[0].position() - local[0].position;
        for (vertex, point) in vertices.iter().zip(&local) {
            let moved = vertex.position() - point.position;
            assert!(moved.abs_diff_eq(shift, 1e-2), "frame {frames} mixes two poses");
        }
        assert!((shift.y - 2.0 * shift.x).abs() < 1e-2);

        if finished {
            break;
        }
    }
    producer.join().unwrap();
    assert!(cloud.world_vertices()[0].abs_diff_eq(offset_for(2_000), 1e-2));
}
