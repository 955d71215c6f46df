//! A body frame driving in a circle, with its camera frustum, a box around it
//! and the path it leaves behind. Press `f` to toggle the follow camera.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use slamview::*;

fn main() -> Result<()> {
    init_logging();

    let world = Arc::new(CoordinateTriad::new("world", Pose::IDENTITY, 3.0));
    let body = Arc::new(CoordinateTriad::new("body", Pose::IDENTITY, 1.0));
    let frustum = Arc::new(CameraFrame::with_scale(
        "frustum",
        Pose::IDENTITY,
        Vec3::new(0.0, 0.6, 1.0),
        2.0,
        0.3,
    ));
    let outline = Arc::new(BoxOutline::new("box", Pose::IDENTITY, Vec3::new(2.0, 1.0, 1.0)));
    let path = Arc::new(Trajectory::with_capacity("path", 2_000));
    let heading = Arc::new(Arrow::new("heading", Pose::IDENTITY, 2.0).with_head(HeadPolicy::CAPPED));

    let camera = Arc::new(Camera::following("chase", CameraOptions::default(), &body));
    let scene = Arc::new(View3D::new("scene", camera.clone()));
    for item in [
        world as Arc<dyn RenderableItem>,
        body.clone(),
        frustum.clone(),
        outline.clone(),
        path.clone(),
        heading.clone(),
    ] {
        scene.add_item(item);
    }

    let menu = Arc::new(MenuPanel::new("menu"));
    {
        let camera = camera.clone();
        let mut last = None;
        menu.add_checkbox("Follow", true, move |follow| {
            if last.replace(follow) == Some(follow) {
                return;
            }
            if follow {
                if let Err(e) = camera.refollow() {
                    log::warn!("{e}");
                }
            } else {
                camera.set_free();
            }
        });
    }
    menu.bind_key("Follow", 'f');
    let speed = Arc::new(std::sync::atomic::AtomicU32::new(1.0f32.to_bits()));
    {
        let speed = speed.clone();
        menu.add_float_slider("Speed", 1.0, 0.1, 4.0, move |v| {
            speed.store(v.to_bits(), std::sync::atomic::Ordering::Relaxed);
        });
    }
    {
        let path = path.clone();
        menu.add_button("Clear path", move |pushed| {
            if pushed {
                path.clear();
            }
        });
    }

    let mut window = WindowDriver::windowed(WindowOptions::with_title("coordinate demo"));
    window.add_view(menu, Bounds::new(0.0, 1.0, 0.0, 0.15));
    window.add_view(scene, Bounds::new(0.0, 1.0, 0.15, 1.0));
    let stop = window.stop_handle();

    thread::spawn(move || {
        let mut angle = 0.0f32;
        while !stop.is_stopped() {
            let step = f32::from_bits(speed.load(std::sync::atomic::Ordering::Relaxed));
            angle = (angle + 0.01 * step) % TAU;
            let position = Vec3::new(10.0 * angle.cos(), 10.0 * angle.sin(), 0.5 * (3.0 * angle).sin());
            let pose = Pose::new(Quat::from_rotation_z(angle + TAU / 4.0), position);

            body.set_pose(pose);
            frustum.set_pose(pose * Pose::from_translation(Vec3::new(0.0, 0.0, 0.5)));
            outline.set_pose(pose);
            heading.set_pose(pose);
            path.add_point(position);
            thread::sleep(Duration::from_millis(10));
        }
    });

    window.run()
}
