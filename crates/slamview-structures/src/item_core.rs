//! Stage-then-publish machinery shared by all renderable items.
//!
//! Every item owns one [`ItemCore`]. Producers go through
//! [`ItemCore::modify`], which holds the item's writer lock while the new
//! geometry is computed and then swaps a complete [`Snapshot`] into the
//! published slot. The render thread clones the published `Arc` under a lock
//! held only for that clone, then uploads outside of it. It takes the writer
//! lock only to materialize staged changes, at most once per frame. A frame therefore always sees one whole snapshot.
//!
//! Items that grow one element at a time use [`ItemCore::stage`] instead.
//! Staged changes are turned into a snapshot by the item's materializer the
//! next time a snapshot is read, so a run of appends between two frames costs
//! one rebuild instead of one per append.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::Vec4;
use slamview_core::{DrawStyle, GpuBuffer, GraphicsBackend, Pose, Primitive, Result, Vertex};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Color and sizes of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    /// RGBA color.
    pub color: Vec4,
    /// Line width in pixels.
    pub line_width: f32,
    /// Point size in pixels.
    pub point_size: f32,
}

impl Appearance {
    /// Creates an appearance from an RGB color.
    #[must_use]
    pub fn new(rgb: glam::Vec3, line_width: f32, point_size: f32) -> Self {
        Self {
            color: rgb.extend(1.0),
            line_width,
            point_size,
        }
    }
}

/// One published geometry state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// World pose the geometry was computed for.
    pub pose: Pose,
    /// World-space vertices.
    pub vertices: Vec<Vertex>,
}

/// Producer-side state: the pose plus whatever the variant retains.
pub(crate) struct Staged<S> {
    pub pose: Pose,
    pub state: S,
}

/// Builds the published vertices from the staged state.
pub(crate) type Materialize<S> = fn(&Staged<S>) -> Vec<Vertex>;

/// How the render thread colors an item's primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSource {
    /// The appearance color overrides per-vertex colors.
    Uniform,
    /// Per-vertex colors are used as uploaded.
    PerVertex,
}

pub(crate) struct ItemCore<S> {
    name: String,
    appearance: Mutex<Appearance>,
    staged: Mutex<Staged<S>>,
    published: Mutex<Arc<Snapshot>>,
    dirty: AtomicBool,
    stale: AtomicBool,
    materialize: Option<Materialize<S>>,
    gpu: Mutex<Option<GpuBuffer>>,
    primitives: &'static [Primitive],
    color_source: ColorSource,
}

impl<S> ItemCore<S> {
    pub fn new(
        name: impl Into<String>,
        appearance: Appearance,
        pose: Pose,
        state: S,
        vertices: Vec<Vertex>,
        primitives: &'static [Primitive],
        color_source: ColorSource,
    ) -> Self {
        Self {
            name: name.into(),
            appearance: Mutex::new(appearance),
            staged: Mutex::new(Staged { pose, state }),
            published: Mutex::new(Arc::new(Snapshot { pose, vertices })),
            dirty: AtomicBool::new(true),
            stale: AtomicBool::new(false),
            materialize: None,
            gpu: Mutex::new(None),
            primitives,
            color_source,
        }
    }

    /// Enables [`stage`](Self::stage) with `materialize` as the snapshot builder.
    pub fn lazy(mut self, materialize: Materialize<S>) -> Self {
        self.materialize = Some(materialize);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` under the writer lock and publishes the vertices it returns.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Staged<S>) -> (Vec<Vertex>, R)) -> R {
        let mut staged = lock(&self.staged);
        let (vertices, result) = f(&mut staged);
        let snapshot = Arc::new(Snapshot {
            pose: staged.pose,
            vertices,
        });
        // publishing while the writer lock is held keeps publish order equal to modify order
        *lock(&self.published) = snapshot;
        self.stale.store(false, Ordering::Release);
        self.dirty.store(true, Ordering::Release);
        result
    }

    /// Runs `f` under the writer lock without publishing.
    ///
    /// Only valid on cores built with [`lazy`](Self::lazy); the next snapshot
    /// read materializes every change staged so far. `f` must not move the
    /// pose, which is only published through [`modify`](Self::modify).
    pub fn stage<R>(&self, f: impl FnOnce(&mut Staged<S>) -> R) -> R {
        let mut staged = lock(&self.staged);
        let result = f(&mut staged);
        self.stale.store(self.materialize.is_some(), Ordering::Release);
        self.dirty.store(true, Ordering::Release);
        result
    }

    /// Publishes pending staged changes, if any.
    fn refresh(&self) {
        let Some(materialize) = self.materialize else {
            return;
        };
        if !self.stale.load(Ordering::Acquire) {
            return;
        }
        let staged = lock(&self.staged);
        // another reader may have materialized while we waited
        if !self.stale.swap(false, Ordering::AcqRel) {
            return;
        }
        let vertices = materialize(&staged);
        *lock(&self.published) = Arc::new(Snapshot {
            pose: staged.pose,
            vertices,
        });
    }

    /// Reads the producer-side state.
    pub fn with_staged<R>(&self, f: impl FnOnce(&Staged<S>) -> R) -> R {
        f(&lock(&self.staged))
    }

    /// The latest snapshot, materializing staged changes first.
    ///
    /// Must not be called while the writer lock is held.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.refresh();
        self.published()
    }

    /// The published slot as is, without materializing.
    pub fn published(&self) -> Arc<Snapshot> {
        lock(&self.published).clone()
    }

    pub fn pose(&self) -> Pose {
        lock(&self.published).pose
    }

    pub fn appearance(&self) -> Appearance {
        *lock(&self.appearance)
    }

    pub fn set_appearance(&self, f: impl FnOnce(&mut Appearance)) {
        f(&mut lock(&self.appearance));
    }

    pub fn update_for_render(&self, gfx: &mut dyn GraphicsBackend) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let snapshot = self.snapshot();
        if snapshot.vertices.is_empty() {
            // nothing to draw; a cleared item releases its buffer here
            lock(&self.gpu).take();
            return Ok(());
        }
        match gfx.upload(&snapshot.vertices) {
            Ok(buffer) => {
                log::trace!("'{}' uploaded {} vertices", self.name, buffer.len());
                *lock(&self.gpu) = Some(buffer);
                Ok(())
            }
            Err(err) => {
                self.dirty.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    pub fn render(&self, gfx: &mut dyn GraphicsBackend) {
        let gpu = lock(&self.gpu);
        let Some(buffer) = gpu.as_ref() else {
            return;
        };
        let appearance = self.appearance();
        let style = DrawStyle {
            color: (self.color_source == ColorSource::Uniform).then_some(appearance.color),
            line_width: appearance.line_width,
            point_size: appearance.point_size,
        };
        for &primitive in self.primitives {
            gfx.draw(buffer, primitive, &style);
        }
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.gpu).is_some()
    }

    /// Drops the GPU buffer and publishes an empty snapshot.
    ///
    /// Everything happens under the writer lock, so a change staged by another
    /// producer lands either before the clear or fully after it. The item stays
    /// dirty: if the render thread was mid-upload of an older snapshot, the
    /// next frame sees the empty one and releases that buffer again.
    pub fn clear(&self, reset: impl FnOnce(&mut S)) {
        let mut staged = lock(&self.staged);
        reset(&mut staged.state);
        *lock(&self.published) = Arc::new(Snapshot {
            pose: staged.pose,
            vertices: Vec::new(),
        });
        self.stale.store(false, Ordering::Release);
        self.dirty.store(true, Ordering::Release);
        lock(&self.gpu).take();
    }
}

/// Builds vertices with a single color.
pub(crate) fn colored(points: impl IntoIterator<Item = glam::Vec3>, color: Vec4) -> Vec<Vertex> {
    points.into_iter().map(|p| Vertex::new(p, color)).collect()
}

/// Implements [`PoseSource`](slamview_core::PoseSource) and the appearance
/// setters for an item type that stores its core in a field named `core`.
macro_rules! impl_item_common {
    ($ty:ty) => {
        impl slamview_core::PoseSource for $ty {
            fn pose(&self) -> slamview_core::Pose {
                self.core.pose()
            }
        }

        impl $ty {
            /// Current appearance.
            pub fn appearance(&self) -> $crate::item_core::Appearance {
                self.core.appearance()
            }

            /// Sets the RGBA color.
            pub fn set_color(&self, color: glam::Vec4) {
                self.core.set_appearance(|a| a.color = color);
            }

            /// Sets the line width in pixels.
            pub fn set_line_width(&self, width: f32) {
                self.core.set_appearance(|a| a.line_width = width);
            }

            /// Sets the point size in pixels.
            pub fn set_point_size(&self, size: f32) {
                self.core.set_appearance(|a| a.point_size = size);
            }

            /// World-space vertices of the latest published snapshot.
            pub fn world_vertices(&self) -> Vec<glam::Vec3> {
                self.core
                    .snapshot()
                    .vertices
                    .iter()
                    .map(slamview_core::Vertex::position)
                    .collect()
            }
        }
    };
}

pub(crate) use impl_item_common;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use slamview_render::HeadlessBackend;
    use std::sync::atomic::AtomicUsize;

    fn core() -> ItemCore<u32> {
        ItemCore::new(
            "test",
            Appearance::new(Vec3::ONE, 2.0, 3.0),
            Pose::IDENTITY,
            0,
            colored([Vec3::ZERO, Vec3::X], Vec4::ONE),
            &[Primitive::Lines],
            ColorSource::Uniform,
        )
    }

    #[test]
    fn test_not_ready_before_upload() {
        let core = core();
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        assert!(!core.is_ready());
        core.render(&mut gfx);
        core.update_for_render(&mut gfx).unwrap();
        assert!(core.is_ready());
    }

    #[test]
    fn test_upload_only_when_dirty() {
        let core = core();
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        core.update_for_render(&mut gfx).unwrap();
        core.update_for_render(&mut gfx).unwrap();
        assert_eq!(gfx.upload_count(), 1);
        core.modify(|staged| {
            staged.state += 1;
            (colored([Vec3::Y], Vec4::ONE), ())
        });
        core.update_for_render(&mut gfx).unwrap();
        assert_eq!(gfx.upload_count(), 2);
    }

    #[test]
    fn test_failed_upload_stays_dirty() {
        let core = core();
        let mut unbound = HeadlessBackend::new(100, 100);
        assert!(core.update_for_render(&mut unbound).is_err());
        unbound.bind_context().unwrap();
        core.update_for_render(&mut unbound).unwrap();
        assert!(core.is_ready());
    }

    static MATERIALIZED: AtomicUsize = AtomicUsize::new(0);

    fn count_materialized(staged: &Staged<u32>) -> Vec<Vertex> {
        MATERIALIZED.fetch_add(1, Ordering::SeqCst);
        colored((0..staged.state).map(|i| Vec3::new(i as f32, 0.0, 0.0)), Vec4::ONE)
    }

    #[test]
    fn test_staged_changes_materialize_once_per_read() {
        let core = core().lazy(count_materialized);
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        for _ in 0..1_000 {
            core.stage(|staged| staged.state += 1);
        }
        assert_eq!(MATERIALIZED.load(Ordering::SeqCst), 0);
        core.update_for_render(&mut gfx).unwrap();
        core.update_for_render(&mut gfx).unwrap();
        assert_eq!(MATERIALIZED.load(Ordering::SeqCst), 1);
        assert_eq!(core.snapshot().vertices.len(), 1_000);
        assert_eq!(gfx.upload_count(), 1);
    }

    #[test]
    fn test_change_after_clear_is_uploaded() {
        let core = core();
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        core.update_for_render(&mut gfx).unwrap();
        core.clear(|state| *state = 0);
        core.modify(|staged| {
            staged.state = 1;
            (colored([Vec3::Z], Vec4::ONE), ())
        });
        core.update_for_render(&mut gfx).unwrap();
        assert!(core.is_ready());
        assert_eq!(gfx.upload_count(), 2);
    }

    #[test]
    fn test_upload_racing_clear_is_released() {
        let core = core();
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        // the render thread uploaded the old snapshot just as the clear ran
        core.update_for_render(&mut gfx).unwrap();
        core.clear(|state| *state = 0);
        let stale = gfx.upload(&colored([Vec3::X], Vec4::ONE)).unwrap();
        *lock(&core.gpu) = Some(stale);
        core.update_for_render(&mut gfx).unwrap();
        assert!(!core.is_ready());
    }

    #[test]
    fn test_clear_releases_buffer() {
        let core = core();
        let mut gfx = HeadlessBackend::new(100, 100);
        gfx.bind_context().unwrap();
        core.update_for_render(&mut gfx).unwrap();
        core.clear(|state| *state = 0);
        assert!(!core.is_ready());
        assert!(core.snapshot().vertices.is_empty());
        core.update_for_render(&mut gfx).unwrap();
        assert_eq!(gfx.upload_count(), 1);
    }
}
