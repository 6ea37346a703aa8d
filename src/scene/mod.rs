//! Render loop driver for the procedural backdrop.
//!
//! One [`SceneDriver`] exists per mounted scene. It owns the bevy world that
//! holds the population, asks the host's [`FrameScheduler`] for exactly one
//! refresh callback at a time and hands every finished frame to the
//! [`RenderSurface`]. Stopping withdraws the outstanding request so nothing
//! stays scheduled after unmount.

pub mod profiler;
pub mod systems;

use crate::camera3d::{Camera3D, CameraRig};
use crate::config::CameraConfig;
use crate::events::SceneStopReason;
use crate::motion::{MotionObject, MotionSample};
use crate::nodes::NodeId;
use crate::populate::{self, PopulationSpec};
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, UVec2, Vec2, Vec3};
use profiler::{FrameProfiler, ScopeSummary};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use systems::{sys_collect_instances, sys_follow_pointer, sys_sample_motion};
use thiserror::Error;

#[derive(Component, Clone)]
pub struct Motion(pub MotionObject);

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct SceneTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for SceneTransform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY }
    }
}

#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct SceneClock {
    pub elapsed: f32,
    pub delta: f32,
}

/// Pointer in normalized device coordinates.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct PointerInput(pub Vec2);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// opacity, class slot, shape slot (-1 for none), object id
    pub params: [f32; 4],
}

#[derive(Resource, Default)]
pub struct FrameInstances {
    pub instances: Vec<InstanceData>,
    scratch: Vec<(u32, InstanceData)>,
}

pub struct SceneFrame<'a> {
    pub index: u64,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub layer_opacity: f32,
    pub instances: &'a [InstanceData],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("render surface lost")]
    Lost,
    #[error("render surface unavailable: {0}")]
    Unavailable(String),
}

pub trait RenderSurface {
    fn present(&mut self, frame: &SceneFrame<'_>) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// Host display-refresh hook (`requestAnimationFrame` and friends).
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    /// Withdraws a request that has not fired.
    fn cancel_frame(&mut self, token: FrameToken);
    /// The host fired the callback for `token`.
    fn frame_fired(&mut self, token: FrameToken);
}

#[derive(Debug, Default)]
struct ManualSchedulerState {
    next: u64,
    pending: BTreeSet<FrameToken>,
    requested: u64,
    cancelled: u64,
}

/// Scheduler whose callbacks are fired by whoever calls `Stage::frame`.
/// Clones share state so the host can inspect what is outstanding.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualSchedulerState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn requested(&self) -> u64 {
        self.state.borrow().requested
    }

    pub fn cancelled(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let mut state = self.state.borrow_mut();
        let token = FrameToken(state.next);
        state.next += 1;
        state.requested += 1;
        state.pending.insert(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let mut state = self.state.borrow_mut();
        if state.pending.remove(&token) {
            state.cancelled += 1;
        }
    }

    fn frame_fired(&mut self, token: FrameToken) {
        self.state.borrow_mut().pending.remove(&token);
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    frames: u64,
    last_instances: usize,
    last_layer_opacity: f32,
    bytes_uploaded: usize,
    injected: Option<SurfaceError>,
}

/// Surface that accepts frames without drawing them. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next present fails with `error`.
    pub fn inject_error(&self, error: SurfaceError) {
        self.state.borrow_mut().injected = Some(error);
    }

    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }

    pub fn last_instances(&self) -> usize {
        self.state.borrow().last_instances
    }

    pub fn last_layer_opacity(&self) -> f32 {
        self.state.borrow().last_layer_opacity
    }

    pub fn bytes_uploaded(&self) -> usize {
        self.state.borrow().bytes_uploaded
    }
}

impl RenderSurface for HeadlessSurface {
    fn present(&mut self, frame: &SceneFrame<'_>) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.injected.take() {
            return Err(error);
        }
        state.frames += 1;
        state.last_instances = frame.instances.len();
        state.last_layer_opacity = frame.layer_opacity;
        state.bytes_uploaded += bytemuck::cast_slice::<InstanceData, u8>(frame.instances).len();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStatus {
    Running,
    Stopped(SceneStopReason),
}

pub struct SceneDriver {
    world: World,
    schedule: Schedule,
    scheduler: Box<dyn FrameScheduler>,
    surface: Box<dyn RenderSurface>,
    pending: Option<FrameToken>,
    status: DriverStatus,
    canvas: UVec2,
    seed: u64,
    frame_index: u64,
    layer_binding: Option<NodeId>,
}

impl SceneDriver {
    /// Populates a fresh world from `seed` and requests the first frame.
    pub fn mount(
        seed: u64,
        population: &PopulationSpec,
        camera: &CameraConfig,
        canvas: UVec2,
        scheduler: Box<dyn FrameScheduler>,
        surface: Box<dyn RenderSurface>,
    ) -> Self {
        let objects = populate::generate(seed, population);
        log::debug!("scene mounted with {} objects (seed {seed})", objects.len());

        let mut world = World::new();
        world.insert_resource(SceneClock::default());
        world.insert_resource(PointerInput::default());
        world.insert_resource(CameraRig::from_config(camera));
        world.insert_resource(FrameInstances::default());
        world.insert_resource(FrameProfiler::new());
        world.spawn_batch(objects.into_iter().map(|object| (Motion(object), SceneTransform::default())));

        let mut schedule = Schedule::default();
        schedule.add_systems((sys_follow_pointer, sys_sample_motion, sys_collect_instances).chain());

        let mut driver = Self {
            world,
            schedule,
            scheduler,
            surface,
            pending: None,
            status: DriverStatus::Running,
            canvas,
            seed,
            frame_index: 0,
            layer_binding: None,
        };
        driver.pending = Some(driver.scheduler.request_frame());
        driver
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn status(&self) -> &DriverStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == DriverStatus::Running
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn elapsed(&self) -> f32 {
        self.world.resource::<SceneClock>().elapsed
    }

    pub fn set_pointer(&mut self, pointer: Vec2) {
        let pointer = if pointer.is_finite() { pointer } else { Vec2::ZERO };
        self.world.resource_mut::<PointerInput>().0 = pointer;
    }

    /// Layer opacity follows this node's opacity every frame.
    pub fn bind_layer_opacity(&mut self, node: NodeId) {
        self.layer_binding = Some(node);
    }

    pub fn layer_binding(&self) -> Option<NodeId> {
        self.layer_binding
    }

    pub fn camera(&self) -> Camera3D {
        self.world.resource::<CameraRig>().camera()
    }

    pub fn instances(&self) -> &[InstanceData] {
        &self.world.resource::<FrameInstances>().instances
    }

    pub fn object_count(&mut self) -> usize {
        self.world.query::<&Motion>().iter(&self.world).count()
    }

    pub fn objects(&mut self) -> Vec<MotionObject> {
        let mut objects: Vec<MotionObject> =
            self.world.query::<&Motion>().iter(&self.world).map(|motion| motion.0.clone()).collect();
        objects.sort_by_key(|object| object.id);
        objects
    }

    /// Last written transform of every object, ordered by id.
    pub fn transforms(&mut self) -> Vec<(u32, MotionSample)> {
        let mut out: Vec<(u32, MotionSample)> = self
            .world
            .query::<(&Motion, &SceneTransform)>()
            .iter(&self.world)
            .map(|(motion, transform)| {
                (motion.0.id, MotionSample { position: transform.position, rotation: transform.rotation })
            })
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    pub fn profiler_summaries(&self) -> Vec<ScopeSummary> {
        self.world.resource::<FrameProfiler>().summaries()
    }

    /// Display-refresh callback. Does nothing unless a frame is outstanding.
    /// Returns the stop reason when this frame ended the loop.
    pub fn tick(&mut self, dt: f32, layer_opacity: f32) -> Option<SceneStopReason> {
        let token = self.pending.take()?;
        self.scheduler.frame_fired(token);

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        {
            let mut clock = self.world.resource_mut::<SceneClock>();
            clock.delta = dt;
            clock.elapsed += dt;
        }
        self.world.resource_mut::<FrameProfiler>().begin_frame();
        self.schedule.run(&mut self.world);
        self.frame_index += 1;

        let camera = self.world.resource::<CameraRig>().camera();
        let frame = SceneFrame {
            index: self.frame_index,
            view_projection: camera.view_projection(self.canvas),
            camera_position: camera.position,
            layer_opacity: if layer_opacity.is_finite() { layer_opacity.clamp(0.0, 1.0) } else { 1.0 },
            instances: &self.world.resource::<FrameInstances>().instances,
        };
        match self.surface.present(&frame) {
            Ok(()) => {
                self.pending = Some(self.scheduler.request_frame());
                None
            }
            Err(err) => {
                log::warn!("scene surface failed on frame {}: {err}; stopping render loop", self.frame_index);
                let reason = SceneStopReason::SurfaceLost(err.to_string());
                self.status = DriverStatus::Stopped(reason.clone());
                Some(reason)
            }
        }
    }

    /// Stops the loop and withdraws the outstanding frame request. Returns
    /// false when it was already stopped.
    pub fn stop(&mut self) -> bool {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel_frame(token);
        }
        if self.is_running() {
            self.status = DriverStatus::Stopped(SceneStopReason::Unmounted);
            true
        } else {
            false
        }
    }
}

impl Drop for SceneDriver {
    fn drop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel_frame(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionClass;
    use crate::populate::ClassSpec;

    fn small_population() -> PopulationSpec {
        PopulationSpec {
            classes: vec![
                ClassSpec::new(MotionClass::DebrisShape, 6),
                ClassSpec::new(MotionClass::WarmComet, 2),
                ClassSpec::new(MotionClass::IceComet, 2),
            ],
        }
    }

    fn mount(scheduler: &ManualScheduler, surface: &HeadlessSurface) -> SceneDriver {
        SceneDriver::mount(
            11,
            &small_population(),
            &CameraConfig::default(),
            UVec2::new(1280, 800),
            Box::new(scheduler.clone()),
            Box::new(surface.clone()),
        )
    }

    #[test]
    fn frames_follow_the_pure_motion_functions() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        for _ in 0..30 {
            driver.tick(1.0 / 60.0, 1.0);
        }
        let elapsed = driver.elapsed();
        let objects = driver.objects();
        for (id, sample) in driver.transforms() {
            let object = objects.iter().find(|object| object.id == id).unwrap();
            let expected = crate::motion::sample(object, elapsed, Vec2::ZERO);
            assert!((sample.position - expected.position).length() < 1e-5);
        }
        assert_eq!(surface.frames(), 30);
        assert_eq!(surface.last_instances(), 10);
        assert_eq!(surface.bytes_uploaded(), 30 * 10 * std::mem::size_of::<InstanceData>());
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn instances_are_ordered_by_id() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        driver.tick(0.016, 1.0);
        let ids: Vec<f32> = driver.instances().iter().map(|instance| instance.params[3]).collect();
        assert_eq!(ids, (0..10).map(|id| id as f32).collect::<Vec<_>>());
    }

    #[test]
    fn stop_withdraws_the_pending_frame() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        driver.tick(0.016, 1.0);
        assert!(driver.stop());
        assert!(!driver.stop());
        assert_eq!(scheduler.pending(), 0);
        let requested = scheduler.requested();
        assert!(driver.tick(0.016, 1.0).is_none());
        assert_eq!(scheduler.requested(), requested);
        assert_eq!(surface.frames(), 1);
    }

    #[test]
    fn surface_loss_stops_cleanly() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        surface.inject_error(SurfaceError::Lost);
        let reason = driver.tick(0.016, 1.0);
        assert_eq!(reason, Some(SceneStopReason::SurfaceLost("render surface lost".to_string())));
        assert!(!driver.is_running());
        assert_eq!(scheduler.pending(), 0);
        assert!(driver.tick(0.016, 1.0).is_none());
    }

    #[test]
    fn dropping_a_driver_cancels_its_request() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        drop(mount(&scheduler, &surface));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.cancelled(), 1);
    }

    #[test]
    fn pointer_moves_the_camera_gradually() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        driver.set_pointer(Vec2::new(1.0, 0.0));
        driver.tick(0.016, 1.0);
        let first = driver.camera().position.x;
        driver.tick(0.016, 1.0);
        let second = driver.camera().position.x;
        assert!(first > 0.0 && second > first && second < 0.3);
        assert_eq!(driver.camera().target, Vec3::new(0.0, 0.0, -15.0));
    }

    #[test]
    fn system_timings_are_recorded() {
        let scheduler = ManualScheduler::new();
        let surface = HeadlessSurface::new();
        let mut driver = mount(&scheduler, &surface);
        driver.tick(0.016, 1.0);
        let names: Vec<&str> = driver.profiler_summaries().iter().map(|summary| summary.name).collect();
        assert!(names.contains(&"sys_sample_motion"));
        assert!(names.contains(&"sys_collect_instances"));
    }
}
