use super::profiler::FrameProfiler;
use super::{FrameInstances, InstanceData, Motion, PointerInput, SceneClock, SceneTransform};
use crate::camera3d::CameraRig;
use crate::motion::{self, MotionClass, ShapeKind};
use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

pub fn sys_follow_pointer(
    mut profiler: ResMut<FrameProfiler>,
    pointer: Res<PointerInput>,
    mut rig: ResMut<CameraRig>,
) {
    let _span = profiler.scope("sys_follow_pointer");
    rig.follow(pointer.0);
}

pub fn sys_sample_motion(
    mut profiler: ResMut<FrameProfiler>,
    clock: Res<SceneClock>,
    pointer: Res<PointerInput>,
    mut objects: Query<(&Motion, &mut SceneTransform)>,
) {
    let _span = profiler.scope("sys_sample_motion");
    for (motion, mut transform) in &mut objects {
        let sample = motion::sample(&motion.0, clock.elapsed, pointer.0);
        transform.position = sample.position;
        transform.rotation = sample.rotation;
    }
}

pub fn sys_collect_instances(
    mut profiler: ResMut<FrameProfiler>,
    objects: Query<(&Motion, &SceneTransform)>,
    mut frame: ResMut<FrameInstances>,
) {
    let _span = profiler.scope("sys_collect_instances");
    let FrameInstances { instances, scratch } = &mut *frame;
    scratch.clear();
    for (motion, transform) in &objects {
        let object = &motion.0;
        let model =
            Mat4::from_scale_rotation_translation(Vec3::splat(object.scale), transform.rotation, transform.position);
        scratch.push((
            object.id,
            InstanceData {
                model: model.to_cols_array_2d(),
                color: object.color.to_array(),
                params: [object.opacity, class_slot(object.class), shape_slot(object.shape), object.id as f32],
            },
        ));
    }
    scratch.sort_unstable_by_key(|(id, _)| *id);
    instances.clear();
    instances.extend(scratch.iter().map(|(_, data)| *data));
}

fn class_slot(class: MotionClass) -> f32 {
    MotionClass::ALL.iter().position(|candidate| *candidate == class).unwrap_or(0) as f32
}

fn shape_slot(shape: Option<ShapeKind>) -> f32 {
    shape.and_then(|shape| ShapeKind::ALL.iter().position(|candidate| *candidate == shape)).map_or(-1.0, |slot| slot as f32)
}
