//! Parametric motion for background scene objects.
//!
//! Everything here is a pure function of `(object, elapsed seconds)` plus the
//! optional pointer position; nothing integrates velocity between frames, so a
//! sample can be taken at any time in any order and always agrees with itself.

use glam::{EulerRot, Mat3, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest orbit radius a comet may be created with.
pub const MIN_ORBIT_RADIUS: f32 = 0.1;
/// How far along its orbit (in radians of path time) a comet looks ahead when
/// orienting itself toward its direction of travel.
const HEADING_LOOKAHEAD: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionClass {
    Particle,
    DebrisShape,
    WarmComet,
    IceComet,
    NebulaPanel,
}

impl MotionClass {
    pub const ALL: [MotionClass; 5] = [
        MotionClass::Particle,
        MotionClass::DebrisShape,
        MotionClass::WarmComet,
        MotionClass::IceComet,
        MotionClass::NebulaPanel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MotionClass::Particle => "particle",
            MotionClass::DebrisShape => "debris-shape",
            MotionClass::WarmComet => "warm-comet",
            MotionClass::IceComet => "ice-comet",
            MotionClass::NebulaPanel => "nebula-panel",
        }
    }

    pub fn is_comet(self) -> bool {
        matches!(self, MotionClass::WarmComet | MotionClass::IceComet)
    }
}

impl fmt::Display for MotionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Octahedron,
    Tetrahedron,
    Icosahedron,
    Dodecahedron,
    Cube,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] =
        [ShapeKind::Octahedron, ShapeKind::Tetrahedron, ShapeKind::Icosahedron, ShapeKind::Dodecahedron, ShapeKind::Cube];
}

/// Immutable parameters of an orbiting comet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitParams {
    pub radius: f32,
    /// Angular rate in radians of path time per second.
    pub speed: f32,
    /// Path time at `t = 0`.
    pub phase: f32,
    /// Extra phase applied to the secondary (vertical) sinusoid.
    pub tilt: f32,
    /// Rotation of the orbital plane, radians.
    pub orbit_tilt: f32,
    /// `1.0` for clockwise, `-1.0` for counter-clockwise.
    pub direction: f32,
    /// Depth the untilted orbit is centred on.
    pub depth_offset: f32,
    /// Displayed depth never exceeds this value.
    pub depth_clamp: f32,
}

impl OrbitParams {
    /// Replaces non-finite values and clamps the radius so sampling can never
    /// produce NaN or a degenerate orbit.
    pub fn sanitized(mut self) -> Self {
        if !self.radius.is_finite() || self.radius < MIN_ORBIT_RADIUS {
            log::debug!("orbit radius {} clamped to {}", self.radius, MIN_ORBIT_RADIUS);
            self.radius = MIN_ORBIT_RADIUS;
        }
        self.speed = finite_or(self.speed, 0.0);
        self.phase = finite_or(self.phase, 0.0);
        self.tilt = finite_or(self.tilt, 0.0);
        self.orbit_tilt = finite_or(self.orbit_tilt, 0.0);
        self.direction = if self.direction < 0.0 { -1.0 } else { 1.0 };
        self.depth_offset = finite_or(self.depth_offset, 0.0);
        self.depth_clamp = finite_or(self.depth_clamp, 0.0);
        self
    }

    fn path_time(&self, t: f32) -> f32 {
        t * self.speed * self.direction + self.phase
    }
}

/// Float-style wobble: a slow sinusoid that bobs the object vertically and
/// sways its orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatParams {
    pub speed: f32,
    pub float_intensity: f32,
    pub rotation_intensity: f32,
    /// Added to elapsed time so neighbours never bob in sync.
    pub phase: f32,
}

/// Bounded ambient motion used by particles, debris, shapes and nebula panels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftParams {
    /// Pivot of the owning group.
    pub anchor: Vec3,
    /// Rest position relative to `anchor`.
    pub base: Vec3,
    pub base_rotation: Quat,
    /// Angular velocity of the owning group, radians per second per axis.
    pub group_spin: Vec3,
    /// Group tilt per unit of pointer offset (x tilts about z, y about x).
    pub pointer_tilt: f32,
    pub float: FloatParams,
    /// Self rotation rates about x and y, radians per second.
    pub tumble: Vec2,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            anchor: Vec3::ZERO,
            base: Vec3::ZERO,
            base_rotation: Quat::IDENTITY,
            group_spin: Vec3::ZERO,
            pointer_tilt: 0.0,
            float: FloatParams::default(),
            tumble: Vec2::ZERO,
        }
    }
}

impl DriftParams {
    pub fn sanitized(mut self) -> Self {
        self.anchor = finite_vec3(self.anchor);
        self.base = finite_vec3(self.base);
        if !self.base_rotation.is_finite() {
            self.base_rotation = Quat::IDENTITY;
        }
        self.group_spin = finite_vec3(self.group_spin);
        self.pointer_tilt = finite_or(self.pointer_tilt, 0.0);
        self.float.speed = finite_or(self.float.speed, 0.0);
        self.float.float_intensity = finite_or(self.float.float_intensity, 0.0);
        self.float.rotation_intensity = finite_or(self.float.rotation_intensity, 0.0);
        self.float.phase = finite_or(self.float.phase, 0.0);
        self.tumble = Vec2::new(finite_or(self.tumble.x, 0.0), finite_or(self.tumble.y, 0.0));
        self
    }

    /// Largest distance the object can ever be from `anchor`.
    pub fn reach(&self) -> f32 {
        self.base.length() + self.float.float_intensity.abs() * 0.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPath {
    /// Figure-eight style path that tilts its plane about x and faces travel.
    WarmOrbit(OrbitParams),
    /// Elliptical path that tilts its plane about y.
    IceOrbit(OrbitParams),
    Drift(DriftParams),
}

impl MotionPath {
    pub fn sanitized(self) -> Self {
        match self {
            MotionPath::WarmOrbit(params) => MotionPath::WarmOrbit(params.sanitized()),
            MotionPath::IceOrbit(params) => MotionPath::IceOrbit(params.sanitized()),
            MotionPath::Drift(params) => MotionPath::Drift(params.sanitized()),
        }
    }
}

/// A procedurally parameterized background entity. Only the immutable
/// parameters live here; transforms are derived per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionObject {
    pub id: u32,
    pub class: MotionClass,
    pub path: MotionPath,
    pub color: Vec4,
    pub scale: f32,
    pub opacity: f32,
    pub shape: Option<ShapeKind>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub position: Vec3,
    pub rotation: Quat,
}

pub fn position(object: &MotionObject, t: f32) -> Vec3 {
    sample(object, t, Vec2::ZERO).position
}

pub fn rotation(object: &MotionObject, t: f32) -> Quat {
    sample(object, t, Vec2::ZERO).rotation
}

/// Evaluates the full transform of `object` at elapsed time `t` with the
/// pointer at `pointer` (normalized device coordinates).
pub fn sample(object: &MotionObject, t: f32, pointer: Vec2) -> MotionSample {
    let t = finite_or(t, 0.0);
    match &object.path {
        MotionPath::WarmOrbit(params) => {
            let time = params.path_time(t);
            let position = warm_orbit_point(params, time);
            let ahead = warm_orbit_point(params, time + HEADING_LOOKAHEAD * params.direction);
            MotionSample { position, rotation: look_rotation(position, ahead) }
        }
        MotionPath::IceOrbit(params) => {
            MotionSample { position: ice_orbit_point(params, params.path_time(t)), rotation: Quat::IDENTITY }
        }
        MotionPath::Drift(params) => drift_sample(params, t, pointer),
    }
}

fn warm_orbit_point(params: &OrbitParams, time: f32) -> Vec3 {
    let radius = params.radius;
    let x = time.cos() * radius;
    let y = (time * 0.7 + params.tilt).sin() * radius * 0.5;
    let z = time.sin() * radius * 0.5 + params.depth_offset;
    let (sin, cos) = params.orbit_tilt.sin_cos();
    let tilted_y = y * cos - z * sin;
    let tilted_z = y * sin + z * cos;
    Vec3::new(x, tilted_y, tilted_z.min(params.depth_clamp))
}

fn ice_orbit_point(params: &OrbitParams, time: f32) -> Vec3 {
    let radius = params.radius;
    let x = time.cos() * radius * 1.3;
    let y = (time * 1.2).sin() * radius * 0.4;
    let z = (time * 0.8).sin() * radius * 0.6 + params.depth_offset;
    let (sin, cos) = params.orbit_tilt.sin_cos();
    let tilted_x = x * cos + z * sin;
    let tilted_z = -x * sin + z * cos;
    Vec3::new(tilted_x, y, tilted_z.min(params.depth_clamp))
}

fn drift_sample(params: &DriftParams, t: f32, pointer: Vec2) -> MotionSample {
    let pointer = pointer.clamp(Vec2::splat(-1.0), Vec2::splat(1.0));
    let group = Quat::from_euler(
        EulerRot::XYZ,
        params.group_spin.x * t + pointer.y * params.pointer_tilt,
        params.group_spin.y * t,
        params.group_spin.z * t + pointer.x * params.pointer_tilt,
    );

    let float = &params.float;
    let wave = (t + float.phase) / 4.0 * float.speed;
    let (wave_sin, wave_cos) = wave.sin_cos();
    let wobble = Quat::from_euler(
        EulerRot::XYZ,
        wave_cos / 8.0 * float.rotation_intensity,
        wave_sin / 8.0 * float.rotation_intensity,
        wave_sin / 20.0 * float.rotation_intensity,
    );
    let bob = Vec3::Y * (wave_sin / 10.0 * float.float_intensity);

    let local = wobble * params.base + bob;
    let tumble = Quat::from_euler(EulerRot::XYZ, params.tumble.x * t, params.tumble.y * t, 0.0);
    MotionSample {
        position: params.anchor + group * local,
        rotation: (group * wobble * params.base_rotation * tumble).normalize(),
    }
}

/// Rotation whose +z axis points from `from` toward `to`; identity when the two
/// points coincide.
pub fn look_rotation(from: Vec3, to: Vec3) -> Quat {
    let forward = to - from;
    if forward.length_squared() <= f32::EPSILON {
        return Quat::IDENTITY;
    }
    let forward = forward.normalize();
    let reference = if forward.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    let right = reference.cross(forward).normalize();
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize()
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn finite_vec3(value: Vec3) -> Vec3 {
    if value.is_finite() {
        value
    } else {
        Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm(radius: f32, direction: f32) -> MotionObject {
        MotionObject {
            id: 0,
            class: MotionClass::WarmComet,
            path: MotionPath::WarmOrbit(
                OrbitParams {
                    radius,
                    speed: 0.2,
                    phase: 0.0,
                    tilt: 1.0,
                    orbit_tilt: 0.3,
                    direction,
                    depth_offset: -20.0,
                    depth_clamp: -15.0,
                }
                .sanitized(),
            ),
            color: Vec4::ONE,
            scale: 1.0,
            opacity: 1.0,
            shape: None,
        }
    }

    fn ice() -> MotionObject {
        MotionObject {
            path: MotionPath::IceOrbit(
                OrbitParams {
                    radius: 13.0,
                    speed: 0.25,
                    phase: 0.5,
                    tilt: 0.0,
                    orbit_tilt: 0.6,
                    direction: 1.0,
                    depth_offset: -18.0,
                    depth_clamp: -12.0,
                }
                .sanitized(),
            ),
            class: MotionClass::IceComet,
            ..warm(13.0, 1.0)
        }
    }

    fn drift() -> MotionObject {
        MotionObject {
            class: MotionClass::DebrisShape,
            path: MotionPath::Drift(DriftParams {
                base: Vec3::new(4.0, -2.0, -20.0),
                group_spin: Vec3::new(0.0, 0.015, 0.0),
                float: FloatParams { speed: 0.5, float_intensity: 0.4, rotation_intensity: 0.6, phase: 12.0 },
                tumble: Vec2::new(0.4, 0.24),
                ..DriftParams::default()
            }),
            ..warm(1.0, 1.0)
        }
    }

    #[test]
    fn warm_orbit_matches_reference_point() {
        let object = warm(14.0, 1.0);
        let p = position(&object, 0.0);
        // time = 0: x = r, y = sin(1) * r / 2, z = -20 before tilting.
        let y = 1.0_f32.sin() * 7.0;
        let z = -20.0_f32;
        let expected_y = y * 0.3_f32.cos() - z * 0.3_f32.sin();
        let expected_z = (y * 0.3_f32.sin() + z * 0.3_f32.cos()).min(-15.0);
        assert!((p.x - 14.0).abs() < 1e-4);
        assert!((p.y - expected_y).abs() < 1e-4);
        assert!((p.z - expected_z).abs() < 1e-4);
    }

    #[test]
    fn comets_never_cross_their_depth_clamp() {
        for object in [warm(18.0, 1.0), warm(20.0, -1.0), ice()] {
            let clamp = match object.path {
                MotionPath::WarmOrbit(p) | MotionPath::IceOrbit(p) => p.depth_clamp,
                MotionPath::Drift(_) => unreachable!(),
            };
            for step in 0..5_000 {
                let z = position(&object, step as f32 * 0.05).z;
                assert!(z <= clamp, "z {z} exceeded clamp {clamp}");
            }
        }
    }

    #[test]
    fn paths_are_continuous() {
        let dt = 1e-3;
        for object in [warm(16.0, 1.0), ice(), drift()] {
            for step in 0..2_000 {
                let t = step as f32 * 0.037;
                let a = position(&object, t);
                let b = position(&object, t + dt);
                assert!(a.distance(b) < 0.05, "{} jumped at t={t}: {a} -> {b}", object.class);
            }
        }
    }

    #[test]
    fn direction_sign_flips_angular_rate() {
        let clockwise = warm(12.0, 1.0);
        let counter = warm(12.0, -1.0);
        for t in [0.5_f32, 3.0, 17.25] {
            let a = position(&clockwise, t);
            let b = position(&counter, -t);
            assert!(a.distance(b) < 1e-4);
        }
    }

    #[test]
    fn degenerate_parameters_are_clamped() {
        let object = warm(-4.0, 0.0);
        match object.path {
            MotionPath::WarmOrbit(params) => {
                assert_eq!(params.radius, MIN_ORBIT_RADIUS);
                assert_eq!(params.direction, 1.0);
            }
            _ => unreachable!(),
        }
        let nan = MotionPath::IceOrbit(OrbitParams {
            radius: f32::NAN,
            speed: f32::INFINITY,
            phase: f32::NAN,
            tilt: 0.0,
            orbit_tilt: f32::NAN,
            direction: 1.0,
            depth_offset: -18.0,
            depth_clamp: -12.0,
        })
        .sanitized();
        let object = MotionObject { path: nan, ..ice() };
        let sample = sample(&object, 4.0, Vec2::ZERO);
        assert!(sample.position.is_finite());
        assert!(sample.rotation.is_finite());
    }

    #[test]
    fn drift_stays_within_reach() {
        let object = drift();
        let MotionPath::Drift(params) = object.path else { unreachable!() };
        let reach = params.reach() + 1e-3;
        for step in 0..4_000 {
            let p = position(&object, step as f32 * 0.25);
            assert!(p.distance(params.anchor) <= reach);
        }
    }

    #[test]
    fn warm_comet_faces_travel_direction() {
        let object = warm(14.0, 1.0);
        let MotionPath::WarmOrbit(params) = object.path else { unreachable!() };
        // pick a time where neither point is depth clamped
        let t = (0..400)
            .map(|step| step as f32 * 0.1)
            .find(|&t| {
                let time = params.path_time(t);
                warm_orbit_point(&params, time).z < params.depth_clamp - 1.0
                    && warm_orbit_point(&params, time + HEADING_LOOKAHEAD).z < params.depth_clamp - 1.0
            })
            .expect("unclamped sample");
        let here = position(&object, t);
        let ahead = warm_orbit_point(&params, params.path_time(t) + HEADING_LOOKAHEAD);
        let forward = rotation(&object, t) * Vec3::Z;
        assert!(forward.distance((ahead - here).normalize()) < 1e-3);
    }

    #[test]
    fn pointer_tilts_only_objects_that_opt_in() {
        let mut object = drift();
        let still = sample(&object, 2.0, Vec2::new(1.0, -1.0)).position;
        assert!(still.distance(position(&object, 2.0)) < 1e-6);
        if let MotionPath::Drift(params) = &mut object.path {
            params.pointer_tilt = 0.05;
        }
        let tilted = sample(&object, 2.0, Vec2::new(1.0, -1.0)).position;
        assert!(tilted.distance(position(&object, 2.0)) > 1e-3);
    }
}
