use bitflags::bitflags;
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

const DEFAULT_UP: Vec3 = Vec3::Y;
const MIN_LOOK_DISTANCE: f32 = 1e-4;
/// Squared sine of the smallest angle between forward and up that still defines a basis.
const MIN_UP_SIN_SQUARED: f32 = 1e-6;

bitflags! {
    /// Which cached matrices are stale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const VIEW = 1 << 0;
        const PROJECTION = 1 << 1;
        const VIEW_PROJECTION = 1 << 2;
    }
}

impl DirtyFlags {
    const VIEW_CHANGED: Self = Self::VIEW.union(Self::VIEW_PROJECTION);
    const PROJECTION_CHANGED: Self = Self::PROJECTION.union(Self::VIEW_PROJECTION);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_y: f32, aspect: f32 },
    Orthographic { left: f32, right: f32, bottom: f32, top: f32 },
}

impl Projection {
    pub fn matrix(&self, near: f32, far: f32) -> Mat4 {
        debug_assert!(near != far, "camera near and far planes coincide");
        match *self {
            Projection::Perspective { fov_y, aspect } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic { left, right, bottom, top } => {
                Mat4::orthographic_rh(left, right, bottom, top, near, far)
            }
        }
    }
}

/// How the camera is placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rig {
    /// `rotation` holds pitch (x), yaw (y) and roll (z) in radians.
    FirstPerson { position: Vec3, rotation: Vec3 },
    LookAt { position: Vec3, target: Vec3, up: Vec3 },
}

impl Rig {
    pub fn view_matrix(&self) -> Mat4 {
        match *self {
            Rig::FirstPerson { position, rotation } => {
                Mat4::from_quat(euler_orientation(rotation).conjugate()) * Mat4::from_translation(-position)
            }
            Rig::LookAt { position, target, up } => {
                let forward = look_direction(position, target);
                Mat4::look_to_rh(position, forward, stable_up(forward, up))
            }
        }
    }

    pub fn position(&self) -> Vec3 {
        match *self {
            Rig::FirstPerson { position, .. } | Rig::LookAt { position, .. } => position,
        }
    }
}

fn euler_orientation(rotation: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z)
}

/// Unit direction from `position` to `target`, or -Z when the two coincide.
fn look_direction(position: Vec3, target: Vec3) -> Vec3 {
    (target - position).try_normalize().unwrap_or(Vec3::NEG_Z)
}

/// `up` itself unless it is (anti)parallel to the unit `forward`. Looking along the up axis
/// falls back to the up vector a camera pitched onto that axis would have.
fn stable_up(forward: Vec3, up: Vec3) -> Vec3 {
    let Some(up) = up.try_normalize() else {
        return stable_up(forward, DEFAULT_UP);
    };
    if forward.cross(up).length_squared() > MIN_UP_SIN_SQUARED {
        return up;
    }
    let pitched = if up.dot(DEFAULT_UP).abs() > 0.5 {
        Vec3::Z * forward.dot(DEFAULT_UP).signum()
    } else {
        Vec3::ZERO
    };
    if forward.cross(pitched).length_squared() > MIN_UP_SIN_SQUARED {
        pitched
    } else {
        forward.any_orthonormal_vector()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub view_computations: u64,
    pub projection_computations: u64,
    pub view_projection_computations: u64,
}

/// Cross-section shape of a view frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrustumShape {
    Perspective { tan_half_fov_y: f32, aspect: f32 },
    Orthographic { left: f32, right: f32, bottom: f32, top: f32 },
}

/// Snapshot of everything needed to partition a camera's view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    pub view: Mat4,
    pub near: f32,
    pub far: f32,
    pub shape: FrustumShape,
}

impl ViewFrustum {
    /// View-space rectangle (min, max) covered by the frustum at a positive depth.
    pub fn cross_section(&self, depth: f32) -> (Vec2, Vec2) {
        match self.shape {
            FrustumShape::Perspective { tan_half_fov_y, aspect } => {
                let half_height = depth * tan_half_fov_y;
                let half_width = half_height * aspect;
                (Vec2::new(-half_width, -half_height), Vec2::new(half_width, half_height))
            }
            FrustumShape::Orthographic { left, right, bottom, top } => {
                (Vec2::new(left, bottom), Vec2::new(right, top))
            }
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniformGpu {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub position_near: [f32; 4],
    pub forward_far: [f32; 4],
}

/// A camera whose view, projection and view-projection matrices are computed on demand
/// and reused until a mutator invalidates them.
#[derive(Debug, Clone)]
pub struct Camera {
    near: f32,
    far: f32,
    projection: Projection,
    rig: Rig,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    dirty: DirtyFlags,
    stats: CameraStats,
}

impl Camera {
    pub fn new(projection: Projection, rig: Rig, near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            projection,
            rig,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            dirty: DirtyFlags::all(),
            stats: CameraStats::default(),
        }
    }

    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(
            Projection::Perspective { fov_y, aspect },
            Rig::FirstPerson { position: Vec3::ZERO, rotation: Vec3::ZERO },
            near,
            far,
        )
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self::new(
            Projection::Orthographic { left, right, bottom, top },
            Rig::FirstPerson { position: Vec3::ZERO, rotation: Vec3::ZERO },
            near,
            far,
        )
    }

    pub fn first_person(position: Vec3, rotation: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::perspective(fov_y, aspect, near, far).with_rig(Rig::FirstPerson { position, rotation })
    }

    pub fn looking_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::perspective(fov_y, aspect, near, far).with_rig(Rig::LookAt {
            position: eye,
            target,
            up: DEFAULT_UP,
        })
    }

    pub fn with_rig(mut self, rig: Rig) -> Self {
        self.rig = rig;
        self.dirty |= DirtyFlags::VIEW_CHANGED;
        self
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn projection_kind(&self) -> Projection {
        self.projection
    }

    pub fn rig(&self) -> Rig {
        self.rig
    }

    pub fn position(&self) -> Vec3 {
        self.rig.position()
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn stats(&self) -> CameraStats {
        self.stats
    }

    pub fn view(&mut self) -> Mat4 {
        if self.dirty.contains(DirtyFlags::VIEW) {
            self.view_matrix = self.rig.view_matrix();
            self.dirty.remove(DirtyFlags::VIEW);
            self.stats.view_computations += 1;
        }
        self.view_matrix
    }

    pub fn projection(&mut self) -> Mat4 {
        if self.dirty.contains(DirtyFlags::PROJECTION) {
            self.projection_matrix = self.projection.matrix(self.near, self.far);
            self.dirty.remove(DirtyFlags::PROJECTION);
            self.stats.projection_computations += 1;
        }
        self.projection_matrix
    }

    pub fn view_projection(&mut self) -> Mat4 {
        if self.dirty.intersects(DirtyFlags::VIEW | DirtyFlags::PROJECTION) {
            self.dirty.insert(DirtyFlags::VIEW_PROJECTION);
        }
        let projection = self.projection();
        let view = self.view();
        if self.dirty.contains(DirtyFlags::VIEW_PROJECTION) {
            self.view_projection_matrix = projection * view;
            self.dirty.remove(DirtyFlags::VIEW_PROJECTION);
            self.stats.view_projection_computations += 1;
        }
        self.view_projection_matrix
    }

    pub fn forward(&mut self) -> Vec3 {
        self.view().inverse().transform_vector3(Vec3::NEG_Z).normalize()
    }

    pub fn up(&mut self) -> Vec3 {
        self.view().inverse().transform_vector3(Vec3::Y).normalize()
    }

    pub fn right(&mut self) -> Vec3 {
        self.view().inverse().transform_vector3(Vec3::X).normalize()
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
        self.dirty |= DirtyFlags::PROJECTION_CHANGED;
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
        self.dirty |= DirtyFlags::PROJECTION_CHANGED;
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.dirty |= DirtyFlags::PROJECTION_CHANGED;
    }

    /// Perspective only.
    pub fn set_fov_y(&mut self, fov_y: f32) {
        if let Projection::Perspective { aspect, .. } = self.projection {
            self.set_projection(Projection::Perspective { fov_y, aspect });
        }
    }

    /// Orthographic cameras keep their vertical extent and re-fit the horizontal one.
    pub fn set_aspect(&mut self, aspect: f32) {
        match self.projection {
            Projection::Perspective { fov_y, .. } => {
                self.set_projection(Projection::Perspective { fov_y, aspect });
            }
            Projection::Orthographic { left, right, bottom, top } => {
                let center = (left + right) * 0.5;
                let half_width = (top - bottom) * 0.5 * aspect;
                self.set_projection(Projection::Orthographic {
                    left: center - half_width,
                    right: center + half_width,
                    bottom,
                    top,
                });
            }
        }
    }

    /// Orthographic only.
    pub fn set_ortho_bounds(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        if matches!(self.projection, Projection::Orthographic { .. }) {
            self.set_projection(Projection::Orthographic { left, right, bottom, top });
        }
    }

    pub fn set_position(&mut self, new_position: Vec3) {
        match &mut self.rig {
            Rig::FirstPerson { position, .. } => *position = new_position,
            Rig::LookAt { position, target, .. } => {
                *target += new_position - *position;
                *position = new_position;
            }
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    /// Moves the camera by a world-space offset; look-at rigs carry their target along.
    pub fn translate(&mut self, delta: Vec3) {
        let position = self.rig.position();
        self.set_position(position + delta);
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        match &mut self.rig {
            Rig::FirstPerson { rotation: current, .. } => *current = rotation,
            Rig::LookAt { position, target, up } => {
                let orientation = euler_orientation(rotation);
                let distance = position.distance(*target).max(MIN_LOOK_DISTANCE);
                *target = *position + orientation * Vec3::NEG_Z * distance;
                *up = orientation * Vec3::Y;
            }
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    pub fn add_yaw(&mut self, radians: f32) {
        match &mut self.rig {
            Rig::FirstPerson { rotation, .. } => rotation.y += radians,
            Rig::LookAt { position, target, up } => {
                let axis = stable_up(look_direction(*position, *target), *up);
                let turn = Quat::from_axis_angle(axis, radians);
                *target = *position + turn * (*target - *position);
            }
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    pub fn add_pitch(&mut self, radians: f32) {
        match &mut self.rig {
            Rig::FirstPerson { rotation, .. } => rotation.x += radians,
            Rig::LookAt { position, target, up } => {
                let forward = *target - *position;
                let direction = look_direction(*position, *target);
                let stable = stable_up(direction, *up);
                let turn = Quat::from_axis_angle(direction.cross(stable).normalize(), radians);
                *target = *position + turn * forward;
                *up = turn * stable;
            }
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    pub fn add_roll(&mut self, radians: f32) {
        match &mut self.rig {
            Rig::FirstPerson { rotation, .. } => rotation.z += radians,
            Rig::LookAt { position, target, up } => {
                let direction = look_direction(*position, *target);
                *up = Quat::from_axis_angle(-direction, radians) * stable_up(direction, *up);
            }
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    /// Points the camera at `point`. First-person rigs drop any roll.
    pub fn look_at(&mut self, point: Vec3) {
        match &mut self.rig {
            Rig::FirstPerson { position, rotation } => {
                let Some(dir) = (point - *position).try_normalize() else {
                    return;
                };
                *rotation = Vec3::new(dir.y.clamp(-1.0, 1.0).asin(), (-dir.x).atan2(-dir.z), 0.0);
            }
            Rig::LookAt { target, .. } => *target = point,
        }
        self.dirty |= DirtyFlags::VIEW_CHANGED;
    }

    pub fn frustum(&mut self) -> ViewFrustum {
        let shape = match self.projection {
            Projection::Perspective { fov_y, aspect } => {
                FrustumShape::Perspective { tan_half_fov_y: (fov_y * 0.5).tan(), aspect }
            }
            Projection::Orthographic { left, right, bottom, top } => {
                FrustumShape::Orthographic { left, right, bottom, top }
            }
        };
        ViewFrustum { view: self.view(), near: self.near, far: self.far, shape }
    }

    pub fn uniform(&mut self) -> CameraUniformGpu {
        let view_projection = self.view_projection();
        let forward = self.forward();
        let position = self.position();
        CameraUniformGpu {
            view: self.view_matrix.to_cols_array_2d(),
            projection: self.projection_matrix.to_cols_array_2d(),
            view_projection: view_projection.to_cols_array_2d(),
            position_near: [position.x, position.y, position.z, self.near],
            forward_far: [forward.x, forward.y, forward.z, self.far],
        }
    }
}
