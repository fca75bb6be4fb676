use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::camera::Camera;
use crate::renderer::light_clusters::LightVolume;

// ---------- Components ----------
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Component, Clone, Debug)]
pub struct CameraComponent {
    pub camera: Camera,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Point,
    /// `direction` is in the owning entity's local space; angles are half-angles in radians.
    Spot { direction: Vec3, inner_angle: f32, outer_angle: f32 },
}

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct LightComponent {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub enabled: bool,
}

impl LightComponent {
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self { kind: LightKind::Point, color, intensity, range, enabled: true }
    }

    pub fn spot(color: Vec3, intensity: f32, range: f32, direction: Vec3, inner_angle: f32, outer_angle: f32) -> Self {
        Self { kind: LightKind::Spot { direction, inner_angle, outer_angle }, color, intensity, range, enabled: true }
    }
}

/// A light resolved to world space for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub kind: LightKind,
}

impl SceneLight {
    pub fn resolve(light: &LightComponent, transform: &Transform3D) -> Self {
        let direction = match light.kind {
            LightKind::Point => Vec3::NEG_Z,
            LightKind::Spot { direction, .. } => (transform.rotation * direction).normalize_or_zero(),
        };
        Self {
            position: transform.translation,
            direction,
            color: light.color,
            intensity: light.intensity,
            range: light.range,
            kind: light.kind,
        }
    }

    /// Smallest sphere holding the light's reach. Spots use the bounding sphere of their cone.
    pub fn volume(&self) -> LightVolume {
        match self.kind {
            LightKind::Point => LightVolume::new(self.position, self.range),
            LightKind::Spot { outer_angle, .. } => {
                let (sin, cos) = outer_angle.sin_cos();
                if outer_angle >= FRAC_PI_2 {
                    // The cone reaches behind its apex.
                    LightVolume::new(self.position, self.range)
                } else if outer_angle > FRAC_PI_4 {
                    LightVolume::new(self.position + self.direction * (self.range * cos), self.range * sin)
                } else {
                    let radius = self.range / (2.0 * cos);
                    LightVolume::new(self.position + self.direction * radius, radius)
                }
            }
        }
    }
}

// ---------- World container ----------
pub struct EcsWorld {
    pub world: World,
}

impl Default for EcsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl EcsWorld {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    pub fn spawn_named(&mut self, name: &str) -> Entity {
        self.world.spawn((Name(name.to_string()), Transform3D::default())).id()
    }

    pub fn spawn_camera(&mut self, name: &str, camera: Camera) -> Entity {
        let entity = self.spawn_named(name);
        self.world.entity_mut(entity).insert(CameraComponent { camera, active: true });
        entity
    }

    pub fn spawn_light(&mut self, name: &str, translation: Vec3, light: LightComponent) -> Entity {
        let entity = self.spawn_named(name);
        self.world.entity_mut(entity).insert((Transform3D::from_translation(translation), light));
        entity
    }

    pub fn insert<B: Bundle>(&mut self, entity: Entity, bundle: B) -> bool {
        match self.world.get_entity_mut(entity) {
            Ok(mut entity_mut) => {
                entity_mut.insert(bundle);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<Mut<'_, T>> {
        self.world.get_mut::<T>(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    /// Lowest entity carrying `name`.
    pub fn find_by_name(&mut self, name: &str) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &Name)>();
        query.iter(&self.world).filter(|(_, n)| n.0 == name).map(|(entity, _)| entity).min_by_key(|e| e.index())
    }

    pub fn camera_mut(&mut self, entity: Entity) -> Option<&mut Camera> {
        self.world.get_mut::<CameraComponent>(entity).map(|component| &mut component.into_inner().camera)
    }

    /// Lowest entity with an active camera.
    pub fn active_camera(&mut self) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &CameraComponent)>();
        query.iter(&self.world).filter(|(_, c)| c.active).map(|(entity, _)| entity).min_by_key(|e| e.index())
    }

    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        let entity = self.active_camera()?;
        self.camera_mut(entity)
    }

    pub fn set_viewport_aspect(&mut self, aspect: f32) {
        let mut query = self.world.query::<&mut CameraComponent>();
        for mut component in query.iter_mut(&mut self.world) {
            component.camera.set_aspect(aspect);
        }
    }

    /// Enabled lights in ascending entity order, so light indices are stable frame to frame.
    pub fn collect_lights(&mut self, out: &mut Vec<SceneLight>) {
        out.clear();
        let mut query = self.world.query::<(Entity, &LightComponent, &Transform3D)>();
        let mut found: Vec<(Entity, SceneLight)> = query
            .iter(&self.world)
            .filter(|(_, light, _)| light.enabled)
            .map(|(entity, light, transform)| (entity, SceneLight::resolve(light, transform)))
            .collect();
        found.sort_by_key(|(entity, _)| entity.index());
        out.extend(found.into_iter().map(|(_, light)| light));
    }
}
