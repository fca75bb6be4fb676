use bevy_ecs::prelude::With;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::Camera;
use crate::ecs::{EcsWorld, LightComponent, Transform3D};
use crate::scene::{FrameContext, Scene, SceneLogic};
use crate::scripts::{Script, ScriptComponent, ScriptContext};

#[derive(Debug, Clone, Copy)]
pub struct DemoSettings {
    pub seed: u64,
    pub light_count: usize,
    /// Lights are scattered over `[-extent, extent]` on X and Z.
    pub extent: f32,
    /// Radians per second the light field turns about the Y axis.
    pub orbit_speed: f32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self { seed: 0x5eed_1e55, light_count: 96, extent: 24.0, orbit_speed: 0.15 }
    }
}

/// Free-flying camera steered by the `move_*`, `look` and `boost` triggers.
#[derive(Debug, Clone, Copy)]
pub struct FlyCamera {
    pub speed: f32,
    pub boost: f32,
    pub look_sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self { speed: 6.0, boost: 4.0, look_sensitivity: 0.003 }
    }
}

impl Script for FlyCamera {
    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, frame: &mut FrameContext<'_>) {
        let triggers = frame.triggers;
        let axis = |positive: &str, negative: &str| {
            (triggers.is_active(positive) as i32 - triggers.is_active(negative) as i32) as f32
        };
        let forward_axis = axis("move_forward", "move_backward");
        let right_axis = axis("move_right", "move_left");
        let up_axis = axis("move_up", "move_down");
        let looking = triggers.is_active("look");
        let (dx, dy) = frame.input.mouse_delta();
        let speed = if triggers.is_active("boost") { self.speed * self.boost } else { self.speed };
        let Some(camera) = ctx.camera_mut() else {
            return;
        };
        if looking && (dx != 0.0 || dy != 0.0) {
            camera.add_yaw(-dx as f32 * self.look_sensitivity);
            camera.add_pitch(-dy as f32 * self.look_sensitivity);
        }
        if forward_axis == 0.0 && right_axis == 0.0 && up_axis == 0.0 {
            return;
        }
        let direction = camera.forward() * forward_axis + camera.right() * right_axis + Vec3::Y * up_axis;
        camera.translate(direction.normalize_or_zero() * speed * frame.dt);
    }
}

/// A first-person camera over a randomly lit field, for exercising the cluster path end to end.
pub struct DemoScene {
    settings: DemoSettings,
}

impl DemoScene {
    pub fn new(settings: DemoSettings) -> Self {
        Self { settings }
    }
}

impl SceneLogic for DemoScene {
    fn on_spawn(&mut self, ecs: &mut EcsWorld) {
        let camera = Camera::first_person(
            Vec3::new(0.0, 3.0, self.settings.extent * 0.5),
            Vec3::new(-0.15, 0.0, 0.0),
            60f32.to_radians(),
            16.0 / 9.0,
            0.1,
            self.settings.extent * 4.0,
        );
        let camera_entity = ecs.spawn_camera("main_camera", camera);
        ecs.insert(camera_entity, ScriptComponent::new(FlyCamera::default()));

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let extent = self.settings.extent;
        for index in 0..self.settings.light_count {
            let position = Vec3::new(rng.gen_range(-extent..extent), rng.gen_range(0.5..4.0), rng.gen_range(-extent..extent));
            let color = Vec3::new(rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0));
            let range = rng.gen_range(2.0..8.0);
            let light = if index % 4 == 3 {
                LightComponent::spot(color, 4.0, range * 1.5, Vec3::NEG_Y, 0.3, 0.5)
            } else {
                LightComponent::point(color, 2.0, range)
            };
            ecs.spawn_light(&format!("light_{index}"), position, light);
        }
        log::info!("demo scene spawned {} light(s), seed {:#x}", self.settings.light_count, self.settings.seed);
    }

    fn on_update(&mut self, ecs: &mut EcsWorld, frame: &mut FrameContext<'_>) {
        if frame.triggers.went_active("quit") {
            frame.exit();
            return;
        }
        let turn = Quat::from_rotation_y(self.settings.orbit_speed * frame.dt);
        let mut lights = ecs.world.query_filtered::<&mut Transform3D, With<LightComponent>>();
        for mut transform in lights.iter_mut(&mut ecs.world) {
            transform.translation = turn * transform.translation;
        }
    }
}

pub fn demo_scene(settings: DemoSettings) -> Scene {
    Scene::new("demo", DemoScene::new(settings))
}
