use bevy_ecs::prelude::{Component, Entity, Mut, With};

use crate::camera::Camera;
use crate::ecs::{EcsWorld, Transform3D};
use crate::scene::FrameContext;

/// Per-entity behaviour. Hooks run in ascending entity order.
pub trait Script: Send + Sync {
    fn on_spawn(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// `frame.dt` holds the frame's delta time in seconds.
    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _frame: &mut FrameContext<'_>) {}

    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) {}
}

#[derive(Component)]
pub struct ScriptComponent {
    script: Option<Box<dyn Script>>,
    spawned: bool,
}

impl ScriptComponent {
    pub fn new(script: impl Script + 'static) -> Self {
        Self { script: Some(Box::new(script)), spawned: false }
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }
}

pub struct ScriptContext<'w> {
    entity: Entity,
    ecs: &'w mut EcsWorld,
}

impl<'w> ScriptContext<'w> {
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn ecs(&mut self) -> &mut EcsWorld {
        &mut *self.ecs
    }

    pub fn transform_mut(&mut self) -> Option<Mut<'_, Transform3D>> {
        self.ecs.get_mut::<Transform3D>(self.entity)
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.ecs.camera_mut(self.entity)
    }

    pub fn despawn(&mut self) -> bool {
        self.ecs.despawn(self.entity)
    }
}

fn script_entities(ecs: &mut EcsWorld) -> Vec<Entity> {
    let mut query = ecs.world.query_filtered::<Entity, With<ScriptComponent>>();
    let mut entities: Vec<Entity> = query.iter(&ecs.world).collect();
    entities.sort_by_key(|entity| entity.index());
    entities
}

/// Scripts are taken out of the world while their hook runs so the hook can borrow the world.
fn take_script(ecs: &mut EcsWorld, entity: Entity) -> Option<(Box<dyn Script>, bool)> {
    let mut component = ecs.world.get_mut::<ScriptComponent>(entity)?;
    let script = component.script.take()?;
    Some((script, component.spawned))
}

fn put_back(ecs: &mut EcsWorld, entity: Entity, mut script: Box<dyn Script>, spawned: bool) {
    if let Some(mut component) = ecs.world.get_mut::<ScriptComponent>(entity) {
        component.script = Some(script);
        component.spawned = spawned;
        return;
    }
    // The entity went away during its own hook.
    if spawned {
        script.on_destroy(&mut ScriptContext { entity, ecs: &mut *ecs });
    }
}

pub(crate) fn spawn_scripts(ecs: &mut EcsWorld) {
    for entity in script_entities(ecs) {
        let Some((mut script, spawned)) = take_script(ecs, entity) else {
            continue;
        };
        if !spawned {
            script.on_spawn(&mut ScriptContext { entity, ecs: &mut *ecs });
        }
        put_back(ecs, entity, script, true);
    }
}

pub(crate) fn update_scripts(ecs: &mut EcsWorld, frame: &mut FrameContext<'_>) {
    for entity in script_entities(ecs) {
        let Some((mut script, spawned)) = take_script(ecs, entity) else {
            continue;
        };
        if !spawned {
            script.on_spawn(&mut ScriptContext { entity, ecs: &mut *ecs });
        }
        script.on_update(&mut ScriptContext { entity, ecs: &mut *ecs }, frame);
        put_back(ecs, entity, script, true);
    }
}

pub(crate) fn destroy_scripts(ecs: &mut EcsWorld) {
    for entity in script_entities(ecs) {
        let Some((mut script, spawned)) = take_script(ecs, entity) else {
            continue;
        };
        if spawned {
            script.on_destroy(&mut ScriptContext { entity, ecs: &mut *ecs });
        }
        put_back(ecs, entity, script, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_events::CustomEvents;
    use crate::input::InputState;
    use crate::triggers::TriggerMap;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Script for Recorder {
        fn on_spawn(&mut self, _ctx: &mut ScriptContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:spawn", self.tag));
        }

        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, frame: &mut FrameContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:update:{}", self.tag, frame.dt));
            if let Some(mut transform) = ctx.transform_mut() {
                transform.translation.x += frame.dt;
            }
        }

        fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:destroy", self.tag));
        }
    }

    struct SelfDestruct;

    impl Script for SelfDestruct {
        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, _frame: &mut FrameContext<'_>) {
            ctx.despawn();
        }
    }

    #[test]
    fn hooks_run_in_entity_order_and_late_scripts_spawn_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ecs = EcsWorld::new();
        let a = ecs.spawn_named("a");
        let b = ecs.spawn_named("b");
        ecs.insert(b, ScriptComponent::new(Recorder { tag: "b", log: log.clone() }));
        ecs.insert(a, ScriptComponent::new(Recorder { tag: "a", log: log.clone() }));
        spawn_scripts(&mut ecs);

        let c = ecs.spawn_named("c");
        ecs.insert(c, ScriptComponent::new(Recorder { tag: "c", log: log.clone() }));
        let input = InputState::new();
        let triggers = TriggerMap::new();
        let custom_events = CustomEvents::new();
        let mut frame = FrameContext::new(0.5, 1, &[], &input, &triggers, &custom_events);
        update_scripts(&mut ecs, &mut frame);
        destroy_scripts(&mut ecs);

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "a:spawn",
                "b:spawn",
                "a:update:0.5",
                "b:update:0.5",
                "c:spawn",
                "c:update:0.5",
                "a:destroy",
                "b:destroy",
                "c:destroy",
            ]
        );
        assert_eq!(ecs.get::<Transform3D>(a).expect("transform").translation.x, 0.5);
    }

    #[test]
    fn script_may_despawn_its_own_entity() {
        let mut ecs = EcsWorld::new();
        let doomed = ecs.spawn_named("doomed");
        ecs.insert(doomed, ScriptComponent::new(SelfDestruct));
        let input = InputState::new();
        let triggers = TriggerMap::new();
        let custom_events = CustomEvents::new();
        let mut frame = FrameContext::new(0.016, 1, &[], &input, &triggers, &custom_events);
        update_scripts(&mut ecs, &mut frame);
        assert!(!ecs.contains(doomed));
    }
}
