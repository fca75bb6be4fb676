use crate::custom_events::CustomEvents;
use crate::ecs::EcsWorld;
use crate::events::Event;
use crate::input::InputState;
use crate::scripts;
use crate::triggers::TriggerMap;

/// Scene-wide behaviour, the counterpart of per-entity scripts.
pub trait SceneLogic: Send {
    /// Builds the scene's entities. Runs once, when the scene becomes current.
    fn on_spawn(&mut self, _ecs: &mut EcsWorld) {}

    fn on_update(&mut self, _ecs: &mut EcsWorld, _frame: &mut FrameContext<'_>) {}

    fn on_destroy(&mut self, _ecs: &mut EcsWorld) {}
}

struct NoLogic;

impl SceneLogic for NoLogic {}

/// What logic and scripts see of the current frame, plus the requests they can make of the loop.
pub struct FrameContext<'a> {
    pub dt: f32,
    pub frame_index: u64,
    pub events: &'a [Event],
    pub input: &'a InputState,
    pub triggers: &'a TriggerMap,
    pub custom_events: &'a CustomEvents,
    scene_requests: Vec<Scene>,
    exit_requested: bool,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        dt: f32,
        frame_index: u64,
        events: &'a [Event],
        input: &'a InputState,
        triggers: &'a TriggerMap,
        custom_events: &'a CustomEvents,
    ) -> Self {
        Self {
            dt,
            frame_index,
            events,
            input,
            triggers,
            custom_events,
            scene_requests: Vec::new(),
            exit_requested: false,
        }
    }

    /// Queues a scene to replace the current one at the end of the frame.
    pub fn load_scene(&mut self, scene: Scene) {
        self.scene_requests.push(scene);
    }

    pub fn exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub(crate) fn into_requests(self) -> (Vec<Scene>, bool) {
        (self.scene_requests, self.exit_requested)
    }
}

pub struct Scene {
    name: String,
    ecs: EcsWorld,
    logic: Box<dyn SceneLogic>,
    spawned: bool,
}

impl Scene {
    pub fn new(name: impl Into<String>, logic: impl SceneLogic + 'static) -> Self {
        Self { name: name.into(), ecs: EcsWorld::new(), logic: Box::new(logic), spawned: false }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, NoLogic)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ecs(&self) -> &EcsWorld {
        &self.ecs
    }

    pub fn ecs_mut(&mut self) -> &mut EcsWorld {
        &mut self.ecs
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn spawn(&mut self) {
        if self.spawned {
            return;
        }
        self.spawned = true;
        log::debug!("spawning scene '{}'", self.name);
        self.logic.on_spawn(&mut self.ecs);
        scripts::spawn_scripts(&mut self.ecs);
    }

    pub fn update(&mut self, frame: &mut FrameContext<'_>) {
        self.logic.on_update(&mut self.ecs, frame);
        scripts::update_scripts(&mut self.ecs, frame);
    }

    /// Runs teardown hooks if the scene was ever spawned, then drops it.
    pub fn destroy(mut self) {
        if !self.spawned {
            log::debug!("dropping scene '{}' that never spawned", self.name);
            return;
        }
        log::debug!("destroying scene '{}'", self.name);
        scripts::destroy_scripts(&mut self.ecs);
        self.logic.on_destroy(&mut self.ecs);
        self.spawned = false;
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("spawned", &self.spawned)
            .field("entities", &self.ecs.entity_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Counting(Arc<Mutex<Vec<&'static str>>>);

    impl SceneLogic for Counting {
        fn on_spawn(&mut self, ecs: &mut EcsWorld) {
            ecs.spawn_named("root");
            self.0.lock().unwrap().push("spawn");
        }

        fn on_update(&mut self, _ecs: &mut EcsWorld, frame: &mut FrameContext<'_>) {
            self.0.lock().unwrap().push("update");
            frame.exit();
        }

        fn on_destroy(&mut self, _ecs: &mut EcsWorld) {
            self.0.lock().unwrap().push("destroy");
        }
    }

    #[test]
    fn spawn_is_idempotent_and_destroy_runs_teardown() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scene = Scene::new("level", Counting(log.clone()));
        scene.spawn();
        scene.spawn();
        assert_eq!(scene.ecs().entity_count(), 1);
        let input = InputState::new();
        let triggers = TriggerMap::new();
        let custom_events = CustomEvents::new();
        let mut frame = FrameContext::new(0.1, 0, &[], &input, &triggers, &custom_events);
        scene.update(&mut frame);
        assert!(frame.exit_requested());
        scene.destroy();
        assert_eq!(*log.lock().unwrap(), vec!["spawn", "update", "destroy"]);
    }

    #[test]
    fn unspawned_scene_skips_teardown() {
        let log = Arc::new(Mutex::new(Vec::new()));
        Scene::new("never", Counting(log.clone())).destroy();
        assert!(log.lock().unwrap().is_empty());
    }
}
