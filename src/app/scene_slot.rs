use crate::scene::Scene;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SceneSlotStats {
    pub requests: u64,
    pub swaps: u64,
    /// Pending scenes replaced by a newer request before they were ever installed.
    pub overwritten: u64,
}

/// Holds the current scene and at most one scene waiting to replace it.
///
/// Requests can arrive at any point in a frame; the swap itself only happens when the
/// scheduler calls [`SceneSlot::consume_pending`] at the frame boundary.
#[derive(Debug, Default)]
pub struct SceneSlot {
    current: Option<Scene>,
    next: Option<Scene>,
    stats: SceneSlotStats,
}

impl SceneSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_load(&mut self, scene: Scene) {
        self.stats.requests += 1;
        if let Some(previous) = self.next.replace(scene) {
            self.stats.overwritten += 1;
            log::debug!("scene '{}' replaced before it was installed", previous.name());
            previous.destroy();
        }
    }

    /// Installs the pending scene, tearing down the current one first. Returns whether a swap happened.
    pub fn consume_pending(&mut self) -> bool {
        let Some(mut next) = self.next.take() else {
            return false;
        };
        if let Some(old) = self.current.take() {
            log::info!("switching scene '{}' -> '{}'", old.name(), next.name());
            old.destroy();
        } else {
            log::info!("loading scene '{}'", next.name());
        }
        next.spawn();
        self.current = Some(next);
        self.stats.swaps += 1;
        true
    }

    pub fn current(&self) -> Option<&Scene> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Scene> {
        self.current.as_mut()
    }

    pub fn has_pending(&self) -> bool {
        self.next.is_some()
    }

    pub fn stats(&self) -> SceneSlotStats {
        self.stats
    }

    /// Drops any pending scene unspawned and tears down the current one.
    pub fn shutdown(&mut self) {
        if let Some(pending) = self.next.take() {
            pending.destroy();
        }
        if let Some(current) = self.current.take() {
            current.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EcsWorld;
    use crate::scene::SceneLogic;
    use std::sync::{Arc, Mutex};

    struct Tracked {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl SceneLogic for Tracked {
        fn on_spawn(&mut self, _ecs: &mut EcsWorld) {
            self.log.lock().unwrap().push(format!("{}:spawn", self.tag));
        }

        fn on_destroy(&mut self, _ecs: &mut EcsWorld) {
            self.log.lock().unwrap().push(format!("{}:destroy", self.tag));
        }
    }

    fn tracked(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Scene {
        Scene::new(tag, Tracked { tag, log: log.clone() })
    }

    #[test]
    fn consume_without_request_is_noop() {
        let mut slot = SceneSlot::new();
        assert!(!slot.consume_pending());
        assert!(slot.current().is_none());
        assert_eq!(slot.stats().swaps, 0);
    }

    #[test]
    fn swap_tears_down_old_before_spawning_new() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = SceneSlot::new();
        slot.request_load(tracked("a", &log));
        assert!(slot.current().is_none(), "requests are deferred");
        assert!(slot.consume_pending());
        slot.request_load(tracked("b", &log));
        assert_eq!(slot.current().map(Scene::name), Some("a"));
        assert!(slot.consume_pending());
        assert_eq!(slot.current().map(Scene::name), Some("b"));
        assert_eq!(*log.lock().unwrap(), vec!["a:spawn", "a:destroy", "b:spawn"]);
    }

    #[test]
    fn second_request_replaces_first_without_spawning_it() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = SceneSlot::new();
        slot.request_load(tracked("first", &log));
        slot.request_load(tracked("second", &log));
        assert!(slot.consume_pending());
        assert_eq!(slot.current().map(Scene::name), Some("second"));
        assert_eq!(*log.lock().unwrap(), vec!["second:spawn"]);
        assert_eq!(slot.stats(), SceneSlotStats { requests: 2, swaps: 1, overwritten: 1 });
    }

    #[test]
    fn shutdown_tears_down_current() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = SceneSlot::new();
        slot.request_load(tracked("a", &log));
        slot.consume_pending();
        slot.request_load(tracked("b", &log));
        slot.shutdown();
        assert!(slot.current().is_none());
        assert!(!slot.has_pending());
        assert_eq!(*log.lock().unwrap(), vec!["a:spawn", "a:destroy"]);
    }
}
