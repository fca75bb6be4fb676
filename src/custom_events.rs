use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::events::{Event, EventKind};

type Callback = Box<dyn FnMut(&Event) + Send>;

#[derive(Default)]
struct CustomEvent {
    kinds: SmallVec<[EventKind; 2]>,
    callbacks: Vec<Callback>,
}

/// One polled event that fired a custom event.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEventFiring {
    pub name: String,
    pub event: Event,
}

/// Named events raised whenever a polled event of one of their bound kinds arrives.
///
/// Unlike triggers, custom events carry no held state: every matching event fires them once,
/// runs their callbacks in binding order and is recorded for the rest of the frame.
#[derive(Default)]
pub struct CustomEvents {
    events: BTreeMap<String, CustomEvent>,
    frame_firings: Vec<CustomEventFiring>,
}

/// Chains inputs and callbacks onto one custom event.
pub struct CustomEventBinder<'a> {
    event: &'a mut CustomEvent,
}

impl<'a> CustomEventBinder<'a> {
    pub fn bind_input(self, kind: EventKind) -> Self {
        if !self.event.kinds.contains(&kind) {
            self.event.kinds.push(kind);
        }
        self
    }

    pub fn bind_callback(self, callback: impl FnMut(&Event) + Send + 'static) -> Self {
        self.event.callbacks.push(Box::new(callback));
        self
    }
}

impl CustomEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. An existing event of the same name is replaced.
    pub fn create(&mut self, name: &str) -> CustomEventBinder<'_> {
        let event = match self.events.entry(name.to_string()) {
            Entry::Vacant(vacant) => vacant.insert(CustomEvent::default()),
            Entry::Occupied(mut occupied) => {
                log::warn!("custom event '{name}' created twice; dropping its earlier bindings");
                occupied.insert(CustomEvent::default());
                occupied.into_mut()
            }
        };
        CustomEventBinder { event }
    }

    /// `None` for names that were never created.
    pub fn get(&mut self, name: &str) -> Option<CustomEventBinder<'_>> {
        self.events.get_mut(name).map(|event| CustomEventBinder { event })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn kinds(&self, name: &str) -> &[EventKind] {
        self.events.get(name).map(|event| event.kinds.as_slice()).unwrap_or(&[])
    }

    pub fn begin_frame(&mut self) {
        self.frame_firings.clear();
    }

    /// Fires every custom event bound to `event`'s kind, in name order. Returns how many fired.
    pub fn apply(&mut self, event: &Event) -> usize {
        let kind = event.kind();
        let mut fired = 0;
        for (name, custom) in self.events.iter_mut() {
            if !custom.kinds.contains(&kind) {
                continue;
            }
            fired += 1;
            self.frame_firings.push(CustomEventFiring { name: name.clone(), event: *event });
            for callback in custom.callbacks.iter_mut() {
                callback(event);
            }
        }
        fired
    }

    /// Firings recorded since the last `begin_frame`, in event order.
    pub fn firings(&self) -> &[CustomEventFiring] {
        &self.frame_firings
    }

    pub fn fired(&self, name: &str) -> bool {
        self.frame_firings.iter().any(|firing| firing.name == name)
    }

    pub fn fire_count(&self, name: &str) -> usize {
        self.frame_firings.iter().filter(|firing| firing.name == name).count()
    }
}

impl fmt::Debug for CustomEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings: BTreeMap<&str, (&[EventKind], usize)> = self
            .events
            .iter()
            .map(|(name, event)| (name.as_str(), (event.kinds.as_slice(), event.callbacks.len())))
            .collect();
        f.debug_struct("CustomEvents").field("events", &bindings).field("frame_firings", &self.frame_firings).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyCode;
    use std::sync::{Arc, Mutex};

    #[test]
    fn bound_kinds_fire_and_run_callbacks_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = CustomEvents::new();
        let first = seen.clone();
        let second = seen.clone();
        events
            .create("typed")
            .bind_input(EventKind::KeyPressed)
            .bind_callback(move |event| first.lock().unwrap().push(format!("a:{event}")))
            .bind_callback(move |_| second.lock().unwrap().push("b".to_string()));

        assert_eq!(events.apply(&Event::KeyPressed { key: KeyCode::Q }), 1);
        assert_eq!(events.apply(&Event::KeyReleased { key: KeyCode::Q }), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["a:KeyPressed key=Q".to_string(), "b".to_string()]);
        assert_eq!(
            events.firings(),
            &[CustomEventFiring { name: "typed".into(), event: Event::KeyPressed { key: KeyCode::Q } }]
        );
    }

    #[test]
    fn one_event_may_bind_several_kinds() {
        let mut events = CustomEvents::new();
        events.create("leave").bind_input(EventKind::Exit).bind_input(EventKind::LostFocus).bind_input(EventKind::Exit);
        assert_eq!(events.kinds("leave"), &[EventKind::Exit, EventKind::LostFocus]);
        events.apply(&Event::LostFocus);
        events.apply(&Event::Exit);
        assert_eq!(events.fire_count("leave"), 2);
        events.begin_frame();
        assert!(!events.fired("leave"));
        assert!(events.firings().is_empty());
    }

    #[test]
    fn shared_kind_fires_every_bound_event_in_name_order() {
        let mut events = CustomEvents::new();
        events.create("zoom").bind_input(EventKind::Scroll);
        events.create("any_input").bind_input(EventKind::Scroll);
        assert_eq!(events.apply(&Event::Scroll { x: 0.0, y: 1.0 }), 2);
        let names: Vec<&str> = events.firings().iter().map(|firing| firing.name.as_str()).collect();
        assert_eq!(names, ["any_input", "zoom"]);
    }

    #[test]
    fn unknown_names_are_empty() {
        let mut events = CustomEvents::new();
        assert!(events.get("missing").is_none());
        assert!(!events.contains("missing"));
        assert!(events.kinds("missing").is_empty());
        assert!(!events.fired("missing"));
        assert_eq!(events.apply(&Event::Exit), 0);
    }

    #[test]
    fn later_bindings_reach_an_existing_event_and_recreate_resets_it() {
        let mut events = CustomEvents::new();
        events.create("exit");
        events.get("exit").expect("created").bind_input(EventKind::Exit);
        assert_eq!(events.apply(&Event::Exit), 1);

        events.create("exit");
        assert!(events.kinds("exit").is_empty());
        assert_eq!(events.apply(&Event::Exit), 0);
    }
}
