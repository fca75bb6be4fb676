use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use smallvec::SmallVec;

use crate::events::{Event, KeyCode, MouseCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerInput {
    Key(KeyCode),
    Mouse(MouseCode),
}

impl TriggerInput {
    pub fn from_name(raw: &str) -> Option<Self> {
        MouseCode::from_name(raw).map(TriggerInput::Mouse).or_else(|| KeyCode::from_name(raw).map(TriggerInput::Key))
    }

    fn from_event(event: &Event) -> Option<(Self, bool)> {
        match *event {
            Event::KeyPressed { key } => Some((TriggerInput::Key(key), true)),
            Event::KeyReleased { key } => Some((TriggerInput::Key(key), false)),
            Event::MousePressed { button } => Some((TriggerInput::Mouse(button), true)),
            Event::MouseReleased { button } => Some((TriggerInput::Mouse(button), false)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerChange {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
struct TriggerSlot {
    inputs: Vec<TriggerInput>,
    held: u32,
}

/// Named triggers that go active while any of their bound inputs is held.
#[derive(Debug, Clone, Default)]
pub struct TriggerMap {
    triggers: BTreeMap<String, TriggerSlot>,
    input_to_triggers: HashMap<TriggerInput, Vec<String>>,
    held_inputs: HashMap<TriggerInput, bool>,
    frame_changes: Vec<TriggerChange>,
}

#[derive(Debug, Deserialize)]
struct TriggerConfigFile {
    #[serde(default)]
    bindings: HashMap<String, Vec<String>>,
}

impl TriggerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_bindings() -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        for (name, keys) in [
            ("move_forward", &["w", "up"][..]),
            ("move_backward", &["s", "down"][..]),
            ("move_left", &["a", "left"][..]),
            ("move_right", &["d", "right"][..]),
            ("move_up", &["e"][..]),
            ("move_down", &["q"][..]),
            ("look", &["mouse_right"][..]),
            ("boost", &["left_shift"][..]),
            ("quit", &["escape"][..]),
        ] {
            map.insert(name.to_string(), keys.iter().map(|k| k.to_string()).collect());
        }
        map
    }

    pub fn with_defaults() -> Self {
        Self::from_bindings(&Self::default_bindings(), "defaults")
    }

    /// Unknown input names are skipped; a trigger left with no valid input is not registered.
    pub fn from_bindings(bindings: &HashMap<String, Vec<String>>, origin: &str) -> Self {
        let mut map = Self::new();
        let mut names: Vec<&String> = bindings.keys().collect();
        names.sort();
        for name in names {
            let trigger = name.trim().to_lowercase();
            let mut parsed = Vec::new();
            for raw in &bindings[name] {
                match TriggerInput::from_name(raw) {
                    Some(input) => parsed.push(input),
                    None => log::warn!("{origin}: unknown input '{raw}' for trigger '{name}', ignoring."),
                }
            }
            if parsed.is_empty() {
                log::warn!("{origin}: trigger '{name}' has no valid inputs, skipping.");
                continue;
            }
            for input in parsed {
                map.bind(&trigger, input);
            }
        }
        map
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let origin = path.display().to_string();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<TriggerConfigFile>(&contents) {
                Ok(config) => Self::from_bindings(&config.bindings, &origin),
                Err(err) => {
                    log::warn!("Failed to parse {origin}: {err}. Falling back to default triggers.");
                    Self::with_defaults()
                }
            },
            Err(err) => {
                log::warn!("Failed to read {origin}: {err}. Falling back to default triggers.");
                Self::with_defaults()
            }
        }
    }

    pub fn bind(&mut self, name: &str, input: TriggerInput) {
        let slot = self.triggers.entry(name.to_string()).or_default();
        if slot.inputs.contains(&input) {
            return;
        }
        slot.inputs.push(input);
        if self.held_inputs.get(&input).copied().unwrap_or(false) {
            slot.held += 1;
        }
        self.input_to_triggers.entry(input).or_default().push(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.triggers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.triggers.keys().map(String::as_str)
    }

    pub fn inputs(&self, name: &str) -> &[TriggerInput] {
        self.triggers.get(name).map(|slot| slot.inputs.as_slice()).unwrap_or(&[])
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.triggers.get(name).is_some_and(|slot| slot.held > 0)
    }

    pub fn begin_frame(&mut self) {
        self.frame_changes.clear();
    }

    /// Changes recorded since the last `begin_frame`, in event order.
    pub fn changes(&self) -> &[TriggerChange] {
        &self.frame_changes
    }

    pub fn went_active(&self, name: &str) -> bool {
        self.frame_changes.iter().any(|change| change.active && change.name == name)
    }

    pub fn apply(&mut self, event: &Event) -> SmallVec<[TriggerChange; 2]> {
        let mut changes = SmallVec::new();
        if matches!(event, Event::LostFocus) {
            self.release_all(&mut changes);
            self.frame_changes.extend(changes.iter().cloned());
            return changes;
        }
        let Some((input, pressed)) = TriggerInput::from_event(event) else {
            return changes;
        };
        let was_held = self.held_inputs.insert(input, pressed).unwrap_or(false);
        if was_held == pressed {
            return changes;
        }
        let Some(names) = self.input_to_triggers.get(&input) else {
            return changes;
        };
        for name in names {
            let Some(slot) = self.triggers.get_mut(name) else {
                continue;
            };
            if pressed {
                slot.held += 1;
                if slot.held == 1 {
                    changes.push(TriggerChange { name: name.clone(), active: true });
                }
            } else {
                slot.held = slot.held.saturating_sub(1);
                if slot.held == 0 {
                    changes.push(TriggerChange { name: name.clone(), active: false });
                }
            }
        }
        self.frame_changes.extend(changes.iter().cloned());
        changes
    }

    fn release_all(&mut self, changes: &mut SmallVec<[TriggerChange; 2]>) {
        self.held_inputs.clear();
        for (name, slot) in self.triggers.iter_mut() {
            if slot.held > 0 {
                slot.held = 0;
                changes.push(TriggerChange { name: name.clone(), active: false });
            }
        }
    }
}
