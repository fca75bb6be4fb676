use std::collections::{BTreeSet, VecDeque};

use crate::events::{Event, KeyCode, MouseCode};

/// Key/button action codes as delivered by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Release,
    Press,
    Repeat,
}

impl KeyAction {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(KeyAction::Release),
            1 => Some(KeyAction::Press),
            2 => Some(KeyAction::Repeat),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            KeyAction::Release => 0,
            KeyAction::Press => 1,
            KeyAction::Repeat => 2,
        }
    }
}

/// The windowing callback set, carrying only raw integer/double parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawCallback {
    Key { key: i32, scancode: i32, action: i32, mods: i32 },
    MouseButton { button: i32, action: i32, mods: i32 },
    CursorPos { x: f64, y: f64 },
    /// `x`/`y` is the OS cursor position at the time of the crossing.
    CursorEnter { entered: bool, x: f64, y: f64 },
    Scroll { x: f64, y: f64 },
    WindowSize { width: i32, height: i32 },
    Focus { focused: bool },
    WindowClose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub callbacks: u64,
    pub emitted: u64,
    pub dropped_repeats: u64,
    pub unmapped_codes: u64,
    pub coalesced_resizes: u64,
    pub discarded_unread: u64,
}

/// Converts raw windowing callbacks into an ordered, frame-local event queue.
#[derive(Debug)]
pub struct EventBridge {
    queue: VecDeque<Event>,
    key_repeat: bool,
    size: (u32, u32),
    cursor: (f64, f64),
    cursor_visible: bool,
    stats: BridgeStats,
}

impl EventBridge {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            key_repeat: false,
            size: (width, height),
            cursor: (0.0, 0.0),
            cursor_visible: true,
            stats: BridgeStats::default(),
        }
    }

    pub fn with_key_repeat(mut self, enabled: bool) -> Self {
        self.key_repeat = enabled;
        self
    }

    pub fn key_repeat(&self) -> bool {
        self.key_repeat
    }

    pub fn set_key_repeat(&mut self, enabled: bool) {
        self.key_repeat = enabled;
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn cursor(&self) -> (f64, f64) {
        self.cursor
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drops whatever the previous cycle left unread. Called before the window pumps.
    pub fn begin_frame(&mut self) {
        if !self.queue.is_empty() {
            log::trace!("dropping {} unread event(s) from the previous frame", self.queue.len());
            self.stats.discarded_unread += self.queue.len() as u64;
            self.queue.clear();
        }
    }

    /// Hands out every event pushed since the last poll, oldest first.
    pub fn poll(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }

    /// Showing the cursor again resyncs the delta reference to where the OS reports it,
    /// so the next move does not produce a jump.
    pub fn set_cursor_visible(&mut self, visible: bool, os_cursor: (f64, f64)) {
        if visible && !self.cursor_visible {
            self.cursor = os_cursor;
        }
        self.cursor_visible = visible;
    }

    pub fn push(&mut self, raw: RawCallback) {
        self.stats.callbacks += 1;
        match raw {
            RawCallback::Key { key, action, .. } => self.push_key(key, action),
            RawCallback::MouseButton { button, action, .. } => self.push_mouse_button(button, action),
            RawCallback::CursorPos { x, y } => {
                let (dx, dy) = (x - self.cursor.0, y - self.cursor.1);
                self.cursor = (x, y);
                self.emit(Event::MouseMoved { x, y, dx, dy });
            }
            RawCallback::CursorEnter { entered, x, y } => {
                self.cursor = (x, y);
                if entered {
                    self.emit(Event::MouseEntered { x, y });
                } else {
                    self.emit(Event::MouseLeft { x, y });
                }
            }
            RawCallback::Scroll { x, y } => self.emit(Event::Scroll { x, y }),
            RawCallback::WindowSize { width, height } => {
                let size = (width.max(0) as u32, height.max(0) as u32);
                if size == self.size {
                    self.stats.coalesced_resizes += 1;
                    return;
                }
                self.size = size;
                self.emit(Event::WindowResized { width: size.0, height: size.1 });
            }
            RawCallback::Focus { focused } => {
                self.emit(if focused { Event::GainedFocus } else { Event::LostFocus });
            }
            RawCallback::WindowClose => self.emit(Event::Exit),
        }
    }

    fn push_key(&mut self, raw_key: i32, raw_action: i32) {
        let Some(key) = KeyCode::from_raw(raw_key) else {
            self.stats.unmapped_codes += 1;
            return;
        };
        match KeyAction::from_raw(raw_action) {
            Some(KeyAction::Press) => self.emit(Event::KeyPressed { key }),
            Some(KeyAction::Repeat) if self.key_repeat => self.emit(Event::KeyPressed { key }),
            Some(KeyAction::Repeat) => self.stats.dropped_repeats += 1,
            Some(KeyAction::Release) => self.emit(Event::KeyReleased { key }),
            None => self.stats.unmapped_codes += 1,
        }
    }

    fn push_mouse_button(&mut self, raw_button: i32, raw_action: i32) {
        let Some(button) = MouseCode::from_raw(raw_button) else {
            self.stats.unmapped_codes += 1;
            return;
        };
        match KeyAction::from_raw(raw_action) {
            Some(KeyAction::Press) => self.emit(Event::MousePressed { button }),
            Some(KeyAction::Release) => self.emit(Event::MouseReleased { button }),
            Some(KeyAction::Repeat) | None => self.stats.unmapped_codes += 1,
        }
    }

    fn emit(&mut self, event: Event) {
        self.stats.emitted += 1;
        self.queue.push_back(event);
    }
}

/// Held keys and buttons plus per-frame pointer accumulation, fed from polled events.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: BTreeSet<KeyCode>,
    buttons: BTreeSet<MouseCode>,
    cursor: Option<(f64, f64)>,
    mouse_delta: (f64, f64),
    scroll: (f64, f64),
    focused: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self { focused: true, ..Self::default() }
    }

    pub fn begin_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.scroll = (0.0, 0.0);
    }

    pub fn apply(&mut self, event: &Event) {
        match *event {
            Event::KeyPressed { key } => {
                self.keys.insert(key);
            }
            Event::KeyReleased { key } => {
                self.keys.remove(&key);
            }
            Event::MousePressed { button } => {
                self.buttons.insert(button);
            }
            Event::MouseReleased { button } => {
                self.buttons.remove(&button);
            }
            Event::MouseMoved { x, y, dx, dy } => {
                self.cursor = Some((x, y));
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 += dy;
            }
            Event::MouseEntered { x, y } => self.cursor = Some((x, y)),
            Event::MouseLeft { .. } => self.cursor = None,
            Event::Scroll { x, y } => {
                self.scroll.0 += x;
                self.scroll.1 += y;
            }
            Event::GainedFocus => self.focused = true,
            Event::LostFocus => {
                // Releases are not delivered to an unfocused window.
                self.focused = false;
                self.keys.clear();
                self.buttons.clear();
            }
            Event::WindowResized { .. } | Event::Exit => {}
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseCode) -> bool {
        self.buttons.contains(&button)
    }

    pub fn cursor_position(&self) -> Option<(f64, f64)> {
        self.cursor
    }

    pub fn mouse_delta(&self) -> (f64, f64) {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> (f64, f64) {
        self.scroll
    }

    pub fn focused(&self) -> bool {
        self.focused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_W: i32 = 87;

    fn key(action: KeyAction) -> RawCallback {
        RawCallback::Key { key: KEY_W, scancode: 17, action: action.to_raw(), mods: 0 }
    }

    #[test]
    fn identical_resizes_emit_one_event() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::WindowSize { width: 1024, height: 768 });
        bridge.push(RawCallback::WindowSize { width: 1024, height: 768 });
        assert_eq!(bridge.poll(), vec![Event::WindowResized { width: 1024, height: 768 }]);
        assert_eq!(bridge.stats().coalesced_resizes, 1);
    }

    #[test]
    fn resize_to_initial_size_is_coalesced() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::WindowSize { width: 800, height: 600 });
        assert!(bridge.poll().is_empty());
    }

    #[test]
    fn repeat_is_dropped_unless_enabled() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(key(KeyAction::Repeat));
        assert!(bridge.poll().is_empty());
        assert_eq!(bridge.stats().dropped_repeats, 1);

        bridge.set_key_repeat(true);
        bridge.push(key(KeyAction::Repeat));
        assert_eq!(bridge.poll(), vec![Event::KeyPressed { key: KeyCode::W }]);
    }

    #[test]
    fn unmapped_codes_are_silently_dropped() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::Key { key: -1, scancode: 0, action: 1, mods: 0 });
        bridge.push(RawCallback::MouseButton { button: 12, action: 1, mods: 0 });
        assert!(bridge.poll().is_empty());
        assert_eq!(bridge.stats().unmapped_codes, 2);
    }

    #[test]
    fn poll_preserves_arrival_order_and_clears() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(key(KeyAction::Press));
        bridge.push(RawCallback::Scroll { x: 0.0, y: 1.0 });
        bridge.push(RawCallback::Focus { focused: false });
        bridge.push(key(KeyAction::Release));
        bridge.push(RawCallback::WindowClose);
        assert_eq!(
            bridge.poll(),
            vec![
                Event::KeyPressed { key: KeyCode::W },
                Event::Scroll { x: 0.0, y: 1.0 },
                Event::LostFocus,
                Event::KeyReleased { key: KeyCode::W },
                Event::Exit,
            ]
        );
        assert!(bridge.poll().is_empty());
    }

    #[test]
    fn begin_frame_discards_unread_events() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(key(KeyAction::Press));
        bridge.begin_frame();
        assert!(bridge.poll().is_empty());
        assert_eq!(bridge.stats().discarded_unread, 1);
    }

    #[test]
    fn mouse_moves_carry_delta_from_previous_position() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::CursorPos { x: 10.0, y: 20.0 });
        bridge.push(RawCallback::CursorPos { x: 15.0, y: 18.0 });
        let events = bridge.poll();
        assert_eq!(events[1], Event::MouseMoved { x: 15.0, y: 18.0, dx: 5.0, dy: -2.0 });
    }

    #[test]
    fn cursor_enter_resyncs_reference_position() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::CursorEnter { entered: true, x: 300.0, y: 200.0 });
        bridge.push(RawCallback::CursorPos { x: 301.0, y: 200.0 });
        let events = bridge.poll();
        assert_eq!(events[0], Event::MouseEntered { x: 300.0, y: 200.0 });
        assert_eq!(events[1], Event::MouseMoved { x: 301.0, y: 200.0, dx: 1.0, dy: 0.0 });
    }

    #[test]
    fn showing_cursor_prevents_spurious_jump() {
        let mut bridge = EventBridge::new(800, 600);
        bridge.push(RawCallback::CursorPos { x: 100.0, y: 100.0 });
        bridge.set_cursor_visible(false, (100.0, 100.0));
        bridge.set_cursor_visible(true, (640.0, 360.0));
        bridge.push(RawCallback::CursorPos { x: 642.0, y: 360.0 });
        let events = bridge.poll();
        assert_eq!(events[1], Event::MouseMoved { x: 642.0, y: 360.0, dx: 2.0, dy: 0.0 });
    }

    #[test]
    fn input_state_tracks_held_keys_and_clears_on_focus_loss() {
        let mut state = InputState::new();
        state.apply(&Event::KeyPressed { key: KeyCode::W });
        state.apply(&Event::MousePressed { button: MouseCode::Left });
        assert!(state.is_key_pressed(KeyCode::W));
        assert!(state.is_mouse_pressed(MouseCode::Left));
        state.apply(&Event::LostFocus);
        assert!(!state.is_key_pressed(KeyCode::W));
        assert!(!state.is_mouse_pressed(MouseCode::Left));
        assert!(!state.focused());
    }

    #[test]
    fn input_state_accumulates_deltas_per_frame() {
        let mut state = InputState::new();
        state.apply(&Event::MouseMoved { x: 1.0, y: 1.0, dx: 1.0, dy: 1.0 });
        state.apply(&Event::MouseMoved { x: 3.0, y: 0.0, dx: 2.0, dy: -1.0 });
        state.apply(&Event::Scroll { x: 0.0, y: -1.5 });
        assert_eq!(state.mouse_delta(), (3.0, 0.0));
        assert_eq!(state.scroll_delta(), (0.0, -1.5));
        state.begin_frame();
        assert_eq!(state.mouse_delta(), (0.0, 0.0));
        assert_eq!(state.cursor_position(), Some((3.0, 0.0)));
    }
}
