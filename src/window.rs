use crate::config::WindowConfig;
use crate::events::KeyCode;
use crate::input::{EventBridge, KeyAction, RawCallback};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, ModifiersState, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

/// The platform window as the frame loop sees it.
pub trait WindowBackend {
    fn size(&self) -> (u32, u32);
    fn should_close(&self) -> bool;
    fn request_close(&mut self);
    /// Delivers every pending platform callback into `bridge`, synchronously.
    fn pump_events(&mut self, bridge: &mut EventBridge);
    fn swap_buffers(&mut self);
    fn cursor_position(&self) -> (f64, f64);
    fn set_cursor_visible(&mut self, visible: bool, bridge: &mut EventBridge);
}

/// Replays scripted callbacks, one batch per pump.
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    size: (u32, u32),
    cursor: (f64, f64),
    cursor_visible: bool,
    close_requested: bool,
    batches: VecDeque<Vec<RawCallback>>,
    frames_pumped: u64,
    swaps: u64,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self { size: (width, height), cursor_visible: true, ..Self::default() }
    }

    /// Queues the callbacks delivered by one future pump.
    pub fn queue_callbacks(&mut self, callbacks: impl IntoIterator<Item = RawCallback>) {
        self.batches.push_back(callbacks.into_iter().collect());
    }

    /// Appends to the most recently queued batch, opening one if none is queued.
    pub fn push_callback(&mut self, callback: RawCallback) {
        match self.batches.back_mut() {
            Some(batch) => batch.push(callback),
            None => self.batches.push_back(vec![callback]),
        }
    }

    pub fn queued_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn frames_pumped(&self) -> u64 {
        self.frames_pumped
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }
}

impl WindowBackend for HeadlessWindow {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn pump_events(&mut self, bridge: &mut EventBridge) {
        self.frames_pumped += 1;
        let Some(batch) = self.batches.pop_front() else {
            return;
        };
        for callback in batch {
            match callback {
                RawCallback::CursorPos { x, y } | RawCallback::CursorEnter { x, y, .. } => self.cursor = (x, y),
                RawCallback::WindowSize { width, height } => {
                    self.size = (width.max(0) as u32, height.max(0) as u32);
                }
                RawCallback::WindowClose => self.close_requested = true,
                _ => {}
            }
            bridge.push(callback);
        }
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
    }

    fn cursor_position(&self) -> (f64, f64) {
        self.cursor
    }

    fn set_cursor_visible(&mut self, visible: bool, bridge: &mut EventBridge) {
        self.cursor_visible = visible;
        bridge.set_cursor_visible(visible, self.cursor);
    }
}

const GLFW_KEY_UNKNOWN: i32 = -1;
const GLFW_MOD_SHIFT: i32 = 0x1;
const GLFW_MOD_CONTROL: i32 = 0x2;
const GLFW_MOD_ALT: i32 = 0x4;
const GLFW_MOD_SUPER: i32 = 0x8;
const PIXELS_PER_SCROLL_LINE: f64 = 20.0;
const OPEN_PUMP_ATTEMPTS: usize = 16;

fn engine_key(key: WinitKey) -> Option<KeyCode> {
    use WinitKey as W;
    let key = match key {
        W::KeyA => KeyCode::A,
        W::KeyB => KeyCode::B,
        W::KeyC => KeyCode::C,
        W::KeyD => KeyCode::D,
        W::KeyE => KeyCode::E,
        W::KeyF => KeyCode::F,
        W::KeyG => KeyCode::G,
        W::KeyH => KeyCode::H,
        W::KeyI => KeyCode::I,
        W::KeyJ => KeyCode::J,
        W::KeyK => KeyCode::K,
        W::KeyL => KeyCode::L,
        W::KeyM => KeyCode::M,
        W::KeyN => KeyCode::N,
        W::KeyO => KeyCode::O,
        W::KeyP => KeyCode::P,
        W::KeyQ => KeyCode::Q,
        W::KeyR => KeyCode::R,
        W::KeyS => KeyCode::S,
        W::KeyT => KeyCode::T,
        W::KeyU => KeyCode::U,
        W::KeyV => KeyCode::V,
        W::KeyW => KeyCode::W,
        W::KeyX => KeyCode::X,
        W::KeyY => KeyCode::Y,
        W::KeyZ => KeyCode::Z,
        W::Digit0 => KeyCode::Num0,
        W::Digit1 => KeyCode::Num1,
        W::Digit2 => KeyCode::Num2,
        W::Digit3 => KeyCode::Num3,
        W::Digit4 => KeyCode::Num4,
        W::Digit5 => KeyCode::Num5,
        W::Digit6 => KeyCode::Num6,
        W::Digit7 => KeyCode::Num7,
        W::Digit8 => KeyCode::Num8,
        W::Digit9 => KeyCode::Num9,
        W::Space => KeyCode::Space,
        W::Escape => KeyCode::Escape,
        W::Enter => KeyCode::Enter,
        W::Tab => KeyCode::Tab,
        W::Backspace => KeyCode::Backspace,
        W::ArrowRight => KeyCode::Right,
        W::ArrowLeft => KeyCode::Left,
        W::ArrowDown => KeyCode::Down,
        W::ArrowUp => KeyCode::Up,
        W::F1 => KeyCode::F1,
        W::F2 => KeyCode::F2,
        W::F3 => KeyCode::F3,
        W::F4 => KeyCode::F4,
        W::F5 => KeyCode::F5,
        W::F6 => KeyCode::F6,
        W::F7 => KeyCode::F7,
        W::F8 => KeyCode::F8,
        W::F9 => KeyCode::F9,
        W::F10 => KeyCode::F10,
        W::F11 => KeyCode::F11,
        W::F12 => KeyCode::F12,
        W::ShiftLeft => KeyCode::LeftShift,
        W::ControlLeft => KeyCode::LeftControl,
        W::AltLeft => KeyCode::LeftAlt,
        W::ShiftRight => KeyCode::RightShift,
        W::ControlRight => KeyCode::RightControl,
        W::AltRight => KeyCode::RightAlt,
        _ => return None,
    };
    Some(key)
}

fn raw_key_code(key: PhysicalKey) -> i32 {
    match key {
        PhysicalKey::Code(code) => engine_key(code).map(KeyCode::to_raw).unwrap_or(GLFW_KEY_UNKNOWN),
        PhysicalKey::Unidentified(_) => GLFW_KEY_UNKNOWN,
    }
}

fn raw_mods(state: ModifiersState) -> i32 {
    let mut mods = 0;
    if state.shift_key() {
        mods |= GLFW_MOD_SHIFT;
    }
    if state.control_key() {
        mods |= GLFW_MOD_CONTROL;
    }
    if state.alt_key() {
        mods |= GLFW_MOD_ALT;
    }
    if state.super_key() {
        mods |= GLFW_MOD_SUPER;
    }
    mods
}

fn raw_mouse_button(button: MouseButton) -> i32 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        MouseButton::Back => 3,
        MouseButton::Forward => 4,
        MouseButton::Other(code) => i32::from(code),
    }
}

fn raw_action(state: ElementState, repeat: bool) -> i32 {
    match (state, repeat) {
        (ElementState::Released, _) => KeyAction::Release.to_raw(),
        (ElementState::Pressed, false) => KeyAction::Press.to_raw(),
        (ElementState::Pressed, true) => KeyAction::Repeat.to_raw(),
    }
}

struct WinitState {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    create_error: Option<anyhow::Error>,
    size: (u32, u32),
    cursor: (f64, f64),
    mods: i32,
    close_requested: bool,
}

impl WinitState {
    /// Converts one window event into the raw callback the bridge expects.
    fn translate(&mut self, event: WindowEvent) -> Option<RawCallback> {
        let raw = match event {
            WindowEvent::KeyboardInput { event, .. } => RawCallback::Key {
                key: raw_key_code(event.physical_key),
                scancode: 0,
                action: raw_action(event.state, event.repeat),
                mods: self.mods,
            },
            WindowEvent::ModifiersChanged(modifiers) => {
                self.mods = raw_mods(modifiers.state());
                return None;
            }
            WindowEvent::MouseInput { state, button, .. } => RawCallback::MouseButton {
                button: raw_mouse_button(button),
                action: raw_action(state, false),
                mods: self.mods,
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
                RawCallback::CursorPos { x: position.x, y: position.y }
            }
            WindowEvent::CursorEntered { .. } => {
                RawCallback::CursorEnter { entered: true, x: self.cursor.0, y: self.cursor.1 }
            }
            WindowEvent::CursorLeft { .. } => {
                RawCallback::CursorEnter { entered: false, x: self.cursor.0, y: self.cursor.1 }
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(x, y) => RawCallback::Scroll { x: f64::from(x), y: f64::from(y) },
                MouseScrollDelta::PixelDelta(pos) => RawCallback::Scroll {
                    x: pos.x / PIXELS_PER_SCROLL_LINE,
                    y: pos.y / PIXELS_PER_SCROLL_LINE,
                },
            },
            WindowEvent::Resized(size) => {
                self.size = (size.width, size.height);
                RawCallback::WindowSize { width: size.width as i32, height: size.height as i32 }
            }
            WindowEvent::Focused(focused) => RawCallback::Focus { focused },
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                RawCallback::WindowClose
            }
            _ => return None,
        };
        Some(raw)
    }
}

/// Context for a single pump: the window state and the bridge callbacks land in.
struct PumpHandler<'a> {
    state: &'a mut WinitState,
    bridge: &'a mut EventBridge,
}

impl ApplicationHandler for PumpHandler<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.window.is_some() {
            return;
        }
        match event_loop.create_window(self.state.attributes.clone()) {
            Ok(window) => {
                let size = window.inner_size();
                self.state.size = (size.width, size.height);
                log::info!("window created at {}x{}", size.width, size.height);
                self.state.window = Some(Arc::new(window));
            }
            Err(err) => {
                self.state.create_error = Some(anyhow!(err).context("Failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.state.window.as_ref() else {
            panic!("window callback {event:?} delivered with no window attached");
        };
        if window.id() != window_id {
            return;
        }
        if let Some(raw) = self.state.translate(event) {
            self.bridge.push(raw);
        }
    }
}

/// A desktop window driven through winit's pump API, one pump per frame.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: WinitState,
}

impl WinitWindow {
    pub fn open(config: &WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        let mut attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        if config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let mut this = Self {
            event_loop,
            state: WinitState {
                attributes,
                window: None,
                create_error: None,
                size: (config.width, config.height),
                cursor: (0.0, 0.0),
                mods: 0,
                close_requested: false,
            },
        };
        // Callbacks arriving before the frame loop owns a bridge are dropped.
        let mut scratch = EventBridge::new(config.width, config.height);
        for _ in 0..OPEN_PUMP_ATTEMPTS {
            this.pump_events(&mut scratch);
            if let Some(err) = this.state.create_error.take() {
                return Err(err);
            }
            if this.state.window.is_some() {
                return Ok(this);
            }
        }
        bail!("Event loop never resumed; no window was created")
    }

    pub fn handle(&self) -> Option<Arc<Window>> {
        self.state.window.clone()
    }
}

impl WindowBackend for WinitWindow {
    fn size(&self) -> (u32, u32) {
        self.state.size
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn request_close(&mut self) {
        self.state.close_requested = true;
    }

    fn pump_events(&mut self, bridge: &mut EventBridge) {
        let mut handler = PumpHandler { state: &mut self.state, bridge };
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(Some(Duration::ZERO), &mut handler) {
            log::info!("event loop exited with status {code}");
            self.state.close_requested = true;
        }
    }

    fn swap_buffers(&mut self) {
        if let Some(window) = self.state.window.as_ref() {
            window.pre_present_notify();
        }
    }

    fn cursor_position(&self) -> (f64, f64) {
        self.state.cursor
    }

    fn set_cursor_visible(&mut self, visible: bool, bridge: &mut EventBridge) {
        if let Some(window) = self.state.window.as_ref() {
            window.set_cursor_visible(visible);
        }
        bridge.set_cursor_visible(visible, self.state.cursor);
    }
}
