use std::fmt;

/// Keyboard symbols understood by the engine. Raw codes follow the GLFW key numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Space,
    Escape,
    Enter,
    Tab,
    Backspace,
    Right,
    Left,
    Down,
    Up,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    LeftShift,
    LeftControl,
    LeftAlt,
    RightShift,
    RightControl,
    RightAlt,
}

const LETTERS: [KeyCode; 26] = [
    KeyCode::A,
    KeyCode::B,
    KeyCode::C,
    KeyCode::D,
    KeyCode::E,
    KeyCode::F,
    KeyCode::G,
    KeyCode::H,
    KeyCode::I,
    KeyCode::J,
    KeyCode::K,
    KeyCode::L,
    KeyCode::M,
    KeyCode::N,
    KeyCode::O,
    KeyCode::P,
    KeyCode::Q,
    KeyCode::R,
    KeyCode::S,
    KeyCode::T,
    KeyCode::U,
    KeyCode::V,
    KeyCode::W,
    KeyCode::X,
    KeyCode::Y,
    KeyCode::Z,
];

const DIGITS: [KeyCode; 10] = [
    KeyCode::Num0,
    KeyCode::Num1,
    KeyCode::Num2,
    KeyCode::Num3,
    KeyCode::Num4,
    KeyCode::Num5,
    KeyCode::Num6,
    KeyCode::Num7,
    KeyCode::Num8,
    KeyCode::Num9,
];

const FUNCTION_KEYS: [KeyCode; 12] = [
    KeyCode::F1,
    KeyCode::F2,
    KeyCode::F3,
    KeyCode::F4,
    KeyCode::F5,
    KeyCode::F6,
    KeyCode::F7,
    KeyCode::F8,
    KeyCode::F9,
    KeyCode::F10,
    KeyCode::F11,
    KeyCode::F12,
];

const NAMED_KEYS: [(i32, KeyCode); 14] = [
    (32, KeyCode::Space),
    (256, KeyCode::Escape),
    (257, KeyCode::Enter),
    (258, KeyCode::Tab),
    (259, KeyCode::Backspace),
    (262, KeyCode::Right),
    (263, KeyCode::Left),
    (264, KeyCode::Down),
    (265, KeyCode::Up),
    (340, KeyCode::LeftShift),
    (341, KeyCode::LeftControl),
    (342, KeyCode::LeftAlt),
    (344, KeyCode::RightShift),
    (345, KeyCode::RightControl),
];

const RIGHT_ALT_RAW: i32 = 346;
const F1_RAW: i32 = 290;

impl KeyCode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            65..=90 => Some(LETTERS[(raw - 65) as usize]),
            48..=57 => Some(DIGITS[(raw - 48) as usize]),
            F1_RAW..=301 => Some(FUNCTION_KEYS[(raw - F1_RAW) as usize]),
            RIGHT_ALT_RAW => Some(KeyCode::RightAlt),
            _ => NAMED_KEYS.iter().find(|(code, _)| *code == raw).map(|(_, key)| *key),
        }
    }

    pub fn to_raw(self) -> i32 {
        if let Some(pos) = LETTERS.iter().position(|k| *k == self) {
            return 65 + pos as i32;
        }
        if let Some(pos) = DIGITS.iter().position(|k| *k == self) {
            return 48 + pos as i32;
        }
        if let Some(pos) = FUNCTION_KEYS.iter().position(|k| *k == self) {
            return F1_RAW + pos as i32;
        }
        if self == KeyCode::RightAlt {
            return RIGHT_ALT_RAW;
        }
        NAMED_KEYS.iter().find(|(_, key)| *key == self).map(|(code, _)| *code).unwrap_or(-1)
    }

    /// Parses binding names such as `"w"`, `"7"`, `"space"` or `"left_shift"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let mut chars = normalized.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return match ch {
                'a'..='z' => Some(LETTERS[(ch as u8 - b'a') as usize]),
                '0'..='9' => Some(DIGITS[(ch as u8 - b'0') as usize]),
                _ => None,
            };
        }
        if let Some(number) = normalized.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
            return (1..=12).contains(&number).then(|| FUNCTION_KEYS[number - 1]);
        }
        match normalized.as_str() {
            "space" => Some(KeyCode::Space),
            "escape" | "esc" => Some(KeyCode::Escape),
            "enter" | "return" => Some(KeyCode::Enter),
            "tab" => Some(KeyCode::Tab),
            "backspace" => Some(KeyCode::Backspace),
            "right" => Some(KeyCode::Right),
            "left" => Some(KeyCode::Left),
            "down" => Some(KeyCode::Down),
            "up" => Some(KeyCode::Up),
            "shift" | "left_shift" => Some(KeyCode::LeftShift),
            "ctrl" | "control" | "left_ctrl" | "left_control" => Some(KeyCode::LeftControl),
            "alt" | "left_alt" => Some(KeyCode::LeftAlt),
            "right_shift" => Some(KeyCode::RightShift),
            "right_ctrl" | "right_control" => Some(KeyCode::RightControl),
            "right_alt" => Some(KeyCode::RightAlt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseCode {
    Left,
    Right,
    Middle,
    Button4,
    Button5,
    Button6,
    Button7,
    Button8,
}

impl MouseCode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(MouseCode::Left),
            1 => Some(MouseCode::Right),
            2 => Some(MouseCode::Middle),
            3 => Some(MouseCode::Button4),
            4 => Some(MouseCode::Button5),
            5 => Some(MouseCode::Button6),
            6 => Some(MouseCode::Button7),
            7 => Some(MouseCode::Button8),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mouse_left" => Some(MouseCode::Left),
            "mouse_right" => Some(MouseCode::Right),
            "mouse_middle" => Some(MouseCode::Middle),
            "mouse_4" => Some(MouseCode::Button4),
            "mouse_5" => Some(MouseCode::Button5),
            _ => None,
        }
    }
}

/// One frame-local input or window event. Each variant carries exactly its own payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    KeyPressed { key: KeyCode },
    KeyReleased { key: KeyCode },
    MousePressed { button: MouseCode },
    MouseReleased { button: MouseCode },
    MouseMoved { x: f64, y: f64, dx: f64, dy: f64 },
    MouseEntered { x: f64, y: f64 },
    MouseLeft { x: f64, y: f64 },
    Scroll { x: f64, y: f64 },
    WindowResized { width: u32, height: u32 },
    GainedFocus,
    LostFocus,
    Exit,
}

/// Payload-free discriminant of [`Event`], used where a binding cares about the kind of event only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    KeyPressed,
    KeyReleased,
    MousePressed,
    MouseReleased,
    MouseMoved,
    MouseEntered,
    MouseLeft,
    Scroll,
    WindowResized,
    GainedFocus,
    LostFocus,
    Exit,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::KeyPressed { .. } => EventKind::KeyPressed,
            Event::KeyReleased { .. } => EventKind::KeyReleased,
            Event::MousePressed { .. } => EventKind::MousePressed,
            Event::MouseReleased { .. } => EventKind::MouseReleased,
            Event::MouseMoved { .. } => EventKind::MouseMoved,
            Event::MouseEntered { .. } => EventKind::MouseEntered,
            Event::MouseLeft { .. } => EventKind::MouseLeft,
            Event::Scroll { .. } => EventKind::Scroll,
            Event::WindowResized { .. } => EventKind::WindowResized,
            Event::GainedFocus => EventKind::GainedFocus,
            Event::LostFocus => EventKind::LostFocus,
            Event::Exit => EventKind::Exit,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::KeyPressed { key } => write!(f, "KeyPressed key={key:?}"),
            Event::KeyReleased { key } => write!(f, "KeyReleased key={key:?}"),
            Event::MousePressed { button } => write!(f, "MousePressed button={button:?}"),
            Event::MouseReleased { button } => write!(f, "MouseReleased button={button:?}"),
            Event::MouseMoved { x, y, dx, dy } => {
                write!(f, "MouseMoved x={x:.1} y={y:.1} dx={dx:.1} dy={dy:.1}")
            }
            Event::MouseEntered { x, y } => write!(f, "MouseEntered x={x:.1} y={y:.1}"),
            Event::MouseLeft { x, y } => write!(f, "MouseLeft x={x:.1} y={y:.1}"),
            Event::Scroll { x, y } => write!(f, "Scroll x={x:.2} y={y:.2}"),
            Event::WindowResized { width, height } => write!(f, "WindowResized {width}x{height}"),
            Event::GainedFocus => write!(f, "GainedFocus"),
            Event::LostFocus => write!(f, "LostFocus"),
            Event::Exit => write!(f, "Exit"),
        }
    }
}
