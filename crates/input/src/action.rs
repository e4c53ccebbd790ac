use serde::{Deserialize, Serialize};

/// Keys the frame loop polls every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
    Escape,
    Q,
}

impl Key {
    pub const ALL: [Key; 10] = [
        Key::W,
        Key::A,
        Key::S,
        Key::D,
        Key::Up,
        Key::Down,
        Key::Left,
        Key::Right,
        Key::Escape,
        Key::Q,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Key::W => "w",
            Key::A => "a",
            Key::S => "s",
            Key::D => "d",
            Key::Up => "up",
            Key::Down => "down",
            Key::Left => "left",
            Key::Right => "right",
            Key::Escape => "escape",
            Key::Q => "q",
        }
    }

    /// Case-insensitive lookup by [`Key::name`]; `esc` is accepted too.
    pub fn from_name(name: &str) -> Option<Key> {
        let name = name.trim().to_ascii_lowercase();
        if name == "esc" {
            return Some(Key::Escape);
        }
        Key::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A high-level action produced from held keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    /// Ask the platform surface to close; the loop ends after this iteration.
    Exit,
}

/// Which key triggers which action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: Key,
    pub backward: Key,
    pub left: Key,
    pub right: Key,
    pub exit: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: Key::W,
            backward: Key::S,
            left: Key::A,
            right: Key::D,
            exit: Key::Escape,
        }
    }
}

impl KeyBindings {
    /// Bindings in the order they are polled each frame.
    pub fn bindings(&self) -> [(Key, Action); 5] {
        [
            (self.forward, Action::MoveForward),
            (self.backward, Action::MoveBackward),
            (self.right, Action::MoveRight),
            (self.left, Action::MoveLeft),
            (self.exit, Action::Exit),
        ]
    }

    /// Actions whose key is currently held, in polling order.
    pub fn active_actions(&self, is_pressed: impl Fn(Key) -> bool) -> Vec<Action> {
        self.bindings()
            .into_iter()
            .filter(|(key, _)| is_pressed(*key))
            .map(|(_, action)| action)
            .collect()
    }
}
