//! A headless [`Window`] that replays recorded input.

use crate::window::{Window, WindowError};
use glam::DVec2;
use retrokanto_common::Viewport;
use retrokanto_input::Key;
use retrokanto_render::{Device, RecordingDevice};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Input visible during one loop iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedFrame {
    pub keys: BTreeSet<Key>,
    /// Pointer displacement from the viewport center.
    pub look: DVec2,
}

impl ScriptedFrame {
    pub fn holding(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            look: DVec2::ZERO,
        }
    }

    pub fn looking(look: DVec2) -> Self {
        Self {
            keys: BTreeSet::new(),
            look,
        }
    }
}

/// Window whose events come from a script, one [`ScriptedFrame`] per
/// [`Window::poll_events`]. It reports `should_close` once the script runs
/// out. Its device is a [`RecordingDevice`].
#[derive(Debug)]
pub struct ScriptedWindow {
    size: Viewport,
    script: VecDeque<ScriptedFrame>,
    current: Option<ScriptedFrame>,
    cursor: DVec2,
    initialized: bool,
    close_requested: bool,
    cursor_visible: bool,
    recenters: u64,
    polls: u64,
}

impl ScriptedWindow {
    pub fn new(size: Viewport, script: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            size,
            script: script.into_iter().collect(),
            current: None,
            cursor: size.center(),
            initialized: false,
            close_requested: false,
            cursor_visible: true,
            recenters: 0,
            polls: 0,
        }
    }

    /// `frames` iterations with no input.
    pub fn idle(size: Viewport, frames: usize) -> Self {
        Self::new(size, std::iter::repeat_n(ScriptedFrame::default(), frames))
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn recenters(&self) -> u64 {
        self.recenters
    }

    pub fn remaining_frames(&self) -> usize {
        self.script.len() + usize::from(self.current.is_some())
    }

    fn advance(&mut self) {
        self.current = self.script.pop_front();
        if let Some(frame) = &self.current {
            self.cursor = self.size.center() + frame.look;
        }
    }
}

impl Window for ScriptedWindow {
    type Device = RecordingDevice;

    fn init(&mut self) -> Result<RecordingDevice, WindowError> {
        if self.initialized {
            return Err(WindowError::AlreadyInitialized);
        }
        self.initialized = true;
        self.advance();
        let mut device = RecordingDevice::new();
        device.resize(self.size);
        tracing::debug!(
            width = self.size.width,
            height = self.size.height,
            frames = self.remaining_frames(),
            "scripted window initialized"
        );
        Ok(device)
    }

    fn should_close(&self) -> bool {
        self.close_requested || self.current.is_none()
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        self.advance();
    }

    fn is_key_pressed(&self, key: Key) -> bool {
        self.current.as_ref().is_some_and(|f| f.keys.contains(&key))
    }

    fn cursor_position(&self) -> DVec2 {
        self.cursor
    }

    fn set_cursor_position(&mut self, position: DVec2) {
        self.cursor = position;
        self.recenters += 1;
    }

    fn size(&self) -> Viewport {
        self.size
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_until_initialized() {
        let window = ScriptedWindow::idle(Viewport::new(800, 600), 3);
        assert!(window.should_close());
    }

    #[test]
    fn each_poll_advances_one_frame() {
        let mut window = ScriptedWindow::new(
            Viewport::new(800, 600),
            [
                ScriptedFrame::holding([Key::W]),
                ScriptedFrame::looking(DVec2::new(5.0, -2.0)),
            ],
        );
        let device = window.init().unwrap();
        assert_eq!(device.viewport(), Some(Viewport::new(800, 600)));

        assert!(window.is_key_pressed(Key::W));
        assert_eq!(window.cursor_position(), DVec2::new(400.0, 300.0));

        window.poll_events();
        assert!(!window.is_key_pressed(Key::W));
        assert_eq!(window.cursor_position(), DVec2::new(405.0, 298.0));
        assert!(!window.should_close());

        window.poll_events();
        assert!(window.should_close());
        assert_eq!(window.polls(), 2);
    }

    #[test]
    fn second_init_is_rejected() {
        let mut window = ScriptedWindow::idle(Viewport::new(10, 10), 1);
        window.init().unwrap();
        assert!(matches!(window.init(), Err(WindowError::AlreadyInitialized)));
    }

    #[test]
    fn frames_deserialize_from_yaml() {
        let frames: Vec<ScriptedFrame> =
            serde_yaml::from_str("- keys: [w, d]\n- look: [3.0, 0.0]\n- {}\n").unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].keys.contains(&Key::D));
        assert_eq!(frames[1].look, DVec2::new(3.0, 0.0));
        assert_eq!(frames[2], ScriptedFrame::default());
    }

    #[test]
    fn sample_walk_script_ends_on_exit() {
        let frames: Vec<ScriptedFrame> =
            serde_yaml::from_str(include_str!("../../../config/walk.yaml")).unwrap();
        assert_eq!(frames.len(), 8);
        assert!(frames[7].keys.contains(&Key::Escape));
    }
}
