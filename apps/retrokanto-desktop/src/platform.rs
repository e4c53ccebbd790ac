//! winit-backed [`Window`] for the frame loop.
//!
//! The game owns the loop, so events are pumped once per frame with
//! `pump_app_events` instead of handing control to `run_app`.

use glam::DVec2;
use retrokanto_common::Viewport;
use retrokanto_game::{Window, WindowError};
use retrokanto_input::Key;
use retrokanto_render_wgpu::WgpuDevice;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{WindowAttributes, WindowId};

/// Pumps allowed while waiting for the platform to create the window.
const INIT_PUMP_LIMIT: usize = 200;
const INIT_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: PlatformState,
}

struct PlatformState {
    attributes: WindowAttributes,
    window: Option<Arc<winit::window::Window>>,
    create_error: Option<String>,
    pressed: HashSet<Key>,
    cursor: DVec2,
    /// Set when the platform refuses cursor warps; pointer readings are then
    /// taken relative to this position instead of the window center.
    anchor: Option<DVec2>,
    close_requested: bool,
    resized: Option<Viewport>,
}

impl WinitWindow {
    pub fn new(title: &str, size: Viewport) -> Result<Self, WindowError> {
        let event_loop = EventLoop::new().map_err(|e| WindowError::Platform(e.to_string()))?;
        let attributes = winit::window::Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        Ok(Self {
            event_loop,
            state: PlatformState {
                attributes,
                window: None,
                create_error: None,
                pressed: HashSet::new(),
                cursor: size.center(),
                anchor: None,
                close_requested: false,
                resized: None,
            },
        })
    }

    fn pump(&mut self, timeout: Duration) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state)
        {
            tracing::info!(code, "event loop exited");
            self.state.close_requested = true;
        }
    }
}

impl Window for WinitWindow {
    type Device = WgpuDevice;

    fn init(&mut self) -> Result<WgpuDevice, WindowError> {
        if self.state.window.is_some() {
            return Err(WindowError::AlreadyInitialized);
        }
        for _ in 0..INIT_PUMP_LIMIT {
            self.pump(INIT_PUMP_TIMEOUT);
            if let Some(reason) = self.state.create_error.take() {
                return Err(WindowError::Create(reason));
            }
            if self.state.window.is_some() || self.state.close_requested {
                break;
            }
        }
        let window = self
            .state
            .window
            .clone()
            .ok_or_else(|| WindowError::Create("platform never resumed the app".to_string()))?;

        let size = window.inner_size();
        let device = WgpuDevice::new(window, Viewport::new(size.width, size.height))?;
        Ok(device)
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn request_close(&mut self) {
        self.state.close_requested = true;
    }

    fn poll_events(&mut self) {
        self.pump(Duration::ZERO);
    }

    fn is_key_pressed(&self, key: Key) -> bool {
        self.state.pressed.contains(&key)
    }

    fn cursor_position(&self) -> DVec2 {
        match self.state.anchor {
            Some(anchor) => self.size().center() + (self.state.cursor - anchor),
            None => self.state.cursor,
        }
    }

    fn set_cursor_position(&mut self, position: DVec2) {
        let Some(window) = &self.state.window else {
            return;
        };
        match window.set_cursor_position(PhysicalPosition::new(position.x, position.y)) {
            Ok(()) => {
                self.state.cursor = position;
                self.state.anchor = None;
            }
            Err(err) => {
                if self.state.anchor.is_none() {
                    tracing::debug!("cursor warp unavailable, tracking relative motion: {err}");
                }
                self.state.anchor = Some(self.state.cursor);
            }
        }
    }

    fn size(&self) -> Viewport {
        match &self.state.window {
            Some(window) => {
                let size = window.inner_size();
                Viewport::new(size.width, size.height)
            }
            None => self
                .state
                .attributes
                .inner_size
                .map(|s| {
                    let size: PhysicalSize<u32> = s.to_physical(1.0);
                    Viewport::new(size.width, size.height)
                })
                .unwrap_or(Viewport::new(0, 0)),
        }
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        if let Some(window) = &self.state.window {
            window.set_cursor_visible(visible);
        }
    }

    fn take_resize(&mut self) -> Option<Viewport> {
        self.state.resized.take()
    }
}

impl ApplicationHandler for PlatformState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(err) => self.create_error = Some(err.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                self.resized = Some(Viewport::new(size.width, size.height));
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_key(code) {
                    match state {
                        ElementState::Pressed => self.pressed.insert(key),
                        ElementState::Released => self.pressed.remove(&key),
                    };
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = DVec2::new(position.x, position.y);
            }
            WindowEvent::Focused(false) => {
                self.pressed.clear();
            }
            _ => {}
        }
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_movement_and_exit_keys() {
        assert_eq!(map_key(KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_key(KeyCode::ArrowLeft), Some(Key::Left));
        assert_eq!(map_key(KeyCode::Escape), Some(Key::Escape));
        assert_eq!(map_key(KeyCode::Space), None);
    }

    #[test]
    fn every_key_has_a_physical_binding() {
        let codes = [
            KeyCode::KeyW,
            KeyCode::KeyA,
            KeyCode::KeyS,
            KeyCode::KeyD,
            KeyCode::ArrowUp,
            KeyCode::ArrowDown,
            KeyCode::ArrowLeft,
            KeyCode::ArrowRight,
            KeyCode::Escape,
            KeyCode::KeyQ,
        ];
        let mapped: HashSet<Key> = codes.into_iter().filter_map(map_key).collect();
        assert_eq!(mapped.len(), Key::ALL.len());
    }
}
