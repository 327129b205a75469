//! Popup-window hotkey: hold-to-show and tap-to-toggle.
//!
//! A [`PopupStateMachine`] is built for one [`PopupHotkeyConfig`] and
//! installed as the hook session's handler pair. Reconfiguring always builds
//! a new machine, so runtime state (held key, debounce timestamp) never
//! survives a binding or mode change.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::accelerator::AcceleratorBinding;
use crate::hook::{KeyEvent, KeyHandler};

/// Window after a toggle-mode show during which "visible and focused" is not
/// trusted as a reason to hide; some platforms emit a spurious focus
/// loss/gain right after showing.
pub const DEFAULT_TOGGLE_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
#[error("window error: {0}")]
pub struct WindowError(pub String);

/// The single application window the popup hotkey drives.
pub trait WindowController: Send + Sync {
    fn show(&self) -> Result<(), WindowError>;
    fn hide(&self) -> Result<(), WindowError>;
    fn focus(&self) -> Result<(), WindowError>;
    fn move_to_front(&self) -> Result<(), WindowError>;
    fn minimize(&self) -> Result<(), WindowError>;
    fn restore_from_minimized(&self) -> Result<(), WindowError>;
    fn is_minimized(&self) -> bool;
    fn is_visible(&self) -> bool;
    fn is_focused(&self) -> bool;
    fn is_always_on_top(&self) -> bool;
    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Monotonic milliseconds since construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupMode {
    Hold,
    #[default]
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupHotkeyConfig {
    pub binding: Option<AcceleratorBinding>,
    pub mode: PopupMode,
    /// Hold mode only.
    pub hide_on_release: bool,
    pub debounce: Duration,
}

impl Default for PopupHotkeyConfig {
    fn default() -> Self {
        Self {
            binding: None,
            mode: PopupMode::default(),
            hide_on_release: false,
            debounce: DEFAULT_TOGGLE_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupRuntimeState {
    pub held_down: bool,
    pub was_always_on_top: bool,
    pub toggle_shown: bool,
    pub last_shown_at_millis: Option<u64>,
}

fn check(what: &str, res: Result<(), WindowError>) {
    if let Err(err) = res {
        log::warn!("[popup] {what} failed: {err}");
    }
}

pub struct PopupStateMachine {
    binding: AcceleratorBinding,
    mode: PopupMode,
    hide_on_release: bool,
    debounce_ms: u64,
    window: Arc<dyn WindowController>,
    clock: Arc<dyn Clock>,
    state: PopupRuntimeState,
}

impl PopupStateMachine {
    pub fn new(
        binding: AcceleratorBinding,
        config: &PopupHotkeyConfig,
        window: Arc<dyn WindowController>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            binding,
            mode: config.mode,
            hide_on_release: config.hide_on_release,
            debounce_ms: config.debounce.as_millis() as u64,
            window,
            clock,
            state: PopupRuntimeState::default(),
        }
    }

    pub fn state(&self) -> &PopupRuntimeState {
        &self.state
    }

    fn hold_press(&mut self) {
        // OS key-repeat keeps sending keydown while held.
        if self.state.held_down {
            return;
        }
        self.state.held_down = true;
        self.state.was_always_on_top = self.window.is_always_on_top();
        log::debug!("[popup] hold press (was_always_on_top={})", self.state.was_always_on_top);

        if self.window.is_minimized() {
            check("restore", self.window.restore_from_minimized());
        }
        check("show", self.window.show());
        check("set_always_on_top", self.window.set_always_on_top(true));
        check("focus", self.window.focus());
        check("move_to_front", self.window.move_to_front());
    }

    fn hold_release(&mut self) {
        if !self.state.held_down {
            return;
        }
        self.state.held_down = false;
        log::debug!("[popup] hold release");

        check(
            "set_always_on_top",
            self.window.set_always_on_top(self.state.was_always_on_top),
        );
        if self.hide_on_release {
            check("hide", self.window.hide());
        }
    }

    fn toggle(&mut self) {
        let visible = self.window.is_visible();
        let focused = self.window.is_focused();
        let now = self.clock.now_millis();
        let recently_shown = self
            .state
            .last_shown_at_millis
            .is_some_and(|at| now.saturating_sub(at) < self.debounce_ms);

        if visible && focused && !recently_shown {
            log::debug!("[popup] toggle -> hide");
            check("hide", self.window.hide());
            self.state.last_shown_at_millis = None;
            self.state.toggle_shown = false;
            return;
        }

        log::debug!(
            "[popup] toggle -> show (visible={visible} focused={focused} recent={recently_shown})"
        );
        if self.window.is_minimized() {
            check("restore", self.window.restore_from_minimized());
        }
        check("show", self.window.show());
        self.state.was_always_on_top = self.window.is_always_on_top();
        check("set_always_on_top", self.window.set_always_on_top(true));
        check("focus", self.window.focus());
        check("move_to_front", self.window.move_to_front());
        check(
            "set_always_on_top",
            self.window.set_always_on_top(self.state.was_always_on_top),
        );
        self.state.last_shown_at_millis = Some(now);
        self.state.toggle_shown = true;
    }
}

impl KeyHandler for PopupStateMachine {
    fn on_keydown(&mut self, event: &KeyEvent) {
        if !self.binding.matches(event) {
            return;
        }
        match self.mode {
            PopupMode::Hold => self.hold_press(),
            PopupMode::Toggle => self.toggle(),
        }
    }

    fn on_keyup(&mut self, event: &KeyEvent) {
        if self.mode != PopupMode::Hold || event.key != self.binding.main_key {
            return;
        }
        self.hold_release();
    }

    /// Torn down mid-hold: give back the pin captured at press. The window
    /// stays where it is; only a real release may hide it.
    fn on_detach(&mut self) {
        if !self.state.held_down {
            return;
        }
        self.state.held_down = false;
        log::debug!("[popup] detached while held, restoring always_on_top");
        check(
            "set_always_on_top",
            self.window.set_always_on_top(self.state.was_always_on_top),
        );
    }
}
