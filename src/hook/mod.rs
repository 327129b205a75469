//! Process-wide low-level keyboard hook.
//!
//! Global-shortcut APIs only report the pressed edge, so the popup hotkey
//! listens to raw key down/up events instead. Native backends run on their
//! own OS thread and push normalized [`KeyEvent`]s into a bounded queue;
//! [`HookSession::dispatch_pending`] drains that queue on the main loop and
//! hands each event, one at a time, to the single installed [`KeyHandler`].

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use crate::accelerator::KeyCode;

/// Capacity of the native-thread -> main-loop queue.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// A raw key transition with modifier state already coerced to plain bools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: KeyCode,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("low-level keyboard hook is not supported on this platform")]
    Unsupported,
    #[error("failed to start keyboard hook: {0}")]
    StartFailed(String),
}

pub type WakeFn = Arc<dyn Fn() + Send + Sync>;

/// Producer side of the event queue, owned by a native backend.
#[derive(Clone)]
pub struct EventSink {
    tx: SyncSender<KeyEvent>,
    wake: WakeFn,
}

impl EventSink {
    /// Never blocks: OS hook procedures must return quickly.
    pub fn push(&self, event: KeyEvent) {
        match self.tx.try_send(event) {
            Ok(()) => (self.wake)(),
            Err(TrySendError::Full(ev)) => {
                log::warn!("[hook] event queue full, dropping {:?} {:?}", ev.kind, ev.key);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// An OS-wide raw keyboard hook.
pub trait NativeHook: Send {
    fn start(&mut self, sink: EventSink) -> Result<(), HookError>;
    fn stop(&mut self);
}

/// Receives hook events; implemented by the popup state machine.
///
/// Handlers run on the main loop and must not return errors: there is no
/// caller to receive them, so failures are logged in place.
pub trait KeyHandler: Send {
    fn on_keydown(&mut self, event: &KeyEvent);
    fn on_keyup(&mut self, event: &KeyEvent);

    /// Called once when the session removes this handler, so it can undo
    /// any window state it still holds.
    fn on_detach(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// Owns the native hook and its single handler slot.
pub struct HookSession {
    backend: Box<dyn NativeHook>,
    running: bool,
    active: Option<(HandlerId, Box<dyn KeyHandler>)>,
    next_id: u64,
    tx: SyncSender<KeyEvent>,
    rx: Receiver<KeyEvent>,
    wake: WakeFn,
}

impl HookSession {
    pub fn new(backend: Box<dyn NativeHook>, wake: WakeFn) -> Self {
        let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
        Self {
            backend,
            running: false,
            active: None,
            next_id: 0,
            tx,
            rx,
            wake,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_handler(&self) -> Option<HandlerId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    /// Detach the current pair (if any), attach `handler`, then make sure the
    /// hook is running. If the hook cannot start, nothing stays attached.
    pub fn install_handlers(
        &mut self,
        handler: Box<dyn KeyHandler>,
    ) -> Result<HandlerId, HookError> {
        if let Some(id) = self.active_handler() {
            self.uninstall_handlers(id);
        }

        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.active = Some((id, handler));
        log::debug!("[hook] handlers installed id={}", id.0);

        if let Err(err) = self.start() {
            self.active = None;
            return Err(err);
        }
        Ok(id)
    }

    /// Remove exactly the pair identified by `id`. Events still queued for it
    /// are discarded. Returns whether anything was removed.
    pub fn uninstall_handlers(&mut self, id: HandlerId) -> bool {
        match &self.active {
            Some((active, _)) if *active == id => {
                if let Some((_, mut handler)) = self.active.take() {
                    handler.on_detach();
                }
                self.discard_pending();
                log::debug!("[hook] handlers removed id={}", id.0);
                true
            }
            _ => false,
        }
    }

    /// Detach the active pair, and stop the hook when no popup hotkey is
    /// configured any more.
    pub fn uninstall_and_stop_if_idle(&mut self, popup_configured: bool) {
        if let Some(id) = self.active_handler() {
            self.uninstall_handlers(id);
        }
        if !popup_configured {
            self.stop();
        }
    }

    pub fn start(&mut self) -> Result<(), HookError> {
        if self.running {
            return Ok(());
        }
        let sink = EventSink {
            tx: self.tx.clone(),
            wake: self.wake.clone(),
        };
        self.backend.start(sink)?;
        self.running = true;
        log::info!("[hook] started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.backend.stop();
        self.running = false;
        self.discard_pending();
        log::info!("[hook] stopped");
    }

    /// Deliver every queued event to the active handler, in arrival order.
    /// Returns how many events reached a handler.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.rx.try_recv() {
            let Some((_, handler)) = self.active.as_mut() else {
                continue;
            };
            match event.kind {
                KeyEventKind::Down => handler.on_keydown(&event),
                KeyEventKind::Up => handler.on_keyup(&event),
            }
            delivered += 1;
        }
        delivered
    }

    fn discard_pending(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for HookSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
struct UnsupportedHook;

impl NativeHook for UnsupportedHook {
    fn start(&mut self, _sink: EventSink) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    fn stop(&mut self) {}
}

/// The native hook backend for the current platform.
pub fn platform_hook() -> Box<dyn NativeHook> {
    #[cfg(target_os = "macos")]
    return Box::new(macos::MacHook::default());
    #[cfg(target_os = "windows")]
    return Box::new(windows::WindowsHook::default());
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    Box::new(UnsupportedHook)
}
