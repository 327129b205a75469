//! Tauri adapters for the window, global-shortcut and event seams, and the
//! plugin that wires a [`HotkeyService`] into the app.

use std::sync::{Arc, Mutex, MutexGuard};

use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, RunEvent, WebviewWindow, Wry};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};

use crate::hook::{self, HookSession, WakeFn};
use crate::hotkey::{HotkeyTrigger, NotificationSink, ShortcutFacility, TriggerCallback};
use crate::popup::{SystemClock, WindowController, WindowError};
use crate::service::HotkeyService;
use crate::settings::SettingsStore;

pub const ENTITY_TRIGGER_EVENT: &str = "hotkey:entity-trigger";

pub struct HotkeyState(pub Mutex<HotkeyService>);

impl HotkeyState {
    pub fn lock(&self) -> MutexGuard<'_, HotkeyService> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Looks the window up by label on every call; it may not exist yet when
/// the plugin is set up.
pub struct TauriWindow {
    app: AppHandle,
    label: String,
}

impl TauriWindow {
    pub fn new(app: AppHandle, label: impl Into<String>) -> Self {
        Self {
            app,
            label: label.into(),
        }
    }

    fn window(&self) -> Result<WebviewWindow, WindowError> {
        self.app
            .get_webview_window(&self.label)
            .ok_or_else(|| WindowError(format!("window '{}' not found", self.label)))
    }

    fn apply(
        &self,
        f: impl FnOnce(&WebviewWindow) -> tauri::Result<()>,
    ) -> Result<(), WindowError> {
        let w = self.window()?;
        f(&w).map_err(|e| WindowError(e.to_string()))
    }

    fn query(&self, f: impl FnOnce(&WebviewWindow) -> tauri::Result<bool>) -> bool {
        self.window().ok().and_then(|w| f(&w).ok()).unwrap_or(false)
    }
}

impl WindowController for TauriWindow {
    fn show(&self) -> Result<(), WindowError> {
        self.apply(|w| w.show())
    }

    fn hide(&self) -> Result<(), WindowError> {
        self.apply(|w| w.hide())
    }

    fn focus(&self) -> Result<(), WindowError> {
        self.apply(|w| w.set_focus())
    }

    fn move_to_front(&self) -> Result<(), WindowError> {
        // Tauri has no separate z-order raise; focusing brings it forward.
        self.apply(|w| w.set_focus())
    }

    fn minimize(&self) -> Result<(), WindowError> {
        self.apply(|w| w.minimize())
    }

    fn restore_from_minimized(&self) -> Result<(), WindowError> {
        self.apply(|w| w.unminimize())
    }

    fn is_minimized(&self) -> bool {
        self.query(|w| w.is_minimized())
    }

    fn is_visible(&self) -> bool {
        self.query(|w| w.is_visible())
    }

    fn is_focused(&self) -> bool {
        self.query(|w| w.is_focused())
    }

    fn is_always_on_top(&self) -> bool {
        self.query(|w| w.is_always_on_top())
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError> {
        self.apply(|w| w.set_always_on_top(on_top))
    }
}

pub struct TauriShortcuts {
    app: AppHandle,
}

impl TauriShortcuts {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ShortcutFacility for TauriShortcuts {
    fn register_all(&mut self, accelerators: &[String], on_trigger: TriggerCallback) -> Vec<bool> {
        accelerators
            .iter()
            .map(|acc| {
                let cb = on_trigger.clone();
                let fired = acc.clone();
                let res = self
                    .app
                    .global_shortcut()
                    .on_shortcut(acc.as_str(), move |_app, _shortcut, event| {
                        if event.state != ShortcutState::Pressed {
                            return;
                        }
                        cb(&fired);
                    });
                match res {
                    Ok(()) => true,
                    Err(err) => {
                        log::warn!("[desktop] register {acc} failed: {err}");
                        false
                    }
                }
            })
            .collect()
    }

    fn unregister_all(&mut self) {
        if let Err(err) = self.app.global_shortcut().unregister_all() {
            log::warn!("[desktop] unregister_all failed: {err}");
        }
    }

    fn is_registered(&self, accelerator: &str) -> bool {
        self.app.global_shortcut().is_registered(accelerator)
    }
}

pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl NotificationSink for TauriNotifier {
    fn notify(&self, trigger: HotkeyTrigger) {
        if let Err(err) = self.app.emit(ENTITY_TRIGGER_EVENT, trigger) {
            log::error!("[desktop] emit {ENTITY_TRIGGER_EVENT} failed: {err}");
        }
    }
}

/// Schedules a queue drain on the main thread whenever the hook thread
/// pushes an event.
fn main_thread_wake(app: AppHandle) -> WakeFn {
    Arc::new(move || {
        let handle = app.clone();
        let res = app.run_on_main_thread(move || {
            if let Some(state) = handle.try_state::<HotkeyState>() {
                state.lock().dispatch_pending();
            }
        });
        if let Err(err) = res {
            log::warn!("[desktop] run_on_main_thread failed: {err}");
        }
    })
}

fn build_service(
    app: &AppHandle,
    window_label: &str,
) -> Result<HotkeyService, crate::settings::SettingsError> {
    let store = SettingsStore::new(app)?;
    log::info!("[desktop] settings at {}", store.path.display());
    let session = HookSession::new(hook::platform_hook(), main_thread_wake(app.clone()));
    Ok(HotkeyService::new(
        Arc::new(store),
        Box::new(TauriShortcuts::new(app.clone())),
        Arc::new(TauriNotifier::new(app.clone())),
        Arc::new(TauriWindow::new(app.clone(), window_label)),
        session,
        Arc::new(SystemClock::new()),
    ))
}

/// The `keydeck` plugin. The host app must also install
/// `tauri_plugin_global_shortcut` and register [`crate::commands::handler`].
pub fn init(window_label: &str) -> TauriPlugin<Wry> {
    let label = window_label.to_string();
    Builder::new("keydeck")
        .setup(move |app, _api| {
            crate::logging::init();
            let service = build_service(app, &label)?;
            app.manage(HotkeyState(Mutex::new(service)));
            log::info!("[desktop] ready (window={label})");
            Ok(())
        })
        .on_event(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<HotkeyState>() {
                    state.lock().shutdown();
                }
            }
        })
        .build()
}
