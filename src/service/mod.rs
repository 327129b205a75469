//! The one entry point the application talks to.
//!
//! `HotkeyService` owns the entity registry, the hook session and the popup
//! configuration. Every mutation persists through the [`ConfigStore`] and
//! records (or clears) `last_error` for the status view.

use std::sync::Arc;
use std::time::Duration;

use crate::accelerator;
use crate::hook::{HandlerId, HookSession};
use crate::hotkey::{EntityHotkeyRegistry, HotkeyAction, NotificationSink, ShortcutFacility};
use crate::popup::{Clock, PopupHotkeyConfig, PopupMode, PopupStateMachine, WindowController};
use crate::settings::{ConfigStore, StoredPopupHotkey};
use crate::HotkeyError;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHotkeyInfo {
    pub entity_id: String,
    pub accelerator: String,
    pub action: HotkeyAction,
    pub registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyStatus {
    pub entity_hotkeys_enabled: bool,
    pub entity_hotkeys: usize,
    pub registered: usize,
    pub popup_hotkey: Option<String>,
    pub popup_mode: PopupMode,
    pub popup_hide_on_release: bool,
    pub hook_available: bool,
    pub hook_running: bool,
    pub last_error: Option<String>,
}

pub struct HotkeyService {
    entities: EntityHotkeyRegistry,
    hook: HookSession,
    hook_available: bool,
    popup: PopupHotkeyConfig,
    popup_raw: Option<String>,
    popup_handler: Option<HandlerId>,
    store: Arc<dyn ConfigStore>,
    window: Arc<dyn WindowController>,
    clock: Arc<dyn Clock>,
    last_error: Option<String>,
}

impl HotkeyService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        facility: Box<dyn ShortcutFacility>,
        sink: Arc<dyn NotificationSink>,
        window: Arc<dyn WindowController>,
        hook: HookSession,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stored = store.load_popup_hotkey();
        let entities = EntityHotkeyRegistry::load(store.clone(), facility, sink);

        let mut popup = PopupHotkeyConfig {
            binding: None,
            mode: stored.mode,
            hide_on_release: stored.hide_on_release,
            debounce: Duration::from_millis(stored.debounce_ms),
        };
        let mut popup_raw = None;
        if let Some(raw) = stored.accelerator {
            match accelerator::parse(&raw) {
                Ok(binding) => {
                    popup.binding = Some(binding);
                    popup_raw = Some(raw);
                }
                Err(reason) => {
                    log::warn!("[service] ignoring stored popup hotkey '{raw}': {reason}")
                }
            }
        }

        let mut service = Self {
            entities,
            hook,
            hook_available: true,
            popup,
            popup_raw,
            popup_handler: None,
            store,
            window,
            clock,
            last_error: None,
        };

        if service.popup.binding.is_some() {
            if let Err(err) = service.reconfigure_popup() {
                log::warn!("[service] popup hotkey unavailable: {err}");
                service.last_error = Some(err.to_string());
            }
        }
        service
    }

    pub fn validate(&self, raw: &str) -> bool {
        accelerator::validate(raw)
    }

    pub fn set_entity_hotkey(
        &mut self,
        entity_id: &str,
        raw: &str,
        action: HotkeyAction,
    ) -> Result<(), HotkeyError> {
        let res = self.entities.register(entity_id, raw, action);
        self.record(res)
    }

    /// Returns whether the entity had a binding.
    pub fn remove_entity_hotkey(&mut self, entity_id: &str) -> Result<bool, HotkeyError> {
        let res = self.entities.unregister(entity_id);
        self.record(res)
    }

    pub fn set_entity_hotkeys_enabled(&mut self, enabled: bool) -> Result<(), HotkeyError> {
        let res = self.entities.set_enabled(enabled);
        self.record(res)
    }

    pub fn entity_hotkeys(&self) -> Vec<EntityHotkeyInfo> {
        self.entities
            .entries()
            .map(|e| EntityHotkeyInfo {
                entity_id: e.entity_id.clone(),
                accelerator: e.raw_accelerator.clone(),
                action: e.action,
                registered: self.entities.is_claimed(e),
            })
            .collect()
    }

    /// Bind the popup hotkey. The hook is started on first use.
    pub fn set_popup_hotkey(&mut self, raw: &str) -> Result<(), HotkeyError> {
        let res = self.try_set_popup_hotkey(raw.trim());
        self.record(res)
    }

    fn try_set_popup_hotkey(&mut self, raw: &str) -> Result<(), HotkeyError> {
        let binding = accelerator::parse(raw).map_err(|reason| HotkeyError::InvalidAccelerator {
            accelerator: raw.to_string(),
            reason,
        })?;
        if !self.hook_available {
            return Err(HotkeyError::HookUnavailable(
                "keyboard hook failed earlier in this session".to_string(),
            ));
        }
        let raw = raw.to_string();
        self.update_popup(move |config, popup_raw| {
            config.binding = Some(binding);
            *popup_raw = Some(raw);
        })
    }

    /// Detach, stop the hook and forget the binding. No trigger for the old
    /// binding is delivered after this returns.
    pub fn clear_popup_hotkey(&mut self) -> Result<(), HotkeyError> {
        self.detach_popup();
        self.hook.uninstall_and_stop_if_idle(false);
        self.popup.binding = None;
        self.popup_raw = None;
        log::info!("[service] popup hotkey cleared");
        let res = self.store.save_popup_hotkey(&self.stored_popup()).map_err(HotkeyError::from);
        self.record(res)
    }

    pub fn set_popup_mode(&mut self, mode: PopupMode) -> Result<(), HotkeyError> {
        let res = self.update_popup(|config, _| config.mode = mode);
        self.record(res)
    }

    pub fn set_popup_hide_on_release(&mut self, hide: bool) -> Result<(), HotkeyError> {
        let res = self.update_popup(|config, _| config.hide_on_release = hide);
        self.record(res)
    }

    pub fn set_popup_debounce(&mut self, debounce: Duration) -> Result<(), HotkeyError> {
        let res = self.update_popup(|config, _| config.debounce = debounce);
        self.record(res)
    }

    /// Drain queued hook events into the popup handler. Main loop only.
    pub fn dispatch_pending(&mut self) -> usize {
        self.hook.dispatch_pending()
    }

    pub fn status(&self) -> HotkeyStatus {
        HotkeyStatus {
            entity_hotkeys_enabled: self.entities.is_enabled(),
            entity_hotkeys: self.entities.len(),
            registered: self.entities.entries().filter(|e| self.entities.is_claimed(e)).count(),
            popup_hotkey: self.popup_raw.clone(),
            popup_mode: self.popup.mode,
            popup_hide_on_release: self.popup.hide_on_release,
            hook_available: self.hook_available,
            hook_running: self.hook.is_running(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn shutdown(&mut self) {
        self.detach_popup();
        self.hook.stop();
        self.entities.shutdown();
        log::info!("[service] shut down");
    }

    /// Apply `f` to the popup config, persist it, then rebuild the handler.
    /// If either step fails the previous config is back in place, in memory
    /// and in the store.
    fn update_popup(
        &mut self,
        f: impl FnOnce(&mut PopupHotkeyConfig, &mut Option<String>),
    ) -> Result<(), HotkeyError> {
        let prev = (self.popup.clone(), self.popup_raw.clone());
        f(&mut self.popup, &mut self.popup_raw);
        if let Err(err) = self.store.save_popup_hotkey(&self.stored_popup()) {
            (self.popup, self.popup_raw) = prev;
            return Err(err.into());
        }
        log::info!(
            "[service] popup hotkey {:?} mode={:?} hide_on_release={} debounce={:?}",
            self.popup_raw,
            self.popup.mode,
            self.popup.hide_on_release,
            self.popup.debounce
        );

        let Err(err) = self.reconfigure_popup() else {
            return Ok(());
        };
        (self.popup, self.popup_raw) = prev;
        if let Err(save_err) = self.store.save_popup_hotkey(&self.stored_popup()) {
            log::error!("[service] failed to persist popup rollback: {save_err}");
            return Err(save_err.into());
        }
        Err(err)
    }

    /// Detach the current handler and, when a binding is configured, install
    /// a fresh state machine. Runtime state never carries over.
    fn reconfigure_popup(&mut self) -> Result<(), HotkeyError> {
        self.detach_popup();
        let Some(binding) = self.popup.binding else {
            return Ok(());
        };
        if !self.hook_available {
            return Err(HotkeyError::HookUnavailable(
                "keyboard hook failed earlier in this session".to_string(),
            ));
        }

        let machine = PopupStateMachine::new(
            binding,
            &self.popup,
            self.window.clone(),
            self.clock.clone(),
        );
        match self.hook.install_handlers(Box::new(machine)) {
            Ok(id) => {
                self.popup_handler = Some(id);
                Ok(())
            }
            Err(err) => {
                self.hook_available = false;
                Err(HotkeyError::HookUnavailable(err.to_string()))
            }
        }
    }

    fn detach_popup(&mut self) {
        if let Some(id) = self.popup_handler.take() {
            self.hook.uninstall_handlers(id);
        }
    }

    fn stored_popup(&self) -> StoredPopupHotkey {
        StoredPopupHotkey {
            accelerator: self.popup_raw.clone(),
            mode: self.popup.mode,
            hide_on_release: self.popup.hide_on_release,
            debounce_ms: self.popup.debounce.as_millis() as u64,
        }
    }

    fn record<T>(&mut self, res: Result<T, HotkeyError>) -> Result<T, HotkeyError> {
        match &res {
            Ok(_) => self.last_error = None,
            Err(err) => {
                log::warn!("[service] {err}");
                self.last_error = Some(err.to_string());
            }
        }
        res
    }
}
