//! In-memory doubles for the OS seams, shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::accelerator::{AcceleratorBinding, KeyCode};
use crate::hook::{EventSink, HookError, KeyEvent, KeyEventKind, NativeHook};
use crate::hotkey::{HotkeyTrigger, NotificationSink, ShortcutFacility, TriggerCallback};
use crate::popup::{Clock, WindowController, WindowError};
use crate::settings::{ConfigStore, EntityHotkeysConfig, SettingsError, StoredPopupHotkey};

pub fn key(kind: KeyEventKind, key: KeyCode) -> KeyEvent {
    KeyEvent {
        kind,
        key,
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    }
}

/// The event a user pressing exactly `binding` would produce.
pub fn event_for(kind: KeyEventKind, binding: &AcceleratorBinding) -> KeyEvent {
    KeyEvent {
        kind,
        key: binding.main_key,
        ctrl: binding.ctrl,
        alt: binding.alt,
        shift: binding.shift,
        meta: binding.meta,
    }
}

#[derive(Debug, Default)]
struct WindowModel {
    visible: bool,
    focused: bool,
    minimized: bool,
    always_on_top: bool,
    calls: Vec<String>,
}

/// Records mutating calls; queries are answered from the model but not logged.
#[derive(Debug, Default)]
pub struct FakeWindow {
    model: Mutex<WindowModel>,
}

impl FakeWindow {
    fn with<R>(&self, f: impl FnOnce(&mut WindowModel) -> R) -> R {
        f(&mut *self.model.lock().unwrap())
    }

    fn record(
        &self,
        call: impl Into<String>,
        f: impl FnOnce(&mut WindowModel),
    ) -> Result<(), WindowError> {
        self.with(|m| {
            m.calls.push(call.into());
            f(m);
        });
        Ok(())
    }

    pub fn set_visible(&self, visible: bool) {
        self.with(|m| m.visible = visible);
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.with(|m| m.minimized = minimized);
    }

    pub fn set_always_on_top_flag(&self, on_top: bool) {
        self.with(|m| m.always_on_top = on_top);
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|m| m.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|m| m.calls.clear());
    }
}

impl WindowController for FakeWindow {
    fn show(&self) -> Result<(), WindowError> {
        self.record("show", |m| m.visible = true)
    }

    fn hide(&self) -> Result<(), WindowError> {
        self.record("hide", |m| {
            m.visible = false;
            m.focused = false;
        })
    }

    fn focus(&self) -> Result<(), WindowError> {
        self.record("focus", |m| m.focused = true)
    }

    fn move_to_front(&self) -> Result<(), WindowError> {
        self.record("move_to_front", |_| {})
    }

    fn minimize(&self) -> Result<(), WindowError> {
        self.record("minimize", |m| {
            m.minimized = true;
            m.focused = false;
        })
    }

    fn restore_from_minimized(&self) -> Result<(), WindowError> {
        self.record("restore_from_minimized", |m| m.minimized = false)
    }

    fn is_minimized(&self) -> bool {
        self.with(|m| m.minimized)
    }

    fn is_visible(&self) -> bool {
        self.with(|m| m.visible)
    }

    fn is_focused(&self) -> bool {
        self.with(|m| m.focused)
    }

    fn is_always_on_top(&self) -> bool {
        self.with(|m| m.always_on_top)
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError> {
        self.record(format!("set_always_on_top({on_top})"), |m| m.always_on_top = on_top)
    }
}

#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct HookModel {
    fail: bool,
    starts: usize,
    stops: usize,
    sink: Option<EventSink>,
}

/// Native hook stand-in; clones share state so a test can keep a handle
/// after boxing one into a session.
#[derive(Clone, Default)]
pub struct FakeHook {
    model: Arc<Mutex<HookModel>>,
}

impl FakeHook {
    pub fn failing() -> Self {
        let hook = Self::default();
        hook.model.lock().unwrap().fail = true;
        hook
    }

    pub fn starts(&self) -> usize {
        self.model.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.model.lock().unwrap().stops
    }

    pub fn is_running(&self) -> bool {
        self.model.lock().unwrap().sink.is_some()
    }

    /// Simulates the OS reporting a key transition. No-op while stopped.
    pub fn emit(&self, event: KeyEvent) {
        let sink = self.model.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.push(event);
        }
    }
}

impl NativeHook for FakeHook {
    fn start(&mut self, sink: EventSink) -> Result<(), HookError> {
        let mut m = self.model.lock().unwrap();
        if m.fail {
            return Err(HookError::StartFailed("accessibility permission denied".into()));
        }
        m.starts += 1;
        m.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        let mut m = self.model.lock().unwrap();
        m.stops += 1;
        m.sink = None;
    }
}

#[derive(Default)]
struct ShortcutModel {
    registered: Vec<String>,
    callback: Option<TriggerCallback>,
    refused: HashSet<String>,
    stolen: HashSet<String>,
    register_calls: usize,
    unregister_all_calls: usize,
}

/// Global-shortcut stand-in. `refuse` makes registration report failure;
/// `steal` reports success but leaves the accelerator unclaimed, as when
/// another process owns it.
#[derive(Clone, Default)]
pub struct FakeShortcuts {
    model: Arc<Mutex<ShortcutModel>>,
}

impl FakeShortcuts {
    pub fn refuse(&self, accelerator: &str) {
        self.model.lock().unwrap().refused.insert(accelerator.to_string());
    }

    pub fn steal(&self, accelerator: &str) {
        self.model.lock().unwrap().stolen.insert(accelerator.to_string());
    }

    /// Currently claimed accelerators, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut out = self.model.lock().unwrap().registered.clone();
        out.sort();
        out
    }

    pub fn register_calls(&self) -> usize {
        self.model.lock().unwrap().register_calls
    }

    pub fn unregister_all_calls(&self) -> usize {
        self.model.lock().unwrap().unregister_all_calls
    }

    /// Simulates the OS reporting a press. Returns whether anything was bound.
    pub fn fire(&self, accelerator: &str) -> bool {
        let callback = {
            let m = self.model.lock().unwrap();
            if !m.registered.iter().any(|a| a == accelerator) {
                return false;
            }
            m.callback.clone()
        };
        match callback {
            Some(cb) => {
                cb(accelerator);
                true
            }
            None => false,
        }
    }
}

impl ShortcutFacility for FakeShortcuts {
    fn register_all(&mut self, accelerators: &[String], on_trigger: TriggerCallback) -> Vec<bool> {
        let mut m = self.model.lock().unwrap();
        m.register_calls += 1;
        m.callback = Some(on_trigger);
        let mut results = Vec::with_capacity(accelerators.len());
        for accelerator in accelerators {
            if m.refused.contains(accelerator) {
                results.push(false);
                continue;
            }
            if !m.stolen.contains(accelerator) {
                m.registered.push(accelerator.clone());
            }
            results.push(true);
        }
        results
    }

    fn unregister_all(&mut self) {
        let mut m = self.model.lock().unwrap();
        m.unregister_all_calls += 1;
        m.registered.clear();
        m.callback = None;
    }

    fn is_registered(&self, accelerator: &str) -> bool {
        self.model.lock().unwrap().registered.iter().any(|a| a == accelerator)
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    triggers: Mutex<Vec<HotkeyTrigger>>,
}

impl RecordingSink {
    pub fn triggers(&self) -> Vec<HotkeyTrigger> {
        self.triggers.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, trigger: HotkeyTrigger) {
        self.triggers.lock().unwrap().push(trigger);
    }
}

/// Config store that keeps both sections in memory and counts saves.
#[derive(Debug)]
pub struct MemoryStore {
    entities: Mutex<EntityHotkeysConfig>,
    popup: Mutex<StoredPopupHotkey>,
    entity_saves: AtomicUsize,
    popup_saves: AtomicUsize,
    // Saves still allowed to succeed; usize::MAX means unlimited.
    save_budget: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(
            EntityHotkeysConfig {
                enabled: true,
                entries: Vec::new(),
            },
            StoredPopupHotkey::default(),
        )
    }
}

impl MemoryStore {
    pub fn new(entities: EntityHotkeysConfig, popup: StoredPopupHotkey) -> Self {
        Self {
            entities: Mutex::new(entities),
            popup: Mutex::new(popup),
            entity_saves: AtomicUsize::new(0),
            popup_saves: AtomicUsize::new(0),
            save_budget: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn with_entities(entities: EntityHotkeysConfig) -> Self {
        Self::new(entities, StoredPopupHotkey::default())
    }

    pub fn with_popup(popup: StoredPopupHotkey) -> Self {
        Self::new(
            EntityHotkeysConfig {
                enabled: true,
                entries: Vec::new(),
            },
            popup,
        )
    }

    pub fn fail_saves(&self, fail: bool) {
        let budget = if fail { 0 } else { usize::MAX };
        self.save_budget.store(budget, Ordering::SeqCst);
    }

    /// Let the next `n` saves through, then fail every later one.
    pub fn fail_saves_after(&self, n: usize) {
        self.save_budget.store(n, Ordering::SeqCst);
    }

    pub fn entity_hotkeys(&self) -> EntityHotkeysConfig {
        self.entities.lock().unwrap().clone()
    }

    pub fn popup_hotkey(&self) -> StoredPopupHotkey {
        self.popup.lock().unwrap().clone()
    }

    pub fn entity_saves(&self) -> usize {
        self.entity_saves.load(Ordering::SeqCst)
    }

    pub fn popup_saves(&self) -> usize {
        self.popup_saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SettingsError> {
        let budget = self.save_budget.load(Ordering::SeqCst);
        if budget != usize::MAX {
            self.save_budget.store(budget.saturating_sub(1), Ordering::SeqCst);
        }
        if budget == 0 {
            return Err(SettingsError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only settings",
            )));
        }
        Ok(())
    }
}

impl ConfigStore for MemoryStore {
    fn load_entity_hotkeys(&self) -> EntityHotkeysConfig {
        self.entity_hotkeys()
    }

    fn load_popup_hotkey(&self) -> StoredPopupHotkey {
        self.popup_hotkey()
    }

    fn save_entity_hotkeys(&self, config: &EntityHotkeysConfig) -> Result<(), SettingsError> {
        self.check()?;
        *self.entities.lock().unwrap() = config.clone();
        self.entity_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_popup_hotkey(&self, config: &StoredPopupHotkey) -> Result<(), SettingsError> {
        self.check()?;
        *self.popup.lock().unwrap() = config.clone();
        self.popup_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
