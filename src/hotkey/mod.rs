use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::accelerator::{self, AcceleratorBinding};
use crate::settings::{ConfigStore, EntityHotkeysConfig, StoredEntityHotkey};
use crate::HotkeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    #[default]
    Toggle,
    TurnOn,
    TurnOff,
    BrightnessUp,
    BrightnessDown,
    Trigger,
    IncreaseSpeed,
    DecreaseSpeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHotkeyEntry {
    pub entity_id: String,
    pub binding: AcceleratorBinding,
    pub raw_accelerator: String,
    pub action: HotkeyAction,
}

impl EntityHotkeyEntry {
    fn trigger(&self) -> HotkeyTrigger {
        HotkeyTrigger {
            entity_id: self.entity_id.clone(),
            raw_accelerator: self.raw_accelerator.clone(),
            action: self.action,
        }
    }

    fn stored(&self) -> StoredEntityHotkey {
        StoredEntityHotkey {
            entity_id: self.entity_id.clone(),
            accelerator: self.raw_accelerator.clone(),
            action: self.action,
        }
    }
}

/// Dispatched when the OS reports an entity shortcut press.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyTrigger {
    pub entity_id: String,
    pub raw_accelerator: String,
    pub action: HotkeyAction,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, trigger: HotkeyTrigger);
}

/// Called by the OS facility with the accelerator that fired.
pub type TriggerCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// OS global-shortcut facility.
///
/// There is no "replace one" primitive: callers always clear everything and
/// register the full set again.
pub trait ShortcutFacility: Send {
    fn register_all(&mut self, accelerators: &[String], on_trigger: TriggerCallback) -> Vec<bool>;
    fn unregister_all(&mut self);
    fn is_registered(&self, accelerator: &str) -> bool;
}

/// Entity id -> binding/action map, mirrored onto the OS facility.
pub struct EntityHotkeyRegistry {
    enabled: bool,
    entries: BTreeMap<String, EntityHotkeyEntry>,
    facility: Box<dyn ShortcutFacility>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn ConfigStore>,
}

impl EntityHotkeyRegistry {
    /// Build from the persisted entity section. Entries that no longer parse,
    /// or collide with an earlier entry, are skipped.
    pub fn load(
        store: Arc<dyn ConfigStore>,
        facility: Box<dyn ShortcutFacility>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let config = store.load_entity_hotkeys();
        let mut registry = Self {
            enabled: config.enabled,
            entries: BTreeMap::new(),
            facility,
            sink,
            store,
        };

        for stored in config.entries {
            let binding = match accelerator::parse(&stored.accelerator) {
                Ok(b) => b,
                Err(reason) => {
                    log::warn!(
                        "[hotkey] skipping '{}' for {}: {reason}",
                        stored.accelerator,
                        stored.entity_id
                    );
                    continue;
                }
            };
            let owner = registry.owner_of(&stored.entity_id, &stored.accelerator, Some(&binding));
            if let Some(owner) = owner {
                log::warn!(
                    "[hotkey] skipping '{}' for {}: already bound to {owner}",
                    stored.accelerator,
                    stored.entity_id
                );
                continue;
            }
            registry.entries.insert(
                stored.entity_id.clone(),
                EntityHotkeyEntry {
                    entity_id: stored.entity_id,
                    binding,
                    raw_accelerator: stored.accelerator,
                    action: stored.action,
                },
            );
        }

        log::info!(
            "[hotkey] loaded {} entity hotkeys (enabled={})",
            registry.entries.len(),
            registry.enabled
        );
        if registry.enabled {
            registry.register_all();
        }
        registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityHotkeyEntry> {
        self.entries.get(entity_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntityHotkeyEntry> {
        self.entries.values()
    }

    pub fn is_claimed(&self, entry: &EntityHotkeyEntry) -> bool {
        self.enabled && self.facility.is_registered(&entry.binding.to_string())
    }

    /// Bind `raw` to `entity_id`, replacing any earlier binding for that
    /// entity. On OS refusal the previous state is restored and re-applied.
    pub fn register(
        &mut self,
        entity_id: &str,
        raw: &str,
        action: HotkeyAction,
    ) -> Result<(), HotkeyError> {
        let raw = raw.trim();
        if let Some(owner) = self.owner_of(entity_id, raw, None) {
            return Err(HotkeyError::Conflict {
                accelerator: raw.to_string(),
                owner,
            });
        }

        let binding = accelerator::parse(raw).map_err(|reason| HotkeyError::InvalidAccelerator {
            accelerator: raw.to_string(),
            reason,
        })?;
        if let Some(owner) = self.owner_of(entity_id, raw, Some(&binding)) {
            return Err(HotkeyError::Conflict {
                accelerator: raw.to_string(),
                owner,
            });
        }

        let entry = EntityHotkeyEntry {
            entity_id: entity_id.to_string(),
            binding,
            raw_accelerator: raw.to_string(),
            action,
        };
        let previous = self.entries.insert(entity_id.to_string(), entry);
        if let Err(err) = self.persist() {
            self.restore(entity_id, previous);
            return Err(err.into());
        }
        log::info!("[hotkey] set {entity_id} -> {raw} ({action:?})");

        if !self.enabled {
            return Ok(());
        }

        let results = self.register_all();
        let accelerator = binding.to_string();
        let reported = results.get(&accelerator).copied().unwrap_or(false);
        if reported && self.facility.is_registered(&accelerator) {
            return Ok(());
        }

        log::warn!("[hotkey] OS refused {accelerator} for {entity_id}, rolling back");
        self.restore(entity_id, previous);
        let saved = self.persist();
        self.register_all();
        if let Err(err) = saved {
            // The file still holds the refused binding; report that over the refusal.
            log::error!("[hotkey] failed to persist rollback of {raw}: {err}");
            return Err(err.into());
        }
        Err(HotkeyError::OsRejected(raw.to_string()))
    }

    /// Returns whether `entity_id` had a binding.
    pub fn unregister(&mut self, entity_id: &str) -> Result<bool, HotkeyError> {
        let Some(removed) = self.entries.remove(entity_id) else {
            return Ok(false);
        };
        if let Err(err) = self.persist() {
            self.entries.insert(entity_id.to_string(), removed);
            return Err(err.into());
        }
        log::info!("[hotkey] removed {entity_id} ({})", removed.raw_accelerator);
        if self.enabled {
            self.register_all();
        }
        Ok(true)
    }

    /// Disabling releases every OS shortcut but keeps the entries.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), HotkeyError> {
        let before = self.enabled;
        self.enabled = enabled;
        if let Err(err) = self.persist() {
            self.enabled = before;
            return Err(err.into());
        }
        log::info!("[hotkey] entity hotkeys enabled={enabled}");
        if enabled {
            self.register_all();
        } else {
            self.facility.unregister_all();
        }
        Ok(())
    }

    /// Full registration pass: release everything, then claim every entry.
    /// Returns the facility's per-accelerator result.
    pub fn register_all(&mut self) -> HashMap<String, bool> {
        self.facility.unregister_all();

        let triggers: HashMap<String, HotkeyTrigger> = self
            .entries
            .values()
            .map(|e| (e.binding.to_string(), e.trigger()))
            .collect();
        let accelerators: Vec<String> =
            self.entries.values().map(|e| e.binding.to_string()).collect();
        if accelerators.is_empty() {
            return HashMap::new();
        }

        let sink = self.sink.clone();
        let on_trigger: TriggerCallback = Arc::new(move |accelerator: &str| {
            match triggers.get(accelerator) {
                Some(trigger) => {
                    log::debug!("[hotkey] triggered {} ({})", trigger.entity_id, accelerator);
                    sink.notify(trigger.clone());
                }
                None => log::warn!("[hotkey] trigger for unknown accelerator {accelerator}"),
            }
        });

        let results = self.facility.register_all(&accelerators, on_trigger);
        let results: HashMap<String, bool> = accelerators.into_iter().zip(results).collect();
        let failed = results.values().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!("[hotkey] register pass: {failed} of {} failed", results.len());
        } else {
            log::info!("[hotkey] register pass: {} ok", results.len());
        }
        results
    }

    pub fn shutdown(&mut self) {
        self.facility.unregister_all();
    }

    /// Another entity already holding `raw` (case-insensitive) or, when
    /// given, the same parsed binding.
    fn owner_of(
        &self,
        entity_id: &str,
        raw: &str,
        binding: Option<&AcceleratorBinding>,
    ) -> Option<String> {
        self.entries
            .values()
            .filter(|e| e.entity_id != entity_id)
            .find(|e| {
                e.raw_accelerator.eq_ignore_ascii_case(raw)
                    || binding.is_some_and(|b| *b == e.binding)
            })
            .map(|e| e.entity_id.clone())
    }

    fn restore(&mut self, entity_id: &str, previous: Option<EntityHotkeyEntry>) {
        match previous {
            Some(prev) => {
                self.entries.insert(entity_id.to_string(), prev);
            }
            None => {
                self.entries.remove(entity_id);
            }
        }
    }

    fn persist(&self) -> Result<(), crate::settings::SettingsError> {
        self.store.save_entity_hotkeys(&EntityHotkeysConfig {
            enabled: self.enabled,
            entries: self.entries.values().map(EntityHotkeyEntry::stored).collect(),
        })
    }
}
