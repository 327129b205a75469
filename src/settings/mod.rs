use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::hotkey::HotkeyAction;
use crate::popup::{PopupMode, DEFAULT_TOGGLE_DEBOUNCE};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[cfg(feature = "desktop")]
    #[error("tauri error: {0}")]
    Tauri(#[from] tauri::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted entity hotkey. Older builds stored a bare accelerator string.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum StoredHotkey {
    Legacy(String),
    Full {
        hotkey: String,
        #[serde(default)]
        action: HotkeyAction,
    },
}

impl StoredHotkey {
    fn normalize(self, entity_id: String) -> StoredEntityHotkey {
        match self {
            StoredHotkey::Legacy(accelerator) => StoredEntityHotkey {
                entity_id,
                accelerator,
                action: HotkeyAction::default(),
            },
            StoredHotkey::Full { hotkey, action } => StoredEntityHotkey {
                entity_id,
                accelerator: hotkey,
                action,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    DEFAULT_TOGGLE_DEBOUNCE.as_millis() as u64
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub entity_hotkeys_enabled: bool,
    #[serde(default)]
    pub entity_hotkeys: BTreeMap<String, StoredHotkey>,
    #[serde(default)]
    pub popup_hotkey: Option<String>,
    #[serde(default)]
    pub popup_mode: PopupMode,
    #[serde(default)]
    pub popup_hide_on_release: bool,
    #[serde(default = "default_debounce_ms")]
    pub popup_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entity_hotkeys_enabled: true,
            entity_hotkeys: BTreeMap::new(),
            popup_hotkey: None,
            popup_mode: PopupMode::default(),
            popup_hide_on_release: false,
            popup_debounce_ms: default_debounce_ms(),
        }
    }
}

/// One entity binding in the single shape the rest of the crate uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntityHotkey {
    pub entity_id: String,
    pub accelerator: String,
    pub action: HotkeyAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHotkeysConfig {
    pub enabled: bool,
    pub entries: Vec<StoredEntityHotkey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPopupHotkey {
    pub accelerator: Option<String>,
    pub mode: PopupMode,
    pub hide_on_release: bool,
    pub debounce_ms: u64,
}

impl Default for StoredPopupHotkey {
    fn default() -> Self {
        Settings::default().popup_section()
    }
}

impl Settings {
    fn entity_section(&self) -> EntityHotkeysConfig {
        EntityHotkeysConfig {
            enabled: self.entity_hotkeys_enabled,
            entries: self
                .entity_hotkeys
                .iter()
                .map(|(id, stored)| stored.clone().normalize(id.clone()))
                .collect(),
        }
    }

    fn popup_section(&self) -> StoredPopupHotkey {
        StoredPopupHotkey {
            accelerator: self.popup_hotkey.clone(),
            mode: self.popup_mode,
            hide_on_release: self.popup_hide_on_release,
            debounce_ms: self.popup_debounce_ms,
        }
    }
}

/// Where hotkey bindings and popup flags are loaded from and saved to.
pub trait ConfigStore: Send + Sync {
    fn load_entity_hotkeys(&self) -> EntityHotkeysConfig;
    fn load_popup_hotkey(&self) -> StoredPopupHotkey;
    fn save_entity_hotkeys(&self, config: &EntityHotkeysConfig) -> Result<(), SettingsError>;
    fn save_popup_hotkey(&self, config: &StoredPopupHotkey) -> Result<(), SettingsError>;
}

/// JSON settings file holding both the entity and popup sections.
#[derive(Debug)]
pub struct SettingsStore {
    pub path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    #[cfg(feature = "desktop")]
    pub fn new(app: &tauri::AppHandle) -> Result<Self, SettingsError> {
        use tauri::Manager;

        let dir = app.path().app_data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Self::open(dir.join("hotkeys.json"))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let current = load(&path)?;
        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    pub fn settings(&self) -> Settings {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        f(&mut next);
        save(&self.path, &next)?;
        *guard = next;
        Ok(())
    }
}

impl ConfigStore for SettingsStore {
    fn load_entity_hotkeys(&self) -> EntityHotkeysConfig {
        self.settings().entity_section()
    }

    fn load_popup_hotkey(&self) -> StoredPopupHotkey {
        self.settings().popup_section()
    }

    fn save_entity_hotkeys(&self, config: &EntityHotkeysConfig) -> Result<(), SettingsError> {
        self.update(|s| {
            s.entity_hotkeys_enabled = config.enabled;
            s.entity_hotkeys = config
                .entries
                .iter()
                .map(|e| {
                    (
                        e.entity_id.clone(),
                        StoredHotkey::Full {
                            hotkey: e.accelerator.clone(),
                            action: e.action,
                        },
                    )
                })
                .collect();
        })
    }

    fn save_popup_hotkey(&self, config: &StoredPopupHotkey) -> Result<(), SettingsError> {
        self.update(|s| {
            s.popup_hotkey = config.accelerator.clone();
            s.popup_mode = config.mode;
            s.popup_hide_on_release = config.hide_on_release;
            s.popup_debounce_ms = config.debounce_ms;
        })
    }
}

fn load(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let f = File::open(path)?;
    let r = BufReader::new(f);
    Ok(serde_json::from_reader(r)?)
}

fn save(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let f = File::create(&tmp)?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, settings)?;
        w.write_all(b"\n")?;
        w.flush()?;
    }

    set_private_permissions(&tmp);
    std::fs::rename(&tmp, path)?;
    set_private_permissions(path);
    log::debug!("[settings] saved {}", path.display());
    Ok(())
}

fn set_private_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("hotkeys.json")).unwrap();
        let entities = store.load_entity_hotkeys();
        assert!(entities.enabled);
        assert!(entities.entries.is_empty());
        let popup = store.load_popup_hotkey();
        assert_eq!(popup.accelerator, None);
        assert_eq!(popup.mode, PopupMode::Toggle);
        assert_eq!(popup.debounce_ms, 300);
    }

    #[test]
    fn legacy_and_full_shapes_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotkeys.json");
        std::fs::write(
            &path,
            r#"{
                "entity_hotkeys": {
                    "light.desk": "Ctrl+Alt+1",
                    "fan.office": { "hotkey": "Ctrl+Alt+2", "action": "increase_speed" },
                    "switch.tv": { "hotkey": "Ctrl+Alt+3" }
                }
            }"#,
        )
        .unwrap();

        let store = SettingsStore::open(&path).unwrap();
        let entries = store.load_entity_hotkeys().entries;
        assert_eq!(
            entries,
            vec![
                StoredEntityHotkey {
                    entity_id: "fan.office".into(),
                    accelerator: "Ctrl+Alt+2".into(),
                    action: HotkeyAction::IncreaseSpeed,
                },
                StoredEntityHotkey {
                    entity_id: "light.desk".into(),
                    accelerator: "Ctrl+Alt+1".into(),
                    action: HotkeyAction::Toggle,
                },
                StoredEntityHotkey {
                    entity_id: "switch.tv".into(),
                    accelerator: "Ctrl+Alt+3".into(),
                    action: HotkeyAction::Toggle,
                },
            ]
        );
    }

    #[test]
    fn sections_save_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hotkeys.json");
        let store = SettingsStore::open(&path).unwrap();

        store
            .save_entity_hotkeys(&EntityHotkeysConfig {
                enabled: false,
                entries: vec![StoredEntityHotkey {
                    entity_id: "light.desk".into(),
                    accelerator: "Ctrl+Alt+L".into(),
                    action: HotkeyAction::TurnOn,
                }],
            })
            .unwrap();
        store
            .save_popup_hotkey(&StoredPopupHotkey {
                accelerator: Some("Ctrl+Space".into()),
                mode: PopupMode::Toggle,
                hide_on_release: false,
                debounce_ms: 250,
            })
            .unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        let entities = reopened.load_entity_hotkeys();
        assert!(!entities.enabled);
        assert_eq!(entities.entries.len(), 1);
        assert_eq!(entities.entries[0].action, HotkeyAction::TurnOn);
        let popup = reopened.load_popup_hotkey();
        assert_eq!(popup.accelerator.as_deref(), Some("Ctrl+Space"));
        assert_eq!(popup.mode, PopupMode::Toggle);
        assert_eq!(popup.debounce_ms, 250);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotkeys.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SettingsStore::open(&path),
            Err(SettingsError::Json(_))
        ));
    }
}
