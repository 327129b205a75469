use tauri::State;

use crate::desktop::HotkeyState;
use crate::hotkey::HotkeyAction;
use crate::popup::PopupMode;
use crate::service::{EntityHotkeyInfo, HotkeyStatus};

/// Invoke handler covering every command below, for the host's builder.
pub fn handler() -> impl Fn(tauri::ipc::Invoke<tauri::Wry>) -> bool + Send + Sync + 'static {
    tauri::generate_handler![
        hotkey_status,
        list_entity_hotkeys,
        set_entity_hotkey,
        remove_entity_hotkey,
        set_entity_hotkeys_enabled,
        set_popup_hotkey,
        clear_popup_hotkey,
        set_popup_mode,
        set_popup_hide_on_release,
        validate_accelerator
    ]
}

#[tauri::command]
pub fn hotkey_status(state: State<'_, HotkeyState>) -> Result<HotkeyStatus, String> {
    Ok(state.lock().status())
}

#[tauri::command]
pub fn list_entity_hotkeys(state: State<'_, HotkeyState>) -> Result<Vec<EntityHotkeyInfo>, String> {
    Ok(state.lock().entity_hotkeys())
}

#[tauri::command]
pub fn set_entity_hotkey(
    state: State<'_, HotkeyState>,
    entity_id: String,
    accelerator: String,
    action: Option<HotkeyAction>,
) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.set_entity_hotkey(&entity_id, &accelerator, action.unwrap_or_default())
        .map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn remove_entity_hotkey(
    state: State<'_, HotkeyState>,
    entity_id: String,
) -> Result<bool, String> {
    state
        .lock()
        .remove_entity_hotkey(&entity_id)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_entity_hotkeys_enabled(
    state: State<'_, HotkeyState>,
    enabled: bool,
) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.set_entity_hotkeys_enabled(enabled).map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn set_popup_hotkey(
    state: State<'_, HotkeyState>,
    accelerator: String,
) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.set_popup_hotkey(&accelerator).map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn clear_popup_hotkey(state: State<'_, HotkeyState>) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.clear_popup_hotkey().map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn set_popup_mode(
    state: State<'_, HotkeyState>,
    mode: PopupMode,
) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.set_popup_mode(mode).map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn set_popup_hide_on_release(
    state: State<'_, HotkeyState>,
    hide_on_release: bool,
) -> Result<HotkeyStatus, String> {
    let mut svc = state.lock();
    svc.set_popup_hide_on_release(hide_on_release)
        .map_err(|e| e.to_string())?;
    Ok(svc.status())
}

#[tauri::command]
pub fn validate_accelerator(
    state: State<'_, HotkeyState>,
    accelerator: String,
) -> Result<bool, String> {
    Ok(state.lock().validate(&accelerator))
}
