pub mod accelerator;
pub mod hook;
pub mod hotkey;
pub mod logging;
pub mod popup;
pub mod service;
pub mod settings;

#[cfg(feature = "desktop")]
pub mod commands;
#[cfg(feature = "desktop")]
pub mod desktop;

#[cfg(test)]
mod testing;

use crate::accelerator::RejectionReason;
use crate::settings::SettingsError;

pub use crate::accelerator::{parse, validate, AcceleratorBinding, KeyCode};
pub use crate::hotkey::{HotkeyAction, HotkeyTrigger};
pub use crate::popup::PopupMode;
pub use crate::service::{HotkeyService, HotkeyStatus};

#[cfg(feature = "desktop")]
pub use crate::desktop::{init, HotkeyState};

/// Errors surfaced by every mutating hotkey operation.
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid accelerator '{accelerator}': {reason}")]
    InvalidAccelerator {
        accelerator: String,
        reason: RejectionReason,
    },
    #[error("'{accelerator}' is already bound to {owner}")]
    Conflict { accelerator: String, owner: String },
    #[error("the OS refused to register '{0}' (is another app using it?)")]
    OsRejected(String),
    #[error("popup hotkey unavailable: {0}")]
    HookUnavailable(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
