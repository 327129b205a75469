mod reserved;

use std::fmt;

use crate::hook::KeyEvent;

pub use reserved::is_reserved;

/// Physical key that can act as the main key of an accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
    KeyG,
    KeyH,
    KeyI,
    KeyJ,
    KeyK,
    KeyL,
    KeyM,
    KeyN,
    KeyO,
    KeyP,
    KeyQ,
    KeyR,
    KeyS,
    KeyT,
    KeyU,
    KeyV,
    KeyW,
    KeyX,
    KeyY,
    KeyZ,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
    Space,
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Minus,
    Equal,
    Comma,
    Period,
    Slash,
    Semicolon,
    Quote,
    Backquote,
    BracketLeft,
    BracketRight,
    Backslash,
    CapsLock,
    PrintScreen,
    Pause,
}

const LETTERS: [KeyCode; 26] = [
    KeyCode::KeyA,
    KeyCode::KeyB,
    KeyCode::KeyC,
    KeyCode::KeyD,
    KeyCode::KeyE,
    KeyCode::KeyF,
    KeyCode::KeyG,
    KeyCode::KeyH,
    KeyCode::KeyI,
    KeyCode::KeyJ,
    KeyCode::KeyK,
    KeyCode::KeyL,
    KeyCode::KeyM,
    KeyCode::KeyN,
    KeyCode::KeyO,
    KeyCode::KeyP,
    KeyCode::KeyQ,
    KeyCode::KeyR,
    KeyCode::KeyS,
    KeyCode::KeyT,
    KeyCode::KeyU,
    KeyCode::KeyV,
    KeyCode::KeyW,
    KeyCode::KeyX,
    KeyCode::KeyY,
    KeyCode::KeyZ,
];

const DIGITS: [KeyCode; 10] = [
    KeyCode::Digit0,
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

const FUNCTION_KEYS: [KeyCode; 24] = [
    KeyCode::F1,
    KeyCode::F2,
    KeyCode::F3,
    KeyCode::F4,
    KeyCode::F5,
    KeyCode::F6,
    KeyCode::F7,
    KeyCode::F8,
    KeyCode::F9,
    KeyCode::F10,
    KeyCode::F11,
    KeyCode::F12,
    KeyCode::F13,
    KeyCode::F14,
    KeyCode::F15,
    KeyCode::F16,
    KeyCode::F17,
    KeyCode::F18,
    KeyCode::F19,
    KeyCode::F20,
    KeyCode::F21,
    KeyCode::F22,
    KeyCode::F23,
    KeyCode::F24,
];

impl KeyCode {
    /// Letter key for an ASCII letter, case-insensitive.
    pub fn letter(ch: char) -> Option<KeyCode> {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let idx = (ch.to_ascii_lowercase() as u8 - b'a') as usize;
        LETTERS.get(idx).copied()
    }

    pub fn digit(n: u32) -> Option<KeyCode> {
        DIGITS.get(n as usize).copied()
    }

    /// `F1` is `function(1)`.
    pub fn function(n: u32) -> Option<KeyCode> {
        n.checked_sub(1)
            .and_then(|idx| FUNCTION_KEYS.get(idx as usize))
            .copied()
    }

    /// Look up a lower-cased, trimmed accelerator token.
    pub fn from_token(token: &str) -> Option<KeyCode> {
        let mut chars = token.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return KeyCode::letter(ch);
            }
            if let Some(n) = ch.to_digit(10) {
                return KeyCode::digit(n);
            }
        }

        if let Some(num) = token.strip_prefix('f') {
            if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
                return num.parse::<u32>().ok().and_then(KeyCode::function);
            }
        }
        if let Some(num) = token.strip_prefix("digit") {
            return num.parse::<u32>().ok().and_then(KeyCode::digit);
        }
        if let Some(letter) = token.strip_prefix("key") {
            let mut chars = letter.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => KeyCode::letter(ch),
                _ => None,
            };
        }

        let key = match token {
            "space" | "spacebar" => KeyCode::Space,
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "escape" | "esc" => KeyCode::Escape,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "insert" | "ins" => KeyCode::Insert,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "up" | "arrowup" => KeyCode::ArrowUp,
            "down" | "arrowdown" => KeyCode::ArrowDown,
            "left" | "arrowleft" => KeyCode::ArrowLeft,
            "right" | "arrowright" => KeyCode::ArrowRight,
            "-" | "minus" => KeyCode::Minus,
            "=" | "equal" => KeyCode::Equal,
            "," | "comma" => KeyCode::Comma,
            "." | "period" => KeyCode::Period,
            "/" | "slash" => KeyCode::Slash,
            ";" | "semicolon" => KeyCode::Semicolon,
            "'" | "quote" => KeyCode::Quote,
            "`" | "backquote" => KeyCode::Backquote,
            "[" | "bracketleft" => KeyCode::BracketLeft,
            "]" | "bracketright" => KeyCode::BracketRight,
            "\\" | "backslash" => KeyCode::Backslash,
            "capslock" => KeyCode::CapsLock,
            "printscreen" | "prtsc" => KeyCode::PrintScreen,
            "pause" => KeyCode::Pause,
            _ => return None,
        };
        Some(key)
    }

    /// Canonical token, understood by the global-shortcut parser.
    pub fn name(self) -> &'static str {
        match self {
            KeyCode::KeyA => "A",
            KeyCode::KeyB => "B",
            KeyCode::KeyC => "C",
            KeyCode::KeyD => "D",
            KeyCode::KeyE => "E",
            KeyCode::KeyF => "F",
            KeyCode::KeyG => "G",
            KeyCode::KeyH => "H",
            KeyCode::KeyI => "I",
            KeyCode::KeyJ => "J",
            KeyCode::KeyK => "K",
            KeyCode::KeyL => "L",
            KeyCode::KeyM => "M",
            KeyCode::KeyN => "N",
            KeyCode::KeyO => "O",
            KeyCode::KeyP => "P",
            KeyCode::KeyQ => "Q",
            KeyCode::KeyR => "R",
            KeyCode::KeyS => "S",
            KeyCode::KeyT => "T",
            KeyCode::KeyU => "U",
            KeyCode::KeyV => "V",
            KeyCode::KeyW => "W",
            KeyCode::KeyX => "X",
            KeyCode::KeyY => "Y",
            KeyCode::KeyZ => "Z",
            KeyCode::Digit0 => "0",
            KeyCode::Digit1 => "1",
            KeyCode::Digit2 => "2",
            KeyCode::Digit3 => "3",
            KeyCode::Digit4 => "4",
            KeyCode::Digit5 => "5",
            KeyCode::Digit6 => "6",
            KeyCode::Digit7 => "7",
            KeyCode::Digit8 => "8",
            KeyCode::Digit9 => "9",
            KeyCode::F1 => "F1",
            KeyCode::F2 => "F2",
            KeyCode::F3 => "F3",
            KeyCode::F4 => "F4",
            KeyCode::F5 => "F5",
            KeyCode::F6 => "F6",
            KeyCode::F7 => "F7",
            KeyCode::F8 => "F8",
            KeyCode::F9 => "F9",
            KeyCode::F10 => "F10",
            KeyCode::F11 => "F11",
            KeyCode::F12 => "F12",
            KeyCode::F13 => "F13",
            KeyCode::F14 => "F14",
            KeyCode::F15 => "F15",
            KeyCode::F16 => "F16",
            KeyCode::F17 => "F17",
            KeyCode::F18 => "F18",
            KeyCode::F19 => "F19",
            KeyCode::F20 => "F20",
            KeyCode::F21 => "F21",
            KeyCode::F22 => "F22",
            KeyCode::F23 => "F23",
            KeyCode::F24 => "F24",
            KeyCode::Space => "Space",
            KeyCode::Enter => "Enter",
            KeyCode::Tab => "Tab",
            KeyCode::Escape => "Escape",
            KeyCode::Backspace => "Backspace",
            KeyCode::Delete => "Delete",
            KeyCode::Insert => "Insert",
            KeyCode::Home => "Home",
            KeyCode::End => "End",
            KeyCode::PageUp => "PageUp",
            KeyCode::PageDown => "PageDown",
            KeyCode::ArrowUp => "ArrowUp",
            KeyCode::ArrowDown => "ArrowDown",
            KeyCode::ArrowLeft => "ArrowLeft",
            KeyCode::ArrowRight => "ArrowRight",
            KeyCode::Minus => "Minus",
            KeyCode::Equal => "Equal",
            KeyCode::Comma => "Comma",
            KeyCode::Period => "Period",
            KeyCode::Slash => "Slash",
            KeyCode::Semicolon => "Semicolon",
            KeyCode::Quote => "Quote",
            KeyCode::Backquote => "Backquote",
            KeyCode::BracketLeft => "BracketLeft",
            KeyCode::BracketRight => "BracketRight",
            KeyCode::Backslash => "Backslash",
            KeyCode::CapsLock => "CapsLock",
            KeyCode::PrintScreen => "PrintScreen",
            KeyCode::Pause => "Pause",
        }
    }
}

/// A parsed key combination: four modifier flags plus exactly one main key.
///
/// Only produced by [`parse`] (or the reserved table), so a binding always
/// carries a known main key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcceleratorBinding {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub main_key: KeyCode,
}

impl AcceleratorBinding {
    pub(crate) const fn new(
        ctrl: bool,
        alt: bool,
        shift: bool,
        meta: bool,
        main_key: KeyCode,
    ) -> Self {
        Self {
            ctrl,
            alt,
            shift,
            meta,
            main_key,
        }
    }

    /// Keycode equality plus exact equality of all four modifiers.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.main_key == event.key
            && self.ctrl == event.ctrl
            && self.alt == event.alt
            && self.shift == event.shift
            && self.meta == event.meta
    }
}

impl fmt::Display for AcceleratorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.meta {
            f.write_str("Super+")?;
        }
        f.write_str(self.main_key.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("accelerator is empty")]
    Empty,
    #[error("accelerator has no main key")]
    NoMainKey,
    #[error("accelerator has more than one main key")]
    AmbiguousMainKey,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("shortcut is reserved by the system")]
    ReservedShortcut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

fn modifier(token: &str) -> Option<Modifier> {
    match token {
        "ctrl" | "control" | "commandorcontrol" | "cmdorctrl" => Some(Modifier::Ctrl),
        "alt" | "option" => Some(Modifier::Alt),
        "shift" => Some(Modifier::Shift),
        "meta" | "cmd" | "command" | "super" | "win" => Some(Modifier::Meta),
        _ => None,
    }
}

/// Parse an accelerator such as `"Ctrl+Shift+L"`.
///
/// Tokens are split on `+`, trimmed and compared case-insensitively. Repeated
/// modifier aliases collapse onto the same flag; every other token is a main
/// key candidate and exactly one is allowed.
pub fn parse(raw: &str) -> Result<AcceleratorBinding, RejectionReason> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RejectionReason::Empty);
    }

    let (mut ctrl, mut alt, mut shift, mut meta) = (false, false, false, false);
    let mut main_tokens: Vec<String> = Vec::new();

    for token in raw.split('+').map(|t| t.trim().to_lowercase()) {
        if token.is_empty() {
            continue;
        }
        match modifier(&token) {
            Some(Modifier::Ctrl) => ctrl = true,
            Some(Modifier::Alt) => alt = true,
            Some(Modifier::Shift) => shift = true,
            Some(Modifier::Meta) => meta = true,
            None => main_tokens.push(token),
        }
    }

    let token = match main_tokens.as_slice() {
        [] => return Err(RejectionReason::NoMainKey),
        [token] => token,
        _ => return Err(RejectionReason::AmbiguousMainKey),
    };
    let main_key =
        KeyCode::from_token(token).ok_or_else(|| RejectionReason::UnknownKey(token.clone()))?;

    let binding = AcceleratorBinding::new(ctrl, alt, shift, meta, main_key);
    if is_reserved(&binding) {
        return Err(RejectionReason::ReservedShortcut);
    }
    Ok(binding)
}

pub fn validate(raw: &str) -> bool {
    parse(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ctrl_shift_letter() {
        let b = parse("Ctrl+Shift+L").unwrap();
        assert_eq!(
            b,
            AcceleratorBinding {
                ctrl: true,
                alt: false,
                shift: true,
                meta: false,
                main_key: KeyCode::KeyL,
            }
        );
        assert_eq!(b.to_string(), "Ctrl+Shift+L");
    }

    #[test]
    fn modifier_only_has_no_main_key() {
        for raw in ["Ctrl+Shift", "alt", "Cmd+Command+Super", "CmdOrCtrl+Control"] {
            assert_eq!(parse(raw), Err(RejectionReason::NoMainKey), "{raw}");
        }
    }

    #[test]
    fn aliases_collapse_onto_one_modifier() {
        let b = parse("Control+CmdOrCtrl+ctrl+K").unwrap();
        assert!(b.ctrl);
        assert!(!b.alt && !b.shift && !b.meta);
        assert_eq!(b.main_key, KeyCode::KeyK);

        let b = parse("Option+Command+Space").unwrap();
        assert!(b.alt && b.meta);
        assert_eq!(b.main_key, KeyCode::Space);
    }

    #[test]
    fn two_main_keys_are_ambiguous() {
        assert_eq!(parse("Ctrl+A+B"), Err(RejectionReason::AmbiguousMainKey));
        assert_eq!(parse("Ctrl+nope+B"), Err(RejectionReason::AmbiguousMainKey));
    }

    #[test]
    fn unknown_key_is_reported() {
        assert_eq!(
            parse("Ctrl+Hyper"),
            Err(RejectionReason::UnknownKey("hyper".to_string()))
        );
        assert_eq!(parse("Ctrl+F25"), Err(RejectionReason::UnknownKey("f25".to_string())));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse(""), Err(RejectionReason::Empty));
        assert_eq!(parse("   "), Err(RejectionReason::Empty));
        assert_eq!(parse("+"), Err(RejectionReason::NoMainKey));
    }

    #[test]
    fn reserved_is_case_and_order_insensitive() {
        for raw in [
            "alt+F4",
            "F4+Alt",
            "ALT + f4",
            "ctrl+alt+del",
            "Del+Alt+Control",
            "Tab+Shift+Ctrl",
            "win+L",
            "Super+d",
        ] {
            assert_eq!(parse(raw), Err(RejectionReason::ReservedShortcut), "{raw}");
        }
    }

    #[test]
    fn near_reserved_combinations_are_allowed() {
        assert!(validate("Ctrl+Shift+C"));
        assert!(validate("Alt+F5"));
        assert!(validate("Ctrl+Alt+Shift+Tab"));
    }

    #[test]
    fn token_lookup_covers_named_keys() {
        assert_eq!(KeyCode::from_token("esc"), Some(KeyCode::Escape));
        assert_eq!(KeyCode::from_token("f12"), Some(KeyCode::F12));
        assert_eq!(KeyCode::from_token("7"), Some(KeyCode::Digit7));
        assert_eq!(KeyCode::from_token("digit7"), Some(KeyCode::Digit7));
        assert_eq!(KeyCode::from_token("keyq"), Some(KeyCode::KeyQ));
        assert_eq!(KeyCode::from_token("pgdn"), Some(KeyCode::PageDown));
        assert_eq!(KeyCode::from_token("f"), Some(KeyCode::KeyF));
        assert_eq!(KeyCode::from_token("f0"), None);
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse("Meta+Alt+Up"), parse("Meta+Alt+Up"));
        assert_eq!(parse("meta+alt+up").unwrap().to_string(), "Alt+Super+ArrowUp");
    }
}
