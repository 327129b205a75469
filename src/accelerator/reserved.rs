use super::{AcceleratorBinding, KeyCode};

const fn ctrl(key: KeyCode) -> AcceleratorBinding {
    AcceleratorBinding::new(true, false, false, false, key)
}

const fn win(key: KeyCode) -> AcceleratorBinding {
    AcceleratorBinding::new(false, false, false, true, key)
}

// System combinations that can never be claimed. Compared structurally, so
// token order and case in the user's string do not matter.
const RESERVED: &[AcceleratorBinding] = &[
    AcceleratorBinding::new(true, true, false, false, KeyCode::Delete),
    AcceleratorBinding::new(false, true, false, false, KeyCode::F4),
    ctrl(KeyCode::KeyC),
    ctrl(KeyCode::KeyV),
    ctrl(KeyCode::KeyX),
    ctrl(KeyCode::KeyZ),
    ctrl(KeyCode::KeyA),
    ctrl(KeyCode::KeyS),
    ctrl(KeyCode::KeyO),
    ctrl(KeyCode::KeyN),
    ctrl(KeyCode::KeyW),
    ctrl(KeyCode::KeyR),
    AcceleratorBinding::new(false, true, false, false, KeyCode::Tab),
    ctrl(KeyCode::Tab),
    AcceleratorBinding::new(true, false, true, false, KeyCode::Tab),
    AcceleratorBinding::new(false, true, true, false, KeyCode::Tab),
    win(KeyCode::KeyL),
    win(KeyCode::KeyR),
    win(KeyCode::KeyE),
    win(KeyCode::KeyD),
    win(KeyCode::KeyM),
    win(KeyCode::Tab),
];

pub fn is_reserved(binding: &AcceleratorBinding) -> bool {
    RESERVED.contains(binding)
}
