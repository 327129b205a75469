use std::ffi::c_void;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use super::{EventSink, HookError, KeyEvent, KeyEventKind, NativeHook};
use crate::accelerator::KeyCode;

// FFI bindings for Windows API
#[link(name = "user32")]
extern "system" {
    fn SetWindowsHookExW(
        id_hook: i32,
        lpfn: extern "system" fn(i32, usize, isize) -> isize,
        h_mod: *const c_void,
        dw_thread_id: u32,
    ) -> isize;
    fn CallNextHookEx(h_hook: isize, n_code: i32, w_param: usize, l_param: isize) -> isize;
    fn UnhookWindowsHookEx(h_hook: isize) -> i32;
    fn GetMessageW(
        lp_msg: *mut MSG,
        h_wnd: *const c_void,
        w_msg_filter_min: u32,
        w_msg_filter_max: u32,
    ) -> i32;
    fn TranslateMessage(lp_msg: *const MSG) -> i32;
    fn DispatchMessageW(lp_msg: *const MSG) -> isize;
    fn PostThreadMessageW(id_thread: u32, msg: u32, w_param: usize, l_param: isize) -> i32;
    fn GetAsyncKeyState(v_key: i32) -> i16;
}

#[link(name = "kernel32")]
extern "system" {
    fn GetCurrentThreadId() -> u32;
}

#[allow(dead_code)]
#[repr(C)]
struct MSG {
    hwnd: *const c_void,
    message: u32,
    w_param: usize,
    l_param: isize,
    time: u32,
    pt: POINT,
}

#[allow(dead_code)]
#[repr(C)]
struct POINT {
    x: i32,
    y: i32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct KBDLLHOOKSTRUCT {
    vk_code: u32,
    scan_code: u32,
    flags: u32,
    time: u32,
    dw_extra_info: usize,
}

const WH_KEYBOARD_LL: i32 = 13;
const WM_KEYDOWN: usize = 0x0100;
const WM_KEYUP: usize = 0x0101;
const WM_SYSKEYDOWN: usize = 0x0104;
const WM_SYSKEYUP: usize = 0x0105;
const WM_QUIT: u32 = 0x0012;

const VK_LWIN: i32 = 0x5B;
const VK_RWIN: i32 = 0x5C;
const VK_MENU: i32 = 0x12; // Alt
const VK_SHIFT: i32 = 0x10;
const VK_CONTROL: i32 = 0x11;

fn vk_to_key(vk: u32) -> Option<KeyCode> {
    match vk {
        0x41..=0x5A => KeyCode::letter(char::from(vk as u8)),
        0x30..=0x39 => KeyCode::digit(vk - 0x30),
        0x70..=0x87 => KeyCode::function(vk - 0x70 + 1),
        0x20 => Some(KeyCode::Space),
        0x0D => Some(KeyCode::Enter),
        0x09 => Some(KeyCode::Tab),
        0x1B => Some(KeyCode::Escape),
        0x08 => Some(KeyCode::Backspace),
        0x2E => Some(KeyCode::Delete),
        0x2D => Some(KeyCode::Insert),
        0x24 => Some(KeyCode::Home),
        0x23 => Some(KeyCode::End),
        0x21 => Some(KeyCode::PageUp),
        0x22 => Some(KeyCode::PageDown),
        0x25 => Some(KeyCode::ArrowLeft),
        0x26 => Some(KeyCode::ArrowUp),
        0x27 => Some(KeyCode::ArrowRight),
        0x28 => Some(KeyCode::ArrowDown),
        0xBD => Some(KeyCode::Minus),
        0xBB => Some(KeyCode::Equal),
        0xBC => Some(KeyCode::Comma),
        0xBE => Some(KeyCode::Period),
        0xBF => Some(KeyCode::Slash),
        0xBA => Some(KeyCode::Semicolon),
        0xDE => Some(KeyCode::Quote),
        0xC0 => Some(KeyCode::Backquote),
        0xDB => Some(KeyCode::BracketLeft),
        0xDD => Some(KeyCode::BracketRight),
        0xDC => Some(KeyCode::Backslash),
        0x14 => Some(KeyCode::CapsLock),
        0x2C => Some(KeyCode::PrintScreen),
        0x13 => Some(KeyCode::Pause),
        _ => None,
    }
}

fn key_down(vk: i32) -> bool {
    unsafe { GetAsyncKeyState(vk) < 0 }
}

// The hook procedure has no user-data slot, so the sink lives here.
static SINK: Mutex<Option<EventSink>> = Mutex::new(None);

extern "system" fn keyboard_hook_proc(n_code: i32, w_param: usize, l_param: isize) -> isize {
    if n_code >= 0 {
        let kind = match w_param {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyEventKind::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyEventKind::Up),
            _ => None,
        };
        let hook_struct = unsafe { *(l_param as *const KBDLLHOOKSTRUCT) };

        if let (Some(kind), Some(key)) = (kind, vk_to_key(hook_struct.vk_code)) {
            let sink = SINK.lock().ok().and_then(|g| g.clone());
            if let Some(sink) = sink {
                sink.push(KeyEvent {
                    kind,
                    key,
                    ctrl: key_down(VK_CONTROL),
                    alt: key_down(VK_MENU),
                    shift: key_down(VK_SHIFT),
                    meta: key_down(VK_LWIN) || key_down(VK_RWIN),
                });
            }
        }
    }

    unsafe { CallNextHookEx(0, n_code, w_param, l_param) }
}

fn message_loop(ready: mpsc::Sender<Result<u32, String>>) {
    unsafe {
        let hook = SetWindowsHookExW(WH_KEYBOARD_LL, keyboard_hook_proc, std::ptr::null(), 0);
        if hook == 0 {
            let _ = ready.send(Err("SetWindowsHookExW failed".to_string()));
            return;
        }
        let _ = ready.send(Ok(GetCurrentThreadId()));

        let mut msg = MSG {
            hwnd: std::ptr::null(),
            message: 0,
            w_param: 0,
            l_param: 0,
            time: 0,
            pt: POINT { x: 0, y: 0 },
        };

        // GetMessageW returns 0 on WM_QUIT.
        while GetMessageW(&mut msg, std::ptr::null(), 0, 0) > 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        UnhookWindowsHookEx(hook);
    }
}

#[derive(Default)]
pub struct WindowsHook {
    thread: Option<thread::JoinHandle<()>>,
    thread_id: u32,
}

impl NativeHook for WindowsHook {
    fn start(&mut self, sink: EventSink) -> Result<(), HookError> {
        if let Ok(mut g) = SINK.lock() {
            *g = Some(sink);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("keydeck-hook".into())
            .spawn(move || message_loop(ready_tx))
            .map_err(|e| HookError::StartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                log::info!("[hook][win] WH_KEYBOARD_LL installed thread={thread_id}");
                self.thread = Some(handle);
                self.thread_id = thread_id;
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                clear_sink();
                Err(HookError::StartFailed(err))
            }
            Err(_) => {
                let _ = handle.join();
                clear_sink();
                Err(HookError::StartFailed("hook thread exited".to_string()))
            }
        }
    }

    fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        unsafe {
            PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0);
        }
        if handle.join().is_err() {
            log::warn!("[hook][win] hook thread panicked");
        }
        clear_sink();
        log::info!("[hook][win] unhooked");
    }
}

fn clear_sink() {
    if let Ok(mut g) = SINK.lock() {
        *g = None;
    }
}
