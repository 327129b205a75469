use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use super::{EventSink, HookError, KeyEvent, KeyEventKind, NativeHook};
use crate::accelerator::KeyCode;

// FFI bindings for CoreGraphics
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: extern "C" fn(*const c_void, u32, *const c_void, *mut c_void) -> *const c_void,
        user_info: *mut c_void,
    ) -> *const c_void;
    fn CGEventTapEnable(tap: *const c_void, enable: bool);
    fn CGEventGetFlags(event: *const c_void) -> u64;
    fn CGEventGetIntegerValueField(event: *const c_void, field: u32) -> i64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    static kCFRunLoopDefaultMode: *const c_void;
    fn CFMachPortCreateRunLoopSource(
        allocator: *const c_void,
        port: *const c_void,
        order: i64,
    ) -> *const c_void;
    fn CFRunLoopGetCurrent() -> *const c_void;
    fn CFRunLoopAddSource(rl: *const c_void, source: *const c_void, mode: *const c_void);
    fn CFRunLoopRunInMode(
        mode: *const c_void,
        seconds: f64,
        return_after_source_handled: bool,
    ) -> i32;
    fn CFRelease(cf: *const c_void);
}

const K_CG_SESSION_EVENT_TAP: u32 = 1;
const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;

const K_CG_EVENT_KEY_DOWN: u32 = 10;
const K_CG_EVENT_KEY_UP: u32 = 11;
const K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const K_CG_EVENT_FLAG_MASK_SHIFT: u64 = 1 << 17;
const K_CG_EVENT_FLAG_MASK_CONTROL: u64 = 1 << 18;
const K_CG_EVENT_FLAG_MASK_ALTERNATE: u64 = 1 << 19;
const K_CG_EVENT_FLAG_MASK_COMMAND: u64 = 1 << 20;

const K_CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

// How often the tap thread checks its stop flag.
const RUN_SLICE_SECS: f64 = 0.25;

fn vk_to_key(vk: u16) -> Option<KeyCode> {
    let key = match vk {
        0 => KeyCode::KeyA,
        1 => KeyCode::KeyS,
        2 => KeyCode::KeyD,
        3 => KeyCode::KeyF,
        4 => KeyCode::KeyH,
        5 => KeyCode::KeyG,
        6 => KeyCode::KeyZ,
        7 => KeyCode::KeyX,
        8 => KeyCode::KeyC,
        9 => KeyCode::KeyV,
        11 => KeyCode::KeyB,
        12 => KeyCode::KeyQ,
        13 => KeyCode::KeyW,
        14 => KeyCode::KeyE,
        15 => KeyCode::KeyR,
        16 => KeyCode::KeyY,
        17 => KeyCode::KeyT,
        18 => KeyCode::Digit1,
        19 => KeyCode::Digit2,
        20 => KeyCode::Digit3,
        21 => KeyCode::Digit4,
        22 => KeyCode::Digit6,
        23 => KeyCode::Digit5,
        24 => KeyCode::Equal,
        25 => KeyCode::Digit9,
        26 => KeyCode::Digit7,
        27 => KeyCode::Minus,
        28 => KeyCode::Digit8,
        29 => KeyCode::Digit0,
        30 => KeyCode::BracketRight,
        31 => KeyCode::KeyO,
        32 => KeyCode::KeyU,
        33 => KeyCode::BracketLeft,
        34 => KeyCode::KeyI,
        35 => KeyCode::KeyP,
        36 => KeyCode::Enter,
        37 => KeyCode::KeyL,
        38 => KeyCode::KeyJ,
        39 => KeyCode::Quote,
        40 => KeyCode::KeyK,
        41 => KeyCode::Semicolon,
        42 => KeyCode::Backslash,
        43 => KeyCode::Comma,
        44 => KeyCode::Slash,
        45 => KeyCode::KeyN,
        46 => KeyCode::KeyM,
        47 => KeyCode::Period,
        48 => KeyCode::Tab,
        49 => KeyCode::Space,
        50 => KeyCode::Backquote,
        51 => KeyCode::Backspace,
        53 => KeyCode::Escape,
        57 => KeyCode::CapsLock,
        122 => KeyCode::F1,
        120 => KeyCode::F2,
        99 => KeyCode::F3,
        118 => KeyCode::F4,
        96 => KeyCode::F5,
        97 => KeyCode::F6,
        98 => KeyCode::F7,
        100 => KeyCode::F8,
        101 => KeyCode::F9,
        109 => KeyCode::F10,
        103 => KeyCode::F11,
        111 => KeyCode::F12,
        105 => KeyCode::F13,
        107 => KeyCode::F14,
        113 => KeyCode::F15,
        106 => KeyCode::F16,
        64 => KeyCode::F17,
        79 => KeyCode::F18,
        80 => KeyCode::F19,
        90 => KeyCode::F20,
        114 => KeyCode::Insert,
        115 => KeyCode::Home,
        116 => KeyCode::PageUp,
        117 => KeyCode::Delete,
        119 => KeyCode::End,
        121 => KeyCode::PageDown,
        123 => KeyCode::ArrowLeft,
        124 => KeyCode::ArrowRight,
        125 => KeyCode::ArrowDown,
        126 => KeyCode::ArrowUp,
        _ => return None,
    };
    Some(key)
}

struct TapContext {
    sink: EventSink,
    tap: *const c_void,
}

extern "C" fn event_tap_callback(
    _proxy: *const c_void,
    event_type: u32,
    event: *const c_void,
    user_info: *mut c_void,
) -> *const c_void {
    if user_info.is_null() {
        return event;
    }
    let ctx = unsafe { &*(user_info as *const TapContext) };

    let kind = match event_type {
        K_CG_EVENT_KEY_DOWN => KeyEventKind::Down,
        K_CG_EVENT_KEY_UP => KeyEventKind::Up,
        K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT | K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT => {
            log::warn!("[hook][mac] tap disabled by system, re-enabling");
            unsafe { CGEventTapEnable(ctx.tap, true) };
            return event;
        }
        _ => return event,
    };

    let (vk, flags) = unsafe {
        (
            CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_KEYCODE) as u16,
            CGEventGetFlags(event),
        )
    };
    if let Some(key) = vk_to_key(vk) {
        ctx.sink.push(KeyEvent {
            kind,
            key,
            ctrl: flags & K_CG_EVENT_FLAG_MASK_CONTROL != 0,
            alt: flags & K_CG_EVENT_FLAG_MASK_ALTERNATE != 0,
            shift: flags & K_CG_EVENT_FLAG_MASK_SHIFT != 0,
            meta: flags & K_CG_EVENT_FLAG_MASK_COMMAND != 0,
        });
    }
    event
}

fn run_tap(sink: EventSink, stop: Arc<AtomicBool>, ready: mpsc::Sender<Result<(), String>>) {
    let mask = (1u64 << K_CG_EVENT_KEY_DOWN) | (1u64 << K_CG_EVENT_KEY_UP);
    let ctx = Box::into_raw(Box::new(TapContext {
        sink,
        tap: std::ptr::null(),
    }));

    unsafe {
        let tap = CGEventTapCreate(
            K_CG_SESSION_EVENT_TAP,
            K_CG_HEAD_INSERT_EVENT_TAP,
            K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
            mask,
            event_tap_callback,
            ctx as *mut c_void,
        );
        if tap.is_null() {
            drop(Box::from_raw(ctx));
            let _ = ready.send(Err(
                "failed to create event tap (need Accessibility permission?)".to_string(),
            ));
            return;
        }
        (*ctx).tap = tap;

        let source = CFMachPortCreateRunLoopSource(std::ptr::null(), tap, 0);
        if source.is_null() {
            CFRelease(tap);
            drop(Box::from_raw(ctx));
            let _ = ready.send(Err("failed to create run loop source".to_string()));
            return;
        }

        CFRunLoopAddSource(CFRunLoopGetCurrent(), source, kCFRunLoopDefaultMode);
        CGEventTapEnable(tap, true);
        let _ = ready.send(Ok(()));

        while !stop.load(Ordering::Relaxed) {
            CFRunLoopRunInMode(kCFRunLoopDefaultMode, RUN_SLICE_SECS, false);
        }

        CGEventTapEnable(tap, false);
        CFRelease(source);
        CFRelease(tap);
        drop(Box::from_raw(ctx));
    }
}

#[derive(Default)]
pub struct MacHook {
    thread: Option<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl NativeHook for MacHook {
    fn start(&mut self, sink: EventSink) -> Result<(), HookError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let stop_thread = stop.clone();
        let handle = thread::Builder::new()
            .name("keydeck-hook".into())
            .spawn(move || run_tap(sink, stop_thread, ready_tx))
            .map_err(|e| HookError::StartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("[hook][mac] event tap installed");
                self.thread = Some(handle);
                self.stop = stop;
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(HookError::StartFailed(err))
            }
            Err(_) => {
                let _ = handle.join();
                Err(HookError::StartFailed("event tap thread exited".to_string()))
            }
        }
    }

    fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            log::warn!("[hook][mac] event tap thread panicked");
        }
        log::info!("[hook][mac] event tap removed");
    }
}
