//! Windows global hotkey implementation built on `RegisterHotKey`.
//!
//! `RegisterHotKey` ties a hotkey to the registering thread's message
//! queue, so a dedicated thread owns every registration and polls its
//! queue for `WM_HOTKEY`. Install and remove requests arrive over a
//! command channel and are answered synchronously.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use tracing::warn;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT, MOD_WIN,
};
use windows::Win32::UI::WindowsAndMessaging::{PeekMessageW, MSG, PM_REMOVE, WM_HOTKEY};

use modkit_core::HotkeyCallback;

use super::{parse_key_combo, HookError, KeyCombo, KeyToken, KeyboardHook, NamedKey};

/// How often the hotkey thread polls its command channel and message queue.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

enum HookCommand {
    Install {
        key: String,
        combo: KeyCombo,
        callback: HotkeyCallback,
        reply: Sender<Result<(), HookError>>,
    },
    Remove {
        key: String,
        reply: Sender<Result<(), HookError>>,
    },
}

/// Windows hotkey backend. Handle to the dedicated hotkey thread.
pub struct WindowsHotkeyHook {
    tx: Sender<HookCommand>,
}

impl WindowsHotkeyHook {
    /// Spawns the hotkey thread and returns a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InstallFailed`] if the thread cannot be spawned.
    pub fn spawn() -> Result<Self, HookError> {
        let (tx, rx) = mpsc::channel::<HookCommand>();

        thread::Builder::new()
            .name("modkit-hotkey-loop".to_string())
            .spawn(move || run_hotkey_loop(rx))
            .map_err(|e| HookError::InstallFailed {
                key: String::new(),
                reason: format!("hotkey thread spawn failed: {e}"),
            })?;

        Ok(Self { tx })
    }

    fn round_trip(
        &self,
        make: impl FnOnce(Sender<Result<(), HookError>>) -> HookCommand,
        key: &str,
    ) -> Result<(), HookError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| hook_thread_gone(key))?;
        reply_rx.recv().map_err(|_| hook_thread_gone(key))?
    }
}

fn hook_thread_gone(key: &str) -> HookError {
    HookError::InstallFailed {
        key: key.to_string(),
        reason: "hotkey thread terminated".to_string(),
    }
}

impl KeyboardHook for WindowsHotkeyHook {
    fn install(&self, key: &str, callback: HotkeyCallback) -> Result<(), HookError> {
        let combo = parse_key_combo(key)?;
        self.round_trip(
            |reply| HookCommand::Install {
                key: key.to_string(),
                combo,
                callback,
                reply,
            },
            key,
        )
    }

    fn remove(&self, key: &str) -> Result<(), HookError> {
        self.round_trip(
            |reply| HookCommand::Remove {
                key: key.to_string(),
                reply,
            },
            key,
        )
    }
}

/// Entry point for the dedicated hotkey thread.
///
/// Exits when the command channel disconnects, unregistering every hotkey
/// it still holds.
fn run_hotkey_loop(rx: Receiver<HookCommand>) {
    let mut next_id: i32 = 1;
    // key string -> registered id; id -> callback to invoke on WM_HOTKEY.
    let mut ids_by_key: HashMap<String, i32> = HashMap::new();
    let mut callbacks: HashMap<i32, HotkeyCallback> = HashMap::new();

    loop {
        // Drain pending install/remove commands.
        loop {
            match rx.try_recv() {
                Ok(HookCommand::Install {
                    key,
                    combo,
                    callback,
                    reply,
                }) => {
                    // Reinstall replaces the prior registration for this key.
                    if let Some(old_id) = ids_by_key.remove(&key) {
                        unregister(old_id);
                        callbacks.remove(&old_id);
                    }

                    let id = next_id;
                    let result = register(id, &combo, &key);
                    if result.is_ok() {
                        next_id += 1;
                        ids_by_key.insert(key, id);
                        callbacks.insert(id, callback);
                    }
                    let _ = reply.send(result);
                }
                Ok(HookCommand::Remove { key, reply }) => {
                    let result = match ids_by_key.remove(&key) {
                        Some(id) => {
                            unregister(id);
                            callbacks.remove(&id);
                            Ok(())
                        }
                        None => Err(HookError::NotInstalled(key)),
                    };
                    let _ = reply.send(result);
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    for id in ids_by_key.values() {
                        unregister(*id);
                    }
                    return;
                }
            }
        }

        // Dispatch any queued WM_HOTKEY messages.
        let mut msg = MSG::default();
        // SAFETY: PeekMessageW with PM_REMOVE on the calling thread's own
        // queue; msg is a valid out-pointer for the duration of the call.
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_HOTKEY {
                let id = msg.wParam.0 as i32;
                if let Some(callback) = callbacks.get(&id) {
                    callback();
                }
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn register(id: i32, combo: &KeyCombo, key: &str) -> Result<(), HookError> {
    let mut modifiers = MOD_NOREPEAT;
    if combo.ctrl {
        modifiers |= MOD_CONTROL;
    }
    if combo.alt {
        modifiers |= MOD_ALT;
    }
    if combo.shift {
        modifiers |= MOD_SHIFT;
    }
    if combo.meta {
        modifiers |= MOD_WIN;
    }

    let vk = virtual_key_code(&combo.key);

    // SAFETY: Registers on the calling thread's queue with a process-unique
    // id; no window handle is needed for thread-scoped hotkeys.
    unsafe { RegisterHotKey(None, id, modifiers, vk) }.map_err(|e| {
        HookError::InstallFailed {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

fn unregister(id: i32) {
    // SAFETY: Unregisters an id this thread previously registered. A failed
    // unregister only matters until process exit.
    if let Err(e) = unsafe { UnregisterHotKey(None, id) } {
        warn!("UnregisterHotKey({}) failed: {}", id, e);
    }
}

/// Maps a parsed key token to its Win32 virtual-key code.
fn virtual_key_code(token: &KeyToken) -> u32 {
    match token {
        // Letters and digits share their uppercase ASCII codes.
        KeyToken::Char(c) => c.to_ascii_uppercase() as u32,
        // VK_F1 is 0x70; function keys are contiguous through F24.
        KeyToken::Function(n) => 0x70 + u32::from(*n - 1),
        KeyToken::Named(named) => match named {
            NamedKey::Space => 0x20,
            NamedKey::Enter => 0x0D,
            NamedKey::Tab => 0x09,
            NamedKey::Escape => 0x1B,
            NamedKey::Backspace => 0x08,
            NamedKey::Delete => 0x2E,
            NamedKey::Insert => 0x2D,
            NamedKey::Home => 0x24,
            NamedKey::End => 0x23,
            NamedKey::PageUp => 0x21,
            NamedKey::PageDown => 0x22,
            NamedKey::Up => 0x26,
            NamedKey::Down => 0x28,
            NamedKey::Left => 0x25,
            NamedKey::Right => 0x27,
            NamedKey::CapsLock => 0x14,
            NamedKey::ScrollLock => 0x91,
            NamedKey::Pause => 0x13,
            NamedKey::PrintScreen => 0x2C,
        },
    }
}
