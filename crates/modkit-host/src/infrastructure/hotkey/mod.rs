//! Global hotkey installation and per-module binding bookkeeping.
//!
//! Split into three pieces:
//!
//! - [`KeyboardHook`]: the OS seam. One implementation per platform plus a
//!   [`MockKeyboardHook`](mock::MockKeyboardHook) for tests and a
//!   [`NullKeyboardHook`] for headless runs.
//! - [`parse_key_combo`]: a pure parser for combo strings like `"ctrl+f4"`,
//!   shared by every backend so spelling validation behaves identically on
//!   all platforms.
//! - [`HotkeyRegistry`]: tracks which module owns which key, so starting a
//!   module installs its hotkey and stopping it removes exactly that one.

pub mod mock;
#[cfg(target_os = "windows")]
pub mod windows;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use modkit_core::{HotkeyCallback, ModuleId, UiChannel};

/// Error type for keyboard hook operations.
#[derive(Debug, Error)]
pub enum HookError {
    /// The OS refused to install the hotkey (usually because another
    /// process already holds it, or the host lacks privileges).
    #[error("failed to install hotkey '{key}': {reason}")]
    InstallFailed { key: String, reason: String },

    /// Attempted to remove a hotkey that was never installed.
    #[error("hotkey '{0}' is not installed")]
    NotInstalled(String),

    /// The combo string could not be parsed.
    #[error("invalid key combo '{0}'")]
    InvalidCombo(String),
}

/// OS seam for global hotkey capture.
///
/// Implementations deliver the callback from whatever thread the platform
/// event loop runs on, so callbacks must be cheap and `Send + Sync`.
pub trait KeyboardHook: Send + Sync {
    /// Installs a global hotkey, replacing any prior callback for `key`.
    fn install(&self, key: &str, callback: HotkeyCallback) -> Result<(), HookError>;

    /// Removes a previously installed hotkey.
    fn remove(&self, key: &str) -> Result<(), HookError>;
}

/// Hook backend for platforms without a hotkey implementation.
///
/// Accepts every install and delivers nothing. The host stays usable
/// through its UI surface; only hotkey toggling is inert.
pub struct NullKeyboardHook;

impl KeyboardHook for NullKeyboardHook {
    fn install(&self, key: &str, _callback: HotkeyCallback) -> Result<(), HookError> {
        debug!("null hook: accepting hotkey '{}' without capture", key);
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), HookError> {
        Ok(())
    }
}

// ── Combo parsing ─────────────────────────────────────────────────────────────

/// Modifier-qualified key parsed from a combo string such as `"ctrl+shift+p"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub key: KeyToken,
}

/// The non-modifier part of a combo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    /// A single letter or digit, stored lowercase.
    Char(char),
    /// A function key, F1 through F24.
    Function(u8),
    /// A named special key.
    Named(NamedKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
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
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    ScrollLock,
    Pause,
    PrintScreen,
}

/// Parses a `'+'`-separated combo string, case-insensitively.
///
/// The last token is the key; everything before it must be a modifier
/// (`ctrl`, `alt`, `shift`, `meta`/`win`/`super`/`cmd`).
///
/// # Errors
///
/// Returns [`HookError::InvalidCombo`] for empty specs, unknown tokens,
/// or a combo consisting only of modifiers.
pub fn parse_key_combo(spec: &str) -> Result<KeyCombo, HookError> {
    let invalid = || HookError::InvalidCombo(spec.to_string());

    let tokens: Vec<String> = spec
        .split('+')
        .map(|t| t.trim().to_ascii_lowercase())
        .collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(invalid());
    }

    let (key_token, modifiers) = tokens.split_last().ok_or_else(invalid)?;

    let mut combo = KeyCombo {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
        key: parse_key_token(key_token).ok_or_else(invalid)?,
    };

    for modifier in modifiers {
        match modifier.as_str() {
            "ctrl" | "control" => combo.ctrl = true,
            "alt" => combo.alt = true,
            "shift" => combo.shift = true,
            "meta" | "win" | "super" | "cmd" => combo.meta = true,
            _ => return Err(invalid()),
        }
    }

    Ok(combo)
}

fn parse_key_token(token: &str) -> Option<KeyToken> {
    // Single letter or digit.
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            return Some(KeyToken::Char(c));
        }
        return None;
    }

    // Function keys: f1 .. f24.
    if let Some(num) = token.strip_prefix('f') {
        if let Ok(n) = num.parse::<u8>() {
            if (1..=24).contains(&n) {
                return Some(KeyToken::Function(n));
            }
        }
        return None;
    }

    let named = match token {
        "space" => NamedKey::Space,
        "enter" | "return" => NamedKey::Enter,
        "tab" => NamedKey::Tab,
        "esc" | "escape" => NamedKey::Escape,
        "backspace" => NamedKey::Backspace,
        "delete" | "del" => NamedKey::Delete,
        "insert" | "ins" => NamedKey::Insert,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "pageup" | "pgup" => NamedKey::PageUp,
        "pagedown" | "pgdn" => NamedKey::PageDown,
        "up" => NamedKey::Up,
        "down" => NamedKey::Down,
        "left" => NamedKey::Left,
        "right" => NamedKey::Right,
        "capslock" => NamedKey::CapsLock,
        "scrolllock" => NamedKey::ScrollLock,
        "pause" => NamedKey::Pause,
        "printscreen" | "prtsc" => NamedKey::PrintScreen,
        _ => return None,
    };
    Some(KeyToken::Named(named))
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Tracks the module-to-key binding table on top of a [`KeyboardHook`].
///
/// Install and remove outcomes are surfaced to the user through the
/// [`UiChannel`] rather than bubbled as errors: a hotkey that fails to
/// install degrades the module to UI-only toggling, it does not prevent
/// the module from running.
pub struct HotkeyRegistry {
    hook: Arc<dyn KeyboardHook>,
    bindings: Mutex<HashMap<ModuleId, String>>,
    ui: Arc<dyn UiChannel>,
}

impl HotkeyRegistry {
    pub fn new(hook: Arc<dyn KeyboardHook>, ui: Arc<dyn UiChannel>) -> Self {
        Self {
            hook,
            bindings: Mutex::new(HashMap::new()),
            ui,
        }
    }

    /// Binds `key` to `identity`, releasing any prior binding for that
    /// module first. An empty key clears the binding without installing.
    pub fn register(&self, identity: &str, key: &str, callback: HotkeyCallback) {
        self.release(identity);

        if key.is_empty() {
            return;
        }

        match self.hook.install(key, callback) {
            Ok(()) => {
                self.lock_bindings().insert(identity.to_string(), key.to_string());
                self.ui
                    .log_line(&format!("hotkey '{}' bound for module '{}'", key, identity));
            }
            Err(e) => {
                warn!("hotkey install failed for '{}': {}", identity, e);
                self.ui.log_line(&format!(
                    "could not bind hotkey '{}' for module '{}': {} \
                     (another app may own the key, or the host may need elevation)",
                    key, identity, e
                ));
            }
        }
    }

    /// Releases the binding for `identity`, if any. Safe to call for a
    /// module that never had one.
    pub fn unregister(&self, identity: &str) {
        self.release(identity);
    }

    /// Returns the key currently bound for `identity`.
    pub fn binding_for(&self, identity: &str) -> Option<String> {
        self.lock_bindings().get(identity).cloned()
    }

    fn release(&self, identity: &str) {
        let previous = self.lock_bindings().remove(identity);
        if let Some(key) = previous {
            if let Err(e) = self.hook.remove(&key) {
                // The binding table is already clean; a failed OS-level
                // remove only means the key frees up when the host exits.
                warn!("hotkey remove failed for '{}' ('{}'): {}", identity, key, e);
            }
        }
    }

    fn lock_bindings(&self) -> std::sync::MutexGuard<'_, HashMap<ModuleId, String>> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MockKeyboardHook;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SilentUi;

    impl UiChannel for SilentUi {
        fn log_line(&self, _line: &str) {}
        fn set_toggle_state(&self, _identity: &str, _enabled: bool) {}
    }

    fn noop_callback() -> HotkeyCallback {
        Arc::new(|| {})
    }

    #[test]
    fn test_parse_bare_function_key() {
        let combo = parse_key_combo("f4").expect("parse");
        assert_eq!(combo.key, KeyToken::Function(4));
        assert!(!combo.ctrl && !combo.alt && !combo.shift && !combo.meta);
    }

    #[test]
    fn test_parse_modified_letter_is_case_insensitive() {
        let combo = parse_key_combo("Ctrl+Shift+P").expect("parse");
        assert!(combo.ctrl);
        assert!(combo.shift);
        assert!(!combo.alt);
        assert_eq!(combo.key, KeyToken::Char('p'));
    }

    #[test]
    fn test_parse_named_key_aliases() {
        assert_eq!(
            parse_key_combo("esc").unwrap().key,
            KeyToken::Named(NamedKey::Escape)
        );
        assert_eq!(
            parse_key_combo("escape").unwrap().key,
            KeyToken::Named(NamedKey::Escape)
        );
        assert_eq!(
            parse_key_combo("alt+pgdn").unwrap().key,
            KeyToken::Named(NamedKey::PageDown)
        );
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert!(parse_key_combo("").is_err());
        assert!(parse_key_combo("ctrl+").is_err());
        assert!(parse_key_combo("ctrl+alt").is_err());
        assert!(parse_key_combo("f25").is_err());
        assert!(parse_key_combo("bogus+a").is_err());
        assert!(parse_key_combo("??").is_err());
    }

    #[test]
    fn test_register_installs_and_records_binding() {
        // Arrange
        let hook = Arc::new(MockKeyboardHook::new());
        let registry = HotkeyRegistry::new(hook.clone(), Arc::new(SilentUi));

        // Act
        registry.register("auto_clicker", "f4", noop_callback());

        // Assert
        assert_eq!(registry.binding_for("auto_clicker"), Some("f4".to_string()));
        assert!(hook.is_active("f4"));
    }

    #[test]
    fn test_reregister_releases_previous_key() {
        // Arrange
        let hook = Arc::new(MockKeyboardHook::new());
        let registry = HotkeyRegistry::new(hook.clone(), Arc::new(SilentUi));
        registry.register("m1", "f4", noop_callback());

        // Act
        registry.register("m1", "f6", noop_callback());

        // Assert
        assert_eq!(registry.binding_for("m1"), Some("f6".to_string()));
        assert!(!hook.is_active("f4"));
        assert!(hook.is_active("f6"));
    }

    #[test]
    fn test_failed_install_leaves_no_binding() {
        // Arrange
        let hook = Arc::new(MockKeyboardHook::new());
        hook.set_fail_installs(true);
        let registry = HotkeyRegistry::new(hook.clone(), Arc::new(SilentUi));

        // Act
        registry.register("m1", "f4", noop_callback());

        // Assert
        assert_eq!(registry.binding_for("m1"), None);
        assert!(!hook.is_active("f4"));
    }

    #[test]
    fn test_empty_key_clears_without_installing() {
        let hook = Arc::new(MockKeyboardHook::new());
        let registry = HotkeyRegistry::new(hook.clone(), Arc::new(SilentUi));
        registry.register("m1", "f4", noop_callback());

        registry.register("m1", "", noop_callback());

        assert_eq!(registry.binding_for("m1"), None);
        assert!(hook.active_keys().is_empty());
    }

    #[test]
    fn test_unregister_absent_module_is_safe() {
        let hook = Arc::new(MockKeyboardHook::new());
        let registry = HotkeyRegistry::new(hook, Arc::new(SilentUi));
        registry.unregister("never_registered");
    }

    #[test]
    fn test_fired_hotkey_invokes_callback() {
        // Arrange
        let hook = Arc::new(MockKeyboardHook::new());
        let registry = HotkeyRegistry::new(hook.clone(), Arc::new(SilentUi));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_cb = Arc::clone(&hits);
        registry.register(
            "m1",
            "f4",
            Arc::new(move || {
                hits_in_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        // Act
        assert!(hook.fire("f4"));
        assert!(hook.fire("f4"));

        // Assert
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
