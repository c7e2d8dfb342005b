//! In-memory keyboard hook for tests and headless development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use modkit_core::HotkeyCallback;

use super::{HookError, KeyboardHook};

/// Records installed hotkeys and lets tests fire them synchronously.
pub struct MockKeyboardHook {
    hooks: Mutex<HashMap<String, HotkeyCallback>>,
    fail_installs: AtomicBool,
}

impl MockKeyboardHook {
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(HashMap::new()),
            fail_installs: AtomicBool::new(false),
        }
    }

    /// When set, every subsequent `install` returns an error.
    pub fn set_fail_installs(&self, fail: bool) {
        self.fail_installs.store(fail, Ordering::SeqCst);
    }

    /// The currently installed keys, sorted for stable assertions.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock_hooks().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.lock_hooks().contains_key(key)
    }

    /// Simulates the user pressing `key`. Returns whether a callback ran.
    pub fn fire(&self, key: &str) -> bool {
        let callback = self.lock_hooks().get(key).cloned();
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    fn lock_hooks(&self) -> std::sync::MutexGuard<'_, HashMap<String, HotkeyCallback>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockKeyboardHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardHook for MockKeyboardHook {
    fn install(&self, key: &str, callback: HotkeyCallback) -> Result<(), HookError> {
        if self.fail_installs.load(Ordering::SeqCst) {
            return Err(HookError::InstallFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        // Reinstall replaces; last writer wins.
        self.lock_hooks().insert(key.to_string(), callback);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), HookError> {
        match self.lock_hooks().remove(key) {
            Some(_) => Ok(()),
            None => Err(HookError::NotInstalled(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_install_fire_remove_cycle() {
        // Arrange
        let hook = MockKeyboardHook::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_cb = Arc::clone(&count);

        // Act
        hook.install(
            "f4",
            Arc::new(move || {
                count_in_cb.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("install");
        let fired = hook.fire("f4");
        hook.remove("f4").expect("remove");

        // Assert
        assert!(fired);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!hook.fire("f4"));
    }

    #[test]
    fn test_remove_unknown_key_is_an_error() {
        let hook = MockKeyboardHook::new();
        assert!(matches!(
            hook.remove("f9"),
            Err(HookError::NotInstalled(_))
        ));
    }

    #[test]
    fn test_injected_failure_rejects_installs() {
        let hook = MockKeyboardHook::new();
        hook.set_fail_installs(true);
        assert!(hook.install("f4", Arc::new(|| {})).is_err());
        assert!(hook.active_keys().is_empty());
    }
}
