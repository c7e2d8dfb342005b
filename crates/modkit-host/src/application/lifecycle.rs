//! The lifecycle manager: the host's single authority over which modules
//! are running, their hotkey bindings, and their settings.
//!
//! # Locking model (for beginners)
//!
//! One mutex guards the running-module map, and every compound operation
//! (toggle, restart, stop-all) acquires it exactly once, calling the
//! lock-free `*_inner` helpers underneath.  That single acquisition is
//! what makes the state machine race-free: overlapping toggles from the UI
//! and a settings update cannot interleave between a stop and the matching
//! start.
//!
//! Module hooks run while the lock is held, which is why the module
//! contract requires `start`/`stop` to return quickly.  Hook panics are
//! contained with `catch_unwind` and reported like hook errors, so one
//! misbehaving module cannot poison the host.
//!
//! # Failure policy
//!
//! - A failed or panicking `start` leaves the module stopped.
//! - A failed or panicking `stop` still removes the module from the
//!   running set (keeping a zombie entry would wedge every later toggle)
//!   but reports failure, so a restart never runs the start half after a
//!   forced stop.
//! - Hotkey bindings are removed before the stop hook runs and installed
//!   only after a successful start, so a binding never outlives or
//!   predates its running module.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, warn};

use modkit_core::{
    AutomationModule, HostApi, ModuleFactory, ModuleId, ModuleServices, SettingValue, SettingsMap,
    UiChannel, ENABLED_KEY, HOTKEY_KEY,
};

use crate::application::calibration;
use crate::application::catalog::ModuleCatalog;
use crate::infrastructure::hotkey::HotkeyRegistry;
use crate::infrastructure::storage::settings::SettingsStore;

type RunningMap = HashMap<ModuleId, Arc<dyn AutomationModule>>;

/// Owns the running set and drives every module state transition.
pub struct LifecycleManager {
    catalog: ModuleCatalog,
    settings: SettingsStore,
    hotkeys: HotkeyRegistry,
    running: Mutex<RunningMap>,
    ui: Arc<dyn UiChannel>,
    stop_grace: Duration,
}

impl LifecycleManager {
    pub fn new(
        catalog: ModuleCatalog,
        settings: SettingsStore,
        hotkeys: HotkeyRegistry,
        ui: Arc<dyn UiChannel>,
        stop_grace: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            settings,
            hotkeys,
            running: Mutex::new(RunningMap::new()),
            ui,
            stop_grace,
        })
    }

    /// The services bundle injected into every module at load time.  The
    /// host back-reference is weak, pointing at this manager.
    pub fn services(self: &Arc<Self>) -> ModuleServices {
        let host: Arc<dyn HostApi> = Arc::clone(self) as Arc<dyn HostApi>;
        ModuleServices::new(Arc::clone(&self.ui), Arc::downgrade(&host))
    }

    /// Runs module discovery over `factories`.
    pub fn discover(self: &Arc<Self>, factories: &[ModuleFactory]) {
        let services = self.services();
        self.catalog.discover(factories, &services, &self.settings);
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    // ── Public operations ─────────────────────────────────────────────────────

    /// Starts a stopped module.  Returns whether it is now running.
    pub fn start_module(&self, identity: &str) -> bool {
        let mut running = self.lock_running();
        self.start_inner(&mut running, identity)
    }

    /// Stops a running module.  Returns `false`, without complaint, for a
    /// module that is not running.
    pub fn stop_module(&self, identity: &str) -> bool {
        let mut running = self.lock_running();
        self.stop_inner(&mut running, identity)
    }

    /// Stops and restarts a module so it rereads its settings.
    pub fn restart_module(&self, identity: &str) -> bool {
        let mut running = self.lock_running();
        self.restart_inner(&mut running, identity)
    }

    /// Drives a module toward the user-requested on/off state and persists
    /// that preference.  Returns whether the requested state took effect.
    ///
    /// Turning "on" a module that is already running re-engages its
    /// activation instead of starting it twice; a refused or panicking
    /// activation leaves the module running but reports the switch back to
    /// the UI as off.
    pub fn toggle_module(&self, identity: &str, enabled: bool) -> bool {
        if !self.catalog.contains(identity) {
            self.ui
                .log_line(&format!("unknown module '{}', cannot toggle", identity));
            return false;
        }

        // The preference is persisted regardless of whether the transition
        // below succeeds; the user said what they want.
        if self.settings.has_key(identity, ENABLED_KEY) {
            self.settings
                .update_one(identity, ENABLED_KEY, SettingValue::Bool(enabled));
        }

        let mut running = self.lock_running();
        if enabled {
            match running.get(identity).map(Arc::clone) {
                Some(module) => {
                    let engaged = catch_unwind(AssertUnwindSafe(|| module.toggle_activation(true)))
                        .unwrap_or(false);
                    if !engaged {
                        warn!("module '{}' refused activation", identity);
                        self.ui
                            .log_line(&format!("module '{}' could not be activated", identity));
                        self.ui.set_toggle_state(identity, false);
                    }
                    engaged
                }
                None => self.start_inner(&mut running, identity),
            }
        } else if running.contains_key(identity) {
            self.stop_inner(&mut running, identity)
        } else {
            true
        }
    }

    /// Stops every running module.  Used at shutdown and by the UI's
    /// emergency stop.
    pub fn stop_all(&self) {
        let mut running = self.lock_running();
        let mut identities: Vec<ModuleId> = running.keys().cloned().collect();
        identities.sort();
        for identity in identities {
            self.stop_inner(&mut running, &identity);
        }
        self.ui.log_line("all modules stopped");
    }

    /// Applies one setting change.  A running module is restarted so the
    /// new value takes effect; unknown identities or keys change nothing.
    pub fn update_setting(&self, identity: &str, key: &str, value: SettingValue) -> bool {
        if !self.settings.update_one(identity, key, value) {
            warn!("rejected setting update '{}.{}'", identity, key);
            return false;
        }

        let mut running = self.lock_running();
        if running.contains_key(identity) {
            self.restart_inner(&mut running, identity);
        }
        true
    }

    /// Applies a batch of setting changes with exactly one restart, however
    /// many keys changed.  This is the uniform "apply configuration" path:
    /// the UI's settings panel and module calibration write-back both land
    /// here.
    pub fn update_settings(&self, identity: &str, changes: SettingsMap) -> bool {
        if !self.settings.update_many(identity, changes) {
            warn!("rejected settings batch for unknown module '{}'", identity);
            return false;
        }
        info!("settings batch applied to '{}'", identity);

        let mut running = self.lock_running();
        if running.contains_key(identity) {
            self.restart_inner(&mut running, identity);
        }
        true
    }

    /// Launches a module's calibration routine on a background thread.
    pub fn run_calibration(&self, identity: &str) {
        calibration::spawn_calibration(&self.catalog, &self.ui, identity);
    }

    pub fn is_running(&self, identity: &str) -> bool {
        self.lock_running().contains_key(identity)
    }

    /// Identities of all running modules, sorted.
    pub fn running_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.lock_running().keys().cloned().collect();
        ids.sort();
        ids
    }

    // ── Transition internals (called with the lock held) ──────────────────────

    fn start_inner(&self, running: &mut RunningMap, identity: &str) -> bool {
        if running.contains_key(identity) {
            warn!("module '{}' is already running", identity);
            return false;
        }

        let Some(module) = self.catalog.get(identity) else {
            self.ui
                .log_line(&format!("unknown module '{}', cannot start", identity));
            return false;
        };

        let settings = self.settings.get(identity).unwrap_or_default();

        if let Err(e) = run_hook("start", identity, || module.start(&settings)) {
            self.ui
                .log_line(&format!("module '{}' failed to start: {:#}", identity, e));
            return false;
        }

        running.insert(identity.to_string(), Arc::clone(&module));

        // Hotkey binding only for modules that expose a callback and have a
        // non-empty key configured.
        let key = settings
            .get(HOTKEY_KEY)
            .and_then(SettingValue::as_str)
            .unwrap_or("");
        if !key.is_empty() {
            if let Some(callback) = module.hotkey_callback() {
                self.hotkeys.register(identity, key, callback);
            }
        }

        info!("module '{}' started", identity);
        self.ui.log_line(&format!("module '{}' started", identity));
        true
    }

    fn stop_inner(&self, running: &mut RunningMap, identity: &str) -> bool {
        let Some(module) = running.get(identity).map(Arc::clone) else {
            return false;
        };

        // Release the binding before the stop hook so the hotkey cannot
        // fire into a module that is tearing down.
        self.hotkeys.unregister(identity);

        // Removal below is unconditional either way: a failed stop must
        // not leave a zombie entry.  The return value and the feed line
        // still reflect what the hook actually did, so callers like
        // restart and toggle-off can tell a clean stop from a forced one.
        match run_hook("stop", identity, || module.stop()) {
            Ok(()) => {
                if !self.stop_grace.is_zero() {
                    std::thread::sleep(self.stop_grace);
                }
                running.remove(identity);
                info!("module '{}' stopped", identity);
                self.ui.log_line(&format!("module '{}' stopped", identity));
                true
            }
            Err(e) => {
                running.remove(identity);
                warn!("module '{}' stop hook failed: {:#}", identity, e);
                self.ui.log_line(&format!(
                    "module '{}' stop hook failed ({:#}), forcing removal",
                    identity, e
                ));
                false
            }
        }
    }

    fn restart_inner(&self, running: &mut RunningMap, identity: &str) -> bool {
        if !self.stop_inner(running, identity) {
            return false;
        }
        self.start_inner(running, identity)
    }

    fn lock_running(&self) -> MutexGuard<'_, RunningMap> {
        // Hook panics are caught before they can poison this lock, but a
        // poisoned map is still better served than a wedged host.
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostApi for LifecycleManager {
    fn update_module_settings(&self, identity: &str, changes: SettingsMap) {
        self.update_settings(identity, changes);
    }
}

/// Runs a module hook with panic containment, flattening a panic into the
/// same error shape as a hook failure.
fn run_hook(
    hook: &str,
    identity: &str,
    f: impl FnOnce() -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!(
            "{} hook of '{}' panicked: {}",
            hook,
            identity,
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
