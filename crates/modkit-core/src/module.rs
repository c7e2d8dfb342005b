//! The module contract: the `AutomationModule` trait and the services the
//! host injects into each module.
//!
//! # Capability-checked hooks (for beginners)
//!
//! Modules are wildly different from each other: some run a worker thread,
//! some are pure configuration holders, some calibrate against on-screen
//! state.  Rather than forcing every module to implement every hook, the
//! trait requires only the metadata accessor and gives every other hook a
//! no-op default:
//!
//! - A module without a worker simply never overrides `start`/`stop`.
//! - A module without an engaged/disengaged distinction keeps the default
//!   `toggle_activation`, which reports success; such modules are "on"
//!   whenever they are running.
//! - `hotkey_callback` returning `None` is itself the capability check: the
//!   host registers a hotkey binding only for modules that return `Some`.
//!
//! # Threading contract
//!
//! `start` and `stop` are invoked while the host holds its lifecycle lock,
//! so they must return quickly: spawn or signal the worker, don't run the
//! workload.  The hotkey callback fires from the OS hook context at
//! arbitrary times and must not call back into lifecycle operations.
//! `run_calibration` is the one hook allowed to block; the host runs it on
//! a dedicated background thread.

use std::sync::{Arc, Weak};

use crate::descriptor::ModuleDescriptor;
use crate::settings::SettingsMap;

/// Callback invoked from the OS hook context when a module's hotkey fires.
///
/// Shared ownership (`Arc`) because the OS hook layer holds it for as long
/// as the binding is installed.
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// The host-to-UI notification channel.
///
/// Fire-and-forget: implementations must never block or fail loudly.
pub trait UiChannel: Send + Sync {
    /// Appends one human-readable line to the UI's notification feed.
    fn log_line(&self, line: &str);

    /// Forces the UI's displayed on/off switch for a module back in sync,
    /// used after a failed activation.
    fn set_toggle_state(&self, identity: &str, enabled: bool);
}

/// The host operations a module may call back into.
///
/// Kept deliberately narrow: calibration routines persist their results
/// through the same batch settings path the UI uses, which also restarts the
/// module if it is currently running.
pub trait HostApi: Send + Sync {
    /// Applies a batch of setting changes to `identity` and persists them.
    /// Unknown identities and unknown keys are ignored.
    fn update_module_settings(&self, identity: &str, changes: SettingsMap);
}

/// Cross-cutting services handed to every module once, right after it is
/// constructed and before its first start.
///
/// The host reference is a `Weak` so modules never keep the host alive;
/// a module outliving the host has nothing useful to call anyway.
#[derive(Clone)]
pub struct ModuleServices {
    ui: Arc<dyn UiChannel>,
    host: Weak<dyn HostApi>,
}

impl ModuleServices {
    pub fn new(ui: Arc<dyn UiChannel>, host: Weak<dyn HostApi>) -> Self {
        Self { ui, host }
    }

    pub fn ui(&self) -> &Arc<dyn UiChannel> {
        &self.ui
    }

    /// Upgrades the host back-reference.  `None` after host teardown.
    pub fn host(&self) -> Option<Arc<dyn HostApi>> {
        self.host.upgrade()
    }
}

/// The contract every automation module implements.
///
/// Only [`descriptor`](AutomationModule::descriptor) is required; every
/// other hook defaults to a no-op.  All methods take `&self`: modules own
/// their mutable state behind interior mutability so the host can share one
/// handle between the catalog, the running set, and calibration threads.
pub trait AutomationModule: Send + Sync {
    /// The metadata accessor.  Called once at discovery time.
    fn descriptor(&self) -> ModuleDescriptor;

    /// One-time service injection, before first start.
    fn attach(&self, _services: ModuleServices) {}

    /// Spawns or arms the module's worker using the current settings.
    ///
    /// # Errors
    ///
    /// Any error (or panic) is caught at the host boundary, reported to the
    /// UI feed, and leaves the module stopped.
    fn start(&self, _settings: &SettingsMap) -> anyhow::Result<()> {
        Ok(())
    }

    /// Signals the worker to shut down.  Must not wait for the workload;
    /// the host applies its own teardown grace period.
    fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Engages or disengages a running module's automation behavior.
    /// Returns whether the requested state took effect.
    fn toggle_activation(&self, _enabled: bool) -> bool {
        true
    }

    /// The callback to invoke when this module's hotkey fires, or `None`
    /// when the module has no hotkey-driven toggle.
    fn hotkey_callback(&self) -> Option<HotkeyCallback> {
        None
    }

    /// Blocking calibration routine; only invoked when the descriptor sets
    /// `has_calibration`.  Results are written back via
    /// [`HostApi::update_module_settings`].
    fn run_calibration(&self) {}
}

/// An installable module unit: what the host's discovery enumerates.
///
/// Modules run in-process and are trusted, so the "fixed root location" of
/// discovery is a table of constructors rather than a plugin directory.
pub struct ModuleFactory {
    /// Discovery-path name; the identity fallback when the descriptor
    /// declares none.
    pub unit_name: &'static str,
    /// Constructs the module instance.  Failure is isolated: the host logs
    /// it and continues with the remaining units.
    pub construct: fn() -> anyhow::Result<Arc<dyn AutomationModule>>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SettingSpec;

    /// A module that overrides nothing but the metadata accessor.
    struct BareModule;

    impl AutomationModule for BareModule {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor {
                identity: None,
                display_name: "Bare".to_string(),
                description: String::new(),
                category: "misc".to_string(),
                settings: vec![SettingSpec::new("hotkey", "", "Toggle hotkey")],
                has_calibration: false,
                has_hotkey_toggle: false,
            }
        }
    }

    #[test]
    fn test_default_hooks_are_benign() {
        // Arrange
        let module = BareModule;
        let settings = SettingsMap::new();

        // Act / Assert – defaults: start/stop succeed, activation reports
        // success, no hotkey capability.
        assert!(module.start(&settings).is_ok());
        assert!(module.stop().is_ok());
        assert!(module.toggle_activation(true));
        assert!(module.hotkey_callback().is_none());
    }

    #[test]
    fn test_services_host_upgrade_fails_after_host_drop() {
        // Arrange
        struct NullUi;
        impl UiChannel for NullUi {
            fn log_line(&self, _line: &str) {}
            fn set_toggle_state(&self, _identity: &str, _enabled: bool) {}
        }
        struct NullHost;
        impl HostApi for NullHost {
            fn update_module_settings(&self, _identity: &str, _changes: SettingsMap) {}
        }

        let host: Arc<dyn HostApi> = Arc::new(NullHost);
        let services = ModuleServices::new(Arc::new(NullUi), Arc::downgrade(&host));

        // Act / Assert – alive while the host Arc exists, gone afterwards.
        assert!(services.host().is_some());
        drop(host);
        assert!(services.host().is_none());
    }
}
