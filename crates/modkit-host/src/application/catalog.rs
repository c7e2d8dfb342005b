//! Module discovery and the loaded-module catalog.
//!
//! Discovery walks a table of [`ModuleFactory`] entries rather than
//! scanning the file system: every shippable module is named in one
//! place, and a factory that fails to construct or describe itself is
//! skipped without taking the host down.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use modkit_core::{
    AutomationModule, ModuleDescriptor, ModuleFactory, ModuleId, ModuleServices, SettingValue,
    ENABLED_KEY,
};

use crate::infrastructure::storage::settings::SettingsStore;

/// A successfully discovered module with its resolved identity.
#[derive(Clone)]
pub struct LoadedModule {
    pub identity: ModuleId,
    pub descriptor: ModuleDescriptor,
    pub instance: Arc<dyn AutomationModule>,
}

/// Immutable-after-discovery table of loaded modules, keyed by identity.
pub struct ModuleCatalog {
    modules: Mutex<HashMap<ModuleId, LoadedModule>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Runs discovery over `factories`: constructs each module, registers
    /// it, and finally merges the persisted settings file over the
    /// accumulated defaults.
    ///
    /// A factory whose constructor errors is logged and skipped; so is any
    /// unit [`register`](Self::register) rejects.
    pub fn discover(
        &self,
        factories: &[ModuleFactory],
        services: &ModuleServices,
        store: &SettingsStore,
    ) {
        for factory in factories {
            match (factory.construct)() {
                Ok(instance) => {
                    self.register(factory.unit_name, instance, services, store);
                }
                Err(e) => {
                    warn!("module '{}' failed to construct: {:#}", factory.unit_name, e);
                }
            }
        }

        store.load_and_merge();
    }

    /// Loads one constructed module: resolves its identity, attaches host
    /// services, and seeds the settings store with its declared defaults.
    ///
    /// Non-system modules additionally get a synthesized `enabled: false`
    /// default so every automation module persists its toggle state.
    ///
    /// Returns `false` (and logs) when the module's `descriptor()` hook
    /// panics or its identity collides with an already loaded module; the
    /// first loader of an identity wins.
    pub fn register(
        &self,
        unit_name: &str,
        instance: Arc<dyn AutomationModule>,
        services: &ModuleServices,
        store: &SettingsStore,
    ) -> bool {
        let descriptor = match catch_unwind(AssertUnwindSafe(|| instance.descriptor())) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                warn!(
                    "module '{}' panicked while describing itself, skipping",
                    unit_name
                );
                return false;
            }
        };

        let identity = descriptor.resolve_identity(unit_name);

        let mut modules = self.lock_modules();
        if modules.contains_key(&identity) {
            warn!(
                "module identity '{}' already loaded, skipping '{}'",
                identity, unit_name
            );
            return false;
        }

        instance.attach(services.clone());

        let mut defaults = descriptor.default_settings();
        if !descriptor.is_system() {
            defaults
                .entry(ENABLED_KEY.to_string())
                .or_insert(SettingValue::Bool(false));
        }
        store.register_defaults(&identity, defaults);

        info!("loaded module '{}' ({})", identity, descriptor.display_name);
        modules.insert(
            identity.clone(),
            LoadedModule {
                identity,
                descriptor,
                instance,
            },
        );
        true
    }

    /// Looks up a module instance by identity.
    pub fn get(&self, identity: &str) -> Option<Arc<dyn AutomationModule>> {
        self.lock_modules()
            .get(identity)
            .map(|m| Arc::clone(&m.instance))
    }

    /// Looks up the full catalog entry by identity.
    pub fn entry(&self, identity: &str) -> Option<LoadedModule> {
        self.lock_modules().get(identity).cloned()
    }

    /// Looks up only the descriptor by identity.
    pub fn descriptor(&self, identity: &str) -> Option<ModuleDescriptor> {
        self.lock_modules()
            .get(identity)
            .map(|m| m.descriptor.clone())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock_modules().contains_key(identity)
    }

    /// All loaded entries, sorted by identity for stable presentation.
    pub fn entries(&self) -> Vec<LoadedModule> {
        let mut entries: Vec<LoadedModule> = self.lock_modules().values().cloned().collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        entries
    }

    fn lock_modules(&self) -> std::sync::MutexGuard<'_, HashMap<ModuleId, LoadedModule>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use modkit_core::{SettingSpec, SettingsMap, UiChannel, SYSTEM_CATEGORY};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct SilentUi;

    impl UiChannel for SilentUi {
        fn log_line(&self, _line: &str) {}
        fn set_toggle_state(&self, _identity: &str, _enabled: bool) {}
    }

    fn temp_store(tag: &str) -> SettingsStore {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path: PathBuf = std::env::temp_dir().join(format!(
            "modkit-catalog-{}-{}-{}.json",
            tag,
            std::process::id(),
            n
        ));
        SettingsStore::new(path)
    }

    fn services() -> ModuleServices {
        struct NoHost;
        impl modkit_core::HostApi for NoHost {
            fn update_module_settings(&self, _identity: &str, _changes: SettingsMap) {}
        }
        let host: Arc<dyn modkit_core::HostApi> = Arc::new(NoHost);
        // Keep the host alive for the duration of a test.
        std::mem::forget(Arc::clone(&host));
        ModuleServices::new(Arc::new(SilentUi), Arc::downgrade(&host))
    }

    struct PlainModule {
        descriptor: ModuleDescriptor,
    }

    impl AutomationModule for PlainModule {
        fn descriptor(&self) -> ModuleDescriptor {
            self.descriptor.clone()
        }
    }

    fn descriptor(identity: Option<&str>, category: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            identity: identity.map(str::to_string),
            display_name: "Test Module".to_string(),
            description: String::new(),
            category: category.to_string(),
            settings: vec![SettingSpec::new("interval_ms", 250i64, "tick interval")],
            has_calibration: false,
            has_hotkey_toggle: false,
        }
    }

    fn failing_construct() -> anyhow::Result<Arc<dyn AutomationModule>> {
        anyhow::bail!("constructor exploded")
    }

    fn automation_construct() -> anyhow::Result<Arc<dyn AutomationModule>> {
        Ok(Arc::new(PlainModule {
            descriptor: descriptor(None, "input"),
        }))
    }

    fn system_construct() -> anyhow::Result<Arc<dyn AutomationModule>> {
        Ok(Arc::new(PlainModule {
            descriptor: descriptor(Some("sys_cfg"), SYSTEM_CATEGORY),
        }))
    }

    #[test]
    fn test_discover_skips_failing_factory_and_loads_the_rest() {
        // Arrange
        let catalog = ModuleCatalog::new();
        let store = temp_store("skip-failing");
        let factories = vec![
            ModuleFactory {
                unit_name: "broken",
                construct: failing_construct,
            },
            ModuleFactory {
                unit_name: "Auto Clicker",
                construct: automation_construct,
            },
        ];

        // Act
        catalog.discover(&factories, &services(), &store);

        // Assert
        assert!(!catalog.contains("broken"));
        assert!(catalog.contains("auto_clicker"));
        assert_eq!(catalog.entries().len(), 1);
    }

    #[test]
    fn test_identity_falls_back_to_normalized_unit_name() {
        let catalog = ModuleCatalog::new();
        let store = temp_store("identity-fallback");
        let factories = vec![ModuleFactory {
            unit_name: "  Auto Clicker ",
            construct: automation_construct,
        }];

        catalog.discover(&factories, &services(), &store);

        assert!(catalog.contains("auto_clicker"));
    }

    #[test]
    fn test_automation_module_gets_enabled_default() {
        // Arrange
        let catalog = ModuleCatalog::new();
        let store = temp_store("enabled-synth");

        // Act
        catalog.discover(
            &[ModuleFactory {
                unit_name: "auto_clicker",
                construct: automation_construct,
            }],
            &services(),
            &store,
        );

        // Assert
        let map = store.get("auto_clicker").expect("registered");
        assert_eq!(map.get("enabled"), Some(&SettingValue::Bool(false)));
        assert_eq!(map.get("interval_ms"), Some(&SettingValue::Integer(250)));
    }

    #[test]
    fn test_system_module_has_no_enabled_setting() {
        let catalog = ModuleCatalog::new();
        let store = temp_store("system-exempt");

        catalog.discover(
            &[ModuleFactory {
                unit_name: "sys_cfg",
                construct: system_construct,
            }],
            &services(),
            &store,
        );

        assert!(catalog.contains("sys_cfg"));
        assert!(!store.has_key("sys_cfg", "enabled"));
    }

    #[test]
    fn test_duplicate_identity_keeps_first_loader() {
        let catalog = ModuleCatalog::new();
        let store = temp_store("dup-identity");
        let factories = vec![
            ModuleFactory {
                unit_name: "auto_clicker",
                construct: automation_construct,
            },
            ModuleFactory {
                unit_name: "auto_clicker",
                construct: automation_construct,
            },
        ];

        catalog.discover(&factories, &services(), &store);

        assert_eq!(catalog.entries().len(), 1);
    }

    #[test]
    fn test_corrupt_settings_file_leaves_defaults_in_place() {
        // Arrange
        let store = temp_store("corrupt-merge");
        std::fs::write(store.path(), "{not json").expect("write corrupt file");
        let catalog = ModuleCatalog::new();

        // Act
        catalog.discover(
            &[ModuleFactory {
                unit_name: "auto_clicker",
                construct: automation_construct,
            }],
            &services(),
            &store,
        );

        // Assert
        assert_eq!(
            store.get("auto_clicker").unwrap().get("interval_ms"),
            Some(&SettingValue::Integer(250))
        );
    }

    #[test]
    fn test_saved_values_survive_rediscovery() {
        // Arrange
        let store = temp_store("rediscover");
        let factory = || ModuleFactory {
            unit_name: "auto_clicker",
            construct: automation_construct,
        };
        ModuleCatalog::new().discover(&[factory()], &services(), &store);
        let mut changes = SettingsMap::new();
        changes.insert("interval_ms".to_string(), SettingValue::Integer(75));
        assert!(store.update_many("auto_clicker", changes));

        // Act
        let fresh_store = SettingsStore::new(store.path().to_path_buf());
        ModuleCatalog::new().discover(&[factory()], &services(), &fresh_store);

        // Assert
        assert_eq!(
            fresh_store.get("auto_clicker").unwrap().get("interval_ms"),
            Some(&SettingValue::Integer(75))
        );
    }
}
