//! Application configuration holder.
//!
//! A system-category module: it runs no worker and has no lifecycle of its
//! own, it only declares the settings every other part of the host reads
//! through the settings store (which application the host drives, which
//! profile is active).

use std::sync::Arc;

use modkit_core::{AutomationModule, ModuleDescriptor, SettingSpec, SYSTEM_CATEGORY};

pub struct AppConfigModule;

impl AutomationModule for AppConfigModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            identity: Some("app_config".to_string()),
            display_name: "App Config".to_string(),
            description: "Target application and profile settings shared by all modules"
                .to_string(),
            category: SYSTEM_CATEGORY.to_string(),
            settings: vec![
                SettingSpec::new("app_path", "", "Path to the target application"),
                SettingSpec::new("app_version", "", "Expected application version"),
                SettingSpec::new("profile", "default", "Active settings profile"),
            ],
            has_calibration: false,
            has_hotkey_toggle: false,
        }
    }
}

pub fn construct() -> anyhow::Result<Arc<dyn AutomationModule>> {
    Ok(Arc::new(AppConfigModule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_is_a_system_module() {
        let module = AppConfigModule;
        let descriptor = module.descriptor();

        assert!(descriptor.is_system());
        assert!(descriptor.declares("app_path"));
        assert!(descriptor.declares("profile"));
        assert!(!descriptor.has_calibration);
    }

    #[test]
    fn test_app_config_has_no_worker_lifecycle() {
        let module = AppConfigModule;
        assert!(module.start(&Default::default()).is_ok());
        assert!(module.stop().is_ok());
        assert!(module.hotkey_callback().is_none());
    }
}
