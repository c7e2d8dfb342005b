//! Built-in automation modules.
//!
//! Discovery enumerates the factory table below; adding a shipped module
//! means adding one entry here.

pub mod app_config;
pub mod auto_clicker;

use modkit_core::ModuleFactory;

/// The modules shipped with the host.
pub fn builtin_factories() -> Vec<ModuleFactory> {
    vec![
        ModuleFactory {
            unit_name: "app_config",
            construct: app_config::construct,
        },
        ModuleFactory {
            unit_name: "auto_clicker",
            construct: auto_clicker::construct,
        },
    ]
}
