//! # modkit-core
//!
//! Shared contract crate for ModKit, a pluggable desktop automation host.
//! It defines the module descriptor, the setting value model, and the
//! `AutomationModule` trait every module implements.
//!
//! This crate is used by the host and by every module implementation.
//! It has zero dependencies on OS APIs, file systems, or UI frameworks.
//!
//! # Architecture overview (for beginners)
//!
//! ModKit is a long-running host process that manages independent automation
//! "modules": self-contained routines that each own a background worker and a
//! handful of user-editable settings.  The host discovers modules at startup,
//! starts and stops them on demand, persists their settings, and arbitrates
//! global keyboard hotkeys so no two modules fight over the same binding.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`descriptor`** – What a module *declares* about itself: its identity,
//!   display name, category, setting schema with defaults, and capability
//!   flags (does it calibrate? does it have a hotkey toggle?).
//!
//! - **`settings`** – The dynamically-typed setting value model.  Settings
//!   are freeform per module, so values are a small enum rather than a fixed
//!   struct.
//!
//! - **`module`** – The `AutomationModule` trait itself, plus the service
//!   types the host injects into each module right after it is loaded
//!   (UI notification channel, host back-reference).

// Rust will look for each module in a file with the same name
// (e.g., src/descriptor.rs).
pub mod descriptor;
pub mod module;
pub mod settings;

// Re-export the most-used types at the crate root so callers can write
// `modkit_core::ModuleDescriptor` instead of the full path.
pub use descriptor::{ModuleDescriptor, ModuleId, SettingSpec, SYSTEM_CATEGORY};
pub use module::{
    AutomationModule, HostApi, HotkeyCallback, ModuleFactory, ModuleServices, UiChannel,
};
pub use settings::{SettingValue, SettingsMap, ENABLED_KEY, HOTKEY_KEY};
