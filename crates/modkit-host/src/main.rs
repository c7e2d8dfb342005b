//! ModKit host entry point.
//!
//! Wires together the settings store, hotkey backend, lifecycle manager,
//! and UI event pump, then idles until shutdown.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()             -- host TOML config (log level, paths)
//!  └─ ui_event_channel()        -- host → UI notification stream
//!  └─ hotkey backend            -- platform hook or the null fallback
//!  └─ LifecycleManager::new()   -- catalog + settings + hotkey registry
//!  └─ discover(builtin_factories())
//!  └─ event pump task           -- drains UiEvents into the log
//!  └─ ctrl-c handler            -- stop_all() and exit
//! ```
//!
//! # Headless operation (for beginners)
//!
//! This binary is the host without a graphical front-end: the UI event
//! channel drains into the structured log, and modules are driven by
//! their persisted `enabled` settings and global hotkeys.  A desktop
//! front-end embeds the same `modkit_host` library and replaces the pump
//! with its own renderer over the command surface in
//! `infrastructure::ui_bridge`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modkit_core::{SettingValue, UiChannel, ENABLED_KEY};

use modkit_host::application::catalog::ModuleCatalog;
use modkit_host::application::lifecycle::LifecycleManager;
use modkit_host::infrastructure::hotkey::{HotkeyRegistry, KeyboardHook, NullKeyboardHook};
use modkit_host::infrastructure::storage::config::{
    config_file_path, load_config, save_config, HostConfig,
};
use modkit_host::infrastructure::storage::settings::SettingsStore;
use modkit_host::infrastructure::ui_bridge::{ui_event_channel, UiEvent};
use modkit_host::modules::builtin_factories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().unwrap_or_else(|e| {
        eprintln!("could not load host config ({e}), using defaults");
        HostConfig::default()
    });

    // Initialise structured logging. RUST_LOG overrides the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("ModKit host starting");

    // First run: write the defaults out so the user has a file to edit.
    if let Ok(path) = config_file_path() {
        if !path.exists() {
            match save_config(&config) {
                Ok(()) => info!(path = %path.display(), "wrote default host config"),
                Err(e) => warn!("could not write default host config: {e}"),
            }
        }
    }

    let (ui_sender, mut ui_rx) = ui_event_channel();
    let ui: Arc<dyn UiChannel> = ui_sender;

    // ── Hotkey backend ────────────────────────────────────────────────────────
    let hook = build_hotkey_backend();
    let hotkeys = HotkeyRegistry::new(hook, Arc::clone(&ui));

    // ── Settings and lifecycle ────────────────────────────────────────────────
    let settings = SettingsStore::new(config.settings_file_path()?);
    let manager = LifecycleManager::new(
        ModuleCatalog::new(),
        settings,
        hotkeys,
        Arc::clone(&ui),
        config.stop_grace(),
    );

    manager.discover(&builtin_factories());

    // Resume modules the user left enabled.
    for entry in manager.catalog().entries() {
        let enabled = manager
            .settings()
            .get(&entry.identity)
            .and_then(|map| map.get(ENABLED_KEY).and_then(SettingValue::as_bool))
            .unwrap_or(false);
        if enabled {
            manager.toggle_module(&entry.identity, true);
        }
    }

    // ── UI event pump ─────────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            match event {
                UiEvent::Log { line } => info!(target: "modkit::feed", "{line}"),
                UiEvent::ToggleState { identity, enabled } => {
                    info!(target: "modkit::feed", "switch '{identity}' forced to {enabled}")
                }
            }
        }
    });

    // ── Shutdown handling ─────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_running = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            ctrlc_running.store(false, Ordering::SeqCst);
        }
    });

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    manager.stop_all();
    info!("ModKit host stopped");
    Ok(())
}

/// Selects the platform hotkey backend, degrading to the null hook when
/// the platform one cannot start.
fn build_hotkey_backend() -> Arc<dyn KeyboardHook> {
    #[cfg(target_os = "windows")]
    {
        use modkit_host::infrastructure::hotkey::windows::WindowsHotkeyHook;
        match WindowsHotkeyHook::spawn() {
            Ok(hook) => return Arc::new(hook),
            Err(e) => warn!("hotkey backend unavailable ({e}), hotkeys disabled"),
        }
    }
    #[cfg(not(target_os = "windows"))]
    warn!("no hotkey backend for this platform, hotkeys disabled");

    Arc::new(NullKeyboardHook)
}
