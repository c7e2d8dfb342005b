//! The surface a UI front-end talks to.
//!
//! Two halves:
//!
//! - **Commands** flow UI → host: plain synchronous functions over
//!   [`AppState`], each returning a serializable [`CommandResult`] envelope
//!   so a front-end can distinguish "the host said no" from transport
//!   failure.
//! - **Events** flow host → UI: [`UiEventSender`] implements the
//!   [`UiChannel`] contract by pushing [`UiEvent`]s onto an unbounded
//!   channel the front-end drains.  Fire-and-forget: a missing or slow
//!   consumer never blocks a lifecycle transition.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use modkit_core::{ModuleId, SettingValue, SettingsMap, UiChannel};

use crate::application::lifecycle::LifecycleManager;

/// Shared handle the command surface operates on.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
}

// ── Host → UI events ──────────────────────────────────────────────────────────

/// One host-to-UI notification.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A line for the notification feed.
    Log { line: String },
    /// Force a module's on/off switch to the given state.
    ToggleState { identity: ModuleId, enabled: bool },
}

/// [`UiChannel`] implementation backed by an unbounded event channel.
pub struct UiEventSender {
    tx: UnboundedSender<UiEvent>,
}

impl UiChannel for UiEventSender {
    fn log_line(&self, line: &str) {
        // Send errors mean the UI side is gone; nothing useful to do.
        let _ = self.tx.send(UiEvent::Log {
            line: line.to_string(),
        });
    }

    fn set_toggle_state(&self, identity: &str, enabled: bool) {
        let _ = self.tx.send(UiEvent::ToggleState {
            identity: identity.to_string(),
            enabled,
        });
    }
}

/// Creates the host→UI event channel.
pub fn ui_event_channel() -> (Arc<UiEventSender>, UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(UiEventSender { tx }), rx)
}

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Serializable view of one declared setting.
#[derive(Debug, Clone, Serialize)]
pub struct SettingSpecDto {
    pub key: String,
    pub default: SettingValue,
    pub description: String,
}

/// Serializable view of one loaded module with its current state.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDto {
    pub identity: ModuleId,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub has_calibration: bool,
    pub has_hotkey_toggle: bool,
    pub settings: Vec<SettingSpecDto>,
    /// Current values, defaults already merged with persisted overrides.
    pub values: SettingsMap,
    pub running: bool,
}

/// The whole catalog as the UI renders it.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogDto {
    pub modules: Vec<ModuleDto>,
    pub running: Vec<ModuleId>,
}

/// Result wrapper for all UI commands, serialized to the front-end.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Returns every loaded module with its descriptor, current values, and
/// run state.
pub fn get_catalog(state: &AppState) -> CommandResult<CatalogDto> {
    let manager = &state.manager;
    let running = manager.running_ids();
    let mut values_table = manager.settings().snapshot();

    let modules = manager
        .catalog()
        .entries()
        .into_iter()
        .map(|entry| {
            let values = values_table.remove(&entry.identity).unwrap_or_default();
            ModuleDto {
                running: running.contains(&entry.identity),
                identity: entry.identity,
                display_name: entry.descriptor.display_name,
                description: entry.descriptor.description,
                category: entry.descriptor.category,
                has_calibration: entry.descriptor.has_calibration,
                has_hotkey_toggle: entry.descriptor.has_hotkey_toggle,
                settings: entry
                    .descriptor
                    .settings
                    .into_iter()
                    .map(|spec| SettingSpecDto {
                        key: spec.key,
                        default: spec.default,
                        description: spec.description,
                    })
                    .collect(),
                values,
            }
        })
        .collect();

    CommandResult::ok(CatalogDto { modules, running })
}

/// Applies a single setting change.  `data` reports whether it took
/// effect; an unknown module is a command error.
pub fn update_setting(
    state: &AppState,
    identity: &str,
    key: &str,
    value: SettingValue,
) -> CommandResult<bool> {
    if !state.manager.catalog().contains(identity) {
        return CommandResult::err(format!("unknown module '{identity}'"));
    }
    CommandResult::ok(state.manager.update_setting(identity, key, value))
}

/// Applies a batch of setting changes with a single restart.
pub fn update_settings(
    state: &AppState,
    identity: &str,
    changes: SettingsMap,
) -> CommandResult<bool> {
    if !state.manager.catalog().contains(identity) {
        return CommandResult::err(format!("unknown module '{identity}'"));
    }
    CommandResult::ok(state.manager.update_settings(identity, changes))
}

/// Drives a module toward the requested on/off state.
pub fn toggle_module(state: &AppState, identity: &str, enabled: bool) -> CommandResult<bool> {
    CommandResult::ok(state.manager.toggle_module(identity, enabled))
}

/// Emergency stop: halts every running module.
pub fn stop_all(state: &AppState) -> CommandResult<()> {
    state.manager.stop_all();
    CommandResult::ok(())
}

/// Launches a module's calibration routine in the background.
pub fn run_calibration(state: &AppState, identity: &str) -> CommandResult<()> {
    state.manager.run_calibration(identity);
    CommandResult::ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
