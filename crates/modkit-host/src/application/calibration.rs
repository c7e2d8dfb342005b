//! Background calibration launching.
//!
//! Calibration is the one module hook allowed to block, so it never runs
//! under the lifecycle lock: each request gets its own named thread and the
//! requesting caller returns immediately.  Overlapping requests for the
//! same module are permitted; routines that cannot tolerate overlap guard
//! themselves.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use modkit_core::UiChannel;

use crate::application::catalog::ModuleCatalog;

/// Fires a module's calibration routine on a fresh background thread.
///
/// Requests for unloaded modules or modules without a calibration routine
/// are reported to the UI feed and dropped.
pub fn spawn_calibration(catalog: &ModuleCatalog, ui: &Arc<dyn UiChannel>, identity: &str) {
    let Some(entry) = catalog.entry(identity) else {
        ui.log_line(&format!(
            "cannot calibrate: module '{}' is not loaded",
            identity
        ));
        return;
    };

    if !entry.descriptor.has_calibration {
        ui.log_line(&format!(
            "module '{}' has no calibration routine",
            identity
        ));
        return;
    }

    let module = entry.instance;
    let thread_ui = Arc::clone(ui);
    let thread_identity = identity.to_string();

    let spawned = thread::Builder::new()
        .name(format!("modkit-calibrate-{identity}"))
        .spawn(move || {
            info!("calibration started for '{}'", thread_identity);
            if catch_unwind(AssertUnwindSafe(|| module.run_calibration())).is_err() {
                warn!("calibration of '{}' panicked", thread_identity);
                thread_ui.log_line(&format!("calibration of '{}' failed", thread_identity));
            }
        });

    if let Err(e) = spawned {
        ui.log_line(&format!(
            "could not launch calibration for '{}': {}",
            identity, e
        ));
    }
}
