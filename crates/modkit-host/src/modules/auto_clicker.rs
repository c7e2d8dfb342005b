//! Auto-clicker: clicks a calibrated screen position on a fixed interval.
//!
//! The worker thread only paces and fires clicks; engagement is a separate
//! atomic flag flipped by the hotkey callback or the UI switch, so the
//! hotkey path never touches host lifecycle state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail};
use tracing::trace;

use modkit_core::{
    AutomationModule, HotkeyCallback, ModuleDescriptor, ModuleServices, SettingSpec, SettingValue,
    SettingsMap,
};

/// Worker wake-up granularity; also bounds stop latency.
const SLICE: Duration = Duration::from_millis(50);

struct Worker {
    run: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct AutoClickerModule {
    worker: Mutex<Option<Worker>>,
    /// Whether clicks actually fire. The worker keeps pacing while
    /// disengaged so re-engagement is instant.
    active: Arc<AtomicBool>,
    services: OnceLock<ModuleServices>,
}

impl AutoClickerModule {
    pub fn new() -> Self {
        Self {
            worker: Mutex::new(None),
            active: Arc::new(AtomicBool::new(false)),
            services: OnceLock::new(),
        }
    }

    fn log(&self, message: &str) {
        if let Some(services) = self.services.get() {
            services.ui().log_line(&format!("[auto_clicker] {message}"));
        }
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AutoClickerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationModule for AutoClickerModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            identity: Some("auto_clicker".to_string()),
            display_name: "Auto Clicker".to_string(),
            description: "Clicks the calibrated screen position on a fixed interval".to_string(),
            category: "input".to_string(),
            settings: vec![
                SettingSpec::new("hotkey", "f4", "Engage/disengage hotkey"),
                SettingSpec::new("interval_ms", 250i64, "Milliseconds between clicks"),
                SettingSpec::new("target_x", -1i64, "Calibrated click X, -1 until calibrated"),
                SettingSpec::new("target_y", -1i64, "Calibrated click Y, -1 until calibrated"),
            ],
            has_calibration: true,
            has_hotkey_toggle: true,
        }
    }

    fn attach(&self, services: ModuleServices) {
        let _ = self.services.set(services);
    }

    fn start(&self, settings: &SettingsMap) -> anyhow::Result<()> {
        let read = |key: &str| settings.get(key).and_then(SettingValue::as_i64);

        let target_x = read("target_x").unwrap_or(-1);
        let target_y = read("target_y").unwrap_or(-1);
        if target_x < 0 || target_y < 0 {
            bail!("no calibration data; run calibration first");
        }

        let interval = Duration::from_millis(read("interval_ms").unwrap_or(250).max(10) as u64);

        let run = Arc::new(AtomicBool::new(true));
        let worker_run = Arc::clone(&run);
        let worker_active = Arc::clone(&self.active);

        let handle = thread::Builder::new()
            .name("modkit-click-worker".to_string())
            .spawn(move || {
                let mut elapsed = Duration::ZERO;
                while worker_run.load(Ordering::SeqCst) {
                    thread::sleep(SLICE);
                    if !worker_active.load(Ordering::SeqCst) {
                        elapsed = Duration::ZERO;
                        continue;
                    }
                    elapsed += SLICE;
                    if elapsed >= interval {
                        elapsed = Duration::ZERO;
                        click(target_x as i32, target_y as i32);
                    }
                }
            })?;

        *self.lock_worker() = Some(Worker { run, handle });
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        let Some(worker) = self.lock_worker().take() else {
            return Ok(());
        };
        worker.run.store(false, Ordering::SeqCst);
        worker
            .handle
            .join()
            .map_err(|_| anyhow!("click worker panicked"))?;
        Ok(())
    }

    fn toggle_activation(&self, enabled: bool) -> bool {
        self.active.store(enabled, Ordering::SeqCst);
        self.log(if enabled { "engaged" } else { "disengaged" });
        true
    }

    fn hotkey_callback(&self) -> Option<HotkeyCallback> {
        let active = Arc::clone(&self.active);
        let services = self.services.get().cloned();
        Some(Arc::new(move || {
            let engaged = !active.fetch_xor(true, Ordering::SeqCst);
            if let Some(services) = &services {
                services.ui().log_line(if engaged {
                    "[auto_clicker] engaged"
                } else {
                    "[auto_clicker] disengaged"
                });
            }
        }))
    }

    fn run_calibration(&self) {
        self.log("calibration: position the cursor over the click target");
        let (x, y) = capture_target();
        let Some(services) = self.services.get() else {
            return;
        };
        let Some(host) = services.host() else {
            return;
        };

        let mut changes = SettingsMap::new();
        changes.insert("target_x".to_string(), SettingValue::Integer(i64::from(x)));
        changes.insert("target_y".to_string(), SettingValue::Integer(i64::from(y)));
        host.update_module_settings("auto_clicker", changes);
        self.log(&format!("calibration complete: target ({x}, {y})"));
    }
}

pub fn construct() -> anyhow::Result<Arc<dyn AutomationModule>> {
    Ok(Arc::new(AutoClickerModule::new()))
}

/// Captures the click target: the cursor position after a short countdown
/// on Windows, the screen-center fallback elsewhere.
#[cfg(target_os = "windows")]
fn capture_target() -> (i32, i32) {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    thread::sleep(Duration::from_secs(3));

    let mut point = POINT::default();
    // SAFETY: point is a valid out-pointer for the duration of the call.
    if unsafe { GetCursorPos(&mut point) }.is_ok() {
        (point.x, point.y)
    } else {
        (960, 540)
    }
}

#[cfg(not(target_os = "windows"))]
fn capture_target() -> (i32, i32) {
    (960, 540)
}

/// Fires one left click at the given screen position.
#[cfg(target_os = "windows")]
fn click(x: i32, y: i32) {
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
        MOUSEINPUT,
    };
    use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

    // SAFETY: Plain Win32 cursor positioning call.
    let _ = unsafe { SetCursorPos(x, y) };

    let button_event = |flags| INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dwFlags: flags,
                ..Default::default()
            },
        },
    };
    let inputs = [
        button_event(MOUSEEVENTF_LEFTDOWN),
        button_event(MOUSEEVENTF_LEFTUP),
    ];

    // SAFETY: inputs is a valid INPUT slice, cbsize matches the element size.
    unsafe {
        SendInput(&inputs, std::mem::size_of::<INPUT>() as i32);
    }
    trace!("click at ({}, {})", x, y);
}

#[cfg(not(target_os = "windows"))]
fn click(x: i32, y: i32) {
    trace!("click at ({}, {})", x, y);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
