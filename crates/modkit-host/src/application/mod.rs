//! Application layer of the automation host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The *application* layer sits between the module contract (`modkit-core`,
//! pure types and traits) and the infrastructure (OS hooks, storage, UI
//! bridge).  It orchestrates both but contains no OS calls of its own, so
//! everything here is unit-testable with in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`catalog`** – Module discovery: constructs each installable unit,
//!   reads its descriptor, injects services, and seeds the settings table
//!   with declared defaults.
//!
//! - **`lifecycle`** – The core of the host.  Starts, stops, restarts, and
//!   toggles modules; serializes every transition behind one exclusive
//!   lock; reconciles hotkey bindings with running state; routes setting
//!   updates and applies the restart-on-change rule.
//!
//! - **`calibration`** – Fire-and-forget background execution of a module's
//!   blocking calibration routine.

pub mod calibration;
pub mod catalog;
pub mod lifecycle;
