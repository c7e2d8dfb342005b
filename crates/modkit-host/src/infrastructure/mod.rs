//! Infrastructure layer for the automation host.
//!
//! Contains OS- and storage-facing adapters: the global keyboard-hotkey
//! backend, settings and host-config persistence, and the UI command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `modkit_core`, but MUST NOT be imported by the contract crate.

pub mod hotkey;
pub mod storage;
pub mod ui_bridge;
