//! File-system persistence for the host.
//!
//! - **`settings`** – the per-module settings table (indented JSON).
//! - **`config`** – the host's own configuration (TOML).

pub mod config;
pub mod settings;
