//! Sortline Common Library
//!
//! Shared constants, configuration loading and status types for all
//! sorting line workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Line configuration and TOML loading
//! - [`consts`] - Default timings, serial settings and motion script
//! - [`clock`] - Monotonic time source (real and manual)
//! - [`snapshot`] - Controller snapshot and vision box types
//! - [`prelude`] - Common re-exports for convenience

pub mod clock;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod snapshot;
