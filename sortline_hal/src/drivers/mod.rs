//! Port backend implementations.
//!
//! - [`serial`] - OS serial ports via the `serialport` crate
//! - [`simulation`] - Scripted devices for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `PortBackend` trait from [`crate::port`]
//! 3. Register its factory in [`register_builtin`]

pub mod serial;
pub mod simulation;

use crate::backend_registry::BackendRegistry;

/// Register all built-in backends.
pub fn register_builtin(registry: &mut BackendRegistry) {
    registry.register("serial", serial::create_backend);
    registry.register("simulation", simulation::create_backend);
}
