//! Wiring of the storage backend, the worker registry and the web interface.

pub mod controller_handler;

pub use controller_handler::Controller;
