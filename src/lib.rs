pub mod canvas;
pub mod change_tracking;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod session_management;
pub mod storage;
pub mod web_interface;

pub use session_management::session;
pub use session_management::SessionStatus;
