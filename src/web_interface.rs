// Web Interface module root
pub mod identity;
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use identity::Identity;
pub use routes::{api_routes, ApiContext};
pub use web_server::WebServer;
