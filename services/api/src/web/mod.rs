pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod tasks;
pub mod ws_handler;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use middleware::require_auth;
pub use rest::validate_comment_handler;
pub use ws_handler::ws_handler;
