pub mod protocol;
pub mod rest;
pub mod state;
pub mod tick_task;
pub mod ws_handler;

// Re-export the main WebSocket handler and the router builder to make them
// easily accessible to the binary that starts the web server.
pub use router::build_router;
pub use ws_handler::ws_handler;

mod router;
