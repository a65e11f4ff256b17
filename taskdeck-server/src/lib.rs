//! taskdeck task service library.
//!
//! Exposes the server for use in tests and embedding: REST endpoints
//! for task CRUD and reordering, plus a WebSocket endpoint that
//! broadcasts every mutation as a live event to all connected clients.

pub mod config;
pub mod server;
pub mod state;
