//! Dashboard JSON API.
//!
//! Serves the board's collections and derived views over HTTP. Started by
//! the `serve` command.

mod server;

pub use server::{ApiError, DashboardServer, build_router, start_server, status_for};
