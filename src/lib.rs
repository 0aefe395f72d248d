pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod resource;
pub mod state;

pub use handlers::router;
pub use state::AppState;
