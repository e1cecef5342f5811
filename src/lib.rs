pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use websocket::ConnectionManager;
