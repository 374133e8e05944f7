mod app;
mod auth;
mod commands;
mod error;
mod queries;

pub use app::app;
pub use auth::AdminToken;
