pub mod access;
pub mod app;
pub mod clock;
pub mod config;
pub mod errors;
pub mod habits;
pub mod handlers;
pub mod models;
pub mod operations;
pub mod ranks;
pub mod retention;
pub mod service;
pub mod state;
pub mod storage;

pub use app::router;
pub use config::Config;
pub use state::AppState;
