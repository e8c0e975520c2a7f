pub mod app;
pub mod cache;
pub mod config;
pub mod errors;
pub mod gate;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod reconciler;
pub mod record;
pub mod state;
pub mod store;
pub mod table;
pub mod ui;

pub use app::router;
pub use config::{AppConfig, load_config};
pub use state::AppState;
