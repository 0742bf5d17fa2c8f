pub mod config;
pub mod extract;
pub mod models;
pub mod renderer;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use extract::ItemExtractor;
pub use models::{Item, Snapshot};
pub use renderer::{ChromeRenderer, PageRenderer};
pub use store::{ItemStore, Subscription};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
