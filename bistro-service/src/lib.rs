pub mod admin;
pub mod app;
pub mod cart_handlers;
pub mod carts;
pub mod catalog_handlers;
pub mod config;
pub mod directory;
pub mod extract;
pub mod jwt_handlers;
pub mod metrics;
pub mod store;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, cors_layer, AppState};
