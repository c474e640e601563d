pub mod app;
pub mod class_handlers;
pub mod config;
pub mod enrollment;
pub mod extract;
pub mod gateway;
pub mod identity_roles;
pub mod metrics;
pub mod models;
pub mod payment_handlers;
pub mod selection_handlers;
pub mod store;
pub mod token_handlers;
pub mod user_handlers;

pub use app::{build_router, AppState};
