pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod diagnosis;
pub mod error;
pub mod history;
pub mod inference;
pub mod routes;
pub mod storage;

pub use app::AppServices;
pub use error::ApiError;
