pub mod history_service;
pub mod models;

pub use history_service::{HistoryError, HistoryService};
pub use models::{DetectionInput, HistoryEntry};
