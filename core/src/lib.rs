pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod progress;
pub mod service;

pub use error::{Error, ErrorKind, Result};
pub use service::{Dashboard, NutritionService, ReadMode};
