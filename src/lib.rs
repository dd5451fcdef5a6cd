pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod types;

pub use error::WarehouseError;
pub use service::WarehouseSession;
