pub mod bootstrap;
pub mod namespace;
pub mod reader;
pub mod session;
pub mod storage;
pub mod writer;

pub use bootstrap::{JobReport, Progress};
pub use namespace::DropOptions;
pub use session::{EngineFlags, WarehouseSession};
pub use storage::StorageRoot;
pub use writer::{SaveMode, TableWrite};
