pub mod dataset;
pub mod names;

pub use dataset::Dataset;
pub use names::{DatabaseName, Domain, Namespaces, QualifiedName, TableName};
