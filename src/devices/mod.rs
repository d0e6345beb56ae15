/// Device enumeration and classification
pub mod catalog;
/// Display label pipeline
pub mod label;
/// External audio-control queries
pub mod query;

pub use catalog::{AudioDevice, DeviceCatalog, DeviceKind};
pub use query::{AudioQuery, CommandQuery, DeviceQuery, QueryError};
