pub mod config;
pub mod error;
pub mod db;
pub mod registry;
pub mod ingest;
pub mod query;

pub use config::Config;
pub use db::Db;
pub use error::{IngestError, QueryError, Result, XmlShredError};
pub use ingest::{ingest, ingest_file, IngestOptions};
pub use query::{count_tag, list_attribute_names, StoreStats};
pub use registry::{FileId, FileRecord};
