pub mod archive_schema;
pub mod error;
pub mod manifest;
