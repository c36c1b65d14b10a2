pub mod api_path;
pub mod error;
pub mod field;
pub mod field_catalog;
