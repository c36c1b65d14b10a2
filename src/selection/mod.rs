pub mod active;
pub mod field_selection;
pub mod rejection;
pub mod tier;
