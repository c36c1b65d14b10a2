pub mod plan;
pub mod wizard;
