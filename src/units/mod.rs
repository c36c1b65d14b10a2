pub mod adapter;
pub mod expression;
pub mod registry;
