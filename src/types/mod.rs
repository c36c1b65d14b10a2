pub mod lat_lon;
pub mod module;
pub mod record;
pub mod unit_system;
pub mod value;
