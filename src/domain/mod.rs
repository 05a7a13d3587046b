pub mod address;
pub mod error;
pub mod module;
