pub mod db;
pub mod logging;
pub mod models;
pub mod resolve;
pub mod views;
