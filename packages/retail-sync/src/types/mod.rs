pub mod config;
pub mod record;
pub mod report;
pub mod resource;
pub mod table;
pub mod window;
