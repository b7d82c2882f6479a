pub mod loader;
pub mod sink;
