pub mod file;
pub mod paths;
pub mod settings;
pub mod types;
