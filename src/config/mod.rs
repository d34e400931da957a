//! Declarative file loading and the optional tool config file.

mod file;
mod loader;


pub use file::{ConfigFile, LoadDefaults};
pub use loader::{load_suite, load_test, load_vars_file};
