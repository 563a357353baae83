pub mod config;
pub mod execution_config;
pub mod languages;
pub mod paths;
pub mod test_helpers;
pub mod validation;
