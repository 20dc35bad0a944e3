pub mod config;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::{Config, SIMILARITY_THRESHOLD};
pub use dev_mode::DevMode;
pub use error::{GateError, Result};
pub use paths::{config_candidates, dev_socket_path, system_config_file, system_data_dir, system_socket_path};
