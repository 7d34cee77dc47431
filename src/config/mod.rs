//! Configuration files and the on-disk layout.
//!
//! Each managed server lives in its own directory under the user data
//! root. Settings are plain TOML files inside that directory; missing
//! files are created with defaults so a fresh directory is immediately
//! usable.

mod store;
mod types;

pub use store::{
    load_or_init, load_wrapper_config, save, save_wrapper_config, server_directory, ConfigError,
};
pub use types::WrapperConfig;
