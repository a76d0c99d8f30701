//! Configuration file handling
//!
//! YAML load/save shared by the player and any other front end, plus the
//! standard locations for karaoke config files.
//!
//! ```ignore
//! use karaoke_core::config::{default_config_path, load_config, save_config};
//!
//! let path = default_config_path("player-config.yaml");
//! let config: MyConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config, try_load_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_DIR_NAME};
