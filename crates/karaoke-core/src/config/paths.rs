//! Standard locations for karaoke configuration files

use std::path::PathBuf;

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "karaoke";

/// Get the default configuration directory
///
/// Returns `<platform config dir>/karaoke`, e.g. `~/.config/karaoke` on
/// Linux. Falls back to the current directory when no config dir exists.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the default path for a config file
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        assert!(default_config_dir().ends_with(CONFIG_DIR_NAME));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("player-config.yaml");
        assert!(path.ends_with("karaoke/player-config.yaml"));
    }
}
