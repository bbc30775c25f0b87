//! Config path resolution
//!
//! Handles resolving the location of the zperms configuration file.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the zperms base directory
pub const HOME_ENV: &str = "ZPERMS_HOME";

/// File name of the core configuration
pub const CONFIG_FILE_NAME: &str = "zperms.toml";

/// Returns the zperms base directory.
///
/// Uses `$ZPERMS_HOME` when set, otherwise the directory holding the
/// running executable.
pub fn zperms_base_dir() -> ConfigResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the configs directory.
///
/// Path: `{base}/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(zperms_base_dir()?.join("configs"))
}

/// Returns the core config path.
///
/// Path: `{base}/configs/zperms.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join(CONFIG_FILE_NAME))
}
