use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::{error, info};
use tokio::fs;

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "haptic-companion";

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// `<platform config dir>/haptic-companion`
pub fn app_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("No configuration directory on this platform"))
}
