use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "mathsprint";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    /// Directory holding persisted records such as best scores.
    pub fn data_dir() -> Option<PathBuf> {
        Self::project().map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::project().map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
    }

    pub fn log_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join("mathsprint.log"))
        } else {
            Self::data_dir().map(|dir| dir.join("mathsprint.log"))
        }
    }
}
