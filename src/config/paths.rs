//! Where Loki keeps its files.
//!
//! | What | Linux | macOS | Windows |
//! |------|-------|-------|---------|
//! | `settings.toml` | `~/.config/loki-assistant/` | `~/Library/Application Support/loki-assistant/` | `%APPDATA%\loki-assistant\` |
//! | Whisper `ggml-*.bin` | `~/.local/share/loki-assistant/models/` | `~/Library/Application Support/loki-assistant/models/` | `%LOCALAPPDATA%\loki-assistant\models\` |

use std::path::{Path, PathBuf};

const APP_DIR: &str = "loki-assistant";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Searched for `ggml-<model>.bin`.
    pub models_dir: PathBuf,
}

impl AppPaths {
    /// Platform directories from `dirs`, or the working directory when the
    /// platform reports none.
    pub fn new() -> Self {
        Self::under(
            &platform_root(dirs::config_dir()),
            &platform_root(dirs::data_local_dir()),
        )
    }

    /// Lay the application directories out under explicit roots.
    pub fn under(config_root: &Path, data_root: &Path) -> Self {
        let config_dir = config_root.join(APP_DIR);
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
            models_dir: data_root.join(APP_DIR).join("models"),
        }
    }

    pub fn model_file(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn platform_root(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| {
        log::warn!("paths: platform directory unavailable, using working directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_under_explicit_roots() {
        let config = tempdir().expect("config root");
        let data = tempdir().expect("data root");
        let paths = AppPaths::under(config.path(), data.path());

        assert_eq!(paths.config_dir, config.path().join("loki-assistant"));
        assert_eq!(
            paths.settings_file,
            config.path().join("loki-assistant").join("settings.toml")
        );
        assert_eq!(
            paths.model_file("base.en"),
            data.path()
                .join("loki-assistant")
                .join("models")
                .join("ggml-base.en.bin")
        );
    }

    #[test]
    fn platform_paths_end_in_the_app_directory() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with(APP_DIR));
        assert!(paths.settings_file.ends_with("loki-assistant/settings.toml"));
    }

    #[test]
    fn missing_platform_dir_falls_back_to_cwd() {
        assert_eq!(platform_root(None), PathBuf::from("."));
    }
}
