use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use nutrilog_core::ReadMode;
use nutrilog_core::progress::ProgressThresholds;

pub const DB_ENV: &str = "NUTRILOG_DB";
pub const READ_MODE_ENV: &str = "NUTRILOG_READ_MODE";

/// Contents of the optional `config.toml` in the data directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    progress: ProgressThresholds,
    store: StoreSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StoreSection {
    read_mode: ReadMode,
    db_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub read_mode: ReadMode,
    pub thresholds: ProgressThresholds,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrilog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::from_dir(
            data_dir,
            std::env::var(DB_ENV).ok(),
            std::env::var(READ_MODE_ENV).ok(),
        )
    }

    fn from_dir(
        data_dir: PathBuf,
        db_override: Option<String>,
        read_mode_override: Option<String>,
    ) -> Result<Self> {
        let file = read_file_config(&data_dir.join("config.toml"))?;

        let db_path = db_override
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or(file.store.db_path)
            .unwrap_or_else(|| data_dir.join("nutrilog.db"));

        let read_mode = match read_mode_override {
            Some(mode) => mode
                .parse::<ReadMode>()
                .with_context(|| format!("Invalid {READ_MODE_ENV}"))?,
            None => file.store.read_mode,
        };

        file.progress
            .validate()
            .context("Invalid [progress] section in config.toml")?;

        tracing::debug!(db = %db_path.display(), ?read_mode, "configuration loaded");

        Ok(Config {
            db_path,
            data_dir,
            read_mode,
            thresholds: file.progress,
        })
    }

    /// Load the API key from disk, or generate a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path().to_path_buf(), None, None).unwrap();
        assert_eq!(config.db_path, dir.path().join("nutrilog.db"));
        assert_eq!(config.read_mode, ReadMode::Strict);
        assert_eq!(config.thresholds, ProgressThresholds::default());
    }

    #[test]
    fn test_config_file_sections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[progress]\nmin_pct_met = 70\n\n[store]\nread_mode = \"degraded\"\ndb_path = \"/tmp/other.db\"\n",
        )
        .unwrap();
        let config = Config::from_dir(dir.path().to_path_buf(), None, None).unwrap();
        assert_eq!(config.thresholds.min_pct_met, 70);
        assert!((config.thresholds.avg_tolerance - 1.05).abs() < f64::EPSILON);
        assert_eq!(config.read_mode, ReadMode::Degraded);
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[store]\nread_mode = \"degraded\"\n",
        )
        .unwrap();
        let config = Config::from_dir(
            dir.path().to_path_buf(),
            Some("/tmp/env.db".to_string()),
            Some("strict".to_string()),
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.read_mode, ReadMode::Strict);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[store]\nread_mode = \"sometimes\"\n")
            .unwrap();
        assert!(Config::from_dir(dir.path().to_path_buf(), None, None).is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(
            Config::from_dir(dir.path().to_path_buf(), None, Some("bogus".to_string())).is_err()
        );
    }

    #[test]
    fn test_out_of_range_thresholds_are_rejected() {
        for body in [
            "[progress]\navg_tolerance = -0.5\n",
            "[progress]\navg_tolerance = nan\n",
            "[progress]\nmin_pct_met = 150\n",
        ] {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("config.toml"), body).unwrap();
            let err = Config::from_dir(dir.path().to_path_buf(), None, None).unwrap_err();
            assert!(format!("{err:#}").contains("[progress]"), "{body}");
        }
    }

    #[test]
    fn test_api_key_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path().to_path_buf(), None, None).unwrap();
        let first = config.load_or_create_api_key().unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(config.load_or_create_api_key().unwrap(), first);
    }
}
