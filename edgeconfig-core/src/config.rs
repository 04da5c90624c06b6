use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "EDGECONFIG_CONFIG";

/// Settings shared by the CLI and the GUI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `<schema>.db` files
    pub data_dir: PathBuf,
    /// Per-schema database file overrides
    pub schemas: HashMap<String, PathBuf>,
    /// How many times to try connecting before giving up
    pub connect_attempts: u32,
    /// keytool command line prefix, e.g. `["keytool"]`
    pub keytool: Vec<String>,
    /// Keystore used by certificate import when none is given
    pub keystore: Option<PathBuf>,
    pub storepass: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|home| home.join(".edgeconfig"))
            .unwrap_or_else(|| PathBuf::from(".edgeconfig"));
        Self {
            data_dir,
            schemas: HashMap::new(),
            connect_attempts: 3,
            keytool: vec!["keytool".to_string()],
            keystore: None,
            storepass: "changeit".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`; a missing file means defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;
        config.check()?;
        Ok(config)
    }

    /// Loads from an explicit path, else the environment, else the home default
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::load(resolve_path(explicit)?)
    }

    /// Saves the configuration to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        fs::write(path, content).map_err(|e| Error::io(path, e))
    }

    fn check(&self) -> Result<()> {
        if self.keytool.is_empty() {
            return Err(Error::Config("keytool command must not be empty".to_string()));
        }
        Ok(())
    }
}

/// The file `Config::resolve` reads for this `--config` value
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p.to_path_buf()),
        None => get_config_path(),
    }
}

/// Gets the path to the configuration file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::Config("Failed to determine home directory".to_string()))?;
    Ok(home_dir.join(".edgeconfig.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.keytool, vec!["keytool".to_string()]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edgeconfig.yaml");
        fs::write(
            &path,
            "data_dir: /var/lib/edgeconfig\nschemas:\n  anss: /data/anss.db\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/edgeconfig"));
        assert_eq!(
            config.schemas.get("anss"),
            Some(&PathBuf::from("/data/anss.db"))
        );
        assert_eq!(config.connect_attempts, 3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/edgeconfig.yaml");
        let mut config = Config::default();
        config.connect_attempts = 5;
        config.keystore = Some(PathBuf::from("/etc/cacerts"));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/tmp/explicit.yaml");
        assert_eq!(resolve_path(Some(&path)).unwrap(), path);
    }

    #[test]
    fn test_empty_keytool_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edgeconfig.yaml");
        fs::write(&path, "keytool: []\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
