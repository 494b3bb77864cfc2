//! virtrest configuration.
//!
//! Configuration is read from a TOML file, either the path given on the
//! command line or `<config dir>/virtrest/config.toml`. A missing file means
//! defaults; command-line flags override whatever the file says.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name for config file storage.
const APP_NAME: &str = "virtrest";

/// Config file name inside the application directory.
const CONFIG_FILE: &str = "config.toml";

/// Default hypervisor endpoint.
pub const DEFAULT_URI: &str = "qemu:///system";

/// Default listen address for the HTTP server.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Global virtrest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtrestConfig {
    /// Hypervisor endpoint every session is opened against.
    pub uri: String,

    /// Address and port the HTTP server binds to.
    pub listen: String,

    /// Upper bound on a single request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for VirtrestConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            listen: DEFAULT_LISTEN.to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl VirtrestConfig {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present and defaults apply otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load_from(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = VirtrestConfig::default();
        assert_eq!(config.uri, "qemu:///system");
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "uri = \"qemu+ssh://admin@host/system\"").unwrap();

        let config = VirtrestConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.uri, "qemu+ssh://admin@host/system");
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VirtrestConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs = \"soon\"").unwrap();
        let err = VirtrestConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = VirtrestConfig {
            uri: "mock:///default".into(),
            listen: "0.0.0.0:9000".into(),
            request_timeout_secs: 30,
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(toml::from_str::<VirtrestConfig>(&text).unwrap(), config);
    }
}
