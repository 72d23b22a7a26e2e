use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Configuration options of the posts service.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub database_url: String,
    /// Master key for session, identity and flash message cookies.
    /// Must be shared with the auth service issuing identities.
    pub secret: String,
    /// Where unauthenticated visitors are sent to sign in.
    pub auth_service_url: String,
    pub templates_dir: String,
    pub storage: StorageConfig,
}

/// Location of the public disk holding uploaded files.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    /// Filesystem directory files are written to.
    pub root: String,
    /// URL prefix the directory is served under.
    pub public_url: String,
}

impl ServerConfig {
    /// Loads `default.yaml` and `{app_env}.yaml` from `config_dir`, then
    /// applies `APP_*` environment overrides (`APP_STORAGE__ROOT` for nested
    /// keys).
    pub fn load(config_dir: &Path, app_env: &str) -> Result<Self, ConfigError> {
        let default_file = config_dir.join("default");
        let env_file = config_dir.join(app_env);

        Config::builder()
            .set_default("address", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("database_url", "app.db")?
            .set_default("auth_service_url", "/login")?
            .set_default("templates_dir", "templates/**/*")?
            .set_default("storage.root", "storage/app/public")?
            .set_default("storage.public_url", "/storage")?
            .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.yaml"),
            "secret: \"0123456789\"\nport: 9000\nstorage:\n  root: /srv/public\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("testing.yaml"), "port: 9100\n").unwrap();

        let config = ServerConfig::load(dir.path(), "testing").unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.storage.root, "/srv/public");
        assert_eq!(config.storage.public_url, "/storage");
        assert_eq!(config.address, "127.0.0.1");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(dir.path(), "local").is_err());
    }
}
