use crate::connection::ConnectionInfo;
use crate::provider::{Provider, connect};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store settings read from `polystore.toml`.
///
/// Either `uri` or the discrete connection fields are used; `uri` wins when
/// both are present. Entries under `[options]` are merged into the parsed
/// connection without replacing options the URI already carries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    pub uri: Option<String>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl StoreConfig {
    /// Resolve the configured connection target
    pub fn connection_info(&self) -> crate::Result<ConnectionInfo> {
        let mut info = match &self.uri {
            Some(uri) => ConnectionInfo::parse(uri)?,
            None => {
                let protocol = self.protocol.clone().ok_or_else(|| {
                    crate::Error::InvalidConnection("config sets neither uri nor protocol".to_string())
                })?;
                ConnectionInfo {
                    protocol,
                    host: self.host.clone().unwrap_or_default(),
                    port: self.port,
                    username: self.username.clone(),
                    password: self.password.clone(),
                    database: self.database.clone(),
                    options: BTreeMap::new(),
                }
            }
        };

        for (key, value) in &self.options {
            info.option_if_absent(key.clone(), value.clone());
        }
        if info.protocol == "mysql" {
            info = info.with_mysql_defaults();
        }
        Ok(info)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("polystore.toml")
}

/// Read and validate a store config. A missing file is `Ok(None)`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("reading store config {}", path.display()))?;
    let config: StoreConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing store config {}", path.display()))?;
    config
        .connection_info()
        .with_context(|| format!("store config {} has no usable connection", path.display()))?;
    tracing::debug!("loaded store config from {}", path.display());
    Ok(Some(config))
}

/// Write a store config, refusing to replace an existing file unless `force`
pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (pass force to overwrite)", path.display());
    }
    config
        .connection_info()
        .context("refusing to write a config with no usable connection")?;

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Open the provider a config file points at
pub fn connect_from_config(path: Option<&Path>) -> anyhow::Result<Arc<dyn Provider>> {
    let config = load_config(path)?.ok_or_else(|| {
        anyhow::anyhow!(
            "no store config at {}",
            path.map(Path::to_path_buf)
                .unwrap_or_else(default_config_path)
                .display()
        )
    })?;
    let info = config.connection_info()?;
    tracing::info!("connecting to {}", info);
    Ok(connect(&info)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polystore.toml");
        let config = StoreConfig {
            uri: Some("sqlite::memory:".into()),
            ..StoreConfig::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.uri.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_unusable_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polystore.toml");
        assert!(write_config(&path, &StoreConfig::default(), false).is_err());
        assert!(!path.exists());

        std::fs::write(&path, "host = \"db\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
        assert!(connect_from_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_discrete_fields() {
        let config: StoreConfig = toml::from_str(
            r#"
            protocol = "mysql"
            host = "db"
            port = 3307
            username = "app"
            database = "shop"

            [options]
            useSSL = "true"
            "#,
        )
        .unwrap();

        let info = config.connection_info().unwrap();
        assert_eq!(info.host, "db");
        assert_eq!(info.port, Some(3307));
        assert_eq!(info.option("useSSL"), Some("true"));
        assert_eq!(info.option("serverTimezone"), Some("UTC"));
    }

    #[test]
    fn test_uri_options_take_precedence() {
        let config = StoreConfig {
            uri: Some("mongodb://db/app?w=majority".into()),
            options: BTreeMap::from([("w".to_string(), "1".to_string())]),
            ..StoreConfig::default()
        };
        let info = config.connection_info().unwrap();
        assert_eq!(info.option("w"), Some("majority"));
    }

    #[test]
    fn test_empty_config_is_invalid() {
        assert!(matches!(
            StoreConfig::default().connection_info(),
            Err(crate::Error::InvalidConnection(_))
        ));
    }
}
