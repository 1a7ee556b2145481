//! Layered configuration for filedeck.
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults ([`Config::default()`]),
//! 2. one configuration file: either the path given explicitly, or the first
//!    of `config.toml`, `config.yaml`, `config.yml`, `config.json` found in
//!    the platform config directory,
//! 3. environment variables prefixed `FILEDECK_`, with `__` separating
//!    nested keys (`FILEDECK_DATABASE__PATH`, `FILEDECK_TRANSPORT__CHUNK_SIZE`).
//!
//! Maps merge key by key, so a file that declares one extra route keeps the
//! built-in routes as well.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use filedeck_transport::{ByteSize, RouteTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use url::Url;

const ENV_PREFIX: &str = "FILEDECK_";
const CONFIG_FILES: [&str; 4] = ["config.toml", "config.yaml", "config.yml", "config.json"];

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "filedeck")
}

/// Platform data directory, or the working directory when there is none.
fn data_dir() -> PathBuf {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: data_dir().join("filedeck.db") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory that uploaded objects are written to.
    pub root: PathBuf,
    /// Base URL objects are served from. `None` means `file://` URLs into
    /// [`root`](Self::root).
    pub public_url: Option<Url>,
    /// Bytes copied between progress events.
    pub chunk_size: ByteSize,
}
impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            root: data_dir().join("objects"),
            public_url: None,
            chunk_size: ByteSize::kb(64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub level: String,
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub transport: TransportConfig,
    pub routes: RouteTable,
    /// Route used when an upload does not name one.
    pub default_route: String,
    pub logging: LoggingConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            transport: TransportConfig::default(),
            routes: RouteTable::default(),
            default_route: "fileUploader".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Build the layered figment without extracting it.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                let found = project_dirs()
                    .map(|dirs| dirs.config_dir().to_path_buf())
                    .and_then(|dir| CONFIG_FILES.iter().map(|name| dir.join(name)).find(|p| p.is_file()));
                if let Some(path) = found {
                    tracing::debug!(path = %path.display(), "Using config file");
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from every layer.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(explicit)?)
    }

    /// Check rules that span several fields.
    pub fn validate(&self) -> Result<()> {
        if self.routes.is_empty() {
            exn::bail!(ErrorKind::Validation("no upload routes configured".to_string()));
        }
        if self.routes.get(&self.default_route).is_none() {
            exn::bail!(ErrorKind::Validation(format!("default route `{}` is not configured", self.default_route)));
        }
        for (name, route) in self.routes.iter() {
            if route.categories().next().is_none() {
                exn::bail!(ErrorKind::Validation(format!("route `{name}` accepts no categories")));
            }
            if let Some((category, _)) = route.categories().find(|(_, limits)| limits.max_file_count == 0) {
                exn::bail!(ErrorKind::Validation(format!("route `{name}` allows zero {category} files")));
            }
        }
        if self.transport.chunk_size.bytes() == 0 {
            exn::bail!(ErrorKind::Validation("transport.chunk_size must be positive".to_string()));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            exn::bail!(ErrorKind::Validation(format!("unknown log level `{}`", self.logging.level)));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedeck_transport::Category;
    use rstest::rstest;

    fn with_toml(toml: &str) -> Result<Config> {
        Config::from_figment(&Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.default_route, "fileUploader");
        assert_eq!(config.logging.level, "info");
        assert!(config.database.path.ends_with("filedeck.db"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = with_toml(
            r#"
            default_route = "avatar"

            [database]
            path = "/tmp/files.db"

            [transport]
            public_url = "https://files.example.com/objects/"
            chunk_size = "1MB"

            [routes.avatar.image]
            max_file_size = "1MB"
            max_file_count = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, Path::new("/tmp/files.db"));
        assert_eq!(config.transport.chunk_size, ByteSize::mb(1));
        assert_eq!(config.transport.public_url.unwrap().host_str(), Some("files.example.com"));
        let (_, avatar) = config.routes.get("avatar").unwrap().limits_for(Category::Image).unwrap();
        assert_eq!(avatar.max_file_size, ByteSize::mb(1));
        // Built-in routes survive the merge.
        assert!(config.routes.get("pdfUploader").is_some());
    }

    #[rstest]
    #[case(r#"default_route = "nope""#)]
    #[case("[logging]\nlevel = \"chatty\"")]
    #[case("[transport]\nchunk_size = 0")]
    #[case("[routes.broken.image]\nmax_file_size = \"1MB\"\nmax_file_count = 0")]
    fn test_invalid_values(#[case] toml: &str) {
        let err = with_toml(toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[test]
    fn test_unparseable_size() {
        let err = with_toml("[transport]\nchunk_size = \"lots\"").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid));
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filedeck.yaml");
        std::fs::write(&path, "default_route: pdfUploader\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.default_route, "pdfUploader");
    }

    #[test]
    fn test_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*missing, ErrorKind::NotFound(_)));

        let ini = dir.path().join("config.ini");
        std::fs::write(&ini, "x = 1").unwrap();
        let unsupported = Config::load(Some(&ini)).unwrap_err();
        assert!(matches!(&*unsupported, ErrorKind::UnsupportedFormat(_)));
    }
}
