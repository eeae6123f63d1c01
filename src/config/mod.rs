use crate::library::PagingMode;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub enrichment: EnrichmentConfig,
    pub verses: VersesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whole-request deadline (`10s`, `1m`, `500ms`), enrichment and
    /// storage included.
    pub request_timeout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the `groups` and `songs` tables.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Base URL of the `/info` provider (`host:port` means plain http).
    /// Unset with `serve_stub` on means this server's own address.
    pub base_url: Option<String>,
    pub timeout: String,
    /// Mount a placeholder `/info` endpoint on this server.
    pub serve_stub: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersesConfig {
    pub paging: PagingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// When set, logs go to `app-YYYY-MM-DD.log` in this directory.
    pub dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: "10s".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "songlib", "songlib");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("songlib"));
        Self {
            path: data_dir.join("songs.db"),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: "5s".to_string(),
            serve_stub: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        parse_timeout(&self.request_timeout)
            .with_context(|| format!("invalid server.request_timeout: {}", self.request_timeout))
    }
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        parse_timeout(&self.timeout)
            .with_context(|| format!("invalid enrichment.timeout: {}", self.timeout))
    }
}

impl Config {
    /// Override file values from deployment environment variables.
    pub fn apply_env<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("SRV_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("SRV_PORT") {
            self.server.port = v.parse().with_context(|| format!("invalid SRV_PORT: {v}"))?;
        }
        if let Some(v) = var("SRV_TIMEOUT") {
            parse_timeout(&v).with_context(|| format!("invalid SRV_TIMEOUT: {v}"))?;
            self.server.request_timeout = v;
        }
        if let Some(v) = var("DB_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = var("INFO_BASE_URL") {
            self.enrichment.base_url = Some(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log.level = v;
        }
        Ok(())
    }

    /// Where the enrichment client sends `/info` lookups.
    ///
    /// Without an explicit `base_url` the built-in stub on this server is
    /// used, so the address follows `server.host`/`server.port`.
    pub fn info_base_url(&self) -> anyhow::Result<String> {
        if let Some(url) = &self.enrichment.base_url {
            return Ok(url.clone());
        }
        if !self.enrichment.serve_stub {
            anyhow::bail!("enrichment.base_url is required when enrichment.serve_stub is off");
        }
        let host = match self.server.host.as_str() {
            "" | "0.0.0.0" => "127.0.0.1",
            "::" | "[::]" => "[::1]",
            other => other,
        };
        Ok(format!("http://{}:{}", host, self.server.port))
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.server.request_timeout()?;
        self.enrichment.timeout()?;
        Ok(())
    }
}

/// Go-style duration (`10s`, `1m30s`, `500ms`); a bare number is seconds.
/// Zero is rejected since it would expire every request immediately.
fn parse_timeout(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let timeout = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(raw)?,
    };
    if timeout.is_zero() {
        anyhow::bail!("timeout must be greater than zero");
    }
    Ok(timeout)
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "songlib", "songlib").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Load the config file, writing defaults on first run.
pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = Config::default();
        write_config(&cfg, &path)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());
        assert_eq!(load(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 9000\n\n[verses]\npaging = \"page\"\n",
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.verses.paging, PagingMode::Page);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = \"eighty\"\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SRV_HOST", "0.0.0.0"),
            ("SRV_PORT", "8081"),
            ("SRV_TIMEOUT", "30s"),
            ("INFO_BASE_URL", "info.local:9000"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8081");
        assert_eq!(cfg.server.request_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(cfg.info_base_url().unwrap(), "info.local:9000");

        let err = cfg.apply_env(|k| (k == "SRV_PORT").then(|| "nope".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn test_stub_url_follows_server_port() {
        let mut cfg = Config::default();
        assert_eq!(cfg.info_base_url().unwrap(), "http://127.0.0.1:8080");

        cfg.apply_env(|k| (k == "SRV_PORT").then(|| "9000".to_string()))
            .unwrap();
        assert_eq!(cfg.info_base_url().unwrap(), "http://127.0.0.1:9000");

        cfg.server.host = "0.0.0.0".into();
        assert_eq!(cfg.info_base_url().unwrap(), "http://127.0.0.1:9000");

        cfg.enrichment.serve_stub = false;
        assert!(cfg.info_base_url().is_err());
    }

    #[test]
    fn test_timeouts_accept_durations() {
        assert_eq!(parse_timeout("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_timeout("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_timeout("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_timeout("1m30s").unwrap(), Duration::from_secs(90));
        assert!(parse_timeout("soon").is_err());

        let mut cfg = Config::default();
        cfg.apply_env(|k| (k == "SRV_TIMEOUT").then(|| "1m".to_string()))
            .unwrap();
        assert_eq!(cfg.server.request_timeout().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("0s").is_err());

        let mut cfg = Config::default();
        assert!(cfg
            .apply_env(|k| (k == "SRV_TIMEOUT").then(|| "0".to_string()))
            .is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nrequest_timeout = \"0s\"\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
