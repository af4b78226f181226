//! Config file loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use floorwatch_directory::{
    DirectorySource, HttpDirectory, HttpDirectoryConfig, MemoryDirectory, RetryPolicy,
};
use floorwatch_identity::Thresholds;
use floorwatch_monitor::MonitorConfig;
use serde::Deserialize;
use serde_json::Value;

/// Config file format. Durations are in seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: DirectoryConfig,
    pub dim: Option<usize>,
    pub refresh_interval: Option<f64>,
    pub stale_threshold: Option<f64>,
    pub sweep_interval: Option<f64>,
    pub presence_timeout: Option<f64>,
    pub arrival_cooldown: Option<f64>,
    pub thresholds: Option<Thresholds>,
    pub retry: RetryConfig,
    /// Source name to location id.
    pub locations: BTreeMap<String, i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: Option<String>,
    pub path: Option<String>,
    pub request_timeout: Option<f64>,
    /// Serve the roster from a local JSON file instead of the service.
    pub roster_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    pub delay: Option<f64>,
    pub attempt_timeout: Option<f64>,
    pub backoff_factor: Option<u32>,
}

/// Reads a YAML or JSON config, picked by file extension.
pub fn load(path: &Path) -> Result<FileConfig> {
    let data = std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mut cfg: FileConfig = match ext {
        "json" => serde_json::from_slice(&data)?,
        "yaml" | "yml" => serde_yaml::from_slice(&data)?,
        _ => bail!("unsupported config extension: {:?}", ext),
    };
    cfg.expand_env();
    Ok(cfg)
}

fn secs(field: &str, v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v).with_context(|| format!("{field}: invalid duration {v}"))
}

fn apply(field: &str, v: Option<f64>, target: &mut Duration) -> Result<()> {
    if let Some(v) = v {
        *target = secs(field, v)?;
    }
    Ok(())
}

impl FileConfig {
    fn expand_env(&mut self) {
        if let Some(url) = &mut self.directory.url {
            *url = expand_env(url);
        }
        if let Some(path) = &mut self.directory.path {
            *path = expand_env(path);
        }
        if let Some(file) = &mut self.directory.roster_file {
            *file = PathBuf::from(expand_env(&file.to_string_lossy()));
        }
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        let mut cfg = MonitorConfig::default();
        if let Some(dim) = self.dim {
            cfg.dim = dim;
        }
        apply("refresh_interval", self.refresh_interval, &mut cfg.refresh_interval)?;
        apply("stale_threshold", self.stale_threshold, &mut cfg.stale_threshold)?;
        apply("sweep_interval", self.sweep_interval, &mut cfg.sweep_interval)?;
        apply("presence_timeout", self.presence_timeout, &mut cfg.presence_timeout)?;
        apply("arrival_cooldown", self.arrival_cooldown, &mut cfg.arrival_cooldown)?;
        if let Some(t) = self.thresholds {
            cfg.thresholds = t;
        }
        cfg.retry = self.retry.policy()?;
        Ok(cfg.with_defaults())
    }

    /// Builds the roster source: a local file if one is configured,
    /// otherwise the directory service at `url_override` or the configured
    /// URL.
    pub fn directory_source(&self, url_override: Option<&str>) -> Result<Arc<dyn DirectorySource>> {
        if let Some(file) = &self.directory.roster_file {
            let entries = load_roster_file(file)?;
            tracing::info!(path = %file.display(), entries = entries.len(), "serving roster from file");
            return Ok(Arc::new(MemoryDirectory::from_values(entries)));
        }

        let url = url_override
            .map(str::to_string)
            .or_else(|| self.directory.url.clone())
            .filter(|u| !u.is_empty())
            .context("directory url is required (config directory.url or --directory-url)")?;

        let mut http = HttpDirectoryConfig::new(url);
        if let Some(path) = &self.directory.path {
            http = http.with_path(path.clone());
        }
        if let Some(t) = self.directory.request_timeout {
            http = http.with_request_timeout(secs("directory.request_timeout", t)?);
        }
        Ok(Arc::new(HttpDirectory::with_config(http)?))
    }
}

impl RetryConfig {
    fn policy(&self) -> Result<RetryPolicy> {
        let mut p = RetryPolicy::default();
        if let Some(n) = self.attempts {
            p.attempts = n;
        }
        apply("retry.delay", self.delay, &mut p.delay)?;
        apply("retry.attempt_timeout", self.attempt_timeout, &mut p.attempt_timeout)?;
        if let Some(f) = self.backoff_factor {
            p.backoff_factor = f;
        }
        Ok(p)
    }
}

/// A roster file holds either the service's `{"data": [...]}` envelope
/// or a bare array. Entries are left undecoded, as the service would
/// return them.
fn load_roster_file(path: &Path) -> Result<Vec<Value>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RosterFile {
        Envelope { data: Vec<Value> },
        Records(Vec<Value>),
    }

    let data = std::fs::read(path).with_context(|| format!("read roster {}", path.display()))?;
    let parsed: RosterFile = serde_json::from_slice(&data)
        .with_context(|| format!("parse roster {}", path.display()))?;
    Ok(match parsed {
        RosterFile::Envelope { data } => data,
        RosterFile::Records(entries) => entries,
    })
}

/// Expands `${VAR}` references from the environment. A whole-string
/// `$VAR` is expanded too. Unset variables expand to empty.
fn expand_env(s: &str) -> String {
    if let Some(name) = s.strip_prefix('$')
        && !name.starts_with('{')
    {
        return std::env::var(name).unwrap_or_default();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + len];
        out.push_str(&std::env::var(name).unwrap_or_default());
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg: FileConfig = serde_yaml::from_str(
            r#"
directory:
  url: http://dir.local
  request_timeout: 2.5
presence_timeout: 300
thresholds:
  identify: 0.5
retry:
  attempts: 4
  delay: 0.25
locations:
  lobby-cam: 1
  floor2-cam: 2
"#,
        )
        .unwrap();

        let m = cfg.monitor_config().unwrap();
        assert_eq!(m.dim, 512);
        assert_eq!(m.presence_timeout, Duration::from_secs(300));
        assert_eq!(m.refresh_interval, Duration::from_secs(10));
        assert_eq!(m.thresholds.identify, 0.5);
        assert_eq!(m.thresholds.duplicate, 0.40);
        assert_eq!(m.retry.attempts, 4);
        assert_eq!(m.retry.delay, Duration::from_millis(250));
        assert_eq!(m.retry.attempt_timeout, Duration::from_secs(5));
        assert_eq!(cfg.locations.get("floor2-cam"), Some(&2));
        assert_eq!(cfg.directory.request_timeout, Some(2.5));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: FileConfig = serde_yaml::from_str("{}").unwrap();
        let m = cfg.monitor_config().unwrap();
        assert_eq!(m.stale_threshold, Duration::from_secs(60));
        assert_eq!(m.arrival_cooldown, Duration::from_secs(300));
        assert!(cfg.directory_source(None).is_err());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let cfg: FileConfig = serde_yaml::from_str("sweep_interval: -1").unwrap();
        let err = cfg.monitor_config().unwrap_err();
        assert!(err.to_string().contains("sweep_interval"), "{err}");
    }

    #[test]
    fn expands_env_references() {
        // SAFETY: test-local variable name, no other thread reads it.
        unsafe { std::env::set_var("FLOORWATCH_TEST_HOST", "dir.internal") };
        assert_eq!(expand_env("http://${FLOORWATCH_TEST_HOST}:8080"), "http://dir.internal:8080");
        assert_eq!(expand_env("$FLOORWATCH_TEST_HOST"), "dir.internal");
        assert_eq!(expand_env("${FLOORWATCH_TEST_UNSET_VAR}"), "");
        assert_eq!(expand_env("plain"), "plain");
        assert_eq!(expand_env("broken ${OPEN"), "broken ${OPEN");
    }

    #[tokio::test]
    async fn roster_file_path_expands_env() {
        let dir = std::env::temp_dir().join(format!("floorwatch-roster-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("roster.json"),
            r#"{"data": [
                {"id": 1, "name": "Ana", "face_embedding": [1.0, 0.0]},
                {"id": 2, "name": "Ben", "face_embedding": [0.0, null]}
            ]}"#,
        )
        .unwrap();
        let config_path = dir.join("floorwatch.yaml");
        std::fs::write(&config_path, "directory:\n  roster_file: ${FLOORWATCH_TEST_ROSTER_DIR}/roster.json\n")
            .unwrap();

        // SAFETY: test-local variable name, no other thread reads it.
        unsafe { std::env::set_var("FLOORWATCH_TEST_ROSTER_DIR", &dir) };
        let cfg = load(&config_path).unwrap();
        assert_eq!(cfg.directory.roster_file.as_deref(), Some(dir.join("roster.json").as_path()));

        // The malformed entry is served as-is and skipped later, per record.
        let entries = cfg.directory_source(None).unwrap().fetch_roster().await.unwrap();
        assert_eq!(entries.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn url_override_wins() {
        let cfg: FileConfig = serde_yaml::from_str("directory: {url: 'http://a.local'}").unwrap();
        assert!(cfg.directory_source(Some("http://b.local")).is_ok());
        assert!(cfg.directory_source(None).is_ok());
    }
}
