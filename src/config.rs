use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_SESSION_FILE: &str = ".uxscope/session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including the `/api` prefix. Always ends with `/`.
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Page discovery crawls the whole site and gets a much longer budget.
    pub discovery_timeout: Duration,
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: parse_base_url(DEFAULT_API_URL).expect("default api url is valid"),
            request_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(60),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(raw) = get("UXSCOPE_API_URL") {
            config.base_url =
                parse_base_url(&raw).with_context(|| format!("invalid UXSCOPE_API_URL={raw:?}"))?;
        }
        if let Some(raw) = get("UXSCOPE_TIMEOUT_SECS") {
            config.request_timeout = parse_secs(&raw)
                .with_context(|| format!("invalid UXSCOPE_TIMEOUT_SECS={raw:?}"))?;
        }
        if let Some(raw) = get("UXSCOPE_DISCOVERY_TIMEOUT_SECS") {
            config.discovery_timeout = parse_secs(&raw)
                .with_context(|| format!("invalid UXSCOPE_DISCOVERY_TIMEOUT_SECS={raw:?}"))?;
        }
        if let Some(raw) = get("UXSCOPE_SESSION_FILE") {
            config.session_file = PathBuf::from(raw);
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, raw: &str) -> anyhow::Result<Self> {
        self.base_url = parse_base_url(raw).with_context(|| format!("invalid api url: {raw}"))?;
        Ok(self)
    }

    pub fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("join endpoint: {path}"))
    }
}

pub fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).context("parse url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("api url must be http/https: {raw}");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_secs(raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw.parse().context("parse seconds")?;
    if secs == 0 {
        anyhow::bail!("timeout must be > 0");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(config.discovery_timeout, Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_and_trims() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("UXSCOPE_API_URL", " https://ux.example.com/api "),
            ("UXSCOPE_TIMEOUT_SECS", "5"),
            ("UXSCOPE_SESSION_FILE", "/tmp/s.json"),
            ("UXSCOPE_DISCOVERY_TIMEOUT_SECS", ""),
        ]))
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://ux.example.com/api/");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.discovery_timeout, Duration::from_secs(60));
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = ClientConfig::from_lookup(lookup(&[("UXSCOPE_TIMEOUT_SECS", "0")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("UXSCOPE_TIMEOUT_SECS"));
        assert!(ClientConfig::from_lookup(lookup(&[("UXSCOPE_API_URL", "ftp://x")])).is_err());
    }

    #[test]
    fn endpoint_keeps_api_prefix() {
        let config = ClientConfig::default();
        let url = config.endpoint("/projects/4/find-url/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/projects/4/find-url/");
    }
}
