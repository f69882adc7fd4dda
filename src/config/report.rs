// src/config/report.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_REPORT_CONFIG_PATH: &str = "config/report.toml";
pub const ENV_REPORT_CONFIG_PATH: &str = "REPORT_CONFIG_PATH";
/// Ceiling for `narrative.max_retries`.
pub const MAX_NARRATIVE_RETRIES: u8 = 5;

fn default_request_timeout_secs() -> u64 {
    60
}
fn default_source_timeout_ms() -> u64 {
    8_000
}
fn default_quote_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_sibling_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_fred_base_url() -> String {
    "https://api.stlouisfed.org".to_string()
}
fn default_benchmark_symbol() -> String {
    "^GSPC".to_string()
}
fn default_history_range() -> String {
    "6mo".to_string()
}
fn default_news_feeds() -> Vec<String> {
    vec!["https://feeds.finance.yahoo.com/rss/2.0/headline?s=%5EGSPC&region=US&lang=en-US".to_string()]
}
fn default_news_limit() -> usize {
    15
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_narrative_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2_000
}
fn default_narrative_timeout_secs() -> u64 {
    45
}
fn default_env_marker() -> Option<String> {
    Some("ENV".to_string())
}

/// Top-level configuration, passed explicitly into the orchestrator and narrative client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Outer deadline for one report request (enforced by the HTTP handler).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    #[serde(default = "default_quote_base_url")]
    pub quote_base_url: String,
    /// Base URL of the sibling market-data endpoints (movers, crypto, breadth).
    #[serde(default = "default_sibling_base_url")]
    pub sibling_base_url: String,
    #[serde(default = "default_fred_base_url")]
    pub fred_base_url: String,
    /// "ENV" means: read from FRED_API_KEY. Absent key degrades the economic slot only.
    #[serde(default = "default_env_marker")]
    pub fred_api_key: Option<String>,
    #[serde(default = "default_benchmark_symbol")]
    pub benchmark_symbol: String,
    #[serde(default = "default_history_range")]
    pub history_range: String,
    #[serde(default = "default_news_feeds")]
    pub news_feeds: Vec<String>,
    #[serde(default = "default_news_limit")]
    pub news_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_narrative_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_narrative_timeout_secs")]
    pub timeout_secs: u64,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_env_marker")]
    pub api_key: Option<String>,
    /// Extra attempts after the first one. 0 keeps the single-attempt behavior.
    #[serde(default)]
    pub max_retries: u8,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout_ms(),
            quote_base_url: default_quote_base_url(),
            sibling_base_url: default_sibling_base_url(),
            fred_base_url: default_fred_base_url(),
            fred_api_key: default_env_marker(),
            benchmark_symbol: default_benchmark_symbol(),
            history_range: default_history_range(),
            news_feeds: default_news_feeds(),
            news_limit: default_news_limit(),
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_narrative_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_narrative_timeout_secs(),
            api_key: default_env_marker(),
            max_retries: 0,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            metrics_enabled: false,
            sources: SourcesConfig::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl SourcesConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms.max(1))
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl ReportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ReportConfig = toml::from_str(s).context("parsing report config")?;
        cfg.normalize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading report config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallbacks:
    /// 1) $REPORT_CONFIG_PATH (must exist)
    /// 2) config/report.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_REPORT_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_REPORT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        let mut cfg = Self::default();
        cfg.normalize();
        Ok(cfg)
    }

    /// Resolve "ENV" secrets, lowercase the provider and clamp numeric knobs.
    fn normalize(&mut self) {
        self.narrative.provider = self.narrative.provider.trim().to_lowercase();
        self.narrative.api_key = resolve_secret(self.narrative.api_key.take(), "OPENAI_API_KEY");
        self.sources.fred_api_key = resolve_secret(self.sources.fred_api_key.take(), "FRED_API_KEY");

        if !self.narrative.temperature.is_finite() || !(0.0..=2.0).contains(&self.narrative.temperature) {
            self.narrative.temperature = default_temperature();
        }
        if self.narrative.max_tokens == 0 {
            self.narrative.max_tokens = default_max_tokens();
        }
        self.narrative.max_retries = self.narrative.max_retries.min(MAX_NARRATIVE_RETRIES);
        self.narrative.base_url = self.narrative.base_url.trim_end_matches('/').to_string();
        self.sources.quote_base_url = self.sources.quote_base_url.trim_end_matches('/').to_string();
        self.sources.sibling_base_url = self.sources.sibling_base_url.trim_end_matches('/').to_string();
        self.sources.fred_base_url = self.sources.fred_base_url.trim_end_matches('/').to_string();
    }
}

/// `Some("ENV")` reads the named variable; blank values become `None`.
fn resolve_secret(raw: Option<String>, env_name: &str) -> Option<String> {
    let raw = raw?;
    let v = if raw.trim().eq_ignore_ascii_case("env") {
        env::var(env_name).ok()?
    } else {
        raw
    };
    let v = v.trim().to_string();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = ReportConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.request_timeout_secs, 60);
        assert_eq!(cfg.sources.source_timeout_ms, 8_000);
        assert_eq!(cfg.narrative.model, "gpt-4o-mini");
        assert_eq!(cfg.narrative.max_retries, 0);
    }

    #[test]
    fn explicit_values_are_normalized() {
        let cfg = ReportConfig::from_toml_str(
            r#"
            [narrative]
            provider = " Mock "
            base_url = "http://llm.local/v1/"
            api_key = "sk-test"
            temperature = 9.0
            max_tokens = 0
            max_retries = 255

            [sources]
            fred_api_key = "   "
            "#,
        )
        .unwrap();
        assert_eq!(cfg.narrative.provider, "mock");
        assert_eq!(cfg.narrative.base_url, "http://llm.local/v1");
        assert_eq!(cfg.narrative.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.narrative.temperature, 0.7);
        assert_eq!(cfg.narrative.max_tokens, 2_000);
        assert_eq!(cfg.narrative.max_retries, MAX_NARRATIVE_RETRIES);
        assert!(cfg.sources.fred_api_key.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn env_marker_resolves_from_environment() {
        env::set_var("FRED_API_KEY", "fred-123");
        let cfg = ReportConfig::from_toml_str("[sources]\nfred_api_key = \"ENV\"").unwrap();
        assert_eq!(cfg.sources.fred_api_key.as_deref(), Some("fred-123"));

        env::remove_var("FRED_API_KEY");
        let cfg = ReportConfig::from_toml_str("[sources]\nfred_api_key = \"ENV\"").unwrap();
        assert!(cfg.sources.fred_api_key.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn load_default_honors_env_path() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("report.toml");
        fs::write(&p, "request_timeout_secs = 5\nmetrics_enabled = true\n").unwrap();

        env::set_var(ENV_REPORT_CONFIG_PATH, p.display().to_string());
        let cfg = ReportConfig::load_default().unwrap();
        env::remove_var(ENV_REPORT_CONFIG_PATH);

        assert_eq!(cfg.request_timeout_secs, 5);
        assert!(cfg.metrics_enabled);
    }
}
