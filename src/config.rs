use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::catalog::{default_catalogue, default_variables};
use crate::core::PacingConfig;
use crate::types::{SourceUrl, TractorRef, VariableName};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorJsonConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub pacing: Option<PacingConfig>,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default)]
    pub tractors: Option<Vec<TractorEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TractorEntry {
    pub company: String,
    pub model: String,
    /// Empty or missing means "look it up at run time".
    #[serde(default)]
    pub url: Option<String>,
}

/// Validated configuration handed to the orchestrator and the API client.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub pacing: PacingConfig,
    pub variables: Vec<VariableName>,
    pub tractors: Vec<TractorRef>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            pacing: PacingConfig::default(),
            variables: default_variables(),
            tractors: default_catalogue(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json(cfg: OrchestratorJsonConfig) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let api_base_url = match cfg.api_base_url {
            Some(raw) => checked_base_url(&raw).context("invalid `apiBaseUrl`")?,
            None => defaults.api_base_url,
        };

        let variables = match cfg.variables {
            Some(names) => names
                .into_iter()
                .map(|name| {
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        Err(anyhow!("variable names must not be empty"))
                    } else {
                        Ok(VariableName::from(name))
                    }
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => defaults.variables,
        };

        let tractors = match cfg.tractors {
            Some(entries) => entries
                .into_iter()
                .enumerate()
                .map(|(idx, entry)| {
                    entry
                        .into_tractor()
                        .with_context(|| format!("invalid tractor entry #{}", idx))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => defaults.tractors,
        };

        Ok(Self {
            api_base_url,
            request_timeout: cfg
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            pacing: cfg.pacing.unwrap_or(defaults.pacing),
            variables,
            tractors,
        })
    }

    /// Point the config at another backend, with the same checks as `apiBaseUrl`.
    pub fn with_api_base_url(mut self, raw: &str) -> anyhow::Result<Self> {
        self.api_base_url = checked_base_url(raw)?;
        Ok(self)
    }
}

fn checked_base_url(raw: &str) -> anyhow::Result<String> {
    let expanded = expand_env_vars(raw.trim());
    validate_http_url(&expanded)?;
    Ok(expanded)
}

impl TractorEntry {
    fn into_tractor(self) -> anyhow::Result<TractorRef> {
        let tractor = TractorRef::new(self.company, self.model)?;

        match self.url.map(|u| expand_env_vars(u.trim())) {
            Some(url) if !url.is_empty() => {
                validate_http_url(&url)?;
                Ok(tractor.with_source(SourceUrl::from(url)))
            }
            _ => Ok(tractor),
        }
    }
}

fn validate_http_url(raw: &str) -> anyhow::Result<()> {
    let parsed = ::url::Url::parse(raw).with_context(|| format!("`{}` is not a valid URL", raw))?;
    if !["http", "https"].contains(&parsed.scheme()) {
        return Err(anyhow!("`{}` must use http or https", raw));
    }
    Ok(())
}

/// Locate the config file, if any.
///
/// Order: `$TRACTOR_ORCHESTRATOR_CONFIG`, then
/// `$XDG_CONFIG_HOME/tractor-orchestrator/config.json`, then
/// `./tractor-orchestrator.json`.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("TRACTOR_ORCHESTRATOR_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg)
            .join("tractor-orchestrator")
            .join("config.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("tractor-orchestrator.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

pub fn load_config_from(path: &Path) -> anyhow::Result<OrchestratorConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: OrchestratorJsonConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    OrchestratorConfig::from_json(cfg)
}

/// Load the config from the resolved path, falling back to built-in defaults.
pub fn load_config() -> anyhow::Result<OrchestratorConfig> {
    match resolve_config_path() {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            load_config_from(&path)
        }
        None => {
            tracing::info!("No config file found; using built-in worklists");
            Ok(OrchestratorConfig::default())
        }
    }
}

/// Replace `${NAME}` with the value of the environment variable, leaving
/// unknown names untouched.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}
