//! Environment-driven configuration for the store and per-tool retrieval

use std::path::PathBuf;

use crate::download::UrlRewriter;
use crate::tool::{DiscoveryMode, Tool};

/// Store root override.
pub const ROOT_ENV: &str = "IACENV_ROOT";

/// Token used against the source-hosting platform's API to raise rate
/// limits. The platform's conventional variable is honored as a
/// fallback.
pub const TOKEN_ENV: &str = "IACENV_GITHUB_TOKEN";
pub const TOKEN_FALLBACK_ENV: &str = "GITHUB_TOKEN";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

/// Per-tool retrieval settings. Read-only to the core; accessors fall
/// back to the tool's built-in defaults.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    tool: Tool,
    remote_url: Option<String>,
    list_url: Option<String>,
    discovery: Option<DiscoveryMode>,
    rewriter: UrlRewriter,
    key_path: Option<PathBuf>,
}

impl RetrieverConfig {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            remote_url: None,
            list_url: None,
            discovery: None,
            rewriter: UrlRewriter::default(),
            key_path: None,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Base URL assets are fetched from.
    pub fn remote_url(&self) -> &str {
        self.remote_url
            .as_deref()
            .unwrap_or_else(|| self.tool.default_remote_url())
    }

    /// Base URL releases are listed from.
    pub fn list_url(&self) -> &str {
        self.list_url
            .as_deref()
            .or(self.remote_url.as_deref())
            .unwrap_or_else(|| self.tool.default_list_url())
    }

    pub fn discovery(&self) -> DiscoveryMode {
        self.discovery.unwrap_or_else(|| self.tool.default_discovery())
    }

    /// Mirror rewrite applied to every outbound URL.
    pub fn rewriter(&self) -> &UrlRewriter {
        &self.rewriter
    }

    /// User-pinned public key file, overriding the vendor key URL.
    pub fn key_path(&self) -> Option<&PathBuf> {
        self.key_path.as_ref()
    }

    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.remote_url = url;
        }
        self
    }

    pub fn with_list_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.list_url = url;
        }
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryMode) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_rewriter(mut self, rewriter: UrlRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_key_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.key_path = path;
        }
        self
    }

    fn from_lookup(
        tool: Tool,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |suffix: &str| format!("IACENV_{}_{}", tool.env_component(), suffix);

        let discovery = match lookup(&var("DISCOVERY_MODE")) {
            Some(value) => Some(value.parse::<DiscoveryMode>().map_err(|reason| {
                ConfigError::Invalid {
                    var: var("DISCOVERY_MODE"),
                    value,
                    reason,
                }
            })?),
            None => None,
        };

        let rewriter = match lookup(&var("MIRROR")) {
            Some(value) => UrlRewriter::parse(&value).ok_or_else(|| ConfigError::Invalid {
                var: var("MIRROR"),
                value,
                reason: "expected '<prefix>,<replacement>'".to_string(),
            })?,
            None => UrlRewriter::default(),
        };

        Ok(Self {
            tool,
            remote_url: lookup(&var("REMOTE_URL")),
            list_url: lookup(&var("LIST_URL")),
            discovery,
            rewriter,
            key_path: lookup(&var("PUBLIC_KEY_PATH")).map(PathBuf::from),
        })
    }
}

/// Full invocation configuration, assembled from the environment with
/// CLI flags applied on top by the binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub root_path: PathBuf,
    pub verbose: bool,
    pub github_token: Option<String>,
    terraform: RetrieverConfig,
    tofu: RetrieverConfig,
    terragrunt: RetrieverConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |var: &str| std::env::var(var).ok().filter(|v| !v.trim().is_empty());
        Self::from_lookup(&lookup)
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            root_path: root_path_with(lookup(ROOT_ENV), dirs::home_dir()),
            verbose: false,
            github_token: lookup(TOKEN_ENV).or_else(|| lookup(TOKEN_FALLBACK_ENV)),
            terraform: RetrieverConfig::from_lookup(Tool::Terraform, lookup)?,
            tofu: RetrieverConfig::from_lookup(Tool::Tofu, lookup)?,
            terragrunt: RetrieverConfig::from_lookup(Tool::Terragrunt, lookup)?,
        })
    }

    pub fn retriever(&self, tool: Tool) -> &RetrieverConfig {
        match tool {
            Tool::Terraform => &self.terraform,
            Tool::Tofu => &self.tofu,
            Tool::Terragrunt => &self.terragrunt,
        }
    }
}

fn root_path_with(root_env: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    root_env
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".iacenv")))
        .unwrap_or_else(|| PathBuf::from(".iacenv"))
}
