//! Release catalog layer
//! - mod.rs: `ReleaseSource` trait, `Catalog` facade, backend selection
//! - api.rs: structured JSON release index backend
//! - html.rs: directory-listing page backend
//! - github.rs: GitHub Releases API backend

pub mod api;
pub mod github;
pub mod html;

use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::config::RetrieverConfig;
use crate::download::{self, DownloadError, UrlRewriter};
use crate::install::{self, InstallError};
use crate::tool::Tool;
use crate::verify::{self, IntegrityError};

pub use api::ApiBackend;
pub use github::GithubBackend;
pub use html::HtmlBackend;

/// Error type for catalog queries.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Rate limited by the releases API; set {} to raise the limit", crate::config::TOKEN_ENV)]
    RateLimited,

    #[error("Release {version} not found")]
    ReleaseNotFound { version: String },

    #[error("No asset {file_name} in release {version}")]
    AssetNotFound { version: String, file_name: String },
}

/// Where one release's blobs live. Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocations {
    /// Exact asset file name, as it appears in the checksum manifest.
    pub file_name: String,
    pub asset_url: String,
    pub sums_url: String,
    /// Detached signature over the checksum manifest; `None` for tools
    /// that publish none.
    pub sig_url: Option<String>,
}

/// A discovery backend: lists release identifiers and locates the blobs
/// of one release. Selected per tool by configuration.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// All discoverable version identifiers, unvalidated, in no
    /// guaranteed order.
    async fn list_releases(&self) -> Result<Vec<String>, CatalogError>;

    /// Resolve the asset, checksum and signature locations for one
    /// concrete version.
    async fn locate_assets(&self, version: &str) -> Result<AssetLocations, CatalogError>;
}

/// Shared HTTP client with the crate's user agent.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("iacenv/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
}

/// The per-tool release catalog: one backend behind the two public
/// operations, plus the verified install pipeline.
pub struct Catalog {
    tool: Tool,
    source: Box<dyn ReleaseSource>,
    client: reqwest::Client,
    rewriter: UrlRewriter,
    key_path: Option<PathBuf>,
    key_url: Option<String>,
}

impl Catalog {
    /// Build the catalog for a tool from its retrieval settings,
    /// selecting the configured backend.
    pub fn new(config: &RetrieverConfig, github_token: Option<&str>) -> Self {
        let tool = config.tool();
        let client = http_client();

        let source: Box<dyn ReleaseSource> = match config.discovery() {
            crate::tool::DiscoveryMode::Api => Box::new(ApiBackend::new(
                client.clone(),
                tool,
                config.remote_url(),
                config.list_url(),
            )),
            crate::tool::DiscoveryMode::Html => Box::new(HtmlBackend::new(
                client.clone(),
                tool,
                config.remote_url(),
                config.list_url(),
            )),
            crate::tool::DiscoveryMode::Github => Box::new(GithubBackend::new(
                client.clone(),
                tool,
                config.remote_url(),
                config.list_url(),
                github_token.map(str::to_string),
            )),
        };

        Self {
            tool,
            source,
            client,
            rewriter: config.rewriter().clone(),
            key_path: config.key_path().cloned(),
            key_url: tool.default_public_key_url().map(str::to_string),
        }
    }

    /// Replace the backend, keeping the rest of the pipeline. Used to
    /// drive the install pipeline against a test double.
    pub fn with_source(mut self, source: Box<dyn ReleaseSource>) -> Self {
        self.source = source;
        self
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// All discoverable version identifiers for the tool.
    pub async fn list_releases(&self) -> Result<Vec<String>, CatalogError> {
        self.source.list_releases().await
    }

    /// Fetch, verify and unpack one concrete version into
    /// `target_dir`.
    ///
    /// Already-installed versions are a no-op success with zero network
    /// activity. Otherwise the pipeline is strictly sequential: locate,
    /// download, checksum gate, signature gate, staged unpack, atomic
    /// commit. Every gate failure aborts before the final path is
    /// touched.
    pub async fn install_release(
        &self,
        version: &str,
        target_dir: &Path,
    ) -> Result<(), InstallError> {
        if target_dir.is_dir() {
            info!("{} {} already installed", self.tool, version);
            return Ok(());
        }

        info!("Installing {} {}", self.tool, version);
        let locations = self.source.locate_assets(version).await?;

        // The mirror rewrite covers every blob of the artifact alike.
        let asset_url = self.rewriter.apply(&locations.asset_url);
        let sums_url = self.rewriter.apply(&locations.sums_url);
        let sig_url = locations.sig_url.as_deref().map(|u| self.rewriter.apply(u));

        let data = download::bytes(&self.client, &asset_url).await?;
        let sums = download::bytes(&self.client, &sums_url).await?;
        verify::sha256::check(&data, &sums, &locations.file_name)?;

        if let Some(sig_url) = sig_url {
            let signature = download::bytes(&self.client, &sig_url).await?;
            let key = self.public_key().await?;
            verify::pgp::check(&sums, &signature, &key)?;
        }

        install::commit(self.tool, &data, target_dir)
    }

    /// The key the signature gate verifies against: a user-pinned local
    /// file when configured, the vendor-published key otherwise.
    async fn public_key(&self) -> Result<Vec<u8>, InstallError> {
        if let Some(path) = &self.key_path {
            return Ok(std::fs::read(path)?);
        }

        let Some(url) = &self.key_url else {
            return Err(IntegrityError::Key(format!(
                "no public key source configured for {}",
                self.tool
            ))
            .into());
        };

        Ok(download::bytes(&self.client, url).await?)
    }
}
