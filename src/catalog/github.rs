//! GitHub Releases API backend

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::{AssetLocations, CatalogError, ReleaseSource};
use crate::download::{DownloadError, join_url};
use crate::tool::Tool;

const PER_PAGE: usize = 100;

/// Entry of the paginated release listing.
#[derive(Debug, Deserialize)]
struct ReleaseSummary {
    tag_name: String,
}

/// One release fetched by tag, with its attached files.
#[derive(Debug, Deserialize)]
struct Release {
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// Backend for tools released through the GitHub Releases API. A bearer
/// token is optional and only raises rate limits.
pub struct GithubBackend {
    client: reqwest::Client,
    tool: Tool,
    remote_url: String,
    list_url: String,
    token: Option<String>,
}

impl GithubBackend {
    pub fn new(
        client: reqwest::Client,
        tool: Tool,
        remote_url: &str,
        list_url: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            tool,
            remote_url: remote_url.to_string(),
            list_url: list_url.to_string(),
            token,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        debug!("Fetching {url}");

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(DownloadError::from)?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }
        if status == reqwest::StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v == "0")
        {
            return Err(CatalogError::RateLimited);
        }
        if !status.is_success() {
            return Err(DownloadError::Status {
                status,
                url: url.to_string(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(DownloadError::from)?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse releases response from {url}: {e}");
            CatalogError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GithubBackend {
    async fn list_releases(&self) -> Result<Vec<String>, CatalogError> {
        let mut versions = Vec::new();

        for page in 1.. {
            let url = format!("{}?per_page={PER_PAGE}&page={page}", self.list_url);
            let releases: Vec<ReleaseSummary> = self.fetch_json(&url).await?;
            let full_page = releases.len() == PER_PAGE;

            versions.extend(
                releases
                    .into_iter()
                    .map(|r| r.tag_name.trim_start_matches('v').to_string()),
            );

            if !full_page {
                break;
            }
        }

        Ok(versions)
    }

    async fn locate_assets(&self, version: &str) -> Result<AssetLocations, CatalogError> {
        let tag = self.tool.release_tag(version);
        let url = join_url(&self.remote_url, &["tags", &tag]);

        let release: Release = match self.fetch_json(&url).await {
            Err(CatalogError::Download(DownloadError::Status { status, .. }))
                if status == reqwest::StatusCode::NOT_FOUND =>
            {
                return Err(CatalogError::ReleaseNotFound {
                    version: version.to_string(),
                });
            }
            other => other?,
        };

        let names = self.tool.asset_names(version);
        let find = |file_name: &str| -> Result<String, CatalogError> {
            release
                .assets
                .iter()
                .find(|a| a.name == file_name)
                .map(|a| a.browser_download_url.clone())
                .ok_or_else(|| CatalogError::AssetNotFound {
                    version: version.to_string(),
                    file_name: file_name.to_string(),
                })
        };

        let asset_url = find(&names.asset)?;
        let sums_url = find(&names.sums)?;
        let sig_url = match &names.signature {
            Some(sig_name) => Some(find(sig_name)?),
            None => None,
        };

        Ok(AssetLocations {
            file_name: names.asset,
            asset_url,
            sums_url,
            sig_url,
        })
    }
}
