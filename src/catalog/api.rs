//! Structured JSON release index backend

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::debug;

use crate::catalog::{AssetLocations, CatalogError, ReleaseSource};
use crate::download::{self, DownloadError, join_url};
use crate::platform;
use crate::tool::Tool;

const INDEX_FILE: &str = "index.json";

/// Top-level product index: a map of version string to release stub.
/// Only the keys matter here.
#[derive(Debug, Deserialize)]
struct ProductIndex {
    versions: HashMap<String, IgnoredAny>,
}

/// Per-version release document.
#[derive(Debug, Deserialize)]
struct VersionIndex {
    builds: Vec<Build>,
    shasums: String,
    shasums_signature: String,
}

#[derive(Debug, Deserialize)]
struct Build {
    os: String,
    arch: String,
    filename: String,
    url: String,
}

/// Backend for vendors publishing a machine-readable release index:
/// `<base>/<product>/index.json` listing versions, and
/// `<base>/<product>/<version>/index.json` describing one release's
/// builds and checksum documents.
pub struct ApiBackend {
    client: reqwest::Client,
    tool: Tool,
    remote_url: String,
    list_url: String,
}

impl ApiBackend {
    pub fn new(client: reqwest::Client, tool: Tool, remote_url: &str, list_url: &str) -> Self {
        Self {
            client,
            tool,
            remote_url: remote_url.to_string(),
            list_url: list_url.to_string(),
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let body = download::bytes(&self.client, url).await?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ReleaseSource for ApiBackend {
    async fn list_releases(&self) -> Result<Vec<String>, CatalogError> {
        let url = join_url(&self.list_url, &[self.tool.name(), INDEX_FILE]);
        debug!("Fetching release index {url}");

        let index: ProductIndex = self.fetch_json(&url).await?;
        Ok(index.versions.into_keys().collect())
    }

    async fn locate_assets(&self, version: &str) -> Result<AssetLocations, CatalogError> {
        let version = version.trim_start_matches('v');
        let base = join_url(&self.remote_url, &[self.tool.name(), version]);
        let url = join_url(&base, &[INDEX_FILE]);
        debug!("Fetching release document {url}");

        let index: VersionIndex = match self.fetch_json(&url).await {
            Err(CatalogError::Download(DownloadError::Status { status, .. }))
                if status == reqwest::StatusCode::NOT_FOUND =>
            {
                return Err(CatalogError::ReleaseNotFound {
                    version: version.to_string(),
                });
            }
            other => other?,
        };

        let (os, arch) = (platform::os_token(), platform::arch_token());
        let build = index
            .builds
            .into_iter()
            .find(|b| b.os == os && b.arch == arch)
            .ok_or_else(|| CatalogError::AssetNotFound {
                version: version.to_string(),
                file_name: self.tool.asset_names(version).asset,
            })?;

        Ok(AssetLocations {
            file_name: build.filename,
            asset_url: build.url,
            sums_url: join_url(&base, &[&index.shasums]),
            sig_url: Some(join_url(&base, &[&index.shasums_signature])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn backend(server: &Server) -> ApiBackend {
        ApiBackend::new(
            reqwest::Client::new(),
            Tool::Terraform,
            &server.url(),
            &server.url(),
        )
    }

    #[tokio::test]
    async fn list_releases_returns_index_keys() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/terraform/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name": "terraform", "versions": {"1.5.7": {}, "1.6.0": {}, "1.6.1": {}}}"#,
            )
            .create_async()
            .await;

        let mut releases = backend(&server).list_releases().await.unwrap();
        releases.sort();

        mock.assert_async().await;
        assert_eq!(releases, vec!["1.5.7", "1.6.0", "1.6.1"]);
    }

    #[tokio::test]
    async fn list_releases_rejects_index_without_versions_field() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/terraform/index.json")
            .with_status(200)
            .with_body(r#"{"name": "terraform"}"#)
            .create_async()
            .await;

        let result = backend(&server).list_releases().await;
        assert!(matches!(result, Err(CatalogError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn locate_assets_picks_build_for_current_platform() {
        let mut server = Server::new_async().await;
        let (os, arch) = (platform::os_token(), platform::arch_token());
        server
            .mock("GET", "/terraform/1.6.2/index.json")
            .with_status(200)
            .with_body(format!(
                r#"{{
                    "builds": [
                        {{"os": "solaris", "arch": "sparc", "filename": "other.zip", "url": "https://cdn/other.zip"}},
                        {{"os": "{os}", "arch": "{arch}", "filename": "terraform_1.6.2_{os}_{arch}.zip", "url": "https://cdn/terraform_1.6.2_{os}_{arch}.zip"}}
                    ],
                    "shasums": "terraform_1.6.2_SHA256SUMS",
                    "shasums_signature": "terraform_1.6.2_SHA256SUMS.sig"
                }}"#
            ))
            .create_async()
            .await;

        let locations = backend(&server).locate_assets("1.6.2").await.unwrap();

        assert_eq!(locations.file_name, format!("terraform_1.6.2_{os}_{arch}.zip"));
        assert_eq!(
            locations.asset_url,
            format!("https://cdn/terraform_1.6.2_{os}_{arch}.zip")
        );
        assert_eq!(
            locations.sums_url,
            format!("{}/terraform/1.6.2/terraform_1.6.2_SHA256SUMS", server.url())
        );
        assert_eq!(
            locations.sig_url.as_deref(),
            Some(format!("{}/terraform/1.6.2/terraform_1.6.2_SHA256SUMS.sig", server.url()).as_str())
        );
    }

    #[tokio::test]
    async fn locate_assets_maps_missing_version_to_release_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/terraform/9.9.9/index.json")
            .with_status(404)
            .create_async()
            .await;

        let result = backend(&server).locate_assets("9.9.9").await;
        assert!(matches!(
            result,
            Err(CatalogError::ReleaseNotFound { version }) if version == "9.9.9"
        ));
    }

    #[tokio::test]
    async fn locate_assets_fails_when_platform_has_no_build() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/terraform/1.6.2/index.json")
            .with_status(200)
            .with_body(
                r#"{
                    "builds": [{"os": "solaris", "arch": "sparc", "filename": "o.zip", "url": "https://cdn/o.zip"}],
                    "shasums": "terraform_1.6.2_SHA256SUMS",
                    "shasums_signature": "terraform_1.6.2_SHA256SUMS.sig"
                }"#,
            )
            .create_async()
            .await;

        let result = backend(&server).locate_assets("1.6.2").await;
        assert!(matches!(result, Err(CatalogError::AssetNotFound { .. })));
    }

    #[tokio::test]
    async fn locate_assets_rejects_document_missing_shasums() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/terraform/1.6.2/index.json")
            .with_status(200)
            .with_body(r#"{"builds": []}"#)
            .create_async()
            .await;

        let result = backend(&server).locate_assets("1.6.2").await;
        assert!(matches!(result, Err(CatalogError::InvalidResponse { .. })));
    }
}
