//! Directory-listing page backend

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::catalog::{AssetLocations, CatalogError, ReleaseSource};
use crate::download::{self, join_url};
use crate::tool::Tool;

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("valid href pattern"));

/// Fallback backend for mirrors that expose only a directory-listing
/// page: release identifiers come from listing links, asset URLs from
/// the tool's deterministic naming convention.
pub struct HtmlBackend {
    client: reqwest::Client,
    tool: Tool,
    remote_url: String,
    list_url: String,
}

impl HtmlBackend {
    pub fn new(client: reqwest::Client, tool: Tool, remote_url: &str, list_url: &str) -> Self {
        Self {
            client,
            tool,
            remote_url: remote_url.to_string(),
            list_url: list_url.to_string(),
        }
    }

    fn listing_url(&self) -> String {
        match self.tool {
            // The vendor's listing nests releases under the product
            // name; release mirrors list tags at the root.
            Tool::Terraform => join_url(&self.list_url, &[self.tool.name()]),
            Tool::Tofu | Tool::Terragrunt => self.list_url.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ReleaseSource for HtmlBackend {
    async fn list_releases(&self) -> Result<Vec<String>, CatalogError> {
        let url = self.listing_url();
        debug!("Fetching release listing {url}");

        let page = download::bytes(&self.client, &url).await?;
        let page = String::from_utf8_lossy(&page);

        Ok(extract_versions(&page))
    }

    async fn locate_assets(&self, version: &str) -> Result<AssetLocations, CatalogError> {
        let names = self.tool.asset_names(version);
        let base = join_url(&self.remote_url, &[&self.tool.release_dir(version)]);

        Ok(AssetLocations {
            asset_url: join_url(&base, &[&names.asset]),
            sums_url: join_url(&base, &[&names.sums]),
            sig_url: names.signature.as_deref().map(|sig| join_url(&base, &[sig])),
            file_name: names.asset,
        })
    }
}

/// Pull version-looking link targets out of a listing page.
///
/// Links are normalized to their last path segment with any trailing
/// slash and `v` prefix removed; anything not starting with a digit is
/// discarded (parent links, stylesheets, signature files).
fn extract_versions(page: &str) -> Vec<String> {
    let mut versions = Vec::new();
    for capture in HREF_RE.captures_iter(page) {
        let target = capture[1].trim_end_matches('/');
        let segment = target.rsplit('/').next().unwrap_or(target);
        let version = segment.trim_start_matches('v');
        if version.starts_with(|c: char| c.is_ascii_digit()) && !versions.iter().any(|v| v == version)
        {
            versions.push(version.to_string());
        }
    }

    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn extract_versions_handles_vendor_listing_shape() {
        let page = r#"
            <html><body>
            <a href="../">..</a>
            <a href="/terraform/1.6.0/">terraform_1.6.0</a>
            <a href="/terraform/1.6.1/">terraform_1.6.1</a>
            <a href="/terraform/style.css">style</a>
            </body></html>
        "#;
        assert_eq!(extract_versions(page), vec!["1.6.0", "1.6.1"]);
    }

    #[test]
    fn extract_versions_strips_tag_prefix_and_dedups() {
        let page = r#"<a href="v1.6.0/">v1.6.0</a><a href="v1.6.0/">again</a><a href="v1.7.0-rc1/">rc</a>"#;
        assert_eq!(extract_versions(page), vec!["1.6.0", "1.7.0-rc1"]);
    }

    #[tokio::test]
    async fn list_releases_parses_listing_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/terraform")
            .with_status(200)
            .with_body(r#"<a href="/terraform/1.5.7/">x</a><a href="/terraform/1.6.2/">y</a>"#)
            .create_async()
            .await;

        let backend = HtmlBackend::new(
            reqwest::Client::new(),
            Tool::Terraform,
            &server.url(),
            &server.url(),
        );
        let releases = backend.list_releases().await.unwrap();

        mock.assert_async().await;
        assert_eq!(releases, vec!["1.5.7", "1.6.2"]);
    }

    #[tokio::test]
    async fn locate_assets_derives_urls_from_naming_convention() {
        let backend = HtmlBackend::new(
            reqwest::Client::new(),
            Tool::Terraform,
            "https://mirror.local",
            "https://mirror.local",
        );

        let locations = backend.locate_assets("1.6.2").await.unwrap();
        let names = Tool::Terraform.asset_names("1.6.2");

        assert_eq!(locations.file_name, names.asset);
        assert_eq!(
            locations.asset_url,
            format!("https://mirror.local/terraform/1.6.2/{}", names.asset)
        );
        assert_eq!(
            locations.sums_url,
            format!("https://mirror.local/terraform/1.6.2/{}", names.sums)
        );
        assert!(locations.sig_url.is_some());
    }

    #[tokio::test]
    async fn locate_assets_omits_signature_for_unsigned_tool() {
        let backend = HtmlBackend::new(
            reqwest::Client::new(),
            Tool::Terragrunt,
            "https://mirror.local",
            "https://mirror.local",
        );

        let locations = backend.locate_assets("0.55.1").await.unwrap();

        assert!(locations.sig_url.is_none());
        assert_eq!(
            locations.sums_url,
            "https://mirror.local/v0.55.1/SHA256SUMS"
        );
    }
}
