//! Blocking-style byte retrieval and mirror URL rewriting

use tracing::debug;

/// Error type for raw byte downloads.
///
/// Transport failures and non-success statuses surface immediately;
/// there is no retry layer.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status} fetching {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// A configured `prefix -> replacement` rewrite applied to every
/// outbound URL, so self-hosted mirrors need no code change.
///
/// The same rewriter instance is applied to asset, checksum and
/// signature URLs alike.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRewriter {
    rule: Option<(String, String)>,
}

impl UrlRewriter {
    pub fn new(rule: Option<(String, String)>) -> Self {
        Self { rule }
    }

    /// Parse a rule of the form `<prefix>,<replacement>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, replacement) = raw.split_once(',')?;
        let prefix = prefix.trim();
        let replacement = replacement.trim();
        if prefix.is_empty() || replacement.is_empty() {
            return None;
        }
        Some(Self {
            rule: Some((prefix.to_string(), replacement.to_string())),
        })
    }

    /// Rewrite one URL. URLs not matching the configured prefix pass
    /// through unchanged.
    pub fn apply(&self, url: &str) -> String {
        match &self.rule {
            Some((prefix, replacement)) => match url.strip_prefix(prefix.as_str()) {
                Some(rest) => format!("{replacement}{rest}"),
                None => url.to_string(),
            },
            None => url.to_string(),
        }
    }
}

/// Join URL segments with single `/` separators.
pub fn join_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim_matches('/'));
    }
    url
}

/// Download a URL to memory, failing on any non-success status.
pub async fn bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, DownloadError> {
    debug!("Downloading {url}");

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status,
            url: url.to_string(),
        });
    }

    Ok(response.bytes().await?.to_vec())
}
