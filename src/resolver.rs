//! Version resolution against local installs and the release catalog

use semver::{Version, VersionReq};
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogError};
use crate::constraint::{Policy, ResolutionRequest};
use crate::store::VersionStore;

/// Error type for resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("No version matching the constraint set {constraints}")]
    NoMatchingVersion { constraints: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Filesystem error: {0}")]
    Store(#[from] std::io::Error),
}

/// Resolve a request to one concrete version.
///
/// An exact pin is returned verbatim without consulting the catalog;
/// whether it really exists only surfaces at install time. Otherwise
/// candidates are filtered through the intersection of every range
/// constraint and the policy picks the maximum (or minimum, for
/// `min-required`). Locally installed versions are tried first so a
/// constrained request that is already satisfied issues no network
/// call.
pub async fn resolve(
    request: &ResolutionRequest,
    store: &VersionStore,
    catalog: &Catalog,
) -> Result<String, ResolveError> {
    if let Some(version) = request.exact() {
        debug!("Using pinned {} {version}", request.tool);
        return Ok(version.trim_start_matches('v').to_string());
    }

    let policy = request.policy();
    let requirements = request.requirements();

    if !requirements.is_empty() {
        let installed = store.installed_versions()?;
        if let Some(version) = select(&installed, policy, &requirements) {
            info!(
                "Installed {} {version} already satisfies {}",
                request.tool,
                request.describe()
            );
            return Ok(version);
        }
    }

    let releases = catalog.list_releases().await?;
    select(&releases, policy, &requirements).ok_or_else(|| ResolveError::NoMatchingVersion {
        constraints: request.describe(),
    })
}

/// Pick the policy's extremum among candidates admitted by every
/// requirement. Unparseable identifiers are skipped; the intersection
/// makes the outcome deterministic or empty, never ambiguous.
fn select(candidates: &[String], policy: Policy, requirements: &[VersionReq]) -> Option<String> {
    let admitted = candidates
        .iter()
        .filter_map(|raw| Version::parse(raw.trim_start_matches('v')).ok())
        .filter(|version| admits(version, policy, requirements));

    let chosen = match policy {
        Policy::MinRequired => admitted.min(),
        Policy::Latest | Policy::LatestStable | Policy::LatestAllowed => admitted.max(),
    };

    chosen.map(|version| version.to_string())
}

fn admits(version: &Version, policy: Policy, requirements: &[VersionReq]) -> bool {
    // Pre-releases stay out unless a range explicitly asks for one;
    // `latest-stable` keeps them out unconditionally.
    if requirements.is_empty() || policy == Policy::LatestStable {
        if !version.pre.is_empty() {
            return false;
        }
    }

    requirements.iter().all(|req| req.matches(version))
}
