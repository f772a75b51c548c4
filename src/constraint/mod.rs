//! Constraint layer
//! - mod.rs: constraint types, token classification, range normalization
//! - scanner.rs: project declaration file scanner
//! - aggregate.rs: precedence merge into a resolution request

pub mod aggregate;
pub mod scanner;

pub use aggregate::{ResolutionRequest, aggregate};
pub use scanner::gather_required_version;

use std::path::PathBuf;

use semver::{Version, VersionReq};

/// Error type for constraint token handling.
#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("Invalid version constraint '{raw}' from {origin}: {reason}")]
    Invalid {
        raw: String,
        origin: ConstraintSource,
        reason: String,
    },

    #[error("Unsupported operator '{operator}' in constraint '{raw}'")]
    UnsupportedOperator { raw: String, operator: String },
}

/// Where a constraint token came from. Precedence follows declaration
/// order, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintSource {
    Cli,
    Environment,
    PinFile(PathBuf),
    Project,
    Default,
}

impl std::fmt::Display for ConstraintSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintSource::Cli => f.write_str("command line"),
            ConstraintSource::Environment => f.write_str("environment"),
            ConstraintSource::PinFile(path) => write!(f, "pin file {}", path.display()),
            ConstraintSource::Project => f.write_str("project declaration"),
            ConstraintSource::Default => f.write_str("default"),
        }
    }
}

/// Symbolic resolution policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Newest catalog version.
    Latest,
    /// Newest catalog version, pre-releases always excluded.
    LatestStable,
    /// Newest version satisfying every applicable range.
    LatestAllowed,
    /// Oldest version satisfying every applicable range.
    MinRequired,
}

impl Policy {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "latest" => Some(Policy::Latest),
            "latest-stable" => Some(Policy::LatestStable),
            "latest-allowed" => Some(Policy::LatestAllowed),
            "min-required" => Some(Policy::MinRequired),
            _ => None,
        }
    }
}

/// What kind of request a token encodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// A concrete version, used verbatim without catalog validation.
    Exact(String),
    Policy(Policy),
    Range(VersionReq),
}

/// One version constraint: the raw token, where it came from, and its
/// parsed kind. Constraints are combined during aggregation, never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub raw: String,
    pub source: ConstraintSource,
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Classify and parse one raw token.
    ///
    /// Order matters: symbolic policies first, then concrete versions
    /// (`1.6.2`, `v1.6.2`, partials padded with zeros), then range
    /// expressions with the pessimistic `~>` operator normalized into
    /// semver syntax.
    pub fn parse(raw: &str, source: ConstraintSource) -> Result<Self, ConstraintError> {
        let token = raw.trim();

        if let Some(policy) = Policy::from_token(token) {
            return Ok(Self {
                raw: raw.to_string(),
                source,
                kind: ConstraintKind::Policy(policy),
            });
        }

        if let Some(version) = parse_exact(token) {
            return Ok(Self {
                raw: raw.to_string(),
                source,
                kind: ConstraintKind::Exact(version.to_string()),
            });
        }

        let normalized = normalize_requirement(token)?;
        match VersionReq::parse(&normalized) {
            Ok(req) => Ok(Self {
                raw: raw.to_string(),
                source,
                kind: ConstraintKind::Range(req),
            }),
            Err(e) => Err(ConstraintError::Invalid {
                raw: raw.to_string(),
                origin: source,
                reason: e.to_string(),
            }),
        }
    }

    /// The requirement this constraint contributes to an intersection.
    /// Exact tokens contribute `=x.y.z`; policies contribute nothing.
    pub fn as_requirement(&self) -> Option<VersionReq> {
        match &self.kind {
            ConstraintKind::Range(req) => Some(req.clone()),
            ConstraintKind::Exact(version) => VersionReq::parse(&format!("={version}")).ok(),
            ConstraintKind::Policy(_) => None,
        }
    }

    /// `raw (source)` rendering used in resolution failure messages.
    pub fn describe(&self) -> String {
        format!("'{}' ({})", self.raw.trim(), self.source)
    }
}

/// Parse a token as a concrete version, padding partial versions with
/// zeros and tolerating a leading `v`.
fn parse_exact(token: &str) -> Option<Version> {
    let token = token.strip_prefix('v').unwrap_or(token);
    if !token.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let base = token.split(['-', '+']).next().unwrap_or(token);
    let padded = match base.split('.').count() {
        1 => format!("{}.0.0{}", base, &token[base.len()..]),
        2 => format!("{}.0{}", base, &token[base.len()..]),
        _ => token.to_string(),
    };
    Version::parse(&padded).ok()
}

/// Rewrite a declaration-style range expression into semver syntax.
///
/// `~> x.y` widens to `^x.y` (any newer minor) while `~> x.y.z` stays
/// pessimistic at `~x.y.z` (any newer patch). `!=` has no semver
/// counterpart and is rejected.
fn normalize_requirement(raw: &str) -> Result<String, ConstraintError> {
    let mut parts = Vec::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        if segment.starts_with("!=") {
            return Err(ConstraintError::UnsupportedOperator {
                raw: raw.to_string(),
                operator: "!=".to_string(),
            });
        }

        if let Some(rest) = segment.strip_prefix("~>") {
            let version = rest.trim();
            let op = if version.split('.').count() >= 3 { "~" } else { "^" };
            parts.push(format!("{op}{version}"));
        } else {
            parts.push(segment.to_string());
        }
    }

    Ok(parts.join(", "))
}
