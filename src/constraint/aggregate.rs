//! Precedence merge of constraint sources into one resolution request

use std::path::{Path, PathBuf};

use semver::VersionReq;
use tracing::debug;

use crate::constraint::scanner::{self, ScanError};
use crate::constraint::{Constraint, ConstraintError, ConstraintKind, ConstraintSource, Policy};
use crate::tool::Tool;

/// Error type for constraint aggregation.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// The aggregated, ordered constraint set for one tool, highest
/// precedence first. Consumed by the resolver and discarded afterwards.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub tool: Tool,
    pub constraints: Vec<Constraint>,
}

impl ResolutionRequest {
    /// The range intersection every candidate version must satisfy.
    pub fn requirements(&self) -> Vec<VersionReq> {
        self.constraints
            .iter()
            .filter_map(Constraint::as_requirement)
            .collect()
    }

    /// The symbolic policy driving selection: the highest-precedence
    /// policy constraint, or `latest-allowed` when only ranges apply.
    pub fn policy(&self) -> Policy {
        self.constraints
            .iter()
            .find_map(|c| match c.kind {
                ConstraintKind::Policy(policy) => Some(policy),
                _ => None,
            })
            .unwrap_or(Policy::LatestAllowed)
    }

    /// The exact version to use verbatim, when the winning source
    /// pinned one.
    pub fn exact(&self) -> Option<&str> {
        match self.constraints.first()?.kind {
            ConstraintKind::Exact(ref version) => Some(version),
            _ => None,
        }
    }

    /// Human-readable constraint set, used in failure messages.
    pub fn describe(&self) -> String {
        self.constraints
            .iter()
            .map(Constraint::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Aggregate every constraint source for `tool`, scanning `project_dir`
/// for declarations and its ancestors for a pin file.
///
/// Precedence, highest first: CLI token, environment variable, nearest
/// pin file, project declarations, default policy. The first of
/// CLI/env/pin that parses to an exact version short-circuits
/// everything below it; a range or policy from those sources is
/// intersected with all project ranges instead.
pub fn aggregate(
    tool: Tool,
    cli: Option<&str>,
    project_dir: &Path,
) -> Result<ResolutionRequest, AggregateError> {
    let env_var = version_env_var(tool);
    let env = std::env::var(&env_var).ok().filter(|v| !v.trim().is_empty());
    if env.is_some() {
        debug!("Using version constraint from {env_var}");
    }

    let head = head_constraint(cli, env.as_deref(), find_pin_file(tool, project_dir))?;

    // An exact override makes the project scan pointless; skip it.
    if matches!(
        head,
        Some(Constraint {
            kind: ConstraintKind::Exact(_),
            ..
        })
    ) {
        return Ok(merge(tool, head, &[])?);
    }

    let project = scanner::gather_required_version(tool, project_dir)?;
    Ok(merge(tool, head, &project)?)
}

/// Name of the per-tool version override variable,
/// e.g. `IACENV_TERRAFORM_VERSION`.
pub fn version_env_var(tool: Tool) -> String {
    format!("IACENV_{}_VERSION", tool.env_component())
}

#[cfg(test)]
fn aggregate_sources(
    tool: Tool,
    cli: Option<&str>,
    env: Option<&str>,
    pin: Option<(PathBuf, String)>,
    project: &[String],
) -> Result<ResolutionRequest, ConstraintError> {
    merge(tool, head_constraint(cli, env, pin)?, project)
}

/// Parse the winning override source, if any.
fn head_constraint(
    cli: Option<&str>,
    env: Option<&str>,
    pin: Option<(PathBuf, String)>,
) -> Result<Option<Constraint>, ConstraintError> {
    match (cli, env, pin) {
        (Some(raw), _, _) => Ok(Some(Constraint::parse(raw, ConstraintSource::Cli)?)),
        (None, Some(raw), _) => Ok(Some(Constraint::parse(raw, ConstraintSource::Environment)?)),
        (None, None, Some((path, raw))) => {
            Ok(Some(Constraint::parse(&raw, ConstraintSource::PinFile(path))?))
        }
        (None, None, None) => Ok(None),
    }
}

fn merge(
    tool: Tool,
    head: Option<Constraint>,
    project: &[String],
) -> Result<ResolutionRequest, ConstraintError> {
    let mut constraints = Vec::new();
    match head {
        // An exact override is the resolution target; everything of
        // lower precedence is ignored entirely.
        Some(head) if matches!(head.kind, ConstraintKind::Exact(_)) => {
            return Ok(ResolutionRequest {
                tool,
                constraints: vec![head],
            });
        }
        Some(head) => constraints.push(head),
        None => {}
    }

    for raw in project {
        let constraint = Constraint::parse(raw, ConstraintSource::Project)?;
        // A project-declared exact version never short-circuits; it
        // participates in the intersection as an equality range.
        constraints.push(demote_exact(constraint)?);
    }

    if constraints.is_empty() {
        constraints.push(Constraint {
            raw: "latest-allowed".to_string(),
            source: ConstraintSource::Default,
            kind: ConstraintKind::Policy(Policy::LatestAllowed),
        });
    }

    Ok(ResolutionRequest { tool, constraints })
}

fn demote_exact(constraint: Constraint) -> Result<Constraint, ConstraintError> {
    let Constraint { raw, source, kind } = constraint;

    let kind = match kind {
        ConstraintKind::Exact(version) => {
            let req =
                VersionReq::parse(&format!("={version}")).map_err(|e| ConstraintError::Invalid {
                    raw: raw.clone(),
                    origin: source.clone(),
                    reason: e.to_string(),
                })?;
            ConstraintKind::Range(req)
        }
        other => other,
    };

    Ok(Constraint { raw, source, kind })
}

fn find_pin_file(tool: Tool, start: &Path) -> Option<(PathBuf, String)> {
    for dir in start.ancestors() {
        let candidate = dir.join(tool.version_file());
        let Ok(content) = std::fs::read_to_string(&candidate) else {
            continue;
        };
        let token = content.lines().next().unwrap_or("").trim();
        if !token.is_empty() {
            debug!("Found pin file {}", candidate.display());
            return Some((candidate, token.to_string()));
        }
    }

    None
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Build a request the way aggregation would: the first token plays
    /// the CLI source, the rest are project declarations.
    pub(crate) fn request_from(tokens: &[&str]) -> ResolutionRequest {
        let (head, rest) = tokens.split_first().expect("at least one token");
        let project: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
        aggregate_sources(Tool::Terraform, Some(head), None, None, &project)
            .expect("valid test constraints")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::TempDir;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_exact_short_circuits_everything() {
        let request = aggregate_sources(
            Tool::Terraform,
            Some("1.6.2"),
            Some("latest"),
            Some((PathBuf::from(".terraform-version"), "1.0.0".to_string())),
            &strings(&[">= 1.2"]),
        )
        .unwrap();

        assert_eq!(request.exact(), Some("1.6.2"));
        assert_eq!(request.constraints.len(), 1);
    }

    #[test]
    fn env_wins_over_pin_file_and_project() {
        let request = aggregate_sources(
            Tool::Terraform,
            None,
            Some("1.5.0"),
            Some((PathBuf::from(".terraform-version"), "1.0.0".to_string())),
            &strings(&[">= 1.2"]),
        )
        .unwrap();

        assert_eq!(request.exact(), Some("1.5.0"));
        assert_eq!(
            request.constraints[0].source,
            ConstraintSource::Environment
        );
    }

    #[test]
    fn pin_file_exact_ignores_project_ranges() {
        let request = aggregate_sources(
            Tool::Terraform,
            None,
            None,
            Some((PathBuf::from(".terraform-version"), "1.1.0".to_string())),
            &strings(&[">= 1.2"]),
        )
        .unwrap();

        // The pin wins even though the project range excludes it.
        assert_eq!(request.exact(), Some("1.1.0"));
        assert!(request.requirements().is_empty());
    }

    #[test]
    fn range_override_is_intersected_with_project_ranges() {
        let request = aggregate_sources(
            Tool::Terraform,
            Some(">= 1.3"),
            None,
            None,
            &strings(&[">= 1.2, < 1.5"]),
        )
        .unwrap();

        assert_eq!(request.exact(), None);
        let reqs = request.requirements();
        assert_eq!(reqs.len(), 2);

        let satisfies =
            |v: &str| reqs.iter().all(|r| r.matches(&Version::parse(v).unwrap()));
        assert!(satisfies("1.4.0"));
        assert!(!satisfies("1.2.0"));
        assert!(!satisfies("1.5.0"));
    }

    #[test]
    fn policy_override_keeps_project_ranges() {
        let request = aggregate_sources(
            Tool::Terraform,
            Some("min-required"),
            None,
            None,
            &strings(&[">= 1.2"]),
        )
        .unwrap();

        assert_eq!(request.policy(), Policy::MinRequired);
        assert_eq!(request.requirements().len(), 1);
    }

    #[test]
    fn project_exact_becomes_equality_range() {
        let request =
            aggregate_sources(Tool::Terraform, None, None, None, &strings(&["1.6.0"])).unwrap();

        assert_eq!(request.exact(), None);
        let reqs = request.requirements();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].matches(&Version::parse("1.6.0").unwrap()));
        assert!(!reqs[0].matches(&Version::parse("1.6.1").unwrap()));
    }

    #[test]
    fn empty_sources_fall_back_to_default_policy() {
        let request = aggregate_sources(Tool::Terraform, None, None, None, &[]).unwrap();

        assert_eq!(request.policy(), Policy::LatestAllowed);
        assert_eq!(request.constraints[0].source, ConstraintSource::Default);
    }

    #[test]
    fn invalid_project_token_is_fatal_at_aggregation() {
        let result =
            aggregate_sources(Tool::Terraform, None, None, None, &strings(&["garbage"]));
        assert!(result.is_err());
    }

    #[test]
    fn find_pin_file_searches_ancestors() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("envs/prod");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(".terraform-version"), "1.6.2\n").unwrap();

        let (path, token) = find_pin_file(Tool::Terraform, &nested).unwrap();
        assert_eq!(path, temp.path().join(".terraform-version"));
        assert_eq!(token, "1.6.2");
    }

    #[test]
    fn find_pin_file_ignores_blank_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".terraform-version"), "\n").unwrap();

        assert!(find_pin_file(Tool::Terraform, temp.path()).is_none());
    }
}
