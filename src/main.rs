use std::path::PathBuf;

use clap::{Parser, Subcommand};

use iacenv::catalog::Catalog;
use iacenv::config::Config;
use iacenv::constraint;
use iacenv::resolver;
use iacenv::store::VersionStore;
use iacenv::tool::Tool;

#[derive(Parser)]
#[command(name = "iacenv")]
#[command(version, about = "Manage verified installs of Terraform, OpenTofu and Terragrunt")]
struct Cli {
    /// Root directory versions are installed under
    #[arg(short = 'r', long, global = true)]
    root_path: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage Terraform versions
    Tf {
        #[command(subcommand)]
        action: Action,
    },
    /// Manage OpenTofu versions
    Tofu {
        #[command(subcommand)]
        action: Action,
    },
    /// Manage Terragrunt versions
    Tg {
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Resolve the version the current project requires and install it
    Detect,
    /// Install a version: exact, range or policy (defaults to detection)
    Install { constraint: Option<String> },
    /// List installed versions
    List,
    /// List versions available remotely
    ListRemote,
    /// Remove an installed version
    Uninstall { version: String },
    /// Resolve a constraint, install if needed, and mark it active
    Use { constraint: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.verbose = cli.verbose;
    if let Some(root_path) = cli.root_path {
        config.root_path = root_path;
    }

    let default_filter = if config.verbose {
        "iacenv=debug"
    } else {
        "iacenv=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (tool, action) = match cli.command {
        Command::Tf { action } => (Tool::Terraform, action),
        Command::Tofu { action } => (Tool::Tofu, action),
        Command::Tg { action } => (Tool::Terragrunt, action),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config, tool, action))
}

async fn run(config: Config, tool: Tool, action: Action) -> anyhow::Result<()> {
    let store = VersionStore::new(&config.root_path, tool);
    let catalog = Catalog::new(config.retriever(tool), config.github_token.as_deref());

    match action {
        Action::Detect => {
            let version = resolve(None, tool, &store, &catalog).await?;
            catalog
                .install_release(&version, &store.version_dir(&version))
                .await?;
            println!("{version}");
        }
        Action::Install { constraint } => {
            let version = resolve(constraint.as_deref(), tool, &store, &catalog).await?;
            catalog
                .install_release(&version, &store.version_dir(&version))
                .await?;
        }
        Action::List => {
            let active = store.active_version()?;
            for version in store.installed_versions()? {
                let marker = if active.as_deref() == Some(version.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {version}");
            }
        }
        Action::ListRemote => {
            let mut releases = catalog.list_releases().await?;
            releases.sort_by_cached_key(|release| {
                semver::Version::parse(release.trim_start_matches('v')).ok()
            });
            for release in releases {
                println!("{release}");
            }
        }
        Action::Uninstall { version } => {
            if store.uninstall(&version)? {
                println!("Uninstalled {tool} {version}");
            } else {
                println!("{tool} {version} is not installed");
            }
        }
        Action::Use { constraint } => {
            let version = resolve(Some(&constraint), tool, &store, &catalog).await?;
            catalog
                .install_release(&version, &store.version_dir(&version))
                .await?;
            store.activate(&version)?;
            println!("{version}");
        }
    }

    Ok(())
}

async fn resolve(
    cli_constraint: Option<&str>,
    tool: Tool,
    store: &VersionStore,
    catalog: &Catalog,
) -> anyhow::Result<String> {
    let project_dir = std::env::current_dir()?;
    let request = constraint::aggregate(tool, cli_constraint, &project_dir)?;
    Ok(resolver::resolve(&request, store, catalog).await?)
}
