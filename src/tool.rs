//! Identities and naming conventions of the managed tools

use crate::platform;

/// How a tool's release artifact is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// A zip archive holding the binary (and license files).
    ZipArchive,
    /// The binary itself, uploaded as a bare release asset.
    SingleBinary,
}

/// Discovery strategy used to list and locate releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Structured JSON release index (`index.json` documents).
    Api,
    /// Directory-listing page parsed for version links.
    Html,
    /// Releases API of a source-hosting platform.
    Github,
}

impl DiscoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMode::Api => "api",
            DiscoveryMode::Html => "html",
            DiscoveryMode::Github => "github",
        }
    }
}

impl std::str::FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(DiscoveryMode::Api),
            "html" => Ok(DiscoveryMode::Html),
            "github" => Ok(DiscoveryMode::Github),
            other => Err(format!("unknown discovery mode: {other}")),
        }
    }
}

/// Names of the asset files fetched for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNames {
    /// The downloadable binary or archive.
    pub asset: String,
    /// The checksum manifest covering the release's assets.
    pub sums: String,
    /// Detached signature over the checksum manifest, when the
    /// vendor publishes one.
    pub signature: Option<String>,
}

/// One of the managed tools.
///
/// The identity fixes every naming convention: asset file names, release
/// tag shape, pin-file name, environment variable names, and the default
/// remote endpoints for each discovery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Terraform,
    Tofu,
    Terragrunt,
}

impl Tool {
    /// Product name, used as directory name in the store and as the
    /// prefix of asset file names.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Terraform => "terraform",
            Tool::Tofu => "tofu",
            Tool::Terragrunt => "terragrunt",
        }
    }

    /// Upper-case component of the tool's environment variable names,
    /// e.g. `IACENV_TERRAFORM_VERSION`.
    pub fn env_component(&self) -> &'static str {
        match self {
            Tool::Terraform => "TERRAFORM",
            Tool::Tofu => "TOFU",
            Tool::Terragrunt => "TERRAGRUNT",
        }
    }

    /// Pin-file name searched for in the working directory and its
    /// ancestors.
    pub fn version_file(&self) -> &'static str {
        match self {
            Tool::Terraform => ".terraform-version",
            Tool::Tofu => ".opentofu-version",
            Tool::Terragrunt => ".terragrunt-version",
        }
    }

    pub fn distribution(&self) -> Distribution {
        match self {
            Tool::Terraform | Tool::Tofu => Distribution::ZipArchive,
            Tool::Terragrunt => Distribution::SingleBinary,
        }
    }

    pub fn default_discovery(&self) -> DiscoveryMode {
        match self {
            Tool::Terraform => DiscoveryMode::Api,
            Tool::Tofu | Tool::Terragrunt => DiscoveryMode::Github,
        }
    }

    /// Default base URL assets are fetched from, per default discovery
    /// mode.
    pub fn default_remote_url(&self) -> &'static str {
        match self {
            Tool::Terraform => "https://releases.hashicorp.com",
            Tool::Tofu => "https://api.github.com/repos/opentofu/opentofu/releases",
            Tool::Terragrunt => "https://api.github.com/repos/gruntwork-io/terragrunt/releases",
        }
    }

    /// Default base URL used to list releases. Identical to the remote
    /// URL for every built-in tool, but configurable separately.
    pub fn default_list_url(&self) -> &'static str {
        self.default_remote_url()
    }

    /// Where the vendor publishes the public key its checksum manifests
    /// are signed with. `None` for tools that publish no signature.
    pub fn default_public_key_url(&self) -> Option<&'static str> {
        match self {
            Tool::Terraform => Some("https://www.hashicorp.com/.well-known/pgp-key.txt"),
            Tool::Tofu => Some("https://get.opentofu.org/opentofu.asc"),
            Tool::Terragrunt => None,
        }
    }

    /// Release tag for a bare version string. Terraform tags carry no
    /// `v` prefix, the others do.
    pub fn release_tag(&self, version: &str) -> String {
        match self {
            Tool::Terraform => version.trim_start_matches('v').to_string(),
            Tool::Tofu | Tool::Terragrunt => {
                if version.starts_with('v') {
                    version.to_string()
                } else {
                    format!("v{version}")
                }
            }
        }
    }

    /// Path of a release's asset directory relative to an `html` mode
    /// base URL.
    pub fn release_dir(&self, version: &str) -> String {
        match self {
            Tool::Terraform => format!("{}/{}", self.name(), version),
            Tool::Tofu | Tool::Terragrunt => self.release_tag(version),
        }
    }

    /// Asset file names for one release on the current platform.
    ///
    /// Archive tools embed the version in every name
    /// (`terraform_1.6.0_linux_amd64.zip`); the single-binary tool names
    /// its asset by platform only and shares one bare `SHA256SUMS`.
    pub fn asset_names(&self, version: &str) -> AssetNames {
        self.asset_names_for(version, platform::os_token(), platform::arch_token())
    }

    /// Same as [`Tool::asset_names`] with explicit platform tokens.
    pub fn asset_names_for(&self, version: &str, os: &str, arch: &str) -> AssetNames {
        let version = version.trim_start_matches('v');
        match self.distribution() {
            Distribution::ZipArchive => {
                let sums = format!("{}_{}_SHA256SUMS", self.name(), version);
                AssetNames {
                    asset: format!("{}_{}_{}_{}.zip", self.name(), version, os, arch),
                    signature: Some(format!("{sums}.sig")),
                    sums,
                }
            }
            Distribution::SingleBinary => {
                let ext = if os == "windows" { ".exe" } else { "" };
                AssetNames {
                    asset: format!("{}_{}_{}{}", self.name(), os, arch, ext),
                    sums: "SHA256SUMS".to_string(),
                    signature: None,
                }
            }
        }
    }

    /// File name the single binary is stored under after install.
    pub fn binary_name(&self) -> String {
        if platform::os_token() == "windows" {
            format!("{}.exe", self.name())
        } else {
            self.name().to_string()
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
