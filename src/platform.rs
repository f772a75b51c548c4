//! Platform token mapping for release asset names

/// Operating system token used in asset file names.
///
/// Release archives are published with Go-style platform tokens,
/// so `macos` maps to `darwin`.
pub fn os_token() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture token used in asset file names.
///
/// `x86_64` maps to `amd64` and `aarch64` to `arm64`.
pub fn arch_token() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_token_is_a_known_release_platform() {
        assert!(["linux", "darwin", "windows", "freebsd", "openbsd"].contains(&os_token()));
    }

    #[test]
    fn arch_token_never_uses_rust_spellings() {
        assert_ne!(arch_token(), "x86_64");
        assert_ne!(arch_token(), "aarch64");
    }
}
