//! Version and build information.

/// Major version component.
pub const MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
/// Minor version component.
pub const MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
/// Patch version component.
pub const PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");

/// Returns the semantic version triple, e.g. `1.0.0`.
pub fn version() -> String {
    format!("{MAJOR}.{MINOR}.{PATCH}")
}

/// Returns the multi-line descriptor printed by `--version`: version,
/// build timestamp, compiler identity and host platform.
pub fn version_info() -> String {
    format!(
        "version: {}\nbuilt: {}\nbuild: {}\nos: {} {}",
        version(),
        env!("SPINEL_BUILD_TIMESTAMP"),
        env!("SPINEL_RUSTC_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_crate_metadata() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_version_info_layout() {
        let info = version_info();
        let lines: Vec<&str> = info.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("version: "));
        assert!(lines[1].starts_with("built: "));
        assert!(lines[2].starts_with("build: "));
        assert!(lines[3].starts_with("os: "));
    }
}
