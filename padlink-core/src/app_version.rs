//! Application version metadata

use crate::envelope::Payload;
use std::fmt;

/// Parsed `major.minor.patch` version plus a build number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl AppVersion {
    /// Parse a dotted version and a build string.
    ///
    /// Missing or non-numeric components read as 0, so `"2.x"` with build
    /// `"beta"` yields `2.0.0 (0)`.
    pub fn parse(version: &str, build: &str) -> Self {
        let mut parts = version
            .split('.')
            .map(|part| part.trim().parse::<u32>().unwrap_or(0));

        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
            build: build.trim().parse().unwrap_or(0),
        }
    }

    /// Version of this crate; the build number comes from `PADLINK_BUILD` at
    /// compile time when set.
    pub fn current() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION"), option_env!("PADLINK_BUILD").unwrap_or("0"))
    }

    /// `"1.2.3 (4)"`
    pub fn version_string(&self) -> String {
        self.to_string()
    }

    /// Version announcement payload (patch level is not announced)
    pub fn as_payload(&self) -> Payload {
        Payload::version(self.major, self.minor, self.build)
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{} ({})", self.major, self.minor, self.patch, self.build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let version = AppVersion::parse("1.2.3", "45");
        assert_eq!(
            version,
            AppVersion { major: 1, minor: 2, patch: 3, build: 45 }
        );
        assert_eq!(version.version_string(), "1.2.3 (45)");
    }

    #[test]
    fn test_parse_partial_and_garbage() {
        assert_eq!(AppVersion::parse("2", ""), AppVersion { major: 2, ..Default::default() });
        assert_eq!(
            AppVersion::parse("2.x.7", "beta"),
            AppVersion { major: 2, minor: 0, patch: 7, build: 0 }
        );
    }

    #[test]
    fn test_current_matches_package_version() {
        let current = AppVersion::current();
        assert!(current.to_string().starts_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_payload_uses_build_number() {
        let payload = AppVersion::parse("3.1.4", "15").as_payload();
        assert_eq!(payload, Payload::version(3, 1, 15));
    }
}
