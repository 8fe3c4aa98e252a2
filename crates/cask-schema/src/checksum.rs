use crate::conditional::{ArchSlots, ConditionalValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Marker value that disables checksum verification.
pub const NO_CHECK: &str = "no_check";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("'{0}' is not a 64-character hex SHA-256 digest")]
    InvalidDigest(String),
    #[error("'sha256' requires a digest, '{NO_CHECK}', or per-platform digests")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    pub fn from_hex(input: &str) -> Result<Self, ChecksumError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(input.trim(), &mut bytes)
            .map_err(|_| ChecksumError::InvalidDigest(input.to_owned()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumOrSkip {
    Verify(Sha256Digest),
    Skip,
}

impl ChecksumOrSkip {
    pub fn parse(value: &str) -> Result<Self, ChecksumError> {
        if value == NO_CHECK {
            Ok(ChecksumOrSkip::Skip)
        } else {
            Sha256Digest::from_hex(value).map(ChecksumOrSkip::Verify)
        }
    }
}

/// Per-platform digests. `intel` is a synonym for `x86_64`; when both are
/// given, `x86_64` wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformChecksums {
    #[serde(default)]
    pub arm: Option<String>,
    #[serde(default)]
    pub intel: Option<String>,
    #[serde(default)]
    pub x86_64: Option<String>,
    #[serde(default)]
    pub arm64_linux: Option<String>,
    #[serde(default)]
    pub x86_64_linux: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChecksumArg {
    Single(String),
    PerPlatform(PlatformChecksums),
}

impl ChecksumArg {
    /// Whether any architecture- or OS-scoped digest is present.
    pub fn is_platform_scoped(&self) -> bool {
        match self {
            ChecksumArg::Single(_) => false,
            ChecksumArg::PerPlatform(p) => {
                p.arm.is_some()
                    || p.intel.is_some()
                    || p.x86_64.is_some()
                    || p.arm64_linux.is_some()
                    || p.x86_64_linux.is_some()
            }
        }
    }

    pub fn into_conditional(self) -> Result<ConditionalValue<ChecksumOrSkip>, ChecksumError> {
        let raw = match self {
            ChecksumArg::Single(value) => ConditionalValue::uniform(value),
            ChecksumArg::PerPlatform(p) => {
                let macos = ArchSlots::new(p.arm, p.x86_64.or(p.intel));
                let linux = ArchSlots::new(p.arm64_linux, p.x86_64_linux);
                if macos.is_empty() && linux.is_empty() {
                    return Err(ChecksumError::Empty);
                }
                ConditionalValue::by_platform(macos, linux)
            }
        };
        raw.try_map(|v| ChecksumOrSkip::parse(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os, Platform};

    const A: &str = "7bdb497080ffafdfd8cc94d8c62b004af1be9599e865e5555e456e2681e150ca";
    const B: &str = "b3c1c2442480a0219b9e05cf91d03385858c20f04b764ec08a3fa83d1b27e7b2";

    #[test]
    fn parses_hex_digest() {
        let d = Sha256Digest::from_hex(A).unwrap();
        assert_eq!(d.to_hex(), A);
        assert_eq!(d.as_bytes()[0], 0x7b);
    }

    #[test]
    fn rejects_short_digest() {
        assert!(Sha256Digest::from_hex("abc").is_err());
        assert!(ChecksumOrSkip::parse("zz").is_err());
    }

    #[test]
    fn no_check_is_skip() {
        assert_eq!(ChecksumOrSkip::parse(NO_CHECK).unwrap(), ChecksumOrSkip::Skip);
    }

    #[test]
    fn x86_64_wins_over_intel() {
        let arg = ChecksumArg::PerPlatform(PlatformChecksums {
            intel: Some(A.to_owned()),
            x86_64: Some(B.to_owned()),
            ..PlatformChecksums::default()
        });
        let value = arg.into_conditional().unwrap();
        let resolved = value.resolve(Platform::new(Os::Macos, Arch::Intel)).unwrap();
        assert_eq!(
            *resolved,
            ChecksumOrSkip::Verify(Sha256Digest::from_hex(B).unwrap())
        );
    }

    #[test]
    fn intel_alone_fills_x86_64_slot() {
        let arg = ChecksumArg::PerPlatform(PlatformChecksums {
            intel: Some(A.to_owned()),
            ..PlatformChecksums::default()
        });
        assert!(arg.is_platform_scoped());
        let value = arg.into_conditional().unwrap();
        assert!(value.resolve(Platform::new(Os::Macos, Arch::Intel)).is_some());
        assert!(value.resolve(Platform::new(Os::Macos, Arch::Arm)).is_none());
        assert!(value.resolve(Platform::new(Os::Linux, Arch::Intel)).is_none());
    }

    #[test]
    fn linux_slots_are_separate() {
        let arg: ChecksumArg = serde_json::from_str(&format!(
            r#"{{"arm": "{A}", "x86_64_linux": "{B}"}}"#
        ))
        .unwrap();
        let value = arg.into_conditional().unwrap();
        assert!(value.resolve(Platform::new(Os::Linux, Arch::Intel)).is_some());
        assert!(value.resolve(Platform::new(Os::Linux, Arch::Arm)).is_none());
    }

    #[test]
    fn empty_per_platform_is_rejected() {
        let arg = ChecksumArg::PerPlatform(PlatformChecksums::default());
        assert_eq!(arg.into_conditional(), Err(ChecksumError::Empty));
    }

    #[test]
    fn single_value_is_not_platform_scoped() {
        let arg: ChecksumArg = serde_json::from_str(&format!("\"{A}\"")).unwrap();
        assert!(!arg.is_platform_scoped());
        assert!(!arg.into_conditional().unwrap().is_conditional());
    }
}
