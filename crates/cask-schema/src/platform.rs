use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformParseError {
    #[error("unknown operating system '{0}', expected 'macos' or 'linux'")]
    UnknownOs(String),
    #[error("unknown architecture '{0}', expected 'arm' or 'intel'")]
    UnknownArch(String),
}

/// Operating system axis of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    Macos,
    Linux,
}

/// CPU architecture axis of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Arm,
    Intel,
}

impl Os {
    pub const ALL: [Os; 2] = [Os::Macos, Os::Linux];

    pub fn host() -> Self {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            Os::Macos
        }
    }
}

impl Arch {
    pub const ALL: [Arch; 2] = [Arch::Arm, Arch::Intel];

    pub fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            Arch::Arm
        } else {
            Arch::Intel
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Macos => write!(f, "macos"),
            Os::Linux => write!(f, "linux"),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Arm => write!(f, "arm"),
            Arch::Intel => write!(f, "intel"),
        }
    }
}

impl FromStr for Os {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" => Ok(Os::Macos),
            "linux" => Ok(Os::Linux),
            other => Err(PlatformParseError::UnknownOs(other.to_owned())),
        }
    }
}

impl FromStr for Arch {
    type Err = PlatformParseError;

    /// `x86_64` is a synonym for `intel`; `arm64` and `aarch64` for `arm`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm" | "arm64" | "aarch64" => Ok(Arch::Arm),
            "intel" | "x86_64" => Ok(Arch::Intel),
            other => Err(PlatformParseError::UnknownArch(other.to_owned())),
        }
    }
}

/// A concrete (os, arch) evaluation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn host() -> Self {
        Self::new(Os::host(), Arch::host())
    }

    /// Every (os, arch) combination, macOS first, arm before intel.
    pub fn all() -> [Platform; 4] {
        [
            Platform::new(Os::Macos, Arch::Arm),
            Platform::new(Os::Macos, Arch::Intel),
            Platform::new(Os::Linux, Arch::Arm),
            Platform::new(Os::Linux, Arch::Intel),
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
