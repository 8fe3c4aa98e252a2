//! Values that may depend on the operating system and/or CPU architecture.
//!
//! Resolution is two-stage: the OS axis selects an [`ArchSlots`] sub-map, then
//! the architecture axis selects a slot within it. An empty slot resolves to
//! `None`, meaning the value was never set for that platform.

use crate::platform::{Arch, Os, Platform};
use serde::Serialize;

/// Per-architecture slots within one operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchSlots<T> {
    pub arm: Option<T>,
    pub intel: Option<T>,
}

impl<T> Default for ArchSlots<T> {
    fn default() -> Self {
        Self {
            arm: None,
            intel: None,
        }
    }
}

impl<T> ArchSlots<T> {
    pub fn new(arm: Option<T>, intel: Option<T>) -> Self {
        Self { arm, intel }
    }

    pub fn get(&self, arch: Arch) -> Option<&T> {
        match arch {
            Arch::Arm => self.arm.as_ref(),
            Arch::Intel => self.intel.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.arm.is_none() && self.intel.is_none()
    }

    fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<ArchSlots<U>, E> {
        Ok(ArchSlots {
            arm: self.arm.map(&mut *f).transpose()?,
            intel: self.intel.map(&mut *f).transpose()?,
        })
    }
}

impl<T: Clone> ArchSlots<T> {
    /// Both architecture slots hold the same value.
    pub fn both(value: Option<T>) -> Self {
        Self {
            arm: value.clone(),
            intel: value,
        }
    }
}

/// A value that is either uniform across platforms or keyed by (os, arch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalValue<T> {
    Uniform(T),
    ByPlatform {
        macos: ArchSlots<T>,
        linux: ArchSlots<T>,
    },
}

impl<T> ConditionalValue<T> {
    pub fn uniform(value: T) -> Self {
        ConditionalValue::Uniform(value)
    }

    pub fn by_platform(macos: ArchSlots<T>, linux: ArchSlots<T>) -> Self {
        ConditionalValue::ByPlatform { macos, linux }
    }

    /// Resolve against a concrete platform. `None` means unset for that platform.
    pub fn resolve(&self, platform: Platform) -> Option<&T> {
        match self {
            ConditionalValue::Uniform(value) => Some(value),
            ConditionalValue::ByPlatform { macos, linux } => {
                let slots = match platform.os {
                    Os::Macos => macos,
                    Os::Linux => linux,
                };
                slots.get(platform.arch)
            }
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, ConditionalValue::ByPlatform { .. })
    }

    /// Platforms for which this value resolves to something.
    pub fn defined_platforms(&self) -> Vec<Platform> {
        Platform::all()
            .into_iter()
            .filter(|p| self.resolve(*p).is_some())
            .collect()
    }

    pub fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<ConditionalValue<U>, E> {
        match self {
            ConditionalValue::Uniform(value) => Ok(ConditionalValue::Uniform(f(value)?)),
            ConditionalValue::ByPlatform { macos, linux } => Ok(ConditionalValue::ByPlatform {
                macos: macos.try_map(&mut f)?,
                linux: linux.try_map(&mut f)?,
            }),
        }
    }
}

impl<T: Clone> ConditionalValue<T> {
    /// Architecture-conditional value, identical on every operating system.
    pub fn by_arch(arm: Option<T>, intel: Option<T>) -> Self {
        let slots = ArchSlots::new(arm, intel);
        ConditionalValue::ByPlatform {
            macos: slots.clone(),
            linux: slots,
        }
    }

    /// OS-conditional value, identical on every architecture.
    pub fn by_os(macos: Option<T>, linux: Option<T>) -> Self {
        ConditionalValue::ByPlatform {
            macos: ArchSlots::both(macos),
            linux: ArchSlots::both(linux),
        }
    }
}
