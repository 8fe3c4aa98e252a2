//! Manifest documents, typed stanzas, and the value types of a cask.
//!
//! This crate defines the schema layer: TOML/JSON manifest parsing
//! (`ManifestDocument`) into a typed event stream (`Event`, `Stanza`),
//! platform-conditional values (`ConditionalValue`), locale tags and language
//! block selection (`LanguageBlocks`), the closed artifact kind enumeration
//! (`ArtifactKind`), dependency/conflict declarations, and reason codes.

pub mod artifact;
pub mod checksum;
pub mod conditional;
pub mod depends;
pub mod locale;
pub mod manifest;
pub mod platform;
pub mod reason;
pub mod stanza;
pub mod types;

pub use artifact::{
    Artifact, ArtifactError, ArtifactKind, InstallerSpec, PkgSpec, Relocation, ScriptSpec,
    UninstallDirectives,
};
pub use checksum::{ChecksumArg, ChecksumError, ChecksumOrSkip, PlatformChecksums, Sha256Digest};
pub use conditional::{ArchSlots, ConditionalValue};
pub use depends::{
    ConflictDeclaration, ConflictsArg, DependencyDeclaration, DependsError, DependsOnArg,
    MacosRequirement, MacosVersion,
};
pub use locale::{
    LanguageBlock, LanguageBlocks, LanguageError, LazyBlock, LocaleParseError, LocalePolicy,
    LocaleTag,
};
pub use manifest::{
    parse_manifest_file, parse_manifest_json, parse_manifest_str, Entry, ManifestDocument,
    ManifestError,
};
pub use platform::{Arch, Os, Platform, PlatformParseError};
pub use reason::{Reason, ReasonCode, LIFECYCLE_REASONS, NO_AUTOBUMP_REASONS};
pub use stanza::{
    ArchArg, Condition, ContainerSpec, DecodeError, Event, LanguageArg, LifecycleArg,
    LivecheckSpec, NoAutobumpArg, OsArg, Stanza, UrlSpec,
};
pub use types::{FormulaName, StringList, Token};
